// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use opencl3::device::Device as ClDevice;

/// Static hardware figures of one compute device.
///
/// Queried once during device registration and immutable thereafter. A field
/// that cannot be queried degrades to zero rather than failing registration.
/// External performance-prediction models read these to approximate unknown
/// devices by similar known ones; the engine itself does not consume them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStatistics {
    /// Number of parallel compute units (cores for the host)
    pub compute_units: u32,
    /// Maximum clock frequency in MHz
    pub clock_frequency: u32,
    /// Size of the global memory in bytes
    pub global_memory: u64,
    /// Size of the local/shared memory per compute unit in bytes
    pub local_memory: u64,
}

impl DeviceStatistics {
    /// Statistics of an OpenCL device
    pub(crate) fn of_device(device: &ClDevice) -> Self {
        Self {
            compute_units: device.max_compute_units().unwrap_or(0),
            clock_frequency: device.max_clock_frequency().unwrap_or(0),
            global_memory: device.global_mem_size().unwrap_or(0),
            local_memory: device.local_mem_size().unwrap_or(0),
        }
    }

    /// Statistics of the host, queried through OS facilities
    pub(crate) fn of_host() -> Self {
        Self {
            compute_units: std::thread::available_parallelism()
                .map(|count| count.get() as u32)
                .unwrap_or(0),
            clock_frequency: host_clock_frequency(),
            global_memory: host_global_memory(),
            local_memory: 0,
        }
    }
}

#[cfg(target_os = "linux")]
fn host_clock_frequency() -> u32 {
    use std::io::BufRead;

    let Ok(file) = std::fs::File::open("/proc/cpuinfo") else {
        return 0;
    };
    for line in std::io::BufReader::new(file).lines().map_while(|l| l.ok()) {
        if line.starts_with("cpu MHz") {
            if let Some((_, value)) = line.split_once(':') {
                if let Ok(mhz) = value.trim().parse::<f64>() {
                    return mhz as u32;
                }
            }
        }
    }
    0
}

#[cfg(not(target_os = "linux"))]
fn host_clock_frequency() -> u32 {
    0
}

#[cfg(target_os = "linux")]
fn host_global_memory() -> u64 {
    use std::io::BufRead;

    let Ok(file) = std::fs::File::open("/proc/meminfo") else {
        return 0;
    };
    for line in std::io::BufReader::new(file).lines().map_while(|l| l.ok()) {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kilobytes = rest
                .trim()
                .trim_end_matches("kB")
                .trim()
                .parse::<u64>()
                .unwrap_or(0);
            return kilobytes * 1024;
        }
    }
    0
}

#[cfg(not(target_os = "linux"))]
fn host_global_memory() -> u64 {
    0
}
