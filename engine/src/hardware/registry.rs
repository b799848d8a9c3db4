// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use super::statistics::DeviceStatistics;
use crate::device::Device;
use log::debug;
use opencl3::device::{Device as ClDevice, CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU};
use opencl3::platform::get_platforms;
use rustc_hash::FxHashMap;

/// All compute devices available to this process.
///
/// Enumerated once at construction; a device set change at runtime is not
/// observed until the registry is rebuilt. The host CPU is registered as the
/// `Device::Host` pseudo-device with its own identifier and statistics.
///
/// Construct this once at startup and pass it by reference into everything
/// that needs device information. All fields are read-only after `detect`, so
/// shared references are safe to hand out freely.
pub struct DeviceRegistry {
    all: Vec<Device>,
    cpus: Vec<Device>,
    gpus: Vec<Device>,
    identifiers: FxHashMap<Device, String>,
    statistics: FxHashMap<Device, DeviceStatistics>,
}

impl DeviceRegistry {
    /// Enumerates the OpenCL platforms and registers every usable device.
    ///
    /// Platforms may have additional limitations (e.g. remote platforms with
    /// limited bandwidth), but those are not modelled here; all devices are
    /// concatenated into one list. A device that fails the basic device-type
    /// query is dropped silently. Total enumeration failure degrades to empty
    /// device lists rather than an error.
    pub fn detect() -> Self {
        let mut registry = Self {
            all: Vec::new(),
            cpus: Vec::new(),
            gpus: Vec::new(),
            identifiers: FxHashMap::default(),
            statistics: FxHashMap::default(),
        };

        for platform in get_platforms().unwrap_or_default() {
            let ids = match opencl3::device::get_device_ids(
                platform.id(),
                CL_DEVICE_TYPE_CPU | CL_DEVICE_TYPE_GPU,
            ) {
                Ok(ids) => ids,
                // Most likely no devices on this platform.
                Err(_) => continue,
            };

            for id in ids {
                let cl_device = ClDevice::new(id);
                let device_type = match cl_device.dev_type() {
                    Ok(device_type) => device_type,
                    // Skip this device. It seems to be broken.
                    Err(_) => continue,
                };

                let device = Device::OpenCl(id);
                registry.all.push(device);
                if device_type == CL_DEVICE_TYPE_CPU {
                    registry.cpus.push(device);
                } else {
                    registry.gpus.push(device);
                }

                let identifier = cl_device
                    .name()
                    .map(|name| canonicalize(&name))
                    .unwrap_or_else(|_| String::from("unknown"));
                registry.identifiers.insert(device, identifier);
                registry
                    .statistics
                    .insert(device, DeviceStatistics::of_device(&cl_device));
            }
        }

        registry.identifiers.insert(Device::Host, host_identifier());
        registry
            .statistics
            .insert(Device::Host, DeviceStatistics::of_host());

        debug!(
            "detected {} OpenCL devices ({} CPU, {} GPU)",
            registry.all.len(),
            registry.cpus.len(),
            registry.gpus.len()
        );
        registry
    }

    /// Every registered OpenCL device, in stable enumeration order
    #[inline(always)]
    pub fn all(&self) -> &[Device] {
        &self.all
    }

    /// The registered CPU-type devices
    #[inline(always)]
    pub fn cpus(&self) -> &[Device] {
        &self.cpus
    }

    /// The registered GPU-type devices
    #[inline(always)]
    pub fn gpus(&self) -> &[Device] {
        &self.gpus
    }

    /// The cached display identifier of a device, including the host.
    ///
    /// Returns `"unknown"` for devices that are not registered.
    pub fn identifier(&self, device: Device) -> &str {
        self.identifiers
            .get(&device)
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    /// The cached statistics of a device, including the host
    pub fn statistics(&self, device: Device) -> Option<&DeviceStatistics> {
        self.statistics.get(&device)
    }
}

/// Trims whitespace and embedded NUL bytes from a device name.
///
/// Some drivers pad the name reported by the device with trailing NULs.
pub(crate) fn canonicalize(name: &str) -> String {
    name.replace('\0', " ").trim().to_string()
}

/// Names the CPU that this process runs on.
///
/// File-based on Linux, environment-based on Windows, `"unknown"` on any
/// other operating system.
fn host_identifier() -> String {
    #[cfg(target_os = "linux")]
    {
        use std::io::BufRead;

        if let Ok(file) = std::fs::File::open("/proc/cpuinfo") {
            for line in std::io::BufReader::new(file).lines().map_while(|l| l.ok()) {
                if line.starts_with("model name") {
                    if let Some((_, value)) = line.split_once(':') {
                        return canonicalize(value);
                    }
                }
            }
        }
        String::from("unknown")
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var("PROCESSOR_IDENTIFIER")
            .map(|name| canonicalize(&name))
            .unwrap_or_else(|_| String::from("unknown"))
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        String::from("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_never_fails() {
        // With or without an OpenCL runtime installed, detection must come
        // back with a usable registry and a host entry.
        let registry = DeviceRegistry::detect();
        assert_eq!(
            registry.all().len(),
            registry.cpus().len() + registry.gpus().len()
        );
        assert!(registry.statistics(Device::Host).is_some());
        assert!(!registry.identifier(Device::Host).is_empty());
    }

    #[test]
    fn test_unregistered_device_is_unknown() {
        let registry = DeviceRegistry::detect();
        let bogus = Device::OpenCl(usize::MAX as opencl3::types::cl_device_id);
        assert_eq!(registry.identifier(bogus), "unknown");
        assert!(registry.statistics(bogus).is_none());
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("  Intel(R) CPU \0\0"), "Intel(R) CPU");
        assert_eq!(canonicalize("\0\0"), "");
        assert_eq!(canonicalize("plain"), "plain");
    }
}
