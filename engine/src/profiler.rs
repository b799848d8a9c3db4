// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use crate::device::Device;
use crate::error::Result;
use crate::geometry::SimplePolygon;
use crate::hardware::DeviceRegistry;
use rustc_hash::FxHashMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Averaged timing samples of one execution path, keyed by device-or-host
/// identifier and problem size.
///
/// Re-recording an existing key overwrites it; there is one entry per
/// combination. The table can be emitted as literal key/value statements for
/// static embedding in a downstream build.
#[derive(Clone, Debug)]
pub struct PerformanceTable {
    name: String,
    samples: FxHashMap<(String, usize), f64>,
}

impl PerformanceTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: FxHashMap::default(),
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record(&mut self, identifier: &str, size: usize, seconds: f64) {
        self.samples.insert((identifier.to_string(), size), seconds);
    }

    pub fn get(&self, identifier: &str, size: usize) -> Option<f64> {
        self.samples.get(&(identifier.to_string(), size)).copied()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Predicts the elapsed time for `size` on the device named `identifier`.
    ///
    /// Exact hits are returned as measured. Between two measured sizes the
    /// prediction interpolates linearly; outside the measured range it
    /// extrapolates from the nearest edge pair, clamped at zero. Returns
    /// `None` when the table holds no samples for the identifier.
    pub fn predict(&self, identifier: &str, size: usize) -> Option<f64> {
        if let Some(exact) = self.get(identifier, size) {
            return Some(exact);
        }

        let mut points: Vec<(usize, f64)> = self
            .samples
            .iter()
            .filter(|((id, _), _)| id == identifier)
            .map(|((_, sample_size), &seconds)| (*sample_size, seconds))
            .collect();
        if points.len() < 2 {
            return points.first().map(|&(_, seconds)| seconds);
        }
        points.sort_by_key(|&(sample_size, _)| sample_size);

        let (low, high) = match points.iter().position(|&(s, _)| s > size) {
            Some(0) => (points[0], points[1]),
            Some(position) => (points[position - 1], points[position]),
            None => (points[points.len() - 2], points[points.len() - 1]),
        };
        let slope = (high.1 - low.1) / (high.0 as f64 - low.0 as f64);
        Some((low.1 + slope * (size as f64 - low.0 as f64)).max(0.0))
    }

    /// Writes the samples as `name[("identifier", size)] = seconds;` lines,
    /// ordered by identifier and size
    pub fn emit(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut entries: Vec<(&(String, usize), &f64)> = self.samples.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for ((identifier, size), seconds) in entries {
            writeln!(
                out,
                "{}[(\"{}\", {})] = {};",
                self.name, identifier, size, seconds
            )?;
        }
        Ok(())
    }
}

/// Writes the marker line that identifies generated benchmark data
pub fn emit_generator_marker(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "// Generated by the polyflux benchmarker.")
}

/// Writes the generator marker followed by every table, ready for static
/// embedding in a downstream build
pub fn emit_benchmark_data(tables: &[&PerformanceTable], out: &mut dyn Write) -> io::Result<()> {
    emit_generator_marker(out)?;
    for table in tables {
        table.emit(out)?;
    }
    Ok(())
}

/// The identifier a device is keyed under in benchmark tables.
///
/// Devices without a usable name report the literal `"unknown_gpu"`, the
/// host reports `"unknown_host"`.
pub fn table_identifier(registry: &DeviceRegistry, device: Device) -> String {
    let identifier = registry.identifier(device);
    if identifier.is_empty() || identifier == "unknown" {
        if device.is_host() {
            String::from("unknown_host")
        } else {
            String::from("unknown_gpu")
        }
    } else {
        identifier.to_string()
    }
}

/// Runs one operation across an escalating ladder of input sizes, timing the
/// host path and a device path separately.
///
/// Functions as a factory for input polygons, since every size gets its own
/// representative input. The input constructor must stay linear-time in the
/// size, or building the inputs dominates the benchmark; problem sizes span
/// roughly 1 to 10^9. More repeats increase timing accuracy but lengthen the
/// total wall time proportionally.
pub struct PolygonBenchmark {
    name: String,
    construct: fn(usize) -> SimplePolygon,
    input_sizes: Vec<usize>,
    repeats: u32,
}

impl PolygonBenchmark {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            construct: SimplePolygon::regular_ngon,
            input_sizes: vec![
                1, 10, 100, 1000, 10_000, 20_000, 40_000, 80_000, 160_000, 320_000, 640_000,
                1_000_000, 2_000_000, 4_000_000, 8_000_000,
            ],
            repeats: 50,
        }
    }

    pub fn with_construct(mut self, construct: fn(usize) -> SimplePolygon) -> Self {
        self.construct = construct;
        self
    }

    /// Sizes must be ascending
    pub fn with_sizes(mut self, input_sizes: Vec<usize>) -> Self {
        self.input_sizes = input_sizes;
        self
    }

    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats.max(1);
        self
    }

    /// Times `host_path` and `device_path` over every input size and returns
    /// the two resulting tables, host first.
    ///
    /// `device` is the target the device path runs on; it keys the device
    /// table. A percentage counter is updated in place on `progress`, which
    /// must be a stream separate from wherever the tables are emitted. The
    /// counter is written outside the timed sections, so it cannot skew the
    /// measurements.
    pub fn measure<H, D>(
        &self,
        registry: &DeviceRegistry,
        device: Device,
        mut host_path: H,
        mut device_path: D,
        progress: &mut dyn Write,
    ) -> Result<(PerformanceTable, PerformanceTable)>
    where
        H: FnMut(&SimplePolygon) -> Result<()>,
        D: FnMut(&SimplePolygon) -> Result<()>,
    {
        let host_identifier = table_identifier(registry, Device::Host);
        let device_identifier = table_identifier(registry, device);
        let mut host_table = PerformanceTable::new(format!("{}_host_time", self.name));
        let mut device_table = PerformanceTable::new(format!("{}_device_time", self.name));

        let total_cells = self.input_sizes.len() as u64 * self.repeats as u64;
        let _ = write!(progress, "{}:   0%", self.name);
        let _ = progress.flush();

        for (size_index, &size) in self.input_sizes.iter().enumerate() {
            let polygon = (self.construct)(size);

            let mut total_host = Duration::ZERO;
            let mut total_device = Duration::ZERO;
            for repeat in 0..self.repeats {
                let start = Instant::now();
                host_path(&polygon)?;
                total_host += start.elapsed();

                let start = Instant::now();
                device_path(&polygon)?;
                total_device += start.elapsed();

                let completed = size_index as u64 * self.repeats as u64 + repeat as u64 + 1;
                let _ = write!(
                    progress,
                    "\r{}: {:3}%",
                    self.name,
                    completed * 100 / total_cells
                );
                let _ = progress.flush();
            }

            host_table.record(
                &host_identifier,
                size,
                total_host.as_secs_f64() / self.repeats as f64,
            );
            device_table.record(
                &device_identifier,
                size,
                total_device.as_secs_f64() / self.repeats as f64,
            );
        }

        let _ = writeln!(progress);
        Ok((host_table, device_table))
    }
}
