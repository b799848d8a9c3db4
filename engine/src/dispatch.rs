// Copyright (c) 2026 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use crate::backends::ResourceCache;
use crate::batch::DeviceBatch;
use crate::device::Device;
use crate::error::Result;
use crate::geometry::SimplePolygon;
use crate::hardware::DeviceRegistry;
use crate::operations::{Area, Operation};
use crate::profiler::{table_identifier, PerformanceTable};
use log::warn;
use rayon::prelude::*;
use std::mem::size_of;

/// Routes operations to the fastest compute target and keeps collections
/// within device memory.
///
/// The decision is driven by benchmark tables produced offline by the
/// profiler: for a given problem size the dispatcher predicts the elapsed
/// time of the host path and of every registered GPU, then picks the
/// minimum. The host wins ties and is the fallback whenever no table data
/// covers a target.
pub struct Dispatcher<'r> {
    registry: &'r DeviceRegistry,
    cache: ResourceCache,
    host_table: PerformanceTable,
    device_table: PerformanceTable,
}

impl<'r> Dispatcher<'r> {
    pub fn new(
        registry: &'r DeviceRegistry,
        host_table: PerformanceTable,
        device_table: PerformanceTable,
    ) -> Self {
        Self {
            registry,
            cache: ResourceCache::new(),
            host_table,
            device_table,
        }
    }

    #[inline(always)]
    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    /// Picks the execution target with the lowest predicted elapsed time for
    /// a problem of `size` total vertices
    pub fn choose(&self, size: usize) -> Device {
        let host_identifier = table_identifier(self.registry, Device::Host);
        let mut best = Device::Host;
        let mut best_time = self
            .host_table
            .predict(&host_identifier, size)
            .unwrap_or(f64::INFINITY);

        for &device in self.registry.gpus() {
            let identifier = table_identifier(self.registry, device);
            if let Some(time) = self.device_table.predict(&identifier, size) {
                if time < best_time {
                    best_time = time;
                    best = device;
                }
            }
        }
        best
    }

    /// Computes the area of every polygon in the collection on the fastest
    /// target.
    ///
    /// When a device is chosen, the collection is partitioned to fit its
    /// global memory and uploaded sub-batch by sub-batch. A collection that
    /// cannot be partitioned (a single polygon exceeding the device memory)
    /// falls back to the host path; capacity problems are never fatal here.
    pub fn area_many(&mut self, polygons: &[SimplePolygon]) -> Result<Vec<f64>> {
        let total_vertices: usize = polygons.iter().map(SimplePolygon::len).sum();
        let device = self.choose(total_vertices);
        if device.is_host() {
            return Ok(host_areas(polygons));
        }

        let budget = self
            .registry
            .statistics(device)
            .map(|statistics| statistics.global_memory)
            .unwrap_or(0);
        // The offset table the area kernel needs rides in the same buffer.
        let overhead = (polygons.len() * size_of::<u64>()) as u64;

        let mut batch = DeviceBatch::new(polygons);
        if budget == 0 || !batch.ensure_fit(budget.saturating_sub(overhead)) {
            warn!(
                "collection does not fit on {}, falling back to the host",
                self.registry.identifier(device)
            );
            return Ok(host_areas(polygons));
        }

        let mut results = Vec::with_capacity(polygons.len());
        if batch.subbatches().is_empty() {
            results.extend(Area.run_batch_device(&mut self.cache, device, &mut batch)?);
        } else {
            for subbatch in batch.subbatches_mut() {
                results.extend(Area.run_batch_device(&mut self.cache, device, subbatch)?);
            }
        }
        Ok(results)
    }
}

fn host_areas(polygons: &[SimplePolygon]) -> Vec<f64> {
    polygons.par_iter().map(SimplePolygon::area).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> SimplePolygon {
        let mut polygon = SimplePolygon::new();
        polygon.push(0, 0);
        polygon.push(20, 0);
        polygon.push(10, 20);
        polygon
    }

    #[test]
    fn test_choose_defaults_to_host_without_data() {
        let registry = DeviceRegistry::detect();
        let dispatcher = Dispatcher::new(
            &registry,
            PerformanceTable::new("area_host_time"),
            PerformanceTable::new("area_device_time"),
        );
        assert!(dispatcher.choose(1).is_host());
        assert!(dispatcher.choose(1_000_000_000).is_host());
    }

    #[test]
    fn test_choose_prefers_host_on_tie() {
        let registry = DeviceRegistry::detect();
        let host_identifier = table_identifier(&registry, Device::Host);

        let mut host_table = PerformanceTable::new("area_host_time");
        host_table.record(&host_identifier, 1000, 0.5);

        let mut device_table = PerformanceTable::new("area_device_time");
        for &device in registry.gpus() {
            device_table.record(&table_identifier(&registry, device), 1000, 0.5);
        }

        let dispatcher = Dispatcher::new(&registry, host_table, device_table);
        assert!(dispatcher.choose(1000).is_host());
    }

    #[test]
    fn test_area_many_on_host() {
        let registry = DeviceRegistry::detect();
        let mut dispatcher = Dispatcher::new(
            &registry,
            PerformanceTable::new("area_host_time"),
            PerformanceTable::new("area_device_time"),
        );

        let polygons = vec![triangle(), SimplePolygon::new(), triangle()];
        let areas = dispatcher.area_many(&polygons).unwrap();
        assert_eq!(areas.len(), 3);
        assert_relative_eq!(areas[0], 200.0);
        assert_relative_eq!(areas[1], 0.0);
        assert_relative_eq!(areas[2], 200.0);
    }
}
