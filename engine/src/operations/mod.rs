// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

pub mod area;

pub use area::Area;

use crate::backends::ResourceCache;
use crate::batch::DeviceBatch;
use crate::device::Device;
use crate::error::{PolyfluxError, Result};
use crate::geometry::SimplePolygon;

/// A geometric operation that can run on the host or on a compute device.
///
/// Implementations must be free of global side effects: the profiler invokes
/// them many times purely for timing.
pub trait Operation {
    type Output;

    /// Name of the operation, used to key benchmark tables
    fn name(&self) -> &str;

    /// Executes on the host CPU
    fn run_host(&self, polygon: &SimplePolygon) -> Self::Output;

    /// Executes on `device` over a whole batch, one result per polygon.
    ///
    /// The batch is loaded onto the device as part of the call; a previously
    /// loaded buffer for the same device is replaced.
    fn run_batch_device(
        &self,
        cache: &mut ResourceCache,
        device: Device,
        batch: &mut DeviceBatch<'_>,
    ) -> Result<Vec<Self::Output>>;

    /// Executes on `device` for a single polygon
    fn run_device(
        &self,
        cache: &mut ResourceCache,
        device: Device,
        polygon: &SimplePolygon,
    ) -> Result<Self::Output> {
        let polygons = std::slice::from_ref(polygon);
        let mut batch = DeviceBatch::new(polygons);
        let mut results = self.run_batch_device(cache, device, &mut batch)?;
        results
            .pop()
            .ok_or_else(|| PolyfluxError::backend_error("OpenCL", "Device returned no result"))
    }
}
