// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the Apache-style license found in the
// LICENSE file in the root directory of this source tree.

use super::Operation;
use crate::backends::{DeviceArena, ResourceCache};
use crate::batch::DeviceBatch;
use crate::device::Device;
use crate::error::{PolyfluxError, Result};
use crate::geometry::SimplePolygon;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_WRITE_ONLY};
use opencl3::types::{cl_double, cl_ulong, CL_BLOCKING};
use std::ptr;

const WORD: usize = std::mem::size_of::<cl_ulong>();

/// Signed polygon area.
///
/// The host path is the shoelace formula over the polygon's own storage; the
/// device path runs one work item per polygon over the batch's flattened
/// sentinel-delimited vertex buffer.
pub struct Area;

/// Kernel walking one polygon per work item.
///
/// `data` holds vertex coordinate pairs with a two-word end marker after each
/// polygon; the per-polygon start offsets sit at `offset_base` words into the
/// same buffer, in the space the host reserved past the vertex data.
const AREA_KERNEL_SOURCE: &str = r#"
__kernel void polygon_area(__global const ulong* data,
                           const ulong offset_base,
                           __global double* areas) {
    const ulong sentinel = (ulong)(-1);
    const size_t gid = get_global_id(0);
    const ulong start = data[offset_base + gid];

    double doubled = 0.0;
    ulong i = start;
    while(!(data[i] == sentinel && data[i + 1] == sentinel)) {
        ulong j = i + 2;
        if(data[j] == sentinel && data[j + 1] == sentinel) {
            j = start;
        }
        doubled += (double)((long)data[i]) * (double)((long)data[j + 1])
                 - (double)((long)data[j]) * (double)((long)data[i + 1]);
        i += 2;
    }
    areas[gid] = doubled / 2.0;
}
"#;

impl Area {
    #[inline(always)]
    pub fn kernel_source(&self) -> &'static str {
        AREA_KERNEL_SOURCE
    }
}

impl Operation for Area {
    type Output = f64;

    #[inline(always)]
    fn name(&self) -> &str {
        "area"
    }

    fn run_host(&self, polygon: &SimplePolygon) -> f64 {
        polygon.area()
    }

    fn run_batch_device(
        &self,
        cache: &mut ResourceCache,
        device: Device,
        batch: &mut DeviceBatch<'_>,
    ) -> Result<Vec<f64>> {
        let count = batch.count();
        if count == 0 {
            return Ok(Vec::new());
        }

        // Upload the vertex data, reserving overhead space for the offset
        // table behind it.
        let offsets = batch.word_offsets();
        let overhead_bytes = (offsets.len() * WORD) as u64;
        {
            let mut arena = DeviceArena::new(cache);
            batch.load(&mut arena, device, overhead_bytes)?;
        }

        let kernel = {
            let program = cache.compile(device, AREA_KERNEL_SOURCE)?;
            Kernel::create(program, "polygon_area").map_err(|e| {
                PolyfluxError::backend_error("OpenCL", format!("Failed to create kernel: {}", e))
            })?
        };
        let results_buffer = {
            let context = cache.context(device)?;
            unsafe {
                Buffer::<cl_double>::create(context, CL_MEM_WRITE_ONLY, count, ptr::null_mut())
            }
            .map_err(|e| {
                PolyfluxError::memory_error(format!("Failed to create result buffer: {}", e))
            })?
        };

        let footprint = batch.memory_footprint();
        let offset_base = (footprint / WORD as u64) as cl_ulong;
        let queue = cache.queue(device)?;
        let buffer = batch
            .loaded_mut(device)
            .ok_or_else(|| PolyfluxError::device_error("Batch lost its device buffer"))?;

        unsafe {
            queue.enqueue_write_buffer(buffer, CL_BLOCKING, footprint as usize, &offsets, &[])
        }
        .map_err(|e| {
            PolyfluxError::memory_error(format!("Failed to write offset table: {}", e))
        })?;

        let kernel_event = unsafe {
            ExecuteKernel::new(&kernel)
                .set_arg(buffer)
                .set_arg(&offset_base)
                .set_arg(&results_buffer)
                .set_global_work_size(count)
                .enqueue_nd_range(queue)
        }
        .map_err(|e| {
            PolyfluxError::backend_error("OpenCL", format!("Failed to enqueue kernel: {}", e))
        })?;
        kernel_event.wait().map_err(|e| {
            PolyfluxError::backend_error(
                "OpenCL",
                format!("Failed to wait for kernel completion: {}", e),
            )
        })?;

        let mut results = vec![0.0f64; count];
        unsafe { queue.enqueue_read_buffer(&results_buffer, CL_BLOCKING, 0, &mut results, &[]) }
            .map_err(|e| {
                PolyfluxError::memory_error(format!("Failed to read result buffer: {}", e))
            })?;
        Ok(results)
    }
}
