// Copyright (c) 2026 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the Apache-style license found in the
// LICENSE file in the root directory of this source tree.

use super::BufferArena;
use crate::device::Device;
use crate::error::{PolyfluxError, Result};
use log::debug;
use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::Device as ClDevice;
use opencl3::memory::{Buffer, CL_MEM_READ_WRITE};
use opencl3::program::Program;
use opencl3::types::{cl_ulong, CL_BLOCKING};
use rustc_hash::FxHashMap;
use std::ptr;

/// Holds the OpenCL contexts and command queues so they don't have to be
/// recreated for every call, plus a cache of compiled programs so that no
/// kernel source is ever compiled twice for the same device.
///
/// One context and one queue exist per device, created lazily at first access
/// and kept until the cache is dropped. The maps only ever grow. Callers that
/// share a cache across threads must serialize access themselves; within the
/// engine all access is single-threaded.
pub struct ResourceCache {
    contexts: FxHashMap<Device, Context>,
    queues: FxHashMap<Device, CommandQueue>,
    programs: FxHashMap<(Device, String), Program>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            contexts: FxHashMap::default(),
            queues: FxHashMap::default(),
            programs: FxHashMap::default(),
        }
    }

    /// The long-lived execution context for `device`
    pub fn context(&mut self, device: Device) -> Result<&Context> {
        self.ensure_resources(device)?;
        self.contexts
            .get(&device)
            .ok_or_else(|| PolyfluxError::device_error("Context missing after creation"))
    }

    /// The long-lived command queue for `device`
    pub fn queue(&mut self, device: Device) -> Result<&CommandQueue> {
        self.ensure_resources(device)?;
        self.queues
            .get(&device)
            .ok_or_else(|| PolyfluxError::device_error("Command queue missing after creation"))
    }

    /// Compiles `source` for `device`, or returns the cached program if this
    /// exact pair has been compiled before.
    ///
    /// A compile failure is surfaced to the caller and not cached, so a later
    /// call with different source text is unaffected.
    pub fn compile(&mut self, device: Device, source: &str) -> Result<&Program> {
        let key = (device, source.to_string());
        if !self.programs.contains_key(&key) {
            self.ensure_resources(device)?;
            let context = self
                .contexts
                .get(&device)
                .ok_or_else(|| PolyfluxError::device_error("Context missing after creation"))?;
            debug!("compiling {} bytes of kernel source", source.len());
            let program =
                Program::create_and_build_from_source(context, source, "").map_err(|e| {
                    PolyfluxError::backend_error(
                        "OpenCL",
                        format!("Failed to build program: {}", e),
                    )
                })?;
            self.programs.insert(key.clone(), program);
        }
        self.programs
            .get(&key)
            .ok_or_else(|| PolyfluxError::backend_error("OpenCL", "Program cache lookup failed"))
    }

    fn ensure_resources(&mut self, device: Device) -> Result<()> {
        let id = device.id().ok_or_else(|| {
            PolyfluxError::invalid_argument("The host has no driver context or queue")
        })?;
        if self.contexts.contains_key(&device) {
            return Ok(());
        }

        let cl_device = ClDevice::new(id);
        let context = Context::from_device(&cl_device).map_err(|e| {
            PolyfluxError::backend_error("OpenCL", format!("Failed to create context: {}", e))
        })?;
        #[allow(deprecated)]
        let queue =
            CommandQueue::create_default(&context, CL_QUEUE_PROFILING_ENABLE).map_err(|e| {
                PolyfluxError::backend_error(
                    "OpenCL",
                    format!("Failed to create command queue: {}", e),
                )
            })?;

        self.contexts.insert(device, context);
        self.queues.insert(device, queue);
        Ok(())
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ResourceCache {
    /// Finalizes all command queues, so outstanding work completes before the
    /// contexts are released.
    fn drop(&mut self) {
        for queue in self.queues.values() {
            let _ = queue.finish();
        }
    }
}

/// Production [`BufferArena`]: allocates buffers in the device's context and
/// transfers the payload through the device's queue, blocking until the
/// transfer completes.
pub struct DeviceArena<'c> {
    cache: &'c mut ResourceCache,
}

impl<'c> DeviceArena<'c> {
    pub fn new(cache: &'c mut ResourceCache) -> Self {
        Self { cache }
    }
}

impl BufferArena for DeviceArena<'_> {
    type Buffer = Buffer<cl_ulong>;

    fn upload(
        &mut self,
        device: Device,
        words: &[cl_ulong],
        capacity_words: usize,
    ) -> Result<Buffer<cl_ulong>> {
        if capacity_words < words.len() {
            return Err(PolyfluxError::invalid_argument(
                "Buffer capacity is smaller than the payload",
            ));
        }

        let mut buffer = {
            let context = self.cache.context(device)?;
            // OpenCL rejects zero-sized buffers.
            unsafe {
                Buffer::<cl_ulong>::create(
                    context,
                    CL_MEM_READ_WRITE,
                    capacity_words.max(1),
                    ptr::null_mut(),
                )
            }
            .map_err(|e| {
                PolyfluxError::memory_error(format!("Failed to create OpenCL buffer: {}", e))
            })?
        };

        if !words.is_empty() {
            let queue = self.cache.queue(device)?;
            unsafe { queue.enqueue_write_buffer(&mut buffer, CL_BLOCKING, 0, words, &[]) }
                .map_err(|e| {
                    PolyfluxError::memory_error(format!(
                        "Failed to write to OpenCL buffer: {}",
                        e
                    ))
                })?;
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_has_no_context() {
        let mut cache = ResourceCache::new();
        assert!(matches!(
            cache.context(Device::Host),
            Err(PolyfluxError::InvalidArgument { .. })
        ));
        assert!(matches!(
            cache.queue(Device::Host),
            Err(PolyfluxError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_compile_caches_per_device_and_source() {
        let registry = crate::hardware::DeviceRegistry::detect();
        let Some(&device) = registry.all().first() else {
            println!("no OpenCL devices available, skipping test");
            return;
        };

        let mut cache = ResourceCache::new();
        let source = "__kernel void noop() {}";
        let first = match cache.compile(device, source) {
            Ok(program) => program.get() as usize,
            Err(_) => {
                println!("driver refused to compile, skipping test");
                return;
            }
        };
        // Second call with an equal pair must return the cached program.
        let second = cache.compile(device, source).map(|p| p.get() as usize);
        assert_eq!(second.ok(), Some(first));
    }

    #[test]
    fn test_compile_failure_is_not_cached() {
        let registry = crate::hardware::DeviceRegistry::detect();
        let Some(&device) = registry.all().first() else {
            println!("no OpenCL devices available, skipping test");
            return;
        };

        let mut cache = ResourceCache::new();
        assert!(cache.compile(device, "this is not OpenCL C").is_err());
        // A failed compile must not poison later calls with different source.
        assert!(cache.compile(device, "__kernel void noop() {}").is_ok());
    }
}
