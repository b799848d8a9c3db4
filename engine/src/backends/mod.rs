// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the Apache-style license found in the
// LICENSE file in the root directory of this source tree.

pub mod opencl;

pub use opencl::{DeviceArena, ResourceCache};

use crate::device::Device;
use crate::error::Result;
use opencl3::types::cl_ulong;

/// Capability interface for uploading serialized polygon data to a device.
///
/// This is the seam between the batching logic and the driver: production
/// code goes through [`DeviceArena`], tests substitute an arena that records
/// uploads instead of talking to hardware. The buffer type is whatever the
/// arena hands back; batches store it keyed by device.
pub trait BufferArena {
    type Buffer;

    /// Allocates a buffer of `capacity_words` words on `device` and writes
    /// `words` into its start.
    ///
    /// `capacity_words` may exceed `words.len()`; the surplus is space the
    /// caller reserved for auxiliary per-call data.
    fn upload(
        &mut self,
        device: Device,
        words: &[cl_ulong],
        capacity_words: usize,
    ) -> Result<Self::Buffer>;
}
