// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use opencl3::types::cl_device_id;
use std::hash::{Hash, Hasher};

/// A compute target: either the host CPU or one OpenCL device.
///
/// The host is a distinguished variant rather than a null handle, so it is a
/// valid key in every device-keyed map. Equality and hashing are defined over
/// the native device handle only, never over derived fields such as display
/// names, so two lookups of the same physical device always collide.
#[derive(Clone, Copy, Debug)]
pub enum Device {
    /// The host CPU, executing without a driver
    Host,
    /// An OpenCL device, identified by its native handle
    OpenCl(cl_device_id),
}

// cl_device_id is an opaque pointer owned by the driver; it is never
// dereferenced on our side.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

impl Device {
    #[inline(always)]
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }

    /// The native handle, or `None` for the host
    #[inline(always)]
    pub fn id(&self) -> Option<cl_device_id> {
        match self {
            Self::Host => None,
            Self::OpenCl(id) => Some(*id),
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host, Self::Host) => true,
            (Self::OpenCl(a), Self::OpenCl(b)) => *a as usize == *b as usize,
            _ => false,
        }
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Host => {
                0u8.hash(state);
            }
            Self::OpenCl(id) => {
                1u8.hash(state);
                (*id as usize).hash(state);
            }
        }
    }
}
