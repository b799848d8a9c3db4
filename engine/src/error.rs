// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, PolyfluxError>;

/// All errors raised by this library.
///
/// Callers can match on `InvalidArgument` to separate misuse of the public
/// surface from hardware and driver failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolyfluxError {
    /// An argument passed to a public function was invalid
    InvalidArgument { message: String },
    /// Memory allocation or transfer failed
    MemoryError { message: String },
    /// A compute backend reported a failure
    BackendError { backend: String, message: String },
    /// A device could not be queried or used
    DeviceError { message: String },
}

impl PolyfluxError {
    #[inline(always)]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[inline(always)]
    pub fn memory_error(message: impl Into<String>) -> Self {
        Self::MemoryError {
            message: message.into(),
        }
    }

    #[inline(always)]
    pub fn backend_error(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendError {
            backend: backend.into(),
            message: message.into(),
        }
    }

    #[inline(always)]
    pub fn device_error(message: impl Into<String>) -> Self {
        Self::DeviceError {
            message: message.into(),
        }
    }
}

impl fmt::Display for PolyfluxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { message } => write!(f, "Invalid argument: {}", message),
            Self::MemoryError { message } => write!(f, "Memory error: {}", message),
            Self::BackendError { backend, message } => {
                write!(f, "{} backend error: {}", backend, message)
            }
            Self::DeviceError { message } => write!(f, "Device error: {}", message),
        }
    }
}

impl std::error::Error for PolyfluxError {}
