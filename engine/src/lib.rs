// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

pub mod backends;
pub mod batch;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod hardware;
pub mod operations;
pub mod profiler;

// Re-export core types
pub use backends::{BufferArena, DeviceArena, ResourceCache};
pub use batch::{DeviceBatch, PolygonBatch, SENTINEL, VERTEX_UNIT};
pub use device::Device;
pub use dispatch::Dispatcher;
pub use error::{PolyfluxError, Result};
pub use geometry::{Coord, Point2, SimplePolygon};
pub use hardware::{DeviceRegistry, DeviceStatistics};
pub use operations::{Area, Operation};
pub use profiler::{PerformanceTable, PolygonBenchmark};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
