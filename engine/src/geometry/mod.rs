// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

pub mod point;
pub mod polygon;

pub use point::{Coord, Point2};
pub use polygon::SimplePolygon;
