// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use super::point::{Coord, Point2};
use rayon::prelude::*;

/// Above this vertex count the host area computation switches to rayon
const PARALLEL_THRESHOLD: usize = 10_000;

/// A simple polygon: a closed loop of vertices without self-intersections.
///
/// The winding order determines the sign of the area: counter-clockwise
/// polygons have positive area, clockwise polygons negative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimplePolygon {
    vertices: Vec<Point2>,
}

impl SimplePolygon {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub fn push(&mut self, x: Coord, y: Coord) {
        self.vertices.push(Point2::new(x, y));
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline(always)]
    pub fn vertices(&self) -> &[Point2] {
        &self.vertices
    }

    /// Signed area via the shoelace formula.
    ///
    /// Runs serially for small polygons and in parallel over rayon for large
    /// ones. This is the host execution path of the area operation.
    pub fn area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }

        let cross = |i: usize| -> i128 {
            let current = self.vertices[i];
            let next = self.vertices[(i + 1) % n];
            current.x as i128 * next.y as i128 - next.x as i128 * current.y as i128
        };

        let doubled: i128 = if n < PARALLEL_THRESHOLD {
            (0..n).map(cross).sum()
        } else {
            (0..n).into_par_iter().map(cross).sum()
        };
        doubled as f64 / 2.0
    }

    /// Constructs a regular n-gon with the given number of vertices.
    ///
    /// Used as the representative input for benchmarks, since construction is
    /// linear in the vertex count.
    pub fn regular_ngon(size: usize) -> Self {
        const RADIUS: f64 = 1_000_000.0;
        let mut polygon = Self::with_capacity(size);
        for vertex in 0..size {
            let angle = 2.0 * std::f64::consts::PI * vertex as f64 / size as f64;
            polygon.push(
                (RADIUS * angle.cos()).round() as Coord,
                (RADIUS * angle.sin()).round() as Coord,
            );
        }
        polygon
    }
}

impl From<Vec<Point2>> for SimplePolygon {
    fn from(vertices: Vec<Point2>) -> Self {
        Self { vertices }
    }
}
