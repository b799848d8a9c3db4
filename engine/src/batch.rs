// Copyright (c) 2026 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use crate::backends::BufferArena;
use crate::device::Device;
use crate::error::Result;
use crate::geometry::SimplePolygon;
use opencl3::memory::Buffer;
use opencl3::types::cl_ulong;
use rustc_hash::FxHashMap;

/// Serialized size of one vertex: two coordinate words
pub const VERTEX_UNIT: u64 = (std::mem::size_of::<cl_ulong>() * 2) as u64;

/// End-of-polygon marker written after each polygon's vertices.
///
/// Device-side processing scans for a vertex whose both words equal this
/// value to detect polygon boundaries within the flattened buffer.
pub const SENTINEL: cl_ulong = cl_ulong::MAX;

const WORD: usize = std::mem::size_of::<cl_ulong>();

/// A contiguous, ordered range over a caller-owned polygon collection,
/// prepared for transfer to compute devices.
///
/// The batch holds a view over the polygons, not a copy. Its memory
/// footprint is `(vertex_count + 1) × VERTEX_UNIT` bytes per polygon; the
/// `+1` reserves the end-marker sentinel.
///
/// The buffer type `B` is generic so that tests can substitute a mock for
/// the OpenCL buffer; see [`DeviceBatch`] for the production alias.
pub struct PolygonBatch<'p, B = Buffer<cl_ulong>> {
    polygons: &'p [SimplePolygon],
    start: usize,
    end: usize,
    total_vertices: usize,
    subbatches: Vec<PolygonBatch<'p, B>>,
    loaded: FxHashMap<Device, B>,
}

/// A batch holding real OpenCL buffers once loaded
pub type DeviceBatch<'p> = PolygonBatch<'p, Buffer<cl_ulong>>;

impl<'p, B> PolygonBatch<'p, B> {
    /// Creates a batch spanning the whole collection
    pub fn new(polygons: &'p [SimplePolygon]) -> Self {
        Self::range(polygons, 0, polygons.len())
    }

    fn range(polygons: &'p [SimplePolygon], start: usize, end: usize) -> Self {
        let total_vertices = polygons[start..end].iter().map(SimplePolygon::len).sum();
        Self {
            polygons,
            start,
            end,
            total_vertices,
            subbatches: Vec::new(),
            loaded: FxHashMap::default(),
        }
    }

    /// Number of polygons in this batch
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.end - self.start
    }

    /// Sum of the vertex counts of all polygons in this batch
    #[inline(always)]
    pub fn total_vertices(&self) -> usize {
        self.total_vertices
    }

    /// The polygons this batch spans
    #[inline(always)]
    pub fn polygons(&self) -> &'p [SimplePolygon] {
        &self.polygons[self.start..self.end]
    }

    /// Bytes of device memory this batch occupies when serialized
    pub fn memory_footprint(&self) -> u64 {
        (self.total_vertices + self.count()) as u64 * VERTEX_UNIT
    }

    /// The current partition, empty when the batch is used whole
    #[inline(always)]
    pub fn subbatches(&self) -> &[PolygonBatch<'p, B>] {
        &self.subbatches
    }

    #[inline(always)]
    pub fn subbatches_mut(&mut self) -> &mut [PolygonBatch<'p, B>] {
        &mut self.subbatches
    }

    /// Partitions this batch into contiguous sub-batches that each fit in
    /// `maximum_memory` bytes.
    ///
    /// Returns `false` if any single polygon's footprint alone exceeds the
    /// budget, wherever it sits in the range; the batch then ends with no
    /// sub-batches and is otherwise unmodified. Polygons are never split and
    /// never reordered, so the greedy left-to-right partition is the fewest
    /// contiguous sub-batches possible.
    ///
    /// Every call recomputes the partition from scratch, discarding the
    /// previous one. If the whole range fits, the partition stays empty and
    /// the batch is used as-is. Sub-batches are plain ranges; call
    /// `ensure_fit` on a child if it must be split further.
    pub fn ensure_fit(&mut self, maximum_memory: u64) -> bool {
        self.subbatches.clear();

        if self
            .polygons()
            .iter()
            .any(|polygon| polygon_footprint(polygon) > maximum_memory)
        {
            return false;
        }
        if self.memory_footprint() <= maximum_memory {
            return true;
        }

        let mut sub_start = self.start;
        let mut subtotal = 0u64;
        for index in self.start..self.end {
            let footprint = polygon_footprint(&self.polygons[index]);
            if subtotal + footprint > maximum_memory {
                self.subbatches
                    .push(Self::range(self.polygons, sub_start, index));
                sub_start = index;
                subtotal = 0;
            }
            subtotal += footprint;
        }
        self.subbatches
            .push(Self::range(self.polygons, sub_start, self.end));
        true
    }

    /// Serializes the range into coordinate words, one sentinel vertex after
    /// each polygon
    pub fn serialize(&self) -> Vec<cl_ulong> {
        let mut words = Vec::with_capacity((self.memory_footprint() / WORD as u64) as usize);
        for polygon in self.polygons() {
            for vertex in polygon.vertices() {
                words.push(vertex.x as cl_ulong);
                words.push(vertex.y as cl_ulong);
            }
            words.push(SENTINEL);
            words.push(SENTINEL);
        }
        words
    }

    /// Start offset of each polygon within the serialized buffer, in words
    pub fn word_offsets(&self) -> Vec<cl_ulong> {
        let mut offsets = Vec::with_capacity(self.count());
        let mut offset = 0;
        for polygon in self.polygons() {
            offsets.push(offset);
            offset += (polygon.len() as cl_ulong + 1) * 2;
        }
        offsets
    }

    /// Uploads this batch's serialized vertex data to `device`.
    ///
    /// The buffer is sized to the batch's footprint plus `overhead_bytes` of
    /// space the caller reserves for auxiliary per-call data. On success the
    /// buffer replaces any prior buffer for the same device; on failure the
    /// loaded state, including entries for other devices, is untouched.
    pub fn load<A>(&mut self, arena: &mut A, device: Device, overhead_bytes: u64) -> Result<()>
    where
        A: BufferArena<Buffer = B>,
    {
        let words = self.serialize();
        let capacity_words = words.len() + (overhead_bytes as usize).div_ceil(WORD);
        let buffer = arena.upload(device, &words, capacity_words)?;
        self.loaded.insert(device, buffer);
        Ok(())
    }

    /// The device-side buffer currently holding this batch, if loaded
    #[inline(always)]
    pub fn loaded(&self, device: Device) -> Option<&B> {
        self.loaded.get(&device)
    }

    #[inline(always)]
    pub fn loaded_mut(&mut self, device: Device) -> Option<&mut B> {
        self.loaded.get_mut(&device)
    }
}

#[inline(always)]
fn polygon_footprint(polygon: &SimplePolygon) -> u64 {
    (polygon.len() as u64 + 1) * VERTEX_UNIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolyfluxError;

    /// Stand-in for a device buffer, recording its requested capacity
    #[derive(Debug, PartialEq, Eq)]
    struct MockBuffer {
        capacity_words: usize,
    }

    /// Arena that records uploads instead of touching a driver
    #[derive(Default)]
    struct MockArena {
        fail: bool,
        uploads: Vec<(Device, usize, usize)>,
    }

    impl BufferArena for MockArena {
        type Buffer = MockBuffer;

        fn upload(
            &mut self,
            device: Device,
            words: &[cl_ulong],
            capacity_words: usize,
        ) -> crate::error::Result<MockBuffer> {
            if self.fail {
                return Err(PolyfluxError::memory_error("mock allocation failure"));
            }
            self.uploads.push((device, words.len(), capacity_words));
            Ok(MockBuffer { capacity_words })
        }
    }

    type MockBatch<'p> = PolygonBatch<'p, MockBuffer>;

    fn triangle() -> SimplePolygon {
        let mut polygon = SimplePolygon::new();
        polygon.push(0, 0);
        polygon.push(20, 0);
        polygon.push(10, 20);
        polygon
    }

    fn ngon(vertices: usize) -> SimplePolygon {
        let mut polygon = SimplePolygon::new();
        for _ in 0..vertices {
            polygon.push(0, 0);
        }
        polygon
    }

    fn ten_triangles() -> Vec<SimplePolygon> {
        vec![triangle(); 10]
    }

    fn counts(batch: &MockBatch) -> Vec<usize> {
        batch.subbatches().iter().map(|sub| sub.count()).collect()
    }

    #[test]
    fn test_count_empty() {
        let polygons: Vec<SimplePolygon> = Vec::new();
        let batch = MockBatch::new(&polygons);
        assert_eq!(batch.count(), 0);
        assert_eq!(batch.total_vertices(), 0);
        assert_eq!(batch.memory_footprint(), 0);
    }

    #[test]
    fn test_count_ten() {
        let polygons = ten_triangles();
        let batch = MockBatch::new(&polygons);
        assert_eq!(batch.count(), 10);
        assert_eq!(batch.total_vertices(), 30);
        // One extra vertex unit per polygon for the sentinel.
        assert_eq!(batch.memory_footprint(), 40 * VERTEX_UNIT);
    }

    #[test]
    fn test_ensure_fit_empty() {
        let polygons: Vec<SimplePolygon> = Vec::new();
        let mut batch = MockBatch::new(&polygons);

        assert!(batch.ensure_fit(100));
        assert!(batch.subbatches().is_empty());

        assert!(batch.ensure_fit(0));
        assert!(batch.subbatches().is_empty());
    }

    #[test]
    fn test_ensure_fit_already_fits() {
        let polygons = ten_triangles();
        let mut batch = MockBatch::new(&polygons);

        // Fits comfortably.
        assert!(batch.ensure_fit(40 * VERTEX_UNIT + 100));
        assert!(batch.subbatches().is_empty());

        // Fits exactly.
        assert!(batch.ensure_fit(40 * VERTEX_UNIT));
        assert!(batch.subbatches().is_empty());
    }

    #[test]
    fn test_ensure_fit_split_in_two() {
        let polygons = ten_triangles();
        let mut batch = MockBatch::new(&polygons);

        // Needs 40 vertex units; 30 is too little. Each triangle takes 4
        // units, so 7 fit in the first sub-batch.
        assert!(batch.ensure_fit(30 * VERTEX_UNIT));
        assert_eq!(counts(&batch), vec![7, 3]);
        assert_eq!(batch.subbatches()[0].total_vertices(), 21);
        assert_eq!(batch.subbatches()[1].total_vertices(), 9);
    }

    #[test]
    fn test_ensure_fit_split_in_five() {
        let polygons = ten_triangles();
        let mut batch = MockBatch::new(&polygons);

        // Fits 2 triangles per sub-batch, exactly.
        assert!(batch.ensure_fit(8 * VERTEX_UNIT));
        assert_eq!(counts(&batch), vec![2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_ensure_fit_uneven_sizes() {
        let polygons = vec![ngon(10), triangle(), triangle(), ngon(13)];
        let mut batch = MockBatch::new(&polygons);

        // Fits one large polygon or multiple triangles.
        assert!(batch.ensure_fit(14 * VERTEX_UNIT));
        assert_eq!(counts(&batch), vec![1, 2, 1]);
        assert_eq!(batch.subbatches()[0].total_vertices(), 10);
        assert_eq!(batch.subbatches()[1].total_vertices(), 6);
        assert_eq!(batch.subbatches()[2].total_vertices(), 13);
    }

    #[test]
    fn test_ensure_fit_rebatch() {
        let polygons = ten_triangles();
        let mut batch = MockBatch::new(&polygons);

        assert!(batch.ensure_fit(20 * VERTEX_UNIT));
        assert_eq!(counts(&batch), vec![5, 5]);

        // A smaller budget discards the old partition entirely.
        assert!(batch.ensure_fit(8 * VERTEX_UNIT));
        assert_eq!(counts(&batch), vec![2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_ensure_fit_too_big() {
        // First polygon doesn't fit: it needs 11 vertex units, one being the
        // end marker.
        let polygons = vec![ngon(10)];
        let mut batch = MockBatch::new(&polygons);
        assert!(!batch.ensure_fit(10 * VERTEX_UNIT));
        assert!(batch.subbatches().is_empty());

        // Last polygon doesn't fit.
        let polygons = vec![ngon(10), ngon(20)];
        let mut batch = MockBatch::new(&polygons);
        assert!(!batch.ensure_fit(15 * VERTEX_UNIT));
        assert!(batch.subbatches().is_empty());

        // Second polygon doesn't fit, even though the last one does.
        let polygons = vec![ngon(10), ngon(20), triangle()];
        let mut batch = MockBatch::new(&polygons);
        assert!(!batch.ensure_fit(15 * VERTEX_UNIT));
        assert!(batch.subbatches().is_empty());
    }

    #[test]
    fn test_ensure_fit_failure_discards_previous_partition() {
        let polygons = vec![triangle(), triangle(), ngon(30)];
        let mut batch = MockBatch::new(&polygons);

        assert!(batch.ensure_fit(31 * VERTEX_UNIT));
        assert!(!batch.subbatches().is_empty());

        // The big polygon no longer fits; the old partition must not leak.
        assert!(!batch.ensure_fit(16 * VERTEX_UNIT));
        assert!(batch.subbatches().is_empty());
    }

    #[test]
    fn test_serialize_layout() {
        let polygons = vec![triangle()];
        let batch = MockBatch::new(&polygons);
        let words = batch.serialize();

        assert_eq!(words.len(), 8);
        assert_eq!(&words[0..6], &[0, 0, 20, 0, 10, 20]);
        assert_eq!(&words[6..8], &[SENTINEL, SENTINEL]);
    }

    #[test]
    fn test_word_offsets() {
        let polygons = vec![triangle(), ngon(2), triangle()];
        let batch = MockBatch::new(&polygons);
        // Each polygon occupies (vertices + 1) * 2 words.
        assert_eq!(batch.word_offsets(), vec![0, 8, 14]);
    }

    #[test]
    fn test_load_sizes_buffer_with_overhead() {
        let polygons = ten_triangles();
        let mut batch = MockBatch::new(&polygons);
        let mut arena = MockArena::default();
        let device = Device::Host;

        batch.load(&mut arena, device, 100).unwrap();

        // 40 vertex units of payload is 80 words; 100 bytes of overhead
        // round up to 13 words.
        assert_eq!(arena.uploads, vec![(device, 80, 93)]);
        assert_eq!(batch.loaded(device).unwrap().capacity_words, 93);
    }

    #[test]
    fn test_load_replaces_only_this_device() {
        let polygons = vec![triangle()];
        let mut batch = MockBatch::new(&polygons);
        let mut arena = MockArena::default();
        let host = Device::Host;
        let gpu = Device::OpenCl(0x10 as opencl3::types::cl_device_id);

        batch.load(&mut arena, host, 0).unwrap();
        batch.load(&mut arena, gpu, 8).unwrap();
        assert_eq!(batch.loaded(host).unwrap().capacity_words, 8);
        assert_eq!(batch.loaded(gpu).unwrap().capacity_words, 9);

        // Reloading one device leaves the other entry untouched.
        batch.load(&mut arena, gpu, 16).unwrap();
        assert_eq!(batch.loaded(gpu).unwrap().capacity_words, 10);
        assert_eq!(batch.loaded(host).unwrap().capacity_words, 8);

        // A failed load changes nothing.
        arena.fail = true;
        assert!(batch.load(&mut arena, host, 64).is_err());
        assert_eq!(batch.loaded(host).unwrap().capacity_words, 8);
    }
}
