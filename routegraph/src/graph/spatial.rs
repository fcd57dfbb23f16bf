//! Uniform bucket grid over vertex positions.
//!
//! Keeps coincidence checks, padding expansion and hit testing proportional
//! to the queried area instead of the whole graph.

use std::collections::{BTreeSet, HashMap};

use super::VertexId;
use crate::geometry::Point;

pub const DEFAULT_CELL_SIZE: f64 = 16.0;

type Cell = (i64, i64);

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell: f64,
    buckets: HashMap<Cell, BTreeSet<VertexId>>,
    len: usize,
}

impl SpatialIndex {
    pub fn new(cell: f64) -> Self {
        let cell = if cell.is_finite() && cell > 0.0 {
            cell
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell,
            buckets: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    fn cell_of(&self, p: Point) -> Cell {
        ((p.x / self.cell).floor() as i64, (p.y / self.cell).floor() as i64)
    }

    pub fn insert(&mut self, id: VertexId, p: Point) {
        let cell = self.cell_of(p);
        if self.buckets.entry(cell).or_default().insert(id) {
            self.len += 1;
        }
    }

    pub fn remove(&mut self, id: VertexId, p: Point) {
        let cell = self.cell_of(p);
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            if bucket.remove(&id) {
                self.len -= 1;
            }
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
    }

    pub fn relocate(&mut self, id: VertexId, from: Point, to: Point) {
        if self.cell_of(from) != self.cell_of(to) {
            self.remove(id, from);
            self.insert(id, to);
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// Candidate ids whose cells intersect the square around `center`.
    /// Callers still filter by exact distance.
    pub fn candidates(&self, center: Point, radius: f64) -> BTreeSet<VertexId> {
        let radius = radius.max(0.0);
        let (x0, y0) = self.cell_of(Point::new(center.x - radius, center.y - radius));
        let (x1, y1) = self.cell_of(Point::new(center.x + radius, center.y + radius));
        let span = x1
            .saturating_sub(x0)
            .saturating_add(1)
            .saturating_mul(y1.saturating_sub(y0).saturating_add(1));

        // A huge query box is cheaper as a scan over the occupied buckets
        if span < 0 || span as usize > self.buckets.len() {
            return self
                .buckets
                .iter()
                .filter(|((cx, cy), _)| *cx >= x0 && *cx <= x1 && *cy >= y0 && *cy <= y1)
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect();
        }

        let mut out = BTreeSet::new();
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(bucket) = self.buckets.get(&(cx, cy)) {
                    out.extend(bucket.iter().copied());
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}
