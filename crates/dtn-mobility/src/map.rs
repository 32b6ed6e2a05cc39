//! Planar road map for map-based movement.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format for outgoing edges.
//! Given a `VertexId v`, its outgoing edges occupy the slice:
//!
//! ```text
//! edge_to[ out_start[v] .. out_start[v+1] ]
//! ```
//!
//! Edge arrays are sorted by source vertex (then target, for a stable
//! neighbour order) and indexed by `EdgeId`.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps a `Coord` to the nearest `VertexId`.  Used to
//! place nodes on the map and to recover the vertex a node stopped at.
//!
//! # Shortest paths
//!
//! Dijkstra over edge lengths, with costs in integer millimetres so ties are
//! exact.  The heap is keyed `(cost, vertex)`, so equal-cost alternatives are
//! always resolved the same way.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::Read;

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::Deserialize;

use dtn_core::{Coord, EdgeId, VertexId};

use crate::{MobilityError, MobilityResult};

// ── R-tree vertex entry ───────────────────────────────────────────────────────

#[derive(Clone)]
struct VertexEntry {
    point: [f64; 2],
    id:    VertexId,
}

impl RTreeObject for VertexEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for VertexEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── MapGraph ──────────────────────────────────────────────────────────────────

/// Directed planar graph in CSR format plus a spatial index.
///
/// Build with [`MapGraphBuilder`].
pub struct MapGraph {
    /// Position of each vertex.  Indexed by `VertexId`.
    pub vertex_pos: Vec<Coord>,

    /// CSR row pointer, length `vertex_count + 1`.
    pub out_start: Vec<u32>,

    pub edge_from: Vec<VertexId>,
    pub edge_to:   Vec<VertexId>,

    /// Euclidean length of each edge in metres.
    pub edge_length: Vec<f64>,

    spatial_idx: RTree<VertexEntry>,
}

/// A shortest path: the vertices visited in order (source and target
/// included) and the total length in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRoute {
    pub vertices: Vec<VertexId>,
    pub length:   f64,
}

impl MapGraph {
    pub fn vertex_count(&self) -> usize {
        self.vertex_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_pos.is_empty()
    }

    #[inline]
    pub fn position(&self, v: VertexId) -> Coord {
        self.vertex_pos[v.index()]
    }

    /// Iterator over the `EdgeId`s of all outgoing edges from `v`.
    #[inline]
    pub fn out_edges(&self, v: VertexId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.out_start[v.index()] as usize;
        let end   = self.out_start[v.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    #[inline]
    pub fn out_degree(&self, v: VertexId) -> usize {
        (self.out_start[v.index() + 1] - self.out_start[v.index()]) as usize
    }

    /// The vertex nearest to `pos`, or `None` for an empty map.
    pub fn snap(&self, pos: Coord) -> Option<VertexId> {
        self.spatial_idx.nearest_neighbor(&[pos.x, pos.y]).map(|e| e.id)
    }

    /// Shortest path from `from` to `to` by length.
    ///
    /// # Errors
    ///
    /// [`MobilityError::NoRoute`] if `to` is unreachable.
    pub fn shortest_path(&self, from: VertexId, to: VertexId) -> MobilityResult<MapRoute> {
        if from == to {
            return Ok(MapRoute { vertices: vec![from], length: 0.0 });
        }

        let n = self.vertex_count();
        let mut dist      = vec![u64::MAX; n];
        let mut prev_edge = vec![EdgeId::INVALID; n];
        dist[from.index()] = 0;

        let mut heap: BinaryHeap<Reverse<(u64, VertexId)>> = BinaryHeap::new();
        heap.push(Reverse((0, from)));

        while let Some(Reverse((cost, v))) = heap.pop() {
            if v == to {
                return Ok(self.reconstruct(&prev_edge, to));
            }
            if cost > dist[v.index()] {
                continue;
            }
            for e in self.out_edges(v) {
                let next     = self.edge_to[e.index()];
                let new_cost = cost.saturating_add(length_mm(self.edge_length[e.index()]));
                if new_cost < dist[next.index()] {
                    dist[next.index()]      = new_cost;
                    prev_edge[next.index()] = e;
                    heap.push(Reverse((new_cost, next)));
                }
            }
        }

        Err(MobilityError::NoRoute { from, to })
    }

    fn reconstruct(&self, prev_edge: &[EdgeId], to: VertexId) -> MapRoute {
        let mut vertices = vec![to];
        let mut length   = 0.0;
        let mut cur      = to;
        loop {
            let e = prev_edge[cur.index()];
            if e == EdgeId::INVALID {
                break;
            }
            length += self.edge_length[e.index()];
            cur = self.edge_from[e.index()];
            vertices.push(cur);
        }
        vertices.reverse();
        MapRoute { vertices, length }
    }
}

#[inline]
fn length_mm(metres: f64) -> u64 {
    (metres * 1_000.0).round().max(0.0) as u64
}

// ── MapGraphBuilder ───────────────────────────────────────────────────────────

/// Construct a [`MapGraph`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use dtn_core::Coord;
/// use dtn_mobility::MapGraphBuilder;
///
/// let mut b = MapGraphBuilder::new();
/// let a = b.add_vertex(Coord::new(0.0, 0.0));
/// let c = b.add_vertex(Coord::new(30.0, 40.0));
/// b.add_road(a, c);
/// let map = b.build();
/// assert_eq!(map.vertex_count(), 2);
/// assert_eq!(map.edge_count(), 2);
/// assert_eq!(map.edge_length[0], 50.0);
/// ```
#[derive(Default)]
pub struct MapGraphBuilder {
    vertices:  Vec<Coord>,
    raw_edges: Vec<(VertexId, VertexId)>,
}

impl MapGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its id (sequential from 0).
    pub fn add_vertex(&mut self, pos: Coord) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(pos);
        id
    }

    /// Return the vertex at exactly `pos`, adding it if absent.  Linear scan;
    /// meant for loaders that see shared segment endpoints.
    pub fn vertex_at(&mut self, pos: Coord) -> VertexId {
        match self.vertices.iter().position(|&p| p == pos) {
            Some(i) => VertexId(i as u32),
            None    => self.add_vertex(pos),
        }
    }

    pub fn add_directed_edge(&mut self, from: VertexId, to: VertexId) {
        self.raw_edges.push((from, to));
    }

    /// Add edges in both directions.
    pub fn add_road(&mut self, a: VertexId, b: VertexId) {
        self.add_directed_edge(a, b);
        self.add_directed_edge(b, a);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Consume the builder and produce a [`MapGraph`].
    pub fn build(self) -> MapGraph {
        let n = self.vertices.len();

        let mut raw = self.raw_edges;
        raw.sort_unstable();
        raw.dedup();

        let edge_from: Vec<VertexId> = raw.iter().map(|e| e.0).collect();
        let edge_to:   Vec<VertexId> = raw.iter().map(|e| e.1).collect();
        let edge_length: Vec<f64> = raw
            .iter()
            .map(|&(a, b)| self.vertices[a.index()].distance(self.vertices[b.index()]))
            .collect();

        let mut out_start = vec![0u32; n + 1];
        for (from, _) in &raw {
            out_start[from.index() + 1] += 1;
        }
        for i in 1..=n {
            out_start[i] += out_start[i - 1];
        }

        let entries: Vec<VertexEntry> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, p)| VertexEntry { point: [p.x, p.y], id: VertexId(i as u32) })
            .collect();

        MapGraph {
            vertex_pos: self.vertices,
            out_start,
            edge_from,
            edge_to,
            edge_length,
            spatial_idx: RTree::bulk_load(entries),
        }
    }
}

// ── CSV loader ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SegmentRecord {
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
}

/// Load an undirected map from CSV rows of road segments.
///
/// ```csv
/// ax,ay,bx,by
/// 0,0,100,0
/// 100,0,100,100
/// ```
///
/// Segments sharing an exact endpoint coordinate share a vertex.
pub fn load_segments_reader<R: Read>(reader: R) -> MobilityResult<MapGraph> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut b = MapGraphBuilder::new();
    for row in csv_reader.deserialize::<SegmentRecord>() {
        let row = row?;
        let a = b.vertex_at(Coord::new(row.ax, row.ay));
        let c = b.vertex_at(Coord::new(row.bx, row.by));
        if a != c {
            b.add_road(a, c);
        }
    }
    if b.vertex_count() == 0 {
        return Err(MobilityError::EmptyMap);
    }
    Ok(b.build())
}

/// Like [`load_segments_reader`] but from a file path.
pub fn load_segments_csv(path: &std::path::Path) -> MobilityResult<MapGraph> {
    load_segments_reader(std::fs::File::open(path)?)
}
