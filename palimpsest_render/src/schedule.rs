// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-tile recomposite jobs, batched so that each batch only reads tiles
//! produced by earlier batches.
//!
//! A node's tile reads the tiles of its children (masks included) that
//! intersect the tile grown by the node's processing margin. An adjustment
//! layer additionally reads the layers stacked below it. Jobs are grouped
//! by topological level; jobs inside one batch touch disjoint
//! `(node, tile)` pairs and run in parallel on the `rayon` pool.

use std::collections::BTreeMap;
use std::ops::Range;

use kurbo::Rect;
use palimpsest_core::node::{NodeGraph, NodeId, NodeKind};
use palimpsest_core::rect::RectExt;
use palimpsest_core::tile::{TileCoord, tile_rect, tiles_covering};
use palimpsest_core::walker::WalkResult;
use rayon::prelude::*;

/// Recomputes one tile of one node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileJob {
    /// Node whose output is recomputed.
    pub node: NodeId,
    /// Tile of the node's output.
    pub tile: TileCoord,
    /// Part of the tile inside the node's change rect.
    pub rect: Rect,
}

/// Tile jobs of one walk, grouped into dependency levels.
#[derive(Clone, Debug)]
pub struct TileSchedule {
    tile_size: u32,
    batches: Vec<Vec<TileJob>>,
}

impl TileSchedule {
    /// Splits every change rect of `walk` into tile jobs and orders them.
    ///
    /// Nodes destroyed since the walk ran are left out. Follow-up walks are
    /// scheduled separately, after this one.
    ///
    /// # Panics
    ///
    /// Panics if `tile_size` is zero.
    #[must_use]
    pub fn from_walk(graph: &NodeGraph, walk: &WalkResult, tile_size: u32) -> Self {
        assert!(tile_size > 0, "tile size must be non-zero");

        let mut jobs = Vec::new();
        let mut by_node: BTreeMap<NodeId, Range<usize>> = BTreeMap::new();
        for e in walk.iter().filter(|e| graph.is_alive(e.node)) {
            let first = jobs.len();
            for tile in tiles_covering(e.change, tile_size) {
                jobs.push(TileJob {
                    node: e.node,
                    tile,
                    rect: e.change.clamped_to(tile_rect(tile, tile_size)),
                });
            }
            by_node.insert(e.node, first..jobs.len());
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); jobs.len()];
        let mut indegree = vec![0_usize; jobs.len()];
        for (j, job) in jobs.iter().enumerate() {
            let reads = job.rect.grown_by(graph.processing_margin(job.node));
            let mut inputs: Vec<NodeId> = graph.children(job.node).collect();
            if graph.kind(job.node) == NodeKind::AdjustmentLayer {
                let mut below = graph.next_sibling_below(job.node);
                while let Some(sibling) = below {
                    inputs.push(sibling);
                    below = graph.next_sibling_below(sibling);
                }
            }
            for input in inputs {
                let Some(range) = by_node.get(&input) else {
                    continue;
                };
                for c in range.clone() {
                    if !jobs[c].rect.clamped_to(reads).is_empty_area() {
                        dependents[c].push(j);
                        indegree[j] += 1;
                    }
                }
            }
        }

        // Kahn's algorithm, one batch per wave.
        let mut batches = Vec::new();
        let mut ready: Vec<usize> = (0..jobs.len()).filter(|&j| indegree[j] == 0).collect();
        let mut scheduled = 0;
        while !ready.is_empty() {
            let mut next = Vec::new();
            for &j in &ready {
                for &d in &dependents[j] {
                    indegree[d] -= 1;
                    if indegree[d] == 0 {
                        next.push(d);
                    }
                }
            }
            scheduled += ready.len();
            batches.push(ready.iter().map(|&j| jobs[j]).collect());
            next.sort_unstable();
            ready = next;
        }
        debug_assert_eq!(scheduled, jobs.len(), "tile dependencies form a cycle");

        Self { tile_size, batches }
    }

    /// Returns the tile size the jobs were cut with.
    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Returns the batches in execution order.
    #[must_use]
    pub fn batches(&self) -> &[Vec<TileJob>] {
        &self.batches
    }

    /// Returns the total number of jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Returns `true` if there are no jobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Runs `f` on every job, batch after batch, each batch in parallel.
    pub fn execute<F>(&self, f: F)
    where
        F: Fn(&TileJob) + Sync,
    {
        for batch in &self.batches {
            batch.par_iter().for_each(&f);
        }
    }

    /// Like [`execute`](Self::execute), stopping after the first batch in
    /// which a job fails.
    ///
    /// # Errors
    ///
    /// Returns one of the errors produced by `f`.
    pub fn try_execute<F, E>(&self, f: F) -> Result<(), E>
    where
        F: Fn(&TileJob) -> Result<(), E> + Sync,
        E: Send,
    {
        for batch in &self.batches {
            batch.par_iter().try_for_each(&f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use palimpsest_core::rect::pixel_rect;
    use palimpsest_core::{Document, DocumentConfig};
    use parking_lot::Mutex;

    use super::*;

    fn doc() -> Document {
        Document::new(DocumentConfig::new(128, 128))
    }

    fn nodes(batch: &[TileJob]) -> Vec<NodeId> {
        batch.iter().map(|j| j.node).collect()
    }

    #[test]
    fn single_tile_edit() {
        let mut doc = doc();
        let root = doc.root();
        let paint = doc.add_node(root, NodeKind::PaintLayer);
        let walk = doc.notify_dirty(paint, pixel_rect(4, 4, 8, 8));

        let schedule = TileSchedule::from_walk(doc.graph(), &walk, 64);
        assert_eq!(schedule.len(), 2);
        assert_eq!(nodes(&schedule.batches()[0]), vec![paint]);
        assert_eq!(nodes(&schedule.batches()[1]), vec![root]);
        assert_eq!(schedule.batches()[0][0].rect, pixel_rect(4, 4, 8, 8));
    }

    #[test]
    fn tiles_only_wait_for_overlapping_inputs() {
        let mut doc = doc();
        let root = doc.root();
        let paint = doc.add_node(root, NodeKind::PaintLayer);
        let walk = doc.notify_dirty(paint, pixel_rect(60, 0, 8, 8));

        let schedule = TileSchedule::from_walk(doc.graph(), &walk, 64);
        assert_eq!(schedule.batches().len(), 2);
        assert_eq!(nodes(&schedule.batches()[0]), vec![paint, paint]);
        assert_eq!(nodes(&schedule.batches()[1]), vec![root, root]);
        let tiles: Vec<_> = schedule.batches()[1].iter().map(|j| j.tile).collect();
        assert_eq!(tiles, vec![TileCoord::new(0, 0), TileCoord::new(1, 0)]);
    }

    #[test]
    fn adjustment_waits_for_layers_below() {
        let mut doc = doc();
        let root = doc.root();
        let paint = doc.add_node(root, NodeKind::PaintLayer);
        let adjust = doc.add_node(root, NodeKind::AdjustmentLayer);
        doc.graph_mut().set_processing_margin(adjust, 4);
        let walk = doc.notify_dirty(paint, pixel_rect(60, 0, 2, 2));

        let schedule = TileSchedule::from_walk(doc.graph(), &walk, 64);
        let levels: Vec<_> = schedule.batches().iter().map(|b| nodes(b)).collect();
        assert_eq!(
            levels,
            vec![vec![paint], vec![adjust, adjust], vec![root, root]]
        );
    }

    #[test]
    fn execute_runs_children_first() {
        let mut doc = doc();
        let root = doc.root();
        let a = doc.add_node(root, NodeKind::PaintLayer);
        let b = doc.add_node(root, NodeKind::PaintLayer);
        let walk = doc.request_full_refresh(root);

        let schedule = TileSchedule::from_walk(doc.graph(), &walk, 64);
        assert_eq!(schedule.len(), 12);

        let log = Mutex::new(Vec::new());
        schedule.execute(|job| log.lock().push(job.node));
        let log = log.into_inner();
        assert_eq!(log.len(), 12);
        let first_root = log.iter().position(|&n| n == root).unwrap();
        assert!(
            log[..first_root].iter().all(|&n| n == a || n == b),
            "root tiles ran before a child tile"
        );
        assert!(log[first_root..].iter().all(|&n| n == root), "child tile ran late");
    }

    #[test]
    fn try_execute_stops_after_failing_batch() {
        let mut doc = doc();
        let root = doc.root();
        let paint = doc.add_node(root, NodeKind::PaintLayer);
        let walk = doc.notify_dirty(paint, pixel_rect(0, 0, 128, 128));
        let schedule = TileSchedule::from_walk(doc.graph(), &walk, 64);

        let root_runs = AtomicUsize::new(0);
        let result = schedule.try_execute(|job| {
            if job.node == paint {
                Err(job.tile)
            } else {
                root_runs.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        });
        assert!(result.is_err(), "a paint tile failed");
        assert_eq!(root_runs.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn empty_walk_schedules_nothing() {
        let mut doc = doc();
        let root = doc.root();
        let paint = doc.add_node(root, NodeKind::PaintLayer);
        let walk = doc.notify_dirty(paint, Rect::ZERO);
        let schedule = TileSchedule::from_walk(doc.graph(), &walk, 64);
        assert!(schedule.is_empty());
        assert_eq!(schedule.tile_size(), 64);
        schedule.execute(|_| panic!("no jobs expected"));
    }
}
