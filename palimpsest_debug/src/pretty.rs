// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use kurbo::Rect;
use palimpsest_core::trace::{
    NodeVisit, TraceSink, TransactionEvent, WalkBeginEvent, WalkEndEvent, WalkSkippedEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
    visits: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("visits", &self.visits)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            visits: false,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            visits: false,
        }
    }

    /// Also prints one line per visited node after each walk.
    #[must_use]
    pub fn with_visits(mut self, visits: bool) -> Self {
        self.visits = visits;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn rect(r: Rect) -> String {
    format!("({}, {})-({}, {})", r.x0, r.y0, r.x1, r.y1)
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_walk_begin(&mut self, e: &WalkBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[walk:begin] #{} {:?} from {} rect={}",
            e.walk_index,
            e.mode,
            e.start,
            rect(e.rect),
        );
    }

    fn on_walk_end(&mut self, e: &WalkEndEvent) {
        let _ = writeln!(
            self.writer,
            "[walk:end] #{} {:?} visited={} deferred={} dirty={}",
            e.walk_index,
            e.mode,
            e.visited,
            e.deferred,
            rect(e.dirty),
        );
    }

    fn on_walk_skipped(&mut self, e: &WalkSkippedEvent) {
        let _ = writeln!(
            self.writer,
            "[walk:skip] {:?} from {} reason={:?}",
            e.mode, e.start, e.reason,
        );
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        let _ = writeln!(
            self.writer,
            "[tx] {:?} node={} r{} rect={}",
            e.action,
            e.node,
            e.revision,
            rect(e.rect),
        );
    }

    fn on_node_visits(&mut self, walk_index: u64, visits: &[NodeVisit]) {
        if !self.visits {
            return;
        }
        for v in visits {
            let _ = writeln!(
                self.writer,
                "  [visit] walk={walk_index} #{} change={} need={}",
                v.node_index,
                rect(v.change),
                rect(v.need),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use palimpsest_core::node::NodeKind;
    use palimpsest_core::rect::pixel_rect;
    use palimpsest_core::{Document, DocumentConfig};
    use parking_lot::Mutex;

    use super::*;

    fn run_session(visits: bool) -> String {
        let sink = Arc::new(Mutex::new(
            PrettyPrintSink::with_writer(Vec::new()).with_visits(visits),
        ));
        let mut doc = Document::new(DocumentConfig::new(64, 64));
        let root = doc.root();
        let paint = doc.add_node(root, NodeKind::PaintLayer);
        doc.set_trace_sink(Box::new(Arc::clone(&sink)));

        let mut tx = doc.begin_edit(paint).unwrap();
        doc.end_edit(&mut tx, pixel_rect(0, 0, 4, 4));
        doc.notify_dirty(paint, Rect::ZERO);
        drop(doc);

        let sink = Arc::into_inner(sink).unwrap().into_inner();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn one_line_per_event() {
        let out = run_session(false);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 5, "{out}");
        assert!(lines[0].starts_with("[tx] Begin node=#1"), "{}", lines[0]);
        assert!(lines[1].starts_with("[tx] Finish"), "{}", lines[1]);
        assert_eq!(lines[2], "[walk:begin] #1 Update from #1 rect=(0, 0)-(4, 4)");
        assert_eq!(
            lines[3],
            "[walk:end] #1 Update visited=2 deferred=0 dirty=(0, 0)-(4, 4)"
        );
        assert_eq!(lines[4], "[walk:skip] Update from #1 reason=EmptyRect");
    }

    #[test]
    fn visits_are_opt_in() {
        let out = run_session(true);
        let visits: Vec<_> = out.lines().filter(|l| l.contains("[visit]")).collect();
        assert_eq!(
            visits,
            vec![
                "  [visit] walk=1 #1 change=(0, 0)-(4, 4) need=(0, 0)-(4, 4)",
                "  [visit] walk=1 #0 change=(0, 0)-(4, 4) need=(0, 0)-(4, 4)",
            ]
        );
    }
}
