// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Recordings carry no clock. Each event is stamped with its position in
//! the recording, one microsecond apart, which keeps walks nested and
//! ordered in the viewer.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use kurbo::Rect;
use serde_json::{Value, json};

use crate::recorder::{NodeRef, RecordedEvent, decode};

const WALK_TID: u32 = 0;
const TRANSACTION_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Walks become duration slices on one track; transactions and skipped
/// walks become instant events.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for (ts, recorded) in decode(bytes).enumerate() {
        match recorded {
            RecordedEvent::WalkBegin {
                walk_index,
                mode,
                start,
                rect,
            } => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{mode:?}"),
                    "cat": "Walk",
                    "ts": ts,
                    "pid": 0,
                    "tid": WALK_TID,
                    "args": {
                        "walk_index": walk_index,
                        "start": node_label(start),
                        "rect": rect_array(rect),
                    }
                }));
            }
            RecordedEvent::WalkEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.mode),
                    "cat": "Walk",
                    "ts": ts,
                    "pid": 0,
                    "tid": WALK_TID,
                    "args": {
                        "walk_index": e.walk_index,
                        "visited": e.visited,
                        "deferred": e.deferred,
                        "dirty": rect_array(e.dirty),
                    }
                }));
            }
            RecordedEvent::WalkSkipped {
                start,
                mode,
                reason,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "WalkSkipped",
                    "cat": "Walk",
                    "ts": ts,
                    "pid": 0,
                    "tid": WALK_TID,
                    "s": "t",
                    "args": {
                        "start": node_label(start),
                        "mode": format!("{mode:?}"),
                        "reason": format!("{reason:?}"),
                    }
                }));
            }
            RecordedEvent::Transaction {
                node,
                revision,
                action,
                rect,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{action:?}"),
                    "cat": "Transaction",
                    "ts": ts,
                    "pid": 0,
                    "tid": TRANSACTION_TID,
                    "s": "t",
                    "args": {
                        "node": node_label(node),
                        "revision": revision,
                        "rect": rect_array(rect),
                    }
                }));
            }
            RecordedEvent::NodeVisitsCount { walk_index, count } => {
                events.push(json!({
                    "ph": "i",
                    "name": "NodeVisits",
                    "cat": "Rich",
                    "ts": ts,
                    "pid": 0,
                    "tid": WALK_TID,
                    "s": "t",
                    "args": {
                        "walk_index": walk_index,
                        "count": count,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn node_label(n: NodeRef) -> String {
    format!("#{}@gen{}", n.index, n.generation)
}

fn rect_array(r: Rect) -> [f64; 4] {
    [r.x0, r.y0, r.x1, r.y1]
}

#[cfg(test)]
mod tests {
    use palimpsest_core::node::{NodeGraph, NodeKind};
    use palimpsest_core::trace::{
        TraceSink, TransactionAction, TransactionEvent, WalkBeginEvent, WalkEndEvent,
    };
    use palimpsest_core::walker::WalkMode;

    use super::*;
    use crate::recorder::RecorderSink;

    #[test]
    fn export_produces_valid_json() {
        let mut g = NodeGraph::new(Rect::new(0.0, 0.0, 32.0, 32.0));
        let node = g.create_node(NodeKind::PaintLayer);

        let mut rec = RecorderSink::new();
        rec.on_transaction(&TransactionEvent {
            node,
            revision: 3,
            action: TransactionAction::Finish,
            rect: Rect::ZERO,
        });
        rec.on_walk_begin(&WalkBeginEvent {
            walk_index: 1,
            mode: WalkMode::Update,
            start: node,
            rect: Rect::new(0.0, 0.0, 8.0, 8.0),
        });
        rec.on_walk_end(&WalkEndEvent {
            walk_index: 1,
            mode: WalkMode::Update,
            visited: 2,
            deferred: 0,
            dirty: Rect::new(0.0, 0.0, 8.0, 8.0),
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "Finish");
        assert_eq!(parsed[0]["tid"], TRANSACTION_TID);
        assert_eq!(parsed[0]["args"]["revision"], 3);

        assert_eq!(parsed[1]["ph"], "B");
        assert_eq!(parsed[1]["name"], "Update");
        assert_eq!(parsed[1]["ts"], 1);
        assert_eq!(parsed[1]["args"]["rect"], json!([0.0, 0.0, 8.0, 8.0]));

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["args"]["visited"], 2);
        assert_eq!(parsed[2]["ts"], 2);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
