// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plans, damage tracking, and tile job scheduling for palimpsest.
//!
//! This crate sits between [`palimpsest_core`]'s walker and whatever does
//! the actual pixel work. It defines:
//!
//! - [`RenderItem`]: one node to recomposite, with its change and need rects
//! - [`RenderPlan`]: the items of one walk in bottom-up order
//! - [`DamageRegion`]: the displayed area a walk invalidated
//! - [`TileSchedule`]: `(node, tile)` jobs batched by dependency level

#![cfg_attr(docsrs, feature(doc_cfg))]

mod damage;
mod plan;
mod schedule;

pub use damage::DamageRegion;
pub use plan::{RenderItem, RenderPlan};
pub use schedule::{TileJob, TileSchedule};
