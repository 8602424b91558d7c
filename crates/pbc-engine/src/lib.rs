// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! # pbc-engine
//!
//! Constraint storage and unit propagation for the pbcheck proof checker:
//! - [`Database`] - constraints keyed by proof ID, allocated in source order
//! - [`PropEngine`] - counter-based unit propagation over pseudo-Boolean
//!   constraints, with duplicate detection, refcounted attach/detach,
//!   reverse unit propagation with exact rollback, effected-constraint
//!   queries for witnesses, and solution checking

pub mod db;
pub mod prop;

pub use db::Database;
pub use prop::PropEngine;
