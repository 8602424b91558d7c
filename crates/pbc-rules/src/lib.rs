// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! # pbc-rules
//!
//! The proof rule catalogue of the pbcheck checker: one handler per rule,
//! the shared checker [`Context`], sub-proof contexts with pending
//! sub-goals, the multi-goal machinery behind `red` and `dom`, order
//! definitions, and the auto-prover that discharges implicit obligations.

pub mod autoprover;
pub mod catalogue;
pub mod context;
pub mod levels;
pub mod multigoal;
pub mod orders;
pub mod rpn;
pub mod rule;
pub mod subcontext;

pub use autoprover::auto_prove;
pub use context::Context;
pub use rule::{
    default_rule, lookup, Antecedents, ParseFn, Produced, ProofStep, RuleDef, RuleSetKind,
    Transition,
};
pub use subcontext::{Frame, FrameKind, SubContextStack, Subgoal};
