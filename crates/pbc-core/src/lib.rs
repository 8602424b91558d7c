// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! # pbc-core
//!
//! Core types for the pbcheck proof checker:
//! - [`Var`], [`Lit`], [`VarManager`] - variables, literals and the
//!   name registry
//! - [`Ineq`] - normalized pseudo-Boolean inequalities with exact
//!   arbitrary-precision arithmetic
//! - [`Substitution`] - witness substitutions for redundancy and dominance
//! - Parsing for OPB formulas, DIMACS CNF and the shared word grammar
//! - The checker-wide error taxonomy
//!
//! ## Example
//!
//! ```rust
//! use num_bigint::BigInt;
//! use pbc_core::{Ineq, VarManager};
//!
//! let mut vars = VarManager::new(true);
//! let x1 = vars.var("x1").unwrap();
//! let x2 = vars.var("x2").unwrap();
//!
//! // 2 x1 + 2 x2 >= 3, divided by 2, rounds up to x1 + x2 >= 2
//! let c = Ineq::from_terms(
//!     [(BigInt::from(2), x1.pos()), (BigInt::from(2), x2.pos())],
//!     BigInt::from(3),
//! );
//! let divided = c.divide(&BigInt::from(2));
//! assert_eq!(divided.degree(), &BigInt::from(2));
//! ```

pub mod error;
pub mod formula;
pub mod ineq;
pub mod parse;
pub mod substitution;
pub mod vars;

pub use error::{CheckError, CheckResult, StepError, StepResult};
pub use formula::{Formula, Objective};
pub use ineq::{Ineq, Term};
pub use parse::{parse_cnf, parse_formula, parse_opb, OpbParser, WordScanner};
pub use substitution::{Image, Substitution};
pub use vars::{Lit, Var, VarManager};

/// Constraint IDs as allocated by the proof dispatcher. ID 0 is reserved.
pub type ConstraintId = u64;

/// Sentinel ID treated as never deletable and above every real constraint.
pub const MAX_ID: ConstraintId = ConstraintId::MAX;
