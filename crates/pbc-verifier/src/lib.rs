// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! # pbc-verifier
//!
//! The proof dispatcher of the pbcheck checker: reads the proof stream,
//! binds each line to a rule in the current parse context, executes it,
//! attaches and detaches constraints, and reports the verification result.

pub mod reader;
pub mod verifier;

pub use reader::ProofReader;
pub use verifier::{verify_proof, Settings, VerificationResult, Verifier};
