// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! The proof-line constraint database.
//!
//! Maps constraint IDs, allocated in strict proof order starting at 1, to
//! the constraints they denote. Deleted IDs leave a hole; an ID is never
//! reused. Duplicate detection and refcounting live in the propagation
//! engine, which may hand the same attached record to several IDs.

use std::rc::Rc;

use pbc_core::{ConstraintId, Ineq, StepError, StepResult};

/// Constraint store indexed by proof ID.
#[derive(Debug, Default)]
pub struct Database {
    slots: Vec<Option<Rc<Ineq>>>,
}

impl Database {
    pub fn new() -> Self {
        // slot 0 is the reserved sentinel ID
        Self { slots: vec![None] }
    }

    /// The ID the next insertion will receive.
    pub fn next_id(&self) -> ConstraintId {
        self.slots.len() as ConstraintId
    }

    /// Insert a constraint (or reserve a hole) at the next free ID.
    pub fn push(&mut self, ineq: Option<Rc<Ineq>>) -> ConstraintId {
        let id = self.next_id();
        self.slots.push(ineq);
        id
    }

    /// Fetch an antecedent; missing or deleted IDs are invalid-proof errors.
    pub fn get(&self, id: ConstraintId) -> StepResult<Rc<Ineq>> {
        match self.slots.get(id as usize) {
            None => Err(StepError::invalid(format!(
                "constraint {id} is not derived yet"
            ))),
            Some(None) => Err(StepError::invalid(format!(
                "constraint {id} was deleted"
            ))),
            Some(Some(ineq)) => Ok(ineq.clone()),
        }
    }

    /// Remove and return the constraint at `id`, leaving a hole.
    pub fn take(&mut self, id: ConstraintId) -> Option<Rc<Ineq>> {
        self.slots.get_mut(id as usize).and_then(Option::take)
    }

    /// Whether `id` currently holds a constraint.
    pub fn contains(&self, id: ConstraintId) -> bool {
        matches!(self.slots.get(id as usize), Some(Some(_)))
    }

    /// All live constraints, ascending by ID.
    pub fn all_active(&self) -> Vec<(ConstraintId, Rc<Ineq>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| {
                slot.as_ref()
                    .map(|ineq| (id as ConstraintId, ineq.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use pbc_core::Var;

    fn unit(v: u32) -> Rc<Ineq> {
        Rc::new(Ineq::from_terms(
            [(BigInt::from(1), Var(v).pos())],
            BigInt::from(1),
        ))
    }

    #[test]
    fn test_ids_are_consecutive_from_one() {
        let mut db = Database::new();
        assert_eq!(db.push(Some(unit(1))), 1);
        assert_eq!(db.push(None), 2);
        assert_eq!(db.push(Some(unit(2))), 3);
        assert_eq!(db.next_id(), 4);
    }

    #[test]
    fn test_get_errors() {
        let mut db = Database::new();
        db.push(Some(unit(1)));
        assert!(db.get(1).is_ok());
        assert!(db.get(5).is_err());

        db.take(1);
        assert!(db.get(1).is_err());
        assert!(!db.contains(1));
    }

    #[test]
    fn test_all_active_skips_holes() {
        let mut db = Database::new();
        db.push(Some(unit(1)));
        db.push(Some(unit(2)));
        db.take(1);
        let active = db.all_active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, 2);
    }
}
