// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Shared checker state threaded through every rule.

use pbc_core::{ConstraintId, Formula, Objective, StepError, StepResult, VarManager};
use pbc_engine::{Database, PropEngine};

use crate::levels::LevelStack;
use crate::orders::OrderStore;
use crate::rule::RuleSetKind;
use crate::subcontext::SubContextStack;

/// Everything a rule may read or mutate while executing.
///
/// Owned by one verifier; nested order-definition sub-verifiers swap the
/// engine and database out through the sub-context stack and share the rest.
pub struct Context {
    pub vars: VarManager,
    pub engine: PropEngine,
    pub db: Database,
    pub formula: Formula,
    /// The ID the next produced constraint will receive.
    pub first_free_id: ConstraintId,
    pub contains_contradiction: bool,
    pub uses_assumptions: bool,
    pub subcontexts: SubContextStack,
    pub orders: OrderStore,
    pub levels: LevelStack,
    /// Parse context the dispatcher is currently in; rules that push
    /// sub-contexts record it for restoration on `qed`.
    pub current_rules: RuleSetKind,
    /// Echo derived constraints and sub-goals.
    pub trace: bool,
    /// Deleting a core constraint requires a core-only RUP justification.
    pub check_deletions: bool,
}

impl Context {
    pub fn new(formula: Formula, vars: VarManager) -> Self {
        let engine = PropEngine::new(vars.num_vars());
        Self {
            vars,
            engine,
            db: Database::new(),
            formula,
            first_free_id: 1,
            contains_contradiction: false,
            uses_assumptions: false,
            subcontexts: SubContextStack::default(),
            orders: OrderStore::new(),
            levels: LevelStack::default(),
            current_rules: RuleSetKind::Main,
            trace: false,
            check_deletions: false,
        }
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.formula.objective.as_ref()
    }

    /// Resolve a possibly-relative constraint ID: negative values count back
    /// from the next free ID.
    pub fn resolve_id(&self, raw: i64) -> StepResult<ConstraintId> {
        let id = if raw < 0 {
            self.first_free_id as i64 + raw
        } else {
            raw
        };
        if id <= 0 {
            return Err(StepError::syntax(format!(
                "'{raw}' is not a valid constraint id"
            )));
        }
        Ok(id as ConstraintId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_ids() {
        let mut ctx = Context::new(Formula::default(), VarManager::new(true));
        ctx.first_free_id = 10;

        assert_eq!(ctx.resolve_id(3).unwrap(), 3);
        assert_eq!(ctx.resolve_id(-1).unwrap(), 9);
        assert_eq!(ctx.resolve_id(-9).unwrap(), 1);
        assert!(ctx.resolve_id(0).is_err());
        assert!(ctx.resolve_id(-10).is_err());
    }
}
