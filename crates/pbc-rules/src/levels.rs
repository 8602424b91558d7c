// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Level-based deletion bookkeeping: the `#` and standalone `w` rules.
//!
//! Every constraint derived while level `l` is current is recorded at level
//! `l`; wiping level `l` deletes everything recorded at `l` and above.

use std::rc::Rc;

use pbc_core::{ConstraintId, Ineq, StepError, StepResult, WordScanner};

use crate::context::Context;
use crate::rule::{Produced, ProofStep};

/// Stack of constraint-ID lists, one per level.
#[derive(Debug, Default)]
pub struct LevelStack {
    current: usize,
    levels: Vec<Vec<ConstraintId>>,
}

impl LevelStack {
    pub fn set_level(&mut self, level: usize) {
        while self.levels.len() <= level {
            self.levels.push(Vec::new());
        }
        self.current = level;
    }

    /// Record newly derived IDs at the current level.
    pub fn on_new_ids(&mut self, ids: impl Iterator<Item = ConstraintId>) {
        while self.levels.len() <= self.current {
            self.levels.push(Vec::new());
        }
        self.levels[self.current].extend(ids);
    }

    /// Drain every ID recorded at `level` and above.
    pub fn wipe(&mut self, level: usize) -> StepResult<Vec<ConstraintId>> {
        if level >= self.levels.len() {
            return Err(StepError::invalid(format!(
                "tried to wipe level {level} that was never set"
            )));
        }
        let mut result = Vec::new();
        for list in self.levels[level..].iter_mut() {
            result.append(list);
        }
        Ok(result)
    }
}

struct SetLevel {
    level: usize,
}

impl ProofStep for SetLevel {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        ctx.levels.set_level(self.level);
        Ok(Vec::new())
    }
}

pub fn parse_set_level(
    words: &mut WordScanner<'_>,
    _ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let level = words.next_i64()?;
    words.expect_end()?;
    if level < 0 {
        return Err(StepError::syntax("levels must be non-negative"));
    }
    Ok(Box::new(SetLevel {
        level: level as usize,
    }))
}

struct WipeLevel {
    level: usize,
    to_delete: Vec<ConstraintId>,
}

impl ProofStep for WipeLevel {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        self.to_delete = ctx.levels.wipe(self.level)?;
        Ok(Vec::new())
    }

    fn deletions(&self) -> Vec<ConstraintId> {
        self.to_delete.clone()
    }
}

pub fn parse_wipe_level(
    words: &mut WordScanner<'_>,
    _ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let level = words.next_i64()?;
    words.expect_end()?;
    if level < 0 {
        return Err(StepError::syntax("levels must be non-negative"));
    }
    Ok(Box::new(WipeLevel {
        level: level as usize,
        to_delete: Vec::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wipe_collects_from_level_upwards() {
        let mut stack = LevelStack::default();
        stack.set_level(1);
        stack.on_new_ids([1, 2].into_iter());
        stack.set_level(2);
        stack.on_new_ids([3].into_iter());
        stack.set_level(1);
        stack.on_new_ids([4].into_iter());

        assert_eq!(stack.wipe(1).unwrap(), vec![1, 2, 4, 3]);
        // wiping again yields nothing, the lists were drained
        assert_eq!(stack.wipe(1).unwrap(), Vec::<ConstraintId>::new());
        assert!(stack.wipe(7).is_err());
    }

    #[test]
    fn test_default_level_zero() {
        let mut stack = LevelStack::default();
        stack.on_new_ids([1].into_iter());
        assert_eq!(stack.wipe(0).unwrap(), vec![1]);
    }
}
