// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Sub-proof contexts and their closing rules.
//!
//! Multi-goal rules push a frame holding their pending sub-goals, the
//! constraints to delete on exit, and the constraints to introduce once all
//! goals are discharged. `qed`/`end` pops the frame, runs the auto-prover on
//! whatever is still pending, commits the introductions and schedules the
//! deletions. `proofgoal` opens a nested frame for one explicit sub-goal.

use std::collections::VecDeque;
use std::rc::Rc;

use pbc_core::{ConstraintId, Ineq, StepError, StepResult, WordScanner};
use pbc_engine::{Database, PropEngine};

use crate::autoprover::auto_prove;
use crate::context::Context;
use crate::rule::{Antecedents, Produced, ProofStep, RuleSetKind, Transition};

/// A proof obligation generated by a multi-goal rule.
#[derive(Clone, Debug)]
pub enum Subgoal {
    /// Prove the constraint (directly, from the database, or by RUP on its
    /// negation).
    RightHand(Rc<Ineq>),
    /// Show the hypotheses contradictory: they are attached and `0 >= 1`
    /// must follow.
    Contradiction { hypotheses: Vec<Rc<Ineq>> },
}

/// State saved by a `pre_order` sub-verifier scope.
pub struct OrderScopeState {
    pub saved_engine: PropEngine,
    pub saved_db: Database,
    pub saved_first_free_id: ConstraintId,
    pub saved_contains_contradiction: bool,
    pub saved_uses_assumptions: bool,
}

/// What kind of construct owns a frame, deciding the checks run at `qed`.
pub enum FrameKind {
    /// Body of a multi-goal rule (`red`, `dom`, `irreflexive`, `proof`).
    MultiGoal,
    /// A `proofgoal` block; must derive contradiction.
    ProofGoal { goal: ConstraintId },
    /// Structural block (`vars`, `def`) with no exit check.
    Plain,
    /// The `transitivity` wrapper; its `proof` must have run.
    Transitivity,
    /// A `pre_order` sub-verifier with swapped-out engine and database.
    OrderScope(OrderScopeState),
}

/// One sub-proof stack frame.
pub struct Frame {
    pub kind: FrameKind,
    /// Constraints derived inside the frame, deleted when it closes.
    pub to_delete: Vec<ConstraintId>,
    /// Constraints introduced after all sub-goals are proven.
    pub to_add: Vec<Rc<Ineq>>,
    /// Pending sub-goals keyed by constraint ID or synthetic tag.
    pub subgoals: VecDeque<(ConstraintId, Subgoal)>,
    /// Parse context to restore when the frame closes.
    pub saved_rules: RuleSetKind,
}

/// Stack of open sub-proof contexts.
#[derive(Default)]
pub struct SubContextStack {
    frames: Vec<Frame>,
}

impl SubContextStack {
    pub fn push(&mut self, kind: FrameKind, saved_rules: RuleSetKind) {
        self.frames.push(Frame {
            kind,
            to_delete: Vec::new(),
            to_add: Vec::new(),
            subgoals: VecDeque::new(),
            saved_rules,
        });
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// The frame below the top one (the goal owner while a `proofgoal`
    /// block is open).
    pub fn below_top_mut(&mut self) -> Option<&mut Frame> {
        let len = self.frames.len();
        if len < 2 {
            return None;
        }
        self.frames.get_mut(len - 2)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Record IDs derived while a frame is open; they are deleted when it
    /// closes.
    pub fn on_new_ids(&mut self, ids: impl Iterator<Item = ConstraintId>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.to_delete.extend(ids);
        }
    }
}

/// `qed` / `end` for ordinary frames.
struct EndOfProof {
    popped_deletions: Vec<ConstraintId>,
    restore: RuleSetKind,
}

impl ProofStep for EndOfProof {
    fn antecedents(&self) -> Antecedents {
        Antecedents::All
    }

    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let mut frame = ctx
            .subcontexts
            .pop()
            .ok_or_else(|| StepError::syntax("nothing to end here"))?;

        match &frame.kind {
            FrameKind::ProofGoal { .. } => {
                if !ctx.contains_contradiction {
                    return Err(StepError::invalid("sub proof did not show contradiction"));
                }
                ctx.contains_contradiction = false;
            }
            FrameKind::Transitivity => {
                let proven = ctx
                    .orders
                    .defining
                    .as_ref()
                    .is_some_and(|d| d.transitivity_proven);
                if !proven {
                    return Err(StepError::invalid("transitivity proof is missing"));
                }
            }
            FrameKind::OrderScope(_) => {
                return Err(StepError::Internal(
                    "order scope closed through the wrong rule".into(),
                ));
            }
            FrameKind::MultiGoal | FrameKind::Plain => {}
        }

        auto_prove(ctx, &mut frame.subgoals, None)?;

        self.popped_deletions = std::mem::take(&mut frame.to_delete);
        self.restore = frame.saved_rules;
        Ok(frame
            .to_add
            .drain(..)
            .map(|ineq| Produced::Attach { ineq, core: false })
            .collect())
    }

    fn deletions(&self) -> Vec<ConstraintId> {
        self.popped_deletions.clone()
    }

    fn transition(&self) -> Transition {
        Transition::Set(self.restore)
    }
}

pub fn parse_end(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    words.expect_end()?;
    if ctx.subcontexts.is_empty() {
        return Err(StepError::syntax("nothing to end here"));
    }
    Ok(Box::new(EndOfProof {
        popped_deletions: Vec::new(),
        restore: ctx.current_rules,
    }))
}

/// `proofgoal N`: open a sub-proof for one pending goal.
struct ProofGoal {
    goal: ConstraintId,
}

impl ProofStep for ProofGoal {
    fn antecedents(&self) -> Antecedents {
        Antecedents::All
    }

    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        // Goals before the selected one are the auto-prover's job.
        let mut goals = match ctx.subcontexts.below_top_mut() {
            Some(parent) => std::mem::take(&mut parent.subgoals),
            None => {
                return Err(StepError::Internal(
                    "proofgoal without an owning sub-context".into(),
                ))
            }
        };
        let result = auto_prove(ctx, &mut goals, Some(self.goal));

        let produced = match &result {
            Err(_) => Vec::new(),
            Ok(()) => match goals.pop_front() {
                Some((key, goal)) if key == self.goal => match goal {
                    Subgoal::RightHand(ineq) => vec![Produced::Attach {
                        ineq: Rc::new(ineq.negated()),
                        core: false,
                    }],
                    Subgoal::Contradiction { hypotheses } => hypotheses
                        .into_iter()
                        .map(|ineq| Produced::Attach { ineq, core: false })
                        .collect(),
                },
                _ => {
                    return Err(StepError::Internal(
                        "selected proof goal vanished from the queue".into(),
                    ))
                }
            },
        };

        if let Some(parent) = ctx.subcontexts.below_top_mut() {
            parent.subgoals = goals;
        }
        result?;
        Ok(produced)
    }

    fn transition(&self) -> Transition {
        Transition::Set(RuleSetKind::SubProofBody)
    }
}

pub fn parse_proofgoal(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let raw = words.next_i64()?;
    words.expect_end()?;
    let goal = ctx.resolve_id(raw)?;

    let parent = ctx
        .subcontexts
        .current_mut()
        .ok_or_else(|| StepError::syntax("no proof goals are open here"))?;
    if parent.subgoals.is_empty() {
        return Err(StepError::syntax("no proof goals left to prove"));
    }
    if !parent.subgoals.iter().any(|&(key, _)| key == goal) {
        return Err(StepError::syntax(format!("there is no proof goal {goal}")));
    }

    ctx.subcontexts
        .push(FrameKind::ProofGoal { goal }, ctx.current_rules);
    Ok(Box::new(ProofGoal { goal }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use pbc_core::Var;

    fn goal(v: u32) -> Subgoal {
        Subgoal::RightHand(Rc::new(Ineq::from_terms(
            [(BigInt::from(1), Var(v).pos())],
            BigInt::from(1),
        )))
    }

    #[test]
    fn test_new_ids_go_to_the_innermost_frame() {
        let mut stack = SubContextStack::default();
        stack.push(FrameKind::MultiGoal, RuleSetKind::Main);
        stack.on_new_ids(1..3);
        stack.push(FrameKind::ProofGoal { goal: 1 }, RuleSetKind::RedDomBody);
        stack.on_new_ids(3..4);

        let inner = stack.pop().unwrap();
        assert_eq!(inner.to_delete, vec![3]);
        let outer = stack.pop().unwrap();
        assert_eq!(outer.to_delete, vec![1, 2]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_below_top_reaches_the_goal_owner() {
        let mut stack = SubContextStack::default();
        assert!(stack.below_top_mut().is_none());

        stack.push(FrameKind::MultiGoal, RuleSetKind::Main);
        stack.current_mut().unwrap().subgoals.push_back((5, goal(1)));
        stack.push(FrameKind::ProofGoal { goal: 5 }, RuleSetKind::RedDomBody);

        let owner = stack.below_top_mut().unwrap();
        assert_eq!(owner.subgoals.len(), 1);
        assert!(matches!(owner.kind, FrameKind::MultiGoal));
    }
}
