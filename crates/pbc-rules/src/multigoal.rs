// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Shared machinery for multi-goal rules, and the `red` rule.
//!
//! A multi-goal rule makes hypotheses available inside a sub-context,
//! registers sub-goals, and introduces its result constraint once every
//! goal is discharged. In the implicit form (no `begin`) the auto-prover
//! attempts all goals immediately; with `begin` the proof continues with
//! `proofgoal` blocks until `qed`.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Zero;

use pbc_core::{
    ConstraintId, Image, Ineq, StepError, StepResult, Substitution, Var, WordScanner, MAX_ID,
};

use crate::autoprover::auto_prove;
use crate::catalogue::parse_single_constraint;
use crate::context::Context;
use crate::rule::{Antecedents, Produced, ProofStep, RuleSetKind, Transition};
use crate::subcontext::{FrameKind, Subgoal};

/// Builder driving one multi-goal rule execution.
pub struct MultiGoal {
    base_id: ConstraintId,
    next_id: ConstraintId,
    produced: Vec<Produced>,
    explicit: bool,
    body: RuleSetKind,
}

impl MultiGoal {
    /// Push the sub-context frame and start allocating IDs at the next
    /// free one.
    pub fn begin(ctx: &mut Context, explicit: bool, body: RuleSetKind) -> MultiGoal {
        ctx.subcontexts.push(FrameKind::MultiGoal, ctx.current_rules);
        MultiGoal {
            base_id: ctx.first_free_id,
            next_id: ctx.first_free_id,
            produced: Vec::new(),
            explicit,
            body,
        }
    }

    /// Make a hypothesis available inside the sub-proof. It occupies the
    /// next constraint ID and is deleted when the sub-context closes.
    pub fn add_available(&mut self, ineq: Rc<Ineq>) -> ConstraintId {
        let id = self.next_id;
        self.next_id += 1;
        self.produced.push(Produced::Attach { ineq, core: false });
        id
    }

    /// Register a sub-goal, keyed by a database ID or a fresh tag.
    pub fn add_subgoal(
        &mut self,
        ctx: &mut Context,
        key: Option<ConstraintId>,
        goal: Subgoal,
    ) -> StepResult<()> {
        let key = match key {
            Some(key) => key,
            None => {
                let key = self.next_id;
                self.next_id += 1;
                self.produced.push(Produced::Reserved);
                key
            }
        };
        if ctx.trace {
            let rendered = match &goal {
                Subgoal::RightHand(ineq) => ineq.to_opb(&ctx.vars),
                Subgoal::Contradiction { .. } => "contradiction from hypotheses".to_string(),
            };
            println!("  proofgoal {key:03}: {rendered}");
        }
        let frame = ctx
            .subcontexts
            .current_mut()
            .ok_or_else(|| StepError::Internal("multi-goal rule without sub-context".into()))?;
        frame.subgoals.push_back((key, goal));
        Ok(())
    }

    /// Schedule a constraint for introduction once all goals are proven.
    pub fn add_introduced(&mut self, ctx: &mut Context, ineq: Rc<Ineq>) -> StepResult<()> {
        let frame = ctx
            .subcontexts
            .current_mut()
            .ok_or_else(|| StepError::Internal("multi-goal rule without sub-context".into()))?;
        frame.to_add.push(ineq);
        Ok(())
    }

    /// Close the builder: either hand over to explicit `proofgoal` blocks,
    /// or auto-prove everything now and commit the introductions.
    pub fn finish(self, ctx: &mut Context) -> StepResult<(Vec<Produced>, Transition)> {
        if self.explicit {
            return Ok((self.produced, Transition::Set(self.body)));
        }

        let hypotheses: Vec<(ConstraintId, Rc<Ineq>)> = self
            .produced
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p {
                Produced::Attach { ineq, .. } => {
                    Some((self.base_id + i as ConstraintId, ineq.clone()))
                }
                Produced::Reserved => None,
            })
            .collect();
        for (id, ineq) in &hypotheses {
            ctx.engine.attach(ineq.clone(), *id, false);
        }

        let mut frame = ctx
            .subcontexts
            .pop()
            .ok_or_else(|| StepError::Internal("multi-goal rule without sub-context".into()))?;
        let result = auto_prove(ctx, &mut frame.subgoals, None);
        for (_, ineq) in hypotheses.iter().rev() {
            ctx.engine.detach(ineq);
        }
        result?;

        let mut out: Vec<Produced> = self
            .produced
            .into_iter()
            .map(|p| match p {
                Produced::Attach { .. } => Produced::Reserved,
                reserved => reserved,
            })
            .collect();
        out.extend(frame.to_add.drain(..).map(|ineq| Produced::Attach {
            ineq,
            core: false,
        }));
        Ok((out, Transition::Keep))
    }
}

/// The objective-preservation condition for a witness:
/// `sum c_i l_i - sum c_i (l_i under the witness) >= 0` in PB form.
/// None when the formula has no objective.
pub fn objective_condition(ctx: &Context, witness: &Substitution) -> Option<Ineq> {
    let objective = ctx.objective()?;
    let mut terms: Vec<(BigInt, pbc_core::Lit)> = Vec::new();
    let mut degree = BigInt::zero();
    for (coeff, lit) in &objective.terms {
        match witness.image(*lit) {
            // unmapped literals cancel against themselves
            Image::Unchanged => {}
            Image::True => {
                terms.push((coeff.clone(), *lit));
                degree += coeff;
            }
            Image::False => terms.push((coeff.clone(), *lit)),
            Image::Lit(mapped) => {
                terms.push((coeff.clone(), *lit));
                terms.push((-coeff.clone(), mapped));
            }
        }
    }
    Some(Ineq::from_terms(terms, degree))
}

/// Consume an optional `begin` keyword; anything else trailing is an error.
pub(crate) fn parse_explicit_marker(words: &mut WordScanner<'_>) -> StepResult<bool> {
    match words.next() {
        None => Ok(false),
        Some("begin") => {
            words.expect_end()?;
            Ok(true)
        }
        Some(other) => Err(StepError::syntax(format!(
            "unexpected word '{other}', expected 'begin'"
        ))),
    }
}

// ============================================================================
// red - AddRedundant
// ============================================================================

struct AddRedundant {
    constraint: Ineq,
    witness: Substitution,
    explicit: bool,
    mg: Option<MultiGoal>,
    transition: Transition,
}

impl ProofStep for AddRedundant {
    fn antecedents(&self) -> Antecedents {
        Antecedents::All
    }

    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let mut mg = self
            .mg
            .take()
            .ok_or_else(|| StepError::Internal("redundancy step executed twice".into()))?;
        let constraint = Rc::new(self.constraint.clone());
        ctx.engine.increase_num_vars_to(ctx.vars.num_vars());

        // Implicit proofs often hold by RUP alone; skip the goal machinery.
        if !self.explicit && ctx.engine.rup_check(&constraint, false) {
            mg.add_introduced(ctx, constraint)?;
            let (produced, transition) = mg.finish(ctx)?;
            self.transition = transition;
            return Ok(produced);
        }

        let negated = Rc::new(constraint.negated());
        mg.add_available(negated.clone());

        for (id, effected) in ctx.engine.compute_effected(&self.witness, MAX_ID) {
            if !negated.implies(&effected) {
                mg.add_subgoal(ctx, Some(id), Subgoal::RightHand(Rc::new(effected)))?;
            }
        }
        mg.add_subgoal(
            ctx,
            None,
            Subgoal::RightHand(Rc::new(constraint.substitute(&self.witness))),
        )?;
        if let Some(objective) = objective_condition(ctx, &self.witness) {
            mg.add_subgoal(ctx, None, Subgoal::RightHand(Rc::new(objective)))?;
        }
        mg.add_introduced(ctx, constraint)?;

        let (produced, transition) = mg.finish(ctx)?;
        self.transition = transition;
        Ok(produced)
    }

    fn transition(&self) -> Transition {
        self.transition
    }
}

pub fn parse_red(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let forbidden: Vec<Var> = ctx.orders.active_vars();
    let constraint = parse_single_constraint(words, ctx)?;
    let witness = Substitution::parse(words, &mut ctx.vars, &forbidden)?;
    ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
    let explicit = parse_explicit_marker(words)?;

    let mg = MultiGoal::begin(ctx, explicit, RuleSetKind::RedDomBody);
    Ok(Box::new(AddRedundant {
        constraint,
        witness,
        explicit,
        mg: Some(mg),
        transition: Transition::Keep,
    }))
}
