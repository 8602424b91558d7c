// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Automatic discharge of pending sub-goals.
//!
//! Goals are attempted in insertion order. A contradiction bundle is checked
//! by temporarily attaching its hypotheses and asking RUP for `0 >= 1`. A
//! right-hand goal, after substituting the propagated literals, is checked
//! by triviality, then RUP on its negation, then database equality, then an
//! implication scan over the database under the same substitution.

use std::collections::VecDeque;

use pbc_core::{ConstraintId, Ineq, StepError, StepResult, Substitution};

use crate::context::Context;
use crate::subcontext::Subgoal;

/// Discharge goals from the front of `subgoals` until it is empty or the
/// next key is at or past `up_to`. Undischargeable goals are invalid-proof
/// errors naming the goal.
pub fn auto_prove(
    ctx: &mut Context,
    subgoals: &mut VecDeque<(ConstraintId, Subgoal)>,
    up_to: Option<ConstraintId>,
) -> StepResult<()> {
    if subgoals.is_empty() {
        return Ok(());
    }
    ctx.engine.increase_num_vars_to(ctx.vars.num_vars());

    let mut assignment = Substitution::new();
    for lit in ctx.engine.propagated_lits() {
        assignment.set_constant(lit);
    }
    if ctx.trace && !assignment.is_empty() {
        let names: Vec<String> = ctx
            .engine
            .propagated_lits()
            .iter()
            .map(|&l| ctx.vars.lit_name(l))
            .collect();
        println!("    propagations: {}", names.join(" "));
    }

    // The substituted database is only built if an implication scan is
    // actually reached.
    let mut db_substituted: Option<Vec<(ConstraintId, Ineq)>> = None;

    while let Some(&(key, _)) = subgoals.front() {
        if up_to.is_some_and(|bound| key >= bound) {
            break;
        }
        let (key, goal) = subgoals.pop_front().expect("front checked above");

        match goal {
            Subgoal::Contradiction { hypotheses } => {
                for hyp in &hypotheses {
                    let id = ctx.engine.fresh_tmp_id();
                    ctx.engine.attach(hyp.clone(), id, false);
                }
                let conflicting = ctx.engine.rup_check(&Ineq::contradiction(), false);
                for hyp in hypotheses.iter().rev() {
                    ctx.engine.detach(hyp);
                }
                if !conflicting {
                    return Err(goal_failure(key));
                }
                trace_discharge(ctx, key, "contradiction");
            }
            Subgoal::RightHand(goal) => {
                let goal = goal.substitute(&assignment);
                if goal.is_trivial() {
                    continue;
                }
                if ctx.engine.rup_check(&goal, false) {
                    trace_discharge(ctx, key, "RUP check");
                    continue;
                }
                if ctx.engine.find(&goal).is_some() {
                    trace_discharge(ctx, key, "database lookup");
                    continue;
                }
                let db = db_substituted.get_or_insert_with(|| {
                    ctx.db
                        .all_active()
                        .iter()
                        .map(|(id, ineq)| (*id, ineq.substitute(&assignment)))
                        .collect()
                });
                if db.iter().any(|(_, ineq)| ineq.implies(&goal)) {
                    trace_discharge(ctx, key, "implication");
                    continue;
                }
                return Err(goal_failure(key));
            }
        }
    }
    Ok(())
}

fn goal_failure(key: ConstraintId) -> StepError {
    StepError::invalid(format!("could not prove proof goal {key:03} automatically"))
}

fn trace_discharge(ctx: &Context, key: ConstraintId, how: &str) {
    if ctx.trace {
        println!("    automatically proved {key:03} by {how}");
    }
}
