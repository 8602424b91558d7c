// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! The basic proof rules: formula loading, comparisons, RUP, solutions,
//! deletion and core bookkeeping.

use std::collections::HashSet;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::One;

use pbc_core::{ConstraintId, Ineq, Lit, OpbParser, StepError, StepResult, WordScanner};

use crate::context::Context;
use crate::rule::{Antecedents, Produced, ProofStep};

pub(crate) fn parse_single_constraint(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Ineq> {
    let mut parsed = OpbParser::new(&mut ctx.vars, false).constraint(words)?;
    Ok(parsed.remove(0))
}

fn parse_lit_list(words: &mut WordScanner<'_>, ctx: &mut Context) -> StepResult<Vec<Lit>> {
    let mut lits = Vec::new();
    while let Some(token) = words.next() {
        lits.push(ctx.vars.lit(token)?);
    }
    Ok(lits)
}

// ============================================================================
// f - LoadFormula
// ============================================================================

struct LoadFormula;

impl ProofStep for LoadFormula {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        Ok(ctx
            .formula
            .constraints
            .iter()
            .map(|ineq| Produced::Attach {
                ineq: ineq.clone(),
                core: true,
            })
            .collect())
    }
}

pub fn parse_load_formula(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    if let Some(token) = words.next() {
        let count: i64 = token
            .parse()
            .map_err(|_| StepError::syntax(format!("expected an integer, got '{token}'")))?;
        // a lone 0 is just the terminator; anything else asserts the count
        if count != 0 {
            if count as usize != ctx.formula.constraints.len() {
                return Err(StepError::syntax(format!(
                    "number of constraints does not match, got {count} but there are {} constraints",
                    ctx.formula.constraints.len()
                )));
            }
            if let Some(zero) = words.next() {
                if zero != "0" {
                    return Err(StepError::syntax(format!("expected 0, got '{zero}'")));
                }
            }
        }
    }
    words.expect_end()?;
    Ok(Box::new(LoadFormula))
}

// ============================================================================
// l - LoadAxiom
// ============================================================================

struct LoadAxiom {
    index: usize,
}

impl ProofStep for LoadAxiom {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let ineq = ctx
            .formula
            .constraints
            .get(self.index - 1)
            .ok_or_else(|| {
                StepError::invalid(format!(
                    "the formula has no constraint {}",
                    self.index
                ))
            })?
            .clone();
        Ok(vec![Produced::Attach { ineq, core: true }])
    }
}

pub fn parse_load_axiom(
    words: &mut WordScanner<'_>,
    _ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let index = words.next_i64()?;
    words.expect_end()?;
    if index < 1 {
        return Err(StepError::syntax("formula constraints are numbered from 1"));
    }
    Ok(Box::new(LoadAxiom {
        index: index as usize,
    }))
}

// ============================================================================
// a - Assumption
// ============================================================================

struct Assumption {
    constraint: Ineq,
}

impl ProofStep for Assumption {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        ctx.uses_assumptions = true;
        Ok(vec![Produced::Attach {
            ineq: Rc::new(self.constraint.clone()),
            core: false,
        }])
    }
}

pub fn parse_assumption(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let constraint = parse_single_constraint(words, ctx)?;
    words.expect_end()?;
    Ok(Box::new(Assumption { constraint }))
}

// ============================================================================
// u / rup - ReverseUnitPropagation
// ============================================================================

struct ReverseUnitPropagation {
    constraint: Ineq,
}

impl ProofStep for ReverseUnitPropagation {
    fn antecedents(&self) -> Antecedents {
        Antecedents::All
    }

    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
        if !ctx.engine.rup_check(&self.constraint, false) {
            return Err(StepError::invalid(format!(
                "failed to show '{}' by reverse unit propagation",
                self.constraint.to_opb(&ctx.vars)
            )));
        }
        Ok(vec![Produced::Attach {
            ineq: Rc::new(self.constraint.clone()),
            core: false,
        }])
    }
}

pub fn parse_rup(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let constraint = parse_single_constraint(words, ctx)?;
    words.expect_end()?;
    Ok(Box::new(ReverseUnitPropagation { constraint }))
}

// ============================================================================
// e / i / j - comparisons against a given constraint
// ============================================================================

struct CompareToConstraint {
    id: ConstraintId,
    constraint: Ineq,
    /// e checks equality, i/j check implication.
    equality: bool,
    /// j also produces the given constraint.
    produce: bool,
}

impl ProofStep for CompareToConstraint {
    fn antecedents(&self) -> Antecedents {
        Antecedents::Ids(vec![self.id])
    }

    fn compute(&mut self, ctx: &mut Context, antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let antecedent = &antecedents[0];
        if self.equality {
            if **antecedent != self.constraint {
                return Err(StepError::invalid(format!(
                    "constraint equality check failed, expected '{}' got '{}'",
                    self.constraint.to_opb(&ctx.vars),
                    antecedent.to_opb(&ctx.vars)
                )));
            }
        } else if !antecedent.implies(&self.constraint) {
            return Err(StepError::invalid(format!(
                "implication check failed, '{}' does not imply '{}'",
                antecedent.to_opb(&ctx.vars),
                self.constraint.to_opb(&ctx.vars)
            )));
        }
        if self.produce {
            Ok(vec![Produced::Attach {
                ineq: Rc::new(self.constraint.clone()),
                core: false,
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

fn parse_compare(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
    equality: bool,
    produce: bool,
) -> StepResult<Box<dyn ProofStep>> {
    let raw = words.next_i64()?;
    let id = ctx.resolve_id(raw)?;
    let constraint = parse_single_constraint(words, ctx)?;
    words.expect_end()?;
    Ok(Box::new(CompareToConstraint {
        id,
        constraint,
        equality,
        produce,
    }))
}

pub fn parse_equals(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    parse_compare(words, ctx, true, false)
}

pub fn parse_implies(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    parse_compare(words, ctx, false, false)
}

pub fn parse_implies_get_implied(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    parse_compare(words, ctx, false, true)
}

// ============================================================================
// c - IsContradiction
// ============================================================================

struct IsContradiction {
    id: ConstraintId,
}

impl ProofStep for IsContradiction {
    fn antecedents(&self) -> Antecedents {
        Antecedents::Ids(vec![self.id])
    }

    fn compute(&mut self, ctx: &mut Context, antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        if !antecedents[0].is_contradiction() {
            return Err(StepError::invalid(format!(
                "constraint '{}' is not a contradiction",
                antecedents[0].to_opb(&ctx.vars)
            )));
        }
        ctx.contains_contradiction = true;
        Ok(Vec::new())
    }
}

pub fn parse_contradiction(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let raw = words.next_i64()?;
    // the trailing 0 terminator is optional
    if let Some(token) = words.next() {
        if token != "0" {
            return Err(StepError::syntax(format!("expected 0, got '{token}'")));
        }
        words.expect_end()?;
    }
    let id = ctx.resolve_id(raw)?;
    Ok(Box::new(IsContradiction { id }))
}

// ============================================================================
// v / ov / o - solutions and objective bounds
// ============================================================================

fn blocking_clause(assignment: &[Lit]) -> Ineq {
    Ineq::from_terms(
        assignment.iter().map(|&lit| (BigInt::one(), !lit)),
        BigInt::one(),
    )
}

struct Solution {
    assignment: Vec<Lit>,
}

impl ProofStep for Solution {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
        if ctx.engine.solution_check(&self.assignment).is_none() {
            return Err(StepError::invalid(
                "the assignment does not propagate to a model",
            ));
        }
        Ok(vec![Produced::Attach {
            ineq: Rc::new(blocking_clause(&self.assignment)),
            core: false,
        }])
    }
}

pub fn parse_solution(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let assignment = parse_lit_list(words, ctx)?;
    Ok(Box::new(Solution { assignment }))
}

struct OriginalSolution {
    assignment: Vec<Lit>,
}

impl ProofStep for OriginalSolution {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let assigned: HashSet<Lit> = self.assignment.iter().copied().collect();
        for (index, ineq) in ctx.formula.constraints.iter().enumerate() {
            let mut satisfied = BigInt::from(0);
            for term in ineq.terms() {
                if assigned.contains(&term.lit) {
                    satisfied += &term.coeff;
                }
            }
            if &satisfied < ineq.degree() {
                return Err(StepError::invalid(format!(
                    "the assignment does not satisfy formula constraint {}",
                    index + 1
                )));
            }
        }
        Ok(Vec::new())
    }
}

pub fn parse_original_solution(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let assignment = parse_lit_list(words, ctx)?;
    Ok(Box::new(OriginalSolution { assignment }))
}

struct ObjectiveBound {
    assignment: Vec<Lit>,
}

impl ProofStep for ObjectiveBound {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
        let model = ctx
            .engine
            .solution_check(&self.assignment)
            .ok_or_else(|| StepError::invalid("the assignment does not propagate to a model"))?;
        let objective = ctx
            .objective()
            .ok_or_else(|| StepError::invalid("the formula has no objective to bound"))?;

        let assigned: HashSet<Lit> = model.into_iter().collect();
        let value = objective.value_under(|lit| assigned.contains(&lit));

        // objective <= value - 1, normalized
        let bound = Ineq::from_terms(
            objective.terms.iter().map(|(c, l)| (-c.clone(), *l)),
            BigInt::one() - value,
        );
        Ok(vec![Produced::Attach {
            ineq: Rc::new(bound),
            core: false,
        }])
    }
}

pub fn parse_objective_bound(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let assignment = parse_lit_list(words, ctx)?;
    Ok(Box::new(ObjectiveBound { assignment }))
}

// ============================================================================
// del / d - DeleteConstraints, core - mark core, is_deleted
// ============================================================================

struct DeleteConstraints {
    ids: Vec<ConstraintId>,
}

impl ProofStep for DeleteConstraints {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        if ctx.check_deletions {
            for &id in &self.ids {
                if !ctx.db.contains(id) {
                    continue;
                }
                let ineq = ctx.db.get(id)?;
                if ctx.engine.is_core(&ineq) && !ctx.engine.rup_check(&ineq, true) {
                    return Err(StepError::invalid(format!(
                        "deletion of core constraint {id} is not justified by the remaining core"
                    )));
                }
            }
        }
        Ok(Vec::new())
    }

    fn deletions(&self) -> Vec<ConstraintId> {
        self.ids.clone()
    }
}

pub fn parse_delete(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let mode = words
        .peek()
        .ok_or_else(|| StepError::syntax("expected constraint ids to delete"))?;

    let ids = match mode {
        "spec" => {
            words.next();
            let constraint = parse_single_constraint(words, ctx)?;
            words.expect_end()?;
            match ctx
                .db
                .all_active()
                .iter()
                .find(|(_, ineq)| **ineq == constraint)
            {
                Some(&(id, _)) => vec![id],
                None => {
                    return Err(StepError::invalid(format!(
                        "no attached constraint matches '{}'",
                        constraint.to_opb(&ctx.vars)
                    )))
                }
            }
        }
        "range" => {
            words.next();
            let lo = ctx.resolve_id(words.next_i64()?)?;
            let hi = ctx.resolve_id(words.next_i64()?)?;
            words.expect_end()?;
            if lo > hi {
                return Err(StepError::syntax("empty deletion range"));
            }
            (lo..=hi).collect()
        }
        _ => {
            if mode == "id" {
                words.next();
            }
            let mut ids = Vec::new();
            while let Some(token) = words.next() {
                let raw: i64 = token.parse().map_err(|_| {
                    StepError::syntax(format!("expected a constraint id, got '{token}'"))
                })?;
                // a trailing 0 terminates the list
                if raw == 0 {
                    words.expect_end()?;
                    break;
                }
                ids.push(ctx.resolve_id(raw)?);
            }
            ids
        }
    };

    Ok(Box::new(DeleteConstraints { ids }))
}

struct MoveToCore {
    ids: Vec<ConstraintId>,
}

impl ProofStep for MoveToCore {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        for &id in &self.ids {
            let ineq = ctx.db.get(id)?;
            if !ctx.engine.move_to_core(&ineq) {
                return Err(StepError::invalid(format!(
                    "constraint {id} is not attached"
                )));
            }
        }
        Ok(Vec::new())
    }
}

pub fn parse_core(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    if words.peek() == Some("id") {
        words.next();
    }
    let mut ids = Vec::new();
    while let Some(token) = words.next() {
        let raw: i64 = token
            .parse()
            .map_err(|_| StepError::syntax(format!("expected a constraint id, got '{token}'")))?;
        if raw == 0 {
            words.expect_end()?;
            break;
        }
        ids.push(ctx.resolve_id(raw)?);
    }
    Ok(Box::new(MoveToCore { ids }))
}

struct IsDeleted {
    constraint: Ineq,
}

impl ProofStep for IsDeleted {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        if ctx.engine.find(&self.constraint).is_some() {
            return Err(StepError::invalid(format!(
                "constraint '{}' should be deleted",
                self.constraint.to_opb(&ctx.vars)
            )));
        }
        Ok(Vec::new())
    }
}

pub fn parse_is_deleted(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let constraint = parse_single_constraint(words, ctx)?;
    words.expect_end()?;
    Ok(Box::new(IsDeleted { constraint }))
}
