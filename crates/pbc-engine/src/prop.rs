// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Unit propagation over attached pseudo-Boolean constraints.
//!
//! The engine keeps, for every attached constraint, a running maximum of its
//! left-hand side over all literals not currently falsified (`max_sum`).
//! When a literal is assigned, every constraint containing its complement
//! loses that coefficient; a constraint whose maximum drops below its degree
//! is conflicting, and any unassigned literal whose coefficient exceeds
//! `max_sum - degree` must be true. This counter scheme reaches the same
//! fixed point as watched literals regardless of queue order, and every
//! update is reverted exactly by walking the trail backwards, which is what
//! makes RUP checks free of copying.
//!
//! Equal constraints share one attached record: attaching an equal
//! constraint bumps a refcount and returns the existing ID.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use pbc_core::{ConstraintId, Ineq, Lit, Substitution};

#[derive(Debug)]
struct Record {
    ineq: Rc<Ineq>,
    refcount: usize,
    is_core: bool,
    /// Sum of coefficients of non-falsified literals under the current
    /// assignment.
    max_sum: BigInt,
}

/// The propagation engine and attached-constraint store.
#[derive(Debug)]
pub struct PropEngine {
    /// Assignment per variable: 0 unassigned, 1 true, -1 false.
    values: Vec<i8>,
    /// Attached-record ID that forced each assignment; None for assumptions.
    reasons: Vec<Option<ConstraintId>>,
    trail: Vec<Lit>,
    qhead: usize,
    /// Sticky root-level conflict: the attached set is already contradictory.
    conflict: bool,
    records: BTreeMap<ConstraintId, Record>,
    index: HashMap<Rc<Ineq>, ConstraintId>,
    /// Literal -> IDs of attached constraints containing that literal.
    occ: Vec<Vec<ConstraintId>>,
    next_tmp: ConstraintId,
}

impl PropEngine {
    pub fn new(num_vars: u32) -> Self {
        let n = num_vars as usize;
        Self {
            values: vec![0; n + 1],
            reasons: vec![None; n + 1],
            trail: Vec::new(),
            qhead: 0,
            conflict: false,
            records: BTreeMap::new(),
            index: HashMap::new(),
            occ: vec![Vec::new(); 2 * (n + 1)],
            next_tmp: pbc_core::MAX_ID - 1,
        }
    }

    /// Grow internal vectors to cover variables up to `n`. Never shrinks.
    pub fn increase_num_vars_to(&mut self, n: u32) {
        let n = n as usize;
        if self.values.len() < n + 1 {
            self.values.resize(n + 1, 0);
            self.reasons.resize(n + 1, None);
            self.occ.resize(2 * (n + 1), Vec::new());
        }
    }

    fn lit_index(lit: Lit) -> usize {
        2 * lit.var().index() + lit.is_negated() as usize
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        match self.values[lit.var().index()] {
            0 => None,
            v => Some((v > 0) != lit.is_negated()),
        }
    }

    /// Whether the attached set is contradictory at the root level.
    pub fn is_conflicting(&self) -> bool {
        self.conflict
    }

    /// Literals that unit-propagate to true from the empty assumption.
    pub fn propagated_lits(&self) -> Vec<Lit> {
        self.trail.clone()
    }

    /// ID of an equal attached constraint, if any.
    pub fn find(&self, ineq: &Ineq) -> Option<ConstraintId> {
        self.index.get(ineq).copied()
    }

    pub fn is_core(&self, ineq: &Ineq) -> bool {
        self.find(ineq)
            .and_then(|id| self.records.get(&id))
            .is_some_and(|rec| rec.is_core)
    }

    /// Promote an attached constraint to core. Returns false when absent.
    pub fn move_to_core(&mut self, ineq: &Ineq) -> bool {
        match self.index.get(ineq).copied() {
            Some(id) => {
                if let Some(rec) = self.records.get_mut(&id) {
                    rec.is_core = true;
                }
                true
            }
            None => false,
        }
    }

    /// Attach a constraint under the given proof ID.
    ///
    /// If an equal constraint is already attached, its refcount rises, core
    /// status may be promoted, and the existing ID is returned. Otherwise
    /// the constraint is installed, immediately propagated, and `id` is
    /// returned.
    pub fn attach(&mut self, ineq: Rc<Ineq>, id: ConstraintId, core: bool) -> ConstraintId {
        let (attached, fresh) = self.attach_silent(ineq, id, core);
        if fresh {
            if self.initial_check(attached, false, None) || self.propagate(false, None) {
                self.conflict = true;
            }
        }
        attached
    }

    /// Bookkeeping half of attach: no propagation.
    fn attach_silent(&mut self, ineq: Rc<Ineq>, id: ConstraintId, core: bool) -> (ConstraintId, bool) {
        if let Some(&existing) = self.index.get(ineq.as_ref()) {
            let rec = self
                .records
                .get_mut(&existing)
                .expect("indexed record exists");
            rec.refcount += 1;
            rec.is_core |= core;
            return (existing, false);
        }

        let max_var = ineq
            .terms()
            .iter()
            .map(|t| t.lit.var().0)
            .max()
            .unwrap_or(0);
        self.increase_num_vars_to(max_var);

        let mut max_sum = BigInt::zero();
        for term in ineq.terms() {
            if self.value(term.lit) != Some(false) {
                max_sum += &term.coeff;
            }
            self.occ[Self::lit_index(term.lit)].push(id);
        }
        self.records.insert(
            id,
            Record {
                ineq: ineq.clone(),
                refcount: 1,
                is_core: core,
                max_sum,
            },
        );
        self.index.insert(ineq, id);
        (id, true)
    }

    /// Detach one reference to an equal attached constraint. Returns the
    /// removed ID when the refcount reaches zero.
    pub fn detach(&mut self, ineq: &Ineq) -> Option<ConstraintId> {
        let id = self.index.get(ineq).copied()?;
        let rec = self.records.get_mut(&id).expect("indexed record exists");
        rec.refcount -= 1;
        if rec.refcount > 0 {
            return None;
        }

        let removed = self.records.remove(&id).expect("record present");
        self.index.remove(removed.ineq.as_ref());
        for term in removed.ineq.terms() {
            self.occ[Self::lit_index(term.lit)].retain(|&x| x != id);
        }

        // Propagations justified by the removed constraint, or a root
        // conflict it may have caused, are stale now.
        let stale = self.conflict
            || self
                .trail
                .iter()
                .any(|l| self.reasons[l.var().index()] == Some(id));
        if stale {
            self.repropagate();
        }
        Some(id)
    }

    fn repropagate(&mut self) {
        self.rollback(0);
        self.qhead = 0;
        self.conflict = false;
        let ids: Vec<ConstraintId> = self.records.keys().copied().collect();
        for id in ids {
            if self.initial_check(id, false, None) {
                self.conflict = true;
                return;
            }
        }
        if self.propagate(false, None) {
            self.conflict = true;
        }
    }

    /// Reverse unit propagation: does attaching the negation of `ineq`
    /// produce a conflict? The engine state is restored afterwards.
    ///
    /// With `core_only`, only core constraints (and the temporary negation
    /// itself) may propagate or conflict. The root trail may contain
    /// propagations justified by derived constraints, so a core-only check
    /// restarts propagation from the empty assignment and rebuilds the root
    /// state when done.
    pub fn rup_check(&mut self, ineq: &Ineq, core_only: bool) -> bool {
        if self.conflict {
            return true;
        }
        if core_only {
            return self.rup_check_core_only(ineq);
        }
        let saved_trail = self.trail.len();
        let saved_qhead = self.qhead;

        let negated = Rc::new(ineq.negated());
        let tmp_id = self.next_tmp;
        self.next_tmp -= 1;
        let (attached, _fresh) = self.attach_silent(negated.clone(), tmp_id, false);

        let mut conflicting = self.initial_check(attached, false, Some(attached));
        if !conflicting {
            conflicting = self.propagate(false, Some(attached));
        }

        self.rollback(saved_trail);
        self.qhead = saved_qhead;
        self.detach(&negated);
        self.next_tmp += 1;
        conflicting
    }

    fn rup_check_core_only(&mut self, ineq: &Ineq) -> bool {
        self.rollback(0);
        self.qhead = 0;

        let mut conflicting = false;
        let ids: Vec<ConstraintId> = self.records.keys().copied().collect();
        for id in ids {
            if self.records[&id].is_core && self.initial_check(id, true, None) {
                conflicting = true;
                break;
            }
        }

        let negated = Rc::new(ineq.negated());
        let tmp_id = self.next_tmp;
        self.next_tmp -= 1;
        let (attached, _fresh) = self.attach_silent(negated.clone(), tmp_id, false);
        if !conflicting {
            conflicting = self.initial_check(attached, true, Some(attached));
        }
        if !conflicting {
            conflicting = self.propagate(true, Some(attached));
        }

        self.rollback(0);
        self.qhead = 0;
        self.detach(&negated);
        self.next_tmp += 1;
        self.repropagate();
        conflicting
    }

    /// Check a just-attached or re-checked record against the current
    /// assignment: conflict, or enqueue its unit consequences.
    fn initial_check(
        &mut self,
        id: ConstraintId,
        core_only: bool,
        exempt: Option<ConstraintId>,
    ) -> bool {
        let (ineq, slack, usable) = {
            let rec = match self.records.get(&id) {
                Some(rec) => rec,
                None => return false,
            };
            let slack = &rec.max_sum - rec.ineq.degree();
            let usable = !core_only || rec.is_core || exempt == Some(id);
            (rec.ineq.clone(), slack, usable)
        };
        if !usable {
            return false;
        }
        if slack.is_negative() {
            return true;
        }
        for term in ineq.terms() {
            if term.coeff > slack && self.value(term.lit).is_none() {
                self.enqueue(term.lit, Some(id));
            }
        }
        false
    }

    /// Assign a literal, updating the running maximum of every constraint
    /// containing its complement. The update happens at assignment time so
    /// that rollback is symmetric no matter where propagation stopped.
    fn enqueue(&mut self, lit: Lit, reason: Option<ConstraintId>) {
        debug_assert!(self.value(lit).is_none());
        let var = lit.var().index();
        self.values[var] = if lit.is_negated() { -1 } else { 1 };
        self.reasons[var] = reason;
        self.trail.push(lit);

        let falsified = !lit;
        let occ_idx = Self::lit_index(falsified);
        for k in 0..self.occ[occ_idx].len() {
            let id = self.occ[occ_idx][k];
            if let Some(rec) = self.records.get_mut(&id) {
                let coeff = rec
                    .ineq
                    .term_for(falsified.var())
                    .expect("occurrence entry matches a term")
                    .coeff
                    .clone();
                rec.max_sum -= coeff;
            }
        }
    }

    /// Propagate to fixed point. Returns true on conflict; the trail is
    /// left as is for the caller to roll back or keep.
    fn propagate(&mut self, core_only: bool, exempt: Option<ConstraintId>) -> bool {
        while self.qhead < self.trail.len() {
            let lit = self.trail[self.qhead];
            self.qhead += 1;
            let falsified = !lit;
            let occ_idx = Self::lit_index(falsified);

            for k in 0..self.occ[occ_idx].len() {
                let id = self.occ[occ_idx][k];
                let (ineq, slack, usable) = {
                    let rec = match self.records.get(&id) {
                        Some(rec) => rec,
                        None => continue,
                    };
                    let slack = &rec.max_sum - rec.ineq.degree();
                    let usable = !core_only || rec.is_core || exempt == Some(id);
                    (rec.ineq.clone(), slack, usable)
                };
                if !usable {
                    continue;
                }
                if slack.is_negative() {
                    return true;
                }
                for term in ineq.terms() {
                    if term.coeff > slack && self.value(term.lit).is_none() {
                        self.enqueue(term.lit, Some(id));
                    }
                }
            }
        }
        false
    }

    /// Unassign down to `to_len` trail entries, restoring every counter.
    fn rollback(&mut self, to_len: usize) {
        while self.trail.len() > to_len {
            let lit = self.trail.pop().expect("trail is non-empty");
            let falsified = !lit;
            let occ_idx = Self::lit_index(falsified);
            for k in 0..self.occ[occ_idx].len() {
                let id = self.occ[occ_idx][k];
                if let Some(rec) = self.records.get_mut(&id) {
                    let coeff = rec
                        .ineq
                        .term_for(falsified.var())
                        .expect("occurrence entry matches a term")
                        .coeff
                        .clone();
                    rec.max_sum += coeff;
                }
            }
            let var = lit.var().index();
            self.values[var] = 0;
            self.reasons[var] = None;
        }
        self.qhead = self.qhead.min(to_len);
    }

    /// Verify a claimed solution: assume the given literals, propagate, and
    /// check that every attached constraint is satisfied. On success returns
    /// the full propagated assignment; the engine state is restored either
    /// way.
    pub fn solution_check(&mut self, lits: &[Lit]) -> Option<Vec<Lit>> {
        if self.conflict {
            return None;
        }
        let saved_trail = self.trail.len();
        let saved_qhead = self.qhead;

        let mut ok = true;
        for &lit in lits {
            match self.value(lit) {
                Some(true) => {}
                Some(false) => {
                    ok = false;
                    break;
                }
                None => self.enqueue(lit, None),
            }
        }
        if ok {
            ok = !self.propagate(false, None);
        }
        if ok {
            for rec in self.records.values() {
                let mut satisfied = BigInt::zero();
                for term in rec.ineq.terms() {
                    if self.value(term.lit) == Some(true) {
                        satisfied += &term.coeff;
                    }
                }
                if &satisfied < rec.ineq.degree() {
                    ok = false;
                    break;
                }
            }
        }

        let model = if ok { Some(self.trail.clone()) } else { None };
        self.rollback(saved_trail);
        self.qhead = saved_qhead;
        model
    }

    /// Attached constraints with ID below `max_id` whose terms intersect the
    /// support of `witness`, with the witness applied, ascending by ID.
    pub fn compute_effected(
        &self,
        witness: &Substitution,
        max_id: ConstraintId,
    ) -> Vec<(ConstraintId, Ineq)> {
        let mut ids: BTreeSet<ConstraintId> = BTreeSet::new();
        for var in witness.support() {
            for lit in [var.pos(), var.neg()] {
                let idx = Self::lit_index(lit);
                if let Some(list) = self.occ.get(idx) {
                    ids.extend(list.iter().copied().filter(|&id| id < max_id));
                }
            }
        }
        ids.into_iter()
            .map(|id| {
                let rec = &self.records[&id];
                (id, rec.ineq.substitute(witness))
            })
            .collect()
    }

    /// Fresh ID for a temporary hypothesis, outside the proof ID space.
    pub fn fresh_tmp_id(&mut self) -> ConstraintId {
        let id = self.next_tmp;
        self.next_tmp -= 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbc_core::Var;

    fn rc(terms: &[(i64, i32)], degree: i64) -> Rc<Ineq> {
        Rc::new(Ineq::from_terms(
            terms.iter().map(|&(c, l)| {
                let var = Var(l.unsigned_abs());
                (BigInt::from(c), Lit::new(var, l < 0))
            }),
            BigInt::from(degree),
        ))
    }

    #[test]
    fn test_unit_clause_propagates() {
        let mut engine = PropEngine::new(2);
        engine.attach(rc(&[(1, 1)], 1), 1, false);
        assert_eq!(engine.propagated_lits(), vec![Var(1).pos()]);

        // x1 true forces x2 via ~x1 + x2 >= 1
        engine.attach(rc(&[(1, -1), (1, 2)], 1), 2, false);
        assert_eq!(
            engine.propagated_lits(),
            vec![Var(1).pos(), Var(2).pos()]
        );
        assert!(!engine.is_conflicting());
    }

    #[test]
    fn test_attach_conflict_sticks() {
        let mut engine = PropEngine::new(1);
        engine.attach(rc(&[(1, 1)], 1), 1, false);
        engine.attach(rc(&[(1, -1)], 1), 2, false);
        assert!(engine.is_conflicting());
        // with a contradictory database every RUP check succeeds
        assert!(engine.rup_check(&rc(&[(1, 1)], 1), false));
    }

    #[test]
    fn test_pb_propagation_by_coefficient() {
        // 3 x1 + 1 x2 + 1 x3 >= 4 forces x1 outright, and x3 once x2 falls
        let mut engine = PropEngine::new(3);
        engine.attach(rc(&[(3, 1), (1, 2), (1, 3)], 4), 1, false);
        assert!(engine.propagated_lits().contains(&Var(1).pos()));
        assert!(!engine.propagated_lits().contains(&Var(3).pos()));

        engine.attach(rc(&[(1, -2)], 1), 2, false);
        assert!(engine.propagated_lits().contains(&Var(3).pos()));
        assert!(!engine.is_conflicting());
    }

    #[test]
    fn test_rup_check_and_purity() {
        let mut engine = PropEngine::new(2);
        engine.attach(rc(&[(1, 1)], 1), 1, false);
        engine.attach(rc(&[(1, -1), (1, 2)], 1), 2, false);

        let trail_before = engine.propagated_lits();
        let find_before = engine.find(&rc(&[(1, 1)], 1));

        // x2 >= 1 is RUP: negating forces ~x2, conflicting with propagation
        assert!(engine.rup_check(&rc(&[(1, 2)], 1), false));
        // x1 + x2 >= 2 likewise; ~x1 >= 1 is not derivable
        assert!(!engine.rup_check(&rc(&[(1, -1)], 1), false));

        assert_eq!(engine.propagated_lits(), trail_before);
        assert_eq!(engine.find(&rc(&[(1, 1)], 1)), find_before);
        assert!(!engine.is_conflicting());
    }

    #[test]
    fn test_attach_deduplicates() {
        let mut engine = PropEngine::new(2);
        let c = rc(&[(1, 1), (1, 2)], 1);
        assert_eq!(engine.attach(c.clone(), 1, false), 1);
        // equal constraint: same ID returned, refcount bumped
        assert_eq!(engine.attach(rc(&[(1, 1), (1, 2)], 1), 2, true), 1);
        assert!(engine.is_core(&c));

        assert_eq!(engine.detach(&c), None);
        assert_eq!(engine.detach(&c), Some(1));
        assert_eq!(engine.find(&c), None);
    }

    #[test]
    fn test_detach_restores_find() {
        let mut engine = PropEngine::new(2);
        let c = rc(&[(1, 1), (1, 2)], 1);
        let before = engine.find(&c);
        engine.attach(c.clone(), 1, false);
        engine.detach(&c);
        assert_eq!(engine.find(&c), before);
    }

    #[test]
    fn test_detach_reason_repropagates() {
        let mut engine = PropEngine::new(2);
        let unit = rc(&[(1, 1)], 1);
        engine.attach(unit.clone(), 1, false);
        engine.attach(rc(&[(1, -1), (1, 2)], 1), 2, false);
        assert_eq!(engine.propagated_lits().len(), 2);

        engine.detach(&unit);
        assert!(engine.propagated_lits().is_empty());
        assert!(!engine.is_conflicting());
    }

    #[test]
    fn test_core_only_rup() {
        let mut engine = PropEngine::new(1);
        engine.attach(rc(&[(1, 1)], 1), 1, false);
        // derived-only support is invisible to a core-only check
        assert!(!engine.rup_check(&rc(&[(1, 1)], 1), true));
        engine.move_to_core(&rc(&[(1, 1)], 1));
        assert!(engine.rup_check(&rc(&[(1, 1)], 1), true));
    }

    #[test]
    fn test_solution_check() {
        let mut engine = PropEngine::new(2);
        engine.attach(rc(&[(1, 1), (1, 2)], 1), 1, false);

        let model = engine.solution_check(&[Var(1).pos()]).unwrap();
        assert!(model.contains(&Var(1).pos()));
        assert!(engine.solution_check(&[Var(1).neg(), Var(2).neg()]).is_none());
        // engine state untouched
        assert!(engine.propagated_lits().is_empty());
    }

    #[test]
    fn test_compute_effected() {
        let mut engine = PropEngine::new(3);
        engine.attach(rc(&[(1, 1), (1, 2)], 1), 1, false);
        engine.attach(rc(&[(1, 3)], 1), 2, false);

        let mut witness = Substitution::new();
        witness.set_constant(Var(2).pos());

        let effected = engine.compute_effected(&witness, pbc_core::MAX_ID);
        assert_eq!(effected.len(), 1);
        assert_eq!(effected[0].0, 1);
        // x2 = 1 satisfies the clause: the substituted copy is trivial
        assert!(effected[0].1.is_trivial());

        // the ID bound hides constraints at or above it
        assert!(engine.compute_effected(&witness, 1).is_empty());
    }
}
