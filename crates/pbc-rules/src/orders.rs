// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Order definitions and the dominance rule.
//!
//! `pre_order` opens a sub-verifier with its own propagation engine and
//! database in which the order's variables, defining constraints, and the
//! irreflexivity and transitivity proofs are given. Once the scope closes
//! successfully the order joins the catalogue; `load_order` binds it to
//! concrete variables, and `dom` uses the bound order to justify new
//! constraints against a witness.

use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use pbc_core::{
    ConstraintId, Image, Ineq, OpbParser, StepError, StepResult, Substitution, Var, WordScanner,
};
use pbc_engine::{Database, PropEngine};

use crate::catalogue::parse_single_constraint;
use crate::context::Context;
use crate::multigoal::{objective_condition, parse_explicit_marker, MultiGoal};
use crate::rule::{Antecedents, Produced, ProofStep, RuleSetKind, Transition};
use crate::subcontext::{FrameKind, OrderScopeState, Subgoal};

/// A fully checked order definition.
pub struct OrderDef {
    pub name: String,
    pub left: Vec<Var>,
    pub right: Vec<Var>,
    pub aux: Vec<Var>,
    pub definition: Vec<Rc<Ineq>>,
}

/// An order definition under construction inside a `pre_order` scope.
#[derive(Default)]
pub struct OrderDefBuilder {
    pub name: String,
    pub left: Vec<Var>,
    pub right: Vec<Var>,
    pub aux: Vec<Var>,
    pub definition: Vec<Rc<Ineq>>,
    pub fresh_right: Vec<Var>,
    pub fresh_aux1: Vec<Var>,
    pub fresh_aux2: Vec<Var>,
    pub irreflexivity_proven: bool,
    pub transitivity_proven: bool,
}

impl OrderDefBuilder {
    fn finish(self) -> StepResult<OrderDef> {
        if self.left.len() != self.right.len() {
            return Err(StepError::invalid(
                "the left and right variable lists of the order differ in length",
            ));
        }
        let mut seen = Vec::new();
        for &var in self.left.iter().chain(&self.right) {
            if seen.contains(&var) {
                return Err(StepError::invalid(
                    "the left and right variable lists of the order must be disjoint",
                ));
            }
            seen.push(var);
        }
        for &var in &self.aux {
            if seen.contains(&var) {
                return Err(StepError::invalid(
                    "auxiliary order variables must be fresh",
                ));
            }
            seen.push(var);
        }
        if !self.irreflexivity_proven {
            return Err(StepError::invalid(
                "the proof did not show irreflexivity of the order",
            ));
        }
        if !self.transitivity_proven {
            return Err(StepError::invalid(
                "the proof did not show transitivity of the order",
            ));
        }
        Ok(OrderDef {
            name: self.name,
            left: self.left,
            right: self.right,
            aux: self.aux,
            definition: self.definition,
        })
    }
}

/// Goals generated by one dominance application, cached per witness.
pub struct DomGoals {
    pub effected: Vec<(ConstraintId, Ineq)>,
    pub progress: Vec<Ineq>,
    pub strict: Vec<Ineq>,
    pub objective: Option<Ineq>,
}

/// An order bound to concrete variables by `load_order`.
pub struct ActiveOrder {
    pub def: Rc<OrderDef>,
    pub vars: Vec<Var>,
    /// Constraints at or above this ID are invisible to dominance goals.
    pub first_dom_invisible: ConstraintId,
    cache: HashMap<Substitution, Rc<DomGoals>>,
}

fn apply_image(sub: &mut Substitution, var: Var, image: Image, fallback: Var) {
    match image {
        Image::True => sub.set_constant(var.pos()),
        Image::False => sub.set_constant(var.neg()),
        Image::Lit(lit) => sub.map(var, lit),
        Image::Unchanged => sub.map(var, fallback.pos()),
    }
}

impl ActiveOrder {
    fn cached_goals(&mut self, ctx: &Context, witness: &Substitution) -> Rc<DomGoals> {
        if let Some(goals) = self.cache.get(witness) {
            return goals.clone();
        }

        let effected = ctx
            .engine
            .compute_effected(witness, self.first_dom_invisible);

        // Progress: the witness image takes the smaller (left) side,
        // the bound variables the right side.
        let mut progress_sub = Substitution::new();
        // Strictness: the sides flipped; contradiction must follow.
        let mut strict_sub = Substitution::new();
        let pairs = self.def.left.iter().zip(&self.def.right).zip(&self.vars);
        for ((&left, &right), &var) in pairs {
            apply_image(&mut progress_sub, left, witness.image_of_var(var), var);
            progress_sub.map(right, var.pos());
            strict_sub.map(left, var.pos());
            apply_image(&mut strict_sub, right, witness.image_of_var(var), var);
        }
        for &aux in &self.def.aux {
            if let image @ (Image::True | Image::False | Image::Lit(_)) =
                witness.image_of_var(aux)
            {
                apply_image(&mut progress_sub, aux, image, aux);
                apply_image(&mut strict_sub, aux, image, aux);
            }
        }

        let progress = self
            .def
            .definition
            .iter()
            .map(|d| d.substitute(&progress_sub))
            .collect();
        let strict = self
            .def
            .definition
            .iter()
            .map(|d| d.substitute(&strict_sub))
            .collect();

        let goals = Rc::new(DomGoals {
            effected,
            progress,
            strict,
            objective: objective_condition(ctx, witness),
        });
        self.cache.insert(witness.clone(), goals.clone());
        goals
    }
}

/// Catalogue of defined orders plus the definition and binding state.
#[derive(Default)]
pub struct OrderStore {
    orders: HashMap<String, Rc<OrderDef>>,
    pub active: Option<ActiveOrder>,
    pub defining: Option<OrderDefBuilder>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Rc<OrderDef>> {
        self.orders.get(name).cloned()
    }

    pub fn install(&mut self, def: OrderDef) {
        self.orders.insert(def.name.clone(), Rc::new(def));
    }

    /// Variables fixed by the active order; witnesses may not touch them.
    pub fn active_vars(&self) -> Vec<Var> {
        self.active
            .as_ref()
            .map(|a| a.vars.clone())
            .unwrap_or_default()
    }

    fn defining_mut(&mut self) -> StepResult<&mut OrderDefBuilder> {
        self.defining
            .as_mut()
            .ok_or_else(|| StepError::syntax("no order is being defined here"))
    }
}

struct NoOp;

impl ProofStep for NoOp {
    fn compute(&mut self, _ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        Ok(Vec::new())
    }
}

/// A structural block opener (`vars`, `def`, `transitivity`).
struct BlockOpen {
    target: RuleSetKind,
}

impl ProofStep for BlockOpen {
    fn compute(&mut self, _ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        Ok(Vec::new())
    }

    fn transition(&self) -> Transition {
        Transition::Set(self.target)
    }
}

fn parse_block(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
    kind: FrameKind,
    target: RuleSetKind,
) -> StepResult<Box<dyn ProofStep>> {
    words.expect_end()?;
    ctx.subcontexts.push(kind, ctx.current_rules);
    Ok(Box::new(BlockOpen { target }))
}

pub fn parse_order_vars_block(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    parse_block(words, ctx, FrameKind::Plain, RuleSetKind::OrderVars)
}

pub fn parse_order_def_block(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    parse_block(words, ctx, FrameKind::Plain, RuleSetKind::OrderDef)
}

pub fn parse_transitivity_block(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    parse_block(words, ctx, FrameKind::Transitivity, RuleSetKind::TransRoot)
}

pub fn parse_trans_vars_block(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    parse_block(words, ctx, FrameKind::Plain, RuleSetKind::TransVars)
}

fn parse_var_list(words: &mut WordScanner<'_>, ctx: &mut Context) -> StepResult<Vec<Var>> {
    let mut vars = Vec::new();
    while let Some(token) = words.next() {
        let lit = ctx.vars.lit(token)?;
        if lit.is_negated() {
            return Err(StepError::syntax(
                "order variables may not be negated literals",
            ));
        }
        vars.push(lit.var());
    }
    ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
    Ok(vars)
}

macro_rules! var_list_rule {
    ($name:ident, $field:ident) => {
        pub fn $name(
            words: &mut WordScanner<'_>,
            ctx: &mut Context,
        ) -> StepResult<Box<dyn ProofStep>> {
            let vars = parse_var_list(words, ctx)?;
            ctx.orders.defining_mut()?.$field.extend(vars);
            Ok(Box::new(NoOp))
        }
    };
}

var_list_rule!(parse_left, left);
var_list_rule!(parse_right, right);
var_list_rule!(parse_aux, aux);
var_list_rule!(parse_fresh_right, fresh_right);
var_list_rule!(parse_fresh_aux1, fresh_aux1);
var_list_rule!(parse_fresh_aux2, fresh_aux2);

/// Default rule of the `def` block: each line is a defining constraint.
pub fn parse_order_definition(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let parsed = OpbParser::new(&mut ctx.vars, true).constraint(words)?;
    words.expect_end()?;
    let builder = ctx.orders.defining_mut()?;
    builder.definition.extend(parsed.into_iter().map(Rc::new));
    Ok(Box::new(NoOp))
}

// ============================================================================
// pre_order - define an order in a nested sub-verifier
// ============================================================================

struct PreOrder {
    name: String,
}

impl ProofStep for PreOrder {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        if ctx.orders.defining.is_some() {
            return Err(StepError::invalid(
                "tried to define a new order while the previous definition is unfinished",
            ));
        }
        let state = OrderScopeState {
            saved_engine: mem::replace(&mut ctx.engine, PropEngine::new(ctx.vars.num_vars())),
            saved_db: mem::replace(&mut ctx.db, Database::new()),
            saved_first_free_id: ctx.first_free_id,
            saved_contains_contradiction: ctx.contains_contradiction,
            saved_uses_assumptions: ctx.uses_assumptions,
        };
        ctx.first_free_id = 1;
        ctx.contains_contradiction = false;
        ctx.uses_assumptions = false;
        ctx.subcontexts
            .push(FrameKind::OrderScope(state), ctx.current_rules);
        ctx.orders.defining = Some(OrderDefBuilder {
            name: self.name.clone(),
            ..OrderDefBuilder::default()
        });
        Ok(Vec::new())
    }

    fn transition(&self) -> Transition {
        Transition::Set(RuleSetKind::OrderRoot)
    }
}

pub fn parse_pre_order(
    words: &mut WordScanner<'_>,
    _ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let name = words.expect_next("expected an order name")?.to_string();
    words.expect_end()?;
    Ok(Box::new(PreOrder { name }))
}

/// `end` of the whole `pre_order` scope: check and install the order,
/// then restore the outer verifier state.
struct OrderScopeEnd {
    restore: RuleSetKind,
}

impl ProofStep for OrderScopeEnd {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let frame = ctx
            .subcontexts
            .pop()
            .ok_or_else(|| StepError::syntax("nothing to end here"))?;
        let state = match frame.kind {
            FrameKind::OrderScope(state) => state,
            _ => {
                return Err(StepError::Internal(
                    "order scope end outside an order scope".into(),
                ))
            }
        };

        let builder = ctx
            .orders
            .defining
            .take()
            .ok_or_else(|| StepError::Internal("order scope without a definition".into()))?;
        let def = builder.finish()?;
        ctx.orders.install(def);

        let sub_uses_assumptions = ctx.uses_assumptions;
        ctx.engine = state.saved_engine;
        ctx.db = state.saved_db;
        ctx.first_free_id = state.saved_first_free_id;
        ctx.contains_contradiction = state.saved_contains_contradiction;
        ctx.uses_assumptions = state.saved_uses_assumptions || sub_uses_assumptions;

        self.restore = frame.saved_rules;
        Ok(Vec::new())
    }

    fn transition(&self) -> Transition {
        Transition::Set(self.restore)
    }
}

pub fn parse_order_scope_end(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    words.expect_end()?;
    Ok(Box::new(OrderScopeEnd {
        restore: ctx.current_rules,
    }))
}

// ============================================================================
// irreflexive / transitivity proof - multi-goal obligations of the order
// ============================================================================

struct Irreflexive {
    definition: Vec<Rc<Ineq>>,
    left: Vec<Var>,
    right: Vec<Var>,
    mg: Option<MultiGoal>,
    transition: Transition,
}

impl ProofStep for Irreflexive {
    fn antecedents(&self) -> Antecedents {
        Antecedents::All
    }

    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let mut mg = self
            .mg
            .take()
            .ok_or_else(|| StepError::Internal("irreflexivity step executed twice".into()))?;

        // Substituting right for left turns the definition into "the tuple
        // precedes itself"; that must be contradictory.
        let mut sub = Substitution::new();
        sub.map_all(&self.right, &self.left);
        for ineq in &self.definition {
            mg.add_available(Rc::new(ineq.substitute(&sub)));
        }
        mg.add_subgoal(
            ctx,
            None,
            Subgoal::RightHand(Rc::new(Ineq::contradiction())),
        )?;

        let (produced, transition) = mg.finish(ctx)?;
        self.transition = transition;
        Ok(produced)
    }

    fn transition(&self) -> Transition {
        self.transition
    }
}

pub fn parse_irreflexive(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    words.expect_end()?;
    let builder = ctx.orders.defining_mut()?;
    builder.irreflexivity_proven = true;
    let definition = builder.definition.clone();
    let left = builder.left.clone();
    let right = builder.right.clone();

    let mg = MultiGoal::begin(ctx, true, RuleSetKind::ProofBody);
    Ok(Box::new(Irreflexive {
        definition,
        left,
        right,
        mg: Some(mg),
        transition: Transition::Keep,
    }))
}

struct TransitivityProof {
    definition: Vec<Rc<Ineq>>,
    left: Vec<Var>,
    right: Vec<Var>,
    fresh_right: Vec<Var>,
    mg: Option<MultiGoal>,
    transition: Transition,
}

impl ProofStep for TransitivityProof {
    fn antecedents(&self) -> Antecedents {
        Antecedents::All
    }

    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let mut mg = self
            .mg
            .take()
            .ok_or_else(|| StepError::Internal("transitivity step executed twice".into()))?;

        // Hypotheses: x < y (the definition itself) and y < z.
        for ineq in &self.definition {
            mg.add_available(ineq.clone());
        }
        let mut shift = Substitution::new();
        shift.map_all(&self.left, &self.right);
        shift.map_all(&self.right, &self.fresh_right);
        for ineq in &self.definition {
            mg.add_available(Rc::new(ineq.substitute(&shift)));
        }

        // Goals: x < z.
        let mut span = Substitution::new();
        span.map_all(&self.right, &self.fresh_right);
        for ineq in &self.definition {
            mg.add_subgoal(
                ctx,
                None,
                Subgoal::RightHand(Rc::new(ineq.substitute(&span))),
            )?;
        }

        let (produced, transition) = mg.finish(ctx)?;
        self.transition = transition;
        Ok(produced)
    }

    fn transition(&self) -> Transition {
        self.transition
    }
}

pub fn parse_trans_proof(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    words.expect_end()?;
    let builder = ctx.orders.defining_mut()?;
    if builder.fresh_right.len() != builder.right.len() {
        return Err(StepError::syntax(
            "the transitivity proof needs one fresh variable per right variable",
        ));
    }
    builder.transitivity_proven = true;
    let definition = builder.definition.clone();
    let left = builder.left.clone();
    let right = builder.right.clone();
    let fresh_right = builder.fresh_right.clone();

    let mg = MultiGoal::begin(ctx, true, RuleSetKind::ProofBody);
    Ok(Box::new(TransitivityProof {
        definition,
        left,
        right,
        fresh_right,
        mg: Some(mg),
        transition: Transition::Keep,
    }))
}

// ============================================================================
// load_order - bind a defined order to concrete variables
// ============================================================================

struct LoadOrder {
    binding: Option<(Rc<OrderDef>, Vec<Var>)>,
}

impl ProofStep for LoadOrder {
    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        ctx.orders.active = self.binding.take().map(|(def, vars)| ActiveOrder {
            def,
            vars,
            first_dom_invisible: ctx.first_free_id,
            cache: HashMap::new(),
        });
        Ok(Vec::new())
    }
}

pub fn parse_load_order(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let name = match words.next() {
        // bare load_order unbinds the active order
        None => return Ok(Box::new(LoadOrder { binding: None })),
        Some(name) => name.to_string(),
    };
    let mut vars = Vec::new();
    while let Some(token) = words.next() {
        let lit = ctx.vars.lit(token)?;
        if lit.is_negated() {
            return Err(StepError::syntax(
                "an order may not be loaded on negated variables",
            ));
        }
        vars.push(lit.var());
    }
    let def = ctx
        .orders
        .get(&name)
        .ok_or_else(|| StepError::syntax(format!("unknown order '{name}'")))?;
    if vars.len() != def.left.len() {
        return Err(StepError::syntax(format!(
            "the order expects {} variables, got {}",
            def.left.len(),
            vars.len()
        )));
    }
    ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
    Ok(Box::new(LoadOrder {
        binding: Some((def, vars)),
    }))
}

// ============================================================================
// dom - DominanceRule
// ============================================================================

struct DominanceRule {
    constraint: Ineq,
    witness: Substitution,
    mg: Option<MultiGoal>,
    transition: Transition,
}

impl ProofStep for DominanceRule {
    fn antecedents(&self) -> Antecedents {
        Antecedents::All
    }

    fn compute(&mut self, ctx: &mut Context, _antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let mut mg = self
            .mg
            .take()
            .ok_or_else(|| StepError::Internal("dominance step executed twice".into()))?;
        let mut active = ctx
            .orders
            .active
            .take()
            .ok_or_else(|| StepError::invalid("the dominance rule needs a loaded order"))?;

        let constraint = Rc::new(self.constraint.clone());
        ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
        mg.add_available(Rc::new(constraint.negated()));

        let goals = active.cached_goals(ctx, &self.witness);
        let result = (|| {
            for (id, ineq) in &goals.effected {
                mg.add_subgoal(ctx, Some(*id), Subgoal::RightHand(Rc::new(ineq.clone())))?;
            }
            for ineq in &goals.progress {
                mg.add_subgoal(ctx, None, Subgoal::RightHand(Rc::new(ineq.clone())))?;
            }
            if !goals.strict.is_empty() {
                mg.add_subgoal(
                    ctx,
                    None,
                    Subgoal::Contradiction {
                        hypotheses: goals.strict.iter().cloned().map(Rc::new).collect(),
                    },
                )?;
            }
            if let Some(objective) = &goals.objective {
                mg.add_subgoal(ctx, None, Subgoal::RightHand(Rc::new(objective.clone())))?;
            }
            mg.add_introduced(ctx, constraint)
        })();
        ctx.orders.active = Some(active);
        result?;

        let (produced, transition) = mg.finish(ctx)?;
        self.transition = transition;
        Ok(produced)
    }

    fn transition(&self) -> Transition {
        self.transition
    }
}

pub fn parse_dom(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let constraint = parse_single_constraint(words, ctx)?;
    let witness = Substitution::parse(words, &mut ctx.vars, &[])?;
    ctx.engine.increase_num_vars_to(ctx.vars.num_vars());
    let explicit = parse_explicit_marker(words)?;

    let mg = MultiGoal::begin(ctx, explicit, RuleSetKind::RedDomBody);
    Ok(Box::new(DominanceRule {
        constraint,
        witness,
        mg: Some(mg),
        transition: Transition::Keep,
    }))
}
