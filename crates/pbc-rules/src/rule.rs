// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Rule catalogue plumbing.
//!
//! Every proof rule is a [`RuleDef`]: identifier strings plus a parse
//! function producing a boxed [`ProofStep`]. The dispatcher looks rules up
//! in the table of the current parse context; sub-proof rules narrow the
//! table and `qed`/`end` restores the previous one.

use std::rc::Rc;

use pbc_core::{ConstraintId, Ineq, StepResult, WordScanner};

use crate::context::Context;

/// Which antecedent constraints a step consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Antecedents {
    None,
    /// Every live constraint in the database.
    All,
    Ids(Vec<ConstraintId>),
}

/// One constraint slot produced by a step.
#[derive(Clone, Debug)]
pub enum Produced {
    /// Attach this constraint under the next free ID.
    Attach { ineq: Rc<Ineq>, core: bool },
    /// Consume the next free ID without attaching anything.
    Reserved,
}

/// Rule-set change requested by an executed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Keep,
    Set(RuleSetKind),
}

/// A parsed proof step, ready to execute.
pub trait ProofStep {
    fn antecedents(&self) -> Antecedents {
        Antecedents::None
    }

    /// Perform the step: check its semantics and return produced slots.
    fn compute(&mut self, ctx: &mut Context, antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>>;

    /// IDs to detach after the produced constraints are attached.
    fn deletions(&self) -> Vec<ConstraintId> {
        Vec::new()
    }

    fn transition(&self) -> Transition {
        Transition::Keep
    }
}

pub type ParseFn = fn(&mut WordScanner<'_>, &mut Context) -> StepResult<Box<dyn ProofStep>>;

/// A rule: its identifier strings and parse function.
pub struct RuleDef {
    pub ids: &'static [&'static str],
    pub parse: ParseFn,
}

/// The parse contexts a proof moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleSetKind {
    /// Top level of the proof.
    Main,
    /// After `red ... begin` / `dom ... begin`: only goal selection.
    RedDomBody,
    /// Inside `irreflexive` / transitivity `proof`: derivations plus goal
    /// selection.
    ProofBody,
    /// Inside a `proofgoal` block.
    SubProofBody,
    /// Inside a `pre_order` sub-verifier.
    OrderRoot,
    /// Inside the order `vars` block.
    OrderVars,
    /// Inside the order `def` block.
    OrderDef,
    /// Inside the `transitivity` block.
    TransRoot,
    /// Inside the transitivity `vars` block.
    TransVars,
}

/// Rules usable inside dominance-related sub-proofs.
static DOM_FRIENDLY: &[RuleDef] = &[
    RuleDef {
        ids: &["d", "del"],
        parse: crate::catalogue::parse_delete,
    },
    RuleDef {
        ids: &["a"],
        parse: crate::catalogue::parse_assumption,
    },
    RuleDef {
        ids: &["u", "rup"],
        parse: crate::catalogue::parse_rup,
    },
    RuleDef {
        ids: &["e"],
        parse: crate::catalogue::parse_equals,
    },
    RuleDef {
        ids: &["i"],
        parse: crate::catalogue::parse_implies,
    },
    RuleDef {
        ids: &["j"],
        parse: crate::catalogue::parse_implies_get_implied,
    },
    RuleDef {
        ids: &["c"],
        parse: crate::catalogue::parse_contradiction,
    },
    RuleDef {
        ids: &["p", "pol"],
        parse: crate::rpn::parse_rpn,
    },
    RuleDef {
        ids: &["#"],
        parse: crate::levels::parse_set_level,
    },
    RuleDef {
        ids: &["w"],
        parse: crate::levels::parse_wipe_level,
    },
    RuleDef {
        ids: &["red"],
        parse: crate::multigoal::parse_red,
    },
];

/// Rules only available at the top level.
static MAIN_ONLY: &[RuleDef] = &[
    RuleDef {
        ids: &["f"],
        parse: crate::catalogue::parse_load_formula,
    },
    RuleDef {
        ids: &["l"],
        parse: crate::catalogue::parse_load_axiom,
    },
    RuleDef {
        ids: &["v"],
        parse: crate::catalogue::parse_solution,
    },
    RuleDef {
        ids: &["ov"],
        parse: crate::catalogue::parse_original_solution,
    },
    RuleDef {
        ids: &["o"],
        parse: crate::catalogue::parse_objective_bound,
    },
    RuleDef {
        ids: &["core"],
        parse: crate::catalogue::parse_core,
    },
    RuleDef {
        ids: &["is_deleted"],
        parse: crate::catalogue::parse_is_deleted,
    },
    RuleDef {
        ids: &["dom"],
        parse: crate::orders::parse_dom,
    },
    RuleDef {
        ids: &["load_order"],
        parse: crate::orders::parse_load_order,
    },
    RuleDef {
        ids: &["pre_order", "strict_order"],
        parse: crate::orders::parse_pre_order,
    },
];

/// Goal selection inside multi-goal rules.
static GOAL_SELECT: &[RuleDef] = &[
    RuleDef {
        ids: &["proofgoal"],
        parse: crate::subcontext::parse_proofgoal,
    },
    RuleDef {
        ids: &["qed", "end"],
        parse: crate::subcontext::parse_end,
    },
];

static END_ONLY: &[RuleDef] = &[RuleDef {
    ids: &["qed", "end"],
    parse: crate::subcontext::parse_end,
}];

static ORDER_ROOT: &[RuleDef] = &[
    RuleDef {
        ids: &["vars"],
        parse: crate::orders::parse_order_vars_block,
    },
    RuleDef {
        ids: &["def"],
        parse: crate::orders::parse_order_def_block,
    },
    RuleDef {
        ids: &["irreflexive"],
        parse: crate::orders::parse_irreflexive,
    },
    RuleDef {
        ids: &["transitivity"],
        parse: crate::orders::parse_transitivity_block,
    },
    RuleDef {
        ids: &["qed", "end"],
        parse: crate::orders::parse_order_scope_end,
    },
];

static ORDER_VARS: &[RuleDef] = &[
    RuleDef {
        ids: &["left"],
        parse: crate::orders::parse_left,
    },
    RuleDef {
        ids: &["right"],
        parse: crate::orders::parse_right,
    },
    RuleDef {
        ids: &["aux"],
        parse: crate::orders::parse_aux,
    },
    RuleDef {
        ids: &["qed", "end"],
        parse: crate::subcontext::parse_end,
    },
];

static ORDER_DEF: &[RuleDef] = &[RuleDef {
    ids: &["qed", "end"],
    parse: crate::subcontext::parse_end,
}];

static TRANS_ROOT: &[RuleDef] = &[
    RuleDef {
        ids: &["vars"],
        parse: crate::orders::parse_trans_vars_block,
    },
    RuleDef {
        ids: &["proof"],
        parse: crate::orders::parse_trans_proof,
    },
    RuleDef {
        ids: &["qed", "end"],
        parse: crate::subcontext::parse_end,
    },
];

static TRANS_VARS: &[RuleDef] = &[
    RuleDef {
        ids: &["fresh_right"],
        parse: crate::orders::parse_fresh_right,
    },
    RuleDef {
        ids: &["fresh_aux1"],
        parse: crate::orders::parse_fresh_aux1,
    },
    RuleDef {
        ids: &["fresh_aux2"],
        parse: crate::orders::parse_fresh_aux2,
    },
    RuleDef {
        ids: &["qed", "end"],
        parse: crate::subcontext::parse_end,
    },
];

static MAIN_TABLES: &[&[RuleDef]] = &[DOM_FRIENDLY, MAIN_ONLY];
static RED_DOM_BODY_TABLES: &[&[RuleDef]] = &[GOAL_SELECT];
static PROOF_BODY_TABLES: &[&[RuleDef]] = &[DOM_FRIENDLY, GOAL_SELECT];
static SUB_PROOF_BODY_TABLES: &[&[RuleDef]] = &[DOM_FRIENDLY, END_ONLY];
static ORDER_ROOT_TABLES: &[&[RuleDef]] = &[ORDER_ROOT];
static ORDER_VARS_TABLES: &[&[RuleDef]] = &[ORDER_VARS];
static ORDER_DEF_TABLES: &[&[RuleDef]] = &[ORDER_DEF];
static TRANS_ROOT_TABLES: &[&[RuleDef]] = &[TRANS_ROOT];
static TRANS_VARS_TABLES: &[&[RuleDef]] = &[TRANS_VARS];

fn tables(kind: RuleSetKind) -> &'static [&'static [RuleDef]] {
    match kind {
        RuleSetKind::Main => MAIN_TABLES,
        RuleSetKind::RedDomBody => RED_DOM_BODY_TABLES,
        RuleSetKind::ProofBody => PROOF_BODY_TABLES,
        RuleSetKind::SubProofBody => SUB_PROOF_BODY_TABLES,
        RuleSetKind::OrderRoot => ORDER_ROOT_TABLES,
        RuleSetKind::OrderVars => ORDER_VARS_TABLES,
        RuleSetKind::OrderDef => ORDER_DEF_TABLES,
        RuleSetKind::TransRoot => TRANS_ROOT_TABLES,
        RuleSetKind::TransVars => TRANS_VARS_TABLES,
    }
}

/// Look up the parse function for `id` in the given parse context.
pub fn lookup(kind: RuleSetKind, id: &str) -> Option<ParseFn> {
    for table in tables(kind) {
        for def in *table {
            if def.ids.contains(&id) {
                return Some(def.parse);
            }
        }
    }
    None
}

/// The rule used for lines with no identifier token match, if any.
///
/// Only the order `def` block has one: every line inside it is a defining
/// constraint.
pub fn default_rule(kind: RuleSetKind) -> Option<ParseFn> {
    match kind {
        RuleSetKind::OrderDef => Some(crate::orders::parse_order_definition),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_respects_context() {
        assert!(lookup(RuleSetKind::Main, "pol").is_some());
        assert!(lookup(RuleSetKind::Main, "dom").is_some());
        assert!(lookup(RuleSetKind::Main, "qed").is_none());
        assert!(lookup(RuleSetKind::RedDomBody, "proofgoal").is_some());
        assert!(lookup(RuleSetKind::RedDomBody, "pol").is_none());
        assert!(lookup(RuleSetKind::SubProofBody, "pol").is_some());
        assert!(lookup(RuleSetKind::SubProofBody, "proofgoal").is_none());
        assert!(lookup(RuleSetKind::OrderRoot, "vars").is_some());
        assert!(lookup(RuleSetKind::Main, "nonsense").is_none());
    }

    #[test]
    fn test_default_rule_only_in_def_block() {
        assert!(default_rule(RuleSetKind::OrderDef).is_some());
        assert!(default_rule(RuleSetKind::Main).is_none());
    }
}
