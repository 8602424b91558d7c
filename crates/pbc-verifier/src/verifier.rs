// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! The proof dispatcher: reads rule lines, executes steps, and maintains
//! the constraint database, ID allocation and parse-context transitions.

use std::io::Write;
use std::rc::Rc;

use serde::Serialize;
use tracing::warn;

use pbc_core::{CheckError, CheckResult, Ineq, StepResult, WordScanner};
use pbc_rules::{default_rule, lookup, Antecedents, Context, Produced, Transition};

use crate::reader::ProofReader;

/// Verifier configuration.
#[derive(Default)]
pub struct Settings {
    /// Fail unless the proof derives contradiction.
    pub require_unsat: bool,
    /// Echo every derived constraint and sub-goal.
    pub trace: bool,
    /// Deleting a core constraint needs a core-only RUP justification.
    pub check_deletions: bool,
    /// Write `constraint ; id = antecedents` lines for derived constraints.
    pub proof_graph: Option<Box<dyn Write>>,
}

/// Outcome of a successful verification run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerificationResult {
    pub contains_contradiction: bool,
    pub uses_assumptions: bool,
}

impl VerificationResult {
    /// Emit the non-fatal caveats of a successful run.
    pub fn report(&self) {
        if !self.contains_contradiction {
            warn!("the provided proof did not claim contradiction");
        }
        if self.uses_assumptions {
            warn!("the proof is based on unjustified assumptions");
        }
    }
}

/// Drives one proof through the rule catalogue.
pub struct Verifier {
    settings: Settings,
}

impl Verifier {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn verify(
        &mut self,
        ctx: &mut Context,
        reader: &mut ProofReader<'_>,
    ) -> CheckResult<VerificationResult> {
        reader.expect_header()?;
        ctx.trace = self.settings.trace;
        ctx.check_deletions = self.settings.check_deletions;

        while let Some((line_no, line)) = reader.next_rule_line() {
            self.handle_line(ctx, reader.file(), line_no, line)?;
        }

        let end_line = reader.current_line();
        if !ctx.subcontexts.is_empty() {
            return Err(CheckError::InvalidProof {
                line: end_line,
                message: "subproof not finished".into(),
            });
        }

        let result = VerificationResult {
            contains_contradiction: ctx.contains_contradiction,
            uses_assumptions: ctx.uses_assumptions,
        };
        if self.settings.require_unsat && !result.contains_contradiction {
            return Err(CheckError::InvalidProof {
                line: end_line,
                message: "the proof does not contain contradiction".into(),
            });
        }
        Ok(result)
    }

    fn handle_line(
        &mut self,
        ctx: &mut Context,
        file: &str,
        line_no: usize,
        line: &str,
    ) -> CheckResult<()> {
        let mut words = WordScanner::new(line);
        let id_token = words
            .next()
            .ok_or_else(|| CheckError::Internal("dispatcher got a blank line".into()))?;

        let parse_fn = match lookup(ctx.current_rules, id_token) {
            Some(parse_fn) => parse_fn,
            None => match default_rule(ctx.current_rules) {
                Some(parse_fn) => {
                    words.putback();
                    parse_fn
                }
                None => {
                    return Err(CheckError::Parse {
                        file: file.to_string(),
                        line: line_no,
                        column: words.column(),
                        message: format!("unknown rule '{id_token}'"),
                    })
                }
            },
        };

        let mut step =
            (parse_fn)(&mut words, ctx).map_err(|e| e.at(file, line_no, words.column()))?;

        let antecedent_spec = step.antecedents();
        let antecedents: Vec<Rc<Ineq>> = match &antecedent_spec {
            Antecedents::None => Vec::new(),
            Antecedents::All => ctx
                .db
                .all_active()
                .into_iter()
                .map(|(_, ineq)| ineq)
                .collect(),
            Antecedents::Ids(ids) => ids
                .iter()
                .map(|&id| ctx.db.get(id))
                .collect::<StepResult<Vec<_>>>()
                .map_err(|e| e.at(file, line_no, words.column()))?,
        };

        // Antecedent IDs for the proof-graph export, taken before new IDs
        // are handed out.
        let graph_antecedents = self.settings.proof_graph.as_ref().map(|_| {
            match &antecedent_spec {
                Antecedents::None => String::new(),
                Antecedents::All => ctx
                    .db
                    .all_active()
                    .iter()
                    .map(|(id, _)| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
                Antecedents::Ids(ids) => ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
            }
        });

        let produced = step
            .compute(ctx, &antecedents)
            .map_err(|e| e.at(file, line_no, words.column()))?;

        let first_new = ctx.first_free_id;
        for slot in produced {
            match slot {
                Produced::Attach { ineq, core } => {
                    let id = ctx.db.push(Some(ineq.clone()));
                    debug_assert_eq!(id, ctx.first_free_id);
                    ctx.engine.attach(ineq.clone(), id, core);
                    if self.settings.trace {
                        println!("  ConstraintId {:03}: {}", id, ineq.to_opb(&ctx.vars));
                    }
                    if let Some(graph) = self.settings.proof_graph.as_mut() {
                        let antecedents = graph_antecedents.as_deref().unwrap_or_default();
                        writeln!(graph, "{} ; {} = {}", ineq.to_opb(&ctx.vars), id, antecedents)
                            .map_err(|e| {
                                CheckError::Internal(format!("cannot write proof graph: {e}"))
                            })?;
                    }
                }
                Produced::Reserved => {
                    ctx.db.push(None);
                }
            }
            ctx.first_free_id += 1;
        }
        let last_new = ctx.first_free_id;
        if last_new > first_new {
            ctx.levels.on_new_ids(first_new..last_new);
            ctx.subcontexts.on_new_ids(first_new..last_new);
        }

        for id in step.deletions() {
            if let Some(ineq) = ctx.db.take(id) {
                ctx.engine.detach(&ineq);
                if self.settings.trace {
                    println!("  ConstraintId  - : deleting {id:03}");
                }
            }
        }

        if let Transition::Set(kind) = step.transition() {
            ctx.current_rules = kind;
        }
        Ok(())
    }
}

/// Convenience entry point: verify `proof_text` against an already-built
/// context.
pub fn verify_proof(
    ctx: &mut Context,
    proof_text: &str,
    proof_file: &str,
    settings: Settings,
) -> CheckResult<VerificationResult> {
    let mut reader = ProofReader::new(proof_text, proof_file);
    Verifier::new(settings).verify(ctx, &mut reader)
}
