// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Command line front-end of the pbcheck proof checker.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pbc_core::{parse_formula, CheckError, VarManager};
use pbc_rules::Context;
use pbc_verifier::{verify_proof, Settings};

/// Checker for pseudo-Boolean refutation and optimization proofs.
#[derive(Parser)]
#[command(name = "pbcheck", version, about)]
struct Args {
    /// Formula file (OPB, or DIMACS CNF detected by its header).
    formula: PathBuf,

    /// Proof log to verify against the formula.
    proof: PathBuf,

    /// Fail unless the proof derives contradiction.
    #[arg(long)]
    require_unsat: bool,

    /// Require a core-only RUP justification when deleting core
    /// constraints.
    #[arg(long)]
    check_deletions: bool,

    /// Restrict variable names to the x<N> form, where N is the ID.
    #[arg(long)]
    no_free_names: bool,

    /// Print every derived constraint and sub-goal.
    #[arg(long)]
    trace: bool,

    /// Write the proof graph (constraint ; id = antecedents) to a file.
    #[arg(long, value_name = "FILE")]
    proof_graph: Option<PathBuf>,

    /// Print the verification result as JSON.
    #[arg(long)]
    json: bool,

    /// Enable debug logging.
    #[arg(short = 'd', long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match &error {
                CheckError::InvalidProof { message, .. } => {
                    println!("Verification failed.");
                    if !message.is_empty() {
                        println!("Hint: {error}");
                    }
                }
                other => eprintln!("{other}"),
            }
            ExitCode::from(error.exit_code() as u8)
        }
    }
}

fn run(args: &Args) -> Result<(), CheckError> {
    let formula_name = args.formula.display().to_string();
    let formula_text = std::fs::read_to_string(&args.formula)
        .map_err(|e| CheckError::Internal(format!("cannot read {formula_name}: {e}")))?;
    let proof_name = args.proof.display().to_string();
    let proof_text = std::fs::read_to_string(&args.proof)
        .map_err(|e| CheckError::Internal(format!("cannot read {proof_name}: {e}")))?;

    let mut vars = VarManager::new(!args.no_free_names);
    let formula = parse_formula(&formula_text, &formula_name, &mut vars)?;
    if formula.declared_vars != vars.num_vars() as usize {
        warn!(
            "the header declares {} variables but the formula uses {}",
            formula.declared_vars,
            vars.num_vars()
        );
    }

    let proof_graph: Option<Box<dyn std::io::Write>> = match &args.proof_graph {
        None => None,
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                CheckError::Internal(format!("cannot write {}: {e}", path.display()))
            })?;
            Some(Box::new(file))
        }
    };

    let settings = Settings {
        require_unsat: args.require_unsat,
        trace: args.trace,
        check_deletions: args.check_deletions,
        proof_graph,
    };

    let mut ctx = Context::new(formula, vars);
    let result = verify_proof(&mut ctx, &proof_text, &proof_name, settings)?;

    result.report();
    if args.json {
        let rendered = serde_json::to_string(&result)
            .map_err(|e| CheckError::Internal(format!("cannot render result: {e}")))?;
        println!("{rendered}");
    } else {
        println!("Verification succeeded.");
    }
    Ok(())
}
