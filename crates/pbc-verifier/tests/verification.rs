// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! End-to-end verification scenarios.

use num_bigint::BigInt;
use pbc_core::{parse_formula, CheckError, Ineq, Lit, Var, VarManager};
use pbc_rules::Context;
use pbc_verifier::{verify_proof, Settings, VerificationResult};

fn run(formula: &str, proof: &str) -> Result<(VerificationResult, Context), CheckError> {
    let mut vars = VarManager::new(true);
    let parsed = parse_formula(formula, "formula", &mut vars)?;
    let mut ctx = Context::new(parsed, vars);
    let result = verify_proof(&mut ctx, proof, "proof", Settings::default())?;
    Ok((result, ctx))
}

fn check(formula: &str, proof: &str) -> Result<VerificationResult, CheckError> {
    run(formula, proof).map(|(result, _)| result)
}

fn ineq(terms: &[(i64, i32)], degree: i64) -> Ineq {
    Ineq::from_terms(
        terms.iter().map(|&(c, l)| {
            let var = Var(l.unsigned_abs());
            (BigInt::from(c), Lit::new(var, l < 0))
        }),
        BigInt::from(degree),
    )
}

fn assert_invalid(result: Result<VerificationResult, CheckError>) {
    match result {
        Err(CheckError::InvalidProof { .. }) => {}
        other => panic!("expected an invalid proof, got {other:?}"),
    }
}

fn assert_parse_error(result: Result<VerificationResult, CheckError>) {
    match result {
        Err(CheckError::Parse { .. }) => {}
        other => panic!("expected a parse error, got {other:?}"),
    }
}

// ============================================================================
// Refutations by RUP and cutting planes
// ============================================================================

#[test]
fn test_rup_refutation_of_unit_cnf() {
    let result = check(
        "p cnf 1 2\n1 0\n-1 0\n",
        "pseudo-Boolean proof version 1.2\nf\nu >= 1 ;\nc 3\n",
    )
    .unwrap();
    assert!(result.contains_contradiction);
    assert!(!result.uses_assumptions);
}

#[test]
fn test_polish_refutation_of_two_variable_cnf() {
    // no clause is unit, so the contradiction is derived by cutting planes
    let formula = "p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 4 0
p 1 2 + 2 d
p 3 4 + 2 d
p 5 6 +
c 7 0
";
    let result = check(formula, proof).unwrap();
    assert!(result.contains_contradiction);
}

#[test]
fn test_rup_fails_without_propagation() {
    // the four 2-literal clauses propagate nothing, so the empty
    // constraint is not reverse unit propagatable
    let formula = "p cnf 2 4\n1 2 0\n-1 2 0\n1 -2 0\n-1 -2 0\n";
    let proof = "pseudo-Boolean proof version 1.2\nf\nu >= 1 ;\n";
    assert_invalid(check(formula, proof));
}

// ============================================================================
// Cutting-planes arithmetic (division, saturation)
// ============================================================================

#[test]
fn test_division_step() {
    let formula = "* #variable= 2 #constraint= 1\n2 x1 2 x2 >= 3 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
pol 1 2 d
e 2 1 x1 1 x2 >= 2 ;
";
    assert!(check(formula, proof).is_ok());
}

#[test]
fn test_saturation_step() {
    let formula = "* #variable= 2 #constraint= 1\n3 x1 1 x2 >= 2 ;\n";
    let good = "\
pseudo-Boolean proof version 1.2
f 1 0
pol 1 s
e 2 2 x1 1 x2 >= 2 ;
";
    assert!(check(formula, good).is_ok());

    // comparing against the unsaturated form must fail
    let bad = "\
pseudo-Boolean proof version 1.2
f 1 0
pol 1 s
e 2 3 x1 1 x2 >= 2 ;
";
    assert_invalid(check(formula, bad));
}

#[test]
fn test_division_by_zero_is_invalid() {
    let formula = "* #variable= 2 #constraint= 1\n2 x1 2 x2 >= 3 ;\n";
    let proof = "pseudo-Boolean proof version 1.2\nf 1 0\npol 1 0 d\n";
    let err = check(formula, proof).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_weakening_in_polish_notation() {
    let formula = "* #variable= 2 #constraint= 1\n2 x1 1 x2 >= 2 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
pol 1 x1 w
e 2 1 x2 >= 0 ;
";
    assert!(check(formula, proof).is_ok());
}

#[test]
fn test_literal_axiom_and_addition() {
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
pol 1 ~x1 +
e 2 1 x2 >= 0 ;
";
    // x1 + x2 >= 1 plus the axiom ~x1 >= 0 cancels x1 against ~x1
    assert!(check(formula, proof).is_ok());
}

// ============================================================================
// Implication and contradiction checks
// ============================================================================

#[test]
fn test_implication_rules() {
    let formula = "* #variable= 2 #constraint= 1\n2 x1 1 x2 >= 2 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
i 1 2 x1 >= 1 ;
j 1 2 x1 1 x2 >= 1 ;
e 2 2 x1 1 x2 >= 1 ;
";
    assert!(check(formula, proof).is_ok());

    let bad = "\
pseudo-Boolean proof version 1.2
f 1 0
i 1 1 ~x1 >= 1 ;
";
    assert_invalid(check(formula, bad));
}

#[test]
fn test_contradiction_check_requires_contradiction() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "pseudo-Boolean proof version 1.2\nf 1 0\nc 1\n";
    assert_invalid(check(formula, proof));
}

// ============================================================================
// Solutions and objective bounds
// ============================================================================

#[test]
fn test_solution_produces_blocking_clause() {
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
v x1 ~x2
e 2 1 ~x1 1 x2 >= 1 ;
";
    assert!(check(formula, proof).is_ok());
}

#[test]
fn test_original_solution_check() {
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let good = "pseudo-Boolean proof version 1.2\nf 1 0\nov x1 ~x2\n";
    assert!(check(formula, good).is_ok());

    let bad = "pseudo-Boolean proof version 1.2\nf 1 0\nov ~x1 ~x2\n";
    assert_invalid(check(formula, bad));
}

#[test]
fn test_objective_bound() {
    let formula = "\
* #variable= 2 #constraint= 1
min: 1 x1 1 x2 ;
1 x1 1 x2 >= 1 ;
";
    // x1=1, x2=0 has objective value 1, so the bound is objective <= 0,
    // which normalizes to ~x1 + ~x2 >= 2
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
o x1 ~x2
e 2 1 ~x1 1 ~x2 >= 2 ;
";
    assert!(check(formula, proof).is_ok());
}

#[test]
fn test_objective_bound_without_objective_is_invalid() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "pseudo-Boolean proof version 1.2\nf 1 0\no x1\n";
    assert_invalid(check(formula, proof));
}

// ============================================================================
// Redundancy with witnesses
// ============================================================================

#[test]
fn test_redundancy_with_constant_witness() {
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
red 1 x1 >= 1 ; x1 -> 1
e -1 1 x1 >= 1 ;
";
    let (result, ctx) = run(formula, proof).unwrap();
    assert!(!result.uses_assumptions);
    assert!(ctx.engine.find(&ineq(&[(1, 1)], 1)).is_some());
}

#[test]
fn test_redundancy_with_bad_witness_is_invalid() {
    // mapping x2 to x1 does not preserve the formula under ~(x1 >= 1)
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
red 1 x1 >= 1 ; x2 -> x1
";
    assert_invalid(check(formula, proof));
}

#[test]
fn test_redundancy_with_explicit_subproof() {
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
red 1 x1 >= 1 ; x1 -> 1 ; begin
proofgoal 3
u >= 1 ;
c -1
qed
qed
e -1 1 x1 >= 1 ;
";
    let result = check(formula, proof).unwrap();
    // the contradiction inside the sub-proof does not leak out
    assert!(!result.contains_contradiction);
}

#[test]
fn test_unfinished_subproof_is_invalid() {
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
red 1 x1 >= 1 ; x1 -> 1 ; begin
";
    assert_invalid(check(formula, proof));
}

// ============================================================================
// Deletion, levels, core
// ============================================================================

#[test]
fn test_deletion_removes_constraints() {
    let formula = "\
* #variable= 2 #constraint= 2
1 x1 >= 1 ;
1 x2 >= 1 ;
";
    let proof = "\
pseudo-Boolean proof version 1.2
f 2 0
del id 1
is_deleted 1 x1 >= 1 ;
e 2 1 x2 >= 1 ;
";
    assert!(check(formula, proof).is_ok());

    let bad = "\
pseudo-Boolean proof version 1.2
f 2 0
del id 1
e 1 1 x1 >= 1 ;
";
    assert_invalid(check(formula, bad));
}

#[test]
fn test_deletion_by_spec_and_range() {
    let formula = "\
* #variable= 2 #constraint= 2
1 x1 >= 1 ;
1 x2 >= 1 ;
";
    let proof = "\
pseudo-Boolean proof version 1.2
f 2 0
del spec 1 x1 >= 1 ;
is_deleted 1 x1 >= 1 ;
del range 2 2
is_deleted 1 x2 >= 1 ;
";
    assert!(check(formula, proof).is_ok());
}

#[test]
fn test_level_wipe() {
    let formula = "* #variable= 2 #constraint= 1\n1 x1 1 x2 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
# 1
f 1 0
pol 1 2 *
# 2
pol 1 3 *
w 2
is_deleted 3 x1 3 x2 >= 3 ;
e 2 2 x1 2 x2 >= 2 ;
";
    assert!(check(formula, proof).is_ok());
}

#[test]
fn test_assumption_sets_flag() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
a 1 ~x1 >= 1 ;
u >= 1 ;
c 3
";
    let result = check(formula, proof).unwrap();
    assert!(result.contains_contradiction);
    assert!(result.uses_assumptions);
}

#[test]
fn test_load_axiom() {
    let formula = "\
* #variable= 2 #constraint= 2
1 x1 >= 1 ;
1 x2 >= 1 ;
";
    let proof = "\
pseudo-Boolean proof version 1.2
l 2
e 1 1 x2 >= 1 ;
";
    assert!(check(formula, proof).is_ok());
}

// ============================================================================
// Orders and dominance
// ============================================================================

const STRICT_ORDER: &str = "\
pre_order lt
vars
left u1
right v1
aux
end
def
1 ~u1 1 v1 >= 2 ;
end
irreflexive
qed
transitivity
vars
fresh_right w1
end
proof
qed
end
end
";

#[test]
fn test_order_definition_and_dominance() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = format!(
        "pseudo-Boolean proof version 1.2\nf 1 0\n{STRICT_ORDER}load_order lt x1\ndom 1 x1 >= 1 ; x1 -> 1\ne -1 1 x1 >= 1 ;\n"
    );
    assert!(check(formula, &proof).is_ok());
}

#[test]
fn test_dominance_without_order_is_invalid() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
dom 1 x1 >= 1 ; x1 -> 1
";
    assert_invalid(check(formula, proof));
}

#[test]
fn test_order_without_irreflexivity_proof_is_invalid() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "\
pseudo-Boolean proof version 1.2
f 1 0
pre_order lt
vars
left u1
right v1
end
def
1 ~u1 1 v1 >= 2 ;
end
transitivity
vars
fresh_right w1
end
proof
qed
end
end
";
    assert_invalid(check(formula, proof));
}

#[test]
fn test_redundancy_witness_may_not_touch_order_variables() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = format!(
        "pseudo-Boolean proof version 1.2\nf 1 0\n{STRICT_ORDER}load_order lt x1\nred 1 x1 >= 1 ; x1 -> 1\n"
    );
    assert_parse_error(check(formula, &proof));
}

// ============================================================================
// Errors and structure
// ============================================================================

#[test]
fn test_unknown_rule_is_a_parse_error() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "pseudo-Boolean proof version 1.2\nfoo bar\n";
    let err = check(formula, proof).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_formula_count_mismatch() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "pseudo-Boolean proof version 1.2\nf 3 0\n";
    assert_parse_error(check(formula, proof));
}

#[test]
fn test_invalid_proof_reports_line() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "pseudo-Boolean proof version 1.2\nf 1 0\nc 1\n";
    match check(formula, proof) {
        Err(CheckError::InvalidProof { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected an invalid proof, got {other:?}"),
    }
}

#[test]
fn test_antecedent_must_exist() {
    let formula = "* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n";
    let proof = "pseudo-Boolean proof version 1.2\nf 1 0\ne 7 1 x1 >= 1 ;\n";
    assert_invalid(check(formula, proof));
}

#[test]
fn test_constraint_ids_count_every_produced_slot() {
    let formula = "\
* #variable= 2 #constraint= 2
1 x1 >= 1 ;
1 x2 >= 1 ;
";
    // formula takes IDs 1 and 2, each pol step one more
    let proof = "\
pseudo-Boolean proof version 1.2
f 2 0
pol 1 2 +
e 3 1 x1 1 x2 >= 2 ;
";
    assert!(check(formula, proof).is_ok());
}
