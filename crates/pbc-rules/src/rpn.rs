// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! The `pol`/`p` rule: cutting-planes derivations in reverse polish
//! notation.
//!
//! Operands are constraint IDs (pushed from the database) and literals
//! (pushed as axioms `1 lit >= 0`). Operators are `+` (add), `*` (multiply),
//! `d` (divide), `s` (saturate) and `w` (weaken). The scalar or literal
//! operand of `*`, `d` and `w` follows the operator in the token stream, so
//! it is swapped in front during parsing to keep evaluation uniform.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Signed;

use pbc_core::{ConstraintId, Ineq, Lit, StepError, StepResult, Var, WordScanner};

use crate::context::Context;
use crate::rule::{Antecedents, Produced, ProofStep};

#[derive(Clone, Debug)]
enum RpnTok {
    Constraint(ConstraintId),
    LitAxiom(Lit),
    Add,
    Multiply(BigInt),
    Divide(BigInt),
    Saturate,
    Weaken(Var),
}

#[derive(Clone, Debug)]
enum Raw {
    Int(BigInt),
    Lit(Lit),
    Op(char),
}

struct ReversePolishNotation {
    toks: Vec<RpnTok>,
}

impl ProofStep for ReversePolishNotation {
    fn antecedents(&self) -> Antecedents {
        Antecedents::Ids(
            self.toks
                .iter()
                .filter_map(|tok| match tok {
                    RpnTok::Constraint(id) => Some(*id),
                    _ => None,
                })
                .collect(),
        )
    }

    fn compute(&mut self, _ctx: &mut Context, antecedents: &[Rc<Ineq>])
        -> StepResult<Vec<Produced>> {
        let underflow = || StepError::Internal("rpn stack underflow".into());
        let mut stack: Vec<Ineq> = Vec::new();
        let mut inputs = antecedents.iter();

        for tok in &self.toks {
            match tok {
                RpnTok::Constraint(_) => {
                    let ineq = inputs.next().ok_or_else(underflow)?;
                    stack.push((**ineq).clone());
                }
                RpnTok::LitAxiom(lit) => stack.push(Ineq::lit_axiom(*lit)),
                RpnTok::Add => {
                    let second = stack.pop().ok_or_else(underflow)?;
                    let first = stack.pop().ok_or_else(underflow)?;
                    stack.push(first.add(&second));
                }
                RpnTok::Multiply(factor) => {
                    let ineq = stack.pop().ok_or_else(underflow)?;
                    stack.push(ineq.multiply(factor));
                }
                RpnTok::Divide(divisor) => {
                    let ineq = stack.pop().ok_or_else(underflow)?;
                    stack.push(ineq.divide(divisor));
                }
                RpnTok::Saturate => {
                    let ineq = stack.pop().ok_or_else(underflow)?;
                    stack.push(ineq.saturate());
                }
                RpnTok::Weaken(var) => {
                    let ineq = stack.pop().ok_or_else(underflow)?;
                    stack.push(ineq.weaken(*var));
                }
            }
        }

        let result = stack.pop().ok_or_else(underflow)?;
        if !stack.is_empty() {
            return Err(StepError::Internal("rpn stack not fully consumed".into()));
        }
        Ok(vec![Produced::Attach {
            ineq: Rc::new(result),
            core: false,
        }])
    }
}

pub fn parse_rpn(
    words: &mut WordScanner<'_>,
    ctx: &mut Context,
) -> StepResult<Box<dyn ProofStep>> {
    let mut raws = Vec::new();
    while let Some(token) = words.next() {
        let raw = match token {
            "+" | "s" | "*" | "d" | "w" => Raw::Op(token.chars().next().expect("non-empty")),
            _ if ctx.vars.is_lit(token) => Raw::Lit(ctx.vars.lit(token)?),
            _ => Raw::Int(token.parse().map_err(|_| {
                StepError::syntax(format!(
                    "expected an integer, a literal or one of + * d s w, got '{token}'"
                ))
            })?),
        };
        raws.push(raw);
    }
    // a trailing 0 terminates the sequence
    if matches!(raws.last(), Some(Raw::Int(n)) if n == &BigInt::from(0)) {
        raws.pop();
    }

    // move the trailing operand of *, d and w in front of its operator
    for i in 0..raws.len() {
        if matches!(raws[i], Raw::Op('*') | Raw::Op('d') | Raw::Op('w')) {
            if i == 0 {
                return Err(StepError::syntax("operator is missing its operand"));
            }
            raws.swap(i, i - 1);
        }
    }

    let mut toks = Vec::with_capacity(raws.len());
    let mut stack_size: usize = 0;
    let mut raw_iter = raws.into_iter();
    while let Some(raw) = raw_iter.next() {
        match raw {
            Raw::Int(n) => {
                if n.is_negative() || n == BigInt::from(0) {
                    return Err(StepError::syntax(format!(
                        "'{n}' is not a valid constraint id"
                    )));
                }
                let id: ConstraintId = n
                    .try_into()
                    .map_err(|_| StepError::syntax("constraint id out of range"))?;
                toks.push(RpnTok::Constraint(id));
                stack_size += 1;
            }
            Raw::Lit(lit) => {
                toks.push(RpnTok::LitAxiom(lit));
                stack_size += 1;
            }
            Raw::Op('+') => {
                if stack_size < 2 {
                    return Err(StepError::syntax(
                        "trying to pop from an empty stack in reverse polish notation",
                    ));
                }
                stack_size -= 1;
                toks.push(RpnTok::Add);
            }
            Raw::Op('s') => {
                if stack_size < 1 {
                    return Err(StepError::syntax(
                        "trying to pop from an empty stack in reverse polish notation",
                    ));
                }
                toks.push(RpnTok::Saturate);
            }
            Raw::Op(op) => {
                if stack_size < 1 {
                    return Err(StepError::syntax(
                        "trying to pop from an empty stack in reverse polish notation",
                    ));
                }
                match (op, raw_iter.next()) {
                    ('*', Some(Raw::Int(factor))) => {
                        if factor.is_negative() {
                            return Err(StepError::invalid(
                                "multiplication by a negative factor",
                            ));
                        }
                        toks.push(RpnTok::Multiply(factor));
                    }
                    ('d', Some(Raw::Int(divisor))) => {
                        if !divisor.is_positive() {
                            return Err(StepError::invalid(format!(
                                "division by {divisor} is not allowed"
                            )));
                        }
                        toks.push(RpnTok::Divide(divisor));
                    }
                    ('w', Some(Raw::Lit(lit))) => toks.push(RpnTok::Weaken(lit.var())),
                    ('w', _) => {
                        return Err(StepError::syntax("weakening expects a literal operand"))
                    }
                    _ => return Err(StepError::syntax("expected an integer operand")),
                }
            }
        }
    }

    if stack_size != 1 {
        return Err(StepError::syntax(
            "reverse polish notation must leave exactly one constraint on the stack",
        ));
    }
    Ok(Box::new(ReversePolishNotation { toks }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbc_core::{Formula, VarManager};

    fn ctx() -> Context {
        Context::new(Formula::default(), VarManager::new(true))
    }

    fn parse(line: &str) -> StepResult<Box<dyn ProofStep>> {
        let mut ctx = ctx();
        let mut words = WordScanner::new(line);
        parse_rpn(&mut words, &mut ctx)
    }

    #[test]
    fn test_antecedents_skip_operands() {
        // the 2 after d is a divisor, not a constraint id
        let step = parse("1 2 + 2 d").unwrap();
        assert_eq!(step.antecedents(), Antecedents::Ids(vec![1, 2]));

        let step = parse("3 4 *").unwrap();
        assert_eq!(step.antecedents(), Antecedents::Ids(vec![3]));
    }

    #[test]
    fn test_trailing_zero_terminates() {
        let step = parse("1 2 + 0").unwrap();
        assert_eq!(step.antecedents(), Antecedents::Ids(vec![1, 2]));
    }

    #[test]
    fn test_stack_discipline() {
        assert!(parse("1 +").is_err());
        assert!(parse("s").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("").is_err());
        assert!(parse("1 2 + s").is_ok());
    }

    #[test]
    fn test_bad_divisors_are_invalid_proofs() {
        assert!(matches!(parse("1 0 d"), Err(StepError::Invalid(_))));
        assert!(matches!(parse("1 -2 d"), Err(StepError::Invalid(_))));
        assert!(matches!(parse("1 x1 d"), Err(StepError::Syntax(_))));
    }

    #[test]
    fn test_weaken_takes_a_literal() {
        let step = parse("1 x1 w").unwrap();
        assert_eq!(step.antecedents(), Antecedents::Ids(vec![1]));
        assert!(parse("1 2 w").is_err());
    }
}
