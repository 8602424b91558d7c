// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Word scanning and input-format parsing.
//!
//! Inputs are line oriented and whitespace tokenized. [`WordScanner`] walks
//! the tokens of one line while tracking byte columns for error reporting;
//! on top of it sit the OPB constraint grammar (shared between formula files
//! and proof rules) and the DIMACS CNF reader.

use std::rc::Rc;
use std::str::FromStr;

use num_bigint::BigInt;

use crate::error::{CheckResult, StepError, StepResult};
use crate::formula::{Formula, Objective};
use crate::ineq::Ineq;
use crate::vars::VarManager;

/// Tokenizer over one input line with putback and column tracking.
pub struct WordScanner<'a> {
    words: Vec<(usize, &'a str)>,
    pos: usize,
    line_len: usize,
}

impl<'a> WordScanner<'a> {
    pub fn new(line: &'a str) -> Self {
        let mut words = Vec::new();
        let mut offset = 0;
        for chunk in line.split_whitespace() {
            // split_whitespace yields tokens in order, so searching from the
            // running offset finds each token's true position
            let start = line[offset..]
                .find(chunk)
                .map(|i| i + offset)
                .unwrap_or(offset);
            words.push((start, chunk));
            offset = start + chunk.len();
        }
        Self {
            words,
            pos: 0,
            line_len: line.len(),
        }
    }

    pub fn next(&mut self) -> Option<&'a str> {
        let word = self.words.get(self.pos)?.1;
        self.pos += 1;
        Some(word)
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.words.get(self.pos).map(|&(_, w)| w)
    }

    /// Undo the last `next`.
    pub fn putback(&mut self) {
        debug_assert!(self.pos > 0);
        self.pos = self.pos.saturating_sub(1);
    }

    /// 1-based column of the token last returned, or one past the line end
    /// when the scanner ran out of tokens.
    pub fn column(&self) -> usize {
        if self.pos == 0 {
            return 1;
        }
        match self.words.get(self.pos - 1) {
            Some(&(start, _)) => start + 1,
            None => self.line_len + 1,
        }
    }

    pub fn expect_next(&mut self, what: &str) -> StepResult<&'a str> {
        self.next().ok_or_else(|| StepError::syntax(what.to_string()))
    }

    pub fn expect_word(&mut self, what: &str) -> StepResult<()> {
        let word = self.expect_next(&format!("expected '{what}'"))?;
        if word != what {
            return Err(StepError::syntax(format!(
                "expected '{what}', got '{word}'"
            )));
        }
        Ok(())
    }

    pub fn expect_end(&mut self) -> StepResult<()> {
        match self.next() {
            None => Ok(()),
            Some(word) => Err(StepError::syntax(format!(
                "expected end of line, got '{word}'"
            ))),
        }
    }

    pub fn next_bigint(&mut self) -> StepResult<BigInt> {
        let word = self.expect_next("expected an integer, got nothing")?;
        BigInt::from_str(word)
            .map_err(|_| StepError::syntax(format!("expected an integer, got '{word}'")))
    }

    pub fn next_i64(&mut self) -> StepResult<i64> {
        let word = self.expect_next("expected an integer, got nothing")?;
        word.parse()
            .map_err(|_| StepError::syntax(format!("expected an integer, got '{word}'")))
    }
}

/// Parser for OPB constraints and objectives.
pub struct OpbParser<'v> {
    vars: &'v mut VarManager,
    allow_eq: bool,
}

impl<'v> OpbParser<'v> {
    pub fn new(vars: &'v mut VarManager, allow_eq: bool) -> Self {
        Self { vars, allow_eq }
    }

    /// Parse `coeff lit ... (>=|=) degree ;`.
    ///
    /// Equality expands into the two inequalities `>= degree` and
    /// (negated) `>= -degree`, in that order.
    pub fn constraint(&mut self, words: &mut WordScanner<'_>) -> StepResult<Vec<Ineq>> {
        let mut terms: Vec<(BigInt, crate::vars::Lit)> = Vec::new();
        let relation = loop {
            let token = words.expect_next("expected '>=' or '='")?;
            if token == ">=" || token == "=" {
                break token;
            }
            let coeff = BigInt::from_str(token).map_err(|_| {
                StepError::syntax(format!("expected a coefficient, got '{token}'"))
            })?;
            let lit_token = words.expect_next("expected a literal")?;
            terms.push((coeff, self.vars.lit(lit_token)?));
        };
        if relation == "=" && !self.allow_eq {
            return Err(StepError::syntax("equality is not allowed here, only >="));
        }

        let mut degree_token = words.expect_next("expected a degree")?;
        let mut saw_semicolon = false;
        if let Some(stripped) = degree_token.strip_suffix(';') {
            degree_token = stripped;
            saw_semicolon = true;
        }
        let degree = BigInt::from_str(degree_token)
            .map_err(|_| StepError::syntax(format!("expected a degree, got '{degree_token}'")))?;
        if !saw_semicolon {
            words.expect_word(";")?;
        }

        let mut result = vec![Ineq::from_terms(terms.iter().cloned(), degree.clone())];
        if relation == "=" {
            result.push(Ineq::from_terms(
                terms.into_iter().map(|(c, l)| (-c, l)),
                -degree,
            ));
        }
        Ok(result)
    }

    /// Parse `min: coeff lit ... ;` (the `min:` keyword already consumed).
    pub fn objective(&mut self, words: &mut WordScanner<'_>) -> StepResult<Objective> {
        let mut terms: Vec<(BigInt, crate::vars::Lit)> = Vec::new();
        loop {
            let token = words.expect_next("expected ';' at the end of the objective")?;
            if token == ";" {
                break;
            }
            let coeff = BigInt::from_str(token).map_err(|_| {
                StepError::syntax(format!("expected a coefficient, got '{token}'"))
            })?;
            let lit_token = words.expect_next("expected a literal")?;
            let lit = self.vars.lit(lit_token)?;
            if terms.iter().any(|&(_, l)| l.var() == lit.var()) {
                return Err(StepError::syntax(format!(
                    "variable '{}' occurs twice in the objective",
                    self.vars.name(lit.var())
                )));
            }
            terms.push((coeff, lit));
        }
        Ok(Objective { terms })
    }
}

/// Parse an OPB formula file.
pub fn parse_opb(text: &str, file: &str, vars: &mut VarManager) -> CheckResult<Formula> {
    let mut lines = text.lines().enumerate();

    let (_, header) = lines
        .next()
        .ok_or_else(|| StepError::syntax("expected header").at(file, 1, 1))?;
    let (declared_vars, declared_constraints) =
        parse_opb_header(header).map_err(|e| e.at(file, 1, 1))?;

    let mut constraints = Vec::new();
    let mut objective = None;
    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() || line.trim_start().starts_with('*') {
            continue;
        }
        let mut words = WordScanner::new(line);
        let result: StepResult<()> = (|| {
            if objective.is_none() && constraints.is_empty() && words.peek() == Some("min:") {
                words.next();
                objective = Some(OpbParser::new(vars, true).objective(&mut words)?);
            } else {
                for ineq in OpbParser::new(vars, true).constraint(&mut words)? {
                    constraints.push(Rc::new(ineq));
                }
            }
            words.expect_end()
        })();
        result.map_err(|e| e.at(file, line_no, words.column()))?;
    }

    Ok(Formula {
        constraints,
        objective,
        declared_vars,
        declared_constraints,
    })
}

fn parse_opb_header(line: &str) -> StepResult<(usize, usize)> {
    let mut words = WordScanner::new(line);
    words.expect_word("*")?;
    words.expect_word("#variable=")?;
    let vars = words.next_i64()?;
    words.expect_word("#constraint=")?;
    let constraints = words.next_i64()?;
    if vars < 0 || constraints < 0 {
        return Err(StepError::syntax("negative count in header"));
    }
    Ok((vars as usize, constraints as usize))
}

/// Parse a DIMACS CNF file. Clauses may span lines; each is terminated by 0.
pub fn parse_cnf(text: &str, file: &str, vars: &mut VarManager) -> CheckResult<Formula> {
    let mut header = None;
    let mut constraints = Vec::new();
    let mut clause: Vec<crate::vars::Lit> = Vec::new();
    let mut last_line = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }

        let mut words = WordScanner::new(line);
        if header.is_none() {
            let parsed: StepResult<(usize, usize)> = (|| {
                words.expect_word("p")?;
                words.expect_word("cnf")?;
                let num_vars = words.next_i64()?;
                let num_clauses = words.next_i64()?;
                words.expect_end()?;
                if num_vars < 0 || num_clauses < 0 {
                    return Err(StepError::syntax("negative count in header"));
                }
                Ok((num_vars as usize, num_clauses as usize))
            })();
            header = Some(parsed.map_err(|e| e.at(file, line_no, words.column()))?);
            continue;
        }

        let result: StepResult<()> = (|| {
            while let Some(token) = words.next() {
                let n: i64 = token.parse().map_err(|_| {
                    StepError::syntax(format!("expected a literal, got '{token}'"))
                })?;
                if n == 0 {
                    let terms = clause
                        .drain(..)
                        .map(|l| (BigInt::from(1), l))
                        .collect::<Vec<_>>();
                    constraints.push(Rc::new(Ineq::from_terms(terms, BigInt::from(1))));
                } else {
                    clause.push(vars.dimacs_lit(n)?);
                }
            }
            Ok(())
        })();
        result.map_err(|e| e.at(file, line_no, words.column()))?;
    }

    let (declared_vars, declared_constraints) = header
        .ok_or_else(|| StepError::syntax("expected 'p cnf' header").at(file, last_line + 1, 1))?;
    if !clause.is_empty() {
        return Err(
            StepError::syntax("expected 0 at the end of the last clause").at(file, last_line, 1),
        );
    }

    Ok(Formula {
        constraints,
        objective: None,
        declared_vars,
        declared_constraints,
    })
}

/// Parse a formula file, detecting DIMACS CNF by its `p cnf` header.
pub fn parse_formula(text: &str, file: &str, vars: &mut VarManager) -> CheckResult<Formula> {
    let is_cnf = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('c'))
        .is_some_and(|l| l.starts_with("p cnf") || l.starts_with("p "));
    if is_cnf {
        parse_cnf(text, file, vars)
    } else {
        parse_opb(text, file, vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::{Lit, Var};

    fn ineq(terms: &[(i64, i32)], degree: i64) -> Ineq {
        Ineq::from_terms(
            terms.iter().map(|&(c, l)| {
                let var = Var(l.unsigned_abs());
                (BigInt::from(c), Lit::new(var, l < 0))
            }),
            BigInt::from(degree),
        )
    }

    #[test]
    fn test_scanner_columns() {
        let mut words = WordScanner::new("e 2  1 x1");
        assert_eq!(words.next(), Some("e"));
        assert_eq!(words.column(), 1);
        assert_eq!(words.next(), Some("2"));
        assert_eq!(words.column(), 3);
        assert_eq!(words.next(), Some("1"));
        assert_eq!(words.column(), 6);
        words.putback();
        assert_eq!(words.next(), Some("1"));
        assert_eq!(words.next(), Some("x1"));
        assert!(words.next().is_none());
        assert_eq!(words.column(), 10);
    }

    #[test]
    fn test_parse_constraint() {
        let mut vars = VarManager::new(true);
        let mut words = WordScanner::new("2 x1 -1 x2 >= 1 ;");
        let parsed = OpbParser::new(&mut vars, false)
            .constraint(&mut words)
            .unwrap();
        assert_eq!(parsed, vec![ineq(&[(2, 1), (1, -2)], 2)]);
        assert!(words.expect_end().is_ok());
    }

    #[test]
    fn test_parse_constraint_glued_semicolon() {
        let mut vars = VarManager::new(true);
        let mut words = WordScanner::new("1 x1 >= 1;");
        let parsed = OpbParser::new(&mut vars, false)
            .constraint(&mut words)
            .unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_equality_expands() {
        let mut vars = VarManager::new(true);
        let mut words = WordScanner::new("1 x1 1 x2 = 1 ;");
        let parsed = OpbParser::new(&mut vars, true)
            .constraint(&mut words)
            .unwrap();
        assert_eq!(
            parsed,
            vec![ineq(&[(1, 1), (1, 2)], 1), ineq(&[(-1, 1), (-1, 2)], -1)]
        );

        let mut words = WordScanner::new("1 x1 1 x2 = 1 ;");
        assert!(OpbParser::new(&mut vars, false)
            .constraint(&mut words)
            .is_err());
    }

    #[test]
    fn test_parse_opb_formula() {
        let text = "\
* #variable= 2 #constraint= 2
* a comment
1 x1 1 x2 >= 1 ;
2 x1 >= 1 ;
";
        let mut vars = VarManager::new(true);
        let formula = parse_opb(text, "f.opb", &mut vars).unwrap();
        assert_eq!(formula.constraints.len(), 2);
        assert_eq!(formula.declared_vars, 2);
        assert_eq!(formula.declared_constraints, 2);
        assert!(formula.objective.is_none());
    }

    #[test]
    fn test_parse_opb_objective() {
        let text = "\
* #variable= 2 #constraint= 1
min: 1 x1 2 ~x2 ;
1 x1 1 x2 >= 1 ;
";
        let mut vars = VarManager::new(true);
        let formula = parse_opb(text, "f.opb", &mut vars).unwrap();
        let objective = formula.objective.unwrap();
        assert_eq!(objective.terms.len(), 2);
        assert_eq!(objective.terms[0].0, BigInt::from(1));
        assert!(objective.terms[1].1.is_negated());
    }

    #[test]
    fn test_parse_cnf() {
        let text = "\
c a comment
p cnf 2 2
1 2 0
-1
-2 0
";
        let mut vars = VarManager::new(true);
        let formula = parse_cnf(text, "f.cnf", &mut vars).unwrap();
        assert_eq!(formula.constraints.len(), 2);
        assert_eq!(*formula.constraints[0], ineq(&[(1, 1), (1, 2)], 1));
        assert_eq!(*formula.constraints[1], ineq(&[(1, -1), (1, -2)], 1));
    }

    #[test]
    fn test_parse_errors_carry_location() {
        let mut vars = VarManager::new(true);
        let err = parse_opb("* #variable= 1 #constraint= 1\n1 x1 >= ;\n", "f.opb", &mut vars)
            .unwrap_err();
        match err {
            crate::error::CheckError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_formula_auto_detection() {
        let mut vars = VarManager::new(true);
        let cnf = parse_formula("p cnf 1 1\n1 0\n", "f", &mut vars).unwrap();
        assert_eq!(cnf.constraints.len(), 1);

        let mut vars = VarManager::new(true);
        let opb =
            parse_formula("* #variable= 1 #constraint= 1\n1 x1 >= 1 ;\n", "f", &mut vars).unwrap();
        assert_eq!(opb.constraints.len(), 1);
    }
}
