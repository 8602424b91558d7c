// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Variables, literals and the variable registry.
//!
//! Variables are dense positive integers starting at 1. A literal is a signed
//! variable: positive means the variable is asserted, negative means negated.
//! Zero is reserved as a sentinel and never a valid literal.

use std::fmt;

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner, Symbol as _};

use crate::error::StepError;

/// A propositional variable, numbered from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(pub u32);

impl Var {
    /// The positive literal of this variable.
    pub fn pos(self) -> Lit {
        Lit(self.0 as i32)
    }

    /// The negative literal of this variable.
    pub fn neg(self) -> Lit {
        Lit(-(self.0 as i32))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A literal: a variable or its negation.
///
/// Stored as a signed integer whose absolute value is the variable number,
/// matching the normalized-form convention of the constraint algebra.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lit(i32);

impl Lit {
    /// Build a literal from a variable and a sign (`true` = negated).
    pub fn new(var: Var, negated: bool) -> Lit {
        if negated {
            var.neg()
        } else {
            var.pos()
        }
    }

    pub fn var(self) -> Var {
        Var(self.0.unsigned_abs())
    }

    pub fn is_negated(self) -> bool {
        self.0 < 0
    }

    /// The complementary literal.
    pub fn negated(self) -> Lit {
        Lit(-self.0)
    }
}

impl std::ops::Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        self.negated()
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negated() {
            write!(f, "~{}", self.var())
        } else {
            write!(f, "{}", self.var())
        }
    }
}

/// Bidirectional map between user variable names and dense IDs.
///
/// Two modes:
/// - free names (default): any identifier is interned and receives the next
///   free ID in first-appearance order;
/// - restricted: names must match `x<N>` and the numeric suffix is the ID.
#[derive(Debug)]
pub struct VarManager {
    free_names: bool,
    interner: StringInterner<DefaultBackend>,
    max_var: u32,
}

impl VarManager {
    pub fn new(free_names: bool) -> Self {
        Self {
            free_names,
            interner: StringInterner::new(),
            max_var: 0,
        }
    }

    /// Whether `name` is an acceptable variable name in the current mode.
    pub fn is_var_name(&self, name: &str) -> bool {
        if !self.free_names {
            return parse_xn(name).is_some();
        }
        name.len() >= 2
            && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && !name.contains(';')
            && !name.contains('=')
    }

    /// Whether `token` denotes a literal (a variable name, optionally
    /// prefixed with `~`).
    pub fn is_lit(&self, token: &str) -> bool {
        let name = token.strip_prefix('~').unwrap_or(token);
        self.is_var_name(name)
    }

    /// Look up or create the variable for `name`.
    pub fn var(&mut self, name: &str) -> Result<Var, StepError> {
        if !self.is_var_name(name) {
            return Err(StepError::syntax(format!(
                "'{name}' is not a valid variable name"
            )));
        }
        if !self.free_names {
            // is_var_name already validated the x<N> shape
            let n = parse_xn(name).expect("validated variable name");
            self.max_var = self.max_var.max(n);
            return Ok(Var(n));
        }
        let sym = self.interner.get_or_intern(name);
        let id = sym.to_usize() as u32 + 1;
        self.max_var = self.max_var.max(id);
        Ok(Var(id))
    }

    /// Parse a literal token (`name` or `~name`).
    pub fn lit(&mut self, token: &str) -> Result<Lit, StepError> {
        match token.strip_prefix('~') {
            Some(name) => Ok(self.var(name)?.neg()),
            None => Ok(self.var(token)?.pos()),
        }
    }

    /// The variable for the DIMACS number `n`, i.e. the name `x<n>`.
    pub fn numbered(&mut self, n: u32) -> Result<Var, StepError> {
        self.var(&format!("x{n}"))
    }

    /// The literal for a signed DIMACS number.
    pub fn dimacs_lit(&mut self, n: i64) -> Result<Lit, StepError> {
        if n == 0 || n.unsigned_abs() > u32::MAX as u64 {
            return Err(StepError::syntax(format!("'{n}' is not a valid literal")));
        }
        let var = self.numbered(n.unsigned_abs() as u32)?;
        Ok(Lit::new(var, n < 0))
    }

    /// The user-facing name of `var`.
    pub fn name(&self, var: Var) -> String {
        if self.free_names {
            if let Some(sym) = DefaultSymbol::try_from_usize(var.index() - 1) {
                if let Some(name) = self.interner.resolve(sym) {
                    return name.to_string();
                }
            }
        }
        format!("x{}", var.0)
    }

    /// Render a literal with its user-facing name.
    pub fn lit_name(&self, lit: Lit) -> String {
        if lit.is_negated() {
            format!("~{}", self.name(lit.var()))
        } else {
            self.name(lit.var())
        }
    }

    /// Highest variable ID handed out so far.
    pub fn num_vars(&self) -> u32 {
        self.max_var
    }
}

impl Default for VarManager {
    fn default() -> Self {
        Self::new(true)
    }
}

fn parse_xn(name: &str) -> Option<u32> {
    let digits = name.strip_prefix('x')?;
    if digits.is_empty() || digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_names_dense_ids() {
        let mut vars = VarManager::new(true);
        let a = vars.var("alpha").unwrap();
        let b = vars.var("beta").unwrap();
        let a2 = vars.var("alpha").unwrap();

        assert_eq!(a, Var(1));
        assert_eq!(b, Var(2));
        assert_eq!(a, a2);
        assert_eq!(vars.num_vars(), 2);
        assert_eq!(vars.name(a), "alpha");
    }

    #[test]
    fn test_restricted_names_use_suffix() {
        let mut vars = VarManager::new(false);
        let x7 = vars.var("x7").unwrap();
        assert_eq!(x7, Var(7));
        assert_eq!(vars.num_vars(), 7);
        assert!(vars.var("y1").is_err());
        assert!(vars.var("x01").is_err());
    }

    #[test]
    fn test_literal_parsing() {
        let mut vars = VarManager::new(true);
        let pos = vars.lit("x1").unwrap();
        let neg = vars.lit("~x1").unwrap();

        assert_eq!(pos.var(), neg.var());
        assert!(!pos.is_negated());
        assert!(neg.is_negated());
        assert_eq!(pos.negated(), neg);
        assert_eq!(!neg, pos);
    }

    #[test]
    fn test_name_validation() {
        let vars = VarManager::new(true);
        assert!(vars.is_var_name("x1"));
        assert!(vars.is_var_name("flip_bit"));
        assert!(!vars.is_var_name("x"));
        assert!(!vars.is_var_name("1x"));
        assert!(!vars.is_var_name("a;b"));
        assert!(vars.is_lit("~x1"));
    }

    #[test]
    fn test_dimacs_literals() {
        let mut vars = VarManager::new(true);
        let l = vars.dimacs_lit(-3).unwrap();
        assert!(l.is_negated());
        assert_eq!(vars.name(l.var()), "x3");
        assert!(vars.dimacs_lit(0).is_err());
    }
}
