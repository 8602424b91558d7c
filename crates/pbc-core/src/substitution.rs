// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Witness substitutions for redundancy and dominance steps.
//!
//! A substitution is a set of constant literals (fixed to true) plus a
//! variable-to-literal remap. No variable appears both as a constant and in
//! the mapping, and no variable appears twice; the parser enforces this.
//! Entries are kept sorted so substitutions can serve as cache keys.

use crate::error::{StepError, StepResult};
use crate::parse::WordScanner;
use crate::vars::{Lit, Var, VarManager};

/// Image of a literal under a substitution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Image {
    True,
    False,
    Lit(Lit),
    Unchanged,
}

/// A witness substitution: constants plus a variable remap.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Substitution {
    /// Literals fixed to true, sorted by variable.
    constants: Vec<Lit>,
    /// Variable remappings, sorted by source variable.
    mapping: Vec<(Var, Lit)>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix `lit` to true. A later entry for the same variable replaces the
    /// earlier one; callers that must reject duplicates check beforehand.
    pub fn set_constant(&mut self, lit: Lit) {
        match self.constants.binary_search_by_key(&lit.var(), |l| l.var()) {
            Ok(i) => self.constants[i] = lit,
            Err(i) => self.constants.insert(i, lit),
        }
    }

    /// Map `var` to `lit`.
    pub fn map(&mut self, var: Var, lit: Lit) {
        match self.mapping.binary_search_by_key(&var, |&(v, _)| v) {
            Ok(i) => self.mapping[i] = (var, lit),
            Err(i) => self.mapping.insert(i, (var, lit)),
        }
    }

    /// Map each variable of `from` to the positive literal of the matching
    /// variable in `to`.
    pub fn map_all(&mut self, from: &[Var], to: &[Var]) {
        for (&f, &t) in from.iter().zip(to.iter()) {
            self.map(f, t.pos());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty() && self.mapping.is_empty()
    }

    /// Whether `var` occurs in the support (as constant or remap source).
    pub fn touches(&self, var: Var) -> bool {
        self.constants
            .binary_search_by_key(&var, |l| l.var())
            .is_ok()
            || self.mapping.binary_search_by_key(&var, |&(v, _)| v).is_ok()
    }

    /// Variables in the support, ascending.
    pub fn support(&self) -> Vec<Var> {
        let mut vars: Vec<Var> = self
            .constants
            .iter()
            .map(|l| l.var())
            .chain(self.mapping.iter().map(|&(v, _)| v))
            .collect();
        vars.sort();
        vars.dedup();
        vars
    }

    /// The image of `lit` under this substitution.
    pub fn image(&self, lit: Lit) -> Image {
        let var = lit.var();
        if let Ok(i) = self.constants.binary_search_by_key(&var, |l| l.var()) {
            return if self.constants[i] == lit {
                Image::True
            } else {
                Image::False
            };
        }
        if let Ok(i) = self.mapping.binary_search_by_key(&var, |&(v, _)| v) {
            let target = self.mapping[i].1;
            return Image::Lit(if lit.is_negated() { !target } else { target });
        }
        Image::Unchanged
    }

    /// The image of `lit` as a literal-or-constant, for callers that need
    /// the mapped value even when it is a Boolean constant.
    pub fn image_of_var(&self, var: Var) -> Image {
        self.image(var.pos())
    }

    /// Parse a witness: `var [-> ] (0|1|lit)` pairs, optionally separated by
    /// commas, terminated by `;` or end of line.
    pub fn parse(
        words: &mut WordScanner<'_>,
        vars: &mut VarManager,
        forbidden: &[Var],
    ) -> StepResult<Substitution> {
        let mut result = Substitution::new();
        loop {
            let token = match words.peek() {
                None => break,
                Some(";") => {
                    words.next();
                    break;
                }
                Some(t) => t,
            };
            let from = vars.lit(token)?;
            if from.is_negated() {
                return Err(StepError::syntax(
                    "substitutions may only map variables, not negated literals",
                ));
            }
            let from = from.var();
            if forbidden.contains(&from) {
                return Err(StepError::syntax(format!(
                    "substitution maps variable '{}' fixed by the loaded order",
                    vars.name(from)
                )));
            }
            if result.touches(from) {
                return Err(StepError::syntax(format!(
                    "variable '{}' occurs twice in the substitution",
                    vars.name(from)
                )));
            }
            words.next();

            let mut value = words.expect_next("substitution is missing a value")?;
            if value == "->" || value == "→" {
                value = words.expect_next("substitution is missing a value")?;
            }
            match value {
                "0" => result.set_constant(from.neg()),
                "1" => result.set_constant(from.pos()),
                _ => {
                    let to = vars.lit(value)?;
                    result.map(from, to);
                }
            }

            if words.peek() == Some(",") {
                words.next();
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(line: &str) -> WordScanner<'_> {
        WordScanner::new(line)
    }

    #[test]
    fn test_parse_constants_and_remap() {
        let mut vars = VarManager::new(true);
        let x1 = vars.var("x1").unwrap();
        let x2 = vars.var("x2").unwrap();
        let x3 = vars.var("x3").unwrap();

        let mut words = scan("x1 -> 1 x2 -> 0 x3 -> ~x1");
        let sub = Substitution::parse(&mut words, &mut vars, &[]).unwrap();

        assert_eq!(sub.image(x1.pos()), Image::True);
        assert_eq!(sub.image(x1.neg()), Image::False);
        assert_eq!(sub.image(x2.pos()), Image::False);
        assert_eq!(sub.image(x3.pos()), Image::Lit(x1.neg()));
        assert_eq!(sub.image(x3.neg()), Image::Lit(x1.pos()));
        assert_eq!(sub.support(), vec![x1, x2, x3]);
    }

    #[test]
    fn test_parse_stops_at_semicolon() {
        let mut vars = VarManager::new(true);
        let mut words = scan("x1 1 ; begin");
        let sub = Substitution::parse(&mut words, &mut vars, &[]).unwrap();
        assert!(!sub.is_empty());
        assert_eq!(words.next(), Some("begin"));
    }

    #[test]
    fn test_parse_rejects_duplicates_and_forbidden() {
        let mut vars = VarManager::new(true);
        let x1 = vars.var("x1").unwrap();

        let mut words = scan("x1 1 x1 0");
        assert!(Substitution::parse(&mut words, &mut vars, &[]).is_err());

        let mut words = scan("x1 1");
        assert!(Substitution::parse(&mut words, &mut vars, &[x1]).is_err());

        let mut words = scan("~x1 1");
        assert!(Substitution::parse(&mut words, &mut vars, &[]).is_err());
    }

    #[test]
    fn test_map_all() {
        let mut sub = Substitution::new();
        sub.map_all(&[Var(1), Var(2)], &[Var(3), Var(4)]);
        assert_eq!(sub.image(Var(1).pos()), Image::Lit(Var(3).pos()));
        assert_eq!(sub.image(Var(2).neg()), Image::Lit(Var(4).neg()));
        assert_eq!(sub.image(Var(5).pos()), Image::Unchanged);
    }
}
