// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Normalized pseudo-Boolean inequalities and their arithmetic.
//!
//! An [`Ineq`] represents `sum of coefficient * literal >= degree` in
//! normalized form: every coefficient is positive, a variable occurs at most
//! once, and terms are kept sorted by variable so that equal constraints
//! compare and hash equal. Negative input coefficients are absorbed by
//! flipping the literal and shifting the degree, using the 0/1 upper bound
//! of Boolean variables.
//!
//! All arithmetic is exact; coefficients and degrees are arbitrary-precision
//! integers.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use crate::substitution::{Image, Substitution};
use crate::vars::{Lit, Var, VarManager};

/// One term of an inequality: a positive coefficient times a literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Term {
    pub coeff: BigInt,
    pub lit: Lit,
}

/// A normalized pseudo-Boolean inequality `terms >= degree`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ineq {
    terms: Vec<Term>,
    degree: BigInt,
}

impl Ineq {
    /// Build an inequality from raw terms.
    ///
    /// Accepts arbitrary signed coefficients and repeated variables; opposite
    /// literals of the same variable cancel against each other, shifting the
    /// degree by the cancelled amount.
    pub fn from_terms<I>(terms: I, mut degree: BigInt) -> Ineq
    where
        I: IntoIterator<Item = (BigInt, Lit)>,
    {
        // Accumulate a signed coefficient on the positive literal of each
        // variable: `c * ~x` contributes `-c` and shifts the degree by `-c`.
        let mut signed: BTreeMap<Var, BigInt> = BTreeMap::new();
        for (coeff, lit) in terms {
            if coeff.is_zero() {
                continue;
            }
            if lit.is_negated() {
                degree -= &coeff;
                *signed.entry(lit.var()).or_default() -= coeff;
            } else {
                *signed.entry(lit.var()).or_default() += coeff;
            }
        }

        let mut out = Vec::with_capacity(signed.len());
        for (var, coeff) in signed {
            if coeff.is_zero() {
                continue;
            }
            if coeff.is_negative() {
                // Flip to the negated literal; the degree shifts by the
                // coefficient times the 0/1 upper bound.
                let magnitude = -coeff;
                degree += &magnitude;
                out.push(Term {
                    coeff: magnitude,
                    lit: var.neg(),
                });
            } else {
                out.push(Term {
                    coeff,
                    lit: var.pos(),
                });
            }
        }

        Ineq { terms: out, degree }
    }

    /// The literal axiom `1 * lit >= 0`.
    pub fn lit_axiom(lit: Lit) -> Ineq {
        Ineq {
            terms: vec![Term {
                coeff: BigInt::one(),
                lit,
            }],
            degree: BigInt::zero(),
        }
    }

    /// The unsatisfiable empty constraint `0 >= 1`.
    pub fn contradiction() -> Ineq {
        Ineq {
            terms: Vec::new(),
            degree: BigInt::one(),
        }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn degree(&self) -> &BigInt {
        &self.degree
    }

    /// The term on `var`, if present.
    pub fn term_for(&self, var: Var) -> Option<&Term> {
        self.terms
            .binary_search_by_key(&var, |t| t.lit.var())
            .ok()
            .map(|i| &self.terms[i])
    }

    /// Sum of coefficients minus degree; negative slack is a contradiction.
    pub fn slack(&self) -> BigInt {
        let mut slack = -self.degree.clone();
        for term in &self.terms {
            slack += &term.coeff;
        }
        slack
    }

    pub fn is_contradiction(&self) -> bool {
        self.slack().is_negative()
    }

    /// True when the constraint holds under every assignment.
    pub fn is_trivial(&self) -> bool {
        !self.degree.is_positive()
    }

    /// Term-wise sum with cancellation across complementary literals.
    pub fn add(&self, other: &Ineq) -> Ineq {
        let degree = &self.degree + &other.degree;
        let terms = self
            .terms
            .iter()
            .chain(other.terms.iter())
            .map(|t| (t.coeff.clone(), t.lit));
        Ineq::from_terms(terms, degree)
    }

    /// Scale all coefficients and the degree by `factor >= 0`.
    pub fn multiply(&self, factor: &BigInt) -> Ineq {
        debug_assert!(!factor.is_negative());
        if factor.is_zero() {
            return Ineq {
                terms: Vec::new(),
                degree: BigInt::zero(),
            };
        }
        Ineq {
            terms: self
                .terms
                .iter()
                .map(|t| Term {
                    coeff: &t.coeff * factor,
                    lit: t.lit,
                })
                .collect(),
            degree: &self.degree * factor,
        }
    }

    /// Ceiling-divide all coefficients and the degree by `divisor >= 1`.
    pub fn divide(&self, divisor: &BigInt) -> Ineq {
        debug_assert!(divisor.is_positive());
        Ineq {
            terms: self
                .terms
                .iter()
                .map(|t| Term {
                    coeff: ceil_div(&t.coeff, divisor),
                    lit: t.lit,
                })
                .collect(),
            degree: ceil_div(&self.degree, divisor),
        }
    }

    /// Clip every coefficient to the degree; zero-coefficient terms drop out.
    pub fn saturate(&self) -> Ineq {
        let mut terms = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let coeff = if term.coeff > self.degree {
                self.degree.clone()
            } else {
                term.coeff.clone()
            };
            if coeff.is_positive() {
                terms.push(Term {
                    coeff,
                    lit: term.lit,
                });
            }
        }
        Ineq {
            terms,
            degree: self.degree.clone(),
        }
    }

    /// Weaken away the term on `var`: drop it and lower the degree by its
    /// coefficient. Without a term on `var` the constraint is unchanged.
    pub fn weaken(&self, var: Var) -> Ineq {
        match self.term_for(var) {
            None => self.clone(),
            Some(term) => {
                let degree = &self.degree - &term.coeff;
                let terms = self
                    .terms
                    .iter()
                    .filter(|t| t.lit.var() != var)
                    .cloned()
                    .collect();
                Ineq { terms, degree }
            }
        }
    }

    /// Logical negation: `degree <- sum of coefficients - degree + 1`, every
    /// literal flipped.
    pub fn negated(&self) -> Ineq {
        let mut degree = -self.degree.clone() + 1;
        let terms = self
            .terms
            .iter()
            .map(|t| {
                degree += &t.coeff;
                Term {
                    coeff: t.coeff.clone(),
                    lit: !t.lit,
                }
            })
            .collect();
        Ineq { terms, degree }
    }

    /// Apply a witness substitution and re-normalize.
    ///
    /// A constant literal evaluating to true cancels its term and lowers the
    /// residual degree; evaluating to false simply drops the term. Remapped
    /// variables may merge with existing terms, which cancels as in [`add`].
    ///
    /// [`add`]: Ineq::add
    pub fn substitute(&self, sub: &Substitution) -> Ineq {
        let mut degree = self.degree.clone();
        let mut raw = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            match sub.image(term.lit) {
                Image::True => degree -= &term.coeff,
                Image::False => {}
                Image::Lit(lit) => raw.push((term.coeff.clone(), lit)),
                Image::Unchanged => raw.push((term.coeff.clone(), term.lit)),
            }
        }
        Ineq::from_terms(raw, degree)
    }

    /// Syntactic implication check by coefficient weakening.
    ///
    /// Over-approximates semantic implication: `self` implies `other` when
    /// `other` can be reached from `self` by weakening away surplus
    /// coefficients. Complete for clauses and identical literal sets, sound
    /// in general.
    pub fn implies(&self, other: &Ineq) -> bool {
        let mut weaken_cost = BigInt::zero();
        for term in &self.terms {
            match other.term_for(term.lit.var()) {
                None => weaken_cost += &term.coeff,
                Some(theirs) => {
                    if theirs.lit != term.lit {
                        weaken_cost += &term.coeff;
                    } else if term.coeff > theirs.coeff {
                        weaken_cost += &term.coeff - &theirs.coeff;
                    }
                }
            }
        }
        &self.degree - weaken_cost >= other.degree
    }

    /// Render in OPB syntax with user-facing variable names.
    pub fn to_opb(&self, vars: &VarManager) -> String {
        let mut out = String::new();
        for term in &self.terms {
            out.push_str(&format!("+{} {} ", term.coeff, vars.lit_name(term.lit)));
        }
        out.push_str(&format!(">= {}", self.degree));
        out
    }
}

impl fmt::Display for Ineq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for term in &self.terms {
            write!(f, "+{} {} ", term.coeff, term.lit)?;
        }
        write!(f, ">= {}", self.degree)
    }
}

fn ceil_div(value: &BigInt, divisor: &BigInt) -> BigInt {
    if value.is_positive() {
        (value + divisor - 1) / divisor
    } else {
        // truncating division is already the ceiling for non-positive values
        value / divisor
    }
}
