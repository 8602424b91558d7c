// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Author: Pushp Kharat

//! Parsed input formulas and optimization objectives.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::ineq::Ineq;
use crate::vars::Lit;

/// A minimization objective: a linear term over literals.
///
/// Kept exactly as written in the input; coefficients may be negative.
#[derive(Clone, Debug, Default)]
pub struct Objective {
    pub terms: Vec<(BigInt, Lit)>,
}

impl Objective {
    /// Objective value under an assignment; unassigned literals contribute
    /// nothing.
    pub fn value_under(&self, is_true: impl Fn(Lit) -> bool) -> BigInt {
        let mut value = BigInt::zero();
        for (coeff, lit) in &self.terms {
            if is_true(*lit) {
                value += coeff;
            }
        }
        value
    }
}

/// An input formula: constraints in parse order plus metadata from the
/// header. Formula constraints receive the first constraint IDs and are
/// attached as core.
#[derive(Debug, Default)]
pub struct Formula {
    pub constraints: Vec<Rc<Ineq>>,
    pub objective: Option<Objective>,
    pub declared_vars: usize,
    pub declared_constraints: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::Var;

    #[test]
    fn test_objective_value() {
        let objective = Objective {
            terms: vec![
                (BigInt::from(2), Var(1).pos()),
                (BigInt::from(3), Var(2).neg()),
            ],
        };
        let value = objective.value_under(|lit| lit == Var(1).pos());
        assert_eq!(value, BigInt::from(2));

        let value = objective.value_under(|_| true);
        assert_eq!(value, BigInt::from(5));
    }
}
