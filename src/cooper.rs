//! Quantifier elimination for linear integer arithmetic, by Cooper's method.
//!
//! After scaling so that `x` has coefficient ±1 in every atom, let `δ` be the lcm of the
//! divisors of the divisibility atoms on `x` and `B` the set of strict lower bounds on `x`.
//! Then
//!
//! ```text
//! ∃x. φ(x)  ≡  ⋁_{j=1..δ} φ₋∞(j)  ∨  ⋁_{j=1..δ} ⋁_{b ∈ B} φ(b + j)
//! ```
//!
//! where `φ₋∞` is `φ` with every bound on `x` replaced by its truth value for a very
//! small `x`. When `x` has fewer upper than lower bounds the mirror image `φ(-x)` is used.

use std::collections::BTreeSet;

use log::trace;

use crate::expr::Var;
use crate::linear::{checked, lcm, ArithError, Atom, Formula, Linear};

/// `∃ var. phi`, as a formula without `var`.
pub fn exists(var: &Var, phi: Formula) -> Result<Formula, ArithError> {
    match phi {
        Formula::Const(_) => Ok(phi),
        Formula::Lit(..) => {
            if phi.mentions(var) {
                eliminate(var, vec![phi])
            } else {
                Ok(phi)
            }
        }
        Formula::Or(disjuncts) => {
            let mut res = Vec::with_capacity(disjuncts.len());
            for d in disjuncts {
                let e = exists(var, d)?;
                if e == Formula::TRUE {
                    return Ok(Formula::TRUE);
                }
                res.push(e);
            }
            Ok(Formula::or(res))
        }
        Formula::And(conjuncts) => {
            let (mut inner, outer): (Vec<_>, Vec<_>) = conjuncts.into_iter().partition(|c| c.mentions(var));
            let eliminated = match inner.len() {
                0 => Formula::TRUE,
                1 => exists(var, inner.remove(0))?,
                _ => eliminate(var, inner)?,
            };
            Ok(Formula::and(outer.into_iter().chain([eliminated])))
        }
    }
}

/// `∀ var. phi`, as a formula without `var`.
pub fn forall(var: &Var, phi: Formula) -> Result<Formula, ArithError> {
    Ok(!exists(var, !phi)?)
}

/// Whether some integer assignment satisfies `phi`.
pub fn is_satisfiable(phi: &Formula) -> Result<bool, ArithError> {
    let mut res = phi.clone();
    for var in phi.free_vars() {
        res = exists(&var, res)?;
    }
    match res {
        Formula::Const(b) => Ok(b),
        other => unreachable!("closed formula `{}` did not fold", other),
    }
}

/// `∃ var. ⋀ conjuncts`, where every conjunct mentions `var`.
fn eliminate(var: &Var, mut conjuncts: Vec<Formula>) -> Result<Formula, ArithError> {
    // c*x + r == 0 with c = ±1 pins x to -c*r
    let unit = conjuncts.iter().enumerate().find_map(|(i, c)| match c {
        Formula::Lit(Atom::Eq(t), true) if matches!(t.coeff(var), 1 | -1) => Some((i, t.clone())),
        _ => None,
    });
    if let Some((i, t)) = unit {
        conjuncts.remove(i);
        let value = t.without(var).scale(-t.coeff(var))?;
        trace!("{} := {}", var, value);
        return Formula::and(conjuncts).substitute(var, &value);
    }
    cooper(var, Formula::and(conjuncts))
}

fn cooper(var: &Var, phi: Formula) -> Result<Formula, ArithError> {
    let phi = unit_coefficients(var, phi)?;
    let mirrored = phi.substitute(var, &Linear::var(var.clone()).neg()?)?;

    let mut lower = BTreeSet::new();
    lower_bounds(var, &phi, &mut lower)?;
    let mut upper = BTreeSet::new();
    lower_bounds(var, &mirrored, &mut upper)?;
    let (phi, bounds) = if upper.len() < lower.len() {
        (mirrored, upper)
    } else {
        (phi, lower)
    };

    let delta = divisor_lcm(var, &phi)?;
    let at_minus_infinity = minus_infinity(var, &phi)?;
    trace!("eliminating {}: {} bounds, delta = {}", var, bounds.len(), delta);

    let mut disjuncts = Vec::new();
    for j in 1..=delta {
        disjuncts.push(at_minus_infinity.substitute(var, &Linear::constant(j))?);
        for b in &bounds {
            disjuncts.push(phi.substitute(var, &b.add_constant(j)?)?);
        }
        if disjuncts.contains(&Formula::TRUE) {
            return Ok(Formula::TRUE);
        }
    }
    Ok(Formula::or(disjuncts))
}

/// Equivalent formula (for `∃ var`) in which `var` has coefficient ±1.
fn unit_coefficients(var: &Var, phi: Formula) -> Result<Formula, ArithError> {
    let l = coefficient_lcm(var, &phi)?;
    if l == 1 {
        return Ok(phi);
    }
    let scaled = phi.map_lits(&mut |atom, positive| {
        let c = atom.term().coeff(var);
        if c == 0 {
            return Ok(Formula::Lit(atom.clone(), positive));
        }
        // Multiply through by m = l/|c|, then read l*x as the new x.
        let m = (l / c).abs();
        let term = atom.term().scale(m)?.with_coeff(var, c.signum());
        let f = match atom {
            Atom::Dvd(d, _) => Formula::dvd(checked(d.checked_mul(m))?, term)?,
            _ => atom.rebuild(term)?,
        };
        Ok(if positive { f } else { !f })
    })?;
    Ok(Formula::and([scaled, Formula::dvd(l, Linear::var(var.clone()))?]))
}

fn coefficient_lcm(var: &Var, phi: &Formula) -> Result<i64, ArithError> {
    match phi {
        Formula::Const(_) => Ok(1),
        Formula::Lit(atom, _) => match atom.term().coeff(var) {
            0 => Ok(1),
            c => checked(c.checked_abs()),
        },
        Formula::And(fs) | Formula::Or(fs) => {
            let mut res = 1;
            for f in fs {
                res = lcm(res, coefficient_lcm(var, f)?)?;
            }
            Ok(res)
        }
    }
}

fn divisor_lcm(var: &Var, phi: &Formula) -> Result<i64, ArithError> {
    match phi {
        Formula::Lit(Atom::Dvd(d, t), _) if t.mentions(var) => Ok(*d),
        Formula::Const(_) | Formula::Lit(..) => Ok(1),
        Formula::And(fs) | Formula::Or(fs) => {
            let mut res = 1;
            for f in fs {
                res = lcm(res, divisor_lcm(var, f)?)?;
            }
            Ok(res)
        }
    }
}

/// Collect `b` for every literal of the form `x > b` (or one that holds just above `b`).
fn lower_bounds(var: &Var, phi: &Formula, bounds: &mut BTreeSet<Linear>) -> Result<(), ArithError> {
    match phi {
        Formula::Const(_) => {}
        Formula::And(fs) | Formula::Or(fs) => {
            for f in fs {
                lower_bounds(var, f, bounds)?;
            }
        }
        Formula::Lit(atom, positive) => {
            let c = atom.term().coeff(var);
            if c == 0 {
                return Ok(());
            }
            let r = atom.term().without(var);
            match atom {
                // -x + r <= 0 is x > r - 1, !(x + r <= 0) is x > -r
                Atom::Le(_) if (c < 0) == *positive => {
                    bounds.insert(if *positive { r.add_constant(-1)? } else { r.neg()? });
                }
                // x == v holds just above v - 1, x != v just above v
                Atom::Eq(_) => {
                    let v = r.scale(-c)?;
                    bounds.insert(if *positive { v.add_constant(-1)? } else { v });
                }
                Atom::Le(_) | Atom::Dvd(..) => {}
            }
        }
    }
    Ok(())
}

fn minus_infinity(var: &Var, phi: &Formula) -> Result<Formula, ArithError> {
    phi.map_lits(&mut |atom, positive| {
        let c = atom.term().coeff(var);
        Ok(match atom {
            _ if c == 0 => Formula::Lit(atom.clone(), positive),
            // Upper bounds hold, lower bounds fail.
            Atom::Le(_) => Formula::Const((c > 0) == positive),
            Atom::Eq(_) => Formula::Const(!positive),
            Atom::Dvd(..) => Formula::Lit(atom.clone(), positive),
        })
    })
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::Expr;

    fn x() -> Expr {
        Expr::var("x")
    }
    fn y() -> Expr {
        Expr::var("y")
    }

    fn formula(e: &Expr) -> Formula {
        Formula::from_expr(e).unwrap()
    }

    fn sat(e: &Expr) -> bool {
        is_satisfiable(&formula(e)).unwrap()
    }

    #[test]
    fn test_no_integer_between() {
        // Satisfiable over the rationals, not over the integers.
        assert!(!sat(&Expr::and([Expr::gt(x(), Expr::int(0)), Expr::lt(x(), Expr::int(1))])));
        assert!(sat(&Expr::and([Expr::gt(x(), Expr::int(0)), Expr::lt(x(), Expr::int(2))])));
    }

    #[test]
    fn test_exists_gives_divisibility() {
        // ∃x. 2x == y  ≡  2 | y
        let two_x = Expr::mul(Expr::int(2), x());
        let res = exists(&Var::new("x"), formula(&Expr::eq(two_x, y()))).unwrap();
        assert!(!res.mentions(&Var::new("x")));
        let at = |n| res.substitute(&Var::new("y"), &Linear::constant(n)).unwrap();
        assert_eq!(at(4), Formula::TRUE);
        assert_eq!(at(3), Formula::FALSE);
        assert_eq!(at(-6), Formula::TRUE);
    }

    #[test]
    fn test_exists_between_bounds() {
        // ∃x. y < x && x < z  ≡  y + 1 < z
        let e = Expr::and([Expr::lt(y(), x()), Expr::lt(x(), Expr::var("z"))]);
        let res = exists(&Var::new("x"), formula(&e)).unwrap();
        let expected = formula(&Expr::lt(Expr::add(y(), Expr::int(1)), Expr::var("z")));
        for (a, b) in [(0, 1), (0, 2), (5, 7), (3, 2)] {
            let at = |f: &Formula| {
                f.substitute(&Var::new("y"), &Linear::constant(a))
                    .and_then(|f| f.substitute(&Var::new("z"), &Linear::constant(b)))
                    .unwrap()
            };
            assert_eq!(at(&res), at(&expected), "y = {}, z = {}", a, b);
        }
    }

    #[test]
    fn test_linear_diophantine() {
        // 2x + 3y == 1 has integer solutions, 2x + 4y == 1 does not.
        let lhs = Expr::add(Expr::mul(Expr::int(2), x()), Expr::mul(Expr::int(3), y()));
        assert!(sat(&Expr::eq(lhs, Expr::int(1))));
        let lhs = Expr::add(Expr::mul(Expr::int(2), x()), Expr::mul(Expr::int(4), y()));
        assert!(!sat(&Expr::eq(lhs, Expr::int(1))));
        // 3x == 2y with 0 < x < 2 forces x == 1, and 2y == 3 has no solution.
        let e = Expr::and([
            Expr::eq(Expr::mul(Expr::int(3), x()), Expr::mul(Expr::int(2), y())),
            Expr::gt(x(), Expr::int(0)),
            Expr::lt(x(), Expr::int(2)),
        ]);
        assert!(!sat(&e));
    }

    #[test]
    fn test_unit_equation_substitutes() {
        // x >= 0 && y == x + 1 && y < 0
        let e = Expr::and([
            Expr::ge(x(), Expr::int(0)),
            Expr::eq(y(), Expr::add(x(), Expr::int(1))),
            Expr::lt(y(), Expr::int(0)),
        ]);
        assert!(!sat(&e));
        assert!(sat(&Expr::and([Expr::ge(x(), Expr::int(0)), Expr::eq(y(), Expr::add(x(), Expr::int(1)))])));
    }

    #[test]
    fn test_forall() {
        // No integer is below every y.
        let body = formula(&Expr::le(x(), y()));
        assert_eq!(forall(&Var::new("y"), body).unwrap(), Formula::FALSE);
        // Every y is either <= 0 or >= 1.
        let body = formula(&Expr::or([Expr::le(y(), Expr::int(0)), Expr::ge(y(), Expr::int(1))]));
        assert_eq!(forall(&Var::new("y"), body).unwrap(), Formula::TRUE);
    }

    #[test]
    fn test_disjunction() {
        let e = Expr::and([
            Expr::or([Expr::lt(x(), Expr::int(-5)), Expr::gt(x(), Expr::int(5))]),
            Expr::ge(x(), Expr::int(0)),
            Expr::le(x(), Expr::int(5)),
        ]);
        assert!(!sat(&e));
        let e = Expr::and([
            Expr::or([Expr::lt(x(), Expr::int(-5)), Expr::gt(x(), Expr::int(5))]),
            Expr::ge(x(), Expr::int(0)),
        ]);
        assert!(sat(&e));
    }
}
