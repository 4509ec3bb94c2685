//! Linear integer arithmetic over unbounded integers.
//!
//! A [`Formula`] is a boolean combination, in negation normal form, of [`Atom`]s over a
//! [`Linear`] term `t`: `t <= 0`, `t == 0` and `d | t`. The constructors normalize every
//! atom, so that `2*x <= 3` and `x <= 1` end up as the same atom and `x > 0` as the
//! negation of `x <= 0`:
//! - ground atoms fold to constants;
//! - coefficients are divided by their gcd, tightening the bound of an inequality;
//! - the first coefficient of an inequality or an equation is positive.
//!
//! All coefficient arithmetic is checked. A value that does not fit `i64` is reported as
//! [`ArithError::Overflow`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Not;

use crate::cooper;
use crate::expr::{CmpOp, Expr, Var};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArithError {
    #[error("integer overflow")]
    Overflow,
    #[error("non-linear term `{0}`")]
    NonLinear(String),
    #[error("ill-typed expression: {0}")]
    IllTyped(String),
}

pub(crate) fn checked(value: Option<i64>) -> Result<i64, ArithError> {
    value.ok_or(ArithError::Overflow)
}

/// Greatest common divisor of the absolute values; `gcd(0, 0) = 0`.
fn gcd(a: i64, b: i64) -> Result<i64, ArithError> {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    i64::try_from(a).map_err(|_| ArithError::Overflow)
}

/// Least common multiple of two positive numbers.
pub(crate) fn lcm(a: i64, b: i64) -> Result<i64, ArithError> {
    let g = gcd(a, b)?;
    checked((a / g).checked_mul(b))
}

/// `c1*x1 + ... + cn*xn + c`, with no zero coefficient stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Linear {
    coeffs: BTreeMap<Var, i64>,
    constant: i64,
}

impl Linear {
    pub fn constant(value: i64) -> Self {
        Linear {
            coeffs: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn var(var: Var) -> Self {
        Linear {
            coeffs: BTreeMap::from([(var, 1)]),
            constant: 0,
        }
    }

    pub fn coeff(&self, var: &Var) -> i64 {
        self.coeffs.get(var).copied().unwrap_or(0)
    }

    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn mentions(&self, var: &Var) -> bool {
        self.coeffs.contains_key(var)
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> + '_ {
        self.coeffs.keys()
    }

    /// First coefficient in variable order, 0 for a constant.
    fn leading(&self) -> i64 {
        self.coeffs.values().next().copied().unwrap_or(0)
    }

    /// Gcd of the coefficients, 0 for a constant.
    fn content(&self) -> Result<i64, ArithError> {
        let mut g = 0;
        for &c in self.coeffs.values() {
            g = gcd(g, c)?;
        }
        Ok(g)
    }

    /// Coefficients divided by `d`, which divides all of them, and the given constant.
    fn reduce(&self, d: i64, constant: i64) -> Linear {
        Linear {
            coeffs: self.coeffs.iter().map(|(v, &c)| (v.clone(), c / d)).collect(),
            constant,
        }
    }

    pub fn add(&self, other: &Linear) -> Result<Linear, ArithError> {
        let mut res = self.clone();
        for (var, &c) in &other.coeffs {
            let sum = checked(res.coeff(var).checked_add(c))?;
            if sum == 0 {
                res.coeffs.remove(var);
            } else {
                res.coeffs.insert(var.clone(), sum);
            }
        }
        res.constant = checked(res.constant.checked_add(other.constant))?;
        Ok(res)
    }

    pub fn sub(&self, other: &Linear) -> Result<Linear, ArithError> {
        self.add(&other.neg()?)
    }

    pub fn neg(&self) -> Result<Linear, ArithError> {
        self.scale(-1)
    }

    pub fn scale(&self, factor: i64) -> Result<Linear, ArithError> {
        if factor == 0 {
            return Ok(Linear::constant(0));
        }
        let coeffs = self
            .coeffs
            .iter()
            .map(|(v, &c)| c.checked_mul(factor).map(|c| (v.clone(), c)).ok_or(ArithError::Overflow))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(Linear {
            coeffs,
            constant: checked(self.constant.checked_mul(factor))?,
        })
    }

    pub fn add_constant(&self, value: i64) -> Result<Linear, ArithError> {
        Ok(Linear {
            coeffs: self.coeffs.clone(),
            constant: checked(self.constant.checked_add(value))?,
        })
    }

    /// The term with `var` dropped.
    pub fn without(&self, var: &Var) -> Linear {
        let mut res = self.clone();
        res.coeffs.remove(var);
        res
    }

    pub(crate) fn with_coeff(&self, var: &Var, coeff: i64) -> Linear {
        let mut res = self.without(var);
        if coeff != 0 {
            res.coeffs.insert(var.clone(), coeff);
        }
        res
    }

    /// Replace `var` by `value`.
    pub fn substitute(&self, var: &Var, value: &Linear) -> Result<Linear, ArithError> {
        let c = self.coeff(var);
        if c == 0 {
            return Ok(self.clone());
        }
        self.without(var).add(&value.scale(c)?)
    }

    /// Linear form of an integer term.
    pub fn from_expr(e: &Expr) -> Result<Linear, ArithError> {
        match e {
            Expr::Int(n) => Ok(Linear::constant(*n)),
            Expr::Var(v) => Ok(Linear::var(v.clone())),
            Expr::Neg(inner) => Linear::from_expr(inner)?.neg(),
            Expr::Add(lhs, rhs) => Linear::from_expr(lhs)?.add(&Linear::from_expr(rhs)?),
            Expr::Sub(lhs, rhs) => Linear::from_expr(lhs)?.sub(&Linear::from_expr(rhs)?),
            Expr::Mul(lhs, rhs) => {
                let a = Linear::from_expr(lhs)?;
                let b = Linear::from_expr(rhs)?;
                if a.is_constant() {
                    b.scale(a.constant)
                } else if b.is_constant() {
                    a.scale(b.constant)
                } else {
                    Err(ArithError::NonLinear(e.to_string()))
                }
            }
            Expr::Bool(_) | Expr::Not(_) | Expr::And(_) | Expr::Or(_) | Expr::Cmp(..) | Expr::Forall(..) => Err(
                ArithError::IllTyped(format!("expected an integer term, found formula `{}`", e)),
            ),
        }
    }
}

impl fmt::Display for Linear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coeffs.is_empty() {
            return write!(f, "{}", self.constant);
        }
        for (i, (var, &c)) in self.coeffs.iter().enumerate() {
            if i == 0 {
                if c < 0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {} ", if c < 0 { "-" } else { "+" })?;
            }
            if c.unsigned_abs() != 1 {
                write!(f, "{}*", c.unsigned_abs())?;
            }
            write!(f, "{}", var)?;
        }
        if self.constant != 0 {
            let sign = if self.constant < 0 { "-" } else { "+" };
            write!(f, " {} {}", sign, self.constant.unsigned_abs())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    /// `t <= 0`
    Le(Linear),
    /// `t == 0`
    Eq(Linear),
    /// `d | t`, with `d > 1`
    Dvd(i64, Linear),
}

impl Atom {
    pub fn term(&self) -> &Linear {
        match self {
            Atom::Le(t) | Atom::Eq(t) | Atom::Dvd(_, t) => t,
        }
    }

    pub fn mentions(&self, var: &Var) -> bool {
        self.term().mentions(var)
    }

    /// The same kind of atom over `term`, normalized.
    pub(crate) fn rebuild(&self, term: Linear) -> Result<Formula, ArithError> {
        match self {
            Atom::Le(_) => Formula::le(term),
            Atom::Eq(_) => Formula::eq(term),
            Atom::Dvd(d, _) => Formula::dvd(*d, term),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Le(t) => write!(f, "{} <= 0", t),
            Atom::Eq(t) => write!(f, "{} == 0", t),
            Atom::Dvd(d, t) => write!(f, "{} | {}", d, t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    Const(bool),
    /// An atom, or its negation when the flag is `false`.
    Lit(Atom, bool),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub const TRUE: Formula = Formula::Const(true);
    pub const FALSE: Formula = Formula::Const(false);

    /// `t <= 0`
    pub fn le(t: Linear) -> Result<Formula, ArithError> {
        if t.is_constant() {
            return Ok(Formula::Const(t.constant <= 0));
        }
        // g*t' + c <= 0  iff  t' <= floor(-c / g)
        let g = t.content()?;
        let bound = checked(t.constant.checked_neg())?.div_euclid(g);
        let reduced = t.reduce(g, checked(bound.checked_neg())?);
        if reduced.leading() > 0 {
            Ok(Formula::Lit(Atom::Le(reduced), true))
        } else {
            // t' <= bound  iff  !(bound + 1 - t' <= 0)
            let flipped = reduced.neg()?.add_constant(1)?;
            Ok(Formula::Lit(Atom::Le(flipped), false))
        }
    }

    /// `t == 0`
    pub fn eq(t: Linear) -> Result<Formula, ArithError> {
        if t.is_constant() {
            return Ok(Formula::Const(t.constant == 0));
        }
        let g = t.content()?;
        if t.constant % g != 0 {
            return Ok(Formula::FALSE);
        }
        let reduced = t.reduce(g, t.constant / g);
        let reduced = if reduced.leading() < 0 { reduced.neg()? } else { reduced };
        Ok(Formula::Lit(Atom::Eq(reduced), true))
    }

    /// `d | t`
    pub fn dvd(d: i64, t: Linear) -> Result<Formula, ArithError> {
        assert!(d > 0, "Divisor should be positive");
        let t = Linear {
            constant: t.constant.rem_euclid(d),
            coeffs: t.coeffs,
        };
        if t.is_constant() {
            return Ok(Formula::Const(t.constant == 0));
        }
        let g = gcd(gcd(d, t.content()?)?, t.constant)?;
        if g == d {
            return Ok(Formula::TRUE);
        }
        Ok(Formula::Lit(Atom::Dvd(d / g, t.reduce(g, t.constant / g)), true))
    }

    pub fn and(operands: impl IntoIterator<Item = Formula>) -> Formula {
        let mut flat = Vec::new();
        for f in operands {
            match f {
                Formula::Const(true) => {}
                Formula::Const(false) => return Formula::FALSE,
                Formula::And(inner) => {
                    for f in inner {
                        if !flat.contains(&f) {
                            flat.push(f);
                        }
                    }
                }
                f => {
                    if !flat.contains(&f) {
                        flat.push(f);
                    }
                }
            }
        }
        match flat.len() {
            0 => Formula::TRUE,
            1 => flat.remove(0),
            _ => Formula::And(flat),
        }
    }

    pub fn or(operands: impl IntoIterator<Item = Formula>) -> Formula {
        let mut flat = Vec::new();
        for f in operands {
            match f {
                Formula::Const(false) => {}
                Formula::Const(true) => return Formula::TRUE,
                Formula::Or(inner) => {
                    for f in inner {
                        if !flat.contains(&f) {
                            flat.push(f);
                        }
                    }
                }
                f => {
                    if !flat.contains(&f) {
                        flat.push(f);
                    }
                }
            }
        }
        match flat.len() {
            0 => Formula::FALSE,
            1 => flat.remove(0),
            _ => Formula::Or(flat),
        }
    }

    pub fn mentions(&self, var: &Var) -> bool {
        match self {
            Formula::Const(_) => false,
            Formula::Lit(atom, _) => atom.mentions(var),
            Formula::And(fs) | Formula::Or(fs) => fs.iter().any(|f| f.mentions(var)),
        }
    }

    pub fn free_vars(&self) -> BTreeSet<Var> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<Var>) {
        match self {
            Formula::Const(_) => {}
            Formula::Lit(atom, _) => vars.extend(atom.term().vars().cloned()),
            Formula::And(fs) | Formula::Or(fs) => {
                for f in fs {
                    f.collect_vars(vars);
                }
            }
        }
    }

    /// Rebuild bottom-up with every literal replaced by `lit(atom, positive)`.
    pub(crate) fn map_lits(
        &self,
        lit: &mut dyn FnMut(&Atom, bool) -> Result<Formula, ArithError>,
    ) -> Result<Formula, ArithError> {
        match self {
            Formula::Const(_) => Ok(self.clone()),
            Formula::Lit(atom, positive) => lit(atom, *positive),
            Formula::And(fs) => Ok(Formula::and(
                fs.iter().map(|f| f.map_lits(lit)).collect::<Result<Vec<_>, _>>()?,
            )),
            Formula::Or(fs) => Ok(Formula::or(
                fs.iter().map(|f| f.map_lits(lit)).collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }

    /// Replace `var` by `value`, renormalizing the atoms that mention it.
    pub fn substitute(&self, var: &Var, value: &Linear) -> Result<Formula, ArithError> {
        self.map_lits(&mut |atom, positive| {
            if !atom.mentions(var) {
                return Ok(Formula::Lit(atom.clone(), positive));
            }
            let f = atom.rebuild(atom.term().substitute(var, value)?)?;
            Ok(if positive { f } else { !f })
        })
    }

    /// Translate a formula over integer terms. Quantifiers are eliminated on the way.
    pub fn from_expr(e: &Expr) -> Result<Formula, ArithError> {
        match e {
            Expr::Bool(b) => Ok(Formula::Const(*b)),
            Expr::Not(inner) => Ok(!Formula::from_expr(inner)?),
            Expr::And(es) => Ok(Formula::and(
                es.iter().map(Formula::from_expr).collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Or(es) => Ok(Formula::or(
                es.iter().map(Formula::from_expr).collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Cmp(op, lhs, rhs) => {
                let diff = Linear::from_expr(lhs)?.sub(&Linear::from_expr(rhs)?)?;
                match op {
                    CmpOp::Le => Formula::le(diff),
                    CmpOp::Lt => Formula::le(diff.add_constant(1)?),
                    CmpOp::Ge => Formula::le(diff.neg()?),
                    CmpOp::Gt => Formula::le(diff.neg()?.add_constant(1)?),
                    CmpOp::Eq => Formula::eq(diff),
                    CmpOp::Ne => Ok(!Formula::eq(diff)?),
                }
            }
            Expr::Forall(var, body) => {
                cooper::forall(var, Formula::from_expr(body)?)
            }
            Expr::Int(_) | Expr::Var(_) | Expr::Neg(_) | Expr::Add(..) | Expr::Sub(..) | Expr::Mul(..) => Err(
                ArithError::IllTyped(format!("expected a formula, found term `{}`", e)),
            ),
        }
    }
}

impl Not for Formula {
    type Output = Formula;

    fn not(self) -> Formula {
        match self {
            Formula::Const(b) => Formula::Const(!b),
            Formula::Lit(atom, positive) => Formula::Lit(atom, !positive),
            Formula::And(fs) => Formula::or(fs.into_iter().map(Formula::not)),
            Formula::Or(fs) => Formula::and(fs.into_iter().map(Formula::not)),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Const(b) => write!(f, "{}", b),
            Formula::Lit(atom, true) => write!(f, "{}", atom),
            Formula::Lit(atom, false) => write!(f, "!({})", atom),
            Formula::And(fs) | Formula::Or(fs) => {
                let sep = if matches!(self, Formula::And(_)) { " && " } else { " || " };
                for (i, g) in fs.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sep)?;
                    }
                    if matches!(g, Formula::And(_) | Formula::Or(_)) {
                        write!(f, "({})", g)?;
                    } else {
                        write!(f, "{}", g)?;
                    }
                }
                Ok(())
            }
        }
    }
}
