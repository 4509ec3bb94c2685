//! Logical expressions over integer program variables.
//!
//! Expressions are plain trees. Every constructor simplifies locally (constant folding,
//! flattening of conjunctions and disjunctions, negation pushed into comparisons), so two
//! expressions built the same way compare equal and predicate sets stay small.
//! Integers are mathematical integers: a constant that would overflow `i64` is left
//! unfolded rather than wrapped.
//!
//! Variables carry an SSA *version*. Version 0 is the program-level variable; the
//! transition relation of a statement refers to later versions through [`VarIndexing`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

/// A (possibly versioned) integer variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var {
    name: Rc<str>,
    version: u32,
}

impl Var {
    pub fn new(name: impl AsRef<str>) -> Self {
        Var {
            name: Rc::from(name.as_ref()),
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn with_version(&self, version: u32) -> Var {
        Var {
            name: self.name.clone(),
            version,
        }
    }

    /// The program-level variable this version belongs to.
    pub fn base(&self) -> Var {
        self.with_version(0)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.version)
        }
    }
}

impl From<&str> for Var {
    fn from(s: &str) -> Self {
        Var::new(s)
    }
}

/// Current SSA version of every variable; absent variables are at version 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarIndexing {
    versions: HashMap<Var, u32>,
}

impl VarIndexing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &Var) -> u32 {
        self.versions.get(&var.base()).copied().unwrap_or(0)
    }

    /// Move `var` to a fresh version and return it.
    pub fn inc(&mut self, var: &Var) -> u32 {
        let version = self.versions.entry(var.base()).or_insert(0);
        *version += 1;
        *version
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn negate(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    pub fn eval(self, a: i64, b: i64) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }

    /// Whether `t op t` holds for every term `t`.
    fn is_reflexive(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Le | CmpOp::Ge)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expr {
    Bool(bool),
    Int(i64),
    Var(Var),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Forall(Var, Box<Expr>),
}

impl Expr {
    pub const TRUE: Expr = Expr::Bool(true);
    pub const FALSE: Expr = Expr::Bool(false);

    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn var(name: impl AsRef<str>) -> Self {
        Expr::Var(Var::new(name))
    }

    pub fn neg(e: Expr) -> Self {
        match e {
            Expr::Int(a) if a != i64::MIN => Expr::Int(-a),
            Expr::Neg(inner) => *inner,
            e => Expr::Neg(Box::new(e)),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        match (lhs, rhs) {
            (Expr::Int(a), Expr::Int(b)) if a.checked_add(b).is_some() => Expr::Int(a + b),
            (e, Expr::Int(0)) | (Expr::Int(0), e) => e,
            (lhs, rhs) => Expr::Add(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        match (lhs, rhs) {
            (Expr::Int(a), Expr::Int(b)) if a.checked_sub(b).is_some() => Expr::Int(a - b),
            (e, Expr::Int(0)) => e,
            (lhs, rhs) => Expr::Sub(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        match (lhs, rhs) {
            (Expr::Int(a), Expr::Int(b)) if a.checked_mul(b).is_some() => Expr::Int(a * b),
            (_, Expr::Int(0)) | (Expr::Int(0), _) => Expr::Int(0),
            (e, Expr::Int(1)) | (Expr::Int(1), e) => e,
            (lhs, rhs) => Expr::Mul(Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn not(e: Expr) -> Self {
        match e {
            Expr::Bool(b) => Expr::Bool(!b),
            Expr::Not(inner) => *inner,
            Expr::Cmp(op, lhs, rhs) => Expr::Cmp(op.negate(), lhs, rhs),
            e => Expr::Not(Box::new(e)),
        }
    }

    pub fn and(operands: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for e in operands {
            match e {
                Expr::Bool(true) => {}
                Expr::Bool(false) => return Expr::FALSE,
                Expr::And(inner) => {
                    for e in inner {
                        if !flat.contains(&e) {
                            flat.push(e);
                        }
                    }
                }
                e => {
                    if !flat.contains(&e) {
                        flat.push(e);
                    }
                }
            }
        }
        match flat.len() {
            0 => Expr::TRUE,
            1 => flat.remove(0),
            _ => Expr::And(flat),
        }
    }

    pub fn or(operands: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for e in operands {
            match e {
                Expr::Bool(false) => {}
                Expr::Bool(true) => return Expr::TRUE,
                Expr::Or(inner) => {
                    for e in inner {
                        if !flat.contains(&e) {
                            flat.push(e);
                        }
                    }
                }
                e => {
                    if !flat.contains(&e) {
                        flat.push(e);
                    }
                }
            }
        }
        match flat.len() {
            0 => Expr::FALSE,
            1 => flat.remove(0),
            _ => Expr::Or(flat),
        }
    }

    pub fn imply(lhs: Expr, rhs: Expr) -> Self {
        Expr::or([Expr::not(lhs), rhs])
    }

    pub fn cmp(op: CmpOp, lhs: Expr, rhs: Expr) -> Self {
        match (&lhs, &rhs) {
            (Expr::Int(a), Expr::Int(b)) => Expr::Bool(op.eval(*a, *b)),
            _ if lhs == rhs => Expr::Bool(op.is_reflexive()),
            _ => Expr::Cmp(op, Box::new(lhs), Box::new(rhs)),
        }
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Eq, lhs, rhs)
    }
    pub fn ne(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Ne, lhs, rhs)
    }
    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Lt, lhs, rhs)
    }
    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Le, lhs, rhs)
    }
    pub fn gt(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Gt, lhs, rhs)
    }
    pub fn ge(lhs: Expr, rhs: Expr) -> Self {
        Expr::cmp(CmpOp::Ge, lhs, rhs)
    }

    /// `∀ var. body`, dropped when `var` does not occur free in `body`.
    pub fn forall(var: Var, body: Expr) -> Self {
        if body.free_vars().contains(&var) {
            Expr::Forall(var, Box::new(body))
        } else {
            body
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Bool(_) | Expr::Int(_))
    }

    pub fn free_vars(&self) -> BTreeSet<Var> {
        let mut vars = BTreeSet::new();
        self.collect_free_vars(&mut Vec::new(), &mut vars);
        vars
    }

    fn collect_free_vars(&self, bound: &mut Vec<Var>, vars: &mut BTreeSet<Var>) {
        match self {
            Expr::Bool(_) | Expr::Int(_) => {}
            Expr::Var(v) => {
                if !bound.contains(v) {
                    vars.insert(v.clone());
                }
            }
            Expr::Neg(e) | Expr::Not(e) => e.collect_free_vars(bound, vars),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Cmp(_, a, b) => {
                a.collect_free_vars(bound, vars);
                b.collect_free_vars(bound, vars);
            }
            Expr::And(es) | Expr::Or(es) => {
                for e in es {
                    e.collect_free_vars(bound, vars);
                }
            }
            Expr::Forall(v, body) => {
                bound.push(v.clone());
                body.collect_free_vars(bound, vars);
                bound.pop();
            }
        }
    }

    /// Rebuild the expression bottom-up through the simplifying constructors.
    ///
    /// `leaf` rewrites free variables; binders are handled by the caller-provided closure
    /// `binder`, which receives the bound variable and its body.
    fn rebuild(&self, leaf: &mut dyn FnMut(&Var) -> Expr, binder: &mut dyn FnMut(&Var, &Expr) -> Expr) -> Expr {
        match self {
            Expr::Bool(_) | Expr::Int(_) => self.clone(),
            Expr::Var(v) => leaf(v),
            Expr::Neg(e) => Expr::neg(e.rebuild(leaf, binder)),
            Expr::Add(a, b) => Expr::add(a.rebuild(leaf, binder), b.rebuild(leaf, binder)),
            Expr::Sub(a, b) => Expr::sub(a.rebuild(leaf, binder), b.rebuild(leaf, binder)),
            Expr::Mul(a, b) => Expr::mul(a.rebuild(leaf, binder), b.rebuild(leaf, binder)),
            Expr::Not(e) => Expr::not(e.rebuild(leaf, binder)),
            Expr::And(es) => Expr::and(es.iter().map(|e| e.rebuild(leaf, binder)).collect::<Vec<_>>()),
            Expr::Or(es) => Expr::or(es.iter().map(|e| e.rebuild(leaf, binder)).collect::<Vec<_>>()),
            Expr::Cmp(op, a, b) => Expr::cmp(*op, a.rebuild(leaf, binder), b.rebuild(leaf, binder)),
            Expr::Forall(v, body) => binder(v, body),
        }
    }

    /// Capture-avoiding substitution of `replacement` for the free occurrences of `var`.
    pub fn substitute(&self, var: &Var, replacement: &Expr) -> Expr {
        let replacement_vars = replacement.free_vars();
        self.rebuild(
            &mut |v| {
                if v == var {
                    replacement.clone()
                } else {
                    Expr::Var(v.clone())
                }
            },
            &mut |bound, body| {
                if bound == var {
                    // `var` is shadowed below this binder.
                    return Expr::Forall(bound.clone(), Box::new(body.clone()));
                }
                if replacement_vars.contains(bound) {
                    let fresh = fresh_name(bound, &replacement_vars, body);
                    let renamed = body.substitute(bound, &Expr::Var(fresh.clone()));
                    Expr::forall(fresh, renamed.substitute(var, replacement))
                } else {
                    Expr::forall(bound.clone(), body.substitute(var, replacement))
                }
            },
        )
    }

    /// Rename every free variable to its version in `indexing`.
    pub fn at(&self, indexing: &VarIndexing) -> Expr {
        self.at_except(indexing, &[])
    }

    fn at_except(&self, indexing: &VarIndexing, bound: &[Var]) -> Expr {
        self.rebuild(
            &mut |v| {
                if bound.contains(v) {
                    Expr::Var(v.clone())
                } else {
                    Expr::Var(v.with_version(indexing.get(v)))
                }
            },
            &mut |b, e| {
                let mut inner_bound = bound.to_vec();
                inner_bound.push(b.clone());
                Expr::forall(b.clone(), e.at_except(indexing, &inner_bound))
            },
        )
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Forall(..) => 0,
            Expr::Or(_) => 1,
            Expr::And(_) => 2,
            Expr::Not(_) => 3,
            Expr::Cmp(..) => 4,
            Expr::Add(..) | Expr::Sub(..) => 5,
            Expr::Mul(..) => 6,
            Expr::Neg(_) => 7,
            Expr::Bool(_) | Expr::Int(_) | Expr::Var(_) => 8,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        let prec = self.precedence();
        if prec < min {
            write!(f, "(")?;
        }
        match self {
            Expr::Bool(b) => write!(f, "{}", b)?,
            Expr::Int(n) => write!(f, "{}", n)?,
            Expr::Var(v) => write!(f, "{}", v)?,
            Expr::Neg(e) => {
                write!(f, "-")?;
                e.fmt_prec(f, 8)?;
            }
            Expr::Add(a, b) => {
                a.fmt_prec(f, 5)?;
                write!(f, " + ")?;
                b.fmt_prec(f, 6)?;
            }
            Expr::Sub(a, b) => {
                a.fmt_prec(f, 5)?;
                write!(f, " - ")?;
                b.fmt_prec(f, 6)?;
            }
            Expr::Mul(a, b) => {
                a.fmt_prec(f, 6)?;
                write!(f, " * ")?;
                b.fmt_prec(f, 7)?;
            }
            Expr::Not(e) => {
                write!(f, "!")?;
                e.fmt_prec(f, 4)?;
            }
            Expr::And(es) | Expr::Or(es) => {
                let sep = if matches!(self, Expr::And(_)) { " && " } else { " || " };
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sep)?;
                    }
                    e.fmt_prec(f, prec + 1)?;
                }
            }
            Expr::Cmp(op, a, b) => {
                a.fmt_prec(f, 5)?;
                write!(f, " {} ", op)?;
                b.fmt_prec(f, 5)?;
            }
            Expr::Forall(v, body) => {
                write!(f, "forall {}. ", v)?;
                body.fmt_prec(f, 0)?;
            }
        }
        if prec < min {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A variant of `var` that occurs neither in `avoid` nor in `body`.
fn fresh_name(var: &Var, avoid: &BTreeSet<Var>, body: &Expr) -> Var {
    let used = body.free_vars();
    let mut name = var.name().to_string();
    loop {
        name.push('\'');
        let candidate = Var::new(&name).with_version(var.version());
        if !avoid.contains(&candidate) && !used.contains(&candidate) {
            return candidate;
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

impl From<Var> for Expr {
    fn from(v: Var) -> Self {
        Expr::Var(v)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Int(n)
    }
}
