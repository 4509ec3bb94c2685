//! Incremental satisfiability interface and its BDD-backed implementation.
//!
//! A [`Solver`] holds a stack of assertion frames. [`Solver::push`] opens a new frame,
//! [`Solver::pop`] discards every assertion added since the matching push. Components that
//! query the solver never share one: each query batch asks a [`SolverFactory`] for a fresh
//! instance.
//!
//! [`BddSolver`] decides linear integer arithmetic lazily. The boolean structure of the
//! assertions lives in a BDD over their atoms; each path of that BDD is checked for
//! integer consistency by quantifier elimination ([`cooper`]), and inconsistent paths are
//! blocked until a consistent one is found or none is left.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::bdd::{Bdd, BddError};
use crate::cooper;
use crate::error::SolverError;
use crate::expr::Expr;
use crate::linear::{ArithError, Atom, Formula};
use crate::reference::Ref;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SolverStatus {
    Sat,
    Unsat,
    Unknown,
}

pub trait Solver {
    /// Conjoin `assertion` to the current frame.
    fn add(&mut self, assertion: &Expr) -> Result<(), SolverError>;

    fn check(&mut self) -> SolverStatus;

    fn push(&mut self);

    /// Drop the innermost frame.
    ///
    /// # Panics
    ///
    /// Panics when there is no matching [`push`](Solver::push).
    fn pop(&mut self);

    /// Run `f` inside a fresh frame, which is popped afterwards.
    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T
    where
        Self: Sized,
    {
        self.push();
        let res = f(self);
        self.pop();
        res
    }

    /// Like [`check`](Solver::check), but an inconclusive answer is an error.
    fn is_sat(&mut self) -> Result<bool, SolverError> {
        match self.check() {
            SolverStatus::Sat => Ok(true),
            SolverStatus::Unsat => Ok(false),
            SolverStatus::Unknown => Err(SolverError::Unknown),
        }
    }
}

pub trait SolverFactory {
    type Solver: Solver;

    fn create_solver(&self) -> Self::Solver;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SolverConfig {
    /// Node budget of each solver instance.
    pub max_nodes: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_nodes: 1 << 22 }
    }
}

#[derive(Debug, thiserror::Error)]
enum SearchError {
    #[error(transparent)]
    Bdd(#[from] BddError),
    #[error(transparent)]
    Arith(#[from] ArithError),
}

/// Assignment to atom variables along one BDD path.
type Cube = Vec<(u32, bool)>;

#[derive(Debug, Copy, Clone)]
struct Frame {
    formula: Ref,
    /// Some assertion of this frame (or an outer one) was dropped on the node limit.
    incomplete: bool,
}

/// Decides formulas over unbounded integers.
///
/// Assertions are translated to linear arithmetic and their boolean skeleton is encoded
/// eagerly, one BDD variable per atom. [`Solver::check`] then walks the paths of the
/// current conjunction. Combinations of atoms found inconsistent are remembered as
/// lemmas, which stay valid across frames.
///
/// When the node budget runs out the offending assertion is dropped and the frame is
/// marked incomplete: an inconsistent conjunction is still reported as
/// [`SolverStatus::Unsat`], anything else becomes [`SolverStatus::Unknown`].
pub struct BddSolver {
    bdd: Bdd,
    /// Atom of each BDD variable: variable `v` stands for `atoms[v - 1]`.
    atoms: Vec<Atom>,
    atom_vars: HashMap<Atom, u32>,
    frames: Vec<Frame>,
    /// Negations of inconsistent atom combinations.
    lemmas: Ref,
}

impl BddSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            bdd: Bdd::new(config.max_nodes),
            atoms: Vec::new(),
            atom_vars: HashMap::new(),
            frames: vec![Frame {
                formula: Ref::ONE,
                incomplete: false,
            }],
            lemmas: Ref::ONE,
        }
    }

    fn top(&mut self) -> &mut Frame {
        // The outermost frame is never popped.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn atom_var(&mut self, atom: &Atom) -> u32 {
        if let Some(&v) = self.atom_vars.get(atom) {
            return v;
        }
        self.atoms.push(atom.clone());
        let v = self.atoms.len() as u32;
        self.atom_vars.insert(atom.clone(), v);
        v
    }

    fn encode(&mut self, phi: &Formula) -> Result<Ref, BddError> {
        match phi {
            Formula::Const(b) => Ok(if *b { self.bdd.one() } else { self.bdd.zero() }),
            Formula::Lit(atom, positive) => {
                let v = self.atom_var(atom);
                let r = self.bdd.mk_var(v)?;
                Ok(if *positive { r } else { -r })
            }
            Formula::And(fs) => {
                let rs = fs.iter().map(|f| self.encode(f)).collect::<Result<Vec<_>, _>>()?;
                self.bdd.apply_and_many(rs)
            }
            Formula::Or(fs) => {
                let rs = fs.iter().map(|f| self.encode(f)).collect::<Result<Vec<_>, _>>()?;
                self.bdd.apply_or_many(rs)
            }
        }
    }

    fn conjoin(&mut self, current: Ref, phi: &Formula) -> Result<Ref, BddError> {
        let r = self.encode(phi)?;
        self.bdd.apply_and(current, r)
    }

    fn literals(&self, cube: &[(u32, bool)]) -> Formula {
        Formula::and(
            cube.iter()
                .map(|&(v, value)| Formula::Lit(self.atoms[v as usize - 1].clone(), value)),
        )
    }

    fn is_consistent(&self, cube: &[(u32, bool)]) -> Result<bool, ArithError> {
        cooper::is_satisfiable(&self.literals(cube))
    }

    /// Drop literals of an inconsistent `cube` as long as it stays inconsistent.
    fn shrink(&self, mut cube: Cube) -> Result<Cube, ArithError> {
        let mut i = 0;
        while i < cube.len() {
            let lit = cube.remove(i);
            if self.is_consistent(&cube)? {
                cube.insert(i, lit);
                i += 1;
            }
        }
        Ok(cube)
    }

    fn cube_ref(&self, cube: &[(u32, bool)]) -> Result<Ref, BddError> {
        let lits = cube
            .iter()
            .map(|&(v, value)| self.bdd.mk_var(v).map(|r| if value { r } else { -r }))
            .collect::<Result<Vec<_>, _>>()?;
        self.bdd.apply_and_many(lits)
    }

    /// Whether some path of `formula` is consistent over the integers.
    fn search(&mut self, formula: Ref) -> Result<bool, SearchError> {
        let mut current = self.bdd.apply_and(formula, self.lemmas)?;
        while let Some(cube) = self.bdd.one_sat(current) {
            if self.is_consistent(&cube)? {
                trace!("consistent: {}", self.literals(&cube));
                return Ok(true);
            }
            let core = self.shrink(cube)?;
            trace!("blocking: {}", self.literals(&core));
            let blocked = -self.cube_ref(&core)?;
            self.lemmas = self.bdd.apply_and(self.lemmas, blocked)?;
            current = self.bdd.apply_and(current, blocked)?;
        }
        Ok(false)
    }
}

impl Default for BddSolver {
    fn default() -> Self {
        BddSolver::new(SolverConfig::default())
    }
}

impl Solver for BddSolver {
    fn add(&mut self, assertion: &Expr) -> Result<(), SolverError> {
        let current = self.top().formula;
        if self.bdd.is_zero(current) {
            return Ok(());
        }
        let phi = Formula::from_expr(assertion)?;
        match self.conjoin(current, &phi) {
            Ok(formula) => {
                self.top().formula = formula;
            }
            Err(e) => {
                warn!("Dropping assertion `{}` at {} nodes: {}", assertion, self.bdd.size(), e);
                self.top().incomplete = true;
            }
        }
        Ok(())
    }

    fn check(&mut self) -> SolverStatus {
        let frame = *self.top();
        let status = match self.search(frame.formula) {
            Ok(false) => SolverStatus::Unsat,
            Ok(true) if frame.incomplete => SolverStatus::Unknown,
            Ok(true) => SolverStatus::Sat,
            Err(e) => {
                warn!("Giving up on check: {}", e);
                SolverStatus::Unknown
            }
        };
        debug!("check: {:?} ({} atoms, {:?})", status, self.atoms.len(), self.bdd);
        status
    }

    fn push(&mut self) {
        let frame = *self.top();
        self.frames.push(frame);
    }

    fn pop(&mut self) {
        assert!(self.frames.len() > 1, "pop without matching push");
        self.frames.pop();
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct BddSolverFactory {
    config: SolverConfig,
}

impl BddSolverFactory {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl SolverFactory for BddSolverFactory {
    type Solver = BddSolver;

    fn create_solver(&self) -> BddSolver {
        BddSolver::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::Var;

    fn x() -> Expr {
        Expr::var("x")
    }
    fn y() -> Expr {
        Expr::var("y")
    }

    #[test]
    fn test_empty_is_sat() {
        let mut solver = BddSolver::default();
        assert_eq!(solver.check(), SolverStatus::Sat);
    }

    #[test]
    fn test_push_pop() {
        let mut solver = BddSolver::default();
        solver.add(&Expr::gt(x(), Expr::int(0))).unwrap();

        solver.push();
        solver.add(&Expr::le(x(), Expr::int(0))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Unsat);
        solver.pop();

        assert_eq!(solver.check(), SolverStatus::Sat);
    }

    #[test]
    fn test_with_scope() {
        let mut solver = BddSolver::default();
        solver.add(&Expr::eq(x(), Expr::int(3))).unwrap();
        let inner = solver.with_scope(|s| {
            s.add(&Expr::ne(x(), Expr::int(3))).unwrap();
            s.is_sat().unwrap()
        });
        assert!(!inner);
        assert!(solver.is_sat().unwrap());
    }

    #[test]
    #[should_panic(expected = "pop without matching push")]
    fn test_unbalanced_pop() {
        let mut solver = BddSolver::default();
        solver.pop();
    }

    #[test]
    fn test_ill_typed() {
        let mut solver = BddSolver::default();
        let res = solver.add(&Expr::add(x(), Expr::int(1)));
        assert!(matches!(res, Err(SolverError::Arith(ArithError::IllTyped(_)))));
    }

    #[test]
    fn test_non_linear() {
        let mut solver = BddSolver::default();
        let res = solver.add(&Expr::gt(Expr::mul(x(), y()), Expr::int(0)));
        assert!(matches!(res, Err(SolverError::Arith(ArithError::NonLinear(_)))));
    }

    #[test]
    fn test_add_to_unsat_frame() {
        let mut solver = BddSolver::default();
        solver.add(&Expr::FALSE).unwrap();
        // Nothing is translated once the frame is unsatisfiable.
        solver.add(&Expr::add(x(), Expr::int(1))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Unsat);
    }

    #[test]
    fn test_node_limit_gives_unknown() {
        let mut solver = BddSolver::new(SolverConfig { max_nodes: 2 });
        let z = Expr::var("z");
        solver
            .add(&Expr::and([
                Expr::gt(x(), Expr::int(0)),
                Expr::gt(y(), Expr::int(0)),
                Expr::gt(z, Expr::int(0)),
            ]))
            .unwrap();
        assert_eq!(solver.check(), SolverStatus::Unknown);
        assert_eq!(solver.is_sat(), Err(SolverError::Unknown));
    }

    #[test]
    fn test_factory_gives_fresh_solvers() {
        let factory = BddSolverFactory::new(SolverConfig::default());
        let mut first = factory.create_solver();
        first.add(&Expr::FALSE).unwrap();
        assert_eq!(first.check(), SolverStatus::Unsat);

        let mut second = factory.create_solver();
        assert_eq!(second.check(), SolverStatus::Sat);
    }

    #[test]
    fn test_integers_do_not_wrap() {
        let mut solver = BddSolver::default();
        solver.add(&Expr::gt(x(), Expr::int(32767))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Sat);
        solver.add(&Expr::lt(Expr::add(x(), Expr::int(1)), Expr::int(0))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Unsat);
    }

    #[test]
    fn test_theory_conflicts_are_blocked() {
        // Every boolean path of the disjunction is inconsistent over the integers.
        let mut solver = BddSolver::default();
        solver
            .add(&Expr::or([Expr::lt(x(), Expr::int(0)), Expr::gt(y(), Expr::int(0))]))
            .unwrap();
        solver.add(&Expr::gt(x(), Expr::int(5))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Sat);

        solver.push();
        solver.add(&Expr::lt(y(), Expr::int(0))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Unsat);
        solver.pop();

        // Lemmas learnt in the popped frame do not cut off the outer one.
        assert_eq!(solver.check(), SolverStatus::Sat);
    }

    #[test]
    fn test_parity() {
        let mut solver = BddSolver::default();
        solver.add(&Expr::eq(Expr::mul(Expr::int(2), x()), Expr::add(y(), Expr::int(1)))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Sat);
        let two_z = Expr::mul(Expr::int(2), Expr::var("z"));
        solver.add(&Expr::eq(y(), two_z)).unwrap();
        assert_eq!(solver.check(), SolverStatus::Unsat);
    }

    #[test]
    fn test_forall() {
        let mut solver = BddSolver::default();
        // Every y >= x is positive: holds exactly when x > 0.
        let body = Expr::imply(Expr::ge(y(), x()), Expr::gt(y(), Expr::int(0)));
        solver.add(&Expr::forall(Var::new("y"), body)).unwrap();
        assert_eq!(solver.check(), SolverStatus::Sat);
        solver.with_scope(|s| {
            s.add(&Expr::le(x(), Expr::int(0))).unwrap();
            assert_eq!(s.check(), SolverStatus::Unsat);
        });
        solver.add(&Expr::eq(x(), Expr::int(1))).unwrap();
        assert_eq!(solver.check(), SolverStatus::Sat);
    }
}
