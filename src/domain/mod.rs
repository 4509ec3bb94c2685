//! Cartesian predicate abstraction.
//!
//! The successor of a [`PredState`] along a statement keeps, for every predicate `p` of
//! the [`PredPrecision`], either `p` or `¬p` when the solver proves it holds in every
//! post-state, and drops `p` otherwise.

mod precision;
mod state;

use std::collections::BTreeSet;

use log::{debug, warn};

pub use self::precision::PredPrecision;
pub use self::state::PredState;
use crate::cfa::Stmt;
use crate::error::SolverError;
use crate::expr::{Expr, VarIndexing};
use crate::solver::{Solver, SolverFactory};

/// Whether successor computation checks that a step is feasible.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum FeasibilityCheck {
    /// Infeasible steps have no successor.
    #[default]
    Enabled,
    /// Approximation: every step has a successor, even an infeasible one.
    Disabled,
}

pub struct PredDomain<F> {
    factory: F,
    feasibility: FeasibilityCheck,
}

impl<F: SolverFactory> PredDomain<F> {
    pub fn new(factory: F, feasibility: FeasibilityCheck) -> Self {
        if feasibility == FeasibilityCheck::Disabled {
            warn!("Feasibility check disabled: infeasible steps still produce abstract successors");
        }
        Self { factory, feasibility }
    }

    pub fn init_state(&self) -> PredState {
        PredState::top()
    }

    /// Abstract successors of `state` along `stmt`.
    ///
    /// Returns no state when the step is infeasible and a single state otherwise.
    pub fn succ_states(
        &self,
        state: &PredState,
        precision: &PredPrecision,
        stmt: &Stmt,
    ) -> Result<Vec<PredState>, SolverError> {
        let mut solver = self.factory.create_solver();
        let mut indexing = VarIndexing::new();
        solver.add(state.to_expr())?;
        solver.add(&stmt.to_expr(&mut indexing))?;

        if self.feasibility == FeasibilityCheck::Enabled && !solver.is_sat()? {
            debug!("{} is infeasible from {}", stmt, state);
            return Ok(Vec::new());
        }

        let mut preds = BTreeSet::new();
        for pred in precision.predicates() {
            let next = pred.at(&indexing);
            let holds = !solver.with_scope(|s| -> Result<bool, SolverError> {
                s.add(&Expr::not(next.clone()))?;
                s.is_sat()
            })?;
            if holds {
                preds.insert(pred.clone());
                continue;
            }
            let fails = !solver.with_scope(|s| -> Result<bool, SolverError> {
                s.add(&next)?;
                s.is_sat()
            })?;
            if fails {
                preds.insert(Expr::not(pred.clone()));
            }
        }

        let succ = PredState::of(preds);
        debug!("{} --[{}]--> {}", state, stmt, succ);
        Ok(vec![succ])
    }

    /// Whether `candidate` entails `reached`, so that `reached` subsumes it.
    ///
    /// The order reads from the candidate to the reached state: `is_leq(a, b)` holds when
    /// `a ⇒ b`, that is when `a` is at most as abstract as `b`. A new node is covered by a
    /// reached node whose state is above its own, never the other way round.
    pub fn is_leq(&self, candidate: &PredState, reached: &PredState) -> Result<bool, SolverError> {
        if reached.predicates().is_subset(candidate.predicates()) {
            return Ok(true);
        }
        let mut solver = self.factory.create_solver();
        solver.add(candidate.to_expr())?;
        solver.add(&Expr::not(reached.to_expr().clone()))?;
        Ok(!solver.is_sat()?)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::solver::{BddSolver, BddSolverFactory};

    fn x() -> Expr {
        Expr::var("x")
    }

    /// Hands out default solvers and counts them.
    #[derive(Clone, Default)]
    struct CountingFactory {
        inner: BddSolverFactory,
        created: Rc<Cell<usize>>,
    }

    impl SolverFactory for CountingFactory {
        type Solver = BddSolver;

        fn create_solver(&self) -> BddSolver {
            self.created.set(self.created.get() + 1);
            self.inner.create_solver()
        }
    }

    fn domain() -> PredDomain<BddSolverFactory> {
        PredDomain::new(BddSolverFactory::default(), FeasibilityCheck::Enabled)
    }

    #[test]
    fn test_top_without_predicates() {
        let d = domain();
        let succ = d
            .succ_states(&PredState::top(), &PredPrecision::empty(), &Stmt::assign("x", Expr::int(1)))
            .unwrap();
        assert_eq!(succ, vec![PredState::top()]);
    }

    #[test]
    fn test_assignment_establishes_predicate() {
        let d = domain();
        let pos = Expr::gt(x(), Expr::int(0));
        let precision = PredPrecision::of([pos.clone()]);

        let succ = d
            .succ_states(&PredState::top(), &precision, &Stmt::assign("x", Expr::int(1)))
            .unwrap();
        assert_eq!(succ, vec![PredState::of([pos.clone()])]);

        let succ = d
            .succ_states(&PredState::top(), &precision, &Stmt::assign("x", Expr::int(-4)))
            .unwrap();
        assert_eq!(succ, vec![PredState::of([Expr::le(x(), Expr::int(0))])]);

        let succ = d.succ_states(&PredState::top(), &precision, &Stmt::havoc("x")).unwrap();
        assert_eq!(succ, vec![PredState::top()]);
    }

    #[test]
    fn test_infeasible_step() {
        let d = domain();
        let pos = Expr::gt(x(), Expr::int(0));
        let state = PredState::of([pos.clone()]);
        let guard = Stmt::assume(Expr::le(x(), Expr::int(0)));

        let succ = d.succ_states(&state, &PredPrecision::of([pos]), &guard).unwrap();
        assert!(succ.is_empty());
    }

    #[test]
    fn test_infeasible_step_unchecked() {
        let d = PredDomain::new(BddSolverFactory::default(), FeasibilityCheck::Disabled);
        let pos = Expr::gt(x(), Expr::int(0));
        let state = PredState::of([pos.clone()]);
        let guard = Stmt::assume(Expr::le(x(), Expr::int(0)));

        let succ = d.succ_states(&state, &PredPrecision::empty(), &guard).unwrap();
        assert_eq!(succ, vec![PredState::top()]);
    }

    #[test]
    fn test_predicates_survive_unrelated_assignment() {
        let d = domain();
        let pos = Expr::gt(x(), Expr::int(0));
        let state = PredState::of([pos.clone()]);
        let succ = d
            .succ_states(&state, &PredPrecision::of([pos.clone()]), &Stmt::assign("y", Expr::int(7)))
            .unwrap();
        assert_eq!(succ, vec![state]);
    }

    #[test]
    fn test_is_leq() {
        let d = domain();
        let big = Expr::gt(x(), Expr::int(5));
        let pos = Expr::gt(x(), Expr::int(0));

        let top = PredState::top();
        let s_big = PredState::of([big.clone()]);
        let s_pos = PredState::of([pos.clone()]);

        assert!(d.is_leq(&s_big, &top).unwrap());
        assert!(!d.is_leq(&top, &s_big).unwrap());
        assert!(d.is_leq(&s_big, &s_pos).unwrap());
        assert!(!d.is_leq(&s_pos, &s_big).unwrap());
        assert!(d.is_leq(&s_pos, &s_pos).unwrap());
    }

    #[test]
    fn test_increment_keeps_non_negative() {
        let d = domain();
        let non_neg = Expr::ge(x(), Expr::int(0));
        let state = PredState::of([non_neg.clone()]);
        let inc = Stmt::assign("x", Expr::add(x(), Expr::int(1)));
        let succ = d.succ_states(&state, &PredPrecision::of([non_neg]), &inc).unwrap();
        assert_eq!(succ, vec![state]);
    }

    #[test]
    fn test_one_solver_per_query() {
        let factory = CountingFactory::default();
        let created = Rc::clone(&factory.created);
        let d = PredDomain::new(factory, FeasibilityCheck::Enabled);

        let pos = Expr::gt(x(), Expr::int(0));
        let big = Expr::gt(x(), Expr::int(5));
        let precision = PredPrecision::of([pos.clone(), big.clone(), Expr::eq(x(), Expr::int(3))]);
        let succ = d
            .succ_states(&PredState::top(), &precision, &Stmt::assign("x", Expr::int(3)))
            .unwrap();
        assert_eq!(succ.len(), 1);
        // Every predicate query runs in a scope of the same solver.
        assert_eq!(created.get(), 1);

        // The subset check needs no solver.
        let both = PredState::of([pos.clone(), big.clone()]);
        assert!(d.is_leq(&both, &PredState::of([pos.clone()])).unwrap());
        assert_eq!(created.get(), 1);

        assert!(d.is_leq(&PredState::of([big]), &PredState::of([pos])).unwrap());
        assert_eq!(created.get(), 2);
    }
}
