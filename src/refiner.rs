//! Counterexample analysis.
//!
//! A path to the error location is *genuine* when the conjunction of its transition
//! relations (in SSA form) is satisfiable. Otherwise the path is shrunk by dropping every
//! `assume` that is not needed for infeasibility, and the weakest preconditions of `false`
//! along what remains become the new predicates. Tracking them makes the abstraction
//! precise enough to rule the path out.

use std::collections::BTreeSet;

use log::debug;

use crate::arg::{Arg, ArgNodeId};
use crate::cfa::{Cfa, Stmt};
use crate::domain::PredPrecision;
use crate::error::{CegarError, SolverError};
use crate::expr::{Expr, VarIndexing};
use crate::solver::{Solver, SolverFactory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementResult {
    /// No execution follows the path; the precision increment excludes it.
    Spurious(PredPrecision),
    /// The path is a real counterexample.
    Genuine,
}

pub struct Refiner<'a, F> {
    cfa: &'a Cfa,
    factory: F,
}

impl<'a, F: SolverFactory> Refiner<'a, F> {
    pub fn new(cfa: &'a Cfa, factory: F) -> Self {
        Self { cfa, factory }
    }

    pub fn refine(&self, arg: &Arg, error_node: ArgNodeId) -> Result<RefinementResult, CegarError> {
        let trace = arg.trace_to(error_node);
        let mut path: Vec<Stmt> = trace
            .edges()
            .iter()
            .map(|&e| self.cfa.edge(e).stmt().clone())
            .collect();

        if self.is_feasible(&path).map_err(CegarError::Refiner)? {
            debug!("Counterexample of length {} is feasible", path.len());
            return Ok(RefinementResult::Genuine);
        }

        self.reduce(&mut path).map_err(CegarError::Refiner)?;

        let preds = weakest_preconditions(&path);
        if preds.is_empty() {
            return Err(CegarError::EmptyRefinement);
        }
        let increment = PredPrecision::of(preds);
        debug!("Counterexample of length {} is spurious, new predicates {}", path.len(), increment);
        Ok(RefinementResult::Spurious(increment))
    }

    fn is_feasible(&self, path: &[Stmt]) -> Result<bool, SolverError> {
        let mut solver = self.factory.create_solver();
        solver.with_scope(|s| -> Result<bool, SolverError> {
            let mut indexing = VarIndexing::new();
            for stmt in path {
                s.add(&stmt.to_expr(&mut indexing))?;
            }
            s.is_sat()
        })
    }

    /// Replace by `skip` every guard whose removal keeps the path infeasible.
    fn reduce(&self, path: &mut [Stmt]) -> Result<(), SolverError> {
        for i in 0..path.len() {
            if !matches!(path[i], Stmt::Assume(_)) {
                continue;
            }
            let guard = std::mem::replace(&mut path[i], Stmt::Skip);
            if self.is_feasible(path)? {
                path[i] = guard;
            }
        }
        Ok(())
    }
}

/// Non-constant weakest preconditions of `false` at each position of `path`.
fn weakest_preconditions(path: &[Stmt]) -> BTreeSet<Expr> {
    let mut preds = BTreeSet::new();
    let mut post = Expr::FALSE;
    for stmt in path.iter().rev() {
        post = stmt.wp(&post);
        if !post.is_const() {
            preds.insert(post.clone());
        }
    }
    preds
}
