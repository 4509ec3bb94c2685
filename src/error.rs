use thiserror::Error;

use crate::linear::ArithError;

/// The model cannot be explored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("the model has no initial location")]
    MissingInitLoc,
}

/// A satisfiability query could not be answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("solver returned unknown")]
    Unknown,
    #[error(transparent)]
    Arith(#[from] ArithError),
}

/// Failure of a whole verification run, tagged with the component that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CegarError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("abstraction failed: {0}")]
    Domain(#[source] SolverError),
    #[error("refinement failed: {0}")]
    Refiner(#[source] SolverError),
    #[error("refinement of a spurious counterexample produced no predicates")]
    EmptyRefinement,
    #[error("no verdict after {0} refinements")]
    RefinementLimit(usize),
}
