//! The CEGAR loop.
//!
//! [`CegarChecker`] alternates abstraction and refinement. Every round starts a fresh
//! [`Abstractor`] run with the current precision. An error node found by the run is handed
//! to the [`Refiner`]: a genuine path ends the loop with [`SafetyResult::Unsafe`], a
//! spurious one grows the precision and triggers the next round.
//!
//! ```
//! use cegar_rs::cfa::{CfaBuilder, Stmt};
//! use cegar_rs::checker::{CegarChecker, CegarConfig, SafetyChecker};
//! use cegar_rs::expr::Expr;
//!
//! let x = || Expr::var("x");
//! let mut builder = CfaBuilder::new();
//! let init = builder.create_loc("init");
//! let mid = builder.create_loc("mid");
//! let error = builder.create_loc("error");
//! builder.create_edge(init, mid, Stmt::assign("x", Expr::int(1)));
//! builder.create_edge(mid, error, Stmt::assume(Expr::le(x(), Expr::int(0))));
//! builder.set_init_loc(init);
//! builder.set_error_loc(error);
//! let cfa = builder.build();
//!
//! let checker = CegarChecker::new(&cfa, CegarConfig::default());
//! let result = checker.check().unwrap();
//! assert!(result.is_safe());
//! ```

use log::{info, warn};

use crate::abstractor::{AbstractionResult, Abstractor};
use crate::arg::{Arg, ArgNodeId, ArgTrace};
use crate::cfa::Cfa;
use crate::domain::{FeasibilityCheck, PredDomain, PredPrecision};
use crate::error::CegarError;
use crate::refiner::{RefinementResult, Refiner};
use crate::solver::{BddSolverFactory, SolverConfig, SolverFactory};
use crate::waitlist::{FifoWaitlist, LifoWaitlist, Waitlist};

/// Exploration order of the abstractor.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum SearchStrategy {
    #[default]
    BreadthFirst,
    DepthFirst,
}

impl SearchStrategy {
    pub fn create_waitlist(self) -> Box<dyn Waitlist> {
        match self {
            SearchStrategy::BreadthFirst => Box::new(FifoWaitlist::new()),
            SearchStrategy::DepthFirst => Box::new(LifoWaitlist::new()),
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct CegarConfig {
    pub strategy: SearchStrategy,
    pub feasibility_check: FeasibilityCheck,
    pub solver: SolverConfig,
    /// Give up after this many refinements. Unbounded when `None`.
    pub max_refinements: Option<usize>,
}

/// Final verdict of a verification run.
#[derive(Debug)]
pub enum SafetyResult {
    /// The error location is unreachable; `arg` is the certificate.
    Safe { arg: Arg, precision: PredPrecision },
    /// `error_node` ends a feasible path from the root.
    Unsafe { arg: Arg, error_node: ArgNodeId },
}

impl SafetyResult {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyResult::Safe { .. })
    }

    pub fn is_unsafe(&self) -> bool {
        !self.is_safe()
    }

    pub fn arg(&self) -> &Arg {
        match self {
            SafetyResult::Safe { arg, .. } | SafetyResult::Unsafe { arg, .. } => arg,
        }
    }

    /// The counterexample, if unsafe.
    pub fn trace(&self) -> Option<ArgTrace> {
        match self {
            SafetyResult::Safe { .. } => None,
            SafetyResult::Unsafe { arg, error_node } => Some(arg.trace_to(*error_node)),
        }
    }
}

pub trait SafetyChecker {
    fn check(&self) -> Result<SafetyResult, CegarError>;
}

pub struct CegarChecker<'a, F = BddSolverFactory> {
    abstractor: Abstractor<'a, F>,
    refiner: Refiner<'a, F>,
    max_refinements: Option<usize>,
}

impl<'a> CegarChecker<'a, BddSolverFactory> {
    pub fn new(cfa: &'a Cfa, config: CegarConfig) -> Self {
        Self::with_factory(cfa, config, BddSolverFactory::new(config.solver))
    }
}

impl<'a, F: SolverFactory + Clone> CegarChecker<'a, F> {
    /// Use `factory` for every solver query instead of the configured BDD solver.
    pub fn with_factory(cfa: &'a Cfa, config: CegarConfig, factory: F) -> Self {
        let domain = PredDomain::new(factory.clone(), config.feasibility_check);
        Self {
            abstractor: Abstractor::new(cfa, domain, config.strategy),
            refiner: Refiner::new(cfa, factory),
            max_refinements: config.max_refinements,
        }
    }
}

impl<F: SolverFactory> SafetyChecker for CegarChecker<'_, F> {
    fn check(&self) -> Result<SafetyResult, CegarError> {
        let mut precision = PredPrecision::empty();
        let mut refinements = 0;

        loop {
            info!(
                "Iteration {}: abstraction with {} predicates",
                refinements + 1,
                precision.len()
            );

            let (arg, error_node) = match self.abstractor.check(&precision)? {
                AbstractionResult::Safe { arg } => {
                    info!("Verdict: safe after {} refinements", refinements);
                    return Ok(SafetyResult::Safe { arg, precision });
                }
                AbstractionResult::Unsafe { arg, error_node } => (arg, error_node),
            };

            match self.refiner.refine(&arg, error_node)? {
                RefinementResult::Genuine => {
                    info!(
                        "Verdict: unsafe, counterexample of length {}",
                        arg.trace_to(error_node).len()
                    );
                    return Ok(SafetyResult::Unsafe { arg, error_node });
                }
                RefinementResult::Spurious(increment) => {
                    if let Some(limit) = self.max_refinements {
                        if refinements >= limit {
                            return Err(CegarError::RefinementLimit(limit));
                        }
                    }
                    refinements += 1;

                    let joined = precision.join(&increment);
                    if joined.len() == precision.len() {
                        warn!("Refinement added no new predicates to {}", precision);
                    }
                    precision = joined;
                    info!("Refined precision: {}", precision);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cfa::{CfaBuilder, Stmt};
    use crate::expr::Expr;

    #[test]
    fn test_create_waitlist() {
        let mut bfs = SearchStrategy::BreadthFirst.create_waitlist();
        let mut dfs = SearchStrategy::DepthFirst.create_waitlist();
        for w in [&mut bfs, &mut dfs] {
            w.add(ArgNodeId::from_index(0));
            w.add(ArgNodeId::from_index(1));
        }
        assert_eq!(bfs.remove(), Some(ArgNodeId::from_index(0)));
        assert_eq!(dfs.remove(), Some(ArgNodeId::from_index(1)));
    }

    #[test]
    fn test_default_config() {
        let config = CegarConfig::default();
        assert_eq!(config.strategy, SearchStrategy::BreadthFirst);
        assert_eq!(config.feasibility_check, FeasibilityCheck::Enabled);
        assert_eq!(config.solver, SolverConfig::default());
        assert_eq!(config.max_refinements, None);
    }

    #[test]
    fn test_refinement_limit() {
        let x = || Expr::var("x");
        let mut builder = CfaBuilder::new();
        let init = builder.create_loc("init");
        let error = builder.create_loc("error");
        let mid = builder.create_loc("mid");
        builder.create_edge(init, mid, Stmt::assign("x", Expr::int(1)));
        builder.create_edge(mid, error, Stmt::assume(Expr::le(x(), Expr::int(0))));
        builder.set_init_loc(init);
        builder.set_error_loc(error);
        let cfa = builder.build();

        let config = CegarConfig {
            max_refinements: Some(0),
            ..CegarConfig::default()
        };
        let res = CegarChecker::new(&cfa, config).check();
        assert!(matches!(res, Err(CegarError::RefinementLimit(0))));

        let config = CegarConfig {
            max_refinements: Some(1),
            ..CegarConfig::default()
        };
        assert!(CegarChecker::new(&cfa, config).check().unwrap().is_safe());
    }
}
