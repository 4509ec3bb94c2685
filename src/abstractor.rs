//! Construction of the abstract reachability graph for a fixed precision.

use std::collections::HashMap;

use log::{debug, info};

use crate::arg::{Arg, ArgNodeId};
use crate::cfa::{Cfa, LocId};
use crate::checker::SearchStrategy;
use crate::domain::{PredDomain, PredPrecision};
use crate::error::{CegarError, ModelError};
use crate::solver::SolverFactory;
use crate::waitlist::Waitlist;

#[derive(Debug)]
pub enum AbstractionResult {
    /// The frontier was exhausted without reaching the error location.
    Safe { arg: Arg },
    /// `error_node` sits at the error location.
    Unsafe { arg: Arg, error_node: ArgNodeId },
}

impl AbstractionResult {
    pub fn is_safe(&self) -> bool {
        matches!(self, AbstractionResult::Safe { .. })
    }

    pub fn arg(&self) -> &Arg {
        match self {
            AbstractionResult::Safe { arg } | AbstractionResult::Unsafe { arg, .. } => arg,
        }
    }
}

pub struct Abstractor<'a, F> {
    cfa: &'a Cfa,
    domain: PredDomain<F>,
    strategy: SearchStrategy,
}

impl<'a, F: SolverFactory> Abstractor<'a, F> {
    pub fn new(cfa: &'a Cfa, domain: PredDomain<F>, strategy: SearchStrategy) -> Self {
        Self { cfa, domain, strategy }
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Explore the abstract state space under `precision`, starting from a fresh ARG.
    pub fn check(&self, precision: &PredPrecision) -> Result<AbstractionResult, CegarError> {
        let init_loc = self.cfa.init_loc().ok_or(ModelError::MissingInitLoc)?;
        let arg = Arg::new(init_loc, self.domain.init_state());

        let Some(error_loc) = self.cfa.error_loc() else {
            debug!("No error location, nothing to explore");
            return Ok(AbstractionResult::Safe { arg });
        };

        let builder = AbstractionBuilder {
            cfa: self.cfa,
            domain: &self.domain,
            precision,
            arg,
            waitlist: self.strategy.create_waitlist(),
            reached: HashMap::new(),
        };
        let result = builder.run(error_loc)?;

        let arg = result.arg();
        info!(
            "Abstraction finished: {} nodes, {} covered, {}",
            arg.len(),
            arg.num_covered(),
            if result.is_safe() { "safe" } else { "error reached" }
        );
        Ok(result)
    }
}

/// State of one abstraction run.
struct AbstractionBuilder<'a, F> {
    cfa: &'a Cfa,
    domain: &'a PredDomain<F>,
    precision: &'a PredPrecision,
    arg: Arg,
    waitlist: Box<dyn Waitlist>,
    /// Uncovered, expanded nodes per location, in insertion order.
    reached: HashMap<LocId, Vec<ArgNodeId>>,
}

impl<F: SolverFactory> AbstractionBuilder<'_, F> {
    fn run(mut self, error_loc: LocId) -> Result<AbstractionResult, CegarError> {
        self.waitlist.add(self.arg.root());

        while let Some(node) = self.waitlist.remove() {
            let loc = self.arg.node(node).loc();
            if loc == error_loc {
                debug!("Reached error location with {}", node);
                return Ok(AbstractionResult::Unsafe {
                    arg: self.arg,
                    error_node: node,
                });
            }
            if self.close(node)? {
                continue;
            }
            self.reached.entry(loc).or_default().push(node);
            self.expand(node)?;
        }

        Ok(AbstractionResult::Safe { arg: self.arg })
    }

    /// Cover `node` with the first reached node at its location that subsumes it.
    fn close(&mut self, node: ArgNodeId) -> Result<bool, CegarError> {
        let loc = self.arg.node(node).loc();
        let Some(candidates) = self.reached.get(&loc) else {
            return Ok(false);
        };
        for &reached in candidates {
            if self.arg.is_covered(reached) {
                continue;
            }
            let covers = self
                .domain
                .is_leq(self.arg.node(node).state(), self.arg.node(reached).state())
                .map_err(CegarError::Domain)?;
            if covers {
                debug!("{} is covered by {}", node, reached);
                self.arg.cover_with(node, reached);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn expand(&mut self, node: ArgNodeId) -> Result<(), CegarError> {
        let loc = self.arg.node(node).loc();
        let state = self.arg.node(node).state().clone();
        for &edge_id in self.cfa.out_edges(loc) {
            let edge = self.cfa.edge(edge_id);
            let succs = self
                .domain
                .succ_states(&state, self.precision, edge.stmt())
                .map_err(CegarError::Domain)?;
            for succ in succs {
                let child = self.arg.create_child(node, edge_id, edge.target(), succ);
                self.waitlist.add(child);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cfa::{CfaBuilder, Stmt};
    use crate::domain::{FeasibilityCheck, PredState};
    use crate::expr::Expr;
    use crate::solver::BddSolverFactory;

    fn x() -> Expr {
        Expr::var("x")
    }

    fn domain() -> PredDomain<BddSolverFactory> {
        PredDomain::new(BddSolverFactory::default(), FeasibilityCheck::Enabled)
    }

    /// init -[x := 1]-> mid -[assume x <= 0]-> error
    fn guarded() -> Cfa {
        let mut builder = CfaBuilder::new();
        let init = builder.create_loc("init");
        let mid = builder.create_loc("mid");
        let error = builder.create_loc("error");
        builder.create_edge(init, mid, Stmt::assign("x", Expr::int(1)));
        builder.create_edge(mid, error, Stmt::assume(Expr::le(x(), Expr::int(0))));
        builder.set_init_loc(init);
        builder.set_error_loc(error);
        builder.build()
    }

    #[test]
    fn test_missing_init() {
        let cfa = CfaBuilder::new().build();
        let abstractor = Abstractor::new(&cfa, domain(), SearchStrategy::BreadthFirst);
        let res = abstractor.check(&PredPrecision::empty());
        assert!(matches!(res, Err(CegarError::Model(ModelError::MissingInitLoc))));
    }

    #[test]
    fn test_no_error_location() {
        let mut builder = CfaBuilder::new();
        let init = builder.create_loc("init");
        builder.create_edge(init, init, Stmt::havoc("x"));
        builder.set_init_loc(init);
        let cfa = builder.build();

        let abstractor = Abstractor::new(&cfa, domain(), SearchStrategy::BreadthFirst);
        let res = abstractor.check(&PredPrecision::empty()).unwrap();
        assert!(res.is_safe());
        assert_eq!(res.arg().len(), 1);
    }

    #[test]
    fn test_init_is_error() {
        let mut builder = CfaBuilder::new();
        let init = builder.create_loc("init");
        builder.set_init_loc(init);
        builder.set_error_loc(init);
        let cfa = builder.build();

        let abstractor = Abstractor::new(&cfa, domain(), SearchStrategy::DepthFirst);
        match abstractor.check(&PredPrecision::empty()).unwrap() {
            AbstractionResult::Unsafe { arg, error_node } => assert_eq!(error_node, arg.root()),
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_reaches_error_without_predicates() {
        let cfa = guarded();
        let abstractor = Abstractor::new(&cfa, domain(), SearchStrategy::BreadthFirst);
        match abstractor.check(&PredPrecision::empty()).unwrap() {
            AbstractionResult::Unsafe { arg, error_node } => {
                assert_eq!(arg.trace_to(error_node).len(), 2);
                assert!(arg.node(error_node).state().is_top());
            }
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_predicate_blocks_error() {
        let cfa = guarded();
        let abstractor = Abstractor::new(&cfa, domain(), SearchStrategy::BreadthFirst);
        let precision = PredPrecision::of([Expr::gt(x(), Expr::int(0))]);
        let res = abstractor.check(&precision).unwrap();
        assert!(res.is_safe());
        // init, mid; the guarded step has no successor.
        assert_eq!(res.arg().len(), 2);
        let mid = res.arg().node(res.arg().root()).children()[0];
        assert_eq!(
            res.arg().node(mid).state(),
            &PredState::of([Expr::gt(x(), Expr::int(0))])
        );
    }

    #[test]
    fn test_self_loop_is_covered() {
        let mut builder = CfaBuilder::new();
        let init = builder.create_loc("init");
        let lp = builder.create_loc("loop");
        let error = builder.create_loc("error");
        builder.create_edge(init, lp, Stmt::assign("x", Expr::int(0)));
        builder.create_edge(lp, lp, Stmt::assign("y", Expr::add(Expr::var("y"), Expr::int(1))));
        builder.create_edge(lp, error, Stmt::assume(Expr::lt(x(), Expr::int(0))));
        builder.set_init_loc(init);
        builder.set_error_loc(error);
        let cfa = builder.build();

        let abstractor = Abstractor::new(&cfa, domain(), SearchStrategy::BreadthFirst);
        let precision = PredPrecision::of([Expr::ge(x(), Expr::int(0))]);
        let res = abstractor.check(&precision).unwrap();
        assert!(res.is_safe());

        let arg = res.arg();
        assert_eq!(arg.num_covered(), 1);
        for id in arg.nodes() {
            if let Some(coverer) = arg.node(id).covered_by() {
                assert!(arg.node(id).children().is_empty());
                assert!(!arg.is_covered(coverer));
                assert_eq!(arg.node(id).loc(), lp);
            }
        }
    }
}
