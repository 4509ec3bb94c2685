//! # cegar-rs: predicate-abstraction safety checking
//!
//! **`cegar-rs`** decides whether the error location of a control-flow automaton is
//! reachable, using *counterexample-guided abstraction refinement* (CEGAR) over a
//! Cartesian predicate abstraction.
//!
//! ## How it works
//!
//! 1. The [`abstractor`] builds an abstract reachability graph ([`arg`]) for the current
//!    set of predicates, pruning nodes that are subsumed by an already explored one.
//! 2. If the error location is never reached, the program is **safe** and the graph is
//!    the certificate.
//! 3. Otherwise the [`refiner`] checks the path to the error. A feasible path is a real
//!    counterexample. An infeasible one yields new predicates, and exploration restarts.
//!
//! Satisfiability queries go through the [`solver`] traits. The bundled implementation
//! decides [`linear`] arithmetic over unbounded integers: the boolean structure of a query
//! lives in the [`bdd`] manager and its arithmetic is settled by quantifier elimination
//! ([`cooper`]), so the crate has no external solver dependency.
//!
//! ## Basic Usage
//!
//! ```rust
//! use cegar_rs::cfa::{CfaBuilder, Stmt};
//! use cegar_rs::checker::{CegarChecker, CegarConfig, SafetyChecker};
//! use cegar_rs::expr::Expr;
//!
//! // init --[x := 0]--> loop --[x := x + 1]--> loop --[assume x < 0]--> error
//! let x = || Expr::var("x");
//! let mut builder = CfaBuilder::new();
//! let init = builder.create_loc("init");
//! let lp = builder.create_loc("loop");
//! let error = builder.create_loc("error");
//! builder.create_edge(init, lp, Stmt::assign("x", Expr::int(0)));
//! builder.create_edge(lp, lp, Stmt::assign("x", Expr::add(x(), Expr::int(1))));
//! builder.create_edge(lp, error, Stmt::assume(Expr::lt(x(), Expr::int(0))));
//! builder.set_init_loc(init);
//! builder.set_error_loc(error);
//! let cfa = builder.build();
//!
//! let result = CegarChecker::new(&cfa, CegarConfig::default()).check().unwrap();
//! assert!(result.is_safe());
//! ```
//!
//! ## Core Components
//!
//! - **[`checker`]**: the CEGAR loop, its configuration and the verdict type.
//! - **[`domain`]**: abstract states, precisions and the abstraction transformer.
//! - **[`cfa`]** and **[`expr`]**: the model and the formulas labelling it.
//! - **[`dot`]**: Graphviz export of reachability graphs.

pub mod abstractor;
pub mod arg;
pub mod bdd;
pub mod cache;
pub mod cfa;
pub mod checker;
pub mod cooper;
pub mod domain;
pub mod dot;
pub mod error;
pub mod expr;
pub mod linear;
pub mod reference;
pub mod refiner;
pub mod solver;
pub mod table;
pub mod utils;
pub mod waitlist;
