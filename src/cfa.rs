//! Control-flow automaton: the model the checker explores.
//!
//! A [`Cfa`] is a set of named locations connected by edges, each edge labelled with a
//! single [`Stmt`]. Locations and edges live in arenas and are referred to by [`LocId`]
//! and [`EdgeId`].
//!
//! ```
//! use cegar_rs::cfa::{CfaBuilder, Stmt};
//! use cegar_rs::expr::Expr;
//!
//! let mut builder = CfaBuilder::new();
//! let init = builder.create_loc("init");
//! let error = builder.create_loc("error");
//! builder.create_edge(init, error, Stmt::assume(Expr::gt(Expr::var("x"), Expr::int(0))));
//! builder.set_init_loc(init);
//! builder.set_error_loc(error);
//! let cfa = builder.build();
//!
//! assert_eq!(cfa.out_edges(init).len(), 1);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::expr::{Expr, Var, VarIndexing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocId(usize);

impl LocId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(usize);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A statement labelling an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// Blocks unless the condition holds.
    Assume(Expr),
    /// `var := expr`
    Assign(Var, Expr),
    /// Assigns an arbitrary value.
    Havoc(Var),
    Skip,
}

impl Stmt {
    pub fn assume(cond: Expr) -> Self {
        Stmt::Assume(cond)
    }

    pub fn assign(var: impl AsRef<str>, expr: Expr) -> Self {
        Stmt::Assign(Var::new(var), expr)
    }

    pub fn havoc(var: impl AsRef<str>) -> Self {
        Stmt::Havoc(Var::new(var))
    }

    /// Transition relation of this statement.
    ///
    /// Reads refer to the versions in `indexing`; written variables are bumped to a fresh
    /// version, so after the call `indexing` describes the post-state.
    pub fn to_expr(&self, indexing: &mut VarIndexing) -> Expr {
        match self {
            Stmt::Assume(cond) => cond.at(indexing),
            Stmt::Assign(var, expr) => {
                let rhs = expr.at(indexing);
                let version = indexing.inc(var);
                Expr::eq(Expr::Var(var.with_version(version)), rhs)
            }
            Stmt::Havoc(var) => {
                indexing.inc(var);
                Expr::TRUE
            }
            Stmt::Skip => Expr::TRUE,
        }
    }

    /// Weakest precondition of `post` with respect to this statement.
    pub fn wp(&self, post: &Expr) -> Expr {
        match self {
            Stmt::Assume(cond) => Expr::imply(cond.clone(), post.clone()),
            Stmt::Assign(var, expr) => post.substitute(var, expr),
            Stmt::Havoc(var) => Expr::forall(var.clone(), post.clone()),
            Stmt::Skip => post.clone(),
        }
    }

    pub fn vars(&self) -> BTreeSet<Var> {
        match self {
            Stmt::Assume(cond) => cond.free_vars(),
            Stmt::Assign(var, expr) => {
                let mut vars = expr.free_vars();
                vars.insert(var.clone());
                vars
            }
            Stmt::Havoc(var) => BTreeSet::from([var.clone()]),
            Stmt::Skip => BTreeSet::new(),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assume(cond) => write!(f, "assume {}", cond),
            Stmt::Assign(var, expr) => write!(f, "{} := {}", var, expr),
            Stmt::Havoc(var) => write!(f, "havoc {}", var),
            Stmt::Skip => write!(f, "skip"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Loc {
    name: String,
    in_edges: Vec<EdgeId>,
    out_edges: Vec<EdgeId>,
}

impl Loc {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    source: LocId,
    target: LocId,
    stmt: Stmt,
}

impl Edge {
    pub fn source(&self) -> LocId {
        self.source
    }
    pub fn target(&self) -> LocId {
        self.target
    }
    pub fn stmt(&self) -> &Stmt {
        &self.stmt
    }
}

#[derive(Debug, Clone)]
pub struct Cfa {
    locs: Vec<Loc>,
    edges: Vec<Edge>,
    init_loc: Option<LocId>,
    error_loc: Option<LocId>,
}

impl Cfa {
    pub fn init_loc(&self) -> Option<LocId> {
        self.init_loc
    }

    pub fn error_loc(&self) -> Option<LocId> {
        self.error_loc
    }

    pub fn loc(&self, id: LocId) -> &Loc {
        &self.locs[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    /// Outgoing edges of `loc`, in insertion order.
    pub fn out_edges(&self, loc: LocId) -> &[EdgeId] {
        &self.locs[loc.0].out_edges
    }

    pub fn in_edges(&self, loc: LocId) -> &[EdgeId] {
        &self.locs[loc.0].in_edges
    }

    pub fn locs(&self) -> impl Iterator<Item = LocId> + '_ {
        (0..self.locs.len()).map(LocId)
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len()).map(EdgeId)
    }

    /// Every variable mentioned by some statement.
    pub fn vars(&self) -> BTreeSet<Var> {
        self.edges.iter().flat_map(|e| e.stmt.vars()).collect()
    }
}

impl fmt::Display for Cfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for edge in &self.edges {
            writeln!(
                f,
                "{} -> {}: {}",
                self.locs[edge.source.0].name, self.locs[edge.target.0].name, edge.stmt
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CfaBuilder {
    locs: Vec<Loc>,
    edges: Vec<Edge>,
    init_loc: Option<LocId>,
    error_loc: Option<LocId>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_loc(&mut self, name: impl Into<String>) -> LocId {
        self.locs.push(Loc {
            name: name.into(),
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        });
        LocId(self.locs.len() - 1)
    }

    pub fn create_edge(&mut self, source: LocId, target: LocId, stmt: Stmt) -> EdgeId {
        assert!(source.0 < self.locs.len(), "Unknown source location {}", source);
        assert!(target.0 < self.locs.len(), "Unknown target location {}", target);

        let id = EdgeId(self.edges.len());
        self.edges.push(Edge { source, target, stmt });
        self.locs[source.0].out_edges.push(id);
        self.locs[target.0].in_edges.push(id);
        id
    }

    pub fn set_init_loc(&mut self, loc: LocId) {
        assert!(loc.0 < self.locs.len(), "Unknown location {}", loc);
        self.init_loc = Some(loc);
    }

    pub fn set_error_loc(&mut self, loc: LocId) {
        assert!(loc.0 < self.locs.len(), "Unknown location {}", loc);
        self.error_loc = Some(loc);
    }

    pub fn build(self) -> Cfa {
        Cfa {
            locs: self.locs,
            edges: self.edges,
            init_loc: self.init_loc,
            error_loc: self.error_loc,
        }
    }
}
