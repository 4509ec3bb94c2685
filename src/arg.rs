//! Abstract reachability graph.
//!
//! The ARG is an arena of [`ArgNode`]s addressed by [`ArgNodeId`]. Parent, child and
//! coverage links are indices, so the graph owns every node and nothing points back into
//! it. Nodes are only ever appended; after creation the only change a node sees is gaining
//! children or being covered.

use std::fmt;

use crate::cfa::{EdgeId, LocId};
use crate::domain::PredState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgNodeId(usize);

impl ArgNodeId {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn from_index(index: usize) -> Self {
        ArgNodeId(index)
    }
}

impl fmt::Display for ArgNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ArgNode {
    loc: LocId,
    state: PredState,
    /// Parent and the edge that produced this node; `None` only for the root.
    parent: Option<(ArgNodeId, EdgeId)>,
    children: Vec<ArgNodeId>,
    covered_by: Option<ArgNodeId>,
    depth: usize,
}

impl ArgNode {
    pub fn loc(&self) -> LocId {
        self.loc
    }

    pub fn state(&self) -> &PredState {
        &self.state
    }

    pub fn parent(&self) -> Option<ArgNodeId> {
        self.parent.map(|(p, _)| p)
    }

    pub fn in_edge(&self) -> Option<EdgeId> {
        self.parent.map(|(_, e)| e)
    }

    pub fn children(&self) -> &[ArgNodeId] {
        &self.children
    }

    pub fn covered_by(&self) -> Option<ArgNodeId> {
        self.covered_by
    }

    pub fn is_covered(&self) -> bool {
        self.covered_by.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of edges from the root.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Path from the root to some node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTrace {
    nodes: Vec<ArgNodeId>,
    edges: Vec<EdgeId>,
}

impl ArgTrace {
    /// Nodes from the root, one more than [`edges`](ArgTrace::edges).
    pub fn nodes(&self) -> &[ArgNodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Arg {
    nodes: Vec<ArgNode>,
}

impl Arg {
    /// Create a graph holding only the root.
    pub fn new(init_loc: LocId, init_state: PredState) -> Self {
        Self {
            nodes: vec![ArgNode {
                loc: init_loc,
                state: init_state,
                parent: None,
                children: Vec::new(),
                covered_by: None,
                depth: 0,
            }],
        }
    }

    pub fn root(&self) -> ArgNodeId {
        ArgNodeId(0)
    }

    pub fn node(&self, id: ArgNodeId) -> &ArgNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = ArgNodeId> + '_ {
        (0..self.nodes.len()).map(ArgNodeId)
    }

    pub fn is_covered(&self, id: ArgNodeId) -> bool {
        self.nodes[id.0].is_covered()
    }

    pub fn num_covered(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_covered()).count()
    }

    /// Append a successor of `parent` reached through `edge`.
    pub fn create_child(&mut self, parent: ArgNodeId, edge: EdgeId, loc: LocId, state: PredState) -> ArgNodeId {
        assert!(!self.is_covered(parent), "Covered node {} cannot be expanded", parent);

        let id = ArgNodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        self.nodes.push(ArgNode {
            loc,
            state,
            parent: Some((parent, edge)),
            children: Vec::new(),
            covered_by: None,
            depth,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Record that `coverer` subsumes `node`.
    pub fn cover_with(&mut self, node: ArgNodeId, coverer: ArgNodeId) {
        assert_ne!(node, coverer, "Node {} cannot cover itself", node);
        assert!(!self.is_covered(node), "Node {} is already covered", node);
        assert!(!self.is_covered(coverer), "Covered node {} cannot cover {}", coverer, node);
        assert!(
            self.nodes[node.0].children.is_empty(),
            "Expanded node {} cannot be covered",
            node
        );
        assert_eq!(
            self.nodes[node.0].loc, self.nodes[coverer.0].loc,
            "Coverage across locations: {} by {}",
            node, coverer
        );

        self.nodes[node.0].covered_by = Some(coverer);
    }

    /// Path from the root to `node`, following parent links.
    pub fn trace_to(&self, node: ArgNodeId) -> ArgTrace {
        let mut nodes = vec![node];
        let mut edges = Vec::new();
        let mut current = node;
        while let Some((parent, edge)) = self.nodes[current.0].parent {
            nodes.push(parent);
            edges.push(edge);
            current = parent;
        }
        nodes.reverse();
        edges.reverse();
        ArgTrace { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::{CfaBuilder, Stmt};
    use crate::expr::Expr;

    fn setup() -> (LocId, LocId, EdgeId, EdgeId) {
        let mut builder = CfaBuilder::new();
        let l0 = builder.create_loc("l0");
        let l1 = builder.create_loc("l1");
        let e0 = builder.create_edge(l0, l1, Stmt::Skip);
        let e1 = builder.create_edge(l1, l1, Stmt::Skip);
        (l0, l1, e0, e1)
    }

    #[test]
    fn test_root() {
        let (l0, ..) = setup();
        let arg = Arg::new(l0, PredState::top());
        let root = arg.root();
        assert_eq!(arg.len(), 1);
        assert!(arg.node(root).is_root());
        assert_eq!(arg.node(root).parent(), None);
        assert_eq!(arg.node(root).in_edge(), None);
        assert_eq!(arg.node(root).depth(), 0);
        assert!(arg.trace_to(root).is_empty());
    }

    #[test]
    fn test_children_and_trace() {
        let (l0, l1, e0, e1) = setup();
        let mut arg = Arg::new(l0, PredState::top());
        let root = arg.root();
        let a = arg.create_child(root, e0, l1, PredState::top());
        let b = arg.create_child(a, e1, l1, PredState::of([Expr::gt(Expr::var("x"), Expr::int(0))]));

        assert_eq!(arg.node(root).children(), &[a]);
        assert_eq!(arg.node(b).parent(), Some(a));
        assert_eq!(arg.node(b).in_edge(), Some(e1));
        assert_eq!(arg.node(b).depth(), 2);

        let trace = arg.trace_to(b);
        assert_eq!(trace.nodes(), &[root, a, b]);
        assert_eq!(trace.edges(), &[e0, e1]);
        assert_eq!(trace.len(), 2);
        assert_eq!(arg.nodes().collect::<Vec<_>>(), vec![root, a, b]);
    }

    #[test]
    fn test_cover() {
        let (l0, l1, e0, e1) = setup();
        let mut arg = Arg::new(l0, PredState::top());
        let a = arg.create_child(arg.root(), e0, l1, PredState::top());
        let b = arg.create_child(a, e1, l1, PredState::top());
        arg.cover_with(b, a);
        assert!(arg.is_covered(b));
        assert_eq!(arg.node(b).covered_by(), Some(a));
        assert_eq!(arg.num_covered(), 1);
    }

    #[test]
    #[should_panic(expected = "cannot cover")]
    fn test_cover_chain() {
        let (l0, l1, e0, e1) = setup();
        let mut arg = Arg::new(l0, PredState::top());
        let a = arg.create_child(arg.root(), e0, l1, PredState::top());
        let b = arg.create_child(a, e1, l1, PredState::top());
        let c = arg.create_child(a, e1, l1, PredState::top());
        arg.cover_with(b, a);
        arg.cover_with(c, b);
    }

    #[test]
    #[should_panic(expected = "cannot be expanded")]
    fn test_expand_covered() {
        let (l0, l1, e0, e1) = setup();
        let mut arg = Arg::new(l0, PredState::top());
        let a = arg.create_child(arg.root(), e0, l1, PredState::top());
        let b = arg.create_child(a, e1, l1, PredState::top());
        arg.cover_with(b, a);
        arg.create_child(b, e1, l1, PredState::top());
    }
}
