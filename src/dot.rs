//! ARG to DOT (Graphviz) conversion.
//!
//! Each ARG node is drawn with its location name and abstract state. Tree edges are solid
//! and labelled with the statement of the CFA edge, coverage edges are dashed and point
//! from the covered node to its coverer. Nodes at the error location are highlighted.
//!
//! ```
//! use cegar_rs::arg::Arg;
//! use cegar_rs::cfa::{CfaBuilder, Stmt};
//! use cegar_rs::domain::PredState;
//!
//! let mut builder = CfaBuilder::new();
//! let init = builder.create_loc("init");
//! let exit = builder.create_loc("exit");
//! let edge = builder.create_edge(init, exit, Stmt::Skip);
//! builder.set_init_loc(init);
//! let cfa = builder.build();
//!
//! let mut arg = Arg::new(init, PredState::top());
//! arg.create_child(arg.root(), edge, exit, PredState::top());
//!
//! let dot = arg.to_dot(&cfa).unwrap();
//! assert!(dot.contains("0 -> 1"));
//! ```

use std::fmt::Write as _;

use crate::arg::Arg;
use crate::cfa::Cfa;

#[derive(Debug, Clone)]
pub struct DotConfig {
    pub node_shape: &'static str,
    pub covered_edge_style: &'static str,
    /// Fill color of nodes at the error location.
    pub error_color: &'static str,
    /// Include abstract states in node labels.
    pub show_states: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            node_shape: "box",
            covered_edge_style: "dashed",
            error_color: "red",
            show_states: true,
        }
    }
}

/// Quote `s` for use inside a DOT string literal.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Arg {
    pub fn to_dot(&self, cfa: &Cfa) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(cfa, &DotConfig::default())
    }

    pub fn to_dot_with_config(&self, cfa: &Cfa, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph arg {{")?;
        writeln!(dot, "node [shape={}];", config.node_shape)?;

        for id in self.nodes() {
            let node = self.node(id);
            let mut label = format!("{}: {}", id, cfa.loc(node.loc()).name());
            if config.show_states {
                label.push_str("\\n");
                label.push_str(&escape(&node.state().to_string()));
            }
            let mut attrs = format!("label=\"{}\"", label);
            if Some(node.loc()) == cfa.error_loc() {
                write!(attrs, ", style=filled, fillcolor={}", config.error_color)?;
            }
            if node.is_root() {
                attrs.push_str(", peripheries=2");
            }
            writeln!(dot, "{} [{}];", id.index(), attrs)?;
        }

        for id in self.nodes() {
            let node = self.node(id);
            for &child in node.children() {
                let edge = self.node(child).in_edge().map(|e| cfa.edge(e).stmt().to_string());
                writeln!(
                    dot,
                    "{} -> {} [label=\"{}\"];",
                    id.index(),
                    child.index(),
                    escape(edge.as_deref().unwrap_or(""))
                )?;
            }
            if let Some(coverer) = node.covered_by() {
                writeln!(
                    dot,
                    "{} -> {} [style={}, constraint=false];",
                    id.index(),
                    coverer.index(),
                    config.covered_edge_style
                )?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::{CfaBuilder, Stmt};
    use crate::domain::PredState;
    use crate::expr::Expr;

    #[test]
    fn test_to_dot() {
        let mut builder = CfaBuilder::new();
        let l0 = builder.create_loc("l0");
        let err = builder.create_loc("err");
        let e0 = builder.create_edge(l0, err, Stmt::assume(Expr::gt(Expr::var("x"), Expr::int(0))));
        let e1 = builder.create_edge(err, err, Stmt::Skip);
        builder.set_init_loc(l0);
        builder.set_error_loc(err);
        let cfa = builder.build();

        let mut arg = Arg::new(l0, PredState::top());
        let a = arg.create_child(arg.root(), e0, err, PredState::top());
        let b = arg.create_child(a, e1, err, PredState::top());
        arg.cover_with(b, a);

        let dot = arg.to_dot(&cfa).unwrap();
        assert!(dot.starts_with("digraph arg {"));
        assert!(dot.contains("0 -> 1 [label=\"assume x > 0\"];"));
        assert!(dot.contains("2 -> 1 [style=dashed, constraint=false];"));
        assert!(dot.contains("fillcolor=red"));
        assert!(dot.contains("N0: l0\\nPredState()"));
    }

    #[test]
    fn test_without_states() {
        let mut builder = CfaBuilder::new();
        let l0 = builder.create_loc("start");
        builder.set_init_loc(l0);
        let cfa = builder.build();
        let arg = Arg::new(l0, PredState::top());
        let config = DotConfig {
            show_states: false,
            ..DotConfig::default()
        };
        let dot = arg.to_dot_with_config(&cfa, &config).unwrap();
        assert!(dot.contains("0 [label=\"N0: start\", peripheries=2];"));
    }
}
