use std::cell::OnceCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::expr::Expr;

/// Abstract state of the predicate domain: a conjunction of predicates.
///
/// The empty set is the top element. States are immutable; the formula is built on first
/// use and the hash is computed once at construction.
#[derive(Clone)]
pub struct PredState {
    preds: BTreeSet<Expr>,
    hash: u64,
    expr: OnceCell<Expr>,
}

impl PredState {
    pub fn of(preds: impl IntoIterator<Item = Expr>) -> Self {
        let preds: BTreeSet<Expr> = preds.into_iter().collect();
        let mut hasher = DefaultHasher::new();
        preds.hash(&mut hasher);
        Self {
            preds,
            hash: hasher.finish(),
            expr: OnceCell::new(),
        }
    }

    pub fn top() -> Self {
        Self::of([])
    }

    pub fn is_top(&self) -> bool {
        self.preds.is_empty()
    }

    pub fn predicates(&self) -> &BTreeSet<Expr> {
        &self.preds
    }

    pub fn to_expr(&self) -> &Expr {
        self.expr.get_or_init(|| match self.preds.len() {
            0 => Expr::TRUE,
            1 => self.preds.iter().next().cloned().unwrap_or(Expr::TRUE),
            _ => Expr::And(self.preds.iter().cloned().collect()),
        })
    }
}

impl PartialEq for PredState {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.preds == other.preds
    }
}

impl Eq for PredState {}

impl Hash for PredState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for PredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.preds.iter().map(|p| p.to_string())).finish()
    }
}

impl fmt::Display for PredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PredState(")?;
        for (i, p) in self.preds.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn x() -> Expr {
        Expr::var("x")
    }

    #[test]
    fn test_top_identity() {
        let a = PredState::top();
        let b = PredState::of(Vec::new());
        assert_eq!(a, b);
        assert!(a.is_top());
        assert_eq!(a.to_expr(), &Expr::TRUE);

        let set: HashSet<PredState> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_order_irrelevant() {
        let p = Expr::gt(x(), Expr::int(0));
        let q = Expr::lt(x(), Expr::int(10));
        let a = PredState::of([p.clone(), q.clone()]);
        let b = PredState::of([q, p.clone(), p]);
        assert_eq!(a, b);
        assert_eq!(a.predicates().len(), 2);
        assert_eq!(a.to_expr(), b.to_expr());
    }

    #[test]
    fn test_to_expr() {
        let p = Expr::gt(x(), Expr::int(0));
        assert_eq!(PredState::of([p.clone()]).to_expr(), &p);

        let q = Expr::eq(Expr::var("y"), Expr::int(1));
        let state = PredState::of([p.clone(), q.clone()]);
        assert!(matches!(state.to_expr(), Expr::And(es) if es.len() == 2));
        // Cached: same allocation on the second call.
        assert!(std::ptr::eq(state.to_expr(), state.to_expr()));
    }

    #[test]
    fn test_display() {
        assert_eq!(PredState::top().to_string(), "PredState()");
        let state = PredState::of([Expr::gt(x(), Expr::int(0))]);
        assert_eq!(state.to_string(), "PredState(x > 0)");
    }
}
