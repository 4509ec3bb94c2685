use std::collections::BTreeSet;
use std::fmt;

use crate::expr::Expr;

/// The predicates the abstraction may track. Shared by every location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredPrecision {
    preds: BTreeSet<Expr>,
}

impl PredPrecision {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(preds: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            preds: preds.into_iter().collect(),
        }
    }

    /// Set union.
    pub fn join(&self, other: &PredPrecision) -> PredPrecision {
        Self {
            preds: self.preds.union(&other.preds).cloned().collect(),
        }
    }

    pub fn predicates(&self) -> &BTreeSet<Expr> {
        &self.preds
    }

    pub fn len(&self) -> usize {
        self.preds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    pub fn is_subset_of(&self, other: &PredPrecision) -> bool {
        self.preds.is_subset(&other.preds)
    }
}

impl fmt::Display for PredPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, p) in self.preds.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: i64) -> Expr {
        Expr::gt(Expr::var("x"), Expr::int(n))
    }

    #[test]
    fn test_join_laws() {
        let a = PredPrecision::of([p(0), p(1)]);
        let b = PredPrecision::of([p(1), p(2)]);
        let c = PredPrecision::of([p(3)]);

        assert_eq!(a.join(&b), b.join(&a));
        assert_eq!(a.join(&b).join(&c), a.join(&b.join(&c)));
        assert_eq!(a.join(&a), a);
        assert_eq!(a.join(&PredPrecision::empty()), a);

        let ab = a.join(&b);
        assert_eq!(ab.len(), 3);
        assert!(a.is_subset_of(&ab));
        assert!(b.is_subset_of(&ab));
        assert!(!ab.is_subset_of(&a));
    }

    #[test]
    fn test_display() {
        assert_eq!(PredPrecision::empty().to_string(), "{}");
        assert_eq!(PredPrecision::of([p(0)]).to_string(), "{x > 0}");
    }
}
