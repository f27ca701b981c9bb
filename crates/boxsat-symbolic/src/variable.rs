//! Named variables with process-unique identities.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Sort of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Continuous,
    Integer,
    Boolean,
}

/// A named variable.
///
/// Identity is the process-unique `id`; two variables with the same name are
/// distinct unless they are clones of one another. Cloning is cheap (the name
/// is shared).
#[derive(Clone)]
pub struct Variable {
    id: u64,
    name: Arc<str>,
    kind: VariableKind,
}

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(1);

impl Variable {
    /// Create a fresh variable of the given kind.
    pub fn new(name: impl Into<Arc<str>>, kind: VariableKind) -> Self {
        Variable {
            id: NEXT_VARIABLE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            name: name.into(),
            kind,
        }
    }

    /// Create a fresh continuous (real-valued) variable.
    pub fn continuous(name: impl Into<Arc<str>>) -> Self {
        Variable::new(name, VariableKind::Continuous)
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> VariableKind {
        self.kind
    }
}

impl PartialEq for Variable {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Variable {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_variables_are_distinct() {
        let x1 = Variable::continuous("x");
        let x2 = Variable::continuous("x");
        assert_ne!(x1, x2);
        assert_eq!(x1, x1.clone());
    }

    #[test]
    fn ordering_follows_creation() {
        let a = Variable::continuous("a");
        let b = Variable::continuous("b");
        assert!(a < b);
    }
}
