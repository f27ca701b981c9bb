//! Point assignments from variables to doubles.

use crate::variable::Variable;
use rustc_hash::FxHashMap;

/// A (partial) assignment of variables to values, used by scalar evaluation.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: FxHashMap<Variable, f64>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn insert(&mut self, var: Variable, value: f64) {
        self.values.insert(var, value);
    }

    #[inline]
    pub fn get(&self, var: &Variable) -> Option<f64> {
        self.values.get(var).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, f64)> {
        self.values.iter().map(|(v, x)| (v, *x))
    }
}

impl FromIterator<(Variable, f64)> for Environment {
    fn from_iter<T: IntoIterator<Item = (Variable, f64)>>(iter: T) -> Self {
        Environment {
            values: iter.into_iter().collect(),
        }
    }
}
