//! Interval boxes: ordered vectors of named interval dimensions.

use crate::interval::Interval;
use boxsat_symbolic::Variable;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Ordered variable set with a stable index map, shared by every box of one
/// search. Indexing is total and bijective on the variable set.
#[derive(Debug)]
pub struct VariableRegistry {
    variables: Vec<Variable>,
    index: FxHashMap<Variable, usize>,
}

impl VariableRegistry {
    pub fn new(variables: impl IntoIterator<Item = Variable>) -> VariableRegistry {
        let variables: Vec<Variable> = variables.into_iter().collect();
        let index = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i))
            .collect();
        VariableRegistry { variables, index }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    #[inline]
    pub fn index_of(&self, v: &Variable) -> Option<usize> {
        self.index.get(v).copied()
    }

    #[inline]
    pub fn variable(&self, i: usize) -> &Variable {
        &self.variables[i]
    }

    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

/// An axis-aligned box over the registry's variables.
///
/// Boxes are value types: bisection and stack pushes copy the interval
/// vector, while the registry is shared. The box is set-empty iff any
/// component is empty; [`IntervalBox::set_empty`] canonicalises by emptying
/// every component.
#[derive(Clone)]
pub struct IntervalBox {
    registry: Arc<VariableRegistry>,
    values: Vec<Interval>,
}

impl IntervalBox {
    /// Build a box from `(variable, interval)` dimensions.
    pub fn new(dims: impl IntoIterator<Item = (Variable, Interval)>) -> IntervalBox {
        let (variables, values): (Vec<Variable>, Vec<Interval>) = dims.into_iter().unzip();
        IntervalBox {
            registry: Arc::new(VariableRegistry::new(variables)),
            values,
        }
    }

    /// Build a box over an existing registry.
    pub fn with_registry(registry: Arc<VariableRegistry>, values: Vec<Interval>) -> IntervalBox {
        assert_eq!(registry.len(), values.len(), "box dimension mismatch");
        IntervalBox { registry, values }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<VariableRegistry> {
        &self.registry
    }

    /// Number of dimensions.
    #[inline]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Interval {
        self.values[i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: Interval) {
        self.values[i] = value;
    }

    /// The component of `v`; panics if `v` is not a dimension of this box.
    pub fn interval(&self, v: &Variable) -> Interval {
        let i = self
            .registry
            .index_of(v)
            .unwrap_or_else(|| panic!("variable {v} is not a dimension of this box"));
        self.values[i]
    }

    #[inline]
    pub fn index_of(&self, v: &Variable) -> Option<usize> {
        self.registry.index_of(v)
    }

    #[inline]
    pub fn variable(&self, i: usize) -> &Variable {
        self.registry.variable(i)
    }

    #[inline]
    pub fn values(&self) -> &[Interval] {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [Interval] {
        &mut self.values
    }

    /// Set-emptiness: true iff any component is empty.
    pub fn is_empty(&self) -> bool {
        self.values.iter().any(|iv| iv.is_empty())
    }

    /// Canonicalise to the empty box.
    pub fn set_empty(&mut self) {
        self.values.fill(Interval::EMPTY);
    }

    /// The widest bisectable dimension, if any.
    pub fn max_diam(&self) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, iv) in self.values.iter().enumerate() {
            if !iv.is_bisectable() {
                continue;
            }
            let d = iv.diam();
            if best.map_or(true, |(_, bd)| d > bd) {
                best = Some((i, d));
            }
        }
        best
    }

    /// Split at the midpoint of dimension `dim` into two sub-boxes whose
    /// union is this box.
    pub fn bisect(&self, dim: usize) -> (IntervalBox, IntervalBox) {
        self.bisect_at(dim, self.values[dim].mid())
    }

    /// Split dimension `dim` at `point`.
    pub fn bisect_at(&self, dim: usize, point: f64) -> (IntervalBox, IntervalBox) {
        let (lo, hi) = self.values[dim].bisect_at(point);
        let mut left = self.clone();
        left.values[dim] = lo;
        let mut right = self.clone();
        right.values[dim] = hi;
        (left, right)
    }

    /// Largest diameter over all dimensions (0 for a zero-dimensional box).
    pub fn max_width(&self) -> f64 {
        self.values.iter().map(|iv| iv.diam()).fold(0.0, f64::max)
    }

    /// Componentwise intersection with a box over the same registry.
    pub fn intersect_with(&mut self, other: &IntervalBox) {
        debug_assert!(Arc::ptr_eq(&self.registry, &other.registry));
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v = v.intersect(*o);
        }
    }
}

impl PartialEq for IntervalBox {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry) && self.values == other.values
    }
}

impl fmt::Display for IntervalBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, iv) in self.values.iter().enumerate() {
            writeln!(f, "{} : {}", self.registry.variable(i), iv)?;
        }
        Ok(())
    }
}

impl fmt::Debug for IntervalBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntervalBox{{")?;
        for (i, iv) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", self.registry.variable(i), iv)?;
        }
        write!(f, "}}")
    }
}
