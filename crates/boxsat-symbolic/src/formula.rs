//! Hash-consed relational/Boolean formula cells.
//!
//! The solver core only ever inspects atomic relational constraints and the
//! `forall` marker; the Boolean connectives exist so preprocessed input can be
//! represented and point-evaluated.

use crate::environment::Environment;
use crate::error::SymbolicError;
use crate::expression::{Expression, ExpressionSubstitution};
use crate::intern::Interner;
use crate::variable::Variable;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Substitution of Boolean variables by formulas.
pub type FormulaSubstitution = FxHashMap<Variable, Formula>;

/// Relational operators of atomic constraints `lhs ⋈ rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalOp {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl RelationalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelationalOp::Eq => "==",
            RelationalOp::Neq => "!=",
            RelationalOp::Lt => "<",
            RelationalOp::Leq => "<=",
            RelationalOp::Gt => ">",
            RelationalOp::Geq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaNode {
    True,
    False,
    Relational {
        op: RelationalOp,
        lhs: Expression,
        rhs: Expression,
    },
    Not(Formula),
    And(Formula, Formula),
    Or(Formula, Formula),
    Forall {
        variables: Vec<Variable>,
        body: Formula,
    },
}

#[derive(Debug)]
pub(crate) struct FormulaCell {
    node: FormulaNode,
    hash: u64,
}

/// A shared, immutable formula.
#[derive(Clone)]
pub struct Formula(Arc<FormulaCell>);

static FORMULA_INTERNER: OnceLock<Interner<FormulaCell>> = OnceLock::new();

fn interner() -> &'static Interner<FormulaCell> {
    FORMULA_INTERNER.get_or_init(Interner::new)
}

fn structural_hash(node: &FormulaNode) -> u64 {
    let mut h = FxHasher::default();
    match node {
        FormulaNode::True => h.write_u8(0),
        FormulaNode::False => h.write_u8(1),
        FormulaNode::Relational { op, lhs, rhs } => {
            h.write_u8(2);
            op.hash(&mut h);
            h.write_u64(lhs.hash_value());
            h.write_u64(rhs.hash_value());
        }
        FormulaNode::Not(f) => {
            h.write_u8(3);
            h.write_u64(f.hash_value());
        }
        FormulaNode::And(a, b) => {
            h.write_u8(4);
            h.write_u64(a.hash_value());
            h.write_u64(b.hash_value());
        }
        FormulaNode::Or(a, b) => {
            h.write_u8(5);
            h.write_u64(a.hash_value());
            h.write_u64(b.hash_value());
        }
        FormulaNode::Forall { variables, body } => {
            h.write_u8(6);
            for v in variables {
                h.write_u64(v.id());
            }
            h.write_u64(body.hash_value());
        }
    }
    h.finish()
}

fn intern(node: FormulaNode) -> Formula {
    let hash = structural_hash(&node);
    let cell = interner().intern(
        hash,
        |cell| cell.node == node,
        || {
            Arc::new(FormulaCell {
                hash,
                node: node.clone(),
            })
        },
    );
    Formula(cell)
}

impl Formula {
    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn bool_constant(b: bool) -> Formula {
        intern(if b { FormulaNode::True } else { FormulaNode::False })
    }

    fn relational(op: RelationalOp, lhs: Expression, rhs: Expression) -> Formula {
        intern(FormulaNode::Relational { op, lhs, rhs })
    }

    pub fn eq(lhs: Expression, rhs: Expression) -> Formula {
        Formula::relational(RelationalOp::Eq, lhs, rhs)
    }

    pub fn neq(lhs: Expression, rhs: Expression) -> Formula {
        Formula::relational(RelationalOp::Neq, lhs, rhs)
    }

    pub fn lt(lhs: Expression, rhs: Expression) -> Formula {
        Formula::relational(RelationalOp::Lt, lhs, rhs)
    }

    pub fn leq(lhs: Expression, rhs: Expression) -> Formula {
        Formula::relational(RelationalOp::Leq, lhs, rhs)
    }

    pub fn gt(lhs: Expression, rhs: Expression) -> Formula {
        Formula::relational(RelationalOp::Gt, lhs, rhs)
    }

    pub fn geq(lhs: Expression, rhs: Expression) -> Formula {
        Formula::relational(RelationalOp::Geq, lhs, rhs)
    }

    /// Negation, with double-negation and constant folding.
    pub fn not(f: Formula) -> Formula {
        match f.node() {
            FormulaNode::True => Formula::bool_constant(false),
            FormulaNode::False => Formula::bool_constant(true),
            FormulaNode::Not(inner) => inner.clone(),
            _ => intern(FormulaNode::Not(f)),
        }
    }

    pub fn and(a: Formula, b: Formula) -> Formula {
        if a.is_false() || b.is_false() {
            return Formula::bool_constant(false);
        }
        if a.is_true() {
            return b;
        }
        if b.is_true() {
            return a;
        }
        intern(FormulaNode::And(a, b))
    }

    pub fn or(a: Formula, b: Formula) -> Formula {
        if a.is_true() || b.is_true() {
            return Formula::bool_constant(true);
        }
        if a.is_false() {
            return b;
        }
        if b.is_false() {
            return a;
        }
        intern(FormulaNode::Or(a, b))
    }

    pub fn forall(variables: Vec<Variable>, body: Formula) -> Formula {
        intern(FormulaNode::Forall { variables, body })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn node(&self) -> &FormulaNode {
        &self.0.node
    }

    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.0.hash
    }

    pub fn is_true(&self) -> bool {
        matches!(self.node(), FormulaNode::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self.node(), FormulaNode::False)
    }

    /// Whether this is a universally quantified formula.
    pub fn is_forall(&self) -> bool {
        matches!(self.node(), FormulaNode::Forall { .. })
    }

    /// Whether this is an atomic relational constraint.
    pub fn is_relational(&self) -> bool {
        matches!(self.node(), FormulaNode::Relational { .. })
    }

    /// The free variables (quantified variables are bound in their body).
    pub fn free_variables(&self) -> FxHashSet<Variable> {
        let mut out = FxHashSet::default();
        self.collect_free_variables(&mut out);
        out
    }

    fn collect_free_variables(&self, out: &mut FxHashSet<Variable>) {
        match self.node() {
            FormulaNode::True | FormulaNode::False => {}
            FormulaNode::Relational { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            FormulaNode::Not(f) => f.collect_free_variables(out),
            FormulaNode::And(a, b) | FormulaNode::Or(a, b) => {
                a.collect_free_variables(out);
                b.collect_free_variables(out);
            }
            FormulaNode::Forall { variables, body } => {
                let mut inner = body.free_variables();
                for v in variables {
                    inner.remove(v);
                }
                out.extend(inner);
            }
        }
    }

    // ------------------------------------------------------------------
    // Substitution and evaluation
    // ------------------------------------------------------------------

    pub fn substitute(
        &self,
        exprs: &ExpressionSubstitution,
        formulas: &FormulaSubstitution,
    ) -> Result<Formula, SymbolicError> {
        match self.node() {
            FormulaNode::True | FormulaNode::False => Ok(self.clone()),
            FormulaNode::Relational { op, lhs, rhs } => Ok(Formula::relational(
                *op,
                lhs.substitute(exprs, formulas)?,
                rhs.substitute(exprs, formulas)?,
            )),
            FormulaNode::Not(f) => Ok(Formula::not(f.substitute(exprs, formulas)?)),
            FormulaNode::And(a, b) => Ok(Formula::and(
                a.substitute(exprs, formulas)?,
                b.substitute(exprs, formulas)?,
            )),
            FormulaNode::Or(a, b) => Ok(Formula::or(
                a.substitute(exprs, formulas)?,
                b.substitute(exprs, formulas)?,
            )),
            FormulaNode::Forall { variables, body } => {
                // Bound variables shadow the substitution.
                let mut exprs = exprs.clone();
                let mut formulas = formulas.clone();
                for v in variables {
                    exprs.remove(v);
                    formulas.remove(v);
                }
                Ok(Formula::forall(
                    variables.clone(),
                    body.substitute(&exprs, &formulas)?,
                ))
            }
        }
    }

    /// Evaluate at a point. Quantified formulas cannot be point-evaluated.
    pub fn evaluate(&self, env: &Environment) -> Result<bool, SymbolicError> {
        match self.node() {
            FormulaNode::True => Ok(true),
            FormulaNode::False => Ok(false),
            FormulaNode::Relational { op, lhs, rhs } => {
                let l = lhs.evaluate(env)?;
                let r = rhs.evaluate(env)?;
                Ok(match op {
                    RelationalOp::Eq => l == r,
                    RelationalOp::Neq => l != r,
                    RelationalOp::Lt => l < r,
                    RelationalOp::Leq => l <= r,
                    RelationalOp::Gt => l > r,
                    RelationalOp::Geq => l >= r,
                })
            }
            FormulaNode::Not(f) => Ok(!f.evaluate(env)?),
            FormulaNode::And(a, b) => Ok(a.evaluate(env)? && b.evaluate(env)?),
            FormulaNode::Or(a, b) => Ok(a.evaluate(env)? || b.evaluate(env)?),
            FormulaNode::Forall { .. } => Err(SymbolicError::QuantifiedEvaluation),
        }
    }

    // ------------------------------------------------------------------
    // Structural total order
    // ------------------------------------------------------------------

    fn rank(&self) -> u32 {
        match self.node() {
            FormulaNode::True => 0,
            FormulaNode::False => 1,
            FormulaNode::Relational { .. } => 2,
            FormulaNode::Not(_) => 3,
            FormulaNode::And(..) => 4,
            FormulaNode::Or(..) => 5,
            FormulaNode::Forall { .. } => 6,
        }
    }

    pub fn structural_cmp(&self, other: &Formula) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (self.node(), other.node()) {
            (
                FormulaNode::Relational { op: o1, lhs: l1, rhs: r1 },
                FormulaNode::Relational { op: o2, lhs: l2, rhs: r2 },
            ) => (*o1 as u8)
                .cmp(&(*o2 as u8))
                .then_with(|| l1.structural_cmp(l2))
                .then_with(|| r1.structural_cmp(r2)),
            (FormulaNode::Not(a), FormulaNode::Not(b)) => a.structural_cmp(b),
            (FormulaNode::And(a1, a2), FormulaNode::And(b1, b2))
            | (FormulaNode::Or(a1, a2), FormulaNode::Or(b1, b2)) => a1
                .structural_cmp(b1)
                .then_with(|| a2.structural_cmp(b2)),
            (
                FormulaNode::Forall { variables: v1, body: b1 },
                FormulaNode::Forall { variables: v2, body: b2 },
            ) => v1.cmp(v2).then_with(|| b1.structural_cmp(b2)),
            _ => unreachable!("structural_cmp on mismatched kinds with equal rank"),
        }
    }
}

impl PartialEq for Formula {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Formula {}

impl Hash for Formula {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl PartialOrd for Formula {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Formula {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.structural_cmp(other)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            FormulaNode::True => write!(f, "true"),
            FormulaNode::False => write!(f, "false"),
            FormulaNode::Relational { op, lhs, rhs } => {
                write!(f, "({lhs} {} {rhs})", op.symbol())
            }
            FormulaNode::Not(inner) => write!(f, "!({inner})"),
            FormulaNode::And(a, b) => write!(f, "({a} and {b})"),
            FormulaNode::Or(a, b) => write!(f, "({a} or {b})"),
            FormulaNode::Forall { variables, body } => {
                write!(f, "forall([")?;
                for (i, v) in variables.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "], {body})")
            }
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    #[test]
    fn relational_formulas_are_interned() {
        let x = Variable::continuous("x");
        let a = Formula::leq(Expression::variable(&x), Expression::constant(1.0));
        let b = Formula::leq(Expression::variable(&x), Expression::constant(1.0));
        assert_eq!(a, b);
    }

    #[test]
    fn double_negation_folds() {
        let x = Variable::continuous("x");
        let f = Formula::lt(Expression::variable(&x), Expression::zero());
        assert_eq!(Formula::not(Formula::not(f.clone())), f);
    }

    #[test]
    fn forall_binds_variables() {
        let x = Variable::continuous("x");
        let y = Variable::continuous("y");
        let body = Formula::leq(Expression::variable(&x), Expression::variable(&y));
        let quantified = Formula::forall(vec![x.clone()], body);
        assert!(quantified.is_forall());
        let free = quantified.free_variables();
        assert!(!free.contains(&x));
        assert!(free.contains(&y));
    }

    #[test]
    fn point_evaluation() {
        let x = Variable::continuous("x");
        let f = Formula::lt(
            Expression::mul(Expression::variable(&x), Expression::variable(&x)),
            Expression::constant(2.0),
        );
        let mut env = Environment::new();
        env.insert(x.clone(), 1.0);
        assert!(f.evaluate(&env).unwrap());
        env.insert(x, 2.0);
        assert!(!f.evaluate(&env).unwrap());
    }
}
