//! Hash-consed algebraic expression cells.
//!
//! An [`Expression`] is a cheap clone of an `Arc` to an immutable cell. All
//! constructors go through the global weak interner, so structurally equal
//! expressions share one cell and equality is pointer identity. Constructors
//! perform light canonicalisation only: constant folding, unit/absorbing
//! elements, and ordering of commutative operands.

use crate::environment::Environment;
use crate::error::SymbolicError;
use crate::formula::{Formula, FormulaSubstitution};
use crate::intern::Interner;
use crate::variable::{Variable, VariableKind};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Substitution of variables by expressions.
pub type ExpressionSubstitution = FxHashMap<Variable, Expression>;

/// Unary primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Log,
    Abs,
    Exp,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Log => "log",
            UnaryOp::Abs => "abs",
            UnaryOp::Exp => "exp",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Tanh => "tanh",
        }
    }
}

/// Binary primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Mul,
    Div,
    Pow,
    Atan2,
    Min,
    Max,
}

impl BinaryOp {
    fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::Min | BinaryOp::Max
        )
    }
}

/// The cell payload. Children of an interned node are themselves interned, so
/// the derived equality (pointer identity on children) is structural equality.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Variable(Variable),
    Constant(f64),
    RealConstant { lb: f64, ub: f64, use_lb: bool },
    NaN,
    Unary(UnaryOp, Expression),
    Binary(BinaryOp, Expression, Expression),
    IfThenElse(Formula, Expression, Expression),
    UninterpretedFunction { name: Arc<str>, arguments: Vec<Variable> },
}

#[derive(Debug)]
pub(crate) struct ExprCell {
    node: ExprNode,
    hash: u64,
    is_polynomial: bool,
}

/// A shared, immutable algebraic expression.
#[derive(Clone)]
pub struct Expression(Arc<ExprCell>);

static EXPR_INTERNER: OnceLock<Interner<ExprCell>> = OnceLock::new();

fn interner() -> &'static Interner<ExprCell> {
    EXPR_INTERNER.get_or_init(Interner::new)
}

fn structural_hash(node: &ExprNode) -> u64 {
    let mut h = FxHasher::default();
    match node {
        ExprNode::Variable(v) => {
            h.write_u8(0);
            h.write_u64(v.id());
        }
        ExprNode::Constant(c) => {
            h.write_u8(1);
            h.write_u64(c.to_bits());
        }
        ExprNode::RealConstant { lb, ub, use_lb } => {
            h.write_u8(2);
            h.write_u64(lb.to_bits());
            h.write_u64(ub.to_bits());
            h.write_u8(*use_lb as u8);
        }
        ExprNode::NaN => h.write_u8(3),
        ExprNode::Unary(op, e) => {
            h.write_u8(4);
            op.hash(&mut h);
            h.write_u64(e.hash_value());
        }
        ExprNode::Binary(op, a, b) => {
            h.write_u8(5);
            op.hash(&mut h);
            h.write_u64(a.hash_value());
            h.write_u64(b.hash_value());
        }
        ExprNode::IfThenElse(c, t, e) => {
            h.write_u8(6);
            h.write_u64(c.hash_value());
            h.write_u64(t.hash_value());
            h.write_u64(e.hash_value());
        }
        ExprNode::UninterpretedFunction { name, arguments } => {
            h.write_u8(7);
            h.write(name.as_bytes());
            for v in arguments {
                h.write_u64(v.id());
            }
        }
    }
    h.finish()
}

fn compute_is_polynomial(node: &ExprNode) -> bool {
    match node {
        ExprNode::Variable(_) | ExprNode::Constant(_) | ExprNode::RealConstant { .. } => true,
        ExprNode::NaN | ExprNode::Unary(..) => false,
        ExprNode::Binary(BinaryOp::Add | BinaryOp::Mul, a, b) => {
            a.is_polynomial() && b.is_polynomial()
        }
        ExprNode::Binary(BinaryOp::Pow, base, exponent) => {
            base.is_polynomial()
                && matches!(exponent.as_constant(),
                            Some(n) if n >= 0.0 && n.fract() == 0.0)
        }
        ExprNode::Binary(BinaryOp::Div, num, den) => {
            num.is_polynomial() && den.as_constant().is_some()
        }
        _ => false,
    }
}

fn intern(node: ExprNode) -> Expression {
    let hash = structural_hash(&node);
    let cell = interner().intern(
        hash,
        |cell| cell.node == node,
        || {
            Arc::new(ExprCell {
                is_polynomial: compute_is_polynomial(&node),
                hash,
                node: node.clone(),
            })
        },
    );
    Expression(cell)
}

impl Expression {
    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// The real variable `v` as an expression.
    ///
    /// # Panics
    ///
    /// Panics if `v` has Boolean sort: Boolean variables may not appear in a
    /// real expression context.
    pub fn variable(v: &Variable) -> Expression {
        assert!(
            v.kind() != VariableKind::Boolean,
            "boolean variable {v} in real expression context"
        );
        intern(ExprNode::Variable(v.clone()))
    }

    /// A floating-point constant. NaN inputs build the distinguished NaN cell.
    pub fn constant(c: f64) -> Expression {
        if c.is_nan() {
            return Expression::nan();
        }
        // Normalise -0.0 so the bit-level hash agrees with ==.
        let c = if c == 0.0 { 0.0 } else { c };
        intern(ExprNode::Constant(c))
    }

    /// A real constant known only up to one ULP, `lb < ub = next_up(lb)`.
    /// Scalar evaluation picks the endpoint selected by `use_lb`.
    pub fn real_constant(lb: f64, ub: f64, use_lb: bool) -> Expression {
        fn next_after_up(x: f64) -> f64 {
            if x == 0.0 {
                f64::from_bits(1)
            } else if x.is_sign_positive() {
                f64::from_bits(x.to_bits() + 1)
            } else {
                f64::from_bits(x.to_bits() - 1)
            }
        }
        assert!(
            lb.is_finite() && ub.is_finite() && lb < ub && ub == next_after_up(lb),
            "real constant requires ub one ULP above lb, got [{lb}, {ub}]"
        );
        intern(ExprNode::RealConstant { lb, ub, use_lb })
    }

    /// The distinguished NaN cell. All numeric operations on it fail.
    pub fn nan() -> Expression {
        intern(ExprNode::NaN)
    }

    pub fn zero() -> Expression {
        Expression::constant(0.0)
    }

    pub fn one() -> Expression {
        Expression::constant(1.0)
    }

    fn binary(op: BinaryOp, a: Expression, b: Expression) -> Expression {
        let (a, b) = if op.is_commutative() && b.structural_cmp(&a) == Ordering::Less {
            (b, a)
        } else {
            (a, b)
        };
        intern(ExprNode::Binary(op, a, b))
    }

    fn unary(op: UnaryOp, e: Expression) -> Expression {
        intern(ExprNode::Unary(op, e))
    }

    pub fn add(a: Expression, b: Expression) -> Expression {
        let (ca, cb) = (a.as_constant(), b.as_constant());
        if let (Some(x), Some(y)) = (ca, cb) {
            return Expression::constant(x + y);
        }
        if ca == Some(0.0) {
            return b;
        }
        if cb == Some(0.0) {
            return a;
        }
        Expression::binary(BinaryOp::Add, a, b)
    }

    pub fn mul(a: Expression, b: Expression) -> Expression {
        let (ca, cb) = (a.as_constant(), b.as_constant());
        if let (Some(x), Some(y)) = (ca, cb) {
            return Expression::constant(x * y);
        }
        if ca == Some(0.0) || cb == Some(0.0) {
            return Expression::zero();
        }
        if ca == Some(1.0) {
            return b;
        }
        if cb == Some(1.0) {
            return a;
        }
        Expression::binary(BinaryOp::Mul, a, b)
    }

    pub fn neg(e: Expression) -> Expression {
        Expression::mul(Expression::constant(-1.0), e)
    }

    pub fn sub(a: Expression, b: Expression) -> Expression {
        Expression::add(a, Expression::neg(b))
    }

    pub fn div(a: Expression, b: Expression) -> Expression {
        if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
            if y != 0.0 {
                return Expression::constant(x / y);
            }
        }
        if b.as_constant() == Some(1.0) {
            return a;
        }
        Expression::binary(BinaryOp::Div, a, b)
    }

    pub fn pow(base: Expression, exponent: Expression) -> Expression {
        let c = exponent.as_constant();
        if c == Some(1.0) {
            return base;
        }
        if c == Some(0.0) {
            return Expression::one();
        }
        Expression::binary(BinaryOp::Pow, base, exponent)
    }

    pub fn atan2(y: Expression, x: Expression) -> Expression {
        Expression::binary(BinaryOp::Atan2, y, x)
    }

    pub fn min(a: Expression, b: Expression) -> Expression {
        if a == b {
            return a;
        }
        Expression::binary(BinaryOp::Min, a, b)
    }

    pub fn max(a: Expression, b: Expression) -> Expression {
        if a == b {
            return a;
        }
        Expression::binary(BinaryOp::Max, a, b)
    }

    pub fn log(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Log, e)
    }

    pub fn abs(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Abs, e)
    }

    pub fn exp(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Exp, e)
    }

    pub fn sqrt(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Sqrt, e)
    }

    pub fn sin(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Sin, e)
    }

    pub fn cos(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Cos, e)
    }

    pub fn tan(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Tan, e)
    }

    pub fn asin(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Asin, e)
    }

    pub fn acos(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Acos, e)
    }

    pub fn atan(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Atan, e)
    }

    pub fn sinh(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Sinh, e)
    }

    pub fn cosh(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Cosh, e)
    }

    pub fn tanh(e: Expression) -> Expression {
        Expression::unary(UnaryOp::Tanh, e)
    }

    pub fn if_then_else(cond: Formula, then: Expression, otherwise: Expression) -> Expression {
        intern(ExprNode::IfThenElse(cond, then, otherwise))
    }

    pub fn uninterpreted_function(
        name: impl Into<Arc<str>>,
        arguments: Vec<Variable>,
    ) -> Expression {
        intern(ExprNode::UninterpretedFunction {
            name: name.into(),
            arguments,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn node(&self) -> &ExprNode {
        &self.0.node
    }

    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.0.hash
    }

    /// Structural polynomiality, precomputed at interning time.
    #[inline]
    pub fn is_polynomial(&self) -> bool {
        self.0.is_polynomial
    }

    /// The payload if this cell is a plain constant.
    #[inline]
    pub fn as_constant(&self) -> Option<f64> {
        match self.node() {
            ExprNode::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// The free variables of this expression.
    pub fn variables(&self) -> FxHashSet<Variable> {
        let mut out = FxHashSet::default();
        self.collect_variables(&mut out);
        out
    }

    pub(crate) fn collect_variables(&self, out: &mut FxHashSet<Variable>) {
        match self.node() {
            ExprNode::Variable(v) => {
                out.insert(v.clone());
            }
            ExprNode::Constant(_) | ExprNode::RealConstant { .. } | ExprNode::NaN => {}
            ExprNode::Unary(_, e) => e.collect_variables(out),
            ExprNode::Binary(_, a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            ExprNode::IfThenElse(c, t, e) => {
                out.extend(c.free_variables());
                t.collect_variables(out);
                e.collect_variables(out);
            }
            ExprNode::UninterpretedFunction { arguments, .. } => {
                out.extend(arguments.iter().cloned());
            }
        }
    }

    fn depends_on(&self, x: &Variable) -> bool {
        match self.node() {
            ExprNode::Variable(v) => v == x,
            ExprNode::Constant(_) | ExprNode::RealConstant { .. } | ExprNode::NaN => false,
            ExprNode::Unary(_, e) => e.depends_on(x),
            ExprNode::Binary(_, a, b) => a.depends_on(x) || b.depends_on(x),
            ExprNode::IfThenElse(c, t, e) => {
                c.free_variables().contains(x) || t.depends_on(x) || e.depends_on(x)
            }
            ExprNode::UninterpretedFunction { arguments, .. } => arguments.contains(x),
        }
    }

    // ------------------------------------------------------------------
    // Scalar evaluation
    // ------------------------------------------------------------------

    /// Evaluate at the point assignment `env`.
    pub fn evaluate(&self, env: &Environment) -> Result<f64, SymbolicError> {
        match self.node() {
            ExprNode::Variable(v) => env
                .get(v)
                .ok_or_else(|| SymbolicError::MissingBinding(v.clone())),
            ExprNode::Constant(c) => Ok(*c),
            ExprNode::RealConstant { lb, ub, use_lb } => Ok(if *use_lb { *lb } else { *ub }),
            ExprNode::NaN => Err(SymbolicError::NumericNan),
            ExprNode::Unary(op, e) => eval_unary(*op, e.evaluate(env)?),
            ExprNode::Binary(op, a, b) => eval_binary(*op, a.evaluate(env)?, b.evaluate(env)?),
            ExprNode::IfThenElse(c, t, e) => {
                if c.evaluate(env)? {
                    t.evaluate(env)
                } else {
                    e.evaluate(env)
                }
            }
            ExprNode::UninterpretedFunction { name, .. } => {
                Err(SymbolicError::UninterpretedFunction(name.clone()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Substitution
    // ------------------------------------------------------------------

    /// Substitute variables by expressions (and, inside `if-then-else`
    /// conditions, Boolean variables by formulas).
    ///
    /// Because every constructor interns, an unchanged subtree comes back as
    /// the identical cell, so callers can detect no-ops with `==`.
    pub fn substitute(
        &self,
        exprs: &ExpressionSubstitution,
        formulas: &FormulaSubstitution,
    ) -> Result<Expression, SymbolicError> {
        match self.node() {
            ExprNode::Variable(v) => Ok(exprs.get(v).cloned().unwrap_or_else(|| self.clone())),
            ExprNode::Constant(_) | ExprNode::RealConstant { .. } => Ok(self.clone()),
            ExprNode::NaN => Err(SymbolicError::NumericNan),
            ExprNode::Unary(op, e) => Ok(Expression::unary(*op, e.substitute(exprs, formulas)?)),
            ExprNode::Binary(op, a, b) => {
                let a = a.substitute(exprs, formulas)?;
                let b = b.substitute(exprs, formulas)?;
                Ok(rebuild_binary(*op, a, b))
            }
            ExprNode::IfThenElse(c, t, e) => Ok(Expression::if_then_else(
                c.substitute(exprs, formulas)?,
                t.substitute(exprs, formulas)?,
                e.substitute(exprs, formulas)?,
            )),
            ExprNode::UninterpretedFunction { name, arguments } => {
                // Only variable-to-variable renamings are meaningful for an
                // opaque function symbol; other mappings leave it untouched.
                let renamed: Vec<Variable> = arguments
                    .iter()
                    .map(|v| match exprs.get(v).map(Expression::node) {
                        Some(ExprNode::Variable(w)) => w.clone(),
                        _ => v.clone(),
                    })
                    .collect();
                Ok(Expression::uninterpreted_function(name.clone(), renamed))
            }
        }
    }

    // ------------------------------------------------------------------
    // Differentiation
    // ------------------------------------------------------------------

    /// The partial derivative with respect to `x`.
    ///
    /// `abs`, `min`, `max`, `if-then-else` and uninterpreted functions are
    /// differentiable only where `x` does not occur free (derivative 0).
    pub fn differentiate(&self, x: &Variable) -> Result<Expression, SymbolicError> {
        use Expression as E;
        match self.node() {
            ExprNode::Variable(v) => Ok(E::constant(if v == x { 1.0 } else { 0.0 })),
            ExprNode::Constant(_) | ExprNode::RealConstant { .. } => Ok(E::zero()),
            ExprNode::NaN => Err(SymbolicError::NumericNan),
            ExprNode::Unary(op, e) => {
                let de = e.differentiate(x)?;
                let e = e.clone();
                Ok(match op {
                    UnaryOp::Log => E::div(de, e),
                    UnaryOp::Exp => E::mul(de, E::exp(e)),
                    UnaryOp::Sqrt => E::div(de, E::mul(E::constant(2.0), E::sqrt(e))),
                    UnaryOp::Sin => E::mul(de, E::cos(e)),
                    UnaryOp::Cos => E::neg(E::mul(de, E::sin(e))),
                    UnaryOp::Tan => E::div(de, E::pow(E::cos(e), E::constant(2.0))),
                    UnaryOp::Asin => E::div(
                        de,
                        E::sqrt(E::sub(E::one(), E::pow(e, E::constant(2.0)))),
                    ),
                    UnaryOp::Acos => E::neg(E::div(
                        de,
                        E::sqrt(E::sub(E::one(), E::pow(e, E::constant(2.0)))),
                    )),
                    UnaryOp::Atan => {
                        E::div(de, E::add(E::one(), E::pow(e, E::constant(2.0))))
                    }
                    UnaryOp::Sinh => E::mul(de, E::cosh(e)),
                    UnaryOp::Cosh => E::mul(de, E::sinh(e)),
                    UnaryOp::Tanh => E::div(de, E::pow(E::cosh(e), E::constant(2.0))),
                    UnaryOp::Abs => {
                        return self.non_differentiable("abs", x);
                    }
                })
            }
            ExprNode::Binary(op, a, b) => match op {
                BinaryOp::Add => Ok(E::add(a.differentiate(x)?, b.differentiate(x)?)),
                BinaryOp::Mul => {
                    let da = a.differentiate(x)?;
                    let db = b.differentiate(x)?;
                    Ok(E::add(E::mul(da, b.clone()), E::mul(a.clone(), db)))
                }
                BinaryOp::Div => {
                    let da = a.differentiate(x)?;
                    let db = b.differentiate(x)?;
                    Ok(E::div(
                        E::sub(E::mul(da, b.clone()), E::mul(a.clone(), db)),
                        E::pow(b.clone(), E::constant(2.0)),
                    ))
                }
                BinaryOp::Pow => {
                    let da = a.differentiate(x)?;
                    if let Some(n) = b.as_constant() {
                        // d/dx aⁿ = n·aⁿ⁻¹·a'
                        Ok(E::mul(
                            E::mul(
                                E::constant(n),
                                E::pow(a.clone(), E::constant(n - 1.0)),
                            ),
                            da,
                        ))
                    } else {
                        // d/dx a^b = a^b·(b'·log a + b·a'/a)
                        let db = b.differentiate(x)?;
                        Ok(E::mul(
                            E::pow(a.clone(), b.clone()),
                            E::add(
                                E::mul(db, E::log(a.clone())),
                                E::div(E::mul(b.clone(), da), a.clone()),
                            ),
                        ))
                    }
                }
                BinaryOp::Atan2 => {
                    // d/dx atan2(y, z) = (y'·z − y·z') / (z² + y²)
                    let dy = a.differentiate(x)?;
                    let dz = b.differentiate(x)?;
                    Ok(E::div(
                        E::sub(E::mul(dy, b.clone()), E::mul(a.clone(), dz)),
                        E::add(
                            E::pow(b.clone(), E::constant(2.0)),
                            E::pow(a.clone(), E::constant(2.0)),
                        ),
                    ))
                }
                BinaryOp::Min => self.non_differentiable("min", x),
                BinaryOp::Max => self.non_differentiable("max", x),
            },
            ExprNode::IfThenElse(..) => self.non_differentiable("if-then-else", x),
            ExprNode::UninterpretedFunction { .. } => {
                self.non_differentiable("uninterpreted function", x)
            }
        }
    }

    fn non_differentiable(
        &self,
        op: &'static str,
        x: &Variable,
    ) -> Result<Expression, SymbolicError> {
        if self.depends_on(x) {
            Err(SymbolicError::NonDifferentiable { op, var: x.clone() })
        } else {
            Ok(Expression::zero())
        }
    }

    // ------------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------------

    /// Distribute multiplication over addition, realise constant integer
    /// powers of polynomial bases by repeated squaring, and push division by
    /// a constant through sums and products.
    ///
    /// Interning makes this identity-preserving for free: an expansion that
    /// changes nothing returns the identical cell.
    pub fn expand(&self) -> Result<Expression, SymbolicError> {
        use Expression as E;
        match self.node() {
            ExprNode::Variable(_) | ExprNode::Constant(_) | ExprNode::RealConstant { .. } => {
                Ok(self.clone())
            }
            ExprNode::NaN => Err(SymbolicError::NumericNan),
            ExprNode::Unary(op, e) => Ok(E::unary(*op, e.expand()?)),
            ExprNode::Binary(BinaryOp::Add, a, b) => Ok(E::add(a.expand()?, b.expand()?)),
            ExprNode::Binary(BinaryOp::Mul, a, b) => {
                Ok(expand_multiplication(a.expand()?, b.expand()?))
            }
            ExprNode::Binary(BinaryOp::Div, a, b) => {
                let a = a.expand()?;
                let b = b.expand()?;
                match b.as_constant() {
                    Some(c) if c != 0.0 => Ok(divide_by_constant(&a, c)),
                    _ => Ok(E::div(a, b)),
                }
            }
            ExprNode::Binary(BinaryOp::Pow, base, exponent) => {
                let base = base.expand()?;
                let exponent = exponent.expand()?;
                match exponent.as_constant() {
                    Some(n) if base.is_polynomial() && n.fract() == 0.0 && n >= 1.0 => {
                        Ok(expand_pow(&base, n as u32))
                    }
                    _ => Ok(E::pow(base, exponent)),
                }
            }
            ExprNode::Binary(op, a, b) => Ok(rebuild_binary(*op, a.expand()?, b.expand()?)),
            ExprNode::IfThenElse(c, t, e) => {
                Ok(E::if_then_else(c.clone(), t.expand()?, e.expand()?))
            }
            ExprNode::UninterpretedFunction { .. } => Ok(self.clone()),
        }
    }

    // ------------------------------------------------------------------
    // Structural total order
    // ------------------------------------------------------------------

    fn rank(&self) -> u32 {
        match self.node() {
            ExprNode::Constant(_) => 0,
            ExprNode::RealConstant { .. } => 1,
            ExprNode::Variable(_) => 2,
            ExprNode::NaN => 3,
            ExprNode::Unary(op, _) => 10 + *op as u32,
            ExprNode::Binary(op, _, _) => 40 + *op as u32,
            ExprNode::IfThenElse(..) => 70,
            ExprNode::UninterpretedFunction { .. } => 71,
        }
    }

    /// Total order by kind, then payload. Used to canonicalise commutative
    /// operands and as a deterministic map key.
    pub fn structural_cmp(&self, other: &Expression) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (self.node(), other.node()) {
            (ExprNode::Constant(a), ExprNode::Constant(b)) => a.total_cmp(b),
            (
                ExprNode::RealConstant { lb: a, .. },
                ExprNode::RealConstant { lb: b, .. },
            ) => a.total_cmp(b),
            (ExprNode::Variable(a), ExprNode::Variable(b)) => a.cmp(b),
            (ExprNode::Unary(_, a), ExprNode::Unary(_, b)) => a.structural_cmp(b),
            (ExprNode::Binary(_, a1, a2), ExprNode::Binary(_, b1, b2)) => a1
                .structural_cmp(b1)
                .then_with(|| a2.structural_cmp(b2)),
            (ExprNode::IfThenElse(c1, t1, e1), ExprNode::IfThenElse(c2, t2, e2)) => c1
                .structural_cmp(c2)
                .then_with(|| t1.structural_cmp(t2))
                .then_with(|| e1.structural_cmp(e2)),
            (
                ExprNode::UninterpretedFunction { name: n1, arguments: a1 },
                ExprNode::UninterpretedFunction { name: n2, arguments: a2 },
            ) => n1.cmp(n2).then_with(|| a1.cmp(a2)),
            // Ranks were equal, so the kinds match; reaching here means the
            // cells differ only by hash collision on equal payloads, which the
            // interner rules out.
            _ => unreachable!("structural_cmp on mismatched kinds with equal rank"),
        }
    }
}

fn rebuild_binary(op: BinaryOp, a: Expression, b: Expression) -> Expression {
    match op {
        BinaryOp::Add => Expression::add(a, b),
        BinaryOp::Mul => Expression::mul(a, b),
        BinaryOp::Div => Expression::div(a, b),
        BinaryOp::Pow => Expression::pow(a, b),
        BinaryOp::Atan2 => Expression::atan2(a, b),
        BinaryOp::Min => Expression::min(a, b),
        BinaryOp::Max => Expression::max(a, b),
    }
}

/// Multiply two already-expanded expressions, distributing over addition.
fn expand_multiplication(a: Expression, b: Expression) -> Expression {
    if let ExprNode::Binary(BinaryOp::Add, a1, a2) = a.node() {
        let left = expand_multiplication(a1.clone(), b.clone());
        let right = expand_multiplication(a2.clone(), b);
        return Expression::add(left, right);
    }
    if let ExprNode::Binary(BinaryOp::Add, b1, b2) = b.node() {
        let left = expand_multiplication(a.clone(), b1.clone());
        let right = expand_multiplication(a, b2.clone());
        return Expression::add(left, right);
    }
    Expression::mul(a, b)
}

/// Divide an already-expanded expression by a non-zero constant, pushing the
/// division into sums and constant coefficients.
fn divide_by_constant(e: &Expression, c: f64) -> Expression {
    match e.node() {
        ExprNode::Constant(k) => Expression::constant(k / c),
        ExprNode::Binary(BinaryOp::Add, a, b) => {
            Expression::add(divide_by_constant(a, c), divide_by_constant(b, c))
        }
        ExprNode::Binary(BinaryOp::Mul, a, b) => match a.as_constant() {
            Some(k) => Expression::mul(Expression::constant(k / c), b.clone()),
            None => Expression::div(e.clone(), Expression::constant(c)),
        },
        _ => Expression::div(e.clone(), Expression::constant(c)),
    }
}

/// Integer power of an already-expanded polynomial base by repeated squaring.
fn expand_pow(base: &Expression, n: u32) -> Expression {
    debug_assert!(n >= 1);
    if n == 1 {
        return base.clone();
    }
    let half = expand_pow(base, n / 2);
    let squared = expand_multiplication(half.clone(), half);
    if n % 2 == 1 {
        expand_multiplication(squared, base.clone())
    } else {
        squared
    }
}

fn eval_unary(op: UnaryOp, x: f64) -> Result<f64, SymbolicError> {
    let domain = |op| SymbolicError::NumericDomain { op, value: x };
    Ok(match op {
        UnaryOp::Log => {
            if x < 0.0 {
                return Err(domain("log"));
            }
            x.ln()
        }
        UnaryOp::Abs => x.abs(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Sqrt => {
            if x < 0.0 {
                return Err(domain("sqrt"));
            }
            x.sqrt()
        }
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Tan => x.tan(),
        UnaryOp::Asin => {
            if !(-1.0..=1.0).contains(&x) {
                return Err(domain("asin"));
            }
            x.asin()
        }
        UnaryOp::Acos => {
            if !(-1.0..=1.0).contains(&x) {
                return Err(domain("acos"));
            }
            x.acos()
        }
        UnaryOp::Atan => x.atan(),
        UnaryOp::Sinh => x.sinh(),
        UnaryOp::Cosh => x.cosh(),
        UnaryOp::Tanh => x.tanh(),
    })
}

fn eval_binary(op: BinaryOp, a: f64, b: f64) -> Result<f64, SymbolicError> {
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(SymbolicError::NumericDomain {
                    op: "division",
                    value: b,
                });
            }
            a / b
        }
        BinaryOp::Pow => {
            if a < 0.0 && b.fract() != 0.0 {
                return Err(SymbolicError::NumericDomain { op: "pow", value: a });
            }
            a.powf(b)
        }
        BinaryOp::Atan2 => a.atan2(b),
        BinaryOp::Min => a.min(b),
        BinaryOp::Max => a.max(b),
    })
}

impl PartialEq for Expression {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Interning makes pointer identity coincide with structural equality.
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl PartialOrd for Expression {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expression {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.structural_cmp(other)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            ExprNode::Variable(v) => write!(f, "{v}"),
            ExprNode::Constant(c) => write!(f, "{c}"),
            ExprNode::RealConstant { lb, ub, use_lb } => {
                write!(f, "{}", if *use_lb { lb } else { ub })
            }
            ExprNode::NaN => write!(f, "NaN"),
            ExprNode::Unary(op, e) => write!(f, "{}({e})", op.name()),
            ExprNode::Binary(BinaryOp::Add, a, b) => write!(f, "({a} + {b})"),
            ExprNode::Binary(BinaryOp::Mul, a, b) => write!(f, "({a} * {b})"),
            ExprNode::Binary(BinaryOp::Div, a, b) => write!(f, "({a} / {b})"),
            ExprNode::Binary(BinaryOp::Pow, a, b) => write!(f, "pow({a}, {b})"),
            ExprNode::Binary(BinaryOp::Atan2, a, b) => write!(f, "atan2({a}, {b})"),
            ExprNode::Binary(BinaryOp::Min, a, b) => write!(f, "min({a}, {b})"),
            ExprNode::Binary(BinaryOp::Max, a, b) => write!(f, "max({a}, {b})"),
            ExprNode::IfThenElse(c, t, e) => write!(f, "(if {c} then {t} else {e})"),
            ExprNode::UninterpretedFunction { name, arguments } => {
                write!(f, "{name}(")?;
                for (i, v) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy() -> (Variable, Variable) {
        (Variable::continuous("x"), Variable::continuous("y"))
    }

    #[test]
    fn hash_consing_shares_cells() {
        let (x, y) = xy();
        let s1 = Expression::add(Expression::variable(&x), Expression::variable(&y));
        let s2 = Expression::add(Expression::variable(&x), Expression::variable(&y));
        assert!(Arc::ptr_eq(&s1.0, &s2.0));

        let p1 = Expression::mul(s1.clone(), s2.clone());
        let p2 = Expression::mul(s1, s2);
        assert_eq!(p1, p2);
    }

    #[test]
    fn commutative_operands_are_canonicalised() {
        let (x, y) = xy();
        let a = Expression::add(Expression::variable(&x), Expression::variable(&y));
        let b = Expression::add(Expression::variable(&y), Expression::variable(&x));
        assert_eq!(a, b);
    }

    #[test]
    fn constant_folding() {
        let x = Variable::continuous("x");
        let e = Expression::add(Expression::constant(1.0), Expression::constant(2.0));
        assert_eq!(e.as_constant(), Some(3.0));
        let e = Expression::mul(Expression::zero(), Expression::variable(&x));
        assert_eq!(e.as_constant(), Some(0.0));
        let e = Expression::pow(Expression::variable(&x), Expression::one());
        assert_eq!(e, Expression::variable(&x));
    }

    #[test]
    fn evaluate_with_missing_binding_fails() {
        let (x, y) = xy();
        let e = Expression::add(Expression::variable(&x), Expression::variable(&y));
        let mut env = Environment::new();
        env.insert(x, 1.0);
        assert!(matches!(
            e.evaluate(&env),
            Err(SymbolicError::MissingBinding(_))
        ));
    }

    #[test]
    fn evaluate_domain_errors() {
        let x = Variable::continuous("x");
        let mut env = Environment::new();
        env.insert(x.clone(), -2.0);
        assert!(Expression::sqrt(Expression::variable(&x))
            .evaluate(&env)
            .is_err());
        assert!(Expression::log(Expression::variable(&x))
            .evaluate(&env)
            .is_err());
        assert!(Expression::asin(Expression::variable(&x))
            .evaluate(&env)
            .is_err());
    }

    #[test]
    fn differentiate_product_of_sin_and_exp() {
        // d/dx (sin x · exp y) = cos x · exp y
        let (x, y) = xy();
        let f = Expression::mul(
            Expression::sin(Expression::variable(&x)),
            Expression::exp(Expression::variable(&y)),
        );
        let expected = Expression::mul(
            Expression::cos(Expression::variable(&x)),
            Expression::exp(Expression::variable(&y)),
        );
        assert_eq!(f.differentiate(&x).unwrap(), expected);
    }

    #[test]
    fn differentiate_abs_fails_only_when_free() {
        let (x, y) = xy();
        let e = Expression::abs(Expression::variable(&x));
        assert!(e.differentiate(&x).is_err());
        assert_eq!(e.differentiate(&y).unwrap(), Expression::zero());
    }

    #[test]
    fn expand_distributes_and_squares() {
        let (x, y) = xy();
        let xv = Expression::variable(&x);
        let yv = Expression::variable(&y);
        // (x + y)² expands to x·x + x·y + x·y + y·y (modulo canonical order).
        let square = Expression::pow(
            Expression::add(xv.clone(), yv.clone()),
            Expression::constant(2.0),
        );
        let expanded = square.expand().unwrap();
        let mut env = Environment::new();
        env.insert(x, 3.0);
        env.insert(y, 5.0);
        assert_eq!(
            expanded.evaluate(&env).unwrap(),
            square.evaluate(&env).unwrap()
        );
        // The expansion no longer contains a pow cell.
        assert!(!format!("{expanded}").contains("pow"));
    }

    #[test]
    fn expand_preserves_identity_on_flat_terms() {
        let (x, y) = xy();
        let e = Expression::add(Expression::variable(&x), Expression::variable(&y));
        assert_eq!(e.expand().unwrap(), e);
    }

    #[test]
    fn nan_operations_fail() {
        let nan = Expression::nan();
        assert!(nan.evaluate(&Environment::new()).is_err());
        assert!(nan.expand().is_err());
        assert!(nan.differentiate(&Variable::continuous("x")).is_err());
    }

    #[test]
    fn real_constant_picks_representative() {
        let third = 1.0 / 3.0;
        let e = Expression::real_constant(third, f64::from_bits(third.to_bits() + 1), true);
        assert_eq!(e.evaluate(&Environment::new()).unwrap(), third);
    }
}
