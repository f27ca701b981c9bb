//! Property-based tests for the symbolic layer: differentiation against
//! finite differences, expansion value-equivalence, and hash-consing
//! identity.

use boxsat_symbolic::{Environment, Expression, Variable};
use proptest::prelude::*;

/// A recipe for a smooth, bounded expression over two variables. Keeping to
/// {sin, cos, tanh, atan, +, ·} avoids domain edges and keeps magnitudes
/// small enough for central differences to be trustworthy.
#[derive(Debug, Clone)]
enum Recipe {
    X,
    Y,
    Const(i32),
    Sin(Box<Recipe>),
    Cos(Box<Recipe>),
    Tanh(Box<Recipe>),
    Atan(Box<Recipe>),
    Add(Box<Recipe>, Box<Recipe>),
    Mul(Box<Recipe>, Box<Recipe>),
}

impl Recipe {
    fn build(&self, x: &Variable, y: &Variable) -> Expression {
        match self {
            Recipe::X => Expression::variable(x),
            Recipe::Y => Expression::variable(y),
            Recipe::Const(c) => Expression::constant(f64::from(*c) / 4.0),
            Recipe::Sin(r) => Expression::sin(r.build(x, y)),
            Recipe::Cos(r) => Expression::cos(r.build(x, y)),
            Recipe::Tanh(r) => Expression::tanh(r.build(x, y)),
            Recipe::Atan(r) => Expression::atan(r.build(x, y)),
            Recipe::Add(a, b) => Expression::add(a.build(x, y), b.build(x, y)),
            Recipe::Mul(a, b) => Expression::mul(a.build(x, y), b.build(x, y)),
        }
    }
}

fn recipe_strategy() -> impl Strategy<Value = Recipe> {
    let leaf = prop_oneof![
        Just(Recipe::X),
        Just(Recipe::Y),
        (-8i32..=8).prop_map(Recipe::Const),
    ];
    leaf.prop_recursive(3, 24, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|r| Recipe::Sin(Box::new(r))),
            inner.clone().prop_map(|r| Recipe::Cos(Box::new(r))),
            inner.clone().prop_map(|r| Recipe::Tanh(Box::new(r))),
            inner.clone().prop_map(|r| Recipe::Atan(Box::new(r))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| Recipe::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner).prop_map(|(a, b)| Recipe::Mul(Box::new(a), Box::new(b))),
        ]
    })
}

proptest! {
    #[test]
    fn differentiation_matches_finite_differences(
        recipe in recipe_strategy(),
        x0 in -2.0f64..2.0,
        y0 in -2.0f64..2.0,
    ) {
        let x = Variable::continuous("x");
        let y = Variable::continuous("y");
        let f = recipe.build(&x, &y);
        let df = f.differentiate(&x).unwrap();

        let mut env = Environment::new();
        env.insert(x.clone(), x0);
        env.insert(y, y0);
        let symbolic = df.evaluate(&env).unwrap();

        let h = 1e-5;
        let mut lo = env.clone();
        lo.insert(x.clone(), x0 - h);
        let mut hi = env.clone();
        hi.insert(x, x0 + h);
        let numeric =
            (f.evaluate(&hi).unwrap() - f.evaluate(&lo).unwrap()) / (2.0 * h);

        let tolerance = 1e-5 * (1.0 + symbolic.abs());
        prop_assert!(
            (symbolic - numeric).abs() <= tolerance,
            "d/dx {f} = {df}: symbolic {symbolic} vs numeric {numeric}"
        );
    }
}

/// A recipe for a polynomial expression, for the expansion property.
#[derive(Debug, Clone)]
enum PolyRecipe {
    X,
    Y,
    Const(i32),
    Add(Box<PolyRecipe>, Box<PolyRecipe>),
    Mul(Box<PolyRecipe>, Box<PolyRecipe>),
    Pow(Box<PolyRecipe>, u32),
}

impl PolyRecipe {
    fn build(&self, x: &Variable, y: &Variable) -> Expression {
        match self {
            PolyRecipe::X => Expression::variable(x),
            PolyRecipe::Y => Expression::variable(y),
            PolyRecipe::Const(c) => Expression::constant(f64::from(*c)),
            PolyRecipe::Add(a, b) => Expression::add(a.build(x, y), b.build(x, y)),
            PolyRecipe::Mul(a, b) => Expression::mul(a.build(x, y), b.build(x, y)),
            PolyRecipe::Pow(a, n) => Expression::pow(
                a.build(x, y),
                Expression::constant(f64::from(*n)),
            ),
        }
    }
}

fn poly_strategy() -> impl Strategy<Value = PolyRecipe> {
    // Shallow recipes with small constants keep every intermediate value
    // small, so value comparison is not washed out by cancellation.
    let leaf = prop_oneof![
        Just(PolyRecipe::X),
        Just(PolyRecipe::Y),
        (-2i32..=2).prop_map(PolyRecipe::Const),
    ];
    leaf.prop_recursive(2, 12, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| PolyRecipe::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| PolyRecipe::Mul(Box::new(a), Box::new(b))),
            (inner, 2u32..=2).prop_map(|(a, n)| PolyRecipe::Pow(Box::new(a), n)),
        ]
    })
}

proptest! {
    #[test]
    fn expansion_preserves_values(
        recipe in poly_strategy(),
        x0 in -2.0f64..2.0,
        y0 in -2.0f64..2.0,
    ) {
        let x = Variable::continuous("x");
        let y = Variable::continuous("y");
        let f = recipe.build(&x, &y);
        let expanded = f.expand().unwrap();

        let mut env = Environment::new();
        env.insert(x, x0);
        env.insert(y, y0);
        let original = f.evaluate(&env).unwrap();
        let flat = expanded.evaluate(&env).unwrap();

        let tolerance = 1e-9 * (1.0 + original.abs());
        prop_assert!(
            (original - flat).abs() <= tolerance,
            "{f} expands to {expanded}: {original} vs {flat}"
        );
    }

    #[test]
    fn construction_is_hash_consed(recipe in poly_strategy()) {
        let x = Variable::continuous("x");
        let y = Variable::continuous("y");
        let a = recipe.build(&x, &y);
        let b = recipe.build(&x, &y);
        let c = recipe.build(&x, &y);
        // Reflexive, symmetric, transitive, and cell-identical.
        prop_assert_eq!(&a, &a);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&b, &a);
        prop_assert_eq!(&b, &c);
        prop_assert_eq!(&a, &c);
        prop_assert_eq!(a.hash_value(), b.hash_value());
    }
}
