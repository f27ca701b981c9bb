//! Interval arithmetic substrate for the boxsat solver.
//!
//! [`Interval`] is a closed floating-point interval with outward rounding:
//! every operation returns an enclosure of the exact real result, widened by
//! one ULP where the underlying primitive rounds to nearest. [`IntervalBox`]
//! is an ordered vector of named intervals, and [`DimensionSet`] a bitset
//! over its dimensions.

mod bitset;
mod ibox;
mod interval;

pub use bitset::DimensionSet;
pub use ibox::{IntervalBox, VariableRegistry};
pub use interval::Interval;
