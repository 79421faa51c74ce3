pub mod indicators;
pub mod levels;
pub mod patterns;

#[cfg(test)]
mod indicators_tests;

pub use indicators::*;
pub use levels::*;
pub use patterns::*;
