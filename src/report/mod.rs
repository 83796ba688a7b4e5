//! Population reports.

pub mod generator;

pub use generator::*;
