/// Math for concentrated liquidity positions
///
/// This crate provides the pure numeric layer used by the SDK and the
/// operator binary: conversion between human-readable and on-chain token
/// amounts, and conversion between ticks, prices and Q64.96 square-root
/// prices, including tick range selection around the current tick.

pub mod error;
pub mod tick_math;
pub mod units;

// Re-export commonly used functions
pub use error::*;
pub use tick_math::*;
pub use units::*;
