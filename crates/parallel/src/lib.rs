//! # dkrige Parallel
//!
//! Thread-pool control for detrended kriging runs.
//!
//! A run's weight precomputation and per-step cell loops are rayon parallel
//! iterators; [`ProcessingMode`] decides which pool they execute in.

pub mod strategy;

pub use strategy::{hardware_threads, ProcessingMode};
