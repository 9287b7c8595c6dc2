//! # lagosnet Parallel
//!
//! Execution strategies for batch processing.
//!
//! Lakes in a batch are traced and accumulated independently, so a batch can
//! be mapped sequentially or over a Rayon pool. Without the `parallel`
//! feature every mode runs sequentially.

pub mod strategy;

pub use strategy::{num_cpus, set_num_threads, ParallelStrategy, ProcessingMode};
