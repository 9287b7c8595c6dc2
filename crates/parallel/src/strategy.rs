//! Processing modes for per-item batch work

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Processing mode for batch algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    #[default]
    Sequential,
    /// Parallel processing using all available cores
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

/// Strategy for mapping independent work items
pub trait ParallelStrategy {
    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    #[cfg(feature = "parallel")]
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            ProcessingMode::ParallelWith(threads) => {
                match rayon::ThreadPoolBuilder::new().num_threads(*threads).build() {
                    Ok(pool) => pool.install(|| range.into_par_iter().map(f).collect()),
                    Err(e) => {
                        tracing::warn!("cannot build a {}-thread pool ({}), using the global pool", threads, e);
                        range.into_par_iter().map(f).collect()
                    }
                }
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        range.map(f).collect()
    }
}

/// Get the number of available worker threads
pub fn num_cpus() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// Configure the global thread pool
pub fn set_num_threads(threads: usize) {
    #[cfg(feature = "parallel")]
    {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok(); // Ignore if already initialized
    }
    #[cfg(not(feature = "parallel"))]
    {
        let _ = threads;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sequential() {
        assert_eq!(ProcessingMode::default(), ProcessingMode::Sequential);
    }

    #[test]
    fn test_par_map_keeps_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(2),
        ] {
            let out = mode.par_map(0..100, |i| i * i);
            assert_eq!(out.len(), 100);
            assert_eq!(out[7], 49);
            assert!(out.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_num_cpus_positive() {
        assert!(num_cpus() >= 1);
    }
}
