//! Processing modes

use dkrige_core::{Error, Result};
use tracing::debug;

/// Processing mode for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for a configured thread count; `None` means all cores.
    ///
    /// Requests above the hardware thread count are clamped to it.
    pub fn from_threads(threads: Option<usize>) -> Self {
        match threads {
            None => ProcessingMode::Parallel,
            Some(0) | Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n.min(hardware_threads())),
        }
    }

    /// Number of worker threads this mode runs with
    pub fn threads(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => hardware_threads(),
            ProcessingMode::ParallelWith(n) => (*n).clamp(1, hardware_threads()),
        }
    }

    /// Run `f` inside a thread pool sized for this mode.
    ///
    /// Parallel iterators started inside `f` use that pool.
    #[cfg(feature = "parallel")]
    pub fn install<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        let threads = self.threads();
        debug!(threads, mode = ?self, "building thread pool");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dkrige-worker-{}", i))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        Ok(pool.install(f))
    }

    /// Run `f` on the calling thread
    #[cfg(not(feature = "parallel"))]
    pub fn install<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        debug!(mode = ?self, "parallel feature disabled, running sequentially");
        Ok::<R, Error>(f())
    }
}

/// Number of hardware threads available to this process
pub fn hardware_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
