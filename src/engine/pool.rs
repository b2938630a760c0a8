// src/engine/pool.rs
//
// Global thread pool for batch processing.
//
// One pool per process, shared by every batch.
//
// - Size comes from the first caller (CompressorConfig::threads), falling
//   back to available_parallelism(), which respects cgroup/CPU quota
// - Initialized lazily on first use; later size requests have no effect

use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Upper bound for an explicitly configured thread count
pub const MAX_THREADS: usize = 256;

/// Minimum number of rayon threads to ensure at least some parallelism
const MIN_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<ThreadPool> = OnceLock::new();

/// Thread count used when nothing is configured.
pub fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_THREADS)
}

/// Get the global pool, building it with `threads` workers on first use.
///
/// Returns None only if rayon could not spawn any worker thread; callers
/// then run the batch on the current thread.
pub fn get_pool(threads: Option<usize>) -> Option<&'static ThreadPool> {
    if let Some(pool) = GLOBAL_THREAD_POOL.get() {
        return Some(pool);
    }
    let num_threads = threads
        .unwrap_or_else(default_thread_count)
        .clamp(MIN_THREADS, MAX_THREADS);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("image-compressor-{i}"))
        .build()
        .or_else(|e| {
            warn!(error = %e, num_threads, "thread pool creation failed, retrying with one thread");
            rayon::ThreadPoolBuilder::new()
                .num_threads(MIN_THREADS)
                .build()
        });

    match pool {
        Ok(pool) => {
            debug!(num_threads = pool.current_num_threads(), "batch thread pool ready");
            // A concurrent caller may have won the race; either pool is fine
            Some(GLOBAL_THREAD_POOL.get_or_init(|| pool))
        }
        Err(e) => {
            warn!(error = %e, "no batch thread pool available");
            None
        }
    }
}
