//! Async runtime helpers for blocking callers.
//!
//! Chains are async end to end. This module lets synchronous code drive one to
//! completion without caring whether a Tokio runtime is already running.

use std::{future::Future, panic, thread};

use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::task;

/// Raised when no runtime could be found or created to drive a future.
#[derive(Debug, Error)]
#[error("could not start an async runtime: {0}")]
pub struct RuntimeError(#[from] std::io::Error);

/// Execute an async future from synchronous code.
///
/// # Notes
/// - Inside a multi-threaded runtime the current worker is parked with
///   `block_in_place` and the existing runtime drives the future.
/// - Inside a current-thread runtime the future runs on a scoped helper
///   thread with its own runtime, since the caller's thread cannot block.
/// - Outside any runtime a current-thread runtime is created for the call.
pub fn block_on_future<F>(future: F) -> Result<F::Output, RuntimeError>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => Ok(task::block_in_place(|| handle.block_on(future))),
        Ok(_) => thread::scope(|scope| {
            let worker = scope.spawn(|| current_thread_runtime().map(|runtime| runtime.block_on(future)));
            worker.join().unwrap_or_else(|payload| panic::resume_unwind(payload))
        }),
        Err(_) => Ok(current_thread_runtime()?.block_on(future)),
    }
}

fn current_thread_runtime() -> Result<Runtime, RuntimeError> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn answer() -> u32 {
        tokio::task::yield_now().await;
        42
    }

    #[test]
    fn drives_futures_without_a_runtime() {
        assert_eq!(block_on_future(answer()).expect("runtime"), 42);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn drives_futures_inside_a_current_thread_runtime() {
        assert_eq!(block_on_future(answer()).expect("runtime"), 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn drives_futures_inside_a_multi_thread_runtime() {
        assert_eq!(block_on_future(answer()).expect("runtime"), 42);
    }
}
