use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Outcome of one item handed to [`BoundedPool::run`], in input order.
#[derive(Debug)]
pub enum Slot<T> {
    Completed(T),
    /// Never started: the token was cancelled or the halt predicate fired first.
    NotStarted,
    Panicked(String),
}

/// Runs items on spawned tasks with at most `width` in flight.
///
/// Items start in input order; a permit is taken before each spawn and held
/// until that task finishes, so width 1 is strictly sequential.
#[derive(Debug, Clone, Copy)]
pub struct BoundedPool {
    width: usize,
}

impl BoundedPool {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `halt_on` is checked on each completed output before its permit is
    /// released; once it returns true no further item is started.
    pub async fn run<I, T, F, Fut, H>(
        &self,
        items: Vec<I>,
        token: &CancellationToken,
        halt_on: H,
        mut start: F,
    ) -> Vec<Slot<T>>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        H: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let sem = Arc::new(Semaphore::new(self.width));
        let halted = Arc::new(AtomicBool::new(false));
        let halt_on = Arc::new(halt_on);
        let total = items.len();
        let mut handles: Vec<JoinHandle<T>> = Vec::with_capacity(total);

        for item in items {
            if token.is_cancelled() || halted.load(Ordering::Acquire) {
                break;
            }
            let permit = tokio::select! {
                permit = sem.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
                _ = token.cancelled() => break,
            };
            // a sibling may have tripped the halt while we waited for the permit
            if token.is_cancelled() || halted.load(Ordering::Acquire) {
                break;
            }

            let fut = start(item);
            let halted = halted.clone();
            let halt_on = halt_on.clone();
            handles.push(tokio::spawn(async move {
                let out = fut.await;
                if halt_on(&out) {
                    halted.store(true, Ordering::Release);
                }
                drop(permit);
                out
            }));
        }

        let started = handles.len();
        let mut slots = Vec::with_capacity(total);
        for handle in handles {
            slots.push(match handle.await {
                Ok(out) => Slot::Completed(out),
                Err(e) => Slot::Panicked(panic_message(e)),
            });
        }
        if started < total {
            tracing::debug!(started, total, "pool stopped starting items");
        }
        slots.extend((started..total).map(|_| Slot::NotStarted));
        slots
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
