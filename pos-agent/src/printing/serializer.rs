//! Job serializer
//!
//! A FIFO queue in front of a single worker task that owns the state. Tasks
//! run one at a time, in submission order, and each task's outcome goes back
//! to its own caller only: a failing or panicking task never affects the
//! tasks queued behind it.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Task<S> = Box<dyn for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializerError {
    #[error("Printer busy: {0} jobs already queued")]
    Busy(usize),

    #[error("Print queue worker is not running")]
    WorkerGone,

    #[error("Print task panicked: {0}")]
    Panicked(String),
}

/// Handle to the queue; clones share the same worker
pub struct JobSerializer<S> {
    tx: mpsc::UnboundedSender<Task<S>>,
    /// Queued plus running
    pending: Arc<AtomicUsize>,
    capacity: Option<usize>,
}

impl<S> Clone for JobSerializer<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: self.pending.clone(),
            capacity: self.capacity,
        }
    }
}

fn boxed<S, F>(task: F) -> Task<S>
where
    F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(task)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<S: Send + 'static> JobSerializer<S> {
    /// Start the worker; `capacity` bounds queued plus running tasks
    ///
    /// Must be called inside a Tokio runtime. The worker stops once every
    /// handle is dropped.
    pub fn spawn(state: S, capacity: Option<usize>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task<S>>();

        tokio::spawn(async move {
            let mut state = state;
            while let Some(task) = rx.recv().await {
                task(&mut state).await;
            }
            debug!("Job serializer stopped");
        });

        Self {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Tasks waiting or running
    pub fn queued(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Queue `f` and wait for its result
    ///
    /// The task is queued before the first await, so tasks submitted from
    /// one caller run in the order `submit` was polled.
    pub async fn submit<F, T>(&self, f: F) -> Result<T, SerializerError>
    where
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, T> + Send + 'static,
        T: Send + 'static,
    {
        let ahead = self.pending.fetch_add(1, Ordering::SeqCst);
        if let Some(capacity) = self.capacity
            && ahead >= capacity
        {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(SerializerError::Busy(ahead));
        }
        debug!(queue_position = ahead, "Task queued");

        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = self.pending.clone();
        let task = boxed(move |state: &mut S| {
            Box::pin(async move {
                let outcome = AssertUnwindSafe(f(state)).catch_unwind().await;
                pending.fetch_sub(1, Ordering::SeqCst);
                let outcome = outcome.map_err(|payload| {
                    let message = panic_message(payload);
                    error!(panic = %message, "Print task panicked");
                    SerializerError::Panicked(message)
                });
                // The caller may have gone away; nothing to do then
                let _ = reply_tx.send(outcome);
            })
        });

        if self.tx.send(task).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(SerializerError::WorkerGone);
        }

        reply_rx.await.map_err(|_| SerializerError::WorkerGone)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobSerializer::spawn(Vec::<u32>::new(), None);

        let submit = |n: u32, delay: u64| {
            let queue = queue.clone();
            async move {
                queue
                    .submit(move |log: &mut Vec<u32>| {
                        Box::pin(async move {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                            log.push(n);
                        })
                    })
                    .await
            }
        };
        let (a, b, c) = tokio::join!(submit(1, 30), submit(2, 1), submit(3, 10));
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        let log = queue
            .submit(|log: &mut Vec<u32>| Box::pin(async move { log.clone() }))
            .await
            .unwrap();
        assert_eq!(log, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failure_does_not_poison() {
        let queue = JobSerializer::spawn(0u32, None);

        let failed: Result<Result<(), String>, _> = queue
            .submit(|_: &mut u32| Box::pin(async { Err("paper jam".to_string()) }))
            .await;
        assert_eq!(failed.unwrap(), Err("paper jam".to_string()));

        let next = queue
            .submit(|n: &mut u32| {
                Box::pin(async move {
                    *n += 1;
                    *n
                })
            })
            .await;
        assert_eq!(next, Ok(1));
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let queue = JobSerializer::spawn(0u32, None);

        let panicked = queue
            .submit(|n: &mut u32| {
                Box::pin(async move {
                    if *n == 0 {
                        panic!("boom");
                    }
                })
            })
            .await;
        assert_eq!(panicked, Err(SerializerError::Panicked("boom".into())));

        let after = queue.submit(|_: &mut u32| Box::pin(async { 7 })).await;
        assert_eq!(after, Ok(7));
        assert_eq!(queue.queued(), 0);
    }

    #[tokio::test]
    async fn test_capacity_rejects_when_full() {
        let queue = JobSerializer::spawn((), Some(1));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .submit(move |_: &mut ()| {
                        Box::pin(async move {
                            let _ = release_rx.await;
                        })
                    })
                    .await
            })
        };
        while queue.queued() == 0 {
            tokio::task::yield_now().await;
        }

        let rejected = queue.submit(|_: &mut ()| Box::pin(async {})).await;
        assert_eq!(rejected, Err(SerializerError::Busy(1)));

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), Ok(()));
        assert_eq!(queue.submit(|_: &mut ()| Box::pin(async {})).await, Ok(()));
    }
}
