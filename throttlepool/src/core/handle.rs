//! Result handles for submitted tasks
//!
//! Every accepted task gets a [`TaskHandle`]. The worker that runs the task
//! sends the outcome over a oneshot channel; a panic inside the task becomes
//! [`TaskError::Panicked`], and a task dropped without running becomes
//! [`TaskError::Abandoned`]. The handle can be waited on from a plain thread
//! with [`join`](TaskHandle::join) or awaited from async code.

use super::TaskError;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

type Outcome<T> = Result<T, TaskError>;

/// Handle to the eventual outcome of one task
///
/// # Example
///
/// ```
/// use throttlepool::{PoolConfig, RateLimitedPool};
///
/// let pool = RateLimitedPool::new(PoolConfig::builder().max_workers(1).build().unwrap()).unwrap();
/// let handle = pool.submit(|| 6 * 7).unwrap();
/// assert_eq!(handle.join().unwrap(), 42);
/// ```
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Outcome<T>>,
    /// Outcome already pulled off the channel by `is_finished`
    outcome: Option<Outcome<T>>,
    consumed: bool,
}

/// Sending half kept with the queued task
pub(crate) struct Completion<T> {
    tx: oneshot::Sender<Outcome<T>>,
}

pub(crate) fn task_channel<T>() -> (Completion<T>, TaskHandle<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Completion { tx },
        TaskHandle {
            rx,
            outcome: None,
            consumed: false,
        },
    )
}

impl<T> Completion<T> {
    pub(crate) fn complete(self, outcome: Outcome<T>) {
        // Ignore send errors - the caller may have dropped the handle
        let _ = self.tx.send(outcome);
    }
}

impl<T> TaskHandle<T> {
    /// Block the current thread until the task finished and return its outcome
    ///
    /// Must not be called from within an async runtime; `.await` the handle
    /// there instead.
    pub fn join(mut self) -> Outcome<T> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        self.rx.blocking_recv().unwrap_or(Err(TaskError::Abandoned))
    }

    /// Whether the task finished (successfully or not)
    pub fn is_finished(&mut self) -> bool {
        if self.consumed || self.outcome.is_some() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.outcome = Some(Err(TaskError::Abandoned));
                true
            }
        }
    }

    /// Take the outcome if the task finished, without blocking
    ///
    /// Once this returned `Some`, the outcome has been moved out and later
    /// calls return `None`.
    pub fn try_join(&mut self) -> Option<Outcome<T>> {
        if !self.is_finished() {
            return None;
        }
        self.consumed = true;
        self.outcome.take()
    }
}

impl<T> Unpin for TaskHandle<T> {}

impl<T> Future for TaskHandle<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.outcome.take() {
            this.consumed = true;
            return Poll::Ready(outcome);
        }
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(received) => {
                this.consumed = true;
                Poll::Ready(received.unwrap_or(Err(TaskError::Abandoned)))
            }
        }
    }
}

/// Render a caught panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_returns_sent_outcome() {
        let (completion, handle) = task_channel::<u32>();
        completion.complete(Ok(7));
        assert_eq!(handle.join(), Ok(7));
    }

    #[test]
    fn test_dropped_completion_is_abandoned() {
        let (completion, mut handle) = task_channel::<u32>();
        assert!(!handle.is_finished());

        drop(completion);
        assert!(handle.is_finished());
        assert_eq!(handle.try_join(), Some(Err(TaskError::Abandoned)));
        assert_eq!(handle.try_join(), None);
    }

    #[test]
    fn test_is_finished_keeps_outcome_for_join() {
        let (completion, mut handle) = task_channel::<&'static str>();
        completion.complete(Err(TaskError::Panicked("boom".into())));

        assert!(handle.is_finished());
        assert!(handle.is_finished());
        assert_eq!(handle.join(), Err(TaskError::Panicked("boom".into())));
    }

    #[tokio::test]
    async fn test_handle_can_be_awaited() {
        let (completion, handle) = task_channel::<String>();
        std::thread::spawn(move || completion.complete(Ok("done".to_string())));
        assert_eq!(handle.await, Ok("done".to_string()));
    }

    #[test]
    fn test_panic_message_variants() {
        let from_str: Box<dyn Any + Send> = Box::new("static message");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let other: Box<dyn Any + Send> = Box::new(17u8);

        assert_eq!(panic_message(from_str.as_ref()), "static message");
        assert_eq!(panic_message(from_string.as_ref()), "owned message");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
