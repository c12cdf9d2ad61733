use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::TaskError;
use crate::model::TaskId;

/// The caller's side of a submitted task.
///
/// Resolves exactly once: with the action's value, its error, a timeout,
/// a captured panic, or [`TaskError::Cancelled`] if the request was
/// cleared from the backlog. Dropping the handle does not stop the task.
#[must_use = "a TaskHandle does nothing unless awaited"]
#[derive(Debug)]
pub struct TaskHandle<T, E> {
    id: TaskId,
    completion: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E> TaskHandle<T, E> {
    pub(crate) fn new(id: TaskId, completion: oneshot::Receiver<Result<T, TaskError<E>>>) -> Self {
        Self { id, completion }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A closed channel means the request was dropped before it ran.
        Pin::new(&mut self.completion)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Cancelled)))
    }
}
