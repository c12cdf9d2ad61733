//! Task requests and the execution race.
//!
//! A request erases the caller's `T`/`E` behind a boxed job so the
//! backlog can hold heterogeneous work. Running the job spawns the
//! action on its own tokio task and races it against the timer; the
//! result is delivered through a oneshot completion exactly once.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinError;
use tracing::Instrument;

use crate::error::TaskError;
use crate::model::{TaskId, TaskOutcome};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
type Job = Box<dyn FnOnce() -> BoxFuture<TaskOutcome> + Send + 'static>;

pub(crate) type Completion<T, E> = oneshot::Sender<Result<T, TaskError<E>>>;

/// One submitted unit of work, waiting in the backlog or about to run.
///
/// Dropping a request without running it drops its completion sender,
/// which the waiting handle observes as [`TaskError::Cancelled`].
pub(crate) struct TaskRequest {
    pub(crate) id: TaskId,
    pub(crate) timeout: Option<Duration>,
    pub(crate) submitted_at: Instant,
    job: Job,
}

impl TaskRequest {
    pub(crate) fn new<F, Fut, T, E>(
        id: TaskId,
        action: F,
        timeout: Option<Duration>,
        completion: Completion<T, E>,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        Self {
            id,
            timeout,
            submitted_at: Instant::now(),
            job: Box::new(move || Box::pin(race(action, timeout, completion))),
        }
    }

    /// Invoke the action and wait for whichever of action or timer wins.
    pub(crate) fn run(self) -> BoxFuture<TaskOutcome> {
        (self.job)()
    }
}

async fn race<F, Fut, T, E>(
    action: F,
    timeout: Option<Duration>,
    completion: Completion<T, E>,
) -> TaskOutcome
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    // The closure is invoked inside the spawned task so a panic while
    // building the future is caught the same way as one while polling it.
    let mut work = tokio::spawn(async move { action().await }.in_current_span());

    let joined = match timeout {
        Some(after) => match tokio::time::timeout(after, &mut work).await {
            Ok(joined) => joined,
            Err(_) => {
                // Dropping `work` detaches the action; its result goes nowhere.
                let _ = completion.send(Err(TaskError::Timeout { after }));
                return TaskOutcome::TimedOut;
            }
        },
        None => work.await,
    };

    let (result, outcome) = match joined {
        Ok(Ok(value)) => (Ok(value), TaskOutcome::Completed),
        Ok(Err(err)) => (Err(TaskError::Failed(err)), TaskOutcome::Failed),
        Err(err) => (
            Err(TaskError::Panicked(join_error_message(err))),
            TaskOutcome::Panicked,
        ),
    };
    // The caller may have dropped its handle.
    let _ = completion.send(result);
    outcome
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    panic_message(err.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
