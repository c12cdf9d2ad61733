//! Queue engine: backlog, admission, task execution and caller handles.

pub mod handle;
pub mod queue;
mod task;

pub use handle::TaskHandle;
pub use queue::BoundedTaskQueue;
