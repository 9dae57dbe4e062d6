//! Background execution of long pipeline jobs behind opaque task ids.
//!
//! A job runs on its own thread and writes progress into a shared status map;
//! callers only ever poll by id.

mod types;


pub use types::{TaskSnapshot, TaskStatus};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{MonotonicReporter, ProgressReporter};
use crate::error::EngineError;

type TaskMap<T> = Arc<Mutex<HashMap<Uuid, TaskSnapshot<T>>>>;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct TaskRegistry<T> {
    tasks: TaskMap<T>,
}

impl<T> Clone for TaskRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl<T: Clone + Send + 'static> Default for TaskRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> TaskRegistry<T> {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start `job` on a worker thread and return its id immediately.
    ///
    /// The job reports through the reporter it is handed; an `Err` or a panic
    /// ends the task in `TaskStatus::Error`.
    pub fn submit<F>(&self, job: F) -> Uuid
    where
        F: FnOnce(Arc<dyn ProgressReporter>) -> Result<T, EngineError> + Send + 'static,
    {
        let id = Uuid::new_v4();
        self.tasks.lock().insert(id, TaskSnapshot::submitted(id));

        let progress_tasks = Arc::clone(&self.tasks);
        let reporter: Arc<dyn ProgressReporter> = Arc::new(MonotonicReporter::new(
            move |percent: usize, _total: usize, message: &str| {
                if let Some(task) = progress_tasks.lock().get_mut(&id) {
                    task.progress = percent;
                    task.message = message.to_string();
                }
            },
        ));

        let tasks = Arc::clone(&self.tasks);
        thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(reporter)));
            let mut map = tasks.lock();
            let Some(task) = map.get_mut(&id) else {
                return;
            };
            task.finished_at = Some(Utc::now());
            match outcome {
                Ok(Ok(result)) => {
                    task.status = TaskStatus::Done;
                    task.progress = 100;
                    task.message = "done".to_string();
                    task.result = Some(result);
                    info!(%id, "task finished");
                }
                Ok(Err(err)) => {
                    task.status = TaskStatus::Error;
                    task.message = err.to_string();
                    task.error = Some(err.to_string());
                    warn!(%id, error = %err, "task failed");
                }
                Err(_) => {
                    task.status = TaskStatus::Error;
                    task.message = "worker panicked".to_string();
                    task.error = Some("worker panicked".to_string());
                    warn!(%id, "task panicked");
                }
            }
        });

        info!(%id, "task submitted");
        id
    }

    pub fn poll(&self, id: &Uuid) -> Option<TaskSnapshot<T>> {
        self.tasks.lock().get(id).cloned()
    }

    /// Forget a task, returning its last snapshot.
    pub fn remove(&self, id: &Uuid) -> Option<TaskSnapshot<T>> {
        self.tasks.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Poll until the task finishes or `timeout` passes.
    pub fn wait(&self, id: &Uuid, timeout: Duration) -> Option<TaskSnapshot<T>> {
        let deadline = Instant::now() + timeout;
        loop {
            let snapshot = self.poll(id)?;
            if snapshot.is_finished() || Instant::now() >= deadline {
                return Some(snapshot);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
