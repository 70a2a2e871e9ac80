use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::AggregateId;
use tokio::task::JoinHandle;

struct ArmedTask {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Armed {
    next_generation: u64,
    tasks: HashMap<AggregateId, ArmedTask>,
}

/// Registry of pending delayed tasks, one per key.
///
/// Cloning shares the registry. Requires a running tokio runtime when
/// scheduling.
#[derive(Clone, Default)]
pub struct DeferredTasks {
    armed: Arc<Mutex<Armed>>,
}

impl DeferredTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Armed> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms `task` to run after `delay` under `key`.
    ///
    /// A task already armed under `key` is aborted and will not run.
    pub fn schedule<F>(&self, key: AggregateId, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut armed = self.lock();
        armed.next_generation += 1;
        let generation = armed.next_generation;

        let registry = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The entry is claimed under the lock; a superseded or cancelled
            // task finds a different generation (or none) and stops here.
            if !registry.claim(key, generation) {
                return;
            }
            metrics::counter!("deferred_tasks_fired_total").increment(1);
            tracing::debug!(%key, "deferred task fired");
            task.await;
        });

        if let Some(previous) = armed.tasks.insert(key, ArmedTask { generation, handle }) {
            previous.handle.abort();
            tracing::debug!(%key, "deferred task superseded");
        }

        metrics::counter!("deferred_tasks_armed_total").increment(1);
        tracing::debug!(%key, delay_secs = delay.as_secs(), "deferred task armed");
    }

    fn claim(&self, key: AggregateId, generation: u64) -> bool {
        let mut armed = self.lock();
        match armed.tasks.get(&key) {
            Some(task) if task.generation == generation => {
                armed.tasks.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Disarms the task under `key`. Returns true if one was pending.
    pub fn cancel(&self, key: AggregateId) -> bool {
        match self.lock().tasks.remove(&key) {
            Some(task) => {
                task.handle.abort();
                tracing::debug!(%key, "deferred task disarmed");
                true
            }
            None => false,
        }
    }

    /// Returns true while a task under `key` is waiting to fire.
    pub fn is_armed(&self, key: AggregateId) -> bool {
        self.lock().tasks.contains_key(&key)
    }

    /// Number of tasks waiting to fire.
    pub fn armed_count(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Aborts every pending task.
    pub fn shutdown(&self) {
        let mut armed = self.lock();
        let pending = armed.tasks.len();
        for (_, task) in armed.tasks.drain() {
            task.handle.abort();
        }
        if pending > 0 {
            tracing::info!(pending, "deferred tasks aborted on shutdown");
        }
    }
}
