use std::any::Any;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::error;

use super::{EngineError, ValidationEngine};

pub const DEFAULT_ENGINE_WORKERS: usize = 4;

/// Runs synchronous engine calls on the blocking thread pool, at most
/// `workers` at a time.
#[derive(Clone)]
pub struct EnginePool {
    engine: Arc<dyn ValidationEngine>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl EnginePool {
    pub fn new(engine: Arc<dyn ValidationEngine>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            engine,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Executes `job` against the engine off the async runtime. A panic inside
    /// `job` comes back as [`EngineError::WorkerFailed`].
    pub async fn run<F, T>(&self, job: F) -> Result<T, EngineError>
    where
        F: FnOnce(&dyn ValidationEngine) -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::WorkerFailed("engine pool is closed".to_string()))?;

        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || job(engine.as_ref())).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!("Engine call panicked: {}", message);
                Err(EngineError::WorkerFailed(format!("engine panicked: {}", message)))
            }
            Err(e) => Err(EngineError::WorkerFailed(e.to_string())),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
