//! Runs blocking git operations off the async runtime.
//!
//! Every call takes a permit from a shared semaphore so at most
//! `max_concurrent` git processes exist at once, then runs on the blocking
//! pool.

use handshake_common::{GitOperation, GitTransport, TransportError};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct GitExecutor {
    transport: Arc<dyn GitTransport>,
    permits: Arc<Semaphore>,
}

impl GitExecutor {
    pub fn new(transport: Arc<dyn GitTransport>, max_concurrent: usize) -> Self {
        Self {
            transport,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run `op` against the transport on the blocking pool.
    pub async fn run<T, F>(&self, operation: GitOperation, op: F) -> Result<T, TransportError>
    where
        F: FnOnce(&dyn GitTransport) -> Result<T, TransportError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Spawn {
                operation,
                detail: "git executor is shut down".to_string(),
            })?;
        let transport = Arc::clone(&self.transport);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            op(&*transport)
        })
        .await
        .map_err(|e| TransportError::Spawn {
            operation,
            detail: format!("git task aborted: {e}"),
        })?
    }
}
