use super::filter::Generations;
use crate::error::{FilterError, Result};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Handle to the background task rotating one filter's generations.
///
/// The task runs under a child of the filter's scope, so cancelling either
/// the scope or the handle stops it.
#[derive(Debug)]
pub(crate) struct RotationTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RotationTask {
    pub(crate) fn spawn(
        runtime: &Handle,
        state: Arc<RwLock<Generations>>,
        scope: &CancellationToken,
        ttl: Duration,
    ) -> Self {
        let token = scope.child_token();
        let handle = runtime.spawn(keep_rotating(state, token.clone(), ttl));
        Self { token, handle }
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

pub(crate) fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| {
        FilterError::RuntimeError(format!(
            "rotating filters need a tokio runtime: {e}"
        ))
    })
}

async fn keep_rotating(
    state: Arc<RwLock<Generations>>,
    token: CancellationToken,
    ttl: Duration,
) {
    // first tick one ttl from now, not immediately
    let mut ticker = interval_at(Instant::now() + ttl, ttl);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(?ttl, "Rotation task started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !rotate_once(&state, &token) {
            break;
        }
    }

    debug!("Rotation task stopped");
}

/// Performs one rotation under the write lock. Returns false when the task
/// should stop.
fn rotate_once(
    state: &RwLock<Generations>,
    token: &CancellationToken,
) -> bool {
    let Ok(mut generations) = state.write() else {
        error!("Generation lock poisoned, stopping rotation");
        return false;
    };
    // a restore may have cancelled us while we waited for the lock
    if token.is_cancelled() {
        return false;
    }
    generations.rotate();
    debug!(
        fill_ratio = generations.fill_ratio(),
        "Rotated filter generations"
    );
    true
}
