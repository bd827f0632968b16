use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use tracing::warn;

use crate::actions::Action;
use crate::reducer::reduce_in_place;
use crate::state::AppState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store was already hydrated from a persisted snapshot")]
    AlreadyHydrated,
}

/// Sole owner of the application snapshot.
///
/// Readers get `Arc<AppState>` values that never change underneath them;
/// every write publishes a fresh snapshot to `subscribe()` receivers.
#[derive(Debug)]
pub struct Store {
    tx: watch::Sender<Arc<AppState>>,
    hydrated: AtomicBool,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self {
            tx,
            hydrated: AtomicBool::new(false),
        }
    }

    pub fn get_state(&self) -> Arc<AppState> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.tx.subscribe()
    }

    /// Bulk-loads a persisted snapshot. Allowed once per store.
    pub fn hydrate(&self, snapshot: AppState) -> Result<(), StoreError> {
        if self.hydrated.swap(true, Ordering::SeqCst) {
            return Err(StoreError::AlreadyHydrated);
        }
        self.tx.send_modify(|current| *current = Arc::new(snapshot));
        debug!("store hydrated");
        Ok(())
    }

    /// Synchronously applies one action and publishes the result.
    pub fn dispatch(&self, action: Action) {
        if let Action::LoadState(snapshot) = action {
            if let Err(err) = self.hydrate(*snapshot) {
                warn!("ignoring load_state: {err}");
            }
            return;
        }
        debug!(action = action.label(), "dispatch");
        self.tx.send_modify(|current| {
            let mut next = (**current).clone();
            reduce_in_place(&mut next, action);
            *current = Arc::new(next);
        });
    }

    /// Derives actions from the current snapshot and applies all of them in
    /// one publish. Nothing is applied when `derive` fails or yields no
    /// actions, so callers never observe a partially applied batch.
    pub fn apply_with<E>(
        &self,
        derive: impl FnOnce(&AppState) -> Result<Vec<Action>, E>,
    ) -> Result<Vec<Action>, E> {
        let mut outcome = None;
        self.tx.send_if_modified(|current| {
            let actions = match derive(&**current) {
                Ok(actions) => actions,
                Err(err) => {
                    outcome = Some(Err(err));
                    return false;
                }
            };
            if actions.is_empty() {
                outcome = Some(Ok(actions));
                return false;
            }
            let mut next = (**current).clone();
            for action in actions.iter().cloned() {
                if matches!(action, Action::LoadState(_)) {
                    warn!("load_state is not allowed inside a batch; skipping");
                    continue;
                }
                reduce_in_place(&mut next, action);
            }
            *current = Arc::new(next);
            outcome = Some(Ok(actions));
            true
        });
        outcome.unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}
