//! Per-connection session: authentication progress plus the correlation slots
//! shared between callers and the read loop.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::messages::{AuthReply, SaltReply};
use crate::transfer::{FileTransfer, TransferError};

pub mod correlation;
pub mod state;

pub use correlation::{Busy, Category, Correlations, PendingState, Slot, TransferWaiter};
pub use state::{AuthState, AuthStateError};

/// Shared session state. Locks are held only for synchronous bookkeeping,
/// never across an `.await`.
#[derive(Debug, Default)]
pub struct Session {
    auth: Mutex<AuthState>,
    correlations: Mutex<Correlations>,
}

impl Session {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn auth_state(&self) -> AuthState {
        *self.auth.lock()
    }

    pub fn transition(&self, next: AuthState) -> Result<(), AuthStateError> {
        let mut state = self.auth.lock();
        *state = state.transition(next)?;
        Ok(())
    }

    pub fn reset_auth(&self) {
        *self.auth.lock() = AuthState::Idle;
    }

    pub fn pending(&self) -> PendingState {
        self.correlations.lock().pending()
    }

    /// True when no request of any category is armed.
    pub fn is_quiet(&self) -> bool {
        self.correlations.lock().is_quiet()
    }

    pub fn with_correlations<R>(&self, f: impl FnOnce(&mut Correlations) -> R) -> R {
        f(&mut *self.correlations.lock())
    }

    /// Claims the salt slot. Fails synchronously if one is outstanding.
    pub fn arm_salt(
        self: &Arc<Self>,
    ) -> Result<(oneshot::Receiver<SaltReply>, SlotGuard), Busy> {
        let (tx, rx) = oneshot::channel();
        self.correlations.lock().salt.arm(Category::Salt, tx)?;
        Ok((rx, SlotGuard::new(self.clone(), Category::Salt)))
    }

    pub fn arm_auth(
        self: &Arc<Self>,
    ) -> Result<(oneshot::Receiver<AuthReply>, SlotGuard), Busy> {
        let (tx, rx) = oneshot::channel();
        self.correlations.lock().auth.arm(Category::Auth, tx)?;
        Ok((rx, SlotGuard::new(self.clone(), Category::Auth)))
    }

    pub fn arm_file(
        self: &Arc<Self>,
        transfer: FileTransfer,
    ) -> Result<(oneshot::Receiver<Result<Vec<u8>, TransferError>>, SlotGuard), Busy> {
        let (tx, rx) = oneshot::channel();
        self.correlations
            .lock()
            .file
            .arm(Category::File, TransferWaiter { transfer, tx })?;
        Ok((rx, SlotGuard::new(self.clone(), Category::File)))
    }

    /// Guard for one handshake attempt; see [`AuthProgress`].
    pub fn begin_handshake(self: &Arc<Self>) -> AuthProgress {
        AuthProgress {
            session: self.clone(),
        }
    }

    /// Fails every waiting request and forgets authentication.
    pub fn connection_lost(&self) {
        let failed = self.correlations.lock().fail_all();
        if failed > 0 {
            debug!(failed, "pending requests failed by connection loss");
        }
        self.reset_auth();
    }
}

/// Returns its slot to `Idle` when the owning request finishes or is dropped.
#[derive(Debug)]
pub struct SlotGuard {
    session: Arc<Session>,
    category: Category,
}

impl SlotGuard {
    fn new(session: Arc<Session>, category: Category) -> Self {
        Self { session, category }
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.session.correlations.lock().release(self.category);
    }
}

/// Returns an unfinished handshake to `Idle` when the attempt ends without
/// reaching `Authenticated` or `Failed`, including when its future is dropped.
#[derive(Debug)]
pub struct AuthProgress {
    session: Arc<Session>,
}

impl Drop for AuthProgress {
    fn drop(&mut self) {
        let mut state = self.session.auth.lock();
        if state.is_in_progress() {
            debug!(state = ?*state, "unfinished handshake reset");
            *state = AuthState::Idle;
        }
    }
}
