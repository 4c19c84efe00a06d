//! Routing of decoded inbound frames.
//!
//! [`route`] is a pure decision from (reply, pending categories) to an
//! [`Action`]; [`Dispatcher`] applies actions to the device model and the
//! session's correlation slots.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::device::DeviceState;
use crate::messages::{
    AuthReply, FileData, Opcode, PollReply, Reply, Request, SaltReply, ZoneStatus,
};
use crate::session::{Category, PendingState, Session};
use crate::transfer::ChunkOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    UpdateIdentity(PollReply),
    UpdateZone(ZoneStatus),
    ResolveSalt(SaltReply),
    ResolveAuth(AuthReply),
    FeedTransfer(FileData),
    /// Reply for a category nobody is waiting on.
    Drop { opcode: Opcode, category: Category },
}

pub fn route(reply: Reply, pending: PendingState) -> Action {
    match reply {
        Reply::Poll(poll) => Action::UpdateIdentity(poll),
        Reply::ZoneStatus(status) => Action::UpdateZone(status),
        Reply::Salt(salt) if pending.salt => Action::ResolveSalt(salt),
        Reply::Auth(auth) if pending.auth => Action::ResolveAuth(auth),
        Reply::File(data) if pending.file => Action::FeedTransfer(data),
        Reply::Salt(_) => Action::Drop {
            opcode: Opcode::Salt,
            category: Category::Salt,
        },
        Reply::Auth(_) => Action::Drop {
            opcode: Opcode::Auth,
            category: Category::Auth,
        },
        Reply::File(_) => Action::Drop {
            opcode: Opcode::File,
            category: Category::File,
        },
    }
}

/// Applies routed replies. Owned by the connection read loop.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    session: Arc<Session>,
    state: Arc<Mutex<DeviceState>>,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>, state: Arc<Mutex<DeviceState>>) -> Self {
        Self { session, state }
    }

    /// Routes and applies one reply. Returns a follow-up request the caller
    /// must write to the stream (file continuation).
    pub fn dispatch(&self, reply: Reply) -> Option<Request> {
        let action = route(reply, self.session.pending());
        self.apply(action)
    }

    pub fn apply(&self, action: Action) -> Option<Request> {
        match action {
            Action::UpdateIdentity(poll) => {
                self.state.lock().apply_poll(&poll);
                None
            }
            Action::UpdateZone(status) => {
                self.state.lock().apply_zone_status(&status);
                None
            }
            Action::ResolveSalt(salt) => {
                if let Some(tx) = self.session.with_correlations(|c| c.salt.take()) {
                    let _ = tx.send(salt);
                }
                None
            }
            Action::ResolveAuth(auth) => {
                if let Some(tx) = self.session.with_correlations(|c| c.auth.take()) {
                    let _ = tx.send(auth);
                }
                None
            }
            Action::FeedTransfer(data) => self.session.with_correlations(|c| {
                let outcome = c.file.waiting_mut()?.transfer.on_chunk(&data);
                match outcome {
                    ChunkOutcome::Continue(next) => {
                        trace!(file = %next.filename, "requesting next file chunk");
                        Some(Request::File(next))
                    }
                    ChunkOutcome::Complete(bytes) => {
                        if let Some(waiter) = c.file.take() {
                            let _ = waiter.tx.send(Ok(bytes));
                        }
                        None
                    }
                    ChunkOutcome::Failed(err) => {
                        if let Some(waiter) = c.file.take() {
                            let _ = waiter.tx.send(Err(err));
                        }
                        None
                    }
                }
            }),
            Action::Drop { opcode, category } => {
                debug!(%opcode, %category, "dropping reply with no outstanding request");
                None
            }
        }
    }
}
