//! One-outstanding-request-per-category guards.
//!
//! Replies carry no request id, only their opcode, so at most one salt, one
//! auth and one file request may be in flight. A second request of the same
//! category is refused before anything is written.

use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::messages::{AuthReply, SaltReply};
use crate::transfer::{FileTransfer, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Salt,
    Auth,
    File,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Salt => write!(f, "salt"),
            Category::Auth => write!(f, "auth"),
            Category::File => write!(f, "file transfer"),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("a {0} request is already outstanding")]
pub struct Busy(pub Category);

/// Correlation state of one category.
#[derive(Debug)]
pub enum Slot<W> {
    Idle,
    Waiting(W),
    /// The waiter was handed its outcome (or dropped); the owning request has
    /// not released the slot yet.
    Resolved,
}

impl<W> Default for Slot<W> {
    fn default() -> Self {
        Slot::Idle
    }
}

impl<W> Slot<W> {
    pub fn arm(&mut self, category: Category, waiter: W) -> Result<(), Busy> {
        match self {
            Slot::Idle => {
                *self = Slot::Waiting(waiter);
                Ok(())
            }
            Slot::Waiting(_) | Slot::Resolved => Err(Busy(category)),
        }
    }

    /// Hands out the waiter and marks the slot resolved.
    pub fn take(&mut self) -> Option<W> {
        match std::mem::replace(self, Slot::Resolved) {
            Slot::Waiting(waiter) => Some(waiter),
            previous => {
                *self = previous;
                None
            }
        }
    }

    pub fn waiting_mut(&mut self) -> Option<&mut W> {
        match self {
            Slot::Waiting(waiter) => Some(waiter),
            _ => None,
        }
    }

    pub fn release(&mut self) {
        *self = Slot::Idle;
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Slot::Waiting(_))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Slot::Idle)
    }
}

/// Waiter for an in-progress file download.
#[derive(Debug)]
pub struct TransferWaiter {
    pub transfer: FileTransfer,
    pub tx: oneshot::Sender<Result<Vec<u8>, TransferError>>,
}

/// Which categories currently await a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingState {
    pub salt: bool,
    pub auth: bool,
    pub file: bool,
}

impl PendingState {
    pub fn is_waiting(&self, category: Category) -> bool {
        match category {
            Category::Salt => self.salt,
            Category::Auth => self.auth,
            Category::File => self.file,
        }
    }

    pub fn categories(&self) -> Vec<Category> {
        [Category::Salt, Category::Auth, Category::File]
            .into_iter()
            .filter(|c| self.is_waiting(*c))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Correlations {
    pub salt: Slot<oneshot::Sender<SaltReply>>,
    pub auth: Slot<oneshot::Sender<AuthReply>>,
    pub file: Slot<TransferWaiter>,
}

impl Correlations {
    pub fn pending(&self) -> PendingState {
        PendingState {
            salt: self.salt.is_waiting(),
            auth: self.auth.is_waiting(),
            file: self.file.is_waiting(),
        }
    }

    /// True when no slot is armed or awaiting release.
    pub fn is_quiet(&self) -> bool {
        self.salt.is_idle() && self.auth.is_idle() && self.file.is_idle()
    }

    pub fn release(&mut self, category: Category) {
        match category {
            Category::Salt => self.salt.release(),
            Category::Auth => self.auth.release(),
            Category::File => self.file.release(),
        }
    }

    /// Drops every waiter so its receiver observes a closed channel.
    pub fn fail_all(&mut self) -> usize {
        let mut failed = 0;
        failed += usize::from(self.salt.take().is_some());
        failed += usize::from(self.auth.take().is_some());
        if let Some(waiter) = self.file.take() {
            let _ = waiter.tx.send(Err(TransferError::Closed));
            failed += 1;
        }
        failed
    }
}
