use thiserror::Error;

/// Authentication progress on the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Idle,
    SaltRequested,
    SaltReceived,
    AuthRequested,
    Authenticated,
    /// The device answered the auth request with a nonzero result code.
    Failed(u32),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid auth state transition {from:?} -> {to:?}")]
pub struct AuthStateError {
    pub from: AuthState,
    pub to: AuthState,
}

impl AuthState {
    /// Validates and returns the next state.
    ///
    /// Any state may fall back to `Idle` (connection reset or aborted handshake).
    pub fn transition(self, next: AuthState) -> Result<AuthState, AuthStateError> {
        use AuthState::*;
        let allowed = matches!(
            (self, next),
            (_, Idle)
                | (Idle | Failed(_), SaltRequested)
                | (SaltRequested, SaltReceived)
                | (SaltReceived, AuthRequested)
                | (AuthRequested, Authenticated | Failed(_))
        );
        if allowed {
            Ok(next)
        } else {
            Err(AuthStateError {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_authenticated(self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// A salt or auth request is in flight or its reply is being processed.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            AuthState::SaltRequested | AuthState::SaltReceived | AuthState::AuthRequested
        )
    }
}
