//! Bounded-retry reconnect state machine.
//!
//! The machine starts in `Connecting`. Every disconnect spends one unit of
//! the retry budget before the next attempt; the attempt that would spend the
//! last unit gives up instead. The budget never grows.

use std::time::Duration;

pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    GivingUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {event} while {from:?}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub event: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectMachine {
    state: ConnectionState,
    retries: u32,
    attempts: u32,
}

impl ReconnectMachine {
    pub fn new(retries: u32) -> Self {
        Self {
            state: ConnectionState::Connecting,
            retries,
            attempts: 1,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retries_left(&self) -> u32 {
        self.retries
    }

    /// Connection attempts made so far, the initial one included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `Connecting -> Connected`.
    pub fn opened(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            from => Err(InvalidTransition {
                from,
                event: "open",
            }),
        }
    }

    /// `Connected -> Disconnected`, or a failed handshake from `Connecting`.
    pub fn closed(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.state = ConnectionState::Disconnected;
                Ok(())
            }
            from => Err(InvalidTransition {
                from,
                event: "close",
            }),
        }
    }

    /// `Disconnected -> Connecting`, or `GivingUp` once the budget hits zero.
    pub fn retry(&mut self) -> Result<ConnectionState, InvalidTransition> {
        if self.state != ConnectionState::Disconnected {
            return Err(InvalidTransition {
                from: self.state,
                event: "retry",
            });
        }

        self.retries = self.retries.saturating_sub(1);
        self.state = if self.retries == 0 {
            ConnectionState::GivingUp
        } else {
            self.attempts += 1;
            ConnectionState::Connecting
        };
        Ok(self.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.state == ConnectionState::GivingUp
    }
}

impl Default for ReconnectMachine {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES)
    }
}
