//! Server lifecycle and in-flight call tracking.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Lifecycle of a tool server.
///
/// `Stopped -> Starting -> Listening -> Stopping -> Stopped`. A failed start
/// may also go straight from `Starting` back to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

impl ServerState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 1,
            Self::Listening => 2,
            Self::Stopping => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Listening,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    const fn can_move_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Starting)
                | (Self::Starting, Self::Listening | Self::Stopped)
                | (Self::Listening, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Listening => "listening",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    InvalidTransition { from: ServerState, to: ServerState },
    NotListening(ServerState),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid server transition: {from} -> {to}")
            }
            Self::NotListening(state) => write!(f, "server is not accepting calls ({state})"),
        }
    }
}

impl Error for LifecycleError {}

/// Shared lifecycle state for one server instance and all of its sessions.
#[derive(Debug)]
pub struct ServerLifecycle {
    state: AtomicU8,
    in_flight: AtomicUsize,
}

impl Default for ServerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLifecycle {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ServerState::Stopped.as_u8()),
            in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Moves to `next` if the current state allows it.
    ///
    /// # Errors
    /// Returns `LifecycleError::InvalidTransition` otherwise; the state is
    /// left unchanged.
    pub fn transition(&self, next: ServerState) -> Result<(), LifecycleError> {
        let mut current = self.state();
        loop {
            if !current.can_move_to(next) {
                return Err(LifecycleError::InvalidTransition {
                    from: current,
                    to: next,
                });
            }
            match self.state.compare_exchange(
                current.as_u8(),
                next.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = ServerState::from_u8(actual),
            }
        }
    }

    /// Number of tool calls currently executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Registers a call. The returned guard marks it finished when dropped.
    ///
    /// # Errors
    /// Returns `LifecycleError::NotListening` unless the server is listening.
    pub fn begin_call(self: &Arc<Self>) -> Result<CallGuard, LifecycleError> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = CallGuard {
            lifecycle: Arc::clone(self),
        };
        match self.state() {
            ServerState::Listening => Ok(guard),
            other => Err(LifecycleError::NotListening(other)),
        }
    }
}

/// Marks one in-flight call; dropping it returns the call to `Ready`.
#[derive(Debug)]
pub struct CallGuard {
    lifecycle: Arc<ServerLifecycle>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.lifecycle.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_full_cycle() {
        let lifecycle = ServerLifecycle::new();
        assert_eq!(lifecycle.state(), ServerState::Stopped);
        for next in [
            ServerState::Starting,
            ServerState::Listening,
            ServerState::Stopping,
            ServerState::Stopped,
        ] {
            lifecycle.transition(next).expect("valid transition");
            assert_eq!(lifecycle.state(), next);
        }
    }

    #[test]
    fn rejects_invalid_transitions() {
        let lifecycle = ServerLifecycle::new();
        let err = lifecycle
            .transition(ServerState::Listening)
            .expect_err("cannot listen before starting");
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: ServerState::Stopped,
                to: ServerState::Listening,
            }
        );
        assert_eq!(lifecycle.state(), ServerState::Stopped);

        lifecycle.transition(ServerState::Starting).expect("start");
        assert!(lifecycle.transition(ServerState::Starting).is_err());
        assert!(lifecycle.transition(ServerState::Stopping).is_err());
        lifecycle.transition(ServerState::Stopped).expect("failed start");
    }

    #[test]
    fn calls_are_tracked_and_gated_on_listening() {
        let lifecycle = Arc::new(ServerLifecycle::new());
        let err = lifecycle.begin_call().expect_err("not listening yet");
        assert_eq!(err, LifecycleError::NotListening(ServerState::Stopped));
        assert_eq!(lifecycle.in_flight(), 0);

        lifecycle.transition(ServerState::Starting).expect("start");
        lifecycle.transition(ServerState::Listening).expect("listen");
        let first = lifecycle.begin_call().expect("accepts calls");
        let second = lifecycle.begin_call().expect("accepts calls");
        assert_eq!(lifecycle.in_flight(), 2);
        drop(first);
        assert_eq!(lifecycle.in_flight(), 1);

        lifecycle.transition(ServerState::Stopping).expect("stop");
        assert!(lifecycle.begin_call().is_err());
        assert_eq!(lifecycle.in_flight(), 1);
        drop(second);
        assert_eq!(lifecycle.in_flight(), 0);
    }
}
