//! Publish state machine for tasksync.
//!
//! This module provides a pure, side-effect-free state machine deciding when
//! the outbound queue is published and when a lost connection is retried.
//! A publication that leaves events pending without accepting any of them
//! is retried after a backoff delay rather than immediately.
//! The state machine takes signals as input and produces a new state plus a
//! list of actions to execute.
//!
//! The actual I/O (connecting, publishing, timers) is performed by
//! sync-client, not by this module.

use std::time::Duration;

/// Publish state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PublishState {
    /// Not connected; nothing is published.
    #[default]
    Disconnected,
    /// Connection lost, waiting for the reconnect timer.
    Reconnecting {
        /// Which reconnection attempt is scheduled.
        attempt: u32,
    },
    /// Connected, no publication in flight.
    ConnectedIdle,
    /// Connected, a publication request is awaiting its response.
    Publishing {
        /// Consecutive attempts before this one that accepted nothing.
        failures: u32,
    },
    /// Connected, the last attempt accepted nothing; waiting for the retry
    /// timer.
    RetryWaiting {
        /// Which retry is scheduled.
        attempt: u32,
    },
}

impl PublishState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process a signal and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_signal(self, signal: Signal) -> (Self, Vec<Action>) {
        match (self, signal) {
            // Connection established
            (Self::Disconnected | Self::Reconnecting { .. }, Signal::Connected { pending }) => {
                let mut actions = vec![Action::Notify(Notification::Connected)];
                if pending > 0 {
                    actions.push(Action::Publish);
                    (Self::Publishing { failures: 0 }, actions)
                } else {
                    (Self::ConnectedIdle, actions)
                }
            }

            // Queue changed
            (Self::ConnectedIdle, Signal::QueueChanged { pending }) if pending > 0 => {
                (Self::Publishing { failures: 0 }, vec![Action::Publish])
            }
            // A new event is worth an early attempt; the backoff carries on
            (Self::RetryWaiting { attempt }, Signal::QueueChanged { pending }) if pending > 0 => {
                (Self::Publishing { failures: attempt }, vec![Action::Publish])
            }

            // Publication finished (success or failure)
            (Self::Publishing { failures }, Signal::PublishFinished { pending, progressed }) => {
                if pending == 0 {
                    (Self::ConnectedIdle, vec![])
                } else if progressed {
                    (Self::Publishing { failures: 0 }, vec![Action::Publish])
                } else {
                    let attempt = failures.saturating_add(1);
                    (
                        Self::RetryWaiting { attempt },
                        vec![Action::ScheduleRetry { attempt }],
                    )
                }
            }

            // Retry timer for the scheduled attempt; older timers are stale
            (Self::RetryWaiting { attempt }, Signal::RetryTimer { attempt: fired })
                if fired == attempt =>
            {
                (Self::Publishing { failures: attempt }, vec![Action::Publish])
            }

            // Connection lost or closed
            (
                Self::ConnectedIdle | Self::Publishing { .. } | Self::RetryWaiting { .. },
                Signal::Disconnected { reconnect },
            ) => {
                let notify = Action::Notify(Notification::Disconnected);
                if reconnect {
                    (
                        Self::Reconnecting { attempt: 1 },
                        vec![notify, Action::ScheduleReconnect { attempt: 1 }],
                    )
                } else {
                    (Self::Disconnected, vec![notify])
                }
            }
            (Self::Reconnecting { .. }, Signal::Disconnected { reconnect: false }) => {
                (Self::Disconnected, vec![])
            }

            // Reconnecting
            (Self::Reconnecting { attempt }, Signal::ReconnectTimer) => {
                (Self::Reconnecting { attempt }, vec![Action::Connect])
            }
            (Self::Reconnecting { attempt }, Signal::ConnectFailed) => {
                let next_attempt = attempt.saturating_add(1);
                (
                    Self::Reconnecting {
                        attempt: next_attempt,
                    },
                    vec![Action::ScheduleReconnect {
                        attempt: next_attempt,
                    }],
                )
            }

            // Everything else leaves the state unchanged
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            Self::ConnectedIdle | Self::Publishing { .. } | Self::RetryWaiting { .. }
        )
    }

    /// Check if a publication is in flight.
    pub fn is_publishing(&self) -> bool {
        matches!(self, Self::Publishing { .. })
    }
}

/// Inputs to the publish state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The transport connected.
    Connected {
        /// Events waiting in the queue.
        pending: usize,
    },
    /// The transport disconnected.
    Disconnected {
        /// Whether to schedule a reconnect.
        reconnect: bool,
    },
    /// An event was merged into the queue.
    QueueChanged {
        /// Events waiting in the queue.
        pending: usize,
    },
    /// A publication attempt ended.
    PublishFinished {
        /// Events still waiting in the queue.
        pending: usize,
        /// Whether any event was accepted.
        progressed: bool,
    },
    /// Reconnect timer fired.
    ReconnectTimer,
    /// Publication retry timer fired.
    RetryTimer {
        /// The attempt the timer was scheduled for.
        attempt: u32,
    },
    /// A reconnect attempt failed.
    ConnectFailed,
}

/// Actions to be executed by the sync-client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Publish a snapshot of the queue.
    Publish,
    /// Try to connect the transport.
    Connect,
    /// Start a timer for reconnection attempt `attempt`.
    ScheduleReconnect {
        /// Attempt number, starting at 1.
        attempt: u32,
    },
    /// Start a timer for publication retry `attempt`.
    ScheduleRetry {
        /// Attempt number, starting at 1.
        attempt: u32,
    },
    /// Tell subscribers about a lifecycle change.
    Notify(Notification),
}

/// Lifecycle changes reported to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Connected and ready to publish.
    Connected,
    /// Connection lost or closed.
    Disconnected,
}

/// Reconnection delay with jitter.
///
/// Exponential backoff with random jitter to prevent thundering herd when
/// many clients reconnect simultaneously after an authority restart.
///
/// Formula: min(30s, 2^attempt seconds) + random(0..=max_jitter)
pub fn backoff_delay(attempt: u32, max_jitter: Duration) -> Duration {
    let base_secs = 2u64.pow(attempt.min(5)).min(30);
    let base = Duration::from_secs(base_secs);

    let jitter_cap = u64::try_from(max_jitter.as_millis()).unwrap_or(u64::MAX);
    let jitter = Duration::from_millis(random_jitter_ms(jitter_cap));

    base + jitter
}

/// Random jitter between 0 and `cap` milliseconds.
fn random_jitter_ms(cap: u64) -> u64 {
    if cap == 0 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return cap / 2;
    }
    u64::from_le_bytes(bytes) % (cap + 1)
}
