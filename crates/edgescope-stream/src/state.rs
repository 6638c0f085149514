//! Stream connection state machine.
//!
//! ```text
//! disconnected --connect()--> connecting --open--> connected
//! connecting|connected --error--> reconnecting --timer--> connecting
//! any --disconnect()--> disconnected
//! ```
//!
//! Every connection attempt gets a fresh generation number. Transport
//! events and reconnect timers carry the generation they belong to, and
//! anything tagged with an older generation is ignored. That is what keeps
//! a stale timer from opening a second live connection after `connect()`
//! or `disconnect()` has moved on.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::backoff::ReconnectPolicy;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    pub fn is_connected(&self) -> bool {
        *self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do after a transport error or close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Stale or irrelevant event.
    Ignore,
    /// Schedule reconnect number `attempt` after `delay`.
    Reconnect { attempt: u32, delay: Duration },
    /// Attempt cap reached; now disconnected.
    GiveUp { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct StreamStateMachine {
    state: ConnectionState,
    attempt: u32,
    generation: u64,
    policy: ReconnectPolicy,
}

impl StreamStateMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            generation: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Whether `generation` is the live connection attempt.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Explicit connect. Supersedes whatever came before and resets the
    /// attempt counter. Returns the generation of the new attempt.
    pub fn connect(&mut self) -> u64 {
        self.generation += 1;
        self.attempt = 0;
        self.state = ConnectionState::Connecting;
        self.generation
    }

    /// Transport opened. Returns whether the transition happened.
    pub fn on_open(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.state != ConnectionState::Connecting {
            return false;
        }
        self.state = ConnectionState::Connected;
        self.attempt = 0;
        true
    }

    /// Transport errored or closed.
    pub fn on_error(&mut self, generation: u64) -> ErrorAction {
        if !self.is_current(generation)
            || !matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Connected
            )
        {
            return ErrorAction::Ignore;
        }

        if self.policy.is_exhausted(self.attempt) {
            self.state = ConnectionState::Disconnected;
            self.generation += 1;
            return ErrorAction::GiveUp {
                attempts: self.attempt,
            };
        }

        let attempt = self.attempt;
        let delay = self.policy.delay_for_attempt(attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.state = ConnectionState::Reconnecting;
        ErrorAction::Reconnect { attempt, delay }
    }

    /// Reconnect timer fired. Returns the generation for the new attempt,
    /// or `None` if the timer is stale.
    pub fn on_timer(&mut self, generation: u64) -> Option<u64> {
        if !self.is_current(generation) || self.state != ConnectionState::Reconnecting {
            return None;
        }
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        Some(self.generation)
    }

    /// Explicit disconnect. Terminal until the next `connect()`.
    pub fn disconnect(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StreamStateMachine {
        StreamStateMachine::new(ReconnectPolicy::default())
    }

    fn expect_delay(action: ErrorAction) -> u128 {
        match action {
            ErrorAction::Reconnect { delay, .. } => delay.as_millis(),
            other => panic!("expected reconnect, got {other:?}"),
        }
    }

    #[test]
    fn test_attempt_counter_saturates() {
        let mut m = machine();
        let gen = m.connect();
        m.attempt = u32::MAX;

        assert_eq!(expect_delay(m.on_error(gen)), 30_000);
        assert_eq!(m.attempt(), u32::MAX);
        assert_eq!(m.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_happy_path() {
        let mut m = machine();
        assert_eq!(m.state(), ConnectionState::Disconnected);

        let gen = m.connect();
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(m.on_open(gen));
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_backoff_grows_across_failed_attempts() {
        let mut m = machine();
        let mut gen = m.connect();

        let mut delays = Vec::new();
        for _ in 0..6 {
            delays.push(expect_delay(m.on_error(gen)));
            gen = m.on_timer(gen).unwrap();
        }
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_open_resets_attempt_counter() {
        let mut m = machine();
        let mut gen = m.connect();

        expect_delay(m.on_error(gen));
        gen = m.on_timer(gen).unwrap();
        expect_delay(m.on_error(gen));
        gen = m.on_timer(gen).unwrap();
        assert_eq!(m.attempt(), 2);

        assert!(m.on_open(gen));
        assert_eq!(m.attempt(), 0);
        assert_eq!(expect_delay(m.on_error(gen)), 2000);
    }

    #[test]
    fn test_stale_timer_after_connect_is_noop() {
        let mut m = machine();
        let old = m.connect();
        m.on_error(old);
        assert_eq!(m.state(), ConnectionState::Reconnecting);

        let fresh = m.connect();
        assert_eq!(m.on_timer(old), None);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.generation(), fresh);
    }

    #[test]
    fn test_stale_events_ignored() {
        let mut m = machine();
        let old = m.connect();
        let fresh = m.connect();

        assert!(!m.on_open(old));
        assert_eq!(m.on_error(old), ErrorAction::Ignore);
        assert!(m.on_open(fresh));
    }

    #[test]
    fn test_disconnect_is_terminal() {
        let mut m = machine();
        let gen = m.connect();
        m.on_open(gen);
        m.on_error(gen);

        m.disconnect();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.on_timer(gen), None);
        assert_eq!(m.on_error(gen), ErrorAction::Ignore);
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_cap_gives_up() {
        let mut m = StreamStateMachine::new(ReconnectPolicy::from_millis(10, 100, 2));
        let mut gen = m.connect();

        expect_delay(m.on_error(gen));
        gen = m.on_timer(gen).unwrap();
        expect_delay(m.on_error(gen));
        gen = m.on_timer(gen).unwrap();

        assert_eq!(m.on_error(gen), ErrorAction::GiveUp { attempts: 2 });
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }
}
