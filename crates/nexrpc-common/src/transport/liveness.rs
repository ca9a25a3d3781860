//! Connection liveness tracking.
//!
//! A [`LivenessSupervisor`] remembers when a connection last read and last
//! wrote a frame. Connection loops ask it for the next idle deadline, sleep
//! until then alongside their I/O, and act on the resulting [`IdleEvent`]:
//! clients answer `WriterIdle` with a heartbeat, servers answer
//! `ReaderIdle` by closing the connection.

use std::time::Duration;
use tokio::time::Instant;

/// Default write-idle threshold on the client side (5 seconds)
pub const DEFAULT_WRITE_IDLE: Duration = Duration::from_secs(5);

/// Default read-idle threshold on the server side (30 seconds)
pub const DEFAULT_READ_IDLE: Duration = Duration::from_secs(30);

/// Idle thresholds for one connection. `None` disables that check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdleConfig {
    pub read_idle: Option<Duration>,
    pub write_idle: Option<Duration>,
}

impl IdleConfig {
    /// Client preset: heartbeat after 5s without writes, never close on read idle.
    pub fn client() -> Self {
        Self {
            read_idle: None,
            write_idle: Some(DEFAULT_WRITE_IDLE),
        }
    }

    /// Server preset: close after 30s without reads, never send heartbeats.
    pub fn server() -> Self {
        Self {
            read_idle: Some(DEFAULT_READ_IDLE),
            write_idle: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// Nothing was received within the read-idle threshold
    ReaderIdle,
    /// Nothing was sent within the write-idle threshold
    WriterIdle,
}

#[derive(Debug)]
pub struct LivenessSupervisor {
    config: IdleConfig,
    last_read: Instant,
    last_write: Instant,
}

impl LivenessSupervisor {
    pub fn new(config: IdleConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            last_read: now,
            last_write: now,
        }
    }

    pub fn config(&self) -> IdleConfig {
        self.config
    }

    pub fn record_read(&mut self) {
        self.last_read = Instant::now();
    }

    pub fn record_write(&mut self) {
        self.last_write = Instant::now();
    }

    /// The earliest instant at which an idle event could fire.
    pub fn next_deadline(&self) -> Option<Instant> {
        let read = self.config.read_idle.map(|d| self.last_read + d);
        let write = self.config.write_idle.map(|d| self.last_write + d);

        match (read, write) {
            (Some(r), Some(w)) => Some(r.min(w)),
            (r, w) => r.or(w),
        }
    }

    /// Reports the idle condition reached at `now`, if any.
    ///
    /// Reader idleness wins when both thresholds have elapsed, since a dead
    /// peer makes a heartbeat pointless.
    pub fn poll_idle(&self, now: Instant) -> Option<IdleEvent> {
        if let Some(read_idle) = self.config.read_idle {
            if now >= self.last_read + read_idle {
                return Some(IdleEvent::ReaderIdle);
            }
        }
        if let Some(write_idle) = self.config.write_idle {
            if now >= self.last_write + write_idle {
                return Some(IdleEvent::WriterIdle);
            }
        }
        None
    }
}

/// Sleeps until `deadline`, or forever when there is none.
///
/// Meant to be used as a `tokio::select!` branch next to connection I/O.
pub async fn sleep_until_idle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
