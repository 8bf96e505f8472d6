use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Connection status of one push-stream instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveState {
    Connecting,
    Open,
    /// Terminal. Covers both clean close and transport error.
    Closed,
}

impl LiveState {
    pub fn as_str(self) -> &'static str {
        match self {
            LiveState::Connecting => "connecting",
            LiveState::Open => "open",
            LiveState::Closed => "closed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LiveState::Closed
    }

    /// Allowed moves: connecting → open, connecting/open → closed.
    pub fn can_transition_to(self, next: LiveState) -> bool {
        matches!(
            (self, next),
            (LiveState::Connecting, LiveState::Open)
                | (LiveState::Connecting, LiveState::Closed)
                | (LiveState::Open, LiveState::Closed)
        )
    }
}

impl fmt::Display for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running counters for the live feed, shown in the dashboard header.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStats {
    pub state: LiveState,
    pub received: u64,
    pub rejected: u64,
    pub duplicates: u64,
    pub evicted: u64,
    pub last_incident_at: Option<DateTime<Utc>>,
}

impl Default for FeedStats {
    fn default() -> Self {
        Self {
            state: LiveState::Connecting,
            received: 0,
            rejected: 0,
            duplicates: 0,
            evicted: 0,
            last_incident_at: None,
        }
    }
}

impl FeedStats {
    pub fn record_received(&mut self) {
        self.received += 1;
        self.last_incident_at = Some(Utc::now());
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }

    pub fn record_evicted(&mut self, count: usize) {
        self.evicted += count as u64;
    }

    /// Seconds since the last accepted incident, if any arrived.
    pub fn idle_seconds(&self) -> Option<i64> {
        self.last_incident_at
            .map(|ts| Utc::now().signed_duration_since(ts).num_seconds())
    }
}
