use crate::metrics;
use chrono::{DateTime, Utc};
use emberlog_client::{StreamEvent, StreamHandler};
use emberlog_core::{
    FetchTicket, Incident, IncidentError, IncidentPage, IncidentView, LiveOutcome, LiveState,
    MergeOutcome,
};
use std::collections::VecDeque;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

const EVENT_LOG_CAPACITY: usize = 200;

/// Everything that can change the dashboard from outside the input loop.
#[derive(Debug)]
pub enum AppMessage {
    Stream(StreamEvent),
    Page {
        ticket: FetchTicket,
        result: Result<IncidentPage, String>,
    },
}

/// Bridges the stream client callbacks onto the dashboard channel.
pub struct StreamForwarder(pub UnboundedSender<AppMessage>);

impl StreamHandler for StreamForwarder {
    fn on_status(&mut self, state: LiveState) {
        let _ = self.0.send(AppMessage::Stream(StreamEvent::Status(state)));
    }

    fn on_incident(&mut self, incident: Incident) {
        let _ = self.0.send(AppMessage::Stream(StreamEvent::Incident(incident)));
    }

    fn on_rejected(&mut self, _payload: &str, error: &IncidentError) {
        let _ = self
            .0
            .send(AppMessage::Stream(StreamEvent::Rejected(error.to_string())));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub level: EventLevel,
}

pub struct DashboardState {
    pub view: IncidentView,
    events: VecDeque<EventLogEntry>,
}

impl DashboardState {
    pub fn new(view: IncidentView) -> Self {
        Self {
            view,
            events: VecDeque::new(),
        }
    }

    /// Most recent first.
    pub fn events(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.events.iter().rev()
    }

    pub fn push_event(&mut self, level: EventLevel, text: impl Into<String>) {
        self.events.push_back(EventLogEntry {
            timestamp: Utc::now(),
            text: text.into(),
            level,
        });
        while self.events.len() > EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
    }

    /// Apply one message. Returns true when the table contents changed.
    pub fn apply(&mut self, message: AppMessage) -> bool {
        match message {
            AppMessage::Stream(StreamEvent::Status(state)) => {
                self.view.set_live_state(state);
                metrics::set_stream_open(state == LiveState::Open);
                let level = match state {
                    LiveState::Closed => EventLevel::Warning,
                    _ => EventLevel::Info,
                };
                self.push_event(level, format!("Live feed {state}"));
                false
            }
            AppMessage::Stream(StreamEvent::Incident(incident)) => self.apply_incident(incident),
            AppMessage::Stream(StreamEvent::Rejected(reason)) => {
                self.view.stats.record_rejected();
                metrics::record_rejected();
                self.push_event(EventLevel::Warning, format!("Dropped payload: {reason}"));
                false
            }
            AppMessage::Page { ticket, result: Ok(page) } => {
                let page_no = page.page;
                let rejected = page.rejected;
                let applied = self.view.apply_page(ticket, page);
                if applied {
                    debug!(page = page_no, "Page applied");
                    for _ in 0..rejected {
                        self.view.stats.record_rejected();
                        metrics::record_rejected();
                    }
                    if rejected > 0 {
                        self.push_event(
                            EventLevel::Warning,
                            format!("Dropped {rejected} malformed item(s) from page {page_no}"),
                        );
                    }
                }
                applied
            }
            AppMessage::Page { ticket, result: Err(message) } => {
                if self.view.apply_fetch_error(ticket, message.clone()) {
                    metrics::record_page_fetch_failure();
                    warn!("Page fetch failed: {}", message);
                    self.push_event(EventLevel::Error, format!("Fetch failed: {message}"));
                }
                false
            }
        }
    }

    fn apply_incident(&mut self, incident: Incident) -> bool {
        metrics::record_received();
        let summary = format!(
            "#{} {} at {}",
            incident.id, incident.incident_type, incident.address
        );

        match self.view.apply_live(incident) {
            LiveOutcome::Applied(MergeOutcome::Duplicate) => {
                metrics::record_duplicate();
                false
            }
            LiveOutcome::Applied(MergeOutcome::Inserted { evicted }) => {
                metrics::record_evicted(evicted);
                info!("New incident {}", summary);
                self.push_event(EventLevel::Info, summary);
                true
            }
            LiveOutcome::Applied(MergeOutcome::Dropped) => {
                metrics::record_evicted(1);
                false
            }
            LiveOutcome::OutOfView => {
                debug!("Live incident outside current view: {}", summary);
                false
            }
        }
    }
}
