use crate::error::{ClientError, ClientResult};
use crate::sse::{SseDecoder, SseEvent, INCIDENT_EVENT};
use emberlog_core::{parse_incident, Incident, IncidentError, LiveState};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Receiver side of a live incident stream.
pub trait StreamHandler: Send + 'static {
    fn on_status(&mut self, state: LiveState);

    /// Only validated records arrive here.
    fn on_incident(&mut self, incident: Incident);

    /// A payload failed validation and was dropped.
    fn on_rejected(&mut self, _payload: &str, _error: &IncidentError) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(LiveState),
    Incident(Incident),
    Rejected(String),
}

impl StreamHandler for mpsc::UnboundedSender<StreamEvent> {
    fn on_status(&mut self, state: LiveState) {
        let _ = self.send(StreamEvent::Status(state));
    }

    fn on_incident(&mut self, incident: Incident) {
        let _ = self.send(StreamEvent::Incident(incident));
    }

    fn on_rejected(&mut self, _payload: &str, error: &IncidentError) {
        let _ = self.send(StreamEvent::Rejected(error.to_string()));
    }
}

/// Opens server-sent-event connections to the incidents feed.
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    url: String,
}

impl StreamClient {
    pub fn new(url: impl Into<String>) -> ClientResult<Self> {
        // No overall timeout: the response body is the long-lived stream.
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| ClientError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start one connection and route its events to `handler`.
    ///
    /// Reports `Connecting` before returning. Without a Tokio runtime on the calling
    /// thread no connection is attempted: the handler sees exactly `Closed` and the
    /// returned handle does nothing.
    pub fn open<H: StreamHandler>(&self, mut handler: H) -> StreamHandle {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(url = %self.url, "No async runtime available, incident stream stays closed");
                handler.on_status(LiveState::Closed);
                return StreamHandle::noop();
            }
        };

        let dispatcher = Arc::new(Dispatcher::new(handler));
        dispatcher.status(LiveState::Connecting);

        let task = runtime.spawn(run_stream(
            self.http.clone(),
            self.url.clone(),
            Arc::clone(&dispatcher),
        ));
        let stop: Arc<dyn StopSignal> = dispatcher;

        StreamHandle {
            stop: Some(stop),
            task: Some(task),
        }
    }
}

/// Teardown handle for one open stream. Dropping it stops the stream.
pub struct StreamHandle {
    stop: Option<Arc<dyn StopSignal>>,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    fn noop() -> Self {
        Self {
            stop: None,
            task: None,
        }
    }

    /// Detach the handler and close the connection.
    ///
    /// Idempotent. Once this returns, no handler callback starts again. Outside a
    /// callback it also waits for one already running on another thread. Calling it
    /// from inside the handler is allowed.
    pub fn stop(&self) {
        if let Some(stop) = &self.stop {
            stop.stop();
        }
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.as_ref().map_or(true, |s| s.is_stopped())
    }

    /// Wait for the connection task to finish, by stream end, error or [`stop`](Self::stop).
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

trait StopSignal: Send + Sync {
    fn stop(&self);
    fn is_stopped(&self) -> bool;
}

struct Dispatch<H> {
    handler: H,
    state: LiveState,
}

/// Serializes handler calls with `stop` so nothing is delivered after teardown.
///
/// `stop` from another thread waits out an in-flight callback. `stop` from inside a
/// callback only raises the flag, since the calling thread already holds the lock.
struct Dispatcher<H> {
    inner: Mutex<Dispatch<H>>,
    stopped: AtomicBool,
    delivering: Mutex<Option<ThreadId>>,
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<H: StreamHandler> Dispatcher<H> {
    fn new(handler: H) -> Self {
        Self {
            inner: Mutex::new(Dispatch {
                handler,
                state: LiveState::Connecting,
            }),
            stopped: AtomicBool::new(false),
            delivering: Mutex::new(None),
        }
    }

    fn deliver(&self, f: impl FnOnce(&mut Dispatch<H>)) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let mut inner = lock_ignoring_poison(&self.inner);
        // stop may have won the race for the lock
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        *lock_ignoring_poison(&self.delivering) = Some(thread::current().id());
        f(&mut *inner);
        *lock_ignoring_poison(&self.delivering) = None;
    }

    /// The first `Connecting` is delivered as the initial state.
    fn status(&self, next: LiveState) {
        self.deliver(|inner| {
            let initial = next == LiveState::Connecting && inner.state == LiveState::Connecting;
            if !initial && !inner.state.can_transition_to(next) {
                debug!(from = %inner.state, to = %next, "Ignoring status transition");
                return;
            }
            inner.state = next;
            inner.handler.on_status(next);
        });
    }

    fn incident(&self, incident: Incident) {
        self.deliver(|inner| {
            if inner.state == LiveState::Open {
                inner.handler.on_incident(incident);
            }
        });
    }

    fn rejected(&self, payload: &str, error: &IncidentError) {
        self.deliver(|inner| inner.handler.on_rejected(payload, error));
    }
}

impl<H: StreamHandler> StopSignal for Dispatcher<H> {
    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Incident stream handler detached");
        }
        let reentrant = *lock_ignoring_poison(&self.delivering) == Some(thread::current().id());
        if !reentrant {
            // wait for a callback running on another thread to finish
            drop(lock_ignoring_poison(&self.inner));
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

async fn run_stream<H: StreamHandler>(http: reqwest::Client, url: String, dispatcher: Arc<Dispatcher<H>>) {
    info!("Connecting to incident stream at {}", url);

    let response = match http
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to connect to incident stream: {}", e);
            dispatcher.status(LiveState::Closed);
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "Incident stream refused");
        dispatcher.status(LiveState::Closed);
        return;
    }

    info!("Connected to incident stream");
    dispatcher.status(LiveState::Open);

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for event in decoder.push(&bytes) {
                    handle_event(&dispatcher, event);
                }
            }
            Err(e) => {
                error!("Incident stream error: {}", e);
                break;
            }
        }
    }

    info!("Incident stream closed");
    dispatcher.status(LiveState::Closed);
}

fn handle_event<H: StreamHandler>(dispatcher: &Dispatcher<H>, event: SseEvent) {
    if event.event_type != INCIDENT_EVENT {
        debug!(event_type = %event.event_type, "Ignoring stream event");
        return;
    }

    match parse_incident(&event.data) {
        Ok(incident) => {
            debug!(id = incident.id, incident_type = %incident.incident_type, "Incident received");
            dispatcher.incident(incident);
        }
        Err(e) => {
            warn!("Discarding malformed incident from stream: {} (payload: {})", e, event.data);
            dispatcher.rejected(&event.data, &e);
        }
    }
}
