//! Client builder and drain loop.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring endpoints
//! and building the client. The [`Client`] owns the runtime and all
//! per-endpoint connections and exposes the two-call surface:
//! 1. `start_request` registers a pending request and queues its frame
//!    (returns immediately, no I/O)
//! 2. `wait_for_replies` drives all network progress and invokes
//!    callbacks until nothing is pending or the budget runs out
//!
//! All I/O happens cooperatively inside `wait_for_replies`, on the
//! caller's thread, via a current-thread runtime. There are no
//! background threads and no tasks; callbacks run on whichever thread
//! calls `wait_for_replies`.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use apc_client::Client;
//!
//! let mut client = Client::builder()
//!     .endpoint("tcp://127.0.0.1:50000")
//!     .build()?;
//!
//! client.start_request(
//!     "convert",
//!     vec!["你好世界".into()],
//!     Duration::from_millis(2000),
//!     |status, reply| println!("{status} - {}", reply.unwrap_or_default()),
//! );
//!
//! let pending = client.wait_for_replies(Duration::from_millis(4000));
//! assert_eq!(pending, 0);
//! # Ok::<(), apc_client::ApcError>(())
//! ```

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::select_all;
use tracing::{debug, error, trace, warn};

use crate::error::{ApcError, Result};
use crate::protocol::{
    build_frame, decode_reply_payload, status, Frame, Header, RequestEnvelope, Value,
    DEFAULT_MAX_PAYLOAD_SIZE,
};
use crate::registry::{PendingRequest, Registry};
use crate::transport::{Connection, Endpoint};

/// Default per-dial connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// How requests are spread across multiple configured endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Rotate through the endpoints in configuration order.
    #[default]
    RoundRobin,
    /// Send everything to the first configured endpoint.
    FirstListed,
}

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    endpoints: Vec<String>,
    dispatch_policy: DispatchPolicy,
    connect_timeout: Duration,
    max_payload_size: u32,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            dispatch_policy: DispatchPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Add one endpoint connection string (`tcp://host:port`,
    /// `ipc:///path` on Unix).
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoints.push(endpoint.to_string());
        self
    }

    /// Add several endpoint connection strings.
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(endpoints.into_iter().map(Into::into));
        self
    }

    /// Set how requests are spread across endpoints.
    ///
    /// Default: [`DispatchPolicy::RoundRobin`].
    pub fn dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch_policy = policy;
        self
    }

    /// Set the timeout for a single connect attempt.
    ///
    /// Default: 1 second.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum accepted reply payload size.
    ///
    /// Default: 16 MiB.
    pub fn max_payload_size(mut self, limit: u32) -> Self {
        self.max_payload_size = limit;
        self
    }

    /// Parse the endpoints and build the client.
    ///
    /// Construction never touches the network: connections are dialed
    /// lazily by the drain loop once there is traffic for them.
    pub fn build(self) -> Result<Client> {
        if self.endpoints.is_empty() {
            return Err(ApcError::Endpoint(
                "at least one endpoint is required".to_string(),
            ));
        }

        let endpoints = self
            .endpoints
            .iter()
            .map(|s| s.parse::<Endpoint>())
            .collect::<Result<Vec<_>>>()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;

        let conns = endpoints
            .into_iter()
            .map(|endpoint| Connection::new(endpoint, self.max_payload_size))
            .collect();

        Ok(Client {
            runtime,
            conns,
            registry: Registry::new(),
            dispatch_policy: self.dispatch_policy,
            connect_timeout: self.connect_timeout,
            rr_cursor: 0,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An asynchronous procedure-call client.
///
/// Owns its registry of pending requests and its connections; multiple
/// clients in one process are fully independent. The client is `Send`
/// but takes `&mut self` everywhere, so submissions and the drain loop
/// cannot race.
pub struct Client {
    /// Current-thread runtime; entered only by `wait_for_replies`.
    runtime: tokio::runtime::Runtime,
    /// One connection per configured endpoint.
    conns: Vec<Connection>,
    /// Table of in-flight requests.
    registry: Registry,
    /// Endpoint selection policy.
    dispatch_policy: DispatchPolicy,
    /// Per-dial connect timeout.
    connect_timeout: Duration,
    /// Round-robin position.
    rr_cursor: usize,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Submit a request. Returns immediately; no I/O happens here.
    ///
    /// The callback fires exactly once, from inside a later
    /// `wait_for_replies` call, with the reply status and payload, or
    /// with ([`status::TIMED_OUT`], `None`) once `timeout` elapses
    /// unanswered. An endpoint that cannot be reached surfaces the same
    /// way: submission never reports transport trouble.
    pub fn start_request<F>(&mut self, method: &str, args: Vec<Value>, timeout: Duration, callback: F)
    where
        F: FnOnce(u16, Option<String>) + Send + 'static,
    {
        let now = Instant::now();
        let deadline = deadline_after(now, timeout);
        let correlation_id = self.registry.allocate_id();
        let endpoint = self.pick_endpoint();

        let envelope = RequestEnvelope::new(method, args, timeout);
        match envelope.encode() {
            Ok(payload) => {
                let header = Header::request(correlation_id, payload.len() as u32);
                self.conns[endpoint].queue(Bytes::from(build_frame(&header, &payload)));
                trace!(
                    correlation_id,
                    method,
                    endpoint = %self.conns[endpoint].endpoint(),
                    "request queued"
                );
            }
            Err(e) => {
                // Nothing reaches the wire; the entry expires unanswered
                error!(correlation_id, method, error = %e, "failed to encode request");
            }
        }

        self.registry.insert(PendingRequest {
            correlation_id,
            method: method.to_string(),
            endpoint,
            submitted_at: now,
            deadline,
            callback: Box::new(callback),
        });
    }

    /// Drive the network and invoke callbacks until no requests are
    /// pending or `max_wait` has elapsed. Returns the number of requests
    /// still pending; they stay registered for a future call.
    ///
    /// A zero `max_wait` performs exactly one non-blocking poll pass.
    /// With an empty registry this returns 0 without blocking.
    pub fn wait_for_replies(&mut self, max_wait: Duration) -> usize {
        if self.registry.is_empty() {
            return 0;
        }

        let Self {
            runtime,
            conns,
            registry,
            connect_timeout,
            ..
        } = self;

        runtime.block_on(drain(conns, registry, *connect_timeout, max_wait))
    }

    /// Number of requests currently pending.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    fn pick_endpoint(&mut self) -> usize {
        match self.dispatch_policy {
            DispatchPolicy::FirstListed => 0,
            DispatchPolicy::RoundRobin => {
                let idx = self.rr_cursor % self.conns.len();
                self.rr_cursor = self.rr_cursor.wrapping_add(1);
                idx
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            debug!(
                abandoned = self.registry.len(),
                "client dropped with unresolved requests"
            );
        }
    }
}

/// Saturating deadline arithmetic: an absurd duration clamps to a year
/// out instead of panicking on `Instant` overflow.
fn deadline_after(start: Instant, wanted: Duration) -> Instant {
    start
        .checked_add(wanted)
        .unwrap_or_else(|| start + Duration::from_secs(365 * 24 * 60 * 60))
}

/// The drain loop: one iteration per wake-up, until the registry is
/// empty or the budget runs out.
async fn drain(
    conns: &mut [Connection],
    registry: &mut Registry,
    connect_timeout: Duration,
    max_wait: Duration,
) -> usize {
    let started = Instant::now();
    let budget_end = deadline_after(started, max_wait);

    loop {
        // Dial endpoints that have traffic for them, then push queued
        // frames out
        maintain_connections(conns, registry, connect_timeout, budget_end).await;
        for conn in conns.iter_mut() {
            conn.flush();
        }

        // Match whatever replies are already readable
        for conn in conns.iter_mut() {
            for frame in conn.recv() {
                resolve_reply(registry, frame);
            }
        }

        // Retire expired entries, soonest deadline first
        for expired in registry.take_expired(Instant::now()) {
            debug!(
                correlation_id = expired.correlation_id,
                method = %expired.method,
                "request timed out"
            );
            expired.resolve(status::TIMED_OUT, None);
        }

        if registry.is_empty() {
            break;
        }

        let now = Instant::now();
        if now >= budget_end {
            break;
        }

        // Sleep until a reply can arrive, a deadline passes, a paced
        // reconnect becomes due, or the budget ends
        let mut wake = budget_end;
        if let Some(deadline) = registry.next_deadline() {
            wake = wake.min(deadline);
        }
        if let Some(attempt) = next_dial_attempt(conns, registry) {
            wake = wake.min(attempt);
        }
        wait_for_activity(conns, wake).await;
    }

    registry.len()
}

/// Dial every disconnected endpoint that has queued frames or expected
/// replies, within the remaining budget.
async fn maintain_connections(
    conns: &mut [Connection],
    registry: &Registry,
    connect_timeout: Duration,
    budget_end: Instant,
) {
    for (idx, conn) in conns.iter_mut().enumerate() {
        if conn.is_connected() {
            continue;
        }
        if !conn.has_queued() && !registry.has_pending_on(idx) {
            continue;
        }
        let remaining = budget_end.saturating_duration_since(Instant::now());
        conn.ensure_connected(connect_timeout.min(remaining)).await;
    }
}

/// The soonest permitted dial among disconnected endpoints that still
/// have traffic for them.
fn next_dial_attempt(conns: &[Connection], registry: &Registry) -> Option<Instant> {
    conns
        .iter()
        .enumerate()
        .filter(|(idx, conn)| {
            !conn.is_connected() && (conn.has_queued() || registry.has_pending_on(*idx))
        })
        .map(|(_, conn)| conn.next_attempt())
        .min()
}

/// Block until any connection is readable or the wake time passes.
async fn wait_for_activity(conns: &[Connection], wake: Instant) {
    let sleep = tokio::time::sleep_until(wake.into());
    tokio::pin!(sleep);

    // Disconnected endpoints pend forever, so selecting across all of
    // them is safe; the sleep bounds the wait.
    let readables: Vec<_> = conns.iter().map(|conn| Box::pin(conn.readable())).collect();
    let any_readable = select_all(readables);

    tokio::select! {
        _ = &mut sleep => {}
        _ = any_readable => {}
    }
}

/// Route one inbound frame: fire the matching callback, or discard.
fn resolve_reply(registry: &mut Registry, frame: Frame) {
    if !frame.is_reply() {
        warn!(kind = frame.kind(), "discarding non-reply frame");
        return;
    }

    let correlation_id = frame.correlation_id();
    if !registry.contains(correlation_id) {
        // Late, duplicate, or someone else's: nobody owns it
        trace!(correlation_id, "discarding reply with no pending request");
        return;
    }

    match decode_reply_payload(frame.payload()) {
        Ok(payload) => {
            if let Some(pending) = registry.take(correlation_id) {
                debug!(
                    correlation_id,
                    method = %pending.method,
                    status = frame.status(),
                    elapsed_ms = pending.submitted_at.elapsed().as_millis() as u64,
                    "request resolved"
                );
                pending.resolve(frame.status(), payload);
            }
        }
        Err(e) => {
            // Keep the entry; the request rides out its deadline
            warn!(correlation_id, error = %e, "discarding malformed reply payload");
        }
    }
}
