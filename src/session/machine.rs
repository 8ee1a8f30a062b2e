//! Subscription session state machine.
//!
//! ```text
//! Idle ──start──► Handshaking ──ack OK──► Active
//!                     │                     │
//!                     └──── error/stop ─────┴──► Stopped
//! ```
//!
//! A started session runs on two tasks sharing one stream:
//! - the receive task dials, performs the handshake, then reads frames and
//!   hands message bodies to the callback, strictly in arrival order;
//! - the heartbeat task, spawned when the session turns Active, owns the
//!   write half and pings the publisher periodically.
//!
//! Every I/O step is raced against the connection's close signal and checked
//! against the session state on completion, so nothing reaches a callback
//! once [`SubscriptionSession::stop`] has run.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::ReentrantMutex;
use tokio::io::{AsyncRead, ReadHalf, WriteHalf};

use super::exception::{kinds, ProtocolException, SubscriptionError};
use super::heartbeat;
use super::supervisor::SessionSupervisor;
use crate::config::SubscriberConfig;
use crate::error::{Result, SubwireError};
use crate::protocol::{read_body, read_header, SubscribeRequest, WireHeader};
use crate::transport::{BoxedStream, Connection};

/// Callback receiving raw message bodies.
pub type MessageCallback = Box<dyn Fn(Bytes) + Send + Sync>;

/// Callback receiving terminal session errors.
pub type ErrorCallback = Box<dyn Fn(&SubscriptionError) + Send + Sync>;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Created, not started.
    Idle = 0,
    /// Dialing or waiting for the handshake reply.
    Handshaking = 1,
    /// Handshake accepted; receiving messages and sending heartbeats.
    Active = 2,
    /// Stopped by the caller or by an error. Terminal.
    Stopped = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Idle,
            1 => SessionState::Handshaking,
            2 => SessionState::Active,
            _ => SessionState::Stopped,
        }
    }
}

/// Why an I/O step did not produce a value.
pub(super) enum Interrupt {
    /// The session was stopped or its connection closed; drop the result.
    Stopped,
    /// The step failed; take the error path.
    Failed(SubscriptionError),
}

impl From<SubscriptionError> for Interrupt {
    fn from(err: SubscriptionError) -> Self {
        Interrupt::Failed(err)
    }
}

/// One live subscription to a topic on an endpoint.
pub struct SubscriptionSession {
    connection: Connection,
    topic: String,
    request: SubscribeRequest,
    on_message: MessageCallback,
    on_error: Option<ErrorCallback>,
    state: AtomicU8,
    /// Held while a user callback runs.
    callbacks: ReentrantMutex<()>,
    config: Arc<SubscriberConfig>,
    supervisor: Weak<dyn SessionSupervisor>,
}

impl SubscriptionSession {
    /// Create an idle session. Nothing happens until [`start`](Self::start).
    pub fn new(
        connection: Connection,
        topic: impl Into<String>,
        request: SubscribeRequest,
        on_message: MessageCallback,
        on_error: Option<ErrorCallback>,
        config: Arc<SubscriberConfig>,
        supervisor: Weak<dyn SessionSupervisor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection,
            topic: topic.into(),
            request,
            on_message,
            on_error,
            state: AtomicU8::new(SessionState::Idle as u8),
            callbacks: ReentrantMutex::new(()),
            config,
            supervisor,
        })
    }

    /// Publisher address.
    #[inline]
    pub fn endpoint(&self) -> SocketAddr {
        self.connection.endpoint()
    }

    /// Topic name.
    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the session is handshaking or active.
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Handshaking | SessionState::Active
        )
    }

    /// Start the session on the current Tokio runtime.
    ///
    /// Dials the publisher and runs the handshake in the background. Calling
    /// `start` on a session that is not idle does nothing.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SubwireError::NoRuntime)?;

        if !self.transition(SessionState::Idle, SessionState::Handshaking) {
            return Ok(());
        }

        tracing::debug!("Starting subscription {} on {}", self.topic, self.endpoint());
        runtime.spawn(self.clone().run());
        Ok(())
    }

    /// Stop the session.
    ///
    /// Closes the connection; reads, writes and timers already in flight are
    /// abandoned. If a callback is running on another thread, waits for it to
    /// return; no callback starts afterwards. Safe to call from inside a
    /// callback. Idempotent.
    pub fn stop(&self) {
        let previous = self.enter_stopped();
        self.connection.close();
        drop(self.callbacks.lock());
        if previous != SessionState::Stopped {
            tracing::debug!("Stopped subscription {} on {}", self.topic, self.endpoint());
        }
    }

    /// Receive task: dial, handshake, then the steady-state loop.
    async fn run(self: Arc<Self>) {
        let stream = match self.step(self.connection.open()).await {
            Ok(stream) => stream,
            Err(interrupt) => return self.interrupted(interrupt),
        };

        let (mut reader, mut writer) = tokio::io::split(stream);

        if let Err(interrupt) = self.handshake(&mut reader, &mut writer).await {
            return self.interrupted(interrupt);
        }

        if !self.transition(SessionState::Handshaking, SessionState::Active) {
            return;
        }
        tracing::debug!("Subscription {} on {} is active", self.topic, self.endpoint());

        tokio::spawn(heartbeat::run(
            self.clone(),
            writer,
            self.config.heartbeat_interval,
        ));

        let interrupt = self.receive_loop(&mut reader).await;
        self.interrupted(interrupt);
    }

    /// Send the subscribe request and interpret the publisher's reply.
    async fn handshake(
        &self,
        reader: &mut ReadHalf<BoxedStream>,
        writer: &mut WriteHalf<BoxedStream>,
    ) -> std::result::Result<(), Interrupt> {
        self.step(self.request.write_to(writer)).await?;

        let ack = self.step(read_header(reader)).await?;
        self.check_length(&ack)?;

        if ack.length == 0 {
            return if ack.is_ok() {
                Ok(())
            } else {
                Err(SubscriptionError::MalformedHandshakeReply {
                    result_code: ack.result_code,
                }
                .into())
            };
        }

        let body = self.step(read_body(reader, ack.length)).await?;
        if ack.is_ok() {
            Ok(())
        } else {
            Err(SubscriptionError::ServerRejected(self.decode_exception(&body)).into())
        }
    }

    /// Read frames until stopped or failed. Zero-length frames are heartbeat acks.
    async fn receive_loop<R>(&self, reader: &mut R) -> Interrupt
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let header = match self.step(read_header(reader)).await {
                Ok(header) => header,
                Err(interrupt) => return interrupt,
            };

            if header.is_heartbeat() {
                tracing::trace!("Heartbeat ack on {}", self.topic);
                continue;
            }

            if let Err(interrupt) = self.check_length(&header) {
                return interrupt;
            }

            match self.step(read_body(reader, header.length)).await {
                Ok(body) => self.deliver(body),
                Err(interrupt) => return interrupt,
            }
        }
    }

    /// Run one I/O step against the close signal.
    ///
    /// Returns `Interrupt::Stopped` if the connection closes first or the
    /// session stopped while the step was in flight.
    pub(super) async fn step<T, F>(&self, op: F) -> std::result::Result<T, Interrupt>
    where
        F: Future<Output = io::Result<T>>,
    {
        let result = tokio::select! {
            biased;
            _ = self.connection.closed() => return Err(Interrupt::Stopped),
            result = op => result,
        };

        if !self.is_live() {
            return Err(Interrupt::Stopped);
        }

        result.map_err(|e| Interrupt::Failed(e.into()))
    }

    /// Connection open and session running.
    #[inline]
    pub(super) fn is_live(&self) -> bool {
        self.connection.is_open() && self.is_running()
    }

    pub(super) fn connection(&self) -> &Connection {
        &self.connection
    }

    pub(super) fn interrupted(self: &Arc<Self>, interrupt: Interrupt) {
        if let Interrupt::Failed(error) = interrupt {
            self.fail(error);
        }
    }

    /// Uniform error path: stop, notify the caller, then the supervisor.
    ///
    /// Only the first failure of a running session is reported.
    pub(super) fn fail(self: &Arc<Self>, error: SubscriptionError) {
        {
            let _gate = self.callbacks.lock();
            let previous = self.enter_stopped();
            if !matches!(previous, SessionState::Handshaking | SessionState::Active) {
                return;
            }
            self.connection.close();

            tracing::warn!(
                "Subscription {} on {} failed: {}",
                self.topic,
                self.endpoint(),
                error
            );

            if let Some(on_error) = &self.on_error {
                on_error(&error);
            }
        }

        if let Some(supervisor) = self.supervisor.upgrade() {
            supervisor.session_failed(self);
        }
    }

    fn deliver(&self, body: Bytes) {
        let _gate = self.callbacks.lock();
        if self.is_live() {
            (self.on_message)(body);
        }
    }

    fn check_length(&self, header: &WireHeader) -> std::result::Result<(), Interrupt> {
        if header.validate(self.config.max_payload_size).is_err() {
            return Err(SubscriptionError::OversizedFrame {
                length: header.length,
                max: self.config.max_payload_size,
            }
            .into());
        }
        Ok(())
    }

    fn decode_exception(&self, body: &[u8]) -> ProtocolException {
        let decoded = match self.supervisor.upgrade() {
            Some(supervisor) => supervisor.decode_exception(body),
            None => Err(SubwireError::Protocol("no supervisor".to_string())),
        };

        decoded.unwrap_or_else(|e| {
            ProtocolException::new(kinds::UNKNOWN, format!("undecodable rejection: {}", e))
        })
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn enter_stopped(&self) -> SessionState {
        SessionState::from_u8(self.state.swap(SessionState::Stopped as u8, Ordering::AcqRel))
    }
}

impl fmt::Debug for SubscriptionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSession")
            .field("endpoint", &self.endpoint())
            .field("topic", &self.topic)
            .field("state", &self.state())
            .finish()
    }
}
