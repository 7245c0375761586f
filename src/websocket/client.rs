//! Price stream client implementation.
//!
//! One background task owns the socket. It connects, flushes queued
//! subscription changes, pumps frames through the [`MessageHandler`] and
//! decides after every close whether to reconnect. The public handle talks to
//! it over an mpsc command channel and reads state through atomics.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::network::stream_url;
use crate::registry::SymbolRegistry;
use crate::shared::{normalize_symbols, ConnectionState, Symbol};
use crate::state::{PriceStore, SharedPriceStore};
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::handlers::MessageHandler;
use crate::websocket::reconnect::{Backoff, ReconnectPolicy};
use crate::websocket::subscriptions::{PendingFlush, SubscriptionManager};
use crate::websocket::types::{ClientMessage, WsEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// How long `disconnect()` waits for the task before aborting it
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// Price stream client configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Reconnect attempts before giving up and entering `Error`
    pub reconnect_attempts: u32,
    /// Base delay for exponential backoff (ms)
    pub base_delay_ms: u64,
    /// Maximum delay for exponential backoff (ms)
    pub max_delay_ms: u64,
    /// Randomize backoff delays to 75-100% of nominal
    pub jitter: bool,
    /// Interval for client ping (seconds). 0 disables pings.
    pub ping_interval_secs: u64,
    /// Connection is considered dead if no pong arrives within this time (seconds)
    pub pong_timeout_secs: u64,
    /// Timeout for opening a connection (seconds)
    pub connect_timeout_secs: u64,
    /// Whether to automatically reconnect on unexpected close
    pub auto_reconnect: bool,
    /// Whether to re-send tracked subscriptions after a reconnect
    pub auto_resubscribe: bool,
    /// Capacity of the event channel. Default: 1000
    pub event_channel_capacity: usize,
    /// Publish events on the client stream. Turn off when only the price
    /// store is read and nothing polls the stream.
    pub emit_events: bool,
    /// Capacity of the command channel. Default: 100
    pub command_channel_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 10,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            connect_timeout_secs: 30,
            auto_reconnect: true,
            auto_resubscribe: true,
            event_channel_capacity: 1000,
            emit_events: true,
            command_channel_capacity: 100,
        }
    }
}

/// State shared between the client handle and its connection task.
#[derive(Debug, Default)]
struct ConnectionStatus {
    state: AtomicU8,
    /// Set by a fatal gateway error; never cleared
    reconnect_disabled: AtomicBool,
    /// Events dropped on a full channel since the last delivered one
    dropped_events: AtomicU64,
}

impl ConnectionStatus {
    fn get(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    fn set(&self, state: ConnectionState) {
        self.state.store(state.into(), Ordering::SeqCst);
    }

    fn reconnect_disabled(&self) -> bool {
        self.reconnect_disabled.load(Ordering::SeqCst)
    }

    fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

/// Internal command for the connection task
enum Command {
    Subscribe(Vec<Symbol>),
    Unsubscribe(Vec<Symbol>),
    Ping,
    /// Skip the remaining backoff and reconnect now
    Reconnect,
    Disconnect,
}

/// Why the connected loop ended
enum DisconnectReason {
    UserRequested,
    Fatal,
    Closed(String),
    Failed(String),
}

pin_project! {
    /// Streaming client for the gateway's multi-symbol price feed.
    ///
    /// Trades are applied to the shared [`PriceStore`] as they arrive; the
    /// client is also a `Stream` of [`WsEvent`]s for callers that want the
    /// raw event flow.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use quantboard::websocket::*;
    /// use futures_util::StreamExt;
    ///
    /// let mut client = MarketStreamClient::from_url("https://api.example.com", ["BTCUSDT"]);
    /// client.connect().await;
    /// client.subscribe(["ethusdt"]).await;
    ///
    /// while let Some(event) = client.next().await {
    ///     if let WsEvent::Price { symbol, trade } = event {
    ///         println!("{} {}", symbol, trade.price);
    ///     }
    /// }
    /// ```
    pub struct MarketStreamClient {
        url: String,
        config: WebSocketConfig,
        status: Arc<ConnectionStatus>,
        subscriptions: Arc<RwLock<SubscriptionManager>>,
        store: SharedPriceStore,
        handler: Arc<MessageHandler>,
        cmd_tx: Option<mpsc::Sender<Command>>,
        #[pin]
        event_rx: mpsc::Receiver<WsEvent>,
        event_tx: mpsc::Sender<WsEvent>,
        task_handle: Option<JoinHandle<()>>,
    }

    impl PinnedDrop for MarketStreamClient {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(handle) = this.task_handle.take() {
                handle.abort();
            }
        }
    }
}

impl MarketStreamClient {
    /// Create a client that streams the registry's default symbols into `store`.
    /// Does not connect yet.
    pub fn new(
        api_base_url: &str,
        registry: &SymbolRegistry,
        store: SharedPriceStore,
        config: WebSocketConfig,
    ) -> Self {
        Self::with_symbols(
            api_base_url,
            registry.default_symbols().to_vec(),
            registry,
            store,
            config,
        )
    }

    /// Create a client whose connection URL carries `initial_symbols`.
    /// The initial set is truncated to the registry's subscription bound.
    pub fn with_symbols(
        api_base_url: &str,
        initial_symbols: Vec<Symbol>,
        registry: &SymbolRegistry,
        store: SharedPriceStore,
        config: WebSocketConfig,
    ) -> Self {
        let manager = SubscriptionManager::new(initial_symbols, registry.max_subscriptions());
        let url = stream_url(api_base_url, manager.initial());
        let subscriptions = Arc::new(RwLock::new(manager));
        let handler = Arc::new(MessageHandler::new(store.clone(), subscriptions.clone()));
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);

        Self {
            url,
            config,
            status: Arc::new(ConnectionStatus::default()),
            subscriptions,
            store,
            handler,
            cmd_tx: None,
            event_rx,
            event_tx,
            task_handle: None,
        }
    }

    /// Standalone client with a default registry and its own store.
    pub fn from_url<I, S>(api_base_url: &str, initial_symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = SymbolRegistry::default();
        let store = PriceStore::new(&registry).shared();
        Self::with_symbols(
            api_base_url,
            normalize_symbols(initial_symbols),
            &registry,
            store,
            WebSocketConfig::default(),
        )
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the connection.
    ///
    /// No-op while `Connecting` or `Connected`. While a reconnect is scheduled
    /// the remaining backoff is skipped. Failures never surface here; watch
    /// [`connection_state`](Self::connection_state) or the event stream.
    pub async fn connect(&mut self) {
        let current = self.status.get();
        if matches!(current, ConnectionState::Connecting | ConnectionState::Connected) {
            tracing::debug!("connect() ignored while {}", current);
            return;
        }

        if self.is_task_running() {
            if let Some(tx) = &self.cmd_tx {
                let _ = tx.try_send(Command::Reconnect);
            }
            return;
        }

        self.subscriptions.write().await.seed_initial();
        self.status.set(ConnectionState::Connecting);
        self.store
            .write()
            .await
            .set_connection_state(ConnectionState::Connecting);

        let (cmd_tx, cmd_rx) = mpsc::channel(self.config.command_channel_capacity);
        self.cmd_tx = Some(cmd_tx);

        let task = ConnectionTask {
            url: self.url.clone(),
            backoff: Backoff::new(ReconnectPolicy::from_config(&self.config)),
            config: self.config.clone(),
            status: self.status.clone(),
            subscriptions: self.subscriptions.clone(),
            store: self.store.clone(),
            handler: self.handler.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            opened_before: false,
        };

        self.task_handle = Some(tokio::spawn(task.run()));
    }

    /// Close the connection and forget every subscription.
    ///
    /// Cancels any scheduled reconnect. Tracked, confirmed and pending
    /// subscriptions are cleared, along with the store's subscription list.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.try_send(Command::Disconnect);
        }

        if let Some(handle) = self.task_handle.take() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(DISCONNECT_GRACE, handle).await.is_err() {
                tracing::warn!("Connection task did not stop in time, aborting");
                abort.abort();
            }
        }

        self.status.set(ConnectionState::Disconnected);
        self.subscriptions.write().await.clear();

        let mut store = self.store.write().await;
        store.set_connection_state(ConnectionState::Disconnected);
        store.set_subscribed_symbols(Vec::new());
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe to more symbols.
    ///
    /// Casing is normalized and duplicates dropped; an empty request is a
    /// no-op. Symbols already tracked are skipped and the request is
    /// truncated so the tracked set stays within the subscription bound.
    /// Sent immediately when connected, otherwise queued for the next open.
    pub async fn subscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return;
        }

        let mut subscriptions = self.subscriptions.write().await;
        let admitted = subscriptions.admit_subscribe(&symbols);
        if admitted.is_empty() {
            tracing::debug!("Nothing to subscribe from {:?}", symbols);
            return;
        }

        if !self.send_if_open(Command::Subscribe(admitted.clone())) {
            tracing::debug!("Queueing subscribe {:?} until connected", admitted);
            subscriptions.queue_subscribe(admitted);
        }
    }

    /// Unsubscribe from symbols. Same normalization and queueing rules as
    /// [`subscribe`](Self::subscribe).
    pub async fn unsubscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return;
        }

        let mut subscriptions = self.subscriptions.write().await;
        let removed = subscriptions.admit_unsubscribe(&symbols);

        if !self.send_if_open(Command::Unsubscribe(removed.clone())) {
            tracing::debug!("Queueing unsubscribe {:?} until connected", removed);
            subscriptions.queue_unsubscribe(removed);
        }
    }

    /// Hand a command to the live connection. Returns `false` when the
    /// connection is not open or the command channel is unavailable.
    fn send_if_open(&self, cmd: Command) -> bool {
        if self.status.get() != ConnectionState::Connected {
            return false;
        }
        match &self.cmd_tx {
            Some(tx) => match tx.try_send(cmd) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Command channel unavailable: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Send an application-level ping.
    pub fn ping(&self) -> WsResult<()> {
        match &self.cmd_tx {
            Some(tx) => tx.try_send(Command::Ping).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WebSocketError::ChannelClosed,
                mpsc::error::TrySendError::Closed(_) => WebSocketError::NotConnected,
            }),
            None => Err(WebSocketError::NotConnected),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.status.get()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.status.get() == ConnectionState::Connected
    }

    /// Whether a fatal gateway error has turned auto-reconnect off
    pub fn is_reconnect_disabled(&self) -> bool {
        self.status.reconnect_disabled()
    }

    /// Events dropped because nothing drained the stream in time. Resets
    /// once an event gets through.
    pub fn dropped_events(&self) -> u64 {
        self.status.dropped_events()
    }

    /// Check if the connection task is still running
    pub fn is_task_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Symbols the gateway has confirmed on the current connection
    pub async fn subscribed_symbols(&self) -> Vec<Symbol> {
        self.subscriptions.read().await.confirmed().to_vec()
    }

    /// Symbols the caller has asked for, within the subscription bound
    pub async fn tracked_symbols(&self) -> Vec<Symbol> {
        self.subscriptions.read().await.tracked().to_vec()
    }

    /// Requests waiting for the next connection open
    pub async fn pending_subscriptions(&self) -> PendingFlush {
        let subscriptions = self.subscriptions.read().await;
        PendingFlush {
            subscribe: subscriptions.pending_subscribe().to_vec(),
            unsubscribe: subscriptions.pending_unsubscribe().to_vec(),
        }
    }

    /// The shared price store this client feeds
    pub fn store(&self) -> &SharedPriceStore {
        &self.store
    }

    /// Get the stream URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the configuration
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Stream for MarketStreamClient {
    type Item = WsEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        this.event_rx.poll_recv(cx)
    }
}

// ============================================================================
// CONNECTION TASK
// ============================================================================

struct ConnectionTask {
    url: String,
    config: WebSocketConfig,
    status: Arc<ConnectionStatus>,
    subscriptions: Arc<RwLock<SubscriptionManager>>,
    store: SharedPriceStore,
    handler: Arc<MessageHandler>,
    event_tx: mpsc::Sender<WsEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    backoff: Backoff,
    opened_before: bool,
}

impl ConnectionTask {
    /// Use try_send so a slow consumer never stalls the socket
    fn emit(&self, event: WsEvent) {
        if !self.config.emit_events {
            return;
        }
        match self.event_tx.try_send(event) {
            Ok(()) => {
                let dropped = self.status.dropped_events.swap(0, Ordering::Relaxed);
                if dropped > 0 {
                    tracing::debug!("Event channel drained after {} dropped events", dropped);
                }
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.status.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 {
                    tracing::warn!("Event channel full, dropping events until the stream is polled");
                } else {
                    tracing::debug!("Event channel full, {} events dropped", dropped);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Event receiver dropped");
            }
        }
    }

    async fn set_state(&self, state: ConnectionState) {
        self.status.set(state);
        self.store.write().await.set_connection_state(state);
    }

    fn reconnect_enabled(&self) -> bool {
        self.config.auto_reconnect && !self.status.reconnect_disabled()
    }

    async fn run(mut self) {
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);

        loop {
            self.set_state(ConnectionState::Connecting).await;

            match attempt_connect(&self.url, connect_timeout).await {
                Ok(ws_stream) => {
                    self.backoff.reset();
                    self.set_state(ConnectionState::Connected).await;
                    tracing::info!("Connected to {}", self.url);
                    self.emit(WsEvent::Connected);

                    let (mut sink, source) = ws_stream.split();
                    self.flush_on_open(&mut sink).await;
                    self.opened_before = true;

                    match self.run_connected(sink, source).await {
                        DisconnectReason::UserRequested | DisconnectReason::Fatal => {
                            self.set_state(ConnectionState::Disconnected).await;
                            return;
                        }
                        DisconnectReason::Closed(reason) => {
                            tracing::info!("Connection closed: {}", reason);
                            self.set_state(ConnectionState::Disconnected).await;
                        }
                        DisconnectReason::Failed(reason) => {
                            tracing::warn!("Connection failed: {}", reason);
                            self.set_state(ConnectionState::Error).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Connection to {} failed: {}", self.url, e);
                    self.emit(WsEvent::Error { error: e });
                    self.set_state(ConnectionState::Error).await;
                }
            }

            if !self.reconnect_enabled() {
                tracing::info!("Auto-reconnect off, connection task stopping");
                return;
            }

            let attempt = self.backoff.attempts() + 1;
            let max_attempts = self.backoff.policy().max_attempts;
            match self.backoff.next_delay() {
                Some(delay) => {
                    let delay_ms = delay.as_millis() as u64;
                    tracing::info!(
                        "Reconnect attempt {}/{} in {}ms",
                        attempt,
                        max_attempts,
                        delay_ms
                    );
                    self.emit(WsEvent::Reconnecting { attempt, delay_ms });
                    if !self.wait_backoff(delay).await {
                        self.set_state(ConnectionState::Disconnected).await;
                        return;
                    }
                }
                None => {
                    tracing::warn!("Giving up after {} reconnect attempts", max_attempts);
                    self.set_state(ConnectionState::Error).await;
                    self.emit(WsEvent::Error {
                        error: WebSocketError::MaxReconnectAttempts(max_attempts),
                    });
                    self.emit(WsEvent::MaxReconnectReached);
                    return;
                }
            }
        }
    }

    /// Sleep out a backoff delay while still serving commands.
    /// Returns `false` if the client asked to stop.
    async fn wait_backoff(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return true,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Subscribe(symbols)) => {
                        self.subscriptions.write().await.queue_subscribe(symbols);
                    }
                    Some(Command::Unsubscribe(symbols)) => {
                        self.subscriptions.write().await.queue_unsubscribe(symbols);
                    }
                    Some(Command::Ping) => {}
                    Some(Command::Reconnect) => {
                        tracing::info!("Manual reconnect requested, skipping backoff");
                        return true;
                    }
                    Some(Command::Disconnect) | None => {
                        tracing::info!("Scheduled reconnect cancelled");
                        return false;
                    }
                }
            }
        }
    }

    /// Send queued subscription changes, deduplicated, once per open.
    async fn flush_on_open(&mut self, sink: &mut WsSink) {
        let flush = self
            .subscriptions
            .write()
            .await
            .plan_open(self.opened_before, self.config.auto_resubscribe);
        if flush.is_empty() {
            return;
        }

        tracing::info!(
            "Flushing {} subscribe and {} unsubscribe request(s)",
            flush.subscribe.len(),
            flush.unsubscribe.len()
        );

        // Unsubscribe first so the gateway's per-client cap never trims the subscribe
        if !flush.unsubscribe.is_empty() {
            let msg = ClientMessage::unsubscribe(flush.unsubscribe.clone());
            if let Err(e) = send_msg(sink, &msg).await {
                tracing::warn!("Failed to flush pending unsubscribe: {}", e);
                self.subscriptions.write().await.queue_unsubscribe(flush.unsubscribe);
            }
        }
        if !flush.subscribe.is_empty() {
            let msg = ClientMessage::subscribe(flush.subscribe.clone());
            if let Err(e) = send_msg(sink, &msg).await {
                tracing::warn!("Failed to flush pending subscribe: {}", e);
                self.subscriptions.write().await.queue_subscribe(flush.subscribe);
            }
        }
    }

    /// The connected loop. Runs until the connection ends.
    async fn run_connected(&mut self, mut sink: WsSink, mut source: WsSource) -> DisconnectReason {
        let ping_enabled = self.config.ping_interval_secs > 0;
        let ping_period = Duration::from_secs(self.config.ping_interval_secs.max(1));
        let pong_timeout = Duration::from_secs(self.config.pong_timeout_secs);
        let mut ping_interval = interval_at(Instant::now() + ping_period, ping_period);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut awaiting_pong_since: Option<Instant> = None;

        loop {
            tokio::select! {
                msg = source.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let events = self.handler.handle_message(&text).await;
                        let mut fatal = false;
                        for event in events {
                            match &event {
                                WsEvent::Pong => awaiting_pong_since = None,
                                WsEvent::Error { error } if error.is_fatal() => fatal = true,
                                _ => {}
                            }
                            self.emit(event);
                        }

                        if fatal {
                            self.status.reconnect_disabled.store(true, Ordering::SeqCst);
                            tracing::error!("Gateway data source disabled, auto-reconnect turned off");
                            let _ = sink.close().await;
                            self.emit(WsEvent::Disconnected {
                                reason: "Data source disabled".to_string(),
                            });
                            return DisconnectReason::Fatal;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = describe_close(frame.as_ref());
                        self.emit(WsEvent::Disconnected { reason: reason.clone() });
                        return DisconnectReason::Closed(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        let error = WebSocketError::from(e);
                        let reason = error.to_string();
                        self.emit(WsEvent::Error { error });
                        self.emit(WsEvent::Disconnected { reason: reason.clone() });
                        return DisconnectReason::Failed(reason);
                    }
                    None => {
                        self.emit(WsEvent::Disconnected {
                            reason: "Stream ended".to_string(),
                        });
                        return DisconnectReason::Closed("Stream ended".to_string());
                    }
                },

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Subscribe(symbols)) => {
                        let msg = ClientMessage::subscribe(symbols.clone());
                        if let Err(e) = send_msg(&mut sink, &msg).await {
                            tracing::warn!("Subscribe send failed, queueing for next open: {}", e);
                            self.subscriptions.write().await.queue_subscribe(symbols);
                        }
                    }
                    Some(Command::Unsubscribe(symbols)) => {
                        let msg = ClientMessage::unsubscribe(symbols.clone());
                        if let Err(e) = send_msg(&mut sink, &msg).await {
                            tracing::warn!("Unsubscribe send failed, queueing for next open: {}", e);
                            self.subscriptions.write().await.queue_unsubscribe(symbols);
                        }
                    }
                    Some(Command::Ping) => match send_msg(&mut sink, &ClientMessage::ping()).await {
                        Ok(()) => {
                            awaiting_pong_since.get_or_insert_with(Instant::now);
                        }
                        Err(e) => tracing::warn!("Failed to send ping: {}", e),
                    },
                    Some(Command::Reconnect) => {}
                    Some(Command::Disconnect) | None => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        self.emit(WsEvent::Disconnected {
                            reason: "Client disconnect".to_string(),
                        });
                        return DisconnectReason::UserRequested;
                    }
                },

                _ = ping_interval.tick(), if ping_enabled => {
                    if let Some(since) = awaiting_pong_since {
                        if since.elapsed() > pong_timeout {
                            tracing::warn!("Pong timeout: no response within {:?}", pong_timeout);
                            self.emit(WsEvent::Error { error: WebSocketError::PingTimeout });
                            self.emit(WsEvent::Disconnected {
                                reason: "Ping timeout".to_string(),
                            });
                            let _ = sink.close().await;
                            return DisconnectReason::Failed("Ping timeout".to_string());
                        }
                    }
                    match send_msg(&mut sink, &ClientMessage::ping()).await {
                        Ok(()) => {
                            awaiting_pong_since.get_or_insert_with(Instant::now);
                        }
                        Err(e) => tracing::warn!("Failed to send periodic ping: {}", e),
                    }
                }
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Open a connection with a timeout.
async fn attempt_connect(url: &str, timeout: Duration) -> WsResult<WsStream> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| WebSocketError::Timeout)?
        .map_err(WebSocketError::from)?;
    Ok(ws_stream)
}

/// Serialize and send a client message.
async fn send_msg(sink: &mut WsSink, msg: &ClientMessage) -> WsResult<()> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}

fn describe_close(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(f) => format!("code: {}, reason: {}", f.code, f.reason.as_str()),
        None => "no close frame".to_string(),
    }
}
