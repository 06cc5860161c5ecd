//! The push channel worker.
//!
//! [`PushChannel`] runs the stream read loop on its own tokio task so the
//! consumer's loop is never blocked by a pending read. Payloads come back over
//! an mpsc channel as [`Delivery`] values tagged with the connection
//! generation; a consumer drops deliveries whose generation is not the current
//! one, which keeps a restarted channel from replaying anything queued by its
//! predecessor.
//!
//! Failure policy:
//!
//! - HTTP 401: report [`ChannelMessage::Unauthorized`] and stop for good.
//! - anything else (network drop, bad status, end of stream, framing error):
//!   report [`ChannelMessage::Error`], wait `reconnect_delay`, reconnect.
//!   Retries are unbounded and the delay is fixed.
//! - [`PushChannel::stop`]: silent, clean cancellation.
//! - [`HaltHandle::halt`]: the same cancellation requested from another task
//!   (the consumer, typically) without waiting for the worker to exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::frame::FrameDecoder;
use crate::transport::{ChunkSource, Transport};
use crate::{Error, Result};

/// Delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the delivery channel.
const DEFAULT_BUFFER: usize = 256;

/// Push channel configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    /// Event stream endpoint.
    pub url: String,
    /// Fixed delay before reconnecting after a failure.
    pub reconnect_delay: Duration,
    /// Capacity of the delivery channel; a full channel applies backpressure
    /// to the read loop rather than dropping payloads.
    pub buffer: usize,
}

impl PushConfig {
    /// Creates a configuration for `url` with default policy.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Sets the reconnect delay.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the delivery channel capacity.
    #[must_use]
    pub const fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }
}

/// What the worker reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    /// One decoded `data:` payload.
    Event(String),
    /// The server rejected the token; the worker has exited.
    Unauthorized,
    /// A connection failed; the worker will retry.
    Error(String),
}

/// A message stamped with the connection generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Generation returned by the [`PushChannel::connect`] call.
    pub generation: u64,
    /// Payload.
    pub message: ChannelMessage,
}

/// Stops a channel's worker from outside the task that owns the channel.
///
/// Cloned handles share one halt mark, so halting a generation also halts
/// every older one. Later connections are unaffected.
#[derive(Debug, Clone)]
pub struct HaltHandle {
    halted: Arc<watch::Sender<u64>>,
}

impl HaltHandle {
    /// Asks the worker of `generation` to drop its connection and exit.
    ///
    /// Returns without waiting. Returns false if that generation was already
    /// halted.
    pub fn halt(&self, generation: u64) -> bool {
        let halted = self.halted.send_if_modified(|mark| {
            if *mark < generation {
                *mark = generation;
                true
            } else {
                false
            }
        });
        if halted {
            debug!("Push worker halt requested (generation {})", generation);
        }
        halted
    }
}

/// Handle to the running worker task.
struct Worker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// One logical connection to the push endpoint.
pub struct PushChannel<T: Transport> {
    transport: Arc<T>,
    config: PushConfig,
    sender: mpsc::Sender<Delivery>,
    worker: Option<Worker>,
    generation: u64,
    halt: HaltHandle,
}

impl<T: Transport> PushChannel<T> {
    /// Creates an idle channel and the receiver its deliveries arrive on.
    #[must_use]
    pub fn new(transport: T, config: PushConfig) -> (Self, mpsc::Receiver<Delivery>) {
        let (sender, receiver) = mpsc::channel(config.buffer.max(1));
        let channel = Self {
            transport: Arc::new(transport),
            config,
            sender,
            worker: None,
            generation: 0,
            halt: HaltHandle {
                halted: Arc::new(watch::channel(0).0),
            },
        };
        (channel, receiver)
    }

    /// Starts the worker, tearing down any previous connection first.
    ///
    /// Returns the generation that tags this connection's deliveries.
    pub async fn connect(&mut self, token: Option<String>) -> u64 {
        if self.stop().await {
            debug!("Replaced existing push connection");
        }

        self.generation += 1;
        let generation = self.generation;
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.transport),
            self.config.clone(),
            token,
            generation,
            self.sender.clone(),
            stop_rx,
            self.halt.halted.subscribe(),
        ));

        info!("Push channel started (generation {})", generation);
        self.worker = Some(Worker {
            stop: stop_tx,
            handle,
        });
        generation
    }

    /// Stops the worker and waits for it to release the connection.
    ///
    /// Returns false if nothing was running.
    pub async fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };

        // The worker may already have exited (e.g. after a 401).
        let _ = worker.stop.send(());
        if let Err(e) = worker.handle.await
            && e.is_panic()
        {
            warn!("Push worker panicked: {}", e);
        }
        info!("Push channel stopped (generation {})", self.generation);
        true
    }

    /// Handle that halts this channel's workers without owning the channel.
    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Generation of the most recent `connect` call (0 before the first).
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true while a worker task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Channel configuration.
    #[must_use]
    pub const fn config(&self) -> &PushConfig {
        &self.config
    }
}

impl<T: Transport> Drop for PushChannel<T> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.handle.abort();
        }
    }
}

/// Worker entry point: races the stream loop against the stop and halt signals.
async fn run_worker<T: Transport>(
    transport: Arc<T>,
    config: PushConfig,
    token: Option<String>,
    generation: u64,
    sender: mpsc::Sender<Delivery>,
    stop: oneshot::Receiver<()>,
    mut halted: watch::Receiver<u64>,
) {
    tokio::select! {
        biased;
        _ = stop => debug!("Push worker cancelled (generation {})", generation),
        () = async {
            let _ = halted.wait_for(|mark| *mark >= generation).await;
        } => {
            info!("Push worker halted (generation {})", generation);
        }
        () = reconnect_loop(&*transport, &config, token.as_deref(), generation, &sender) => {}
    }
}

async fn reconnect_loop<T: Transport>(
    transport: &T,
    config: &PushConfig,
    token: Option<&str>,
    generation: u64,
    sender: &mpsc::Sender<Delivery>,
) {
    let mut attempt: u32 = 0;
    loop {
        let error = match read_stream(transport, config, token, generation, sender, &mut attempt)
            .await
        {
            Err(Error::Unauthorized) => {
                warn!("Push stream unauthorized (401); not retrying");
                deliver(sender, generation, ChannelMessage::Unauthorized).await;
                return;
            }
            Err(e) => e,
            // Consumer went away.
            Ok(()) => return,
        };

        if !deliver(sender, generation, ChannelMessage::Error(error.to_string())).await {
            return;
        }

        attempt = attempt.saturating_add(1);
        warn!(
            "Push stream failed: {}. Retrying in {:?} (attempt {})",
            error, config.reconnect_delay, attempt
        );
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

/// Reads one connection to completion.
///
/// Returns `Ok(())` only when the consumer has dropped its receiver; every
/// way the connection itself can end is an error.
async fn read_stream<T: Transport>(
    transport: &T,
    config: &PushConfig,
    token: Option<&str>,
    generation: u64,
    sender: &mpsc::Sender<Delivery>,
    attempt: &mut u32,
) -> Result<()> {
    let mut stream = transport.open(&config.url, token).await?;
    *attempt = 0;
    debug!("Push stream connected (generation {})", generation);

    let mut decoder = FrameDecoder::new();
    while let Some(chunk) = stream.next_chunk().await? {
        for payload in decoder.decode(&chunk)? {
            if !deliver(sender, generation, ChannelMessage::Event(payload)).await {
                return Ok(());
            }
        }
    }
    decoder.finish()?;

    if decoder.pending() > 0 {
        debug!(
            "Discarding {} bytes of incomplete frame at end of stream",
            decoder.pending()
        );
    }
    Err(Error::Closed)
}

/// Sends a delivery; returns false if the receiver is gone.
async fn deliver(sender: &mpsc::Sender<Delivery>, generation: u64, message: ChannelMessage) -> bool {
    sender
        .send(Delivery {
            generation,
            message,
        })
        .await
        .is_ok()
}
