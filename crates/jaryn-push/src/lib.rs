//! # jaryn-push
//!
//! Server-sent event channel for the Jaryn Mail client.
//!
//! ## Features
//!
//! - **Incremental framing**: `data:` payloads are decoded from arbitrarily
//!   chunked `text/event-stream` bodies, preserving arrival order
//! - **Typed events**: [`PushEvent`] with a forward-compatible kind enum
//! - **Background worker**: the read loop runs on its own task; consumers
//!   receive generation-tagged [`Delivery`] messages over mpsc
//! - **Reconnect policy**: fixed-delay unbounded retry, no retry on 401
//!
//! ## Quick Start
//!
//! ```ignore
//! use jaryn_push::{ChannelMessage, HttpTransport, PushChannel, PushConfig, PushEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PushConfig::new("http://localhost:8080/event-stream");
//!     let (mut channel, mut deliveries) = PushChannel::new(HttpTransport::new(), config);
//!     let generation = channel.connect(Some("token".into())).await;
//!
//!     while let Some(delivery) = deliveries.recv().await {
//!         if delivery.generation != generation {
//!             continue;
//!         }
//!         match delivery.message {
//!             ChannelMessage::Event(payload) => println!("{:?}", PushEvent::parse(&payload)),
//!             ChannelMessage::Unauthorized => break,
//!             ChannelMessage::Error(e) => eprintln!("retrying: {e}"),
//!         }
//!     }
//!     channel.stop().await;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod channel;
mod error;
pub mod event;
pub mod frame;
pub mod transport;

pub use channel::{
    ChannelMessage, DEFAULT_RECONNECT_DELAY, Delivery, HaltHandle, PushChannel, PushConfig,
};
pub use error::{Error, Result};
pub use event::{PushEvent, PushEventKind};
pub use frame::{FrameDecoder, MAX_FRAME_LENGTH};
pub use transport::{ChunkSource, HttpStream, HttpTransport, ReaderStream, Transport};
