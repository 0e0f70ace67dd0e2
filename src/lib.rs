//! # v2h
//!
//! Operator tooling for a Vehicle-to-Home (V2H) unit on the local network,
//! speaking ECHONET Lite over UDP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use v2h::{ClientOptions, EchonetClient, Poller};
//! use v2h::poller::STATUS_PROPERTIES;
//!
//! # async fn run() -> v2h::Result<()> {
//! let client = EchonetClient::bind(ClientOptions::default().with_multicast(false))?;
//! let poller = Poller::new(client, "192.168.1.20".parse().unwrap());
//! let snapshot = poller.poll(&STATUS_PROPERTIES).await?;
//! println!("{:?}", snapshot.get(0x80));
//! # Ok(())
//! # }
//! ```
//!
#[macro_use]
mod macros;
pub mod accumulator;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod render;
pub mod status;

pub use accumulator::{ResponseAccumulator, Snapshot};
pub use catalog::Catalog;
pub use client::{ClientOptions, EchonetClient, Inbound};
pub use config::Config;
pub use error::{Result, V2hError};
pub use poller::Poller;
pub use protocol::{DecodedMessage, Eoj, ServiceCode};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}
