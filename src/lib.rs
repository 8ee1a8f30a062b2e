//! # subwire-client
//!
//! Subscription engine of an RPC client: one logical subscription per
//! (endpoint, topic) pair, kept alive with heartbeats, delivering every
//! message of the topic to a callback until stopped or the transport fails.
//!
//! ## Architecture
//!
//! - **Registry**: keyed store of live sessions, at most one per
//!   (endpoint, topic); failed sessions remove themselves
//! - **Session**: handshake, then a strictly ordered receive loop and an
//!   independent heartbeat loop sharing one stream
//! - **Wire**: 8-byte big-endian header (`length`, `result_code`) before every body
//!
//! ## Example
//!
//! ```ignore
//! use subwire_client::{SubscriptionRegistry, Topic};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SubscriptionRegistry::new();
//!
//!     let topic: Topic<&str, String> = Topic::new("news", "sports");
//!     registry.subscribe("127.0.0.1:9000".parse()?, topic, |headline| {
//!         println!("{}", headline);
//!     })?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod topic;
pub mod transport;

pub use codec::{Codec, JsonCodec, MsgPackCodec};
pub use config::SubscriberConfig;
pub use error::{Result, SubwireError};
pub use registry::{RegistryBuilder, SubscriptionRegistry};
pub use session::{ProtocolException, SessionState, SubscriptionError, SubscriptionSession};
pub use topic::{Topic, TopicDescriptor};
