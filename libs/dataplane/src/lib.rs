//! # Broker Data Plane
//!
//! Connects the wire codec, the binding registry and the large-message sync
//! state machine into the two connection handlers a broker node runs:
//!
//! - [`ServerSession`]: one client connection; queue management, routing
//!   of sent messages to bound queues, consumer delivery
//! - [`ReplicationEndpoint`]: the backup end of a replication channel
//!
//! Both consume a byte stream of length-prefixed [`Frame`]s and write their
//! replies as frames on the channel the request arrived on.
//!
//! ```rust
//! use bytes::BytesMut;
//! use codec::packets::{CreateQueue, SessionBindingQuery, SessionBindingQueryResponse};
//! use dataplane::{encode_frame, Broker, Frame, FrameDecoder};
//!
//! let broker = Broker::default();
//! let mut session = broker.open_session();
//!
//! let mut input = BytesMut::new();
//! let create = CreateQueue {
//!     address: "orders.#".into(),
//!     queue_name: "all-orders".into(),
//!     ..Default::default()
//! };
//! encode_frame(&Frame::new(10, create), &mut input);
//! encode_frame(
//!     &Frame::new(10, SessionBindingQuery { address: "orders.eu.new".into() }),
//!     &mut input,
//! );
//!
//! let mut output = BytesMut::new();
//! assert_eq!(session.handle_bytes(&mut input, &mut output).unwrap(), 2);
//!
//! let replies = FrameDecoder::client(1 << 20);
//! let _created = replies.decode(&mut output).unwrap().unwrap();
//! let query = replies.decode(&mut output).unwrap().unwrap();
//! assert_eq!(
//!     query.packet,
//!     SessionBindingQueryResponse {
//!         exists: true,
//!         queue_names: vec!["all-orders".into()],
//!     }
//!     .into()
//! );
//! ```

pub mod broker;
pub mod error;
pub mod frame;
pub mod queue;
pub mod replication_endpoint;
pub mod session;

pub use broker::Broker;
pub use error::{DataplaneError, DataplaneResult};
pub use frame::{encode_frame, Frame, FrameDecoder};
pub use queue::{Queue, QueueEndpoints};
pub use replication_endpoint::ReplicationEndpoint;
pub use session::{ServerSession, SessionOptions};
