//! A typed GraphQL client engine: selections double as query builders and
//! payload decoders, so a request and the decoding of its response can
//! never drift apart.
//!
//! A [`Selection`] is built once and used twice. Composing an operation
//! runs it in mock mode to harvest the exact set of fields it will read;
//! decoding runs the same closure against real response data. Arguments
//! are carried as variables named after a hash of their values, which
//! makes repeated fields with different arguments coexist in one
//! operation without collisions.
//!
//! [`Client`] executes queries and mutations over HTTP, one request per
//! call. [`Subscriber`] drives subscriptions over a WebSocket connection
//! and surfaces each message as it arrives.

#![warn(unreachable_pub)]

mod client;
pub mod error;
pub mod graphql;
pub mod protocols;
pub mod select;

pub use client::Client;
pub use client::Reply;
pub use error::DecodeError;
pub use error::HttpError;
pub use protocols::websocket::Event;
pub use protocols::websocket::Subscriber;
pub use protocols::websocket::SubscriptionHandle;
pub use protocols::websocket::SubscriptionStream;
pub use select::Argument;
pub use select::Fields;
pub use select::Fragment;
pub use select::Operation;
pub use select::Scalar;
pub use select::Selection;
pub use select::compose;
