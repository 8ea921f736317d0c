//! Types related to GraphQL requests and responses on the wire.

mod request;
mod response;

pub use request::Request;
pub use response::Error;
pub use response::Location;
pub use response::Response;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

/// A JSON object as found in GraphQL payloads.
pub type Object = JsonMap<ByteString, Value>;
