//! Client-side wire protocols beyond plain HTTP.

pub mod websocket;
