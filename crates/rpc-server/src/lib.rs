//! Server-side half of the RPC runtime: accepts connections, negotiates a
//! codec, and dispatches requests to registered services.

mod connection;
mod error;
mod server;
mod service;

pub use error::ServerError;
pub use server::{Server, ServerConfig};
pub use service::{MethodDescriptor, Service};
