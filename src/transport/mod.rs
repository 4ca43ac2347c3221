pub mod http;
pub mod sse;
pub mod stream;

use crate::model::{Instance, InstanceCommand};
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

pub use http::InstanceApi;
pub use stream::{SocketState, StreamClient, StreamEvent};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error, status: {status}")]
    Status { status: reqwest::StatusCode },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("cannot derive {kind} address from {url}")]
    Address { kind: &'static str, url: String },
}

pub trait InstanceGateway {
    fn fetch_instances(&self) -> impl Future<Output = Result<Vec<Instance>, TransportError>>;

    fn create_instance(&self) -> impl Future<Output = Result<Value, TransportError>>;

    fn delete_instance(&self, id: &str) -> impl Future<Output = Result<Value, TransportError>>;
}

pub trait CommandChannel {
    // Never queues: a command sent while the socket is not open is dropped.
    fn send_command(&self, command: &InstanceCommand);
}
