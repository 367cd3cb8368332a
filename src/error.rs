use std::net::SocketAddr;

use thiserror::Error;

/// Failure to turn a datagram into a [`Message`](crate::protocol::Message) or back.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed datagram: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Encoded message is {len} bytes, over the {limit} byte datagram limit")]
    Oversized { len: usize, limit: usize },
}

#[derive(Error, Debug)]
pub enum FoldError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Quorum not reached: {registered} of {required} workers registered")]
    QuorumNotReached { registered: usize, required: usize },

    #[error("Registration failed after {attempts} attempts")]
    RegistrationFailed { attempts: u32 },

    #[error("A job is already in progress")]
    JobInProgress,

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Shutdown requested")]
    Shutdown,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FoldError>;
