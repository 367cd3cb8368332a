use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Coordinator-assigned chunk identifier. Unique for the life of the coordinator.
pub type ChunkId = u64;

/// Datagram kinds exchanged between coordinator and workers.
///
/// On the wire each message is a UTF-8 JSON object whose `type` field selects
/// the variant, e.g. `{"type":"TASK","chunk_id":3,"data":[1,2],"operation":"sum_and_stats"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// worker -> coordinator
    Register,
    /// coordinator -> worker
    Ack { message: String },
    /// worker -> coordinator
    Heartbeat,
    /// coordinator -> worker
    Task {
        chunk_id: ChunkId,
        data: Vec<i64>,
        operation: Operation,
    },
    /// worker -> coordinator
    Result {
        chunk_id: ChunkId,
        result: PartialResult,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SumAndStats,
}

/// Statistics a worker computes over one chunk.
///
/// An empty payload yields all zeros rather than infinite extrema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
    pub sum: i64,
    pub count: u64,
    pub min: i64,
    pub max: i64,
}

impl PartialResult {
    pub fn from_values(values: &[i64]) -> Self {
        let Some((&first, rest)) = values.split_first() else {
            return Self::default();
        };

        rest.iter().fold(
            Self {
                sum: first,
                count: 1,
                min: first,
                max: first,
            },
            |acc, &v| Self {
                sum: acc.sum.saturating_add(v),
                count: acc.count + 1,
                min: acc.min.min(v),
                max: acc.max.max(v),
            },
        )
    }
}

/// Borrowed twin of [`Message::Task`], same wire shape.
#[derive(Serialize)]
#[serde(tag = "type", rename = "TASK")]
struct TaskFrame<'a> {
    chunk_id: ChunkId,
    data: &'a [i64],
    operation: Operation,
}

impl Message {
    pub fn ack(text: impl Into<String>) -> Self {
        Message::Ack {
            message: text.into(),
        }
    }

    pub fn task(chunk_id: ChunkId, data: Vec<i64>) -> Self {
        Message::Task {
            chunk_id,
            data,
            operation: Operation::SumAndStats,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Register => "REGISTER",
            Message::Ack { .. } => "ACK",
            Message::Heartbeat => "HEARTBEAT",
            Message::Task { .. } => "TASK",
            Message::Result { .. } => "RESULT",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Encodes and rejects anything that would not fit in one datagram.
    pub fn encode_within(&self, limit: usize) -> Result<Vec<u8>, ProtocolError> {
        let bytes = self.encode()?;
        if bytes.len() > limit {
            return Err(ProtocolError::Oversized {
                len: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }

    /// Encodes a TASK straight from a borrowed payload, so the coordinator
    /// can keep the chunk data for retransmission without cloning it.
    pub fn encode_task(
        chunk_id: ChunkId,
        data: &[i64],
        limit: usize,
    ) -> Result<Vec<u8>, ProtocolError> {
        let bytes = serde_json::to_vec(&TaskFrame {
            chunk_id,
            data,
            operation: Operation::SumAndStats,
        })?;
        if bytes.len() > limit {
            return Err(ProtocolError::Oversized {
                len: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }

    /// Decodes one datagram. Older peers name the discriminator `command`
    /// instead of `type`; both are accepted.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut value: serde_json::Value = serde_json::from_slice(bytes)?;
        if let Some(obj) = value.as_object_mut() {
            if !obj.contains_key("type") {
                if let Some(kind) = obj.remove("command") {
                    obj.insert("type".to_string(), kind);
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}
