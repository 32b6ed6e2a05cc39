//! The convergence-layer boundary for nodes bridged to a live transport.
//!
//! The engine only talks to [`ConvergenceLayer`].  When a transfer targets a
//! bridged node, the message is encoded as a JSON [`WireBundle`] and handed
//! to [`send_payload`](ConvergenceLayer::send_payload); the returned
//! [`Completion`] replaces the radio-speed transfer duration.  On completion
//! the bytes go back through [`on_receive`](ConvergenceLayer::on_receive).
//! Nothing here blocks: the adapter reports how long delivery takes and the
//! engine schedules the completion.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dtn_core::{MessageId, NodeId, SimDuration, SimTime};
use dtn_store::Message;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bundle encoding: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("unknown peer address {0:?}")]
    UnknownPeer(String),

    #[error("transport: {0}")]
    Transport(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Outcome of handing a payload to the transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Time until the payload is fully delivered to the peer.
    pub duration: SimDuration,
}

pub trait ConvergenceLayer: Send {
    fn name(&self) -> &'static str;

    fn send_payload(&mut self, peer_address: &str, bytes: &[u8]) -> BridgeResult<Completion>;

    fn on_receive(&mut self, bytes: &[u8]) -> BridgeResult<Message>;
}

// ── Wire format ───────────────────────────────────────────────────────────────

/// JSON form of a message crossing the convergence layer.  Times are
/// milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBundle {
    pub id:          u32,
    pub source:      u32,
    pub destination: u32,
    pub created_ms:  u64,
    pub ttl_ms:      u64,
    pub size:        u64,
    pub priority:    i32,
    pub hop_count:   u32,
}

impl WireBundle {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            id:          msg.id.0,
            source:      msg.source.0,
            destination: msg.destination.0,
            created_ms:  msg.created.as_millis(),
            ttl_ms:      msg.ttl.as_millis(),
            size:        msg.size,
            priority:    msg.priority,
            hop_count:   msg.hops.len() as u32,
        }
    }

    /// Rebuild a message with no holders or hop history.
    pub fn to_message(&self) -> Message {
        let mut m = Message::new(
            MessageId(self.id),
            NodeId(self.source),
            NodeId(self.destination),
            SimTime::from_millis(self.created_ms),
            SimDuration::from_millis(self.ttl_ms),
            self.size,
        );
        m.priority = self.priority;
        m
    }

    pub fn encode(&self) -> BridgeResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> BridgeResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ── LoopbackAdapter ───────────────────────────────────────────────────────────

/// In-memory convergence layer: fixed latency plus a bandwidth-limited
/// serialisation delay.  Records every payload it was given.
#[derive(Clone, Debug)]
pub struct LoopbackAdapter {
    latency:   SimDuration,
    /// Bytes per second.
    bandwidth: f64,
    /// Known peer addresses; empty accepts any.
    peers:     Vec<String>,
    sent:      Vec<(String, Vec<u8>)>,
}

impl LoopbackAdapter {
    pub fn new(latency: SimDuration, bandwidth: f64) -> Self {
        Self { latency, bandwidth, peers: Vec::new(), sent: Vec::new() }
    }

    /// Restrict accepted addresses to `peers`.
    pub fn with_peers(mut self, peers: Vec<String>) -> Self {
        self.peers = peers;
        self
    }

    /// `(address, payload)` for every accepted send, oldest first.
    pub fn sent(&self) -> &[(String, Vec<u8>)] {
        &self.sent
    }
}

impl ConvergenceLayer for LoopbackAdapter {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn send_payload(&mut self, peer_address: &str, bytes: &[u8]) -> BridgeResult<Completion> {
        if !self.peers.is_empty() && !self.peers.iter().any(|p| p == peer_address) {
            return Err(BridgeError::UnknownPeer(peer_address.to_string()));
        }
        if !(self.bandwidth > 0.0) {
            return Err(BridgeError::Transport("loopback bandwidth must be positive".into()));
        }
        self.sent.push((peer_address.to_string(), bytes.to_vec()));
        let wire = SimDuration::from_secs_f64(bytes.len() as f64 / self.bandwidth);
        Ok(Completion { duration: self.latency + wire })
    }

    fn on_receive(&mut self, bytes: &[u8]) -> BridgeResult<Message> {
        Ok(WireBundle::decode(bytes)?.to_message())
    }
}
