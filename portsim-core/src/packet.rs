use serde::{Deserialize, Serialize};

use crate::flow::FlowId;
use crate::time::SimTime;

/// Colour assigned by a three-colour marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Green,
    Yellow,
    Red,
}

/// A simulated packet.
///
/// Components move packets along the pipeline and never edit them in place;
/// the only derived value is a re-labelled copy produced by [`Packet::marked`].
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub created_at: SimTime,
    /// Size in bytes.
    pub size: u64,
    pub packet_id: u64,
    pub flow_id: FlowId,
    pub src: String,
    pub dst: String,
    pub color: Option<Color>,
}

impl Packet {
    pub fn new(created_at: SimTime, size: u64, packet_id: u64, flow_id: FlowId) -> Self {
        Self {
            created_at,
            size,
            packet_id,
            flow_id,
            src: String::new(),
            dst: String::new(),
            color: None,
        }
    }

    pub fn with_endpoints(self, src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            ..self
        }
    }

    /// Consumes the packet and returns it labelled with `color`.
    pub fn marked(self, color: Color) -> Self {
        Self {
            color: Some(color),
            ..self
        }
    }

    #[inline]
    pub fn size_bits(&self) -> f64 {
        self.size as f64 * 8.0
    }
}
