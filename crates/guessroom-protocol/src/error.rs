//! Errors raised while turning frames into envelopes and back.

/// A frame that could not be encoded or understood.
///
/// Never about the network or room state: a `ProtocolError` means the bytes
/// themselves were wrong.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Malformed JSON, an unknown action `type`, a missing `playerId`, ...
    #[error("invalid message: {0}")]
    Decode(#[source] serde_json::Error),

    /// Well-formed, but clients may only send requests.
    #[error("expected a request, got {kind}")]
    UnexpectedPayload { seq: u64, kind: &'static str },
}

impl ProtocolError {
    /// The `seq` of the offending envelope, when it could be read.
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::UnexpectedPayload { seq, .. } => Some(*seq),
            Self::Encode(_) | Self::Decode(_) => None,
        }
    }
}
