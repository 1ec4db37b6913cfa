//! Turning envelopes into frames and back.

use crate::{ClientMessage, Envelope, Payload, ProtocolError};

/// Frame format for envelopes.
///
/// One instance is shared by every connection task, hence
/// `Send + Sync + 'static`.
pub trait Codec: Send + Sync + 'static {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError>;

    /// Decodes a frame sent by a client, returning its `seq` and message.
    ///
    /// Server-only payloads are refused with
    /// [`ProtocolError::UnexpectedPayload`].
    fn decode_client(
        &self,
        frame: &[u8],
    ) -> Result<(u64, ClientMessage), ProtocolError> {
        let Envelope { seq, payload, .. } = self.decode(frame)?;
        match payload {
            Payload::Request(request) => Ok((seq, ClientMessage::Room(request))),
            Payload::Register(register) => {
                Ok((seq, ClientMessage::Register(register)))
            }
            other => Err(ProtocolError::UnexpectedPayload {
                seq,
                kind: other.kind(),
            }),
        }
    }
}

/// JSON frames, as the browser clients speak.
///
/// ```rust
/// use guessroom_protocol::{
///     ClientAction, ClientMessage, Codec, JsonCodec, PlayerId, RoomId,
/// };
///
/// let frame = br#"{"seq":4,"payload":{"type":"Request","data":{
///     "roomId":7,"action":{"type":"startGame","playerId":1}}}}"#;
/// let (seq, message) = JsonCodec.decode_client(frame).unwrap();
/// assert_eq!(seq, 4);
/// let ClientMessage::Room(request) = message else { panic!() };
/// assert_eq!(request.room_id, RoomId(7));
/// assert_eq!(request.action, ClientAction::StartGame { player_id: PlayerId(1) });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(envelope).map_err(ProtocolError::Encode)
    }

    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError> {
        serde_json::from_slice(frame).map_err(ProtocolError::Decode)
    }
}
