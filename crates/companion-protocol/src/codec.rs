//! Codec trait and the JSON implementation.
//!
//! A codec turns a [`Packet`] into frame payload bytes and back. Framing
//! itself (the length prefix) belongs to the transport; the codec only
//! ever sees one complete payload at a time.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{NameData, RawPacket, SnapshotData};
use crate::{Packet, ProtocolError};

/// Converts packets to and from payload bytes.
///
/// `Send + Sync + 'static` because a single codec is shared by every
/// session task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a packet. Total: every packet has an encoding.
    fn encode(&self, packet: &Packet) -> Vec<u8>;

    /// Parses one payload into a packet.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] if the bytes are not UTF-8, not JSON,
    /// missing fields, or carry an unknown `type`.
    fn decode(&self, data: &[u8]) -> Result<Packet, ProtocolError>;
}

/// A [`Codec`] speaking UTF-8 JSON.
///
/// ```rust
/// use companion_protocol::{Codec, JsonCodec, Packet};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Packet::AddOne { name: "wood".into() });
///
/// let decoded = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, Packet::AddOne { name: "wood".into() });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, packet: &Packet) -> Vec<u8> {
        packet.to_json().to_string().into_bytes()
    }

    fn decode(&self, data: &[u8]) -> Result<Packet, ProtocolError> {
        let text = std::str::from_utf8(data)?;
        let raw: RawPacket = serde_json::from_str(text).map_err(ProtocolError::Decode)?;

        let packet = match raw.kind.as_str() {
            Packet::SNAPSHOT => {
                let data: SnapshotData = from_data(raw.data)?;
                Packet::Snapshot { items: data.items }
            }
            Packet::ADD_ONE => Packet::AddOne {
                name: from_data::<NameData>(raw.data)?.name,
            },
            Packet::DELETE_ONE => Packet::DeleteOne {
                name: from_data::<NameData>(raw.data)?.name,
            },
            Packet::DELETE_ALL => Packet::DeleteAll {
                name: from_data::<NameData>(raw.data)?.name,
            },
            _ => return Err(ProtocolError::UnknownType(raw.kind)),
        };
        Ok(packet)
    }
}

fn from_data<T: DeserializeOwned>(data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemCount;

    fn decode(text: &str) -> Result<Packet, ProtocolError> {
        JsonCodec.decode(text.as_bytes())
    }

    #[test]
    fn test_decode_client_commands() {
        assert_eq!(
            decode(r#"{"type":"addOne","data":{"name":"wood"}}"#).unwrap(),
            Packet::AddOne { name: "wood".into() }
        );
        assert_eq!(
            decode(r#"{"type":"deleteOne","data":{"name":"wood"}}"#).unwrap(),
            Packet::DeleteOne { name: "wood".into() }
        );
        assert_eq!(
            decode(r#"{"type":"deleteAll","data":{"name":"wood"}}"#).unwrap(),
            Packet::DeleteAll { name: "wood".into() }
        );
    }

    #[test]
    fn test_decode_snapshot() {
        let packet = decode(
            r#"{"type":"snapshot","data":{"items":[{"name":"wood","amount":3}]}}"#,
        )
        .unwrap();
        assert_eq!(
            packet,
            Packet::Snapshot {
                items: vec![ItemCount::new("wood", 3)]
            }
        );
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let packet = decode(r#"{"type":"addOne","data":{"name":"wood","extra":1},"v":2}"#).unwrap();
        assert_eq!(packet, Packet::AddOne { name: "wood".into() });
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = decode(r#"{"type":"bogus","data":{"name":"wood"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref t) if t == "bogus"));
    }

    #[test]
    fn test_type_is_case_sensitive() {
        let err = decode(r#"{"type":"AddOne","data":{"name":"wood"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(_)));
    }

    #[test]
    fn test_missing_type_is_decode_error() {
        let err = decode(r#"{"data":{"name":"wood"}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_missing_data_is_decode_error() {
        let err = decode(r#"{"type":"addOne"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_negative_amount_is_decode_error() {
        let err = decode(
            r#"{"type":"snapshot","data":{"items":[{"name":"wood","amount":-1}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let err = decode("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = JsonCodec.decode(&[b'{', 0xff, 0xfe, b'}']).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidUtf8(_)));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let packets = [
            Packet::Snapshot { items: vec![] },
            Packet::Snapshot {
                items: vec![ItemCount::new("wood", 3), ItemCount::new("berry", 12)],
            },
            Packet::AddOne { name: "wood".into() },
            Packet::DeleteOne { name: "stone axe".into() },
            Packet::DeleteAll { name: "\"quoted\" \u{1F332}".into() },
        ];
        for packet in packets {
            let bytes = JsonCodec.encode(&packet);
            assert_eq!(JsonCodec.decode(&bytes).unwrap(), packet);
        }
    }
}
