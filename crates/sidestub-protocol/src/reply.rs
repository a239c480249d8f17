//! Reply payload decoding

use crate::error::{ProtocolError, ProtocolResult};

/// Decoded contents of a reply packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK`
    Ok,
    /// `E<nn>`
    Error(u8),
    /// Empty body: the target does not support the command
    Unsupported,
    /// Hex-encoded binary data
    Data(Vec<u8>),
    /// Anything else, kept as text
    Text(String),
}

impl Reply {
    pub fn parse(payload: &[u8]) -> Reply {
        match payload {
            b"" => Reply::Unsupported,
            b"OK" => Reply::Ok,
            [b'E', hi, lo] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                match decode_hex(&payload[1..]) {
                    Ok(code) => Reply::Error(code[0]),
                    Err(_) => Reply::Text(String::from_utf8_lossy(payload).into_owned()),
                }
            }
            _ => match decode_hex(payload) {
                Ok(data) => Reply::Data(data),
                Err(_) => Reply::Text(String::from_utf8_lossy(payload).into_owned()),
            },
        }
    }
}

/// Decode a hex-encoded payload into bytes
pub fn decode_hex(payload: &[u8]) -> ProtocolResult<Vec<u8>> {
    hex::decode(payload).map_err(|e| ProtocolError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_and_empty() {
        assert_eq!(Reply::parse(b"OK"), Reply::Ok);
        assert_eq!(Reply::parse(b""), Reply::Unsupported);
    }

    #[test]
    fn test_parse_error_code() {
        assert_eq!(Reply::parse(b"E0e"), Reply::Error(0x0e));
    }

    #[test]
    fn test_parse_hex_data() {
        assert_eq!(
            Reply::parse(b"decafbad"),
            Reply::Data(vec![0xde, 0xca, 0xfb, 0xad])
        );
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(
            Reply::parse(b"a0=0x10 a1=0x2"),
            Reply::Text("a0=0x10 a1=0x2".into())
        );
        // Odd-length hex is not data
        assert_eq!(Reply::parse(b"abc"), Reply::Text("abc".into()));
    }

    #[test]
    fn test_decode_hex_error() {
        assert!(matches!(decode_hex(b"zz"), Err(ProtocolError::InvalidHex(_))));
    }
}
