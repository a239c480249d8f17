//! Outbound packet encoding

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum;
use crate::{PACKET_START, TERMINATOR};

/// Frame a command: `$` + command + payload + `#` + checksum.
///
/// The checksum covers the command and payload bytes together.
pub fn encode(command: &str, payload: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(command.len() + payload.len() + 4);
    encode_into(command, payload, &mut buf);
    buf.freeze()
}

/// Frame a command into an existing buffer
pub fn encode_into(command: &str, payload: &str, buf: &mut BytesMut) {
    let sum = checksum::checksum(command.as_bytes())
        .wrapping_add(checksum::checksum(payload.as_bytes()));

    buf.put_u8(PACKET_START);
    buf.put_slice(command.as_bytes());
    buf.put_slice(payload.as_bytes());
    buf.put_u8(TERMINATOR);
    buf.put_slice(format!("{:02x}", sum).as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_only() {
        let expected = format!("$vTRfoo#{}", checksum::compute(b"vTRfoo"));
        assert_eq!(encode("vTRfoo", "").as_ref(), expected.as_bytes());
    }

    #[test]
    fn test_checksum_covers_payload() {
        assert_eq!(encode("vTR", "foo"), encode("vTRfoo", ""));
        assert_eq!(encode("m", "1000,4").as_ref(), b"$m1000,4#8e");
    }

    #[test]
    fn test_encode_into_appends() {
        let mut buf = BytesMut::new();
        encode_into("OK", "", &mut buf);
        encode_into("", "", &mut buf);
        assert_eq!(buf.as_ref(), b"$OK#9a$#00");
    }
}
