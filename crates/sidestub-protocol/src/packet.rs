//! Framed packets as received from the target

use bytes::Bytes;

use crate::checksum;
use crate::error::{ProtocolError, ProtocolResult};

/// Which class of frame a packet arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// `$...#xx` reply to an outstanding command
    StandardReply,
    /// `%...#xx` out-of-band notification
    Notification,
}

/// One complete frame. The checksum is kept exactly as received; the framer
/// never rejects a packet for a bad checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    payload: Bytes,
    checksum: [u8; 2],
}

impl Packet {
    pub fn new(kind: PacketKind, payload: impl Into<Bytes>, checksum: [u8; 2]) -> Self {
        Self {
            kind,
            payload: payload.into(),
            checksum,
        }
    }

    /// Build a well-formed packet, computing its checksum.
    pub fn with_valid_checksum(kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let digits = checksum::compute(&payload);
        let bytes = digits.as_bytes();
        Self::new(kind, payload, [bytes[0], bytes[1]])
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn is_notification(&self) -> bool {
        self.kind == PacketKind::Notification
    }

    /// Body bytes between the start marker and the terminator
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Checksum characters as received
    pub fn checksum(&self) -> &[u8; 2] {
        &self.checksum
    }

    /// Payload as text, replacing invalid UTF-8
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn verify(&self) -> bool {
        checksum::verify(&self.payload, &self.checksum)
    }

    /// Like [`Packet::verify`], but reports the mismatch as an error.
    pub fn check(&self) -> ProtocolResult<()> {
        if self.verify() {
            return Ok(());
        }
        Err(ProtocolError::ChecksumMismatch {
            expected: checksum::compute(&self.payload),
            received: String::from_utf8_lossy(&self.checksum).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_checksum() {
        let packet = Packet::with_valid_checksum(PacketKind::StandardReply, &b"OK"[..]);
        assert_eq!(packet.checksum(), b"9a");
        assert!(packet.check().is_ok());
    }

    #[test]
    fn test_check_reports_mismatch() {
        let packet = Packet::new(PacketKind::Notification, &b"Stopped"[..], *b"00");
        assert!(!packet.verify());
        let err = packet.check().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ChecksumMismatch {
                expected: checksum::compute(b"Stopped"),
                received: "00".to_string(),
            }
        );
    }
}
