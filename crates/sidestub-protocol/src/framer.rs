//! Packet framer
//!
//! Turns an inbound byte stream into discrete frames, one byte at a time:
//! - `Idle`: scanning for `$` or `%`; `+` is swallowed, `-` is a NAK
//! - `InBody`: accumulating payload until `#`
//! - `InChecksum`: counting down the two checksum characters
//!
//! The protocol has no length prefix, so the frame ends a fixed number of
//! bytes after the terminator. Checksum characters are never inspected for
//! delimiters.

use bytes::BytesMut;

use crate::error::{ProtocolError, ProtocolResult};
use crate::packet::{Packet, PacketKind};
use crate::{ACK, CHECKSUM_LEN, NAK, NOTIFICATION_START, PACKET_START, TERMINATOR};

/// Default upper bound on a single payload (64KB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Output of the framer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete packet or notification
    Packet(Packet),
    /// The peer asked for the last packet to be sent again
    Nak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    InBody { kind: PacketKind },
    InChecksum { kind: PacketKind, remaining: usize },
}

/// Byte-stream state machine producing [`Frame`]s
pub struct Framer {
    state: State,
    body: BytesMut,
    checksum: [u8; CHECKSUM_LEN],
    max_frame_len: usize,
}

impl Framer {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            state: State::Idle,
            body: BytesMut::with_capacity(256),
            checksum: [0; CHECKSUM_LEN],
            max_frame_len,
        }
    }

    /// True while no partial frame is buffered
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Advance the state machine by one byte.
    ///
    /// Errors are recoverable: the framer is back in `Idle` and ready for
    /// the next frame when one is returned.
    pub fn push(&mut self, byte: u8) -> ProtocolResult<Option<Frame>> {
        match self.state {
            State::Idle => match byte {
                ACK => Ok(None),
                NAK => Ok(Some(Frame::Nak)),
                PACKET_START => {
                    self.begin(PacketKind::StandardReply);
                    Ok(None)
                }
                NOTIFICATION_START => {
                    self.begin(PacketKind::Notification);
                    Ok(None)
                }
                _ => Err(ProtocolError::ProtocolViolation { byte }),
            },
            State::InBody { kind } => {
                if byte == TERMINATOR {
                    self.state = State::InChecksum {
                        kind,
                        remaining: CHECKSUM_LEN,
                    };
                    return Ok(None);
                }
                if self.body.len() >= self.max_frame_len {
                    self.reset();
                    return Err(ProtocolError::FrameTooLong {
                        max: self.max_frame_len,
                    });
                }
                self.body.extend_from_slice(&[byte]);
                Ok(None)
            }
            State::InChecksum { kind, remaining } => {
                self.checksum[CHECKSUM_LEN - remaining] = byte;
                if remaining > 1 {
                    self.state = State::InChecksum {
                        kind,
                        remaining: remaining - 1,
                    };
                    return Ok(None);
                }
                let payload = self.body.split().freeze();
                let packet = Packet::new(kind, payload, self.checksum);
                self.state = State::Idle;
                Ok(Some(Frame::Packet(packet)))
            }
        }
    }

    /// Feed a chunk of bytes, collecting every frame and error it produces.
    pub fn feed(&mut self, data: &[u8]) -> Vec<ProtocolResult<Frame>> {
        data.iter()
            .filter_map(|&b| self.push(b).transpose())
            .collect()
    }

    /// Drop any partial frame and return to `Idle`.
    pub fn reset(&mut self) {
        self.body.clear();
        self.state = State::Idle;
    }

    fn begin(&mut self, kind: PacketKind) {
        self.body.clear();
        self.state = State::InBody { kind };
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;

    fn frame(start: u8, body: &str) -> Vec<u8> {
        let mut out = vec![start];
        out.extend_from_slice(body.as_bytes());
        out.push(TERMINATOR);
        out.extend_from_slice(checksum::compute(body.as_bytes()).as_bytes());
        out
    }

    fn packets(results: Vec<ProtocolResult<Frame>>) -> Vec<Packet> {
        results
            .into_iter()
            .filter_map(|r| match r {
                Ok(Frame::Packet(p)) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_reply_and_notification() {
        let mut framer = Framer::new();
        let results = framer.feed(b"+$OK#9a+%Stopped#12");

        assert_eq!(results.len(), 2);
        let found = packets(results);
        assert_eq!(found[0].kind(), PacketKind::StandardReply);
        assert_eq!(found[0].payload().as_ref(), b"OK");
        assert!(found[0].verify());
        assert_eq!(found[1].kind(), PacketKind::Notification);
        assert_eq!(found[1].payload().as_ref(), b"Stopped");
        assert_eq!(found[1].checksum(), b"12");
        assert!(framer.is_idle());
    }

    #[test]
    fn test_checksum_may_contain_terminator() {
        let mut framer = Framer::new();
        let results = framer.feed(b"$abc##$#q");

        let found = packets(results);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload().as_ref(), b"abc");
        assert_eq!(found[0].checksum(), b"#$");
        assert!(!found[0].verify());

        // The trailing bytes are outside any frame
        assert!(framer.is_idle());
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let mut stream = vec![b'+'];
        stream.extend(frame(b'$', "vTRsys_write"));
        stream.extend(frame(b'%', "Tracepoint hit"));
        stream.push(b'+');
        stream.extend(frame(b'$', "deadbeef"));
        stream.extend(frame(b'%', ""));
        stream.extend(frame(b'$', "OK"));

        let bulk = packets(Framer::new().feed(&stream));

        let mut framer = Framer::new();
        let mut single = Vec::new();
        for &b in &stream {
            if let Ok(Some(Frame::Packet(p))) = framer.push(b) {
                single.push(p);
            }
        }

        let mut chunked = Vec::new();
        let mut framer = Framer::new();
        for chunk in stream.chunks(5) {
            chunked.extend(packets(framer.feed(chunk)));
        }

        assert_eq!(bulk.len(), 5);
        assert_eq!(bulk.iter().filter(|p| p.is_notification()).count(), 2);
        assert_eq!(bulk, single);
        assert_eq!(bulk, chunked);
        assert!(bulk.iter().all(Packet::verify));
    }

    #[test]
    fn test_nak_outside_frame() {
        let mut framer = Framer::new();
        assert_eq!(framer.push(b'-').unwrap(), Some(Frame::Nak));

        // Inside a body the same byte is plain data
        let found = packets(framer.feed(&frame(b'$', "E-1")));
        assert_eq!(found[0].payload().as_ref(), b"E-1");
    }

    #[test]
    fn test_stray_byte_is_violation() {
        let mut framer = Framer::new();
        let results = framer.feed(b"\r\n$OK#9a");

        assert_eq!(results[0], Err(ProtocolError::ProtocolViolation { byte: b'\r' }));
        assert_eq!(results[1], Err(ProtocolError::ProtocolViolation { byte: b'\n' }));
        assert_eq!(packets(results)[0].payload().as_ref(), b"OK");
    }

    #[test]
    fn test_frame_too_long_recovers() {
        let mut framer = Framer::with_max_frame_len(8);
        let results = framer.feed(b"$0123456789");

        assert!(results.contains(&Err(ProtocolError::FrameTooLong { max: 8 })));
        assert!(framer.is_idle());

        let found = packets(framer.feed(&frame(b'$', "OK")));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload().as_ref(), b"OK");
    }

    #[test]
    fn test_notification_too_long_recovers() {
        let mut framer = Framer::with_max_frame_len(4);
        let results = framer.feed(b"%Stopped");

        assert!(results.contains(&Err(ProtocolError::FrameTooLong { max: 4 })));
        assert!(framer.is_idle());

        let found = packets(framer.feed(&frame(b'%', "T05")));
        assert_eq!(found.len(), 1);
        assert!(found[0].is_notification());
        assert_eq!(found[0].payload().as_ref(), b"T05");
    }

    #[test]
    fn test_max_len_payload_is_accepted() {
        let mut framer = Framer::with_max_frame_len(4);
        let found = packets(framer.feed(&frame(b'$', "abcd")));
        assert_eq!(found[0].payload().as_ref(), b"abcd");
    }
}
