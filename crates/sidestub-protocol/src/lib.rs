//! Side-stub packet protocol
//!
//! A byte-stream protocol in the style of the GDB Remote Serial Protocol.
//!
//! ## Wire Format
//! ```text
//! $<body>#<checksum>       # Command or reply packet
//! %<body>#<checksum>       # Asynchronous notification
//! +                        # Acknowledgement
//! -                        # Negative acknowledgement (retransmit)
//! ```
//!
//! The checksum is the sum of the body bytes modulo 256, rendered as two
//! lowercase hex digits.

pub mod checksum;
pub mod command;
pub mod encoder;
pub mod error;
pub mod framer;
pub mod packet;
pub mod reply;

pub use command::Command;
pub use encoder::encode;
pub use error::{ProtocolError, ProtocolResult};
pub use framer::{Frame, Framer, DEFAULT_MAX_FRAME_LEN};
pub use packet::{Packet, PacketKind};
pub use reply::Reply;

/// Start of a command or reply packet
pub const PACKET_START: u8 = b'$';
/// Start of an asynchronous notification
pub const NOTIFICATION_START: u8 = b'%';
/// End of packet body, followed by the checksum
pub const TERMINATOR: u8 = b'#';
/// Acknowledgement byte
pub const ACK: u8 = b'+';
/// Negative acknowledgement byte
pub const NAK: u8 = b'-';
/// Number of checksum characters after the terminator
pub const CHECKSUM_LEN: usize = 2;
