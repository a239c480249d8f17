//! Modulo-256 packet checksum

/// Sum of all bytes modulo 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Checksum rendered as exactly two lowercase hex digits.
pub fn compute(payload: &[u8]) -> String {
    format!("{:02x}", checksum(payload))
}

/// Recompute the checksum of `payload` and compare it with the received
/// characters. Hex digits are accepted in either case.
pub fn verify(payload: &[u8], received: &[u8]) -> bool {
    match parse(received) {
        Some(value) => value == checksum(payload),
        None => false,
    }
}

/// Parse two hex characters into a checksum value.
pub fn parse(received: &[u8]) -> Option<u8> {
    if received.len() != 2 {
        return None;
    }
    let text = std::str::from_utf8(received).ok()?;
    u8::from_str_radix(text, 16).ok()
}
