//! Hardware address parsing.
//!
//! Mapping files are written by hand or by other tools, so addresses show up
//! in whatever notation the author preferred. Everything is normalized to a
//! [`MacAddr`], whose `Display` is the lowercase colon form used in logs.

use pnet::util::MacAddr;

/// Error returned for a string that is not a 48-bit hardware address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address: {0:?}")]
pub struct MacParseError(pub String);

/// Parse a 48-bit hardware address.
///
/// Accepted notations (hex digits are case-insensitive):
/// - `00:11:22:33:44:55`
/// - `00-11-22-33-44-55`
/// - `0011.2233.4455`
pub fn parse_mac(input: &str) -> Result<MacAddr, MacParseError> {
    let s = input.trim();
    let err = || MacParseError(input.to_string());

    if s.contains(':') || s.contains('-') {
        let sep = if s.contains(':') { ':' } else { '-' };
        // `MacAddr` accepts one-digit and signed groups, so check widths first.
        if !s.split(sep).all(|part| is_hex_group(part, 2)) {
            return Err(err());
        }
        s.replace(sep, ":").parse().map_err(|_| err())
    } else if s.contains('.') {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 || !parts.iter().all(|part| is_hex_group(part, 4)) {
            return Err(err());
        }
        let mut octets = [0u8; 6];
        for (chunk, part) in octets.chunks_exact_mut(2).zip(parts) {
            let group = u16::from_str_radix(part, 16).map_err(|_| err())?;
            chunk.copy_from_slice(&group.to_be_bytes());
        }
        Ok(MacAddr::new(
            octets[0], octets[1], octets[2], octets[3], octets[4], octets[5],
        ))
    } else {
        Err(err())
    }
}

fn is_hex_group(part: &str, width: usize) -> bool {
    part.len() == width && part.chars().all(|c| c.is_ascii_hexdigit())
}
