//! Protocol version negotiation.
//!
//! Versions are date-stamped strings (`YYYY-MM-DD`). The server echoes the
//! client's version when it supports it and otherwise answers with its own
//! highest supported version; accepting or rejecting that counter-offer is
//! the client's call.

use crate::error::ProtocolError;

/// Supported protocol versions, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// The version a freshly built endpoint offers.
pub const LATEST_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

pub fn is_supported(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// Pick the version to answer an `initialize` carrying `requested`.
pub fn negotiate(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|v| **v == requested)
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

/// Validate the `YYYY-MM-DD` shape of a version string.
pub fn validate_format(version: &str) -> Result<(), ProtocolError> {
    let parts: Vec<&str> = version.split('-').collect();
    if parts.len() != 3 || parts[0].len() != 4 || parts[1].len() != 2 || parts[2].len() != 2 {
        return Err(ProtocolError::InvalidVersion(format!(
            "protocol version must be YYYY-MM-DD, got {version:?}"
        )));
    }

    let (year, month, day) = match (
        parts[0].parse::<u16>(),
        parts[1].parse::<u8>(),
        parts[2].parse::<u8>(),
    ) {
        (Ok(y), Ok(m), Ok(d)) => (y, m, d),
        _ => {
            return Err(ProtocolError::InvalidVersion(format!(
                "protocol version components must be numeric, got {version:?}"
            )))
        }
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || year < 2024 {
        return Err(ProtocolError::InvalidVersion(format!(
            "protocol version out of range: {version:?}"
        )));
    }

    Ok(())
}
