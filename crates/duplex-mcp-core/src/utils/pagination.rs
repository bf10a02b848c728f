//! Opaque pagination cursors.
//!
//! A cursor is a base64 token over a `space:position` payload. The `s` space
//! pages a registry's static items; the `h` space wraps whatever cursor a
//! fallback list handler issued, keeping the two position spaces distinct.
//! A token this endpoint did not issue fails to decode, and the caller maps
//! that to `InvalidParams`; cursors are opaque but not unforgeable.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid pagination cursor: {0}")]
pub struct CursorError(pub String);

/// Decoded cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Offset into the static item space.
    Static(usize),
    /// A fallback handler's own cursor, passed through verbatim.
    Handler(String),
}

impl Cursor {
    pub fn encode(&self) -> String {
        let payload = match self {
            Cursor::Static(offset) => format!("s:{offset}"),
            Cursor::Handler(inner) => format!("h:{inner}"),
        };
        URL_SAFE_NO_PAD.encode(payload)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CursorError(token.to_string()))?;
        let payload = String::from_utf8(bytes).map_err(|_| CursorError(token.to_string()))?;

        match payload.split_once(':') {
            Some(("s", offset)) => offset
                .parse::<usize>()
                .map(Cursor::Static)
                .map_err(|_| CursorError(token.to_string())),
            Some(("h", inner)) => Ok(Cursor::Handler(inner.to_string())),
            _ => Err(CursorError(token.to_string())),
        }
    }
}

/// One page sliced out of a static item list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Slice `items[offset..offset + page_size]`, issuing a static-space cursor
/// when more items remain.
pub fn paginate<T: Clone>(items: &[T], offset: usize, page_size: usize) -> Page<T> {
    let end = offset.saturating_add(page_size).min(items.len());
    let start = offset.min(items.len());
    let page: Vec<T> = items[start..end].to_vec();
    let next_cursor = (end < items.len()).then(|| Cursor::Static(end).encode());
    Page {
        items: page,
        next_cursor,
    }
}
