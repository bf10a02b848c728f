//! Pagination cursors, URI templates and serde helpers.

pub mod pagination;
pub mod serde_compat;
pub mod uri_template;

pub use pagination::{paginate, Cursor, CursorError, Page};
pub use uri_template::{is_template, UriTemplate};
