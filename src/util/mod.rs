//! Input validation helpers shared by the command layer.

mod url_validator;

pub use url_validator::{validate_feed_url, UrlValidationError};
