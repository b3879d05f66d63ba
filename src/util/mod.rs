//! Utility functions shared by the scraper, enricher and publishers.
//!
//! - **Text processing**: whitespace normalisation and char-bounded previews
//! - **Base URL validation**: HTTPS enforcement for configurable API endpoints
//! - **Files**: atomic replace for the cache and the local-file destination
//!
//! # Examples
//!
//! ```
//! use trendpress::util::{collapse_whitespace, truncate_chars, validate_base_url};
//!
//! assert_eq!(collapse_whitespace("  a\n   b "), "a b");
//! assert_eq!(truncate_chars("abcdef", 3), "abc...");
//! assert!(validate_base_url("https://api.github.com").is_ok());
//! ```

mod fs;
mod text;
mod url_validator;

pub use fs::{atomic_write, atomic_write_async};
pub use text::{collapse_whitespace, truncate_chars, ELLIPSIS};
pub use url_validator::{validate_base_url, BaseUrlError};
