//! Raw provider payloads → canonical records. Pure functions, no I/O.
//!
//! A payload whose top-level shape is wrong fails as a whole with a `Parse` error; a
//! malformed record inside an otherwise valid payload is dropped and counted, and its
//! siblings still come through.

pub mod google;
pub mod path;
pub mod twitter;

pub use google::{normalize_geo_trends, parse_last_update, parse_scraped_at};
pub use twitter::{
    normalize_hashflags, normalize_locations, normalize_trends, strip_trending_suffix,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    /// Records dropped because a required field was missing or unparsable.
    pub dropped: usize,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dropped: 0,
        }
    }
}
