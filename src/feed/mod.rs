//! RSS feed retrieval and decoding.
//!
//! - [`parser`] - XML decoding into a typed tree and extraction of the
//!   `rss > channel` structure with channel- and item-level validation
//! - [`fetcher`] - single-shot HTTP retrieval with timeout and size limits
//!
//! Nothing in this module touches the database. Callers decide what, if
//! anything, to persist from a [`ParsedFeed`].
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{build_client, fetch_feed, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};
//!
//! let client = build_client(DEFAULT_USER_AGENT, DEFAULT_FETCH_TIMEOUT)?;
//! let feed = fetch_feed(&client, "https://www.wagslane.dev/index.xml", DEFAULT_FETCH_TIMEOUT).await?;
//! for item in &feed.channel.items {
//!     println!("{} ({})", item.title, item.pub_date);
//! }
//! ```

mod fetcher;
mod parser;

pub use fetcher::{
    build_client, fetch_feed, FeedError, FetchError, DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT,
};
pub use parser::{
    parse_document, parse_feed, FeedChannel, ParseError, ParsedFeed, ParsedItem, XmlNode,
};
