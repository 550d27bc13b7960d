//! gator: a command-line RSS aggregator.
//!
//! Users register locally, register and follow RSS feeds, and fetch them on
//! demand. The library holds everything except process setup:
//!
//! - [`feed`] - fetching and decoding RSS documents
//! - [`storage`] - users, feeds and subscriptions in SQLite
//! - [`commands`] - command handlers driven by an explicit [`commands::Context`]
//! - [`config`] / [`session`] - settings file and login state

pub mod commands;
pub mod config;
pub mod feed;
pub mod session;
pub mod storage;
pub mod util;
