//! Patient and prescription records behind a cache-aside data-access layer.
//!
//! Records are stored in Postgres, or in memory when no database is
//! configured. Record types opt into caching by implementing
//! [`domain::record::Cacheable`]; their reads then go through
//! [`application::cached::CachedRepository`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
mod util;
