//! Data-access layer: store contracts and the repositories written against them.

pub mod cached;
pub mod error;
pub mod records;
pub mod repos;
