//! Domain entities and the record contract they implement.

pub mod entities;
pub mod record;
pub mod schema;
