//! Persistence of the negotiation audit trail.
//!
//! Records are append-only: the dao offers inserts and queries, never updates.
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod dao;
pub mod error;
pub mod executor;
pub mod models;
pub mod schema;

pub use dao::ContractNegotiationDao;
pub use error::DbError;
pub use executor::DbExecutor;

embed_migrations!("migrations");
