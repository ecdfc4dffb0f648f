//! Domain model and pure sync logic for the card polling client.
//!
//! Nothing in this crate performs I/O on its own: network access, timers and
//! rendering live in `cardsync-client`, durable storage in
//! `cardsync-storage-sqlite`.

pub mod errors;
pub mod store;
pub mod sync;

pub use errors::{DatabaseError, Error, Result};
