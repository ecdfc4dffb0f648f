//! Sync domain models and pure sync logic.

mod cards;
mod engine;
mod model;
mod reconcile;
mod scheduler;
mod state;
mod task;

pub use cards::*;
pub use engine::*;
pub use model::*;
pub use reconcile::*;
pub use scheduler::*;
pub use state::*;
pub use task::*;
