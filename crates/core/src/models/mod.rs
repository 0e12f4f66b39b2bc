//! Data models for Plenario

mod bill;
mod chamber;
mod history;
mod participant;
mod role;

pub use bill::*;
pub use chamber::*;
pub use history::*;
pub use participant::*;
pub use role::*;
