//! Database models split into domain-specific modules.

pub mod common;
pub mod communication;
pub mod lead;
pub mod stats;
pub mod user;

pub use common::*;
pub use communication::*;
pub use lead::*;
pub use stats::*;
pub use user::*;
