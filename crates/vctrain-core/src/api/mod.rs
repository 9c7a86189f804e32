//! API implementation submodules.
//!
//! Each submodule contains `impl TrainerApi` blocks. The struct itself lives
//! in `lib.rs`.

mod builder;
mod system;
mod training;
mod workspace;

pub use builder::TrainerApiBuilder;
pub use system::StatusResponse;
