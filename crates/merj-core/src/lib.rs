//! Configuration shared by the merj binary and its pipeline crates.

pub mod config;
pub mod secret;

pub use config::Config;
pub use secret::Secret;
