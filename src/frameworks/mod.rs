// Frameworks: environment config and runtime bootstrap.

pub mod config;
pub mod runtime;
