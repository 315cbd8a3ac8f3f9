pub mod config;
pub mod requirements;
