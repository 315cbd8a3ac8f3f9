pub mod env;
pub mod provision;
