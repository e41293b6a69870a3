pub mod config;
pub mod flow;
