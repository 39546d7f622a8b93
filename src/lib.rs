pub mod api;
pub mod config;
pub mod core;
pub mod log;
pub mod recommend;
