pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod mutate;
pub mod poll;
pub mod resources;
pub mod telemetry;
