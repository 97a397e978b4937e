#[macro_use]
extern crate tracing;

pub mod config;
pub mod controller;
pub mod error;
pub mod fleet;
pub mod hooks;
pub mod http;
pub mod persistence;
pub mod ports;
pub mod runtime;
pub mod scheduler;
pub mod settlement;
pub mod state;
pub mod tokens;
