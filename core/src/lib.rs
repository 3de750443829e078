pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod http;
pub mod persist;
pub mod polymarket;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod telemetry;
