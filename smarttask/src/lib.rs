//! `SmartTask`: personal task dashboard client library.

pub mod app;
pub mod config;
pub mod gateway;
pub mod route;
pub mod session;
pub mod tasks;
