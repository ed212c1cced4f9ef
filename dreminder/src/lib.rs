//! dReminder library
//!
//! This library exposes the core functionality of dReminder for testing
//! and for the `dreminder` binary.

pub mod app;
pub mod clock;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod node;
pub mod services;
pub mod storage;
pub mod ui;
