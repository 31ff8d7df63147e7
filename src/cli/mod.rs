//! CLI module for unlockr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the engine,
//! locating the client library and inspecting the library snapshot.

pub mod commands;
pub mod display;

pub use commands::Cli;
