//! Host-process pieces of the pool: argument parsing, telemetry setup and
//! the operator subcommands.

pub mod commands;
pub mod config;
pub mod telemetry;
