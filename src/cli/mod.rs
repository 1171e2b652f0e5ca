//! CLI-specific functionality for sapo
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, Commands, InstallArgs, VolumeCommands, resolve_output_dir};
pub use config::{ConfigDiscovery, ConfigFileError, SapoConfig};
