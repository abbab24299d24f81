//! Core functionality module
//!
//! This module contains the core business logic for the photo transfer tool,
//! including configuration management, error handling, output directory
//! handling, and the transfer session.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `outcome` - Per-file outcomes and the session result
//! - `output` - Flat output directory, target naming and atomic writes
//! - `session` - Transfer and conversion orchestration

pub mod config;
pub mod error;
pub mod outcome;
pub mod output;
pub mod session;
