//! Core library for cela.
//!
//! This crate provides the foundational types and functionality used by the
//! `cela` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`bump`] - Fetch, compute, update orchestration
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//! - [`parser`] - Parser discovery and parser configuration
//! - [`runner`] - Running fetcher/updater scripts
//! - [`version`] - Version model and the version transition
//!
//! # Quick Start
//!
//! ```
//! use cela_core::version::SemanticVersion;
//! use cela_core::version::delta::{Directive, fold};
//! use cela_core::version::transition::{TransitionConfig, transition};
//! use cela_core::version::Component;
//!
//! let (delta, policy) = fold([Directive::Increment(Component::Major)]);
//! let current = SemanticVersion::new(1, 2, 3);
//! let result = transition(&current, &delta, &policy, &TransitionConfig::default());
//!
//! assert_eq!(result.version.triple(), (2, 0, 0));
//! assert_eq!(result.notes.len(), 2);
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod config;

pub mod error;

pub mod parser;

pub mod runner;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
