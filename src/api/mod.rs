//! # SWIM API Module
//!
//! This module provides the primary API for running a SWIM membership node.
//!
//! ## Modules
//!
//! - [`config`]: Contains configuration structures and builders for customizing SWIM nodes.
//! - [`swim`]: Provides the `SwimCluster` struct, a node bound to real UDP and TCP sockets.

pub mod config;
pub mod swim;
