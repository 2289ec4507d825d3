//! fragments-core: Core types for the fragments packer
//!
//! This crate provides the fundamental types used throughout the system:
//! - Fragment records and their placement constraints
//! - Machines, the bins fragments are packed into
//! - The flavor table of machine size classes
//! - Persisted pack plans and machine reports
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod flavor;
pub mod fragment;
pub mod machine;
pub mod plan;
pub mod record;

pub use config::*;
pub use error::*;
pub use flavor::*;
pub use fragment::*;
pub use machine::*;
pub use plan::*;
pub use record::Record;
