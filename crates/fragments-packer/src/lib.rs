//! fragments-packer: Machine packing for fragments
//!
//! This crate decides which machine every fragment instance lands on:
//! - Dependency validation over declared fragments
//! - The ordered filter chain and its built-in stages
//! - Packing strategies (filter-chain and first-fit) and their registry
//! - The packer that drives a run and exposes its results

pub mod dependency;
pub mod filter;
pub mod observer;
pub mod packer;
pub mod registry;
pub mod strategy;

pub use dependency::{validate_dependencies, DependencyGraph};
pub use filter::{FilterChain, FilterFn, FilterStage};
pub use observer::{NoopObserver, PackObserver, TracingObserver};
pub use packer::Packer;
pub use registry::PackerRegistry;
pub use strategy::{ModularPacker, PackingStrategy, PlacementContext, SimplePacker};
