//! Dynamic execution engine for single-file JSX component sources.
//!
//! Untrusted source text goes through four steps, each of which can only
//! fail into an [`ExecutionError`]:
//!
//! 1. [`transform`] lowers imports, exports and JSX into base syntax,
//! 2. [`loader`] runs the unit once with a strict capability resolver,
//! 3. [`sandbox`] calls the exported factory and materializes its tree,
//! 4. [`cache`] keeps the outcome per source identity.
//!
//! [`Engine`] wires them together.

pub mod cache;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod loader;
pub mod parser;
pub mod runtime;
pub mod sandbox;
pub mod source;
pub mod transform;
pub mod value;

pub use artifex_scene as scene;
pub use cache::CacheStats;
pub use capability::{CapabilityRegistry, CapabilityRegistryBuilder, ResolutionError};
pub use config::EngineConfig;
pub use engine::{Engine, Rendered};
pub use error::{ConfigError, ErrorKind, ExecutionError, RenderPhase, ScriptFailure, TransformError};
pub use loader::{LoadedModule, ModuleState};
pub use source::{SourceId, SourceUnit};
pub use transform::TransformOptions;
pub use value::Value;
