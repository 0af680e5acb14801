//! Declaration generation for rpcspec definition graphs
//!
//! A [`DeclarationGenerator`] turns one resolved definition into one named
//! [`DeclarationUnit`]. [`generate`] drives a generator over a whole sheet
//! and batches every failure into a single report.

pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod rust;

pub use config::{GenConfig, Packaging};
pub use context::{escape_segment, GenContext};
pub use error::{BatchErrors, CodegenError, ErrorCategory, ErrorEntry, ErrorLocation};
pub use generator::{generate, group_by_package, DeclarationGenerator, DeclarationUnit};
pub use rust::{render_package, RustDeclarations, RustDeclarationsConfig};
