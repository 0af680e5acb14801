//! Definition graph, compact wire form and inflation for rpcspec schemas

pub mod builder;
pub mod compact;
pub mod definition;
pub mod dependency;
pub mod error;
pub mod inflate;
pub mod literal;
pub mod namespace;

pub use compact::{CompactElementDefinition, CompactSpecSheet};
pub use definition::{DefinitionKind, DefinitionRef, ElementDefinition, ExpectedKind, SpecSheet};
pub use error::{BuildError, CompactError, CoreError, InflateError};
pub use inflate::{inflate, InflateOptions, Inflater, Lookup, Resolution, ResolutionRegistry};
pub use literal::Literal;
pub use namespace::{CanonicalName, Namespace};
