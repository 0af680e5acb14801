//! Inflation of compact nodes back into the definition graph
//!
//! Resolution is split in two: [`CompactElementDefinition::prepare`] binds a
//! node to a [`Lookup`] without doing any work, and
//! [`PendingResolution::resolve`] performs it. A reference the lookup cannot
//! answer yet yields [`Resolution::Unresolved`] so the caller can retry once
//! more nodes are known. A reference answered with the wrong kind of
//! definition is a hard [`InflateError`].
//!
//! [`Inflater`] drives the loop: it sweeps every pending node, feeding each
//! resolved definition into a [`ResolutionRegistry`], until everything is
//! resolved or a sweep makes no progress.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::compact::{
    CompactElementDefinition, CompactFieldDefinition, CompactHeader, CompactMetadataUsage,
    CompactSpecSheet,
};
use crate::definition::{
    ArrayDefinition, ConstDefinition, DefinitionRef, ElementDefinition, ElementHeader,
    EnumDefinition, ExpectedKind, FaultDefinition, FieldDefinition, IframeEndpointDefinition,
    InterDefinition, KafkaEndpointDefinition, MetadataDefinition, MetadataUsage,
    OptionalDefinition, ProtocolDefinition, RoutineDefinition, ScalarDefinition, SpecSheet,
    StructDefinition, TupleDefinition, UnionDefinition,
};
use crate::dependency::UnresolvedReport;
use crate::error::InflateError;
use crate::namespace::CanonicalName;

/// Source of already-resolved definitions
pub trait Lookup {
    fn lookup(&self, name: &CanonicalName) -> Option<DefinitionRef>;
}

impl<F> Lookup for F
where
    F: Fn(&CanonicalName) -> Option<DefinitionRef>,
{
    fn lookup(&self, name: &CanonicalName) -> Option<DefinitionRef> {
        self(name)
    }
}

/// Outcome of one resolution attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ElementDefinition),
    /// The first reference the lookup could not answer
    Unresolved(CanonicalName),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// A compact node bound to a lookup, not yet resolved.
///
/// [`resolve`](Self::resolve) has no side effects and may be called any
/// number of times.
pub struct PendingResolution<'a, L: ?Sized> {
    node: &'a CompactElementDefinition,
    lookup: &'a L,
}

impl<L: Lookup + ?Sized> PendingResolution<'_, L> {
    pub fn name(&self) -> CanonicalName {
        self.node.canonical_name()
    }

    pub fn resolve(&self) -> Result<Resolution, InflateError> {
        let resolver = Resolver {
            node: self.node.canonical_name(),
            lookup: self.lookup,
        };
        match resolver.node_definition(self.node) {
            Ok(definition) => Ok(Resolution::Resolved(definition)),
            Err(Interrupt::Missing(name)) => Ok(Resolution::Unresolved(name)),
            Err(Interrupt::Fatal(err)) => Err(err),
        }
    }
}

impl CompactElementDefinition {
    /// Bind this node to `lookup`; no references are looked up yet
    pub fn prepare<'a, L: Lookup + ?Sized>(&'a self, lookup: &'a L) -> PendingResolution<'a, L> {
        PendingResolution { node: self, lookup }
    }
}

/// Short-circuit for a single resolution attempt
enum Interrupt {
    Missing(CanonicalName),
    Fatal(InflateError),
}

impl From<InflateError> for Interrupt {
    fn from(err: InflateError) -> Self {
        Interrupt::Fatal(err)
    }
}

struct Resolver<'a, L: ?Sized> {
    node: CanonicalName,
    lookup: &'a L,
}

impl<L: Lookup + ?Sized> Resolver<'_, L> {
    fn get(
        &self,
        field: &'static str,
        name: &CanonicalName,
        expected: ExpectedKind,
    ) -> Result<DefinitionRef, Interrupt> {
        let definition = self
            .lookup
            .lookup(name)
            .ok_or_else(|| Interrupt::Missing(name.clone()))?;
        if !expected.accepts(definition.kind()) {
            return Err(InflateError::KindMismatch {
                node: self.node.clone(),
                field,
                reference: name.clone(),
                expected,
                actual: definition.kind(),
            }
            .into());
        }
        Ok(definition)
    }

    fn get_all(
        &self,
        field: &'static str,
        names: &[CanonicalName],
        expected: ExpectedKind,
    ) -> Result<Vec<DefinitionRef>, Interrupt> {
        names
            .iter()
            .map(|name| self.get(field, name, expected))
            .collect()
    }

    fn usage(&self, usage: &CompactMetadataUsage) -> Result<MetadataUsage, Interrupt> {
        let definition = self.get("definition.ref", &usage.definition, ExpectedKind::Metadata)?;
        if let Some(metadata) = definition.as_metadata() {
            for value in &usage.fields {
                if !metadata.metadata_fields.iter().any(|f| f.name == value.name) {
                    return Err(InflateError::UnknownMetadataField {
                        node: self.node.clone(),
                        metadata: usage.definition.clone(),
                        field: value.name.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(MetadataUsage {
            definition,
            fields: usage.fields.clone(),
        })
    }

    fn usages(&self, usages: &[CompactMetadataUsage]) -> Result<Vec<MetadataUsage>, Interrupt> {
        usages.iter().map(|usage| self.usage(usage)).collect()
    }

    fn header(&self, header: &CompactHeader) -> Result<ElementHeader, Interrupt> {
        Ok(header.with_metadata(self.usages(&header.metadata)?))
    }

    fn fields(&self, fields: &[CompactFieldDefinition]) -> Result<Vec<FieldDefinition>, Interrupt> {
        fields
            .iter()
            .map(|field| {
                Ok(FieldDefinition {
                    name: field.name.clone(),
                    description: field.description.clone(),
                    metadata: self.usages(&field.metadata)?,
                    field_type: self.get("field_type.ref", &field.field_type, ExpectedKind::Type)?,
                    field_default: field.field_default.clone(),
                })
            })
            .collect()
    }

    fn node_definition(&self, node: &CompactElementDefinition) -> Result<ElementDefinition, Interrupt> {
        let header = self.header(node.header())?;
        let definition = match node {
            CompactElementDefinition::Scalar(_) => {
                ElementDefinition::Scalar(ScalarDefinition { header })
            }
            CompactElementDefinition::Struct(d) => ElementDefinition::Struct(StructDefinition {
                header,
                struct_fields: self.fields(&d.struct_fields)?,
            }),
            CompactElementDefinition::Tuple(d) => ElementDefinition::Tuple(TupleDefinition {
                header,
                tuple_types: self.get_all("tuple_types.ref", &d.tuple_types, ExpectedKind::Type)?,
            }),
            CompactElementDefinition::Array(d) => ElementDefinition::Array(ArrayDefinition {
                header,
                array_type: self.get("array_type.ref", &d.array_type, ExpectedKind::Type)?,
            }),
            CompactElementDefinition::Optional(d) => {
                ElementDefinition::Optional(OptionalDefinition {
                    header,
                    optional_type: self.get(
                        "optional_type.ref",
                        &d.optional_type,
                        ExpectedKind::Type,
                    )?,
                })
            }
            CompactElementDefinition::Enum(d) => ElementDefinition::Enum(EnumDefinition {
                header,
                enum_type: self.get("enum_type.ref", &d.enum_type, ExpectedKind::Type)?,
                enum_entries: self.get_all(
                    "enum_entries.ref",
                    &d.enum_entries,
                    ExpectedKind::Const,
                )?,
            }),
            CompactElementDefinition::Union(d) => ElementDefinition::Union(UnionDefinition {
                header,
                union_discriminator: d.union_discriminator.clone(),
                union_types: self.get_all(
                    "union_types.ref",
                    &d.union_types,
                    ExpectedKind::Struct,
                )?,
            }),
            CompactElementDefinition::Inter(d) => ElementDefinition::Inter(InterDefinition {
                header,
                inter_types: self.get_all(
                    "inter_types.ref",
                    &d.inter_types,
                    ExpectedKind::Struct,
                )?,
            }),
            CompactElementDefinition::Const(d) => ElementDefinition::Const(ConstDefinition {
                header,
                const_type: self.get("const_type.ref", &d.const_type, ExpectedKind::Type)?,
                const_value: d.const_value.clone(),
            }),
            CompactElementDefinition::Fault(_) => {
                ElementDefinition::Fault(FaultDefinition { header })
            }
            CompactElementDefinition::Metadata(d) => {
                ElementDefinition::Metadata(MetadataDefinition {
                    header,
                    metadata_fields: self.fields(&d.metadata_fields)?,
                })
            }
            CompactElementDefinition::Routine(d) => ElementDefinition::Routine(RoutineDefinition {
                header,
                routine_endpoints: self.get_all(
                    "routine_endpoints.ref",
                    &d.routine_endpoints,
                    ExpectedKind::Endpoint,
                )?,
                routine_fault_union: self.get_all(
                    "routine_fault_union.ref",
                    &d.routine_fault_union,
                    ExpectedKind::Fault,
                )?,
                routine_input: self.get(
                    "routine_input.ref",
                    &d.routine_input,
                    ExpectedKind::Struct,
                )?,
                routine_output: self.get(
                    "routine_output.ref",
                    &d.routine_output,
                    ExpectedKind::Struct,
                )?,
            }),
            CompactElementDefinition::Protocol(d) => {
                ElementDefinition::Protocol(ProtocolDefinition {
                    header,
                    protocol_routines: self.get_all(
                        "protocol_routines.ref",
                        &d.protocol_routines,
                        ExpectedKind::Routine,
                    )?,
                })
            }
            CompactElementDefinition::KafkaEndpoint(d) => {
                ElementDefinition::KafkaEndpoint(KafkaEndpointDefinition {
                    header,
                    endpoint_topic: d.endpoint_topic.clone(),
                    endpoint_security_inter: d.endpoint_security_inter.clone(),
                    endpoint_key: d
                        .endpoint_key
                        .as_ref()
                        .map(|key| self.get("endpoint_key.ref", key, ExpectedKind::Tuple))
                        .transpose()?,
                })
            }
            CompactElementDefinition::IframeEndpoint(d) => {
                ElementDefinition::IframeEndpoint(IframeEndpointDefinition {
                    header,
                    endpoint_path: d.endpoint_path.clone(),
                    endpoint_security_inter: d.endpoint_security_inter.clone(),
                })
            }
        };
        Ok(definition)
    }
}

/// Resolved definitions by canonical name, in resolution order.
///
/// Each name is inserted at most once; later inserts hand back the cached
/// definition. Not synchronized: the driver is its only writer.
#[derive(Debug, Clone, Default)]
pub struct ResolutionRegistry {
    resolved: IndexMap<CanonicalName, DefinitionRef>,
}

impl ResolutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with every definition reachable from `sheet`, keeping the
    /// sheet's shared instances
    pub fn from_sheet(sheet: &SpecSheet) -> Self {
        let mut registry = Self::new();
        let mut stack: Vec<&DefinitionRef> = sheet.elements.iter().rev().collect();
        while let Some(next) = stack.pop() {
            if registry.contains(&next.canonical_name()) {
                continue;
            }
            registry.insert_ref(Arc::clone(next));
            stack.extend(next.child_refs().into_iter().rev());
        }
        registry
    }

    /// Insert a definition unless its name is already resolved; returns the
    /// registered instance either way
    pub fn insert(&mut self, definition: ElementDefinition) -> DefinitionRef {
        let name = definition.canonical_name();
        Arc::clone(
            self.resolved
                .entry(name)
                .or_insert_with(|| Arc::new(definition)),
        )
    }

    /// Like [`insert`](Self::insert) for an already shared definition
    pub fn insert_ref(&mut self, definition: DefinitionRef) -> DefinitionRef {
        let name = definition.canonical_name();
        Arc::clone(self.resolved.entry(name).or_insert(definition))
    }

    pub fn get(&self, name: &CanonicalName) -> Option<&DefinitionRef> {
        self.resolved.get(name)
    }

    pub fn contains(&self, name: &CanonicalName) -> bool {
        self.resolved.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalName, &DefinitionRef)> {
        self.resolved.iter()
    }

    /// Definitions that no other registered definition refers to
    pub fn roots(&self) -> Vec<DefinitionRef> {
        let referenced: HashSet<CanonicalName> = self
            .resolved
            .values()
            .flat_map(|definition| definition.children())
            .map(ElementDefinition::canonical_name)
            .collect();
        self.resolved
            .iter()
            .filter(|(name, _)| !referenced.contains(*name))
            .map(|(_, definition)| Arc::clone(definition))
            .collect()
    }

    /// The root definitions as a sheet
    pub fn into_sheet(self) -> SpecSheet {
        SpecSheet::new(self.roots())
    }
}

impl Lookup for ResolutionRegistry {
    fn lookup(&self, name: &CanonicalName) -> Option<DefinitionRef> {
        self.resolved.get(name).cloned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InflateOptions {
    /// Upper bound on sweeps; `None` runs until a sweep makes no progress
    pub max_sweeps: Option<usize>,
}

/// Fixpoint driver inflating a whole compact sheet
#[derive(Debug, Default)]
pub struct Inflater {
    registry: ResolutionRegistry,
    options: InflateOptions,
}

impl Inflater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a registry holding definitions resolved elsewhere
    pub fn with_registry(mut self, registry: ResolutionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_options(mut self, options: InflateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn inflate(mut self, compact: &CompactSpecSheet) -> Result<ResolutionRegistry, InflateError> {
        for (key, node) in compact.iter() {
            let actual = node.canonical_name();
            if &actual != key {
                return Err(InflateError::KeyMismatch {
                    key: key.clone(),
                    actual,
                });
            }
        }

        let mut pending: Vec<(&CanonicalName, &CompactElementDefinition)> = compact
            .iter()
            .filter(|(name, _)| !self.registry.contains(name))
            .collect();
        // (node, reference it was missing) from the latest sweep
        let mut waiting: Vec<(CanonicalName, CanonicalName)> = Vec::new();
        let mut sweep = 0usize;

        while !pending.is_empty() {
            sweep += 1;
            if let Some(limit) = self.options.max_sweeps {
                if sweep > limit {
                    return Err(InflateError::SweepLimitExceeded {
                        limit,
                        report: Box::new(UnresolvedReport::new(compact, &waiting)),
                    });
                }
            }

            let before = pending.len();
            let mut remaining = Vec::with_capacity(before);
            waiting.clear();
            for (name, node) in pending {
                match node.prepare(&self.registry).resolve()? {
                    Resolution::Resolved(definition) => {
                        trace!(%name, sweep, "resolved");
                        self.registry.insert(definition);
                    }
                    Resolution::Unresolved(missing) => {
                        trace!(%name, %missing, sweep, "waiting");
                        waiting.push((name.clone(), missing));
                        remaining.push((name, node));
                    }
                }
            }
            pending = remaining;

            debug!(
                sweep,
                resolved = before - pending.len(),
                remaining = pending.len(),
                "inflate sweep"
            );

            if pending.len() == before {
                return Err(InflateError::Unresolved(Box::new(UnresolvedReport::new(
                    compact, &waiting,
                ))));
            }
        }

        debug!(
            sweeps = sweep,
            definitions = self.registry.len(),
            "inflated compact sheet"
        );
        Ok(self.registry)
    }
}

/// Inflate `compact` from an empty registry
pub fn inflate(compact: &CompactSpecSheet) -> Result<ResolutionRegistry, InflateError> {
    Inflater::new().inflate(compact)
}
