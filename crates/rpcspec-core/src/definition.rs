//! The definition graph
//!
//! Every schema element is an [`ElementDefinition`], a closed set of kinds.
//! Definitions are immutable once built and refer to each other through
//! shared [`DefinitionRef`] handles, so a scalar used by many fields is one
//! instance. Field definitions and metadata usages are embedded in their owner
//! and never addressed by name.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Add;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::literal::Literal;
use crate::namespace::{CanonicalName, Namespace};

/// Shared handle to a built definition
pub type DefinitionRef = Arc<ElementDefinition>;

/// The closed set of definition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Scalar,
    Struct,
    Tuple,
    Array,
    Optional,
    Enum,
    Union,
    Inter,
    Const,
    Fault,
    Metadata,
    Routine,
    Protocol,
    KafkaEndpoint,
    IframeEndpoint,
}

impl DefinitionKind {
    /// Discriminator used by the compact wire format
    pub const fn serial_name(self) -> &'static str {
        match self {
            DefinitionKind::Scalar => "scalar",
            DefinitionKind::Struct => "struct",
            DefinitionKind::Tuple => "tuple",
            DefinitionKind::Array => "array",
            DefinitionKind::Optional => "optional",
            DefinitionKind::Enum => "enum",
            DefinitionKind::Union => "union",
            DefinitionKind::Inter => "inter",
            DefinitionKind::Const => "const",
            DefinitionKind::Fault => "fault",
            DefinitionKind::Metadata => "metadata",
            DefinitionKind::Routine => "routine",
            DefinitionKind::Protocol => "protocol",
            DefinitionKind::KafkaEndpoint => "kafka_endpoint",
            DefinitionKind::IframeEndpoint => "iframe_endpoint",
        }
    }

    /// Reserved name standing in for an unnamed definition of this kind.
    ///
    /// Builders reject names containing parentheses, so these never collide
    /// with a user-chosen name.
    pub const fn anonymous_name(self) -> &'static str {
        match self {
            DefinitionKind::Scalar => "(anonymous<scalar>)",
            DefinitionKind::Struct => "(anonymous<struct>)",
            DefinitionKind::Tuple => "(anonymous<tuple>)",
            DefinitionKind::Array => "(anonymous<array>)",
            DefinitionKind::Optional => "(anonymous<optional>)",
            DefinitionKind::Enum => "(anonymous<enum>)",
            DefinitionKind::Union => "(anonymous<union>)",
            DefinitionKind::Inter => "(anonymous<inter>)",
            DefinitionKind::Const => "(anonymous<const>)",
            DefinitionKind::Fault => "(anonymous<fault>)",
            DefinitionKind::Metadata => "(anonymous<metadata>)",
            DefinitionKind::Routine => "(anonymous<routine>)",
            DefinitionKind::Protocol => "(anonymous<protocol>)",
            DefinitionKind::KafkaEndpoint => "(anonymous<kafka_endpoint>)",
            DefinitionKind::IframeEndpoint => "(anonymous<iframe_endpoint>)",
        }
    }

    pub const fn is_type(self) -> bool {
        matches!(
            self,
            DefinitionKind::Scalar
                | DefinitionKind::Struct
                | DefinitionKind::Tuple
                | DefinitionKind::Array
                | DefinitionKind::Optional
                | DefinitionKind::Enum
                | DefinitionKind::Union
                | DefinitionKind::Inter
        )
    }

    pub const fn is_endpoint(self) -> bool {
        matches!(
            self,
            DefinitionKind::KafkaEndpoint | DefinitionKind::IframeEndpoint
        )
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.serial_name())
    }
}

/// The kind a reference slot requires of its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedKind {
    Type,
    Struct,
    Tuple,
    Const,
    Fault,
    Metadata,
    Routine,
    Endpoint,
}

impl ExpectedKind {
    pub const fn accepts(self, kind: DefinitionKind) -> bool {
        match self {
            ExpectedKind::Type => kind.is_type(),
            ExpectedKind::Struct => matches!(kind, DefinitionKind::Struct),
            ExpectedKind::Tuple => matches!(kind, DefinitionKind::Tuple),
            ExpectedKind::Const => matches!(kind, DefinitionKind::Const),
            ExpectedKind::Fault => matches!(kind, DefinitionKind::Fault),
            ExpectedKind::Metadata => matches!(kind, DefinitionKind::Metadata),
            ExpectedKind::Routine => matches!(kind, DefinitionKind::Routine),
            ExpectedKind::Endpoint => kind.is_endpoint(),
        }
    }
}

impl fmt::Display for ExpectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpectedKind::Type => "TypeDefinition",
            ExpectedKind::Struct => "StructDefinition",
            ExpectedKind::Tuple => "TupleDefinition",
            ExpectedKind::Const => "ConstDefinition",
            ExpectedKind::Fault => "FaultDefinition",
            ExpectedKind::Metadata => "MetadataDefinition",
            ExpectedKind::Routine => "RoutineDefinition",
            ExpectedKind::Endpoint => "EndpointDefinition",
        };
        f.write_str(name)
    }
}

/// Identity and documentation shared by every definition.
///
/// `U` is the metadata usage representation: [`MetadataUsage`] in the
/// definition graph, [`crate::compact::CompactMetadataUsage`] on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHeader<U = MetadataUsage> {
    /// `None` marks an unnamed definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Namespace,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Vec::new")]
    pub metadata: Vec<U>,
}

impl<U> ElementHeader<U> {
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// The name, or the reserved anonymous name for `kind`
    pub fn display_name(&self, kind: DefinitionKind) -> &str {
        self.name.as_deref().unwrap_or(kind.anonymous_name())
    }

    pub fn canonical_name(&self, kind: DefinitionKind) -> CanonicalName {
        CanonicalName::of(&self.namespace, self.display_name(kind))
    }

    /// Namespace hosting this definition's own children
    pub fn as_namespace(&self, kind: DefinitionKind) -> Namespace {
        self.namespace.child(self.display_name(kind))
    }

    /// Same identity, different metadata representation
    pub fn with_metadata<V>(&self, metadata: Vec<V>) -> ElementHeader<V> {
        ElementHeader {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            is_inline: self.is_inline,
            description: self.description.clone(),
            metadata,
        }
    }
}

/// A metadata definition applied to another definition
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataUsage {
    pub definition: DefinitionRef,
    pub fields: Vec<MetadataFieldUsage>,
}

/// A value bound to one field of a metadata definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFieldUsage {
    pub name: String,
    pub value: Literal,
}

/// A named, typed slot of a struct or metadata definition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub description: String,
    pub metadata: Vec<MetadataUsage>,
    pub field_type: DefinitionRef,
    pub field_default: Option<Literal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KafkaTopic(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KafkaSecurity(pub String);

impl KafkaSecurity {
    /// Authenticated without a subject when the client can produce to the topic
    pub fn kafka_acl() -> Self {
        Self("KafkaACL".to_string())
    }

    /// Authenticated as itself when producing to `<client_id>.<topic>`
    pub fn same_client() -> Self {
        Self("SameClient".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IframePath(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IframeSecurity(pub String);

impl IframeSecurity {
    /// Authenticated as itself when the parent page is one of its domains
    pub fn same_client() -> Self {
        Self("SameClient".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarDefinition {
    pub header: ElementHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDefinition {
    pub header: ElementHeader,
    pub struct_fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleDefinition {
    pub header: ElementHeader,
    pub tuple_types: Vec<DefinitionRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDefinition {
    pub header: ElementHeader,
    pub array_type: DefinitionRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionalDefinition {
    pub header: ElementHeader,
    pub optional_type: DefinitionRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDefinition {
    pub header: ElementHeader,
    pub enum_type: DefinitionRef,
    pub enum_entries: Vec<DefinitionRef>,
}

/// Tagged union of structs discriminated by `union_discriminator`
#[derive(Debug, Clone, PartialEq)]
pub struct UnionDefinition {
    pub header: ElementHeader,
    pub union_discriminator: String,
    pub union_types: Vec<DefinitionRef>,
}

/// Intersection of structs
#[derive(Debug, Clone, PartialEq)]
pub struct InterDefinition {
    pub header: ElementHeader,
    pub inter_types: Vec<DefinitionRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDefinition {
    pub header: ElementHeader,
    pub const_type: DefinitionRef,
    pub const_value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultDefinition {
    pub header: ElementHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDefinition {
    pub header: ElementHeader,
    pub metadata_fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDefinition {
    pub header: ElementHeader,
    pub routine_endpoints: Vec<DefinitionRef>,
    pub routine_fault_union: Vec<DefinitionRef>,
    pub routine_input: DefinitionRef,
    pub routine_output: DefinitionRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolDefinition {
    pub header: ElementHeader,
    pub protocol_routines: Vec<DefinitionRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KafkaEndpointDefinition {
    pub header: ElementHeader,
    pub endpoint_topic: KafkaTopic,
    pub endpoint_security_inter: Vec<KafkaSecurity>,
    pub endpoint_key: Option<DefinitionRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IframeEndpointDefinition {
    pub header: ElementHeader,
    pub endpoint_path: IframePath,
    pub endpoint_security_inter: Vec<IframeSecurity>,
}

/// Any schema element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementDefinition {
    Scalar(ScalarDefinition),
    Struct(StructDefinition),
    Tuple(TupleDefinition),
    Array(ArrayDefinition),
    Optional(OptionalDefinition),
    Enum(EnumDefinition),
    Union(UnionDefinition),
    Inter(InterDefinition),
    Const(ConstDefinition),
    Fault(FaultDefinition),
    Metadata(MetadataDefinition),
    Routine(RoutineDefinition),
    Protocol(ProtocolDefinition),
    KafkaEndpoint(KafkaEndpointDefinition),
    IframeEndpoint(IframeEndpointDefinition),
}

impl ElementDefinition {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            ElementDefinition::Scalar(_) => DefinitionKind::Scalar,
            ElementDefinition::Struct(_) => DefinitionKind::Struct,
            ElementDefinition::Tuple(_) => DefinitionKind::Tuple,
            ElementDefinition::Array(_) => DefinitionKind::Array,
            ElementDefinition::Optional(_) => DefinitionKind::Optional,
            ElementDefinition::Enum(_) => DefinitionKind::Enum,
            ElementDefinition::Union(_) => DefinitionKind::Union,
            ElementDefinition::Inter(_) => DefinitionKind::Inter,
            ElementDefinition::Const(_) => DefinitionKind::Const,
            ElementDefinition::Fault(_) => DefinitionKind::Fault,
            ElementDefinition::Metadata(_) => DefinitionKind::Metadata,
            ElementDefinition::Routine(_) => DefinitionKind::Routine,
            ElementDefinition::Protocol(_) => DefinitionKind::Protocol,
            ElementDefinition::KafkaEndpoint(_) => DefinitionKind::KafkaEndpoint,
            ElementDefinition::IframeEndpoint(_) => DefinitionKind::IframeEndpoint,
        }
    }

    pub fn header(&self) -> &ElementHeader {
        match self {
            ElementDefinition::Scalar(d) => &d.header,
            ElementDefinition::Struct(d) => &d.header,
            ElementDefinition::Tuple(d) => &d.header,
            ElementDefinition::Array(d) => &d.header,
            ElementDefinition::Optional(d) => &d.header,
            ElementDefinition::Enum(d) => &d.header,
            ElementDefinition::Union(d) => &d.header,
            ElementDefinition::Inter(d) => &d.header,
            ElementDefinition::Const(d) => &d.header,
            ElementDefinition::Fault(d) => &d.header,
            ElementDefinition::Metadata(d) => &d.header,
            ElementDefinition::Routine(d) => &d.header,
            ElementDefinition::Protocol(d) => &d.header,
            ElementDefinition::KafkaEndpoint(d) => &d.header,
            ElementDefinition::IframeEndpoint(d) => &d.header,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.header().name.as_deref()
    }

    /// The name, or the reserved anonymous name of this kind
    pub fn display_name(&self) -> &str {
        self.header().display_name(self.kind())
    }

    pub fn namespace(&self) -> &Namespace {
        &self.header().namespace
    }

    pub fn is_inline(&self) -> bool {
        self.header().is_inline
    }

    pub fn is_anonymous(&self) -> bool {
        self.header().is_anonymous()
    }

    pub fn description(&self) -> &str {
        &self.header().description
    }

    pub fn metadata(&self) -> &[MetadataUsage] {
        &self.header().metadata
    }

    pub fn canonical_name(&self) -> CanonicalName {
        self.header().canonical_name(self.kind())
    }

    /// Namespace in which this definition's children live
    pub fn as_namespace(&self) -> Namespace {
        self.header().as_namespace(self.kind())
    }

    pub fn as_struct(&self) -> Option<&StructDefinition> {
        match self {
            ElementDefinition::Struct(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<&ConstDefinition> {
        match self {
            ElementDefinition::Const(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_metadata(&self) -> Option<&MetadataDefinition> {
        match self {
            ElementDefinition::Metadata(d) => Some(d),
            _ => None,
        }
    }

    /// Definitions directly nested in this one, in declaration order
    pub fn children(&self) -> Vec<&ElementDefinition> {
        self.child_refs().into_iter().map(AsRef::as_ref).collect()
    }

    /// Shared handles of [`children`](Self::children)
    pub fn child_refs(&self) -> Vec<&DefinitionRef> {
        let mut out = Vec::new();
        push_usages(&mut out, self.metadata());

        match self {
            ElementDefinition::Scalar(_) | ElementDefinition::Fault(_) => {}
            ElementDefinition::IframeEndpoint(_) => {}
            ElementDefinition::Struct(d) => push_fields(&mut out, &d.struct_fields),
            ElementDefinition::Metadata(d) => push_fields(&mut out, &d.metadata_fields),
            ElementDefinition::Tuple(d) => out.extend(&d.tuple_types),
            ElementDefinition::Array(d) => out.push(&d.array_type),
            ElementDefinition::Optional(d) => out.push(&d.optional_type),
            ElementDefinition::Enum(d) => {
                out.push(&d.enum_type);
                out.extend(&d.enum_entries);
            }
            ElementDefinition::Union(d) => out.extend(&d.union_types),
            ElementDefinition::Inter(d) => out.extend(&d.inter_types),
            ElementDefinition::Const(d) => out.push(&d.const_type),
            ElementDefinition::Routine(d) => {
                out.extend(&d.routine_endpoints);
                out.extend(&d.routine_fault_union);
                out.push(&d.routine_input);
                out.push(&d.routine_output);
            }
            ElementDefinition::Protocol(d) => out.extend(&d.protocol_routines),
            ElementDefinition::KafkaEndpoint(d) => out.extend(d.endpoint_key.as_ref()),
        }

        out
    }

    /// This definition followed by everything nested in it
    pub fn collect(&self) -> Collect<'_> {
        Collect::new([self])
    }

    /// Everything nested in this definition, excluding itself
    pub fn collect_children(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.collect().skip(1)
    }
}

fn push_usages<'a>(out: &mut Vec<&'a DefinitionRef>, usages: &'a [MetadataUsage]) {
    out.extend(usages.iter().map(|usage| &usage.definition));
}

fn push_fields<'a>(out: &mut Vec<&'a DefinitionRef>, fields: &'a [FieldDefinition]) {
    for field in fields {
        push_usages(out, &field.metadata);
        out.push(&field.field_type);
    }
}

/// Lazy pre-order traversal over a definition graph.
///
/// Each distinct instance is yielded once even when shared by several
/// parents.
pub struct Collect<'a> {
    stack: Vec<&'a ElementDefinition>,
    seen: HashSet<*const ElementDefinition>,
}

impl<'a> Collect<'a> {
    pub fn new<I>(roots: I) -> Self
    where
        I: IntoIterator<Item = &'a ElementDefinition>,
    {
        let mut stack: Vec<_> = roots.into_iter().collect();
        stack.reverse();
        Self {
            stack,
            seen: HashSet::new(),
        }
    }
}

impl<'a> Iterator for Collect<'a> {
    type Item = &'a ElementDefinition;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(next) = self.stack.pop() {
            if !self.seen.insert(next as *const ElementDefinition) {
                continue;
            }
            self.stack.extend(next.children().into_iter().rev());
            return Some(next);
        }
        None
    }
}

/// Ordered set of top-level definitions; the unit handed to compaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecSheet {
    pub elements: Vec<DefinitionRef>,
}

impl SpecSheet {
    pub fn new(elements: Vec<DefinitionRef>) -> Self {
        Self { elements }
    }

    pub fn push(&mut self, element: DefinitionRef) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DefinitionRef> {
        self.elements.iter()
    }

    /// Every definition reachable from the sheet, each instance once
    pub fn collect_children(&self) -> Collect<'_> {
        Collect::new(self.elements.iter().map(AsRef::as_ref))
    }

    /// Find a reachable definition by canonical name
    pub fn find(&self, name: &CanonicalName) -> Option<&ElementDefinition> {
        self.collect_children()
            .find(|element| &element.canonical_name() == name)
    }

    /// Check that no two distinct definitions share a canonical name
    pub fn validate(&self) -> Result<(), BuildError> {
        let mut seen: HashMap<CanonicalName, &ElementDefinition> = HashMap::new();
        for element in self.collect_children() {
            let name = element.canonical_name();
            match seen.get(&name) {
                Some(existing) if *existing != element => {
                    return Err(BuildError::DuplicateName(name));
                }
                Some(_) => {}
                None => {
                    seen.insert(name, element);
                }
            }
        }
        Ok(())
    }
}

impl Add<DefinitionRef> for SpecSheet {
    type Output = SpecSheet;

    fn add(mut self, element: DefinitionRef) -> Self::Output {
        self.elements.push(element);
        self
    }
}

impl Add<SpecSheet> for SpecSheet {
    type Output = SpecSheet;

    fn add(mut self, sheet: SpecSheet) -> Self::Output {
        self.elements.extend(sheet.elements);
        self
    }
}

impl FromIterator<DefinitionRef> for SpecSheet {
    fn from_iter<T: IntoIterator<Item = DefinitionRef>>(iter: T) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl Extend<DefinitionRef> for SpecSheet {
    fn extend<T: IntoIterator<Item = DefinitionRef>>(&mut self, iter: T) {
        self.elements.extend(iter);
    }
}
