//! One-shot builders producing immutable definitions
//!
//! Builders are either *named* (rooted in a namespace) or *anonymous*. An
//! anonymous builder handed to a parent through a [`Slot`] becomes an inline
//! definition living in the parent's namespace, named after the slot it
//! fills (`x` for a field, `item` for an array element, `input` for routine
//! props, ...). Every slot checks the kind of what it receives.
//!
//! ```
//! use rpcspec_core::builder::{ElementBuilder, FieldBuilder, ScalarBuilder, StructBuilder};
//! use rpcspec_core::namespace::Namespace;
//!
//! let builtin = Namespace::new(["builtin"]);
//! let int = ScalarBuilder::named(builtin, "Int").build().unwrap();
//! let point = StructBuilder::named(Namespace::new(["pkg"]), "Point")
//!     .field(FieldBuilder::new("x", &int))
//!     .field(FieldBuilder::new("y", &int))
//!     .build()
//!     .unwrap();
//! assert_eq!(point.canonical_name().as_str(), "pkg.Point");
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::{
    ArrayDefinition, ConstDefinition, DefinitionKind, DefinitionRef, ElementDefinition,
    ElementHeader, EnumDefinition, ExpectedKind, FaultDefinition, FieldDefinition,
    IframeEndpointDefinition, IframePath, IframeSecurity, InterDefinition,
    KafkaEndpointDefinition, KafkaSecurity, KafkaTopic, MetadataDefinition, MetadataFieldUsage,
    MetadataUsage, OptionalDefinition, ProtocolDefinition, RoutineDefinition, ScalarDefinition,
    StructDefinition, TupleDefinition, UnionDefinition,
};
use crate::error::BuildError;
use crate::literal::Literal;
use crate::namespace::{CanonicalName, Namespace};

/// Reject names that could collide with reserved or structural syntax
pub fn validate_name(name: &str) -> Result<(), BuildError> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.contains('.') {
        "'.' separates namespace segments"
    } else if name.contains(['(', ')']) {
        "parentheses are reserved for anonymous definitions"
    } else {
        return Ok(());
    };
    Err(BuildError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Reject literals the wire form cannot carry
fn check_literal(owner: impl std::fmt::Display, value: &Literal) -> Result<(), BuildError> {
    if value.is_finite() {
        return Ok(());
    }
    Err(BuildError::NonFiniteLiteral {
        owner: owner.to_string(),
        value: value.to_string(),
    })
}

/// Strip the indentation shared by every non-blank line
fn trim_indent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    let (Some(start), Some(end)) = (start, end) else {
        return String::new();
    };
    let lines = &lines[start..=end];
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Identity and documentation of a definition under construction
#[derive(Debug, Clone, Default)]
pub struct HeaderBuilder {
    name: Option<String>,
    namespace: Option<Namespace>,
    is_inline: bool,
    description: String,
    metadata: Vec<MetadataUsage>,
    /// Namespace came from the caller, not from an enclosing definition
    rooted: bool,
}

impl HeaderBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            namespace: Some(namespace),
            rooted: true,
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self {
            is_inline: true,
            ..Self::default()
        }
    }

    /// Place an unplaced header under `namespace`, taking `slot` as name
    /// unless one was chosen already.
    fn attach(&mut self, namespace: &Namespace, slot: &str) {
        if self.namespace.is_some() {
            return;
        }
        self.namespace = Some(namespace.clone());
        self.name.get_or_insert_with(|| slot.to_string());
        self.is_inline = true;
    }

    fn finish(self, kind: DefinitionKind) -> Result<ElementHeader, BuildError> {
        let namespace = self
            .namespace
            .ok_or(BuildError::DanglingAnonymous { kind })?;
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if self.rooted {
            for segment in &namespace.segments {
                validate_name(segment)?;
            }
        }
        Ok(ElementHeader {
            name: self.name,
            namespace,
            is_inline: self.is_inline,
            description: self.description,
            metadata: self.metadata,
        })
    }
}

/// Setters shared by every definition builder
pub trait ElementBuilder: Sized {
    const KIND: DefinitionKind;

    fn header_mut(&mut self) -> &mut HeaderBuilder;

    fn build(self) -> Result<DefinitionRef, BuildError>;

    /// Append markdown documentation, trimming common indentation
    fn description(mut self, text: impl AsRef<str>) -> Self {
        let header = self.header_mut();
        header.description.push_str(&trim_indent(text.as_ref()));
        self
    }

    fn metadata(mut self, usage: MetadataUsage) -> Self {
        self.header_mut().metadata.push(usage);
        self
    }

    fn inline(mut self, is_inline: bool) -> Self {
        self.header_mut().is_inline = is_inline;
        self
    }

    /// Preferred name for an anonymous builder once it is attached
    fn called(mut self, name: impl Into<String>) -> Self {
        self.header_mut().name = Some(name.into());
        self
    }

    /// Place an anonymous builder directly in `namespace` without naming it
    fn in_namespace(mut self, namespace: Namespace) -> Self {
        let header = self.header_mut();
        header.namespace = Some(namespace);
        header.is_inline = true;
        self
    }
}

/// A builder that can be turned into a definition by its parent
pub trait AnonymousDefinition {
    fn kind(&self) -> DefinitionKind;

    fn create_definition(
        self: Box<Self>,
        namespace: &Namespace,
        slot: &str,
    ) -> Result<DefinitionRef, BuildError>;
}

impl<B: ElementBuilder> AnonymousDefinition for B {
    fn kind(&self) -> DefinitionKind {
        B::KIND
    }

    fn create_definition(
        mut self: Box<Self>,
        namespace: &Namespace,
        slot: &str,
    ) -> Result<DefinitionRef, BuildError> {
        self.header_mut().attach(namespace, slot);
        (*self).build()
    }
}

/// A reference slot: an existing definition or an anonymous one to attach
pub enum Slot {
    Defined(DefinitionRef),
    Anonymous(Box<dyn AnonymousDefinition>),
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Defined(d) => write!(f, "Slot::Defined({})", d.canonical_name()),
            Slot::Anonymous(b) => write!(f, "Slot::Anonymous({})", b.kind()),
        }
    }
}

impl From<DefinitionRef> for Slot {
    fn from(value: DefinitionRef) -> Self {
        Slot::Defined(value)
    }
}

impl From<&DefinitionRef> for Slot {
    fn from(value: &DefinitionRef) -> Self {
        Slot::Defined(Arc::clone(value))
    }
}

macro_rules! slot_from_builder {
    ($($builder:ty),* $(,)?) => {
        $(
            impl From<$builder> for Slot {
                fn from(value: $builder) -> Self {
                    Slot::Anonymous(Box::new(value))
                }
            }
        )*
    };
}

slot_from_builder!(
    ScalarBuilder,
    StructBuilder,
    TupleBuilder,
    ArrayBuilder,
    OptionalBuilder,
    EnumBuilder,
    UnionBuilder,
    InterBuilder,
    ConstBuilder,
    FaultBuilder,
    MetadataBuilder,
    RoutineBuilder,
    ProtocolBuilder,
    KafkaEndpointBuilder,
    IframeEndpointBuilder,
);

/// Where a slot is being resolved, for placement and error reporting.
///
/// Remembers every child it resolved so two distinct children cannot end
/// up under one canonical name.
struct Owner<'a> {
    name: &'a CanonicalName,
    namespace: &'a Namespace,
    children: HashMap<CanonicalName, DefinitionRef>,
}

impl<'a> Owner<'a> {
    fn new(name: &'a CanonicalName, namespace: &'a Namespace) -> Self {
        Self {
            name,
            namespace,
            children: HashMap::new(),
        }
    }

    fn resolve(
        &mut self,
        slot: Slot,
        slot_name: &str,
        field: &'static str,
        expected: ExpectedKind,
    ) -> Result<DefinitionRef, BuildError> {
        let definition = match slot {
            Slot::Defined(definition) => definition,
            Slot::Anonymous(builder) => builder.create_definition(self.namespace, slot_name)?,
        };
        if !expected.accepts(definition.kind()) {
            return Err(BuildError::KindMismatch {
                owner: self.name.clone(),
                field,
                reference: definition.canonical_name(),
                expected,
                actual: definition.kind(),
            });
        }
        self.remember(&definition)?;
        Ok(definition)
    }

    fn remember(&mut self, definition: &DefinitionRef) -> Result<(), BuildError> {
        match self.children.entry(definition.canonical_name()) {
            Entry::Occupied(existing)
                if !Arc::ptr_eq(existing.get(), definition) && existing.get() != definition =>
            {
                Err(BuildError::DuplicateName(existing.key().clone()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(definition));
                Ok(())
            }
        }
    }

    fn resolve_all(
        &mut self,
        slots: Vec<Slot>,
        prefix: &str,
        field: &'static str,
        expected: ExpectedKind,
    ) -> Result<Vec<DefinitionRef>, BuildError> {
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| self.resolve(slot, &format!("{}{}", prefix, i), field, expected))
            .collect()
    }
}

/// Finish a header and hand the parts needed to resolve its slots
fn open(
    header: HeaderBuilder,
    kind: DefinitionKind,
) -> Result<(ElementHeader, CanonicalName, Namespace), BuildError> {
    let header = header.finish(kind)?;
    let name = header.canonical_name(kind);
    let namespace = header.as_namespace(kind);
    Ok((header, name, namespace))
}

#[derive(Debug)]
pub struct FieldBuilder {
    name: String,
    description: String,
    metadata: Vec<MetadataUsage>,
    field_type: Slot,
    field_default: Option<Literal>,
}

impl FieldBuilder {
    pub fn new(name: impl Into<String>, field_type: impl Into<Slot>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            metadata: Vec::new(),
            field_type: field_type.into(),
            field_default: None,
        }
    }

    pub fn description(mut self, text: impl AsRef<str>) -> Self {
        self.description.push_str(&trim_indent(text.as_ref()));
        self
    }

    pub fn metadata(mut self, usage: MetadataUsage) -> Self {
        self.metadata.push(usage);
        self
    }

    pub fn default_value(mut self, value: impl Into<Literal>) -> Self {
        self.field_default = Some(value.into());
        self
    }

    fn build_in(self, owner: &mut Owner<'_>, field: &'static str) -> Result<FieldDefinition, BuildError> {
        validate_name(&self.name)?;
        if let Some(default) = &self.field_default {
            check_literal(format!("{}.{}", owner.name, self.name), default)?;
        }
        let field_type = owner.resolve(self.field_type, &self.name, field, ExpectedKind::Type)?;
        Ok(FieldDefinition {
            name: self.name,
            description: self.description,
            metadata: self.metadata,
            field_type,
            field_default: self.field_default,
        })
    }
}

fn build_fields(
    fields: Vec<FieldBuilder>,
    owner: &mut Owner<'_>,
    field: &'static str,
) -> Result<Vec<FieldDefinition>, BuildError> {
    let mut out: Vec<FieldDefinition> = Vec::with_capacity(fields.len());
    for builder in fields {
        let built = builder.build_in(owner, field)?;
        if out.iter().any(|f| f.name == built.name) {
            return Err(BuildError::DuplicateName(CanonicalName::of(
                owner.namespace,
                &built.name,
            )));
        }
        out.push(built);
    }
    Ok(out)
}

#[derive(Debug)]
pub struct ScalarBuilder {
    header: HeaderBuilder,
}

impl ScalarBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
        }
    }
}

impl ElementBuilder for ScalarBuilder {
    const KIND: DefinitionKind = DefinitionKind::Scalar;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let header = self.header.finish(Self::KIND)?;
        Ok(Arc::new(ElementDefinition::Scalar(ScalarDefinition { header })))
    }
}

#[derive(Debug)]
pub struct StructBuilder {
    header: HeaderBuilder,
    fields: Vec<FieldBuilder>,
}

impl StructBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            fields: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldBuilder) -> Self {
        self.fields.push(field);
        self
    }
}

impl ElementBuilder for StructBuilder {
    const KIND: DefinitionKind = DefinitionKind::Struct;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let struct_fields = build_fields(self.fields, &mut owner, "struct_fields")?;
        Ok(Arc::new(ElementDefinition::Struct(StructDefinition {
            header,
            struct_fields,
        })))
    }
}

#[derive(Debug)]
pub struct TupleBuilder {
    header: HeaderBuilder,
    types: Vec<Slot>,
}

impl TupleBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            types: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            types: Vec::new(),
        }
    }

    pub fn item(mut self, ty: impl Into<Slot>) -> Self {
        self.types.push(ty.into());
        self
    }
}

impl ElementBuilder for TupleBuilder {
    const KIND: DefinitionKind = DefinitionKind::Tuple;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let tuple_types = owner.resolve_all(self.types, "item", "tuple_types", ExpectedKind::Type)?;
        Ok(Arc::new(ElementDefinition::Tuple(TupleDefinition {
            header,
            tuple_types,
        })))
    }
}

#[derive(Debug)]
pub struct ArrayBuilder {
    header: HeaderBuilder,
    item: Slot,
}

impl ArrayBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>, item: impl Into<Slot>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            item: item.into(),
        }
    }

    pub fn anonymous(item: impl Into<Slot>) -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            item: item.into(),
        }
    }
}

impl ElementBuilder for ArrayBuilder {
    const KIND: DefinitionKind = DefinitionKind::Array;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let array_type = owner.resolve(self.item, "item", "array_type", ExpectedKind::Type)?;
        Ok(Arc::new(ElementDefinition::Array(ArrayDefinition {
            header,
            array_type,
        })))
    }
}

#[derive(Debug)]
pub struct OptionalBuilder {
    header: HeaderBuilder,
    item: Slot,
}

impl OptionalBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>, item: impl Into<Slot>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            item: item.into(),
        }
    }

    pub fn anonymous(item: impl Into<Slot>) -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            item: item.into(),
        }
    }
}

impl ElementBuilder for OptionalBuilder {
    const KIND: DefinitionKind = DefinitionKind::Optional;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let optional_type =
            owner.resolve(self.item, "item", "optional_type", ExpectedKind::Type)?;
        Ok(Arc::new(ElementDefinition::Optional(OptionalDefinition {
            header,
            optional_type,
        })))
    }
}

#[derive(Debug)]
enum EnumEntry {
    Value {
        name: String,
        value: Literal,
        description: String,
    },
    Defined(Slot),
}

/// Enum over an underlying type; entries become named constants inside the
/// enum's namespace, typed by the enum's type.
#[derive(Debug)]
pub struct EnumBuilder {
    header: HeaderBuilder,
    enum_type: Slot,
    entries: Vec<EnumEntry>,
}

impl EnumBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>, ty: impl Into<Slot>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            enum_type: ty.into(),
            entries: Vec::new(),
        }
    }

    pub fn anonymous(ty: impl Into<Slot>) -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            enum_type: ty.into(),
            entries: Vec::new(),
        }
    }

    pub fn entry(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.entries.push(EnumEntry::Value {
            name: name.into(),
            value: value.into(),
            description: String::new(),
        });
        self
    }

    pub fn documented_entry(
        mut self,
        name: impl Into<String>,
        value: impl Into<Literal>,
        description: impl AsRef<str>,
    ) -> Self {
        self.entries.push(EnumEntry::Value {
            name: name.into(),
            value: value.into(),
            description: trim_indent(description.as_ref()),
        });
        self
    }

    /// Reuse an existing constant as an entry
    pub fn entry_const(mut self, constant: impl Into<Slot>) -> Self {
        self.entries.push(EnumEntry::Defined(constant.into()));
        self
    }
}

impl ElementBuilder for EnumBuilder {
    const KIND: DefinitionKind = DefinitionKind::Enum;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let enum_type = owner.resolve(self.enum_type, "type", "enum_type", ExpectedKind::Type)?;

        let mut enum_entries = Vec::with_capacity(self.entries.len());
        for (i, entry) in self.entries.into_iter().enumerate() {
            let slot = match entry {
                EnumEntry::Value {
                    name,
                    value,
                    description,
                } => Slot::from(
                    ConstBuilder::named(namespace.clone(), name, &enum_type, value)
                        .description(description),
                ),
                EnumEntry::Defined(slot) => slot,
            };
            let entry = owner.resolve(
                slot,
                &format!("entry{}", i),
                "enum_entries",
                ExpectedKind::Const,
            )?;
            enum_entries.push(entry);
        }

        Ok(Arc::new(ElementDefinition::Enum(EnumDefinition {
            header,
            enum_type,
            enum_entries,
        })))
    }
}

#[derive(Debug)]
pub struct UnionBuilder {
    header: HeaderBuilder,
    discriminator: String,
    types: Vec<Slot>,
}

impl UnionBuilder {
    pub const DEFAULT_DISCRIMINATOR: &'static str = "type";

    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            discriminator: Self::DEFAULT_DISCRIMINATOR.to_string(),
            types: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            discriminator: Self::DEFAULT_DISCRIMINATOR.to_string(),
            types: Vec::new(),
        }
    }

    pub fn discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = discriminator.into();
        self
    }

    pub fn variant(mut self, ty: impl Into<Slot>) -> Self {
        self.types.push(ty.into());
        self
    }
}

impl ElementBuilder for UnionBuilder {
    const KIND: DefinitionKind = DefinitionKind::Union;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let union_types =
            owner.resolve_all(self.types, "variant", "union_types", ExpectedKind::Struct)?;
        Ok(Arc::new(ElementDefinition::Union(UnionDefinition {
            header,
            union_discriminator: self.discriminator,
            union_types,
        })))
    }
}

#[derive(Debug)]
pub struct InterBuilder {
    header: HeaderBuilder,
    types: Vec<Slot>,
}

impl InterBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            types: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            types: Vec::new(),
        }
    }

    pub fn with(mut self, ty: impl Into<Slot>) -> Self {
        self.types.push(ty.into());
        self
    }
}

impl ElementBuilder for InterBuilder {
    const KIND: DefinitionKind = DefinitionKind::Inter;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let inter_types =
            owner.resolve_all(self.types, "part", "inter_types", ExpectedKind::Struct)?;
        Ok(Arc::new(ElementDefinition::Inter(InterDefinition {
            header,
            inter_types,
        })))
    }
}

#[derive(Debug)]
pub struct ConstBuilder {
    header: HeaderBuilder,
    const_type: Slot,
    const_value: Literal,
}

impl ConstBuilder {
    pub fn named(
        namespace: Namespace,
        name: impl Into<String>,
        ty: impl Into<Slot>,
        value: impl Into<Literal>,
    ) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            const_type: ty.into(),
            const_value: value.into(),
        }
    }

    pub fn anonymous(ty: impl Into<Slot>, value: impl Into<Literal>) -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            const_type: ty.into(),
            const_value: value.into(),
        }
    }
}

impl ElementBuilder for ConstBuilder {
    const KIND: DefinitionKind = DefinitionKind::Const;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        check_literal(&name, &self.const_value)?;
        let const_type = owner.resolve(self.const_type, "type", "const_type", ExpectedKind::Type)?;
        Ok(Arc::new(ElementDefinition::Const(ConstDefinition {
            header,
            const_type,
            const_value: self.const_value,
        })))
    }
}

#[derive(Debug)]
pub struct FaultBuilder {
    header: HeaderBuilder,
}

impl FaultBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
        }
    }
}

impl ElementBuilder for FaultBuilder {
    const KIND: DefinitionKind = DefinitionKind::Fault;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let header = self.header.finish(Self::KIND)?;
        Ok(Arc::new(ElementDefinition::Fault(FaultDefinition { header })))
    }
}

#[derive(Debug)]
pub struct MetadataBuilder {
    header: HeaderBuilder,
    fields: Vec<FieldBuilder>,
}

impl MetadataBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            fields: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldBuilder) -> Self {
        self.fields.push(field);
        self
    }
}

impl ElementBuilder for MetadataBuilder {
    const KIND: DefinitionKind = DefinitionKind::Metadata;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let metadata_fields = build_fields(self.fields, &mut owner, "metadata_fields")?;
        Ok(Arc::new(ElementDefinition::Metadata(MetadataDefinition {
            header,
            metadata_fields,
        })))
    }
}

/// Binds a metadata definition to concrete field values
#[derive(Debug)]
pub struct MetadataUsageBuilder {
    definition: DefinitionRef,
    fields: Vec<MetadataFieldUsage>,
}

impl MetadataUsageBuilder {
    pub fn new(definition: &DefinitionRef) -> Self {
        Self {
            definition: Arc::clone(definition),
            fields: Vec::new(),
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.fields.push(MetadataFieldUsage {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn build(self) -> Result<MetadataUsage, BuildError> {
        let metadata = self.definition.canonical_name();
        let Some(definition) = self.definition.as_metadata() else {
            return Err(BuildError::KindMismatch {
                owner: metadata.clone(),
                field: "definition",
                reference: metadata,
                expected: ExpectedKind::Metadata,
                actual: self.definition.kind(),
            });
        };
        for usage in &self.fields {
            if !definition.metadata_fields.iter().any(|f| f.name == usage.name) {
                return Err(BuildError::UnknownMetadataField {
                    metadata,
                    field: usage.name.clone(),
                });
            }
            check_literal(format!("{}.{}", metadata, usage.name), &usage.value)?;
        }
        Ok(MetadataUsage {
            definition: self.definition,
            fields: self.fields,
        })
    }
}

/// A routine with its transport bindings, faults and input/output props
#[derive(Debug)]
pub struct RoutineBuilder {
    header: HeaderBuilder,
    endpoints: Vec<Slot>,
    faults: Vec<Slot>,
    input: StructBuilder,
    output: StructBuilder,
}

impl RoutineBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::with_header(HeaderBuilder::named(namespace, name))
    }

    /// An unplaced routine, attached under its parent by `name`
    pub fn anonymous(name: impl Into<String>) -> Self {
        let mut header = HeaderBuilder::anonymous();
        header.name = Some(name.into());
        Self::with_header(header)
    }

    fn with_header(header: HeaderBuilder) -> Self {
        Self {
            header,
            endpoints: Vec::new(),
            faults: Vec::new(),
            input: StructBuilder::anonymous(),
            output: StructBuilder::anonymous(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<Slot>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Bind to kafka; `KafkaACL` security is always included
    pub fn kafka(self, endpoint: KafkaEndpointBuilder) -> Self {
        let mut endpoint = endpoint.security(KafkaSecurity::kafka_acl());
        endpoint.header.name.get_or_insert_with(|| "kafka".to_string());
        self.endpoint(endpoint)
    }

    /// Bind to an iframe; `SameClient` security is always included
    pub fn iframe(self, endpoint: IframeEndpointBuilder) -> Self {
        let mut endpoint = endpoint.security(IframeSecurity::same_client());
        endpoint.header.name.get_or_insert_with(|| "iframe".to_string());
        self.endpoint(endpoint)
    }

    pub fn fault(mut self, fault: impl Into<Slot>) -> Self {
        self.faults.push(fault.into());
        self
    }

    pub fn input(mut self, field: FieldBuilder) -> Self {
        self.input = self.input.field(field);
        self
    }

    pub fn output(mut self, field: FieldBuilder) -> Self {
        self.output = self.output.field(field);
        self
    }
}

impl ElementBuilder for RoutineBuilder {
    const KIND: DefinitionKind = DefinitionKind::Routine;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let routine_endpoints = owner.resolve_all(
            self.endpoints,
            "endpoint",
            "routine_endpoints",
            ExpectedKind::Endpoint,
        )?;
        let routine_fault_union =
            owner.resolve_all(self.faults, "fault", "routine_fault_union", ExpectedKind::Fault)?;
        let routine_input =
            owner.resolve(self.input.into(), "input", "routine_input", ExpectedKind::Struct)?;
        let routine_output =
            owner.resolve(self.output.into(), "output", "routine_output", ExpectedKind::Struct)?;
        Ok(Arc::new(ElementDefinition::Routine(RoutineDefinition {
            header,
            routine_endpoints,
            routine_fault_union,
            routine_input,
            routine_output,
        })))
    }
}

#[derive(Debug)]
pub struct ProtocolBuilder {
    header: HeaderBuilder,
    routines: Vec<Slot>,
}

impl ProtocolBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            header: HeaderBuilder::named(namespace, name),
            routines: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            header: HeaderBuilder::anonymous(),
            routines: Vec::new(),
        }
    }

    pub fn routine(mut self, routine: impl Into<Slot>) -> Self {
        self.routines.push(routine.into());
        self
    }
}

impl ElementBuilder for ProtocolBuilder {
    const KIND: DefinitionKind = DefinitionKind::Protocol;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let protocol_routines = owner.resolve_all(
            self.routines,
            "routine",
            "protocol_routines",
            ExpectedKind::Routine,
        )?;
        Ok(Arc::new(ElementDefinition::Protocol(ProtocolDefinition {
            header,
            protocol_routines,
        })))
    }
}

#[derive(Debug)]
pub struct KafkaEndpointBuilder {
    header: HeaderBuilder,
    topic: Option<String>,
    security: Vec<KafkaSecurity>,
    key: Option<Slot>,
}

impl KafkaEndpointBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::with_header(HeaderBuilder::named(namespace, name))
    }

    pub fn anonymous() -> Self {
        Self::with_header(HeaderBuilder::anonymous())
    }

    fn with_header(header: HeaderBuilder) -> Self {
        Self {
            header,
            topic: None,
            security: Vec::new(),
            key: None,
        }
    }

    /// Explicit topic; defaults to the endpoint namespace
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn security(mut self, security: KafkaSecurity) -> Self {
        if !self.security.contains(&security) {
            self.security.push(security);
        }
        self
    }

    pub fn key(mut self, key: impl Into<Slot>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl ElementBuilder for KafkaEndpointBuilder {
    const KIND: DefinitionKind = DefinitionKind::KafkaEndpoint;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let (header, name, namespace) = open(self.header, Self::KIND)?;
        let mut owner = Owner::new(&name, &namespace);
        let endpoint_key = self
            .key
            .map(|key| owner.resolve(key, "key", "endpoint_key", ExpectedKind::Tuple))
            .transpose()?;
        let endpoint_topic = match self.topic {
            Some(topic) => KafkaTopic(topic),
            None => header.namespace.to_kafka_topic(),
        };
        Ok(Arc::new(ElementDefinition::KafkaEndpoint(
            KafkaEndpointDefinition {
                header,
                endpoint_topic,
                endpoint_security_inter: self.security,
                endpoint_key,
            },
        )))
    }
}

#[derive(Debug)]
pub struct IframeEndpointBuilder {
    header: HeaderBuilder,
    path: Option<String>,
    security: Vec<IframeSecurity>,
}

impl IframeEndpointBuilder {
    pub fn named(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::with_header(HeaderBuilder::named(namespace, name))
    }

    pub fn anonymous() -> Self {
        Self::with_header(HeaderBuilder::anonymous())
    }

    fn with_header(header: HeaderBuilder) -> Self {
        Self {
            header,
            path: None,
            security: Vec::new(),
        }
    }

    /// Explicit path; defaults to the endpoint namespace
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn security(mut self, security: IframeSecurity) -> Self {
        if !self.security.contains(&security) {
            self.security.push(security);
        }
        self
    }
}

impl ElementBuilder for IframeEndpointBuilder {
    const KIND: DefinitionKind = DefinitionKind::IframeEndpoint;

    fn header_mut(&mut self) -> &mut HeaderBuilder {
        &mut self.header
    }

    fn build(self) -> Result<DefinitionRef, BuildError> {
        let header = self.header.finish(Self::KIND)?;
        let endpoint_path = match self.path {
            Some(path) => IframePath(path),
            None => header.namespace.to_iframe_path(),
        };
        Ok(Arc::new(ElementDefinition::IframeEndpoint(
            IframeEndpointDefinition {
                header,
                endpoint_path,
                endpoint_security_inter: self.security,
            },
        )))
    }
}
