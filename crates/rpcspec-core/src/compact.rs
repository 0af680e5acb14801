//! Compact wire form
//!
//! Flattening replaces every referential child with its canonical name
//! (serialized under a `<field>.ref` key) and keys each node by its own
//! canonical name. Field definitions and metadata usages have no identity of
//! their own, so they stay nested inside their owner.

use std::fmt;

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace};

use crate::definition::{
    DefinitionKind, DefinitionRef, ElementDefinition, ElementHeader, FieldDefinition,
    IframePath, IframeSecurity, KafkaSecurity, KafkaTopic, MetadataFieldUsage, MetadataUsage,
    SpecSheet,
};
use crate::error::CompactError;
use crate::literal::Literal;
use crate::namespace::CanonicalName;

/// Header of a compact node; metadata usages reference by name
pub type CompactHeader = ElementHeader<CompactMetadataUsage>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactMetadataUsage {
    #[serde(rename = "definition.ref")]
    pub definition: CanonicalName,
    #[serde(default)]
    pub fields: Vec<MetadataFieldUsage>,
}

impl From<&MetadataUsage> for CompactMetadataUsage {
    fn from(usage: &MetadataUsage) -> Self {
        Self {
            definition: usage.definition.canonical_name(),
            fields: usage.fields.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactFieldDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Vec<CompactMetadataUsage>,
    #[serde(rename = "field_type.ref")]
    pub field_type: CanonicalName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_default: Option<Literal>,
}

impl From<&FieldDefinition> for CompactFieldDefinition {
    fn from(field: &FieldDefinition) -> Self {
        Self {
            name: field.name.clone(),
            description: field.description.clone(),
            metadata: field.metadata.iter().map(Into::into).collect(),
            field_type: field.field_type.canonical_name(),
            field_default: field.field_default.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactScalarDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactStructDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(default)]
    pub struct_fields: Vec<CompactFieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactTupleDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "tuple_types.ref")]
    pub tuple_types: Vec<CanonicalName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactArrayDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "array_type.ref")]
    pub array_type: CanonicalName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactOptionalDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "optional_type.ref")]
    pub optional_type: CanonicalName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactEnumDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "enum_type.ref")]
    pub enum_type: CanonicalName,
    #[serde(rename = "enum_entries.ref")]
    pub enum_entries: Vec<CanonicalName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactUnionDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    pub union_discriminator: String,
    #[serde(rename = "union_types.ref")]
    pub union_types: Vec<CanonicalName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactInterDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "inter_types.ref")]
    pub inter_types: Vec<CanonicalName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactConstDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "const_type.ref")]
    pub const_type: CanonicalName,
    pub const_value: Literal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactFaultDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactMetadataDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(default)]
    pub metadata_fields: Vec<CompactFieldDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactRoutineDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "routine_endpoints.ref", default)]
    pub routine_endpoints: Vec<CanonicalName>,
    #[serde(rename = "routine_fault_union.ref", default)]
    pub routine_fault_union: Vec<CanonicalName>,
    #[serde(rename = "routine_input.ref")]
    pub routine_input: CanonicalName,
    #[serde(rename = "routine_output.ref")]
    pub routine_output: CanonicalName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactProtocolDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    #[serde(rename = "protocol_routines.ref", default)]
    pub protocol_routines: Vec<CanonicalName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactKafkaEndpointDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    pub endpoint_topic: KafkaTopic,
    #[serde(default)]
    pub endpoint_security_inter: Vec<KafkaSecurity>,
    #[serde(rename = "endpoint_key.ref", default, skip_serializing_if = "Option::is_none")]
    pub endpoint_key: Option<CanonicalName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactIframeEndpointDefinition {
    #[serde(flatten)]
    pub header: CompactHeader,
    pub endpoint_path: IframePath,
    #[serde(default)]
    pub endpoint_security_inter: Vec<IframeSecurity>,
}

/// One node of the compact form, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompactElementDefinition {
    Scalar(CompactScalarDefinition),
    Struct(CompactStructDefinition),
    Tuple(CompactTupleDefinition),
    Array(CompactArrayDefinition),
    Optional(CompactOptionalDefinition),
    Enum(CompactEnumDefinition),
    Union(CompactUnionDefinition),
    Inter(CompactInterDefinition),
    Const(CompactConstDefinition),
    Fault(CompactFaultDefinition),
    Metadata(CompactMetadataDefinition),
    Routine(CompactRoutineDefinition),
    Protocol(CompactProtocolDefinition),
    KafkaEndpoint(CompactKafkaEndpointDefinition),
    IframeEndpoint(CompactIframeEndpointDefinition),
}

impl CompactElementDefinition {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            CompactElementDefinition::Scalar(_) => DefinitionKind::Scalar,
            CompactElementDefinition::Struct(_) => DefinitionKind::Struct,
            CompactElementDefinition::Tuple(_) => DefinitionKind::Tuple,
            CompactElementDefinition::Array(_) => DefinitionKind::Array,
            CompactElementDefinition::Optional(_) => DefinitionKind::Optional,
            CompactElementDefinition::Enum(_) => DefinitionKind::Enum,
            CompactElementDefinition::Union(_) => DefinitionKind::Union,
            CompactElementDefinition::Inter(_) => DefinitionKind::Inter,
            CompactElementDefinition::Const(_) => DefinitionKind::Const,
            CompactElementDefinition::Fault(_) => DefinitionKind::Fault,
            CompactElementDefinition::Metadata(_) => DefinitionKind::Metadata,
            CompactElementDefinition::Routine(_) => DefinitionKind::Routine,
            CompactElementDefinition::Protocol(_) => DefinitionKind::Protocol,
            CompactElementDefinition::KafkaEndpoint(_) => DefinitionKind::KafkaEndpoint,
            CompactElementDefinition::IframeEndpoint(_) => DefinitionKind::IframeEndpoint,
        }
    }

    pub fn header(&self) -> &CompactHeader {
        match self {
            CompactElementDefinition::Scalar(d) => &d.header,
            CompactElementDefinition::Struct(d) => &d.header,
            CompactElementDefinition::Tuple(d) => &d.header,
            CompactElementDefinition::Array(d) => &d.header,
            CompactElementDefinition::Optional(d) => &d.header,
            CompactElementDefinition::Enum(d) => &d.header,
            CompactElementDefinition::Union(d) => &d.header,
            CompactElementDefinition::Inter(d) => &d.header,
            CompactElementDefinition::Const(d) => &d.header,
            CompactElementDefinition::Fault(d) => &d.header,
            CompactElementDefinition::Metadata(d) => &d.header,
            CompactElementDefinition::Routine(d) => &d.header,
            CompactElementDefinition::Protocol(d) => &d.header,
            CompactElementDefinition::KafkaEndpoint(d) => &d.header,
            CompactElementDefinition::IframeEndpoint(d) => &d.header,
        }
    }

    pub fn canonical_name(&self) -> CanonicalName {
        self.header().canonical_name(self.kind())
    }

    /// Every outgoing reference as `(wire key, target)`, in field order
    pub fn references(&self) -> Vec<(&'static str, &CanonicalName)> {
        let mut out = Vec::new();
        push_usages(&mut out, &self.header().metadata);

        match self {
            CompactElementDefinition::Scalar(_)
            | CompactElementDefinition::Fault(_)
            | CompactElementDefinition::IframeEndpoint(_) => {}
            CompactElementDefinition::Struct(d) => push_fields(&mut out, &d.struct_fields),
            CompactElementDefinition::Metadata(d) => push_fields(&mut out, &d.metadata_fields),
            CompactElementDefinition::Tuple(d) => push_refs(&mut out, "tuple_types.ref", &d.tuple_types),
            CompactElementDefinition::Array(d) => push_refs(&mut out, "array_type.ref", [&d.array_type]),
            CompactElementDefinition::Optional(d) => {
                push_refs(&mut out, "optional_type.ref", [&d.optional_type])
            }
            CompactElementDefinition::Enum(d) => {
                push_refs(&mut out, "enum_type.ref", [&d.enum_type]);
                push_refs(&mut out, "enum_entries.ref", &d.enum_entries);
            }
            CompactElementDefinition::Union(d) => push_refs(&mut out, "union_types.ref", &d.union_types),
            CompactElementDefinition::Inter(d) => push_refs(&mut out, "inter_types.ref", &d.inter_types),
            CompactElementDefinition::Const(d) => push_refs(&mut out, "const_type.ref", [&d.const_type]),
            CompactElementDefinition::Routine(d) => {
                push_refs(&mut out, "routine_endpoints.ref", &d.routine_endpoints);
                push_refs(&mut out, "routine_fault_union.ref", &d.routine_fault_union);
                push_refs(&mut out, "routine_input.ref", [&d.routine_input]);
                push_refs(&mut out, "routine_output.ref", [&d.routine_output]);
            }
            CompactElementDefinition::Protocol(d) => {
                push_refs(&mut out, "protocol_routines.ref", &d.protocol_routines)
            }
            CompactElementDefinition::KafkaEndpoint(d) => {
                push_refs(&mut out, "endpoint_key.ref", d.endpoint_key.as_ref())
            }
        }
        out
    }
}

type References<'a> = Vec<(&'static str, &'a CanonicalName)>;

fn push_refs<'a, I>(out: &mut References<'a>, key: &'static str, names: I)
where
    I: IntoIterator<Item = &'a CanonicalName>,
{
    out.extend(names.into_iter().map(|name| (key, name)));
}

fn push_usages<'a>(out: &mut References<'a>, usages: &'a [CompactMetadataUsage]) {
    push_refs(out, "definition.ref", usages.iter().map(|usage| &usage.definition));
}

fn push_fields<'a>(out: &mut References<'a>, fields: &'a [CompactFieldDefinition]) {
    for field in fields {
        push_usages(out, &field.metadata);
        push_refs(out, "field_type.ref", [&field.field_type]);
    }
}

fn compact_header(header: &ElementHeader) -> CompactHeader {
    header.with_metadata(header.metadata.iter().map(Into::into).collect())
}

fn names(definitions: &[DefinitionRef]) -> Vec<CanonicalName> {
    definitions.iter().map(|d| d.canonical_name()).collect()
}

fn compact_fields(fields: &[FieldDefinition]) -> Vec<CompactFieldDefinition> {
    fields.iter().map(Into::into).collect()
}

impl ElementDefinition {
    /// Flatten this definition alone; children become canonical names
    pub fn to_compact(&self) -> CompactElementDefinition {
        let header = compact_header(self.header());
        match self {
            ElementDefinition::Scalar(_) => {
                CompactElementDefinition::Scalar(CompactScalarDefinition { header })
            }
            ElementDefinition::Struct(d) => {
                CompactElementDefinition::Struct(CompactStructDefinition {
                    header,
                    struct_fields: compact_fields(&d.struct_fields),
                })
            }
            ElementDefinition::Tuple(d) => CompactElementDefinition::Tuple(CompactTupleDefinition {
                header,
                tuple_types: names(&d.tuple_types),
            }),
            ElementDefinition::Array(d) => CompactElementDefinition::Array(CompactArrayDefinition {
                header,
                array_type: d.array_type.canonical_name(),
            }),
            ElementDefinition::Optional(d) => {
                CompactElementDefinition::Optional(CompactOptionalDefinition {
                    header,
                    optional_type: d.optional_type.canonical_name(),
                })
            }
            ElementDefinition::Enum(d) => CompactElementDefinition::Enum(CompactEnumDefinition {
                header,
                enum_type: d.enum_type.canonical_name(),
                enum_entries: names(&d.enum_entries),
            }),
            ElementDefinition::Union(d) => CompactElementDefinition::Union(CompactUnionDefinition {
                header,
                union_discriminator: d.union_discriminator.clone(),
                union_types: names(&d.union_types),
            }),
            ElementDefinition::Inter(d) => CompactElementDefinition::Inter(CompactInterDefinition {
                header,
                inter_types: names(&d.inter_types),
            }),
            ElementDefinition::Const(d) => CompactElementDefinition::Const(CompactConstDefinition {
                header,
                const_type: d.const_type.canonical_name(),
                const_value: d.const_value.clone(),
            }),
            ElementDefinition::Fault(_) => {
                CompactElementDefinition::Fault(CompactFaultDefinition { header })
            }
            ElementDefinition::Metadata(d) => {
                CompactElementDefinition::Metadata(CompactMetadataDefinition {
                    header,
                    metadata_fields: compact_fields(&d.metadata_fields),
                })
            }
            ElementDefinition::Routine(d) => {
                CompactElementDefinition::Routine(CompactRoutineDefinition {
                    header,
                    routine_endpoints: names(&d.routine_endpoints),
                    routine_fault_union: names(&d.routine_fault_union),
                    routine_input: d.routine_input.canonical_name(),
                    routine_output: d.routine_output.canonical_name(),
                })
            }
            ElementDefinition::Protocol(d) => {
                CompactElementDefinition::Protocol(CompactProtocolDefinition {
                    header,
                    protocol_routines: names(&d.protocol_routines),
                })
            }
            ElementDefinition::KafkaEndpoint(d) => {
                CompactElementDefinition::KafkaEndpoint(CompactKafkaEndpointDefinition {
                    header,
                    endpoint_topic: d.endpoint_topic.clone(),
                    endpoint_security_inter: d.endpoint_security_inter.clone(),
                    endpoint_key: d.endpoint_key.as_ref().map(|key| key.canonical_name()),
                })
            }
            ElementDefinition::IframeEndpoint(d) => {
                CompactElementDefinition::IframeEndpoint(CompactIframeEndpointDefinition {
                    header,
                    endpoint_path: d.endpoint_path.clone(),
                    endpoint_security_inter: d.endpoint_security_inter.clone(),
                })
            }
        }
    }
}

/// Flat, insertion-ordered mapping of canonical name to compact node.
///
/// Serializes as a single JSON object keyed by canonical name. A key that
/// appears twice on the wire is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompactSpecSheet {
    pub elements: IndexMap<CanonicalName, CompactElementDefinition>,
}

impl<'de> Deserialize<'de> for CompactSpecSheet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SheetVisitor;

        impl<'de> Visitor<'de> for SheetVisitor {
            type Value = CompactSpecSheet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of canonical names to compact definitions")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut elements = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, node)) =
                    access.next_entry::<CanonicalName, CompactElementDefinition>()?
                {
                    match elements.entry(name) {
                        Entry::Occupied(existing) => {
                            return Err(de::Error::custom(format!(
                                "duplicate canonical name '{}'",
                                existing.key()
                            )));
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(node);
                        }
                    }
                }
                Ok(CompactSpecSheet { elements })
            }
        }

        deserializer.deserialize_map(SheetVisitor)
    }
}

impl CompactSpecSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under its canonical name.
    ///
    /// Re-inserting an identical node is a no-op: it is the same shared
    /// definition reached along another path.
    pub fn insert(&mut self, node: CompactElementDefinition) -> Result<(), CompactError> {
        match self.elements.entry(node.canonical_name()) {
            Entry::Occupied(existing) if existing.get() == &node => Ok(()),
            Entry::Occupied(existing) => {
                Err(CompactError::DuplicateCanonicalName(existing.key().clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(node);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &CanonicalName) -> Option<&CompactElementDefinition> {
        self.elements.get(name)
    }

    pub fn contains(&self, name: &CanonicalName) -> bool {
        self.elements.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalName, &CompactElementDefinition)> {
        self.elements.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &CanonicalName> {
        self.elements.keys()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn to_json(&self) -> Result<String, CompactError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CompactError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl SpecSheet {
    /// Flatten every definition reachable from the sheet
    pub fn to_compact(&self) -> Result<CompactSpecSheet, CompactError> {
        let mut compact = CompactSpecSheet::new();
        for element in self.collect_children() {
            if element.is_anonymous() && element.namespace().is_toplevel() {
                return Err(CompactError::DanglingAnonymous {
                    kind: element.kind(),
                });
            }
            let node = element.to_compact();
            trace!(name = %element.canonical_name(), kind = %element.kind(), "compacting");
            compact.insert(node)?;
        }
        debug!(
            roots = self.len(),
            nodes = compact.len(),
            "compacted spec sheet"
        );
        Ok(compact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{
        ArrayBuilder, ConstBuilder, ElementBuilder, FaultBuilder, FieldBuilder, MetadataBuilder,
        MetadataUsageBuilder, ScalarBuilder, StructBuilder,
    };
    use crate::definition::ScalarDefinition;
    use crate::namespace::Namespace;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn int() -> DefinitionRef {
        ScalarBuilder::named(Namespace::new(["builtin"]), "Int")
            .build()
            .unwrap()
    }

    #[test]
    fn test_struct_fields_become_references() {
        let int = int();
        let point = StructBuilder::named(Namespace::new(["pkg"]), "Point")
            .field(FieldBuilder::new("x", &int))
            .field(FieldBuilder::new("y", &int).default_value(0i64))
            .build()
            .unwrap();

        let json = serde_json::to_value(point.to_compact()).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "struct",
                "name": "Point",
                "namespace": { "segments": ["pkg"] },
                "is_inline": false,
                "description": "",
                "metadata": [],
                "struct_fields": [
                    {
                        "name": "x",
                        "description": "",
                        "metadata": [],
                        "field_type.ref": "builtin.Int"
                    },
                    {
                        "name": "y",
                        "description": "",
                        "metadata": [],
                        "field_type.ref": "builtin.Int",
                        "field_default": { "type": "int", "value": 0 }
                    }
                ]
            })
        );
    }

    #[test]
    fn test_anonymous_node_omits_name() {
        let int = int();
        let list = StructBuilder::named(Namespace::new(["pkg"]), "List")
            .field(FieldBuilder::new("items", ArrayBuilder::anonymous(&int)))
            .build()
            .unwrap();
        let compact = SpecSheet::new(vec![list]).to_compact().unwrap();

        let items = compact.get(&CanonicalName::from("pkg.List.items")).unwrap();
        let json = serde_json::to_value(items).unwrap();
        assert_eq!(json["type"], "array");
        assert_eq!(json["name"], "items");
        assert_eq!(json["is_inline"], true);
        assert_eq!(json["array_type.ref"], "builtin.Int");

        let placed = ScalarBuilder::anonymous()
            .in_namespace(Namespace::new(["pkg"]))
            .build()
            .unwrap();
        let json = serde_json::to_value(placed.to_compact()).unwrap();
        assert!(json.get("name").is_none());
        assert_eq!(
            placed.to_compact().canonical_name().as_str(),
            "pkg.(anonymous<scalar>)"
        );
    }

    #[test]
    fn test_sheet_keys_follow_traversal_order() {
        let int = int();
        let zero = ConstBuilder::named(Namespace::new(["pkg"]), "ZERO", &int, 0i64)
            .build()
            .unwrap();
        let compact = SpecSheet::new(vec![zero, Arc::clone(&int)])
            .to_compact()
            .unwrap();
        let keys: Vec<_> = compact.names().map(CanonicalName::as_str).collect();
        assert_eq!(keys, vec!["pkg.ZERO", "builtin.Int"]);
    }

    #[test]
    fn test_equal_copies_are_kept_once() {
        let compact = SpecSheet::new(vec![int(), int()]).to_compact().unwrap();
        assert_eq!(compact.len(), 1);
    }

    #[test]
    fn test_distinct_definitions_sharing_a_name_fail() {
        let int = int();
        let other = ScalarBuilder::named(Namespace::new(["builtin"]), "Int")
            .description("not the same")
            .build()
            .unwrap();
        let err = SpecSheet::new(vec![int, other]).to_compact().unwrap_err();
        assert!(matches!(
            err,
            CompactError::DuplicateCanonicalName(name) if name.as_str() == "builtin.Int"
        ));
    }

    #[test]
    fn test_toplevel_anonymous_is_rejected() {
        let orphan = Arc::new(ElementDefinition::Scalar(ScalarDefinition {
            header: ElementHeader {
                name: None,
                namespace: Namespace::toplevel(),
                is_inline: true,
                description: String::new(),
                metadata: Vec::new(),
            },
        }));
        let err = SpecSheet::new(vec![orphan]).to_compact().unwrap_err();
        assert!(matches!(
            err,
            CompactError::DanglingAnonymous {
                kind: DefinitionKind::Scalar
            }
        ));
    }

    #[test]
    fn test_metadata_usages_stay_embedded() {
        let string = ScalarBuilder::named(Namespace::new(["builtin"]), "String")
            .build()
            .unwrap();
        let deprecated = MetadataBuilder::named(Namespace::new(["meta"]), "Deprecated")
            .field(FieldBuilder::new("reason", &string))
            .build()
            .unwrap();
        let usage = MetadataUsageBuilder::new(&deprecated)
            .set("reason", "gone")
            .build()
            .unwrap();
        let old = StructBuilder::named(Namespace::new(["pkg"]), "Old")
            .metadata(usage)
            .build()
            .unwrap();

        let compact = old.to_compact();
        let json = serde_json::to_value(&compact).unwrap();
        assert_eq!(
            json["metadata"],
            json!([{
                "definition.ref": "meta.Deprecated",
                "fields": [{ "name": "reason", "value": { "type": "string", "value": "gone" } }]
            }])
        );
        assert_eq!(
            compact.references(),
            vec![("definition.ref", &CanonicalName::from("meta.Deprecated"))]
        );

        let sheet = SpecSheet::new(vec![old]).to_compact().unwrap();
        let keys: Vec<_> = sheet.names().map(CanonicalName::as_str).collect();
        assert_eq!(keys, vec!["pkg.Old", "meta.Deprecated", "builtin.String"]);
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let int = int();
        let point = StructBuilder::named(Namespace::new(["pkg"]), "Point")
            .field(FieldBuilder::new("x", &int))
            .build()
            .unwrap();
        let compact = SpecSheet::new(vec![point]).to_compact().unwrap();

        let text = compact.to_json().unwrap();
        let parsed = CompactSpecSheet::from_json(&text).unwrap();
        assert_eq!(parsed, compact);
        let keys: Vec<_> = parsed.names().map(CanonicalName::as_str).collect();
        assert_eq!(keys, vec!["pkg.Point", "builtin.Int"]);
    }

    #[test]
    fn test_repeated_wire_key_is_rejected() {
        let scalar = ScalarBuilder::named(Namespace::new(["pkg"]), "A")
            .build()
            .unwrap();
        let fault = FaultBuilder::named(Namespace::new(["pkg"]), "A")
            .build()
            .unwrap();
        let text = format!(
            "{{\"pkg.A\": {}, \"pkg.A\": {}}}",
            serde_json::to_string(&scalar.to_compact()).unwrap(),
            serde_json::to_string(&fault.to_compact()).unwrap(),
        );

        let err = CompactSpecSheet::from_json(&text).unwrap_err();
        assert!(matches!(err, CompactError::Json(_)));
        assert!(err.to_string().contains("duplicate canonical name 'pkg.A'"));

        // the same node twice is still a malformed document
        let node = serde_json::to_string(&scalar.to_compact()).unwrap();
        let repeated = format!("{{\"pkg.A\": {}, \"pkg.A\": {}}}", node, node);
        assert!(CompactSpecSheet::from_json(&repeated).is_err());
    }
}
