//! Rust declaration backend
//!
//! Renders one Rust item per definition:
//! - structs, metadata and intersections as structs (parts flattened)
//! - unions as internally tagged enums of struct variants
//! - enums as unit enums with a `value()` accessor
//! - constants as `const` items; values that are not native scalars are
//!   kept as JSON text
//! - faults, routines and protocols as marker structs

use std::fmt::Write;

use rpcspec_core::definition::{
    ConstDefinition, EnumDefinition, FieldDefinition, InterDefinition, ProtocolDefinition,
    RoutineDefinition, TupleDefinition, UnionDefinition,
};
use rpcspec_core::{DefinitionKind, ElementDefinition, Literal};

use crate::context::{escape_segment, GenContext};
use crate::error::CodegenError;
use crate::generator::{DeclarationGenerator, DeclarationUnit};

/// Configuration for Rust declarations
#[derive(Debug, Clone)]
pub struct RustDeclarationsConfig {
    /// Include documentation comments
    pub include_docs: bool,
    /// Derive `serde::Serialize` and `serde::Deserialize`
    pub derive_serde: bool,
}

impl Default for RustDeclarationsConfig {
    fn default() -> Self {
        Self {
            include_docs: true,
            derive_serde: true,
        }
    }
}

pub struct RustDeclarations {
    config: RustDeclarationsConfig,
    indent_size: usize,
}

impl RustDeclarations {
    pub fn new() -> Self {
        Self {
            config: RustDeclarationsConfig::default(),
            indent_size: 4,
        }
    }

    pub fn with_config(mut self, config: RustDeclarationsConfig) -> Self {
        self.config = config;
        self
    }

    fn indent(&self, level: usize) -> String {
        " ".repeat(level * self.indent_size)
    }

    /// Declared name: the element's path below its root namespace
    pub fn type_name(&self, ctx: &GenContext<'_>, element: &ElementDefinition) -> String {
        ctx.nested_path(element)
            .into_iter()
            .map(to_rust_type_name)
            .collect()
    }

    /// Rust type standing in for a reference to `element`
    pub fn type_path(
        &self,
        ctx: &GenContext<'_>,
        element: &ElementDefinition,
    ) -> Result<String, CodegenError> {
        if let Some(native) = ctx.native_type(element) {
            return Ok(native.to_string());
        }
        match element {
            ElementDefinition::Array(d) => Ok(format!("Vec<{}>", self.type_path(ctx, &d.array_type)?)),
            ElementDefinition::Optional(d) => {
                Ok(format!("Option<{}>", self.type_path(ctx, &d.optional_type)?))
            }
            ElementDefinition::Tuple(d) if !ctx.has_generated_class(element) => {
                let items = self.tuple_items(ctx, d)?;
                match items.len() {
                    1 => Ok(format!("({},)", items[0])),
                    _ => Ok(format!("({})", items.join(", "))),
                }
            }
            _ if ctx.has_generated_class(element) => {
                let package = ctx.generated_package_of(element)?;
                let name = self.type_name(ctx, element);
                Ok(match module_path(&package) {
                    Some(module) => format!("crate::{}::{}", module, name),
                    None => format!("crate::{}", name),
                })
            }
            _ => Err(CodegenError::NoGeneratedClass(element.canonical_name())),
        }
    }

    fn tuple_items(
        &self,
        ctx: &GenContext<'_>,
        tuple: &TupleDefinition,
    ) -> Result<Vec<String>, CodegenError> {
        tuple
            .tuple_types
            .iter()
            .map(|item| self.type_path(ctx, item))
            .collect()
    }

    fn write_docs(&self, output: &mut String, level: usize, text: &str) -> Result<(), CodegenError> {
        if !self.config.include_docs {
            return Ok(());
        }
        let indent = self.indent(level);
        for line in text.lines() {
            if line.is_empty() {
                writeln!(output, "{}///", indent)?;
            } else {
                writeln!(output, "{}/// {}", indent, line)?;
            }
        }
        Ok(())
    }

    fn write_derives(&self, output: &mut String, base: &[&str], serde: bool) -> Result<(), CodegenError> {
        let mut derives = base.to_vec();
        if serde && self.config.derive_serde {
            derives.extend(["serde::Serialize", "serde::Deserialize"]);
        }
        writeln!(output, "#[derive({})]", derives.join(", "))?;
        Ok(())
    }

    fn declare_fields(
        &self,
        ctx: &GenContext<'_>,
        name: &str,
        fields: &[FieldDefinition],
        output: &mut String,
    ) -> Result<(), CodegenError> {
        self.write_derives(output, &["Debug", "Clone", "PartialEq"], true)?;
        if fields.is_empty() {
            writeln!(output, "pub struct {} {{}}", name)?;
            return Ok(());
        }
        writeln!(output, "pub struct {} {{", name)?;
        for field in fields {
            self.write_docs(output, 1, &field.description)?;
            if let Some(default) = &field.field_default {
                self.write_docs(output, 1, &format!("Default: `{}`", default))?;
            }
            let rust_name = to_rust_field_name(&field.name);
            if rust_name.trim_start_matches("r#") != field.name && self.config.derive_serde {
                writeln!(output, "{}#[serde(rename = \"{}\")]", self.indent(1), field.name)?;
            }
            let field_type = self.type_path(ctx, &field.field_type)?;
            writeln!(output, "{}pub {}: {},", self.indent(1), rust_name, field_type)?;
        }
        writeln!(output, "}}")?;
        Ok(())
    }

    fn declare_tuple(
        &self,
        ctx: &GenContext<'_>,
        name: &str,
        tuple: &TupleDefinition,
        output: &mut String,
    ) -> Result<(), CodegenError> {
        let items: Vec<String> = self
            .tuple_items(ctx, tuple)?
            .into_iter()
            .map(|item| format!("pub {}", item))
            .collect();
        self.write_derives(output, &["Debug", "Clone", "PartialEq"], true)?;
        writeln!(output, "pub struct {}({});", name, items.join(", "))?;
        Ok(())
    }

    fn declare_union(
        &self,
        ctx: &GenContext<'_>,
        element: &ElementDefinition,
        name: &str,
        union: &UnionDefinition,
        output: &mut String,
    ) -> Result<(), CodegenError> {
        self.write_derives(output, &["Debug", "Clone", "PartialEq"], true)?;
        if self.config.derive_serde {
            writeln!(output, "#[serde(tag = \"{}\")]", union.union_discriminator)?;
        }
        writeln!(output, "pub enum {} {{", name)?;
        for variant in &union.union_types {
            if variant.kind() != DefinitionKind::Struct {
                return Err(CodegenError::unsupported(
                    element,
                    format!("variant '{}' is a {}, not a struct", variant.canonical_name(), variant.kind()),
                ));
            }
            let variant_name = to_rust_type_name(variant.display_name());
            if variant_name != variant.display_name() && self.config.derive_serde {
                writeln!(
                    output,
                    "{}#[serde(rename = \"{}\")]",
                    self.indent(1),
                    variant.display_name()
                )?;
            }
            writeln!(
                output,
                "{}{}({}),",
                self.indent(1),
                variant_name,
                self.type_path(ctx, variant)?
            )?;
        }
        writeln!(output, "}}")?;
        Ok(())
    }

    fn declare_inter(
        &self,
        ctx: &GenContext<'_>,
        name: &str,
        inter: &InterDefinition,
        output: &mut String,
    ) -> Result<(), CodegenError> {
        self.write_derives(output, &["Debug", "Clone", "PartialEq"], true)?;
        writeln!(output, "pub struct {} {{", name)?;
        for part in &inter.inter_types {
            if self.config.derive_serde {
                writeln!(output, "{}#[serde(flatten)]", self.indent(1))?;
            }
            writeln!(
                output,
                "{}pub {}: {},",
                self.indent(1),
                to_rust_field_name(part.display_name()),
                self.type_path(ctx, part)?
            )?;
        }
        writeln!(output, "}}")?;
        Ok(())
    }

    fn declare_enum(
        &self,
        ctx: &GenContext<'_>,
        element: &ElementDefinition,
        name: &str,
        definition: &EnumDefinition,
        output: &mut String,
    ) -> Result<(), CodegenError> {
        let mut entries = Vec::with_capacity(definition.enum_entries.len());
        for entry in &definition.enum_entries {
            let constant = entry.as_const().ok_or_else(|| {
                CodegenError::unsupported(element, format!("entry '{}' is not a constant", entry.canonical_name()))
            })?;
            entries.push((entry, constant));
        }
        let all_strings = entries
            .iter()
            .all(|(_, c)| matches!(c.const_value, Literal::String(_)));

        self.write_derives(output, &["Debug", "Clone", "Copy", "PartialEq", "Eq", "Hash"], all_strings)?;
        writeln!(output, "pub enum {} {{", name)?;
        for (entry, constant) in &entries {
            self.write_docs(output, 1, entry.description())?;
            let renamed = self.config.derive_serde && all_strings;
            if let (true, Literal::String(value)) = (renamed, &constant.const_value) {
                writeln!(output, "{}#[serde(rename = {:?})]", self.indent(1), value)?;
            }
            writeln!(output, "{}{},", self.indent(1), to_rust_type_name(entry.display_name()))?;
        }
        writeln!(output, "}}")?;

        let value_type = match ctx.native_type(&definition.enum_type) {
            Some(_) if all_strings => Some("&'static str".to_string()),
            Some(native) if ctx.is_compile_const(&definition.enum_type) => Some(native.to_string()),
            _ => None,
        };
        let Some(value_type) = value_type else {
            return Ok(());
        };
        if entries.iter().any(|(_, c)| !is_const_literal(&c.const_value)) {
            return Ok(());
        }

        writeln!(output)?;
        writeln!(output, "impl {} {{", name)?;
        writeln!(output, "{}pub const fn value(&self) -> {} {{", self.indent(1), value_type)?;
        writeln!(output, "{}match self {{", self.indent(2))?;
        for (entry, constant) in &entries {
            writeln!(
                output,
                "{}Self::{} => {},",
                self.indent(3),
                to_rust_type_name(entry.display_name()),
                rust_literal(&constant.const_value)
            )?;
        }
        writeln!(output, "{}}}", self.indent(2))?;
        writeln!(output, "{}}}", self.indent(1))?;
        writeln!(output, "}}")?;
        Ok(())
    }

    fn declare_const(
        &self,
        ctx: &GenContext<'_>,
        name: &str,
        constant: &ConstDefinition,
        output: &mut String,
    ) -> Result<(), CodegenError> {
        let value = &constant.const_value;
        if ctx.is_compile_const(&constant.const_type) && is_const_literal(value) {
            let ty = match value {
                Literal::String(_) => "&str".to_string(),
                _ => self.type_path(ctx, &constant.const_type)?,
            };
            writeln!(output, "pub const {}: {} = {};", name, ty, rust_literal(value))?;
            return Ok(());
        }

        let json = serde_json::to_string(value)
            .map_err(|e| CodegenError::Generation(format!("cannot encode constant {}: {}", name, e)))?;
        self.write_docs(
            output,
            0,
            &format!("JSON encoding of a `{}` value", constant.const_type.canonical_name()),
        )?;
        writeln!(output, "pub const {}: &str = {:?};", name, json)?;
        Ok(())
    }

    fn declare_marker(&self, name: &str, output: &mut String) -> Result<(), CodegenError> {
        self.write_derives(output, &["Debug", "Clone", "Copy", "PartialEq", "Eq", "Default"], false)?;
        writeln!(output, "pub struct {};", name)?;
        Ok(())
    }

    fn write_str_list(
        &self,
        output: &mut String,
        name: &str,
        values: &[String],
    ) -> Result<(), CodegenError> {
        let quoted: Vec<String> = values.iter().map(|v| format!("{:?}", v)).collect();
        writeln!(
            output,
            "{}pub const {}: &'static [&'static str] = &[{}];",
            self.indent(1),
            name,
            quoted.join(", ")
        )?;
        Ok(())
    }

    fn declare_routine(
        &self,
        ctx: &GenContext<'_>,
        element: &ElementDefinition,
        name: &str,
        routine: &RoutineDefinition,
        output: &mut String,
    ) -> Result<(), CodegenError> {
        let input = self.type_path(ctx, &routine.routine_input)?;
        let output_type = self.type_path(ctx, &routine.routine_output)?;
        let separator = if element.description().is_empty() { "" } else { "\n" };
        self.write_docs(
            output,
            0,
            &format!("{}Input: [`{}`]\n\nOutput: [`{}`]", separator, input, output_type),
        )?;
        self.declare_marker(name, output)?;

        let mut topics = Vec::new();
        let mut paths = Vec::new();
        for endpoint in &routine.routine_endpoints {
            match endpoint.as_ref() {
                ElementDefinition::KafkaEndpoint(d) => topics.push(d.endpoint_topic.0.clone()),
                ElementDefinition::IframeEndpoint(d) => paths.push(d.endpoint_path.0.clone()),
                other => {
                    return Err(CodegenError::unsupported(
                        element,
                        format!("'{}' is not an endpoint", other.canonical_name()),
                    ))
                }
            }
        }
        let faults: Vec<String> = routine
            .routine_fault_union
            .iter()
            .map(|fault| fault.canonical_name().into_string())
            .collect();

        writeln!(output)?;
        writeln!(output, "impl {} {{", name)?;
        writeln!(
            output,
            "{}pub const CANONICAL_NAME: &'static str = {:?};",
            self.indent(1),
            element.canonical_name().as_str()
        )?;
        self.write_str_list(output, "KAFKA_TOPICS", &topics)?;
        self.write_str_list(output, "IFRAME_PATHS", &paths)?;
        self.write_str_list(output, "FAULTS", &faults)?;
        writeln!(output, "}}")?;
        Ok(())
    }

    fn declare_protocol(
        &self,
        element: &ElementDefinition,
        name: &str,
        protocol: &ProtocolDefinition,
        output: &mut String,
    ) -> Result<(), CodegenError> {
        self.declare_marker(name, output)?;
        let routines: Vec<String> = protocol
            .protocol_routines
            .iter()
            .map(|routine| routine.canonical_name().into_string())
            .collect();
        writeln!(output)?;
        writeln!(output, "impl {} {{", name)?;
        writeln!(
            output,
            "{}pub const CANONICAL_NAME: &'static str = {:?};",
            self.indent(1),
            element.canonical_name().as_str()
        )?;
        self.write_str_list(output, "ROUTINES", &routines)?;
        writeln!(output, "}}")?;
        Ok(())
    }
}

impl Default for RustDeclarations {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationGenerator for RustDeclarations {
    fn name(&self) -> &str {
        "RustDeclarations"
    }

    fn declare(
        &self,
        ctx: &GenContext<'_>,
        element: &ElementDefinition,
    ) -> Result<Option<DeclarationUnit>, CodegenError> {
        let is_enum_entry = element.kind() == DefinitionKind::Const
            && ctx
                .parent_of(element)
                .is_some_and(|parent| parent.kind() == DefinitionKind::Enum);
        if is_enum_entry {
            return Ok(None);
        }

        let package = ctx.generated_package_of(element)?;
        let mut name = self.type_name(ctx, element);
        let mut source = String::new();
        self.write_docs(&mut source, 0, element.description())?;

        match element {
            ElementDefinition::Scalar(_) => {
                self.write_derives(&mut source, &["Debug", "Clone", "PartialEq"], true)?;
                if self.config.derive_serde {
                    writeln!(source, "#[serde(transparent)]")?;
                }
                writeln!(source, "pub struct {}(pub serde_json::Value);", name)?;
            }
            ElementDefinition::Struct(d) => {
                self.declare_fields(ctx, &name, &d.struct_fields, &mut source)?
            }
            ElementDefinition::Metadata(d) => {
                self.declare_fields(ctx, &name, &d.metadata_fields, &mut source)?
            }
            ElementDefinition::Tuple(d) => self.declare_tuple(ctx, &name, d, &mut source)?,
            ElementDefinition::Union(d) => {
                self.declare_union(ctx, element, &name, d, &mut source)?
            }
            ElementDefinition::Inter(d) => self.declare_inter(ctx, &name, d, &mut source)?,
            ElementDefinition::Enum(d) => {
                self.declare_enum(ctx, element, &name, d, &mut source)?
            }
            ElementDefinition::Const(d) => {
                name = to_const_name(&name);
                self.declare_const(ctx, &name, d, &mut source)?
            }
            ElementDefinition::Fault(_) => {
                self.declare_marker(&name, &mut source)?;
                writeln!(source)?;
                writeln!(source, "impl {} {{", name)?;
                writeln!(
                    source,
                    "{}pub const CANONICAL_NAME: &'static str = {:?};",
                    self.indent(1),
                    element.canonical_name().as_str()
                )?;
                writeln!(source, "}}")?;
            }
            ElementDefinition::Routine(d) => {
                self.declare_routine(ctx, element, &name, d, &mut source)?
            }
            ElementDefinition::Protocol(d) => {
                self.declare_protocol(element, &name, d, &mut source)?
            }
            ElementDefinition::Array(_)
            | ElementDefinition::Optional(_)
            | ElementDefinition::KafkaEndpoint(_)
            | ElementDefinition::IframeEndpoint(_) => return Ok(None),
        }

        Ok(Some(DeclarationUnit {
            canonical_name: element.canonical_name(),
            package,
            name,
            source,
        }))
    }
}

/// Concatenate the units of one package into a module file
pub fn render_package(package: &str, units: &[DeclarationUnit]) -> Result<String, CodegenError> {
    let mut output = String::new();
    writeln!(output, "//! Generated by rpcspec. DO NOT EDIT.")?;
    writeln!(output, "//!")?;
    if package.is_empty() {
        writeln!(output, "//! Package: (root)")?;
    } else {
        writeln!(output, "//! Package: {}", package)?;
    }
    writeln!(output)?;
    writeln!(output, "#![allow(clippy::all)]")?;
    writeln!(output, "#![allow(dead_code)]")?;
    for unit in units {
        writeln!(output)?;
        output.push_str(&unit.source);
    }
    Ok(output)
}

/// `a.b` becomes `a::b`; `None` for the root package
fn module_path(package: &str) -> Option<String> {
    if package.is_empty() {
        return None;
    }
    Some(
        package
            .split('.')
            .map(escape_segment)
            .collect::<Vec<_>>()
            .join("::"),
    )
}

fn is_const_literal(value: &Literal) -> bool {
    matches!(
        value,
        Literal::Boolean(_) | Literal::Int(_) | Literal::Float(_) | Literal::String(_)
    )
}

fn rust_literal(value: &Literal) -> String {
    match value {
        Literal::Float(v) => format!("{:?}", v),
        Literal::String(v) => format!("{:?}", v),
        other => other.to_string(),
    }
}

// --- Helper functions ---

/// Convert a field name to a valid Rust identifier
fn to_rust_field_name(name: &str) -> String {
    let reserved = [
        "as", "break", "const", "continue", "crate", "else", "enum", "extern",
        "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
        "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct",
        "super", "trait", "true", "type", "unsafe", "use", "where", "while",
        "async", "await", "dyn", "abstract", "become", "box", "do", "final",
        "macro", "override", "priv", "typeof", "unsized", "virtual", "yield",
    ];

    let snake = to_snake_case(name);

    if reserved.contains(&snake.as_str()) {
        format!("r#{}", snake)
    } else {
        snake
    }
}

/// Convert a name segment to PascalCase
fn to_rust_type_name(name: &str) -> String {
    let mut result = String::new();
    for part in name.split(|c: char| !c.is_ascii_alphanumeric()).filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

/// Convert a declared name to SCREAMING_SNAKE_CASE
fn to_const_name(name: &str) -> String {
    to_snake_case(name).to_uppercase()
}

/// Convert a string to snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    let mut prev_was_upper = false;
    let mut prev_was_underscore = true;

    for c in s.chars() {
        if c == '-' || c == '.' || c == ':' {
            if !prev_was_underscore {
                result.push('_');
                prev_was_underscore = true;
            }
            prev_was_upper = false;
        } else if c.is_uppercase() {
            if !prev_was_upper && !prev_was_underscore {
                result.push('_');
            }
            result.extend(c.to_lowercase());
            prev_was_upper = true;
            prev_was_underscore = false;
        } else {
            result.push(c);
            prev_was_upper = false;
            prev_was_underscore = c == '_';
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;
    use rpcspec_core::builder::{
        ConstBuilder, ElementBuilder, EnumBuilder, FieldBuilder, OptionalBuilder, ScalarBuilder,
        StructBuilder, TupleBuilder,
    };
    use rpcspec_core::{DefinitionRef, Namespace, SpecSheet};

    fn builtin(name: &str) -> DefinitionRef {
        ScalarBuilder::named(Namespace::new(["builtin"]), name)
            .build()
            .unwrap()
    }

    fn config() -> GenConfig {
        GenConfig::new("acme")
            .with_native("builtin.Int", "i64")
            .with_native("builtin.String", "String")
    }

    fn declare(config: &GenConfig, element: &DefinitionRef) -> DeclarationUnit {
        let sheet = SpecSheet::new(vec![element.clone()]);
        let ctx = GenContext::new(config, &sheet);
        RustDeclarations::new()
            .declare(&ctx, element)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("HTTPServer"), "httpserver");
        assert_eq!(to_snake_case("max-retries"), "max_retries");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_to_rust_names() {
        assert_eq!(to_rust_field_name("type"), "r#type");
        assert_eq!(to_rust_field_name("createdAt"), "created_at");
        assert_eq!(to_rust_type_name("getUser"), "GetUser");
        assert_eq!(to_rust_type_name("variant0"), "Variant0");
        assert_eq!(to_rust_type_name("user:v1"), "UserV1");
        assert_eq!(to_const_name("ConfigMaxRetries"), "CONFIG_MAX_RETRIES");
        assert_eq!(module_path("acme.user_v1").as_deref(), Some("acme::user_v1"));
        assert_eq!(module_path(""), None);
    }

    #[test]
    fn test_struct_declaration() {
        let int = builtin("Int");
        let user = StructBuilder::named(Namespace::new(["pkg"]), "User")
            .description("A registered user")
            .field(FieldBuilder::new("userId", &int).description("Primary key"))
            .field(FieldBuilder::new("nickname", OptionalBuilder::anonymous(&int)))
            .field(FieldBuilder::new("type", &int).default_value(0i64))
            .build()
            .unwrap();

        let unit = declare(&config(), &user);
        assert_eq!(unit.package, "acme.pkg");
        assert_eq!(unit.name, "User");
        let expected = "\
/// A registered user
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    /// Primary key
    #[serde(rename = \"userId\")]
    pub user_id: i64,
    pub nickname: Option<i64>,
    /// Default: `0`
    pub r#type: i64,
}
";
        pretty_assertions::assert_eq!(unit.source, expected);
    }

    #[test]
    fn test_named_tuple_and_nested_reference() {
        let int = builtin("Int");
        let pair = TupleBuilder::named(Namespace::new(["geo"]), "Pair")
            .item(&int)
            .item(&int)
            .build()
            .unwrap();
        let segment = StructBuilder::named(Namespace::new(["geo"]), "Segment")
            .field(FieldBuilder::new("ends", &pair))
            .field(FieldBuilder::new("label", TupleBuilder::anonymous().item(&int)))
            .build()
            .unwrap();

        let config = config();
        let sheet = SpecSheet::new(vec![pair.clone(), segment.clone()]);
        let ctx = GenContext::new(&config, &sheet);
        let backend = RustDeclarations::new();

        let pair_unit = backend.declare(&ctx, &pair).unwrap().unwrap();
        assert!(pair_unit.source.contains("pub struct Pair(pub i64, pub i64);"));

        let segment_unit = backend.declare(&ctx, &segment).unwrap().unwrap();
        assert!(segment_unit.source.contains("pub ends: crate::acme::geo::Pair,"));
        // the attached tuple is named `geo.Segment.label` and declared on its own
        assert!(segment_unit.source.contains("pub label: crate::acme::geo::SegmentLabel,"));
    }

    #[test]
    fn test_enum_with_string_values() {
        let string = builtin("String");
        let color = EnumBuilder::named(Namespace::new(["pkg"]), "Color", &string)
            .documented_entry("RED", "red", "Warm")
            .entry("BLUE", "blue")
            .build()
            .unwrap();

        let config = config();
        let sheet = SpecSheet::new(vec![color.clone()]);
        let ctx = GenContext::new(&config, &sheet);
        let backend = RustDeclarations::new();
        let unit = backend.declare(&ctx, &color).unwrap().unwrap();

        assert!(unit.source.contains("pub enum Color {"));
        assert!(unit.source.contains("    /// Warm\n    #[serde(rename = \"red\")]\n    RED,"));
        assert!(unit.source.contains("pub const fn value(&self) -> &'static str {"));
        assert!(unit.source.contains("Self::BLUE => \"blue\","));

        // entries are folded into the enum
        let red = ctx
            .elements()
            .iter()
            .find(|e| e.canonical_name().as_str() == "pkg.Color.RED")
            .copied()
            .unwrap();
        assert!(backend.declare(&ctx, red).unwrap().is_none());
    }

    #[test]
    fn test_constants() {
        let int = builtin("Int");
        let opaque = builtin("Opaque");
        let max = ConstBuilder::named(Namespace::new(["limits"]), "maxRetries", &int, 5i64)
            .build()
            .unwrap();
        let blob = ConstBuilder::named(
            Namespace::new(["limits"]),
            "seed",
            &opaque,
            Literal::Tuple(vec![Literal::Int(1), Literal::Null]),
        )
        .build()
        .unwrap();

        let unit = declare(&config(), &max);
        assert_eq!(unit.name, "MAX_RETRIES");
        assert_eq!(unit.source, "pub const MAX_RETRIES: i64 = 5;\n");

        let unit = declare(&config(), &blob);
        assert!(unit.source.contains("/// JSON encoding of a `builtin.Opaque` value"));
        assert!(unit.source.contains("pub const SEED: &str = "));
    }

    #[test]
    fn test_render_package_header() {
        let unit = DeclarationUnit {
            canonical_name: "pkg.Empty".into(),
            package: "acme.pkg".to_string(),
            name: "Empty".to_string(),
            source: "pub struct Empty;\n".to_string(),
        };
        let rendered = render_package("acme.pkg", &[unit]).unwrap();
        assert!(rendered.starts_with("//! Generated by rpcspec. DO NOT EDIT.\n"));
        assert!(rendered.contains("//! Package: acme.pkg"));
        assert!(rendered.ends_with("\npub struct Empty;\n"));
    }
}
