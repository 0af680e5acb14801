//! Shared state for one generation run
//!
//! [`GenContext`] indexes every definition reachable from a sheet by the
//! namespace it hosts, which is how an element finds its enclosing element
//! and, from there, the package its declaration belongs to.

use std::collections::HashMap;

use rpcspec_core::{DefinitionKind, ElementDefinition, Namespace, SpecSheet};
use tracing::debug;

use crate::config::{GenConfig, Packaging};
use crate::error::CodegenError;

pub struct GenContext<'a> {
    config: &'a GenConfig,
    elements: Vec<&'a ElementDefinition>,
    /// Element hosting each namespace, keyed by `as_namespace()`
    hosts: HashMap<Namespace, &'a ElementDefinition>,
}

impl<'a> GenContext<'a> {
    pub fn new(config: &'a GenConfig, sheet: &'a SpecSheet) -> Self {
        let elements: Vec<_> = sheet.collect_children().collect();
        let mut hosts = HashMap::with_capacity(elements.len());
        for element in &elements {
            hosts.entry(element.as_namespace()).or_insert(*element);
        }
        debug!(
            "Generation context over {} definitions ({} hosts)",
            elements.len(),
            hosts.len()
        );
        Self {
            config,
            elements,
            hosts,
        }
    }

    pub fn config(&self) -> &GenConfig {
        self.config
    }

    /// Every distinct definition reachable from the sheet, in pre-order
    pub fn elements(&self) -> &[&'a ElementDefinition] {
        &self.elements
    }

    /// The element whose own namespace `element` lives in
    pub fn parent_of(&self, element: &ElementDefinition) -> Option<&'a ElementDefinition> {
        self.hosts.get(element.namespace()).copied()
    }

    /// Provided by the target platform rather than generated
    pub fn is_native(&self, element: &ElementDefinition) -> bool {
        self.config
            .native_elements
            .contains_key(&element.canonical_name())
    }

    /// Target type path of a native element
    pub fn native_type(&self, element: &ElementDefinition) -> Option<&'a str> {
        self.config.native_type(&element.canonical_name())
    }

    /// A native scalar can back a compile-time constant
    pub fn is_compile_const(&self, element: &ElementDefinition) -> bool {
        element.kind() == DefinitionKind::Scalar && self.is_native(element)
    }

    /// Whether `element` gets a declaration of its own.
    ///
    /// Anonymous definitions, arrays, optionals, and native scalars or
    /// metadata never do. Anything else does unless an enclosing element
    /// does not.
    pub fn has_generated_class(&self, element: &ElementDefinition) -> bool {
        if element.is_anonymous() {
            return false;
        }
        match element.kind() {
            DefinitionKind::Array | DefinitionKind::Optional => return false,
            DefinitionKind::Scalar | DefinitionKind::Metadata if self.is_native(element) => {
                return false;
            }
            _ => {}
        }
        match self.parent_of(element) {
            Some(parent) => self.has_generated_class(parent),
            None => true,
        }
    }

    /// Namespace of the outermost element enclosing `element`
    pub fn root_namespace_of(&self, element: &ElementDefinition) -> Namespace {
        let mut current = element;
        while let Some(parent) = self.parent_of(current) {
            current = parent;
        }
        current.namespace().clone()
    }

    /// Segments naming `element` relative to its root namespace, ending with
    /// its own name
    pub fn nested_path<'e>(&self, element: &'e ElementDefinition) -> Vec<&'e str> {
        let root = self.root_namespace_of(element).segments.len();
        let mut path: Vec<&str> = element
            .namespace()
            .segments
            .iter()
            .skip(root)
            .map(String::as_str)
            .collect();
        path.push(element.display_name());
        path
    }

    /// Dotted package the declaration of `element` is placed in
    pub fn generated_package_of(&self, element: &ElementDefinition) -> Result<String, CodegenError> {
        if !self.has_generated_class(element) {
            return Err(CodegenError::NoGeneratedClass(element.canonical_name()));
        }
        let package = match self.config.packaging {
            Packaging::SubPackages => self
                .root_namespace_of(element)
                .segments
                .iter()
                .map(|segment| escape_segment(segment))
                .collect::<Vec<_>>()
                .join("."),
        };
        Ok(match (self.config.package.is_empty(), package.is_empty()) {
            (true, _) => package,
            (false, true) => self.config.package.clone(),
            (false, false) => format!("{}.{}", self.config.package, package),
        })
    }
}

/// Make a namespace segment usable as an identifier.
///
/// Characters other than ASCII letters, digits and `_` become `_`, and a
/// leading digit is prefixed with `_`.
pub fn escape_segment(segment: &str) -> String {
    let mut escaped: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if escaped.is_empty() || escaped.starts_with(|c: char| c.is_ascii_digit()) {
        escaped.insert(0, '_');
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcspec_core::builder::{
        ArrayBuilder, ElementBuilder, FieldBuilder, MetadataBuilder, ProtocolBuilder,
        RoutineBuilder, ScalarBuilder, StructBuilder,
    };
    use rpcspec_core::DefinitionRef;

    fn builtin(name: &str) -> DefinitionRef {
        ScalarBuilder::named(Namespace::new(["builtin"]), name)
            .build()
            .unwrap()
    }

    fn config() -> GenConfig {
        GenConfig::new("acme")
            .with_native("builtin.Int", "i64")
            .with_native("builtin.Deprecated", "Deprecated")
    }

    #[test]
    fn test_escape_segment() {
        assert_eq!(escape_segment("user:v1"), "user_v1");
        assert_eq!(escape_segment("my-pkg"), "my_pkg");
        assert_eq!(escape_segment("2fa"), "_2fa");
        assert_eq!(escape_segment("plain_name"), "plain_name");
        assert_eq!(escape_segment(""), "_");
    }

    #[test]
    fn test_generated_class_rules() {
        let int = builtin("Int");
        let opaque = builtin("Opaque");
        let deprecated = MetadataBuilder::named(Namespace::new(["builtin"]), "Deprecated")
            .build()
            .unwrap();
        let line = StructBuilder::named(Namespace::new(["pkg"]), "Line")
            .field(FieldBuilder::new("points", ArrayBuilder::anonymous(&int)))
            .field(FieldBuilder::new("tag", &opaque))
            .build()
            .unwrap();
        let stray = StructBuilder::anonymous()
            .in_namespace(Namespace::new(["pkg"]))
            .build()
            .unwrap();

        let sheet = SpecSheet::new(vec![int.clone(), opaque.clone(), deprecated.clone(), line.clone()]);
        let config = config();
        let ctx = GenContext::new(&config, &sheet);

        assert!(!ctx.has_generated_class(&int));
        assert!(ctx.is_compile_const(&int));
        assert!(ctx.has_generated_class(&opaque));
        assert!(!ctx.is_compile_const(&opaque));
        assert!(!ctx.has_generated_class(&deprecated));
        assert!(ctx.has_generated_class(&line));
        assert!(!ctx.has_generated_class(&stray));

        let points = &line.as_struct().unwrap().struct_fields[0].field_type;
        assert_eq!(points.canonical_name().as_str(), "pkg.Line.points");
        assert!(!ctx.has_generated_class(points));
    }

    #[test]
    fn test_nested_elements_follow_their_parent() {
        let int = builtin("Int");
        let routine = RoutineBuilder::anonymous("getUser")
            .input(FieldBuilder::new("id", &int))
            .output(FieldBuilder::new("name", &int));
        let service = ProtocolBuilder::named(Namespace::new(["user:v1"]), "UserService")
            .routine(routine)
            .build()
            .unwrap();

        let sheet = SpecSheet::new(vec![service.clone()]);
        let config = config();
        let ctx = GenContext::new(&config, &sheet);

        let input = ctx
            .elements()
            .iter()
            .find(|e| e.canonical_name().as_str() == "user:v1.UserService.getUser.input")
            .copied()
            .unwrap();

        assert!(ctx.has_generated_class(input));
        assert_eq!(ctx.root_namespace_of(input), Namespace::new(["user:v1"]));
        assert_eq!(ctx.nested_path(input), vec!["UserService", "getUser", "input"]);
        assert_eq!(ctx.generated_package_of(input).unwrap(), "acme.user_v1");
        assert_eq!(
            ctx.parent_of(input).map(|p| p.canonical_name().into_string()),
            Some("user:v1.UserService.getUser".to_string())
        );
    }

    #[test]
    fn test_package_without_prefix_or_namespace() {
        let toplevel = StructBuilder::named(Namespace::toplevel(), "Root")
            .build()
            .unwrap();
        let sheet = SpecSheet::new(vec![toplevel.clone()]);

        let prefixed = GenConfig::new("acme");
        assert_eq!(
            GenContext::new(&prefixed, &sheet)
                .generated_package_of(&toplevel)
                .unwrap(),
            "acme"
        );

        let bare = GenConfig::default();
        assert_eq!(
            GenContext::new(&bare, &sheet)
                .generated_package_of(&toplevel)
                .unwrap(),
            ""
        );
    }

    #[test]
    fn test_package_of_undeclared_element_fails() {
        let int = builtin("Int");
        let sheet = SpecSheet::new(vec![int.clone()]);
        let config = config();
        let ctx = GenContext::new(&config, &sheet);
        assert!(matches!(
            ctx.generated_package_of(&int),
            Err(CodegenError::NoGeneratedClass(name)) if name.as_str() == "builtin.Int"
        ));
    }
}
