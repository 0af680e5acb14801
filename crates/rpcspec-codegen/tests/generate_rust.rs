//! Generating Rust declarations from inflated sheets

use std::io::Write as _;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rpcspec_codegen::{
    generate, group_by_package, render_package, CodegenError, GenConfig, GenContext,
    RustDeclarations,
};
use rpcspec_core::builder::{
    ElementBuilder, FaultBuilder, FieldBuilder, IframeEndpointBuilder, InterBuilder,
    KafkaEndpointBuilder, ProtocolBuilder, RoutineBuilder, ScalarBuilder, StructBuilder,
    UnionBuilder,
};
use rpcspec_core::definition::{ElementHeader, UnionDefinition};
use rpcspec_core::{inflate, DefinitionRef, ElementDefinition, Namespace, SpecSheet};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn builtin(name: &str) -> DefinitionRef {
    ScalarBuilder::named(Namespace::new(["builtin"]), name)
        .build()
        .unwrap()
}

fn load_config(content: &str) -> GenConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    GenConfig::load(file.path()).unwrap()
}

const CONFIG: &str = r#"
package = "acme"

[native_elements]
"builtin.String" = "String"
"builtin.Int" = "i64"
"#;

fn user_service() -> SpecSheet {
    let string = builtin("String");
    let int = builtin("Int");
    let user = StructBuilder::named(Namespace::new(["user:v1"]), "User")
        .field(FieldBuilder::new("id", &string))
        .field(FieldBuilder::new("age", &int))
        .build()
        .unwrap();
    let not_found = FaultBuilder::named(Namespace::new(["user:v1"]), "NotFound")
        .description("No user with that id")
        .build()
        .unwrap();
    let get_user = RoutineBuilder::anonymous("getUser")
        .kafka(KafkaEndpointBuilder::anonymous())
        .iframe(IframeEndpointBuilder::anonymous())
        .fault(&not_found)
        .input(FieldBuilder::new("id", &string))
        .output(FieldBuilder::new("user", &user));
    let protocol = ProtocolBuilder::named(Namespace::new(["user:v1"]), "UserService")
        .routine(get_user)
        .build()
        .unwrap();
    SpecSheet::new(vec![protocol])
}

#[test]
fn test_load_config_from_file() {
    let config = load_config(CONFIG);
    assert_eq!(config.package, "acme");
    assert_eq!(config.native_elements.len(), 2);

    let missing = GenConfig::load(std::path::Path::new("/nonexistent/rpcspec.toml")).unwrap_err();
    assert!(missing.to_string().contains("Failed to read generator config"));
}

#[test]
fn test_inflated_service_generates_declarations() {
    init_tracing();
    let sheet = user_service();
    let compact = sheet.to_compact().unwrap();
    let inflated = inflate(&compact).unwrap().into_sheet();

    let config = load_config(CONFIG);
    let ctx = GenContext::new(&config, &inflated);
    let units = generate(&ctx, &RustDeclarations::new()).unwrap();

    let mut names: Vec<_> = units
        .iter()
        .map(|unit| (unit.canonical_name.as_str(), unit.name.as_str()))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            ("user:v1.NotFound", "NotFound"),
            ("user:v1.User", "User"),
            ("user:v1.UserService", "UserService"),
            ("user:v1.UserService.getUser", "UserServiceGetUser"),
            ("user:v1.UserService.getUser.input", "UserServiceGetUserInput"),
            ("user:v1.UserService.getUser.output", "UserServiceGetUserOutput"),
        ]
    );

    let packages = group_by_package(units);
    assert_eq!(packages.keys().collect::<Vec<_>>(), vec!["acme.user_v1"]);

    let units = &packages["acme.user_v1"];
    let routine = units
        .iter()
        .find(|unit| unit.name == "UserServiceGetUser")
        .unwrap();
    assert!(routine
        .source
        .contains("/// Input: [`crate::acme::user_v1::UserServiceGetUserInput`]"));
    assert!(routine
        .source
        .contains("pub const KAFKA_TOPICS: &'static [&'static str] = &[\"user-v1.UserService.getUser\"];"));
    assert!(routine
        .source
        .contains("pub const FAULTS: &'static [&'static str] = &[\"user:v1.NotFound\"];"));

    let output = units
        .iter()
        .find(|unit| unit.name == "UserServiceGetUserOutput")
        .unwrap();
    assert!(output.source.contains("pub user: crate::acme::user_v1::User,"));

    let rendered = render_package("acme.user_v1", units).unwrap();
    assert!(rendered.contains("/// No user with that id\n#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]\npub struct NotFound;"));
}

#[test]
fn test_union_and_intersection() {
    let string = builtin("String");
    let circle = StructBuilder::named(Namespace::new(["shapes"]), "Circle")
        .field(FieldBuilder::new("radius", &string))
        .build()
        .unwrap();
    let square = StructBuilder::named(Namespace::new(["shapes"]), "Square")
        .field(FieldBuilder::new("side", &string))
        .build()
        .unwrap();
    let shape = UnionBuilder::named(Namespace::new(["shapes"]), "Shape")
        .discriminator("kind")
        .variant(&circle)
        .variant(&square)
        .build()
        .unwrap();
    let labelled = InterBuilder::named(Namespace::new(["shapes"]), "LabelledCircle")
        .with(&circle)
        .with(
            StructBuilder::anonymous()
                .called("label")
                .field(FieldBuilder::new("text", &string)),
        )
        .build()
        .unwrap();

    let config = GenConfig::new("").with_native("builtin.String", "String");
    let sheet = SpecSheet::new(vec![shape.clone(), labelled.clone()]);
    let ctx = GenContext::new(&config, &sheet);
    let units = generate(&ctx, &RustDeclarations::new()).unwrap();

    let shape_unit = units.iter().find(|u| u.name == "Shape").unwrap();
    assert_eq!(shape_unit.package, "shapes");
    let expected = "\
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = \"kind\")]
pub enum Shape {
    Circle(crate::shapes::Circle),
    Square(crate::shapes::Square),
}
";
    assert_eq!(shape_unit.source, expected);

    let inter_unit = units.iter().find(|u| u.name == "LabelledCircle").unwrap();
    assert!(inter_unit.source.contains("    #[serde(flatten)]\n    pub circle: crate::shapes::Circle,"));
    assert!(inter_unit
        .source
        .contains("    #[serde(flatten)]\n    pub label: crate::shapes::LabelledCircleLabel,"));
    assert!(units.iter().any(|u| u.name == "LabelledCircleLabel"));
}

/// A union over a non-struct variant, assembled without the builder
fn union_over(name: &str, variant: &DefinitionRef) -> DefinitionRef {
    Arc::new(ElementDefinition::Union(UnionDefinition {
        header: ElementHeader {
            name: Some(name.to_string()),
            namespace: Namespace::new(["pkg"]),
            is_inline: false,
            description: String::new(),
            metadata: Vec::new(),
        },
        union_discriminator: "type".to_string(),
        union_types: vec![Arc::clone(variant)],
    }))
}

#[test]
fn test_unsupported_variants_are_batched() {
    let string = builtin("String");
    let bad = union_over("Bad", &string);
    let also_bad = union_over("AlsoBad", &string);

    let config = GenConfig::default();
    let sheet = SpecSheet::new(vec![bad, also_bad]);
    let ctx = GenContext::new(&config, &sheet);

    match generate(&ctx, &RustDeclarations::new()) {
        Err(CodegenError::Batch { count, summary }) => {
            assert_eq!(count, 2);
            assert!(summary.contains("pkg.Bad"));
            assert!(summary.contains("pkg.AlsoBad"));
            assert!(summary.contains("variant 'builtin.String' is a"));
        }
        other => panic!("expected batch error, got {other:?}"),
    }
}
