//! The boundary between resolved definitions and a target language

use std::collections::BTreeMap;

use rpcspec_core::{CanonicalName, ElementDefinition};
use tracing::{debug, info, trace, warn};

use crate::context::GenContext;
use crate::error::{BatchErrors, CodegenError, ErrorEntry, ErrorLocation};

/// One named declaration produced for one definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationUnit {
    pub canonical_name: CanonicalName,
    /// Dotted package the declaration belongs to
    pub package: String,
    /// Declared name inside the package
    pub name: String,
    pub source: String,
}

/// A backend turning one definition into at most one declaration
pub trait DeclarationGenerator {
    /// Name used when reporting failures
    fn name(&self) -> &str;

    /// `Ok(None)` when the element is folded into another declaration
    fn declare(
        &self,
        ctx: &GenContext<'_>,
        element: &ElementDefinition,
    ) -> Result<Option<DeclarationUnit>, CodegenError>;
}

/// Run `generator` over every definition that gets a declaration.
///
/// A failing element does not stop the run; all failures are reported
/// together as [`CodegenError::Batch`].
pub fn generate<G>(ctx: &GenContext<'_>, generator: &G) -> Result<Vec<DeclarationUnit>, CodegenError>
where
    G: DeclarationGenerator + ?Sized,
{
    let mut units = Vec::new();
    let mut errors = BatchErrors::new();

    for element in ctx.elements() {
        if !ctx.has_generated_class(element) {
            trace!("No declaration for {}", element.canonical_name());
            continue;
        }
        match generator.declare(ctx, element) {
            Ok(Some(unit)) => {
                trace!("Declared {} as {}::{}", unit.canonical_name, unit.package, unit.name);
                units.push(unit);
            }
            Ok(None) => {}
            Err(err) => {
                warn!("{} failed on {}: {}", generator.name(), element.canonical_name(), err);
                errors.add(
                    ErrorEntry::from_error(&err)
                        .at(ErrorLocation::of(element))
                        .by(generator.name()),
                );
            }
        }
    }

    if errors.has_errors() {
        debug!("{} failed on {} definitions", generator.name(), errors.count());
        return Err(errors.into());
    }

    info!("{} produced {} declarations", generator.name(), units.len());
    Ok(units)
}

/// Group units by package, keeping generation order inside each package
pub fn group_by_package(units: Vec<DeclarationUnit>) -> BTreeMap<String, Vec<DeclarationUnit>> {
    let mut packages: BTreeMap<String, Vec<DeclarationUnit>> = BTreeMap::new();
    for unit in units {
        packages.entry(unit.package.clone()).or_default().push(unit);
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;
    use crate::error::ErrorCategory;
    use rpcspec_core::builder::{ElementBuilder, FaultBuilder, ScalarBuilder, StructBuilder};
    use rpcspec_core::{DefinitionKind, Namespace, SpecSheet};

    /// Declares structs by name and refuses faults
    struct Picky;

    impl DeclarationGenerator for Picky {
        fn name(&self) -> &str {
            "Picky"
        }

        fn declare(
            &self,
            ctx: &GenContext<'_>,
            element: &ElementDefinition,
        ) -> Result<Option<DeclarationUnit>, CodegenError> {
            match element.kind() {
                DefinitionKind::Fault => Err(CodegenError::unsupported(element, "no faults here")),
                DefinitionKind::Struct => Ok(Some(DeclarationUnit {
                    canonical_name: element.canonical_name(),
                    package: ctx.generated_package_of(element)?,
                    name: element.display_name().to_string(),
                    source: String::new(),
                })),
                _ => Ok(None),
            }
        }
    }

    fn scalar() -> rpcspec_core::DefinitionRef {
        ScalarBuilder::named(Namespace::new(["builtin"]), "Int")
            .build()
            .unwrap()
    }

    #[test]
    fn test_generate_skips_undeclared_elements() {
        let int = scalar();
        let a = StructBuilder::named(Namespace::new(["a"]), "A").build().unwrap();
        let b = StructBuilder::named(Namespace::new(["b"]), "B").build().unwrap();
        let sheet = SpecSheet::new(vec![int, a, b]);
        let config = GenConfig::new("gen").with_native("builtin.Int", "i64");
        let ctx = GenContext::new(&config, &sheet);

        let units = generate(&ctx, &Picky).unwrap();
        let names: Vec<_> = units.iter().map(|u| u.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["a.A", "b.B"]);

        let packages = group_by_package(units);
        assert_eq!(packages.keys().collect::<Vec<_>>(), vec!["gen.a", "gen.b"]);
    }

    #[test]
    fn test_generate_collects_every_failure() {
        let first = FaultBuilder::named(Namespace::new(["pkg"]), "First").build().unwrap();
        let second = FaultBuilder::named(Namespace::new(["pkg"]), "Second").build().unwrap();
        let ok = StructBuilder::named(Namespace::new(["pkg"]), "Fine").build().unwrap();
        let sheet = SpecSheet::new(vec![first, ok, second]);
        let config = GenConfig::default();
        let ctx = GenContext::new(&config, &sheet);

        match generate(&ctx, &Picky) {
            Err(CodegenError::Batch { count, summary }) => {
                assert_eq!(count, 2);
                assert!(summary.contains(&ErrorCategory::UnsupportedElement.to_string()));
                assert!(summary.contains("pkg.First"));
                assert!(summary.contains("pkg.Second"));
                assert!(summary.contains("(in Picky)"));
            }
            other => panic!("expected batch error, got {other:?}"),
        }
    }
}
