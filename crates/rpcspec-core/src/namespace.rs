//! Hierarchical naming primitives
//!
//! A [`Namespace`] is an ordered list of path segments. Appending a segment is
//! the only way to descend. A [`CanonicalName`] is the dot-joined form of
//! `namespace + name` and is the identity (and wire key) of every definition.
//!
//! ```
//! use rpcspec_core::namespace::{CanonicalName, Namespace};
//!
//! let ns = Namespace::toplevel() + "pkg" + "Point";
//! assert_eq!(ns.canonical_name().as_str(), "pkg.Point");
//! assert_eq!(CanonicalName::of(&ns, "x").as_str(), "pkg.Point.x");
//! ```

use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered sequence of path segments; the empty sequence is the toplevel
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub segments: Vec<String>,
}

impl Namespace {
    /// The empty namespace
    pub const fn toplevel() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_toplevel(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment, returning the child namespace
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// The enclosing namespace, `None` for the toplevel
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self {
            segments: init.to_vec(),
        })
    }

    /// Last segment of the namespace, if any
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Whether `self` equals `other` or lies beneath it
    pub fn starts_with(&self, other: &Namespace) -> bool {
        self.segments.starts_with(&other.segments)
    }

    pub fn canonical_name(&self) -> CanonicalName {
        CanonicalName(self.segments.join("."))
    }

    /// Default kafka topic for endpoints living in this namespace
    pub fn to_kafka_topic(&self) -> crate::definition::KafkaTopic {
        crate::definition::KafkaTopic(self.canonical_name().0.replace(':', "-"))
    }

    /// Default iframe path for endpoints living in this namespace
    pub fn to_iframe_path(&self) -> crate::definition::IframePath {
        crate::definition::IframePath(format!("/{}", self.segments.join("/")))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for Namespace {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::toplevel());
        }
        Ok(Self::new(s.split('.')))
    }
}

impl<S: Into<String>> Add<S> for Namespace {
    type Output = Namespace;

    fn add(mut self, segment: S) -> Self::Output {
        self.segments.push(segment.into());
        self
    }
}

impl<S: Into<String>> Add<S> for &Namespace {
    type Output = Namespace;

    fn add(self, segment: S) -> Self::Output {
        self.child(segment)
    }
}

/// Dot-joined `namespace + name`; unique per definition within a sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Canonical name of `name` placed inside `namespace`
    pub fn of(namespace: &Namespace, name: &str) -> Self {
        if namespace.is_toplevel() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", namespace, name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CanonicalName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CanonicalName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_toplevel_canonical_name_is_bare() {
        assert_eq!(CanonicalName::of(&Namespace::toplevel(), "Int").as_str(), "Int");
        assert_eq!(Namespace::toplevel().canonical_name().as_str(), "");
    }

    #[test]
    fn test_add_descends() {
        let ns = Namespace::toplevel() + "builtin";
        assert_eq!(ns.segments, vec!["builtin".to_string()]);
        assert_eq!(CanonicalName::of(&ns, "Int").as_str(), "builtin.Int");

        let child = &ns + "nested";
        assert_eq!(child.to_string(), "builtin.nested");
        assert_eq!(child.parent(), Some(ns));
        assert_eq!(Namespace::toplevel().parent(), None);
    }

    #[test]
    fn test_from_str() {
        let ns: Namespace = "a.b.c".parse().unwrap();
        assert_eq!(ns, Namespace::new(["a", "b", "c"]));
        let empty: Namespace = "".parse().unwrap();
        assert!(empty.is_toplevel());
    }

    #[test]
    fn test_transport_derivations() {
        let ns = Namespace::new(["user:v1", "getUser"]);
        assert_eq!(ns.to_kafka_topic().0, "user-v1.getUser");
        assert_eq!(ns.to_iframe_path().0, "/user:v1/getUser");
    }

    #[test]
    fn test_starts_with() {
        let outer = Namespace::new(["pkg"]);
        let inner = Namespace::new(["pkg", "Point"]);
        assert!(inner.starts_with(&outer));
        assert!(!outer.starts_with(&inner));
        assert!(outer.starts_with(&Namespace::toplevel()));
    }

    #[test]
    fn test_namespace_wire_form() {
        let ns = Namespace::new(["pkg", "sub"]);
        let json = serde_json::to_value(&ns).unwrap();
        assert_eq!(json, serde_json::json!({ "segments": ["pkg", "sub"] }));
        let name = CanonicalName::from("pkg.sub.X");
        assert_eq!(serde_json::to_value(&name).unwrap(), serde_json::json!("pkg.sub.X"));
    }

    proptest! {
        #[test]
        fn prop_canonical_name_roundtrips_through_parse(
            segments in proptest::collection::vec("[a-z][a-z0-9_]{0,6}", 1..5),
            name in "[A-Z][a-zA-Z0-9]{0,6}",
        ) {
            let ns = Namespace::new(segments.clone());
            let canonical = CanonicalName::of(&ns, &name);
            let reparsed: Namespace = canonical.as_str().parse().unwrap();
            prop_assert_eq!(reparsed, ns.child(name.clone()));
            prop_assert_eq!(ns.child(name).canonical_name(), canonical);
        }
    }
}
