//! Error types and batch error reporting for declaration generation
//!
//! A failure while declaring one element does not stop the run: the
//! generation loop records it in [`BatchErrors`] and moves on, so a single
//! pass reports every broken element.

use std::fmt;

use rpcspec_core::{CanonicalName, ElementDefinition};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Code generation error: {0}")]
    Generation(String),

    #[error("Unsupported element '{name}': {reason}")]
    UnsupportedElement { name: CanonicalName, reason: String },

    #[error("'{0}' has no generated declaration")]
    NoGeneratedClass(CanonicalName),

    #[error("Format error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Batch errors ({count} total):\n{summary}")]
    Batch { count: usize, summary: String },
}

impl CodegenError {
    pub fn unsupported(element: &ElementDefinition, reason: impl Into<String>) -> Self {
        CodegenError::UnsupportedElement {
            name: element.canonical_name(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CodegenError::UnsupportedElement { .. } => ErrorCategory::UnsupportedElement,
            CodegenError::NoGeneratedClass(_) => ErrorCategory::MissingDeclaration,
            CodegenError::Fmt(_) => ErrorCategory::Formatting,
            CodegenError::Generation(_) | CodegenError::Batch { .. } => ErrorCategory::Other,
        }
    }
}

/// Where in the definition graph an error occurred
#[derive(Debug, Clone, Default)]
pub struct ErrorLocation {
    /// Namespace of the element (e.g. "user:v1.UserService")
    pub namespace: Option<String>,
    /// Element name, or its reserved anonymous name
    pub element: Option<String>,
    /// Field within the element
    pub field: Option<String>,
}

impl ErrorLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of `element` itself
    pub fn of(element: &ElementDefinition) -> Self {
        let location = Self::new().in_element(element.display_name());
        if element.namespace().is_toplevel() {
            location
        } else {
            location.in_namespace(element.namespace().to_string())
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn in_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    pub fn in_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.namespace, &self.element, &self.field) {
            (Some(ns), Some(e), Some(field)) => write!(f, "{}.{}::{}", ns, e, field),
            (Some(ns), Some(e), None) => write!(f, "{}.{}", ns, e),
            (Some(ns), None, Some(field)) => write!(f, "{}::{}", ns, field),
            (Some(ns), None, None) => write!(f, "{}", ns),
            (None, Some(e), Some(field)) => write!(f, "{}::{}", e, field),
            (None, Some(e), None) => write!(f, "{}", e),
            (None, None, Some(field)) => write!(f, "::{}", field),
            (None, None, None) => write!(f, "<unknown location>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// The backend cannot express this element
    UnsupportedElement,
    /// A referenced element has no declaration to point at
    MissingDeclaration,
    /// Writing the source text failed
    Formatting,
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::UnsupportedElement => write!(f, "UNSUPPORTED_ELEMENT"),
            ErrorCategory::MissingDeclaration => write!(f, "MISSING_DECLARATION"),
            ErrorCategory::Formatting => write!(f, "FORMATTING"),
            ErrorCategory::Other => write!(f, "OTHER"),
        }
    }
}

/// A single error entry in the batch
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub category: ErrorCategory,
    pub location: ErrorLocation,
    pub message: String,
    /// Name of the generator that failed
    pub generator: Option<String>,
}

impl ErrorEntry {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            location: ErrorLocation::new(),
            message: message.into(),
            generator: None,
        }
    }

    pub fn from_error(err: &CodegenError) -> Self {
        Self::new(err.category(), err.to_string())
    }

    pub fn at(mut self, location: ErrorLocation) -> Self {
        self.location = location;
        self
    }

    pub fn by(mut self, generator: impl Into<String>) -> Self {
        self.generator = Some(generator.into());
        self
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] at {}: {}", self.category, self.location, self.message)?;
        if let Some(generator) = &self.generator {
            write!(f, " (in {})", generator)?;
        }
        Ok(())
    }
}

/// Failures collected across one generation run
#[derive(Debug, Clone, Default)]
pub struct BatchErrors {
    entries: Vec<ErrorEntry>,
}

impl BatchErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: ErrorEntry) {
        self.entries.push(entry);
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn by_category(&self, category: ErrorCategory) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn merge(&mut self, other: BatchErrors) {
        self.entries.extend(other.entries);
    }

    /// Errors grouped by category, at most ten listed per group
    pub fn format_summary(&self) -> String {
        if self.entries.is_empty() {
            return "No errors".to_string();
        }

        let mut by_category: std::collections::BTreeMap<ErrorCategory, Vec<&ErrorEntry>> =
            std::collections::BTreeMap::new();
        for entry in &self.entries {
            by_category.entry(entry.category).or_default().push(entry);
        }

        let mut lines = Vec::new();
        lines.push(format!("Found {} error(s):", self.entries.len()));
        lines.push(String::new());

        for (category, entries) in by_category {
            lines.push(format!("## {} ({} errors):", category, entries.len()));
            for entry in entries.iter().take(10) {
                lines.push(format!("  - {}", entry));
            }
            if entries.len() > 10 {
                lines.push(format!("  ... and {} more", entries.len() - 10));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

impl From<BatchErrors> for CodegenError {
    fn from(errors: BatchErrors) -> Self {
        CodegenError::Batch {
            count: errors.count(),
            summary: errors.format_summary(),
        }
    }
}

impl fmt::Display for BatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_summary())
    }
}
