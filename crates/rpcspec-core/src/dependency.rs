//! Reference graph over a compact sheet, used to explain failed inflation

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::compact::CompactSpecSheet;
use crate::namespace::CanonicalName;

/// Directed graph of canonical names; edges carry the referencing wire key
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<CanonicalName, &'static str>,
    indices: HashMap<CanonicalName, NodeIndex>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            indices: HashMap::new(),
        }
    }

    /// One node per compact entry and per referenced name, one edge per reference
    pub fn from_compact(compact: &CompactSpecSheet) -> Self {
        let mut graph = Self::new();
        for (name, node) in compact.iter() {
            graph.add_name(name);
            for (key, target) in node.references() {
                graph.add_dependency(name, target, key);
            }
        }
        graph
    }

    pub fn add_name(&mut self, name: &CanonicalName) -> NodeIndex {
        if let Some(&idx) = self.indices.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        self.indices.insert(name.clone(), idx);
        idx
    }

    pub fn add_dependency(&mut self, from: &CanonicalName, to: &CanonicalName, key: &'static str) {
        let from = self.add_name(from);
        let to = self.add_name(to);
        self.graph.add_edge(from, to, key);
    }

    pub fn dependencies(&self, name: &CanonicalName) -> Vec<&CanonicalName> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<_> = self
            .graph
            .neighbors(idx)
            .map(|neighbor| &self.graph[neighbor])
            .collect();
        // petgraph walks edges newest first
        out.reverse();
        out.dedup();
        out
    }

    /// Strongly connected groups of names referencing each other, including
    /// names referencing themselves
    pub fn detect_cycles(&self) -> Vec<Vec<CanonicalName>> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<_> = scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
                names.sort();
                names
            })
            .collect()
    }
}

/// Why one compact node could not be inflated
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedEntry {
    pub name: CanonicalName,
    /// The reference that was still missing in the final sweep
    pub missing: CanonicalName,
    /// `name`, then each missing reference in turn, ending at a name absent
    /// from the document or at the first repeat
    pub chain: Vec<CanonicalName>,
}

/// Every compact node left unresolved once the driver stopped making progress
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnresolvedReport {
    pub entries: Vec<UnresolvedEntry>,
    pub cycles: Vec<Vec<CanonicalName>>,
}

impl UnresolvedReport {
    /// Build a report from `(node, missing reference)` pairs of the last sweep
    pub fn new(compact: &CompactSpecSheet, waiting: &[(CanonicalName, CanonicalName)]) -> Self {
        let waiting_on: HashMap<&CanonicalName, &CanonicalName> =
            waiting.iter().map(|(name, missing)| (name, missing)).collect();

        let entries = waiting
            .iter()
            .map(|(name, missing)| {
                let mut chain = vec![name.clone()];
                let mut seen: HashSet<&CanonicalName> = HashSet::from([name]);
                let mut next = missing;
                loop {
                    chain.push(next.clone());
                    if !seen.insert(next) {
                        break;
                    }
                    match waiting_on.get(next) {
                        Some(after) => next = *after,
                        None => break,
                    }
                }
                UnresolvedEntry {
                    name: name.clone(),
                    missing: missing.clone(),
                    chain,
                }
            })
            .collect();

        let mut graph = DependencyGraph::new();
        for (name, _) in waiting {
            graph.add_name(name);
            if let Some(node) = compact.get(name) {
                for (key, target) in node.references() {
                    if waiting_on.contains_key(target) {
                        graph.add_dependency(name, target, key);
                    }
                }
            }
        }

        Self {
            entries,
            cycles: graph.detect_cycles(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &CanonicalName> {
        self.entries.iter().map(|entry| &entry.name)
    }

    /// Names that chains end on which no compact node defines
    pub fn absent(&self) -> Vec<&CanonicalName> {
        let unresolved: HashSet<&CanonicalName> = self.names().collect();
        let mut out: Vec<&CanonicalName> = Vec::new();
        for entry in &self.entries {
            if let Some(last) = entry.chain.last() {
                if !unresolved.contains(last) && !out.contains(&last) {
                    out.push(last);
                }
            }
        }
        out
    }
}

impl fmt::Display for UnresolvedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let chain: Vec<&str> = entry.chain.iter().map(CanonicalName::as_str).collect();
            writeln!(f, "  - {}: {}", entry.name, chain.join(" -> "))?;
        }
        for cycle in &self.cycles {
            let names: Vec<&str> = cycle.iter().map(CanonicalName::as_str).collect();
            writeln!(f, "  cycle: {}", names.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compact::{
        CompactArrayDefinition, CompactElementDefinition, CompactHeader, CompactScalarDefinition,
    };
    use crate::namespace::Namespace;

    fn header(name: &str) -> CompactHeader {
        CompactHeader {
            name: Some(name.to_string()),
            namespace: Namespace::new(["pkg"]),
            is_inline: false,
            description: String::new(),
            metadata: Vec::new(),
        }
    }

    fn array(name: &str, item: &str) -> CompactElementDefinition {
        CompactElementDefinition::Array(CompactArrayDefinition {
            header: header(name),
            array_type: CanonicalName::from(item),
        })
    }

    fn name(value: &str) -> CanonicalName {
        CanonicalName::from(value)
    }

    #[test]
    fn test_graph_from_compact() {
        let mut compact = CompactSpecSheet::new();
        compact
            .insert(CompactElementDefinition::Scalar(CompactScalarDefinition {
                header: header("Int"),
            }))
            .unwrap();
        compact.insert(array("Ints", "pkg.Int")).unwrap();

        let graph = DependencyGraph::from_compact(&compact);
        assert_eq!(graph.dependencies(&name("pkg.Ints")), vec![&name("pkg.Int")]);
        assert!(graph.dependencies(&name("pkg.Int")).is_empty());
        assert!(graph.detect_cycles().is_empty());
    }

    #[test]
    fn test_report_follows_chain_to_absent_name() {
        let mut compact = CompactSpecSheet::new();
        compact.insert(array("A", "pkg.B")).unwrap();
        compact.insert(array("B", "pkg.Missing")).unwrap();

        let report = UnresolvedReport::new(
            &compact,
            &[
                (name("pkg.A"), name("pkg.B")),
                (name("pkg.B"), name("pkg.Missing")),
            ],
        );
        assert_eq!(
            report.entries[0].chain,
            vec![name("pkg.A"), name("pkg.B"), name("pkg.Missing")]
        );
        assert_eq!(report.absent(), vec![&name("pkg.Missing")]);
        assert!(report.cycles.is_empty());
        assert!(report.to_string().contains("pkg.A: pkg.A -> pkg.B -> pkg.Missing"));
    }

    #[test]
    fn test_report_detects_cycles() {
        let mut compact = CompactSpecSheet::new();
        compact.insert(array("A", "pkg.B")).unwrap();
        compact.insert(array("B", "pkg.A")).unwrap();
        compact.insert(array("Self", "pkg.Self")).unwrap();

        let report = UnresolvedReport::new(
            &compact,
            &[
                (name("pkg.A"), name("pkg.B")),
                (name("pkg.B"), name("pkg.A")),
                (name("pkg.Self"), name("pkg.Self")),
            ],
        );
        assert_eq!(report.len(), 3);
        assert_eq!(report.cycles.len(), 2);
        assert!(report.cycles.contains(&vec![name("pkg.A"), name("pkg.B")]));
        assert!(report.cycles.contains(&vec![name("pkg.Self")]));
        assert_eq!(
            report.entries[0].chain,
            vec![name("pkg.A"), name("pkg.B"), name("pkg.A")]
        );
        assert!(report.absent().is_empty());
    }
}
