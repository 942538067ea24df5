use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::CharacteristicRegistry;

/// Summary of dependency graph structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub generations: usize,
}

/// Characteristics that can be sampled once all earlier generations exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub index: usize,
    /// Sorted by name; members are independent of each other.
    pub characteristics: Vec<String>,
}

/// DAG over characteristics, resolved into topological generations.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    generations: Vec<Generation>,
    summary: GraphSummary,
}

impl DependencyGraph {
    /// Build generations from each characteristic's declared dependencies.
    pub fn build(dependencies: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let graph = build_adjacency(dependencies)?;
        let nodes = graph.len();
        let edges = graph.values().map(|targets| targets.len()).sum();

        let generations = peel_generations(&graph)
            .map_err(|characteristics| Error::CyclicDependency { characteristics })?;

        let summary = GraphSummary {
            nodes,
            edges,
            generations: generations.len(),
        };

        Ok(Self {
            generations,
            summary,
        })
    }

    pub fn from_registry(registry: &CharacteristicRegistry) -> Result<Self> {
        Self::build(&registry.dependency_map())
    }

    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn summary(&self) -> &GraphSummary {
        &self.summary
    }

    /// Index of the generation that samples `name`.
    pub fn generation_of(&self, name: &str) -> Option<usize> {
        self.generations
            .iter()
            .find(|generation| generation.characteristics.iter().any(|item| item == name))
            .map(|generation| generation.index)
    }
}

/// Edges point from a dependency to the characteristics conditioned on it.
fn build_adjacency(
    dependencies: &BTreeMap<String, Vec<String>>,
) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (characteristic, parents) in dependencies {
        graph.entry(characteristic.clone()).or_default();

        for parent in parents {
            if !dependencies.contains_key(parent) {
                return Err(Error::UnknownDependency {
                    characteristic: characteristic.clone(),
                    dependency: parent.clone(),
                });
            }
            graph
                .entry(parent.clone())
                .or_default()
                .insert(characteristic.clone());
        }
    }

    Ok(graph)
}

/// Kahn's algorithm, removing every zero in-degree node of a round at once.
fn peel_generations(
    graph: &BTreeMap<String, BTreeSet<String>>,
) -> std::result::Result<Vec<Generation>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> =
        graph.keys().map(|node| (node.as_str(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            if let Some(count) = indegree.get_mut(target.as_str()) {
                *count += 1;
            }
        }
    }

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter_map(|(node, count)| if *count == 0 { Some(*node) } else { None })
        .collect();

    let mut generations = Vec::new();
    let mut peeled = 0;

    while !ready.is_empty() {
        let mut next = BTreeSet::new();

        for node in &ready {
            if let Some(targets) = graph.get(*node) {
                for target in targets {
                    if let Some(count) = indegree.get_mut(target.as_str()) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next.insert(target.as_str());
                        }
                    }
                }
            }
        }

        peeled += ready.len();
        generations.push(Generation {
            index: generations.len(),
            characteristics: ready.iter().map(|node| node.to_string()).collect(),
        });
        ready = next.into_iter().collect();
    }

    if peeled == graph.len() {
        Ok(generations)
    } else {
        let cycle_nodes: Vec<String> = indegree
            .into_iter()
            .filter_map(|(node, count)| if count > 0 { Some(node.to_string()) } else { None })
            .collect();
        Err(cycle_nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(entries: &[(&str, Vec<&str>)]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(name, parents)| {
                (
                    name.to_string(),
                    parents.iter().map(|parent| parent.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn peels_generations_in_dependency_order() {
        let graph = DependencyGraph::build(&deps(&[
            ("Vintage", vec![]),
            ("Location", vec![]),
            ("Heating Fuel", vec!["Vintage", "Location"]),
            ("HVAC Heating Efficiency", vec!["Heating Fuel"]),
            ("Geometry Stories", vec!["Vintage"]),
        ]))
        .expect("acyclic graph");

        let names: Vec<Vec<&str>> = graph
            .generations()
            .iter()
            .map(|generation| {
                generation
                    .characteristics
                    .iter()
                    .map(String::as_str)
                    .collect()
            })
            .collect();
        assert_eq!(
            names,
            vec![
                vec!["Location", "Vintage"],
                vec!["Geometry Stories", "Heating Fuel"],
                vec!["HVAC Heating Efficiency"],
            ]
        );
        assert_eq!(
            graph.summary(),
            &GraphSummary {
                nodes: 5,
                edges: 4,
                generations: 3
            }
        );
        assert_eq!(graph.generation_of("HVAC Heating Efficiency"), Some(2));
    }

    #[test]
    fn reports_cycle() {
        let err = DependencyGraph::build(&deps(&[
            ("A", vec!["B"]),
            ("B", vec!["A"]),
            ("C", vec![]),
        ]))
        .unwrap_err();
        match err {
            Error::CyclicDependency { characteristics } => {
                assert_eq!(characteristics, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_self_dependency_as_cycle() {
        let err = DependencyGraph::build(&deps(&[("A", vec!["A"])])).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err =
            DependencyGraph::build(&deps(&[("Heating Fuel", vec!["Vintage"])])).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownDependency { ref dependency, .. } if dependency == "Vintage"
        ));
    }

    #[test]
    fn empty_graph_has_no_generations() {
        let graph = DependencyGraph::build(&BTreeMap::new()).expect("empty graph");
        assert!(graph.generations().is_empty());
    }
}
