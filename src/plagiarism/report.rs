//! Detailed comparison report kept as a plagiarism task's abstract

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::plagiarism::pdg::{EdgeKind, Pdg};
use crate::plagiarism::similarity::{compare, MatchedEdge, Similarity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimScores {
    pub sim_score: f64,
    pub node_score: f64,
    pub edge_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mappings {
    pub node_mapping_p1_to_p2: BTreeMap<usize, usize>,
    pub matched_edges: Vec<MatchedEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Common,
    UniqueP1,
    UniqueP2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisNode {
    /// `p1_<id>` or `p2_<id>`
    pub id: String,
    pub original_id: usize,
    pub source_program: String,
    pub status: MatchStatus,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub status: MatchStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSummary {
    pub nodes: Vec<VisNode>,
    pub edges: Vec<VisEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub sim_scores: SimScores,
    pub mappings: Mappings,
    pub visualization_summary: VisualizationSummary,
}

impl SimilarityReport {
    pub fn sim_score(&self) -> f64 {
        self.sim_scores.sim_score
    }

    /// Compare two PDGs and describe the result
    pub fn generate(p1: &Pdg, p2: &Pdg) -> Self {
        let similarity = compare(p1, p2);
        Self::from_similarity(p1, p2, similarity)
    }

    /// Every node and edge of `p1`, then whatever of `p2` went unmatched
    pub fn from_similarity(p1: &Pdg, p2: &Pdg, similarity: Similarity) -> Self {
        let mapped_p2: HashSet<usize> = similarity.node_mapping.values().copied().collect();

        let mut nodes = Vec::with_capacity(p1.nodes.len() + p2.nodes.len());
        for node in &p1.nodes {
            let status = if similarity.node_mapping.contains_key(&node.id) {
                MatchStatus::Common
            } else {
                MatchStatus::UniqueP1
            };
            nodes.push(VisNode {
                id: format!("p1_{}", node.id),
                original_id: node.id,
                source_program: "p1".to_string(),
                status,
                label: node.label.clone(),
            });
        }
        for node in p2.nodes.iter().filter(|n| !mapped_p2.contains(&n.id)) {
            nodes.push(VisNode {
                id: format!("p2_{}", node.id),
                original_id: node.id,
                source_program: "p2".to_string(),
                status: MatchStatus::UniqueP2,
                label: node.label.clone(),
            });
        }

        let matched_p1: HashSet<_> = similarity.matched_edges.iter().map(|m| m.p1_edge).collect();
        let matched_p2: HashSet<_> = similarity.matched_edges.iter().map(|m| m.p2_edge).collect();

        let mut edges = Vec::with_capacity(p1.edges.len() + p2.edges.len());
        for edge in &p1.edges {
            let status = if matched_p1.contains(edge) {
                MatchStatus::Common
            } else {
                MatchStatus::UniqueP1
            };
            edges.push(VisEdge {
                source: format!("p1_{}", edge.source),
                target: format!("p1_{}", edge.target),
                kind: edge.kind,
                status,
            });
        }
        for edge in p2.edges.iter().filter(|e| !matched_p2.contains(*e)) {
            edges.push(VisEdge {
                source: format!("p2_{}", edge.source),
                target: format!("p2_{}", edge.target),
                kind: edge.kind,
                status: MatchStatus::UniqueP2,
            });
        }

        Self {
            sim_scores: SimScores {
                sim_score: similarity.sim_score,
                node_score: similarity.node_score,
                edge_score: similarity.edge_score,
            },
            mappings: Mappings {
                node_mapping_p1_to_p2: similarity.node_mapping,
                matched_edges: similarity.matched_edges,
            },
            visualization_summary: VisualizationSummary { nodes, edges },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plagiarism::pdg::build_pdg;

    #[test]
    fn test_report_marks_common_and_unique() {
        let p1 = build_pdg("x = int(input())\nif x:\n    print(x)\n").unwrap();
        let p2 = build_pdg("y = int(input())\nif y:\n    print(y)\nelse:\n    print(0)\n").unwrap();
        let report = SimilarityReport::generate(&p1, &p2);

        let nodes = &report.visualization_summary.nodes;
        assert_eq!(nodes[0].id, "p1_0");
        assert_eq!(nodes[0].status, MatchStatus::UniqueP1);
        assert_eq!(nodes[1].status, MatchStatus::Common);
        assert_eq!(nodes[2].status, MatchStatus::Common);
        assert!(nodes
            .iter()
            .filter(|n| n.source_program == "p2")
            .all(|n| n.status == MatchStatus::UniqueP2));
        assert!(nodes.iter().any(|n| n.id == "p2_3"));

        let p1_edges = report
            .visualization_summary
            .edges
            .iter()
            .filter(|e| e.source.starts_with("p1_"))
            .count();
        assert_eq!(p1_edges, p1.edges.len());
    }

    #[test]
    fn test_report_json_shape() {
        let pdg = build_pdg("a = 1\nprint(a)\n").unwrap();
        let report = SimilarityReport::generate(&pdg, &pdg);
        let json = serde_json::to_value(&report).unwrap();

        let score = json["sim_scores"]["sim_score"].as_f64().unwrap();
        assert!((score - 1.0).abs() < 1e-9);
        assert_eq!(json["mappings"]["node_mapping_p1_to_p2"]["1"], 1);
        assert_eq!(json["visualization_summary"]["nodes"][1]["status"], "common");

        let back: SimilarityReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
