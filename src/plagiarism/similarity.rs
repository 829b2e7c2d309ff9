//! Greedy node matching and Dice scoring between two PDGs

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::plagiarism::canonical::EMPTY_HASH;
use crate::plagiarism::pdg::{EdgeKind, Pdg, PdgEdge};

pub const NODE_WEIGHT: f64 = 0.4;
pub const EDGE_WEIGHT: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedEdge {
    pub p1_edge: PdgEdge,
    pub p2_edge: PdgEdge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    pub sim_score: f64,
    pub node_score: f64,
    pub edge_score: f64,
    /// p1 node id to p2 node id
    pub node_mapping: BTreeMap<usize, usize>,
    pub matched_edges: Vec<MatchedEdge>,
}

fn comparable(hash: &str) -> bool {
    hash != EMPTY_HASH
}

/// Ids of the nodes that can take part in a match
fn comparable_nodes(pdg: &Pdg) -> HashSet<usize> {
    pdg.nodes
        .iter()
        .filter(|n| comparable(&n.content_hash))
        .map(|n| n.id)
        .collect()
}

fn dice(matched: usize, left: usize, right: usize) -> Option<f64> {
    let total = left + right;
    (total > 0).then(|| (2 * matched) as f64 / total as f64)
}

/// Binary matrix: 1 where both nodes carry the same non-empty hash
fn node_matrix(p1: &Pdg, p2: &Pdg) -> Vec<Vec<u8>> {
    p1.nodes
        .iter()
        .map(|a| {
            p2.nodes
                .iter()
                .map(|b| u8::from(comparable(&a.content_hash) && a.content_hash == b.content_hash))
                .collect()
        })
        .collect()
}

/// Repeatedly take the first maximal cell in row-major order and clear its
/// row and column. On a 0/1 matrix that is one row-major pass that skips
/// taken columns.
fn greedy_mapping(p1: &Pdg, p2: &Pdg, matrix: &[Vec<u8>]) -> BTreeMap<usize, usize> {
    let mut mapping = BTreeMap::new();
    let mut taken = vec![false; p2.nodes.len()];
    for (i, row) in matrix.iter().enumerate() {
        let hit = row
            .iter()
            .enumerate()
            .find(|(j, cell)| **cell > 0 && !taken[*j])
            .map(|(j, _)| j);
        if let Some(j) = hit {
            taken[j] = true;
            mapping.insert(p1.nodes[i].id, p2.nodes[j].id);
        }
    }
    mapping
}

/// Similarity of `p2` as seen from `p1`.
///
/// Empty blocks never match, so they are left out of the node denominators
/// along with every edge that touches one. Without any comparable edge on
/// either side the edge score follows the node score.
pub fn compare(p1: &Pdg, p2: &Pdg) -> Similarity {
    let matrix = node_matrix(p1, p2);
    let node_mapping = greedy_mapping(p1, p2, &matrix);

    let nodes1 = comparable_nodes(p1);
    let nodes2 = comparable_nodes(p2);
    let node_score = dice(node_mapping.len(), nodes1.len(), nodes2.len()).unwrap_or(1.0);

    let counted = |nodes: &HashSet<usize>, e: &PdgEdge| {
        nodes.contains(&e.source) && nodes.contains(&e.target)
    };
    let edges2: HashSet<(usize, usize, EdgeKind)> = p2
        .edges
        .iter()
        .filter(|e| counted(&nodes2, *e))
        .map(|e| (e.source, e.target, e.kind))
        .collect();
    let edges1: Vec<&PdgEdge> = p1.edges.iter().filter(|e| counted(&nodes1, *e)).collect();

    let matched_edges: Vec<MatchedEdge> = edges1
        .iter()
        .filter_map(|edge| {
            let source = *node_mapping.get(&edge.source)?;
            let target = *node_mapping.get(&edge.target)?;
            edges2
                .contains(&(source, target, edge.kind))
                .then(|| MatchedEdge {
                    p1_edge: **edge,
                    p2_edge: PdgEdge {
                        source,
                        target,
                        kind: edge.kind,
                    },
                })
        })
        .collect();

    let edge_score = dice(matched_edges.len(), edges1.len(), edges2.len()).unwrap_or(node_score);
    let sim_score = NODE_WEIGHT * node_score + EDGE_WEIGHT * edge_score;

    Similarity {
        sim_score,
        node_score,
        edge_score,
        node_mapping,
        matched_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plagiarism::pdg::build_pdg;

    const LOOP: &str = "n = int(input())\nt = 0\nfor i in range(n):\n    if i % 2:\n        t += i\nprint(t)\n";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_self_similarity_is_one() {
        let pdg = build_pdg(LOOP).unwrap();
        let sim = compare(&pdg, &pdg);
        assert!(close(sim.sim_score, 1.0), "got {}", sim.sim_score);
        assert!(sim.node_mapping.iter().all(|(a, b)| a == b));
    }

    #[test]
    fn test_renamed_variables_score_one() {
        let a = build_pdg("a,b=map(int,input().split());print(a+b)\n").unwrap();
        let b = build_pdg("x,y=map(int,input().split());print(x+y)\n").unwrap();
        let sim = compare(&a, &b);
        assert!(close(sim.sim_score, 1.0), "got {}", sim.sim_score);
        assert_eq!(sim.node_mapping.get(&1), Some(&1));
    }

    #[test]
    fn test_unrelated_programs_score_low() {
        let a = build_pdg(LOOP).unwrap();
        let b = build_pdg("print('hello')\n").unwrap();
        let sim = compare(&a, &b);
        assert!(sim.node_mapping.is_empty());
        assert!(close(sim.sim_score, 0.0));
    }

    #[test]
    fn test_symmetric_for_partial_overlap() {
        let a = build_pdg(LOOP).unwrap();
        let b = build_pdg("n = int(input())\nt = 0\nfor i in range(n):\n    t += i\nprint(t)\n").unwrap();
        let ab = compare(&a, &b);
        let ba = compare(&b, &a);
        assert!(close(ab.sim_score, ba.sim_score));
        assert!(ab.sim_score > 0.0 && ab.sim_score < 1.0);
    }

    #[test]
    fn test_empty_blocks_never_match() {
        let a = build_pdg("x = 1\n").unwrap();
        let matrix = node_matrix(&a, &a);
        assert_eq!(matrix[0][0], 0);
        assert_eq!(matrix[1][1], 1);
    }

    #[test]
    fn test_greedy_takes_first_free_column() {
        // two identical branch arms produce duplicate hashes
        let a = build_pdg("if c:\n    y = 1\nelse:\n    y = 1\n").unwrap();
        let sim = compare(&a, &a);
        assert_eq!(sim.node_mapping.get(&2), Some(&2));
        assert_eq!(sim.node_mapping.get(&3), Some(&3));
    }
}
