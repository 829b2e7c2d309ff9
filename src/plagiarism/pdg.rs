//! Program-dependence graph over CFG blocks
//!
//! Control dependence comes from post-dominance, data dependence from a
//! reaching-definitions fixpoint. Nodes are the CFG blocks themselves.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::plagiarism::canonical::canonical_hash;
use crate::plagiarism::cfg::{Cfg, Fragment, EXIT};
use crate::plagiarism::python::ast::{walk_expr_names, walk_stmt_names, ExprContext};
use crate::plagiarism::python::{parse_module, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Control,
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdgNode {
    pub id: usize,
    pub label: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PdgEdge {
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pdg {
    pub nodes: Vec<PdgNode>,
    pub edges: Vec<PdgEdge>,
}

impl Pdg {
    pub fn node(&self, id: usize) -> Option<&PdgNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_edge(&self, source: usize, target: usize, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.kind == kind)
    }
}

/// Parse Python source and build its PDG
pub fn build_pdg(source: &str) -> Result<Pdg, ParseError> {
    let module = parse_module(source)?;
    Ok(Pdg::from_cfg(&Cfg::build(&module)))
}

impl Pdg {
    pub fn from_cfg(cfg: &Cfg) -> Self {
        let nodes = cfg
            .blocks
            .iter()
            .map(|block| PdgNode {
                id: block.id,
                label: block.label(),
                content_hash: canonical_hash(&block.items),
            })
            .collect();

        let control = control_dependences(cfg);
        let data = data_dependences(cfg);

        let edges = control
            .into_iter()
            .map(|(source, target)| PdgEdge {
                source,
                target,
                kind: EdgeKind::Control,
            })
            .chain(data.into_iter().map(|(source, target)| PdgEdge {
                source,
                target,
                kind: EdgeKind::Data,
            }))
            .collect();

        Self { nodes, edges }
    }
}

/// Post-dominator sets, indexed by block id
fn post_dominators(cfg: &Cfg) -> Vec<BTreeSet<usize>> {
    let all: BTreeSet<usize> = (0..cfg.len()).collect();
    let mut post_doms = vec![all; cfg.len()];
    if let Some(exit) = post_doms.get_mut(EXIT) {
        *exit = BTreeSet::from([EXIT]);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for block in &cfg.blocks {
            if block.id == EXIT || block.successors.is_empty() {
                continue;
            }
            let mut succs = block.successors.iter();
            let Some(first) = succs.next() else { continue };
            let mut new_doms = post_doms[*first].clone();
            for succ in succs {
                new_doms = new_doms.intersection(&post_doms[*succ]).copied().collect();
            }
            new_doms.insert(block.id);

            if new_doms != post_doms[block.id] {
                post_doms[block.id] = new_doms;
                changed = true;
            }
        }
    }
    post_doms
}

/// `(branch, dependent)` pairs: every block reachable from a branch's
/// successor that the branch does not post-dominate
fn control_dependences(cfg: &Cfg) -> BTreeSet<(usize, usize)> {
    let post_doms = post_dominators(cfg);
    let mut deps = BTreeSet::new();

    for block in cfg.blocks.iter().filter(|b| b.successors.len() > 1) {
        for &succ in &block.successors {
            let mut queue = VecDeque::from([succ]);
            let mut visited = BTreeSet::from([succ]);
            while let Some(curr) = queue.pop_front() {
                if !post_doms[curr].contains(&block.id) {
                    deps.insert((block.id, curr));
                }
                for &child in &cfg.blocks[curr].successors {
                    if visited.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
        }
    }
    deps
}

/// Variables a block stores and loads
fn defs_uses(items: &[Fragment]) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut defs = BTreeSet::new();
    let mut uses = BTreeSet::new();
    let mut record = |name: &str, ctx: ExprContext| match ctx {
        ExprContext::Store => {
            defs.insert(name.to_string());
        }
        ExprContext::Load => {
            uses.insert(name.to_string());
        }
        ExprContext::Del => {}
    };
    for item in items {
        match item {
            Fragment::Stmt(s) => walk_stmt_names(s, &mut record),
            Fragment::Expr(e) => walk_expr_names(e, &mut record),
        }
    }
    (defs, uses)
}

/// `(defining block, using block)` pairs
fn data_dependences(cfg: &Cfg) -> BTreeSet<(usize, usize)> {
    let (defs, uses): (Vec<_>, Vec<_>) = cfg.blocks.iter().map(|b| defs_uses(&b.items)).unzip();
    let reaching = reaching_definitions(cfg, &defs);

    let mut deps = BTreeSet::new();
    for block in &cfg.blocks {
        for var in &uses[block.id] {
            for (def_block, def_var) in &reaching[block.id] {
                if def_var == var {
                    deps.insert((*def_block, block.id));
                }
            }
        }
    }
    deps
}

/// IN sets of the reaching-definitions fixpoint
fn reaching_definitions(cfg: &Cfg, defs: &[BTreeSet<String>]) -> Vec<BTreeSet<(usize, String)>> {
    let mut in_sets: Vec<BTreeSet<(usize, String)>> = vec![BTreeSet::new(); cfg.len()];
    let mut out_sets: Vec<BTreeSet<(usize, String)>> = vec![BTreeSet::new(); cfg.len()];

    let mut changed = true;
    while changed {
        changed = false;
        for block in &cfg.blocks {
            let incoming: BTreeSet<(usize, String)> = block
                .predecessors
                .iter()
                .flat_map(|p| out_sets[*p].iter().cloned())
                .collect();

            let block_defs = &defs[block.id];
            let mut new_out: BTreeSet<(usize, String)> =
                block_defs.iter().map(|v| (block.id, v.clone())).collect();
            new_out.extend(
                incoming
                    .iter()
                    .filter(|(_, var)| !block_defs.contains(var))
                    .cloned(),
            );

            in_sets[block.id] = incoming;
            if new_out != out_sets[block.id] {
                out_sets[block.id] = new_out;
                changed = true;
            }
        }
    }
    in_sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plagiarism::canonical::EMPTY_HASH;

    fn edges_of(pdg: &Pdg, kind: EdgeKind) -> Vec<(usize, usize)> {
        pdg.edges
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (e.source, e.target))
            .collect()
    }

    #[test]
    fn test_if_else_dependences() {
        let pdg = build_pdg("x = int(input())\nif x > 0:\n    y = 1\nelse:\n    y = 2\nprint(y)\n").unwrap();
        assert_eq!(pdg.nodes.len(), 5);
        // every block downstream of the branch that it does not post-dominate
        assert_eq!(
            edges_of(&pdg, EdgeKind::Control),
            vec![(1, 0), (1, 2), (1, 3), (1, 4)]
        );
        assert_eq!(edges_of(&pdg, EdgeKind::Data), vec![(2, 4), (3, 4)]);
    }

    #[test]
    fn test_loop_dependences() {
        let pdg = build_pdg("s = 0\nfor i in range(n):\n    s += i\nprint(s)\n").unwrap();
        // the header post-dominates its body through the back edge
        assert_eq!(edges_of(&pdg, EdgeKind::Control), vec![(2, 0), (2, 4)]);

        let data = edges_of(&pdg, EdgeKind::Data);
        // the loop target defined in the header feeds the body
        assert!(data.contains(&(2, 3)));
        // both the initial and the accumulated sum reach the print
        assert!(data.contains(&(1, 4)));
        assert!(data.contains(&(3, 4)));
    }

    #[test]
    fn test_redefinition_kills() {
        let pdg = build_pdg("a = 1\nif c:\n    a = 2\nprint(a)\n").unwrap();
        let data = edges_of(&pdg, EdgeKind::Data);
        assert!(data.contains(&(2, 3)));
        assert!(data.contains(&(1, 3)));

        let pdg = build_pdg("a = 1\nif c:\n    a = 2\nelse:\n    a = 3\nprint(a)\n").unwrap();
        let data = edges_of(&pdg, EdgeKind::Data);
        assert!(!data.contains(&(1, 4)));
    }

    #[test]
    fn test_nodes_carry_hashes() {
        let pdg = build_pdg("x = 1\n").unwrap();
        assert_eq!(pdg.nodes[0].content_hash, EMPTY_HASH);
        assert_ne!(pdg.nodes[1].content_hash, EMPTY_HASH);
        assert_eq!(pdg.nodes[1].label, "Block-1\nx = 1");
        assert!(pdg.edges.is_empty());
    }

    #[test]
    fn test_build_is_deterministic() {
        let source = "n = int(input())\nt = 0\nwhile n > 0:\n    if n % 2:\n        t += n\n    n -= 1\nprint(t)\n";
        let a = build_pdg(source).unwrap();
        let b = build_pdg(source).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_edge_kind_serializes_lowercase() {
        let edge = PdgEdge {
            source: 1,
            target: 2,
            kind: EdgeKind::Control,
        };
        assert_eq!(
            serde_json::to_string(&edge).unwrap(),
            r#"{"source":1,"target":2,"kind":"control"}"#
        );
    }

    #[test]
    fn test_syntax_error_propagates() {
        assert!(build_pdg("def f(:\n").is_err());
    }
}
