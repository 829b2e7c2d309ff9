//! Control-flow graph over basic blocks
//!
//! Only `if`, `for`, `while` and `match` split blocks. Every other
//! statement lands whole in the current block; the bodies of `def`,
//! `class`, `with` and `try` are then walked in place so branches inside
//! them still shape the graph.

use std::fmt::Write;

use crate::plagiarism::python::ast::{Expr, MatchCase, Stmt};

pub const EXIT: usize = 0;
pub const ENTRY: usize = 1;

/// Number of items a block label shows before eliding the rest
const LABEL_ITEMS: usize = 3;

/// Unit of code held by a block: a statement, or the expression that
/// drives a branch or loop header
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Stmt(Stmt),
    Expr(Expr),
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fragment::Stmt(s) => write!(f, "{}", s),
            Fragment::Expr(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: usize,
    pub items: Vec<Fragment>,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
}

impl BasicBlock {
    fn new(id: usize) -> Self {
        Self {
            id,
            items: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    /// `Block-<id>` followed by the first few items
    pub fn label(&self) -> String {
        if self.items.is_empty() {
            return format!("Block-{} (empty)", self.id);
        }
        let mut label = format!("Block-{}", self.id);
        for item in self.items.iter().take(LABEL_ITEMS) {
            let _ = write!(label, "\n{}", item);
        }
        if self.items.len() > LABEL_ITEMS {
            label.push_str("\n...");
        }
        label
    }
}

#[derive(Debug, Clone)]
pub struct Cfg {
    /// Indexed by block id
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    pub fn build(module: &[Stmt]) -> Self {
        let mut builder = CfgBuilder { blocks: Vec::new() };
        let exit = builder.new_block();
        let entry = builder.new_block();
        debug_assert_eq!((exit, entry), (EXIT, ENTRY));

        let last = builder.visit_body(module, entry);
        if last != EXIT {
            builder.add_edge(last, EXIT);
        }
        Cfg {
            blocks: builder.blocks,
        }
    }

    pub fn block(&self, id: usize) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

struct CfgBuilder {
    blocks: Vec<BasicBlock>,
}

impl CfgBuilder {
    fn new_block(&mut self) -> usize {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock::new(id));
        id
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
        }
        if !self.blocks[to].predecessors.contains(&from) {
            self.blocks[to].predecessors.push(from);
        }
    }

    fn push(&mut self, block: usize, fragment: Fragment) {
        self.blocks[block].items.push(fragment);
    }

    /// Visit statements in order starting at `cursor`; returns the block
    /// control falls out of.
    fn visit_body(&mut self, stmts: &[Stmt], cursor: usize) -> usize {
        stmts
            .iter()
            .fold(cursor, |cursor, stmt| self.visit(stmt, cursor))
    }

    fn visit(&mut self, stmt: &Stmt, cursor: usize) -> usize {
        match stmt {
            Stmt::If { test, body, orelse } => {
                self.push(cursor, Fragment::Expr(test.clone()));

                let then_block = self.new_block();
                self.add_edge(cursor, then_block);
                let then_end = self.visit_body(body, then_block);

                let else_end = if orelse.is_empty() {
                    cursor
                } else {
                    let else_block = self.new_block();
                    self.add_edge(cursor, else_block);
                    self.visit_body(orelse, else_block)
                };

                let merge = self.new_block();
                self.add_edge(then_end, merge);
                self.add_edge(else_end, merge);
                merge
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                let header = self.new_block();
                self.add_edge(cursor, header);
                self.push(header, Fragment::Expr(iter.clone()));
                self.push(header, Fragment::Expr(target.clone()));
                self.loop_tail(header, body, orelse)
            }
            Stmt::While { test, body, orelse } => {
                let header = self.new_block();
                self.add_edge(cursor, header);
                self.push(header, Fragment::Expr(test.clone()));
                self.loop_tail(header, body, orelse)
            }
            Stmt::Match { subject, cases } => {
                // subject, patterns and guards stay with the dispatching block
                let header = Stmt::Match {
                    subject: subject.clone(),
                    cases: cases
                        .iter()
                        .map(|case| MatchCase {
                            pattern: case.pattern.clone(),
                            guard: case.guard.clone(),
                            body: Vec::new(),
                        })
                        .collect(),
                };
                self.push(cursor, Fragment::Stmt(header));

                let mut ends = Vec::with_capacity(cases.len());
                for case in cases {
                    let case_block = self.new_block();
                    self.add_edge(cursor, case_block);
                    ends.push(self.visit_body(&case.body, case_block));
                }

                let merge = self.new_block();
                // no case matched
                self.add_edge(cursor, merge);
                for end in ends {
                    self.add_edge(end, merge);
                }
                merge
            }
            Stmt::FunctionDef { body, .. }
            | Stmt::ClassDef { body, .. }
            | Stmt::With { body, .. } => {
                self.push(cursor, Fragment::Stmt(stmt.clone()));
                self.visit_body(body, cursor)
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.push(cursor, Fragment::Stmt(stmt.clone()));
                let mut cursor = self.visit_body(body, cursor);
                for handler in handlers {
                    cursor = self.visit_body(&handler.body, cursor);
                }
                cursor = self.visit_body(orelse, cursor);
                self.visit_body(finalbody, cursor)
            }
            _ => {
                self.push(cursor, Fragment::Stmt(stmt.clone()));
                cursor
            }
        }
    }

    /// Body and after-loop blocks of a loop whose header is already wired
    fn loop_tail(&mut self, header: usize, body: &[Stmt], orelse: &[Stmt]) -> usize {
        let body_block = self.new_block();
        self.add_edge(header, body_block);
        let after = self.new_block();
        self.add_edge(header, after);

        let body_end = self.visit_body(body, body_block);
        self.add_edge(body_end, header);

        self.visit_body(orelse, after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plagiarism::python::parse_module;

    fn cfg(source: &str) -> Cfg {
        Cfg::build(&parse_module(source).unwrap())
    }

    fn edges(cfg: &Cfg) -> Vec<(usize, usize)> {
        let mut edges: Vec<_> = cfg
            .blocks
            .iter()
            .flat_map(|b| b.successors.iter().map(move |s| (b.id, *s)))
            .collect();
        edges.sort();
        edges
    }

    #[test]
    fn test_straight_line_code_stays_in_entry() {
        let g = cfg("a = 1\nb = a + 2\nprint(b)\n");
        assert_eq!(g.len(), 2);
        assert_eq!(g.blocks[ENTRY].items.len(), 3);
        assert_eq!(edges(&g), vec![(1, 0)]);
        assert!(g.blocks[EXIT].items.is_empty());
    }

    #[test]
    fn test_if_else_diamond() {
        let g = cfg("x = int(input())\nif x > 0:\n    y = 1\nelse:\n    y = 2\nprint(y)\n");
        // exit, entry, then, else, merge
        assert_eq!(g.len(), 5);
        assert_eq!(edges(&g), vec![(1, 2), (1, 3), (2, 4), (3, 4), (4, 0)]);
        assert_eq!(g.blocks[ENTRY].items.len(), 2);
        assert_eq!(g.blocks[4].items.len(), 1);
    }

    #[test]
    fn test_if_without_else_falls_through() {
        let g = cfg("if x:\n    y = 1\n");
        assert_eq!(edges(&g), vec![(1, 2), (1, 3), (2, 3), (3, 0)]);
    }

    #[test]
    fn test_for_loop_shape() {
        let g = cfg("s = 0\nfor i in range(n):\n    s += i\nprint(s)\n");
        // exit, entry, header, body, after
        assert_eq!(g.len(), 5);
        assert_eq!(edges(&g), vec![(1, 2), (2, 3), (2, 4), (3, 2), (4, 0)]);
        assert_eq!(g.blocks[2].items.len(), 2);
        assert!(matches!(g.blocks[2].items[1], Fragment::Expr(Expr::Name { .. })));
    }

    #[test]
    fn test_while_else_goes_after_loop() {
        let g = cfg("while n > 0:\n    n -= 1\nelse:\n    done = True\n");
        assert_eq!(g.blocks[4].items.len(), 1);
        assert_eq!(edges(&g), vec![(1, 2), (2, 3), (2, 4), (3, 2), (4, 0)]);
    }

    #[test]
    fn test_match_branches_per_case() {
        let g = cfg("match cmd:\n    case 'a':\n        x = 1\n    case y if y:\n        x = y\n        z = 2\nprint(x)\n");
        // exit, entry, two cases, merge
        assert_eq!(g.len(), 5);
        assert_eq!(edges(&g), vec![(1, 2), (1, 3), (1, 4), (2, 4), (3, 4), (4, 0)]);

        let Fragment::Stmt(Stmt::Match { cases, .. }) = &g.blocks[ENTRY].items[0] else {
            panic!("expected the match header in the entry block");
        };
        assert!(cases.iter().all(|case| case.body.is_empty()));
        assert!(cases[1].guard.is_some());
        assert_eq!(g.blocks[3].items.len(), 2);
        assert_eq!(g.blocks[4].items.len(), 1);
    }

    #[test]
    fn test_function_body_walked_in_place() {
        let g = cfg("def f(a):\n    if a:\n        return 1\n    return 2\n");
        // the def itself and the branch test share the entry block
        assert_eq!(g.blocks[ENTRY].items.len(), 2);
        assert!(matches!(g.blocks[ENTRY].items[0], Fragment::Stmt(Stmt::FunctionDef { .. })));
        assert_eq!(g.len(), 4);
    }

    #[test]
    fn test_labels() {
        let g = cfg("a = 1\nb = 2\nc = 3\nd = 4\n");
        assert_eq!(g.blocks[ENTRY].label(), "Block-1\na = 1\nb = 2\nc = 3\n...");
        assert_eq!(g.blocks[EXIT].label(), "Block-0 (empty)");
    }
}
