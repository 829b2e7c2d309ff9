//! Identifier and literal canonicalization plus content hashing
//!
//! Every identifier in a block becomes `VAR_<n>` and every int, float or
//! string literal becomes the string constant `'CONST_<n>'`, numbered by
//! first occurrence. Numbering restarts for each block.

use std::collections::HashMap;
use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::plagiarism::cfg::Fragment;
use crate::plagiarism::python::ast::{
    Comprehension, Constant, Expr, FStringPart, Keyword, Param, Pattern, Stmt,
};

/// Hash assigned to blocks with no statements. Never counts as a match.
pub const EMPTY_HASH: &str = "empty";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LiteralKind {
    Int,
    Float,
    Str,
}

#[derive(Debug, Default)]
pub struct Canonicalizer {
    vars: HashMap<String, String>,
    consts: HashMap<(LiteralKind, String), String>,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn var(&mut self, name: &str) -> String {
        let next = self.vars.len();
        self.vars
            .entry(name.to_string())
            .or_insert_with(|| format!("VAR_{}", next))
            .clone()
    }

    fn rename(&mut self, name: &mut String) {
        *name = self.var(name);
    }

    fn constant(&mut self, kind: LiteralKind, text: &str) -> String {
        let next = self.consts.len();
        self.consts
            .entry((kind, text.to_string()))
            .or_insert_with(|| format!("CONST_{}", next))
            .clone()
    }

    fn placeholder(&mut self, kind: LiteralKind, text: &str) -> Expr {
        let name = self.constant(kind, text);
        Expr::Constant(Constant::Str(format!("'{}'", name)))
    }

    pub fn fragment(&mut self, fragment: &mut Fragment) {
        match fragment {
            Fragment::Stmt(s) => self.stmt(s),
            Fragment::Expr(e) => self.expr(e),
        }
    }

    fn body(&mut self, body: &mut [Stmt]) {
        body.iter_mut().for_each(|s| self.stmt(s));
    }

    fn exprs(&mut self, exprs: &mut [Expr]) {
        exprs.iter_mut().for_each(|e| self.expr(e));
    }

    fn opt(&mut self, expr: &mut Option<Expr>) {
        if let Some(e) = expr {
            self.expr(e);
        }
    }

    fn keywords(&mut self, keywords: &mut [Keyword]) {
        keywords.iter_mut().for_each(|k| self.expr(&mut k.value));
    }

    fn params(&mut self, params: &mut [Param]) {
        for param in params {
            match param {
                Param::Plain { arg, default } => {
                    self.rename(&mut arg.name);
                    self.opt(&mut arg.annotation);
                    self.opt(default);
                }
                Param::VarArgs(Some(arg)) | Param::KwArgs(arg) => {
                    self.rename(&mut arg.name);
                    self.opt(&mut arg.annotation);
                }
                Param::VarArgs(None) | Param::PosOnlyMarker => {}
            }
        }
    }

    fn generators(&mut self, generators: &mut [Comprehension]) {
        for generator in generators {
            self.expr(&mut generator.target);
            self.expr(&mut generator.iter);
            self.exprs(&mut generator.ifs);
        }
    }

    fn pattern(&mut self, pattern: &mut Pattern) {
        match pattern {
            Pattern::Value(value) => self.expr(value),
            Pattern::Singleton(_) | Pattern::Star(None) => {}
            Pattern::Star(Some(name)) => self.rename(name),
            Pattern::Sequence(patterns) | Pattern::Or(patterns) => {
                patterns.iter_mut().for_each(|p| self.pattern(p))
            }
            Pattern::Mapping {
                keys,
                patterns,
                rest,
            } => {
                self.exprs(keys);
                patterns.iter_mut().for_each(|p| self.pattern(p));
                if let Some(r) = rest {
                    self.rename(r);
                }
            }
            // keyword attribute names are kept
            Pattern::Class {
                cls,
                patterns,
                kwd_patterns,
                ..
            } => {
                self.expr(cls);
                patterns
                    .iter_mut()
                    .chain(kwd_patterns.iter_mut())
                    .for_each(|p| self.pattern(p));
            }
            Pattern::As { pattern, name } => {
                if let Some(p) = pattern {
                    self.pattern(p);
                }
                if let Some(n) = name {
                    self.rename(n);
                }
            }
        }
    }

    pub fn stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::FunctionDef {
                name,
                params,
                body,
                decorators,
                returns,
                ..
            } => {
                self.rename(name);
                self.params(params);
                self.body(body);
                self.exprs(decorators);
                self.opt(returns);
            }
            Stmt::ClassDef {
                name,
                bases,
                keywords,
                body,
                decorators,
            } => {
                self.rename(name);
                self.exprs(bases);
                self.keywords(keywords);
                self.body(body);
                self.exprs(decorators);
            }
            Stmt::Return(value) => self.opt(value),
            Stmt::Delete(targets) => self.exprs(targets),
            Stmt::Assign { targets, value } => {
                self.exprs(targets);
                self.expr(value);
            }
            Stmt::AugAssign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
            } => {
                self.expr(target);
                self.expr(annotation);
                self.opt(value);
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                self.expr(target);
                self.expr(iter);
                self.body(body);
                self.body(orelse);
            }
            Stmt::While { test, body, orelse } | Stmt::If { test, body, orelse } => {
                self.expr(test);
                self.body(body);
                self.body(orelse);
            }
            Stmt::With { items, body, .. } => {
                for item in items.iter_mut() {
                    self.expr(&mut item.context_expr);
                    self.opt(&mut item.optional_vars);
                }
                self.body(body);
            }
            Stmt::Raise { exc, cause } => {
                self.opt(exc);
                self.opt(cause);
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.body(body);
                for handler in handlers.iter_mut() {
                    self.opt(&mut handler.type_);
                    if let Some(name) = &mut handler.name {
                        self.rename(name);
                    }
                    self.body(&mut handler.body);
                }
                self.body(orelse);
                self.body(finalbody);
            }
            Stmt::Assert { test, msg } => {
                self.expr(test);
                self.opt(msg);
            }
            Stmt::Global(names) | Stmt::Nonlocal(names) => {
                names.iter_mut().for_each(|n| self.rename(n));
            }
            Stmt::Match { subject, cases } => {
                self.expr(subject);
                for case in cases.iter_mut() {
                    self.pattern(&mut case.pattern);
                    self.opt(&mut case.guard);
                    self.body(&mut case.body);
                }
            }
            Stmt::Expr(e) => self.expr(e),
            Stmt::Import(_)
            | Stmt::ImportFrom { .. }
            | Stmt::Pass
            | Stmt::Break
            | Stmt::Continue => {}
        }
    }

    pub fn expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Name { id, .. } => self.rename(id),
            Expr::Constant(c) => {
                let literal = match c {
                    Constant::Int(text) => Some((LiteralKind::Int, text.clone())),
                    Constant::Float(text) => Some((LiteralKind::Float, text.clone())),
                    Constant::Str(text) => Some((LiteralKind::Str, text.clone())),
                    _ => None,
                };
                if let Some((kind, text)) = literal {
                    *expr = self.placeholder(kind, &text);
                }
            }
            Expr::JoinedStr(parts) => {
                for part in parts.iter_mut() {
                    match part {
                        FStringPart::Literal(text) => {
                            *text = self.constant(LiteralKind::Str, text);
                        }
                        FStringPart::Formatted { value, .. } => self.expr(value),
                    }
                }
            }
            // attribute names are kept
            Expr::Attribute { value, .. } => self.expr(value),
            Expr::Subscript { value, slice, .. } => {
                self.expr(value);
                self.expr(slice);
            }
            Expr::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.expr(part);
                }
            }
            Expr::Starred { value, .. } | Expr::Await(value) | Expr::YieldFrom(value) => {
                self.expr(value)
            }
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } | Expr::Set(elts) => {
                self.exprs(elts)
            }
            Expr::Dict { keys, values } => {
                for (key, value) in keys.iter_mut().zip(values.iter_mut()) {
                    self.opt(key);
                    self.expr(value);
                }
            }
            Expr::BinOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::UnaryOp { operand, .. } => self.expr(operand),
            Expr::BoolOp { values, .. } => self.exprs(values),
            Expr::Compare {
                left, comparators, ..
            } => {
                self.expr(left);
                self.exprs(comparators);
            }
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                self.expr(func);
                self.exprs(args);
                self.keywords(keywords);
            }
            Expr::IfExp { test, body, orelse } => {
                self.expr(test);
                self.expr(body);
                self.expr(orelse);
            }
            Expr::Lambda { params, body } => {
                self.params(params);
                self.expr(body);
            }
            Expr::ListComp { elt, generators }
            | Expr::SetComp { elt, generators }
            | Expr::GeneratorExp { elt, generators } => {
                self.expr(elt);
                self.generators(generators);
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => {
                self.expr(key);
                self.expr(value);
                self.generators(generators);
            }
            Expr::Yield(value) => {
                if let Some(v) = value {
                    self.expr(v);
                }
            }
            Expr::NamedExpr { target, value } => {
                self.expr(target);
                self.expr(value);
            }
        }
    }
}

/// Hash of a block's canonical text, or [`EMPTY_HASH`] for an empty block.
pub fn canonical_hash(fragments: &[Fragment]) -> String {
    if fragments.is_empty() {
        return EMPTY_HASH.to_string();
    }

    let mut canonicalizer = Canonicalizer::new();
    let canonical: Vec<Fragment> = fragments
        .iter()
        .cloned()
        .map(|mut f| {
            canonicalizer.fragment(&mut f);
            f
        })
        .collect();

    let text = render(&canonical).unwrap_or_else(|_| format!("{:?}", canonical));

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn render(fragments: &[Fragment]) -> Result<String, std::fmt::Error> {
    let mut text = String::new();
    for (i, fragment) in fragments.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        write!(text, "{}", fragment)?;
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plagiarism::python::parse_module;

    fn block(source: &str) -> Vec<Fragment> {
        parse_module(source)
            .unwrap()
            .into_iter()
            .map(Fragment::Stmt)
            .collect()
    }

    fn canonical_text(source: &str) -> String {
        let mut canonicalizer = Canonicalizer::new();
        let mut fragments = block(source);
        fragments
            .iter_mut()
            .for_each(|f| canonicalizer.fragment(f));
        render(&fragments).unwrap()
    }

    #[test]
    fn test_renaming_does_not_change_hash() {
        let a = canonical_hash(&block("total = count + 1\nprint(total)\n"));
        let b = canonical_hash(&block("s = n + 1\nprint(s)\n"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_operator_change_changes_hash() {
        let a = canonical_hash(&block("x = a + b\n"));
        let b = canonical_hash(&block("x = a - b\n"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_literal_change_changes_hash() {
        let a = canonical_hash(&block("x = 1\ny = 1\n"));
        let b = canonical_hash(&block("x = 1\ny = 2\n"));
        assert_ne!(a, b);

        let c = canonical_hash(&block("x = None\n"));
        let d = canonical_hash(&block("x = 0\n"));
        assert_ne!(c, d);
    }

    #[test]
    fn test_placeholders_in_first_occurrence_order() {
        assert_eq!(
            canonical_text("n = int(input())\nm = n * 2\n"),
            "VAR_0 = VAR_1(VAR_2())\nVAR_3 = VAR_0 * 'CONST_0'"
        );
    }

    #[test]
    fn test_attribute_names_kept() {
        assert_eq!(
            canonical_text("data.append(x)\n"),
            "VAR_0.append(VAR_1)"
        );
    }

    #[test]
    fn test_function_and_params_renamed() {
        assert_eq!(
            canonical_text("def add(a, b):\n    return a + b\n"),
            "def VAR_0(VAR_1, VAR_2):\n    return VAR_1 + VAR_2"
        );
    }

    #[test]
    fn test_match_captures_and_literals_renamed() {
        assert_eq!(
            canonical_text("match cmd:\n    case Move(x=dx, y=0) | [dx, *_]:\n        pos += dx\n"),
            "match VAR_0:\n    case VAR_1(x=VAR_2, y='CONST_0') | [VAR_2, *_]:\n        VAR_3 += VAR_2"
        );
        let a = canonical_hash(&block("match n:\n    case 1:\n        r = 'one'\n    case _:\n        r = n\n"));
        let b = canonical_hash(&block("match k:\n    case 1:\n        out = 'one'\n    case _:\n        out = k\n"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_numbering_is_local_to_each_call() {
        let a = canonical_hash(&block("x = y\n"));
        let b = canonical_hash(&block("p = q\n"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_block_sentinel() {
        assert_eq!(canonical_hash(&[]), EMPTY_HASH);
    }
}
