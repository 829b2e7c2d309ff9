//! Deterministic source rendering of syntax trees
//!
//! Parentheses are emitted from operator precedence alone, so two trees
//! that differ only in redundant grouping render identically.

use std::fmt::{self, Display, Formatter, Write};

use super::ast::*;

const INDENT: &str = "    ";

// Binding strength, loosest first
const YIELD: u8 = 1;
const NAMED: u8 = 2;
const TEST: u8 = 3;
const OR: u8 = 4;
const AND: u8 = 5;
const NOT: u8 = 6;
const CMP: u8 = 7;
const BOR: u8 = 8;
const BXOR: u8 = 9;
const BAND: u8 = 10;
const SHIFT: u8 = 11;
const ARITH: u8 = 12;
const TERM: u8 = 13;
const FACTOR: u8 = 14;
const POWER: u8 = 15;
const AWAIT: u8 = 16;
const ATOM: u8 = 17;

fn binop_precedence(op: BinOp) -> u8 {
    match op {
        BinOp::BitOr => BOR,
        BinOp::BitXor => BXOR,
        BinOp::BitAnd => BAND,
        BinOp::LShift | BinOp::RShift => SHIFT,
        BinOp::Add | BinOp::Sub => ARITH,
        BinOp::Mult | BinOp::MatMult | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => TERM,
        BinOp::Pow => POWER,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Yield(_) | Expr::YieldFrom(_) => YIELD,
        Expr::NamedExpr { .. } => NAMED,
        Expr::Lambda { .. } | Expr::IfExp { .. } => TEST,
        Expr::BoolOp { op: BoolOp::Or, .. } => OR,
        Expr::BoolOp { op: BoolOp::And, .. } => AND,
        Expr::UnaryOp { op: UnaryOp::Not, .. } => NOT,
        Expr::Compare { .. } => CMP,
        Expr::BinOp { op, .. } => binop_precedence(*op),
        Expr::UnaryOp { .. } => FACTOR,
        Expr::Await(_) => AWAIT,
        _ => ATOM,
    }
}

/// Render an expression
pub fn unparse_expr(expr: &Expr) -> String {
    expr.to_string()
}

/// Render a statement, nested bodies included, without a trailing newline
pub fn unparse_stmt(stmt: &Stmt) -> String {
    stmt.to_string()
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0)
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_pattern(f, self)
    }
}

struct Prec<'a>(&'a Expr, u8);

impl Display for Prec<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_expr(f, self.0, self.1)
    }
}

fn write_joined<W: Write>(out: &mut W, exprs: &[Expr], min: u8) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{}", Prec(e, min))?;
    }
    Ok(())
}

fn write_expr<W: Write>(out: &mut W, expr: &Expr, min: u8) -> fmt::Result {
    let wrap = precedence(expr) < min;
    if wrap {
        out.write_char('(')?;
    }
    write_expr_inner(out, expr)?;
    if wrap {
        out.write_char(')')?;
    }
    Ok(())
}

fn write_expr_inner<W: Write>(out: &mut W, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Name { id, .. } => out.write_str(id),
        Expr::Constant(c) => write_constant(out, c),
        Expr::JoinedStr(parts) => write_fstring(out, parts),
        Expr::Attribute { value, attr, .. } => {
            write!(out, "{}.{}", Prec(value, ATOM), attr)
        }
        Expr::Subscript { value, slice, .. } => {
            write!(out, "{}[", Prec(value, ATOM))?;
            match &**slice {
                Expr::Tuple { elts, .. } if !elts.is_empty() => {
                    write_joined(out, elts, TEST)?;
                    if elts.len() == 1 {
                        out.write_char(',')?;
                    }
                }
                other => write_expr(out, other, TEST)?,
            }
            out.write_char(']')
        }
        Expr::Slice { lower, upper, step } => {
            if let Some(l) = lower {
                write_expr(out, l, TEST)?;
            }
            out.write_char(':')?;
            if let Some(u) = upper {
                write_expr(out, u, TEST)?;
            }
            if let Some(s) = step {
                out.write_char(':')?;
                write_expr(out, s, TEST)?;
            }
            Ok(())
        }
        Expr::Starred { value, .. } => write!(out, "*{}", Prec(value, BOR)),
        Expr::Tuple { elts, .. } => {
            out.write_char('(')?;
            write_joined(out, elts, TEST)?;
            if elts.len() == 1 {
                out.write_char(',')?;
            }
            out.write_char(')')
        }
        Expr::List { elts, .. } => {
            out.write_char('[')?;
            write_joined(out, elts, TEST)?;
            out.write_char(']')
        }
        Expr::Set(elts) => {
            if elts.is_empty() {
                return out.write_str("{*()}");
            }
            out.write_char('{')?;
            write_joined(out, elts, TEST)?;
            out.write_char('}')
        }
        Expr::Dict { keys, values } => {
            out.write_char('{')?;
            for (i, (key, value)) in keys.iter().zip(values).enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                match key {
                    Some(k) => write!(out, "{}: {}", Prec(k, TEST), Prec(value, TEST))?,
                    None => write!(out, "**{}", Prec(value, BOR))?,
                }
            }
            out.write_char('}')
        }
        Expr::BinOp { left, op, right } => {
            let p = binop_precedence(*op);
            // `**` groups to the right, everything else to the left
            let (lp, rp) = if *op == BinOp::Pow {
                (p + 1, FACTOR)
            } else {
                (p, p + 1)
            };
            write!(out, "{} {} {}", Prec(left, lp), op.symbol(), Prec(right, rp))
        }
        Expr::UnaryOp { op, operand } => match op {
            UnaryOp::Not => write!(out, "not {}", Prec(operand, NOT)),
            UnaryOp::Invert => write!(out, "~{}", Prec(operand, FACTOR)),
            UnaryOp::UAdd => write!(out, "+{}", Prec(operand, FACTOR)),
            UnaryOp::USub => write!(out, "-{}", Prec(operand, FACTOR)),
        },
        Expr::BoolOp { op, values } => {
            let (word, p) = match op {
                BoolOp::And => ("and", AND),
                BoolOp::Or => ("or", OR),
            };
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(out, " {} ", word)?;
                }
                write_expr(out, v, p + 1)?;
            }
            Ok(())
        }
        Expr::Compare {
            left,
            ops,
            comparators,
        } => {
            write_expr(out, left, CMP + 1)?;
            for (op, c) in ops.iter().zip(comparators) {
                write!(out, " {} {}", op.symbol(), Prec(c, CMP + 1))?;
            }
            Ok(())
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            write!(out, "{}(", Prec(func, ATOM))?;
            let mut first = true;
            for arg in args {
                if !first {
                    out.write_str(", ")?;
                }
                first = false;
                write_expr(out, arg, TEST)?;
            }
            for kw in keywords {
                if !first {
                    out.write_str(", ")?;
                }
                first = false;
                match &kw.arg {
                    Some(name) => write!(out, "{}={}", name, Prec(&kw.value, TEST))?,
                    None => write!(out, "**{}", Prec(&kw.value, BOR))?,
                }
            }
            out.write_char(')')
        }
        Expr::IfExp { test, body, orelse } => write!(
            out,
            "{} if {} else {}",
            Prec(body, OR),
            Prec(test, OR),
            Prec(orelse, TEST)
        ),
        Expr::Lambda { params, body } => {
            out.write_str("lambda")?;
            if !params.is_empty() {
                out.write_char(' ')?;
                write_params(out, params)?;
            }
            write!(out, ": {}", Prec(body, TEST))
        }
        Expr::ListComp { elt, generators } => {
            write!(out, "[{}", Prec(elt, TEST))?;
            write_generators(out, generators)?;
            out.write_char(']')
        }
        Expr::SetComp { elt, generators } => {
            write!(out, "{{{}", Prec(elt, TEST))?;
            write_generators(out, generators)?;
            out.write_char('}')
        }
        Expr::GeneratorExp { elt, generators } => {
            write!(out, "({}", Prec(elt, TEST))?;
            write_generators(out, generators)?;
            out.write_char(')')
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            write!(out, "{{{}: {}", Prec(key, TEST), Prec(value, TEST))?;
            write_generators(out, generators)?;
            out.write_char('}')
        }
        Expr::Await(value) => write!(out, "await {}", Prec(value, ATOM)),
        Expr::Yield(value) => match value {
            Some(v) => write!(out, "yield {}", Prec(v, TEST)),
            None => out.write_str("yield"),
        },
        Expr::YieldFrom(value) => write!(out, "yield from {}", Prec(value, TEST)),
        Expr::NamedExpr { target, value } => {
            write!(out, "{} := {}", Prec(target, ATOM), Prec(value, NAMED + 1))
        }
    }
}

fn write_constant<W: Write>(out: &mut W, constant: &Constant) -> fmt::Result {
    match constant {
        Constant::Int(s)
        | Constant::Float(s)
        | Constant::Complex(s)
        | Constant::Str(s)
        | Constant::Bytes(s) => out.write_str(s),
        Constant::Bool(true) => out.write_str("True"),
        Constant::Bool(false) => out.write_str("False"),
        Constant::None => out.write_str("None"),
        Constant::Ellipsis => out.write_str("..."),
    }
}

fn write_fstring<W: Write>(out: &mut W, parts: &[FStringPart]) -> fmt::Result {
    out.write_str("f\"")?;
    for part in parts {
        match part {
            FStringPart::Literal(text) => {
                for c in text.chars() {
                    match c {
                        '{' => out.write_str("{{")?,
                        '}' => out.write_str("}}")?,
                        c => out.write_char(c)?,
                    }
                }
            }
            FStringPart::Formatted {
                value,
                conversion,
                format_spec,
            } => {
                write!(out, "{{{}", Prec(value, TEST + 1))?;
                if let Some(c) = conversion {
                    write!(out, "!{}", c)?;
                }
                if let Some(spec) = format_spec {
                    write!(out, ":{}", spec)?;
                }
                out.write_char('}')?;
            }
        }
    }
    out.write_char('"')
}

fn write_generators<W: Write>(out: &mut W, generators: &[Comprehension]) -> fmt::Result {
    for generator in generators {
        if generator.is_async {
            out.write_str(" async")?;
        }
        write!(
            out,
            " for {} in {}",
            Prec(&generator.target, TEST),
            Prec(&generator.iter, OR)
        )?;
        for cond in &generator.ifs {
            write!(out, " if {}", Prec(cond, OR))?;
        }
    }
    Ok(())
}

fn write_arg<W: Write>(out: &mut W, arg: &Arg) -> fmt::Result {
    out.write_str(&arg.name)?;
    if let Some(a) = &arg.annotation {
        write!(out, ": {}", Prec(a, TEST))?;
    }
    Ok(())
}

fn write_params<W: Write>(out: &mut W, params: &[Param]) -> fmt::Result {
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        match param {
            Param::Plain { arg, default } => {
                write_arg(out, arg)?;
                if let Some(d) = default {
                    let sep = if arg.annotation.is_some() { " = " } else { "=" };
                    write!(out, "{}{}", sep, Prec(d, TEST))?;
                }
            }
            Param::PosOnlyMarker => out.write_char('/')?,
            Param::VarArgs(None) => out.write_char('*')?,
            Param::VarArgs(Some(arg)) => {
                out.write_char('*')?;
                write_arg(out, arg)?;
            }
            Param::KwArgs(arg) => {
                out.write_str("**")?;
                write_arg(out, arg)?;
            }
        }
    }
    Ok(())
}

fn write_indent<W: Write>(out: &mut W, level: usize) -> fmt::Result {
    for _ in 0..level {
        out.write_str(INDENT)?;
    }
    Ok(())
}

fn write_body<W: Write>(out: &mut W, body: &[Stmt], level: usize) -> fmt::Result {
    for stmt in body {
        out.write_char('\n')?;
        write_stmt(out, stmt, level)?;
    }
    Ok(())
}

fn write_decorators<W: Write>(out: &mut W, decorators: &[Expr], level: usize) -> fmt::Result {
    for d in decorators {
        write!(out, "@{}\n", Prec(d, TEST))?;
        write_indent(out, level)?;
    }
    Ok(())
}

fn write_stmt<W: Write>(out: &mut W, stmt: &Stmt, level: usize) -> fmt::Result {
    write_indent(out, level)?;
    match stmt {
        Stmt::FunctionDef {
            name,
            params,
            body,
            decorators,
            returns,
            is_async,
        } => {
            write_decorators(out, decorators, level)?;
            if *is_async {
                out.write_str("async ")?;
            }
            write!(out, "def {}(", name)?;
            write_params(out, params)?;
            out.write_char(')')?;
            if let Some(r) = returns {
                write!(out, " -> {}", Prec(r, TEST))?;
            }
            out.write_char(':')?;
            write_body(out, body, level + 1)
        }
        Stmt::ClassDef {
            name,
            bases,
            keywords,
            body,
            decorators,
        } => {
            write_decorators(out, decorators, level)?;
            write!(out, "class {}", name)?;
            if !bases.is_empty() || !keywords.is_empty() {
                out.write_char('(')?;
                write_joined(out, bases, TEST)?;
                for (i, kw) in keywords.iter().enumerate() {
                    if i > 0 || !bases.is_empty() {
                        out.write_str(", ")?;
                    }
                    match &kw.arg {
                        Some(name) => write!(out, "{}={}", name, Prec(&kw.value, TEST))?,
                        None => write!(out, "**{}", Prec(&kw.value, BOR))?,
                    }
                }
                out.write_char(')')?;
            }
            out.write_char(':')?;
            write_body(out, body, level + 1)
        }
        Stmt::Return(value) => match value {
            Some(v) => write!(out, "return {}", v),
            None => out.write_str("return"),
        },
        Stmt::Delete(targets) => {
            out.write_str("del ")?;
            write_joined(out, targets, TEST)
        }
        Stmt::Assign { targets, value } => {
            for t in targets {
                write!(out, "{} = ", t)?;
            }
            write!(out, "{}", value)
        }
        Stmt::AugAssign { target, op, value } => {
            write!(out, "{} {}= {}", target, op.symbol(), value)
        }
        Stmt::AnnAssign {
            target,
            annotation,
            value,
        } => {
            write!(out, "{}: {}", target, Prec(annotation, TEST))?;
            if let Some(v) = value {
                write!(out, " = {}", v)?;
            }
            Ok(())
        }
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        } => {
            if *is_async {
                out.write_str("async ")?;
            }
            write!(out, "for {} in {}:", target, iter)?;
            write_body(out, body, level + 1)?;
            write_else(out, orelse, level)
        }
        Stmt::While { test, body, orelse } => {
            write!(out, "while {}:", test)?;
            write_body(out, body, level + 1)?;
            write_else(out, orelse, level)
        }
        Stmt::If { test, body, orelse } => {
            write!(out, "if {}:", test)?;
            write_body(out, body, level + 1)?;
            write_else(out, orelse, level)
        }
        Stmt::With {
            items,
            body,
            is_async,
        } => {
            if *is_async {
                out.write_str("async ")?;
            }
            out.write_str("with ")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_expr(out, &item.context_expr, TEST)?;
                if let Some(v) = &item.optional_vars {
                    write!(out, " as {}", v)?;
                }
            }
            out.write_char(':')?;
            write_body(out, body, level + 1)
        }
        Stmt::Raise { exc, cause } => {
            out.write_str("raise")?;
            if let Some(e) = exc {
                write!(out, " {}", e)?;
            }
            if let Some(c) = cause {
                write!(out, " from {}", c)?;
            }
            Ok(())
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            out.write_str("try:")?;
            write_body(out, body, level + 1)?;
            for handler in handlers {
                out.write_char('\n')?;
                write_indent(out, level)?;
                out.write_str("except")?;
                if let Some(t) = &handler.type_ {
                    write!(out, " {}", t)?;
                }
                if let Some(name) = &handler.name {
                    write!(out, " as {}", name)?;
                }
                out.write_char(':')?;
                write_body(out, &handler.body, level + 1)?;
            }
            write_else(out, orelse, level)?;
            if !finalbody.is_empty() {
                out.write_char('\n')?;
                write_indent(out, level)?;
                out.write_str("finally:")?;
                write_body(out, finalbody, level + 1)?;
            }
            Ok(())
        }
        Stmt::Assert { test, msg } => {
            write!(out, "assert {}", test)?;
            if let Some(m) = msg {
                write!(out, ", {}", m)?;
            }
            Ok(())
        }
        Stmt::Import(names) => {
            out.write_str("import ")?;
            write_aliases(out, names)
        }
        Stmt::ImportFrom {
            module,
            names,
            level: dots,
        } => {
            out.write_str("from ")?;
            for _ in 0..*dots {
                out.write_char('.')?;
            }
            if let Some(m) = module {
                out.write_str(m)?;
            }
            out.write_str(" import ")?;
            write_aliases(out, names)
        }
        Stmt::Global(names) => write!(out, "global {}", names.join(", ")),
        Stmt::Nonlocal(names) => write!(out, "nonlocal {}", names.join(", ")),
        Stmt::Match { subject, cases } => {
            write!(out, "match {}:", subject)?;
            for case in cases {
                out.write_char('\n')?;
                write_indent(out, level + 1)?;
                write!(out, "case {}", case.pattern)?;
                if let Some(g) = &case.guard {
                    write!(out, " if {}", g)?;
                }
                out.write_char(':')?;
                write_body(out, &case.body, level + 2)?;
            }
            Ok(())
        }
        Stmt::Expr(e) => write!(out, "{}", e),
        Stmt::Pass => out.write_str("pass"),
        Stmt::Break => out.write_str("break"),
        Stmt::Continue => out.write_str("continue"),
    }
}

/// Sequences always render bracketed
fn write_pattern<W: Write>(out: &mut W, pattern: &Pattern) -> fmt::Result {
    match pattern {
        Pattern::Value(value) => write!(out, "{}", value),
        Pattern::Singleton(constant) => write_constant(out, constant),
        Pattern::Sequence(patterns) => {
            out.write_char('[')?;
            write_patterns(out, patterns)?;
            out.write_char(']')
        }
        Pattern::Mapping {
            keys,
            patterns,
            rest,
        } => {
            out.write_char('{')?;
            for (i, (key, value)) in keys.iter().zip(patterns).enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{}: {}", key, value)?;
            }
            if let Some(r) = rest {
                if !keys.is_empty() {
                    out.write_str(", ")?;
                }
                write!(out, "**{}", r)?;
            }
            out.write_char('}')
        }
        Pattern::Class {
            cls,
            patterns,
            kwd_attrs,
            kwd_patterns,
        } => {
            write!(out, "{}(", cls)?;
            write_patterns(out, patterns)?;
            for (i, (attr, value)) in kwd_attrs.iter().zip(kwd_patterns).enumerate() {
                if i > 0 || !patterns.is_empty() {
                    out.write_str(", ")?;
                }
                write!(out, "{}={}", attr, value)?;
            }
            out.write_char(')')
        }
        Pattern::Star(name) => write!(out, "*{}", name.as_deref().unwrap_or("_")),
        Pattern::As { pattern, name } => match (pattern, name) {
            (Some(p), Some(n)) => {
                write_alternative(out, p)?;
                write!(out, " as {}", n)
            }
            (Some(p), None) => write_pattern(out, p),
            (None, Some(n)) => out.write_str(n),
            (None, None) => out.write_char('_'),
        },
        Pattern::Or(patterns) => {
            for (i, p) in patterns.iter().enumerate() {
                if i > 0 {
                    out.write_str(" | ")?;
                }
                write_alternative(out, p)?;
            }
            Ok(())
        }
    }
}

fn write_patterns<W: Write>(out: &mut W, patterns: &[Pattern]) -> fmt::Result {
    for (i, p) in patterns.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_pattern(out, p)?;
    }
    Ok(())
}

/// Operand of `|` or `as`, parenthesized when it binds looser
fn write_alternative<W: Write>(out: &mut W, pattern: &Pattern) -> fmt::Result {
    let wrap = matches!(
        pattern,
        Pattern::Or(_)
            | Pattern::As {
                pattern: Some(_),
                ..
            }
    );
    if wrap {
        out.write_char('(')?;
    }
    write_pattern(out, pattern)?;
    if wrap {
        out.write_char(')')?;
    }
    Ok(())
}

/// `else` arm of if/for/while/try; an `elif` chain renders as nested `if`
fn write_else<W: Write>(out: &mut W, orelse: &[Stmt], level: usize) -> fmt::Result {
    if orelse.is_empty() {
        return Ok(());
    }
    out.write_char('\n')?;
    write_indent(out, level)?;
    out.write_str("else:")?;
    write_body(out, orelse, level + 1)
}

fn write_aliases<W: Write>(out: &mut W, names: &[Alias]) -> fmt::Result {
    for (i, alias) in names.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        out.write_str(&alias.name)?;
        if let Some(a) = &alias.asname {
            write!(out, " as {}", a)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::parser::{parse_expression, parse_module};
    use super::*;

    fn expr(source: &str) -> String {
        unparse_expr(&parse_expression(source).unwrap())
    }

    #[test]
    fn test_redundant_parentheses_dropped() {
        assert_eq!(expr("(a + b) + c"), "a + b + c");
        assert_eq!(expr("a + (b * c)"), "a + b * c");
        assert_eq!(expr("((x))"), "x");
    }

    #[test]
    fn test_required_parentheses_kept() {
        assert_eq!(expr("(a + b) * c"), "(a + b) * c");
        assert_eq!(expr("a - (b - c)"), "a - (b - c)");
        assert_eq!(expr("(-2) ** 2"), "(-2) ** 2");
        assert_eq!(expr("2 ** 3 ** 2"), "2 ** 3 ** 2");
        assert_eq!(expr("(2 ** 3) ** 2"), "(2 ** 3) ** 2");
        assert_eq!(expr("not (a and b)"), "not (a and b)");
    }

    #[test]
    fn test_calls_and_containers() {
        assert_eq!(expr("f(x, *rest, key=1, **kw)"), "f(x, *rest, key=1, **kw)");
        assert_eq!(expr("a, b"), "(a, b)");
        assert_eq!(expr("[i * i for i in range(n) if i % 2]"), "[i * i for i in range(n) if i % 2]");
        assert_eq!(expr("{'k': v, **other}"), "{'k': v, **other}");
        assert_eq!(expr("m[1:2, ::3]"), "m[1:2, ::3]");
        assert_eq!(expr("lambda x, y=2: x + y"), "lambda x, y=2: x + y");
        assert_eq!(expr("a if c else b"), "a if c else b");
    }

    #[test]
    fn test_statement_rendering() {
        let source = "def f(a, b):\n    if a > b:\n        return a\n    else:\n        return b\n";
        let body = parse_module(source).unwrap();
        assert_eq!(unparse_stmt(&body[0]), source.trim_end());
    }

    #[test]
    fn test_rendering_is_stable() {
        let source = "for k, v in sorted(d.items()):\n    total += v * 2\n";
        let first = parse_module(source).unwrap();
        let rendered: Vec<String> = first.iter().map(unparse_stmt).collect();
        let second = parse_module(&(rendered.join("\n") + "\n")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_match_rendering() {
        let source = "match point:
    case Point(0, y=[a, *rest]) | None if a > 0:
        print(a)
    case {'k': (1 | 2) as v, **other}:
        pass
    case _:
        pass";
        let first = parse_module(&(source.to_string() + "\n")).unwrap();
        assert_eq!(unparse_stmt(&first[0]), source);

        let second = parse_module("match x:\n    case (a, b):\n        pass\n").unwrap();
        assert_eq!(
            unparse_stmt(&second[0]),
            "match x:\n    case [a, b]:\n        pass"
        );
    }

    #[test]
    fn test_fstring_rendering() {
        assert_eq!(expr("f'{a + 1:>4} {{x}}'"), "f\"{a + 1:>4} {{x}}\"");
    }
}
