//! Syntax tree for the supported Python subset

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprContext {
    Load,
    Store,
    Del,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Integer literal as written
    Int(String),
    Float(String),
    Complex(String),
    /// String literal(s) as written, adjacent pieces joined by a space
    Str(String),
    Bytes(String),
    Bool(bool),
    None,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::MatMult => "@",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
        }
    }

    /// Operator of an augmented assignment token such as `+=`
    pub fn from_augmented(op: &str) -> Option<Self> {
        let op = op.strip_suffix('=')?;
        Self::from_symbol(op)
    }

    pub fn from_symbol(op: &str) -> Option<Self> {
        Some(match op {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mult,
            "@" => BinOp::MatMult,
            "/" => BinOp::Div,
            "//" => BinOp::FloorDiv,
            "%" => BinOp::Mod,
            "**" => BinOp::Pow,
            "<<" => BinOp::LShift,
            ">>" => BinOp::RShift,
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "&" => BinOp::BitAnd,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Invert,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// `None` for `**mapping`
    pub arg: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub annotation: Option<Expr>,
}

/// One entry of a parameter list, in source order
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Plain { arg: Arg, default: Option<Expr> },
    /// `/`
    PosOnlyMarker,
    /// `*args`, or a bare `*` when `None`
    VarArgs(Option<Arg>),
    /// `**kwargs`
    KwArgs(Arg),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Literal(String),
    Formatted {
        value: Box<Expr>,
        /// `!r`, `!s` or `!a`
        conversion: Option<char>,
        /// Raw text after `:`
        format_spec: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name {
        id: String,
        ctx: ExprContext,
    },
    Constant(Constant),
    JoinedStr(Vec<FStringPart>),
    Attribute {
        value: Box<Expr>,
        attr: String,
        ctx: ExprContext,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
        ctx: ExprContext,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Starred {
        value: Box<Expr>,
        ctx: ExprContext,
    },
    Tuple {
        elts: Vec<Expr>,
        ctx: ExprContext,
    },
    List {
        elts: Vec<Expr>,
        ctx: ExprContext,
    },
    Set(Vec<Expr>),
    Dict {
        /// `None` key marks a `**spread` entry
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Await(Box<Expr>),
    Yield(Option<Box<Expr>>),
    YieldFrom(Box<Expr>),
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn name(id: impl Into<String>, ctx: ExprContext) -> Self {
        Expr::Name { id: id.into(), ctx }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context_expr: Expr,
    pub optional_vars: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub type_: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
}

/// Structural pattern of a `case` clause
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Literal or dotted name, compared with `==`
    Value(Expr),
    /// `None`, `True` or `False`, compared by identity
    Singleton(Constant),
    Sequence(Vec<Pattern>),
    Mapping {
        keys: Vec<Expr>,
        patterns: Vec<Pattern>,
        rest: Option<String>,
    },
    Class {
        cls: Expr,
        patterns: Vec<Pattern>,
        kwd_attrs: Vec<String>,
        kwd_patterns: Vec<Pattern>,
    },
    /// `*name` inside a sequence; `*_` has no name
    Star(Option<String>),
    /// A bare capture has no pattern, the wildcard `_` has neither
    As {
        pattern: Option<Box<Pattern>>,
        name: Option<String>,
    },
    Or(Vec<Pattern>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    FunctionDef {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
        returns: Option<Expr>,
        is_async: bool,
    },
    ClassDef {
        name: String,
        bases: Vec<Expr>,
        keywords: Vec<Keyword>,
        body: Vec<Stmt>,
        decorators: Vec<Expr>,
    },
    Return(Option<Expr>),
    Delete(Vec<Expr>),
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// `elif` chains nest as a single `If` in `orelse`
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Import(Vec<Alias>),
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        level: usize,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Match {
        subject: Expr,
        cases: Vec<MatchCase>,
    },
    Expr(Expr),
    Pass,
    Break,
    Continue,
}

/// Visit every `Name` reachable from a statement, nested bodies included.
pub fn walk_stmt_names<F>(stmt: &Stmt, f: &mut F)
where
    F: FnMut(&str, ExprContext),
{
    match stmt {
        Stmt::FunctionDef {
            params,
            body,
            decorators,
            returns,
            ..
        } => {
            decorators.iter().for_each(|d| walk_expr_names(d, f));
            walk_params_names(params, f);
            if let Some(r) = returns {
                walk_expr_names(r, f);
            }
            body.iter().for_each(|s| walk_stmt_names(s, f));
        }
        Stmt::ClassDef {
            bases,
            keywords,
            body,
            decorators,
            ..
        } => {
            decorators.iter().for_each(|d| walk_expr_names(d, f));
            bases.iter().for_each(|b| walk_expr_names(b, f));
            keywords.iter().for_each(|k| walk_expr_names(&k.value, f));
            body.iter().for_each(|s| walk_stmt_names(s, f));
        }
        Stmt::Return(value) => {
            if let Some(v) = value {
                walk_expr_names(v, f);
            }
        }
        Stmt::Delete(targets) => targets.iter().for_each(|t| walk_expr_names(t, f)),
        Stmt::Assign { targets, value } => {
            walk_expr_names(value, f);
            targets.iter().for_each(|t| walk_expr_names(t, f));
        }
        Stmt::AugAssign { target, value, .. } => {
            walk_expr_names(value, f);
            walk_expr_names(target, f);
        }
        Stmt::AnnAssign {
            target,
            annotation,
            value,
        } => {
            if let Some(v) = value {
                walk_expr_names(v, f);
            }
            walk_expr_names(annotation, f);
            walk_expr_names(target, f);
        }
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            walk_expr_names(iter, f);
            walk_expr_names(target, f);
            body.iter().chain(orelse).for_each(|s| walk_stmt_names(s, f));
        }
        Stmt::While { test, body, orelse } | Stmt::If { test, body, orelse } => {
            walk_expr_names(test, f);
            body.iter().chain(orelse).for_each(|s| walk_stmt_names(s, f));
        }
        Stmt::With { items, body, .. } => {
            for item in items {
                walk_expr_names(&item.context_expr, f);
                if let Some(v) = &item.optional_vars {
                    walk_expr_names(v, f);
                }
            }
            body.iter().for_each(|s| walk_stmt_names(s, f));
        }
        Stmt::Raise { exc, cause } => {
            exc.iter().chain(cause).for_each(|e| walk_expr_names(e, f));
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            body.iter().for_each(|s| walk_stmt_names(s, f));
            for handler in handlers {
                if let Some(t) = &handler.type_ {
                    walk_expr_names(t, f);
                }
                handler.body.iter().for_each(|s| walk_stmt_names(s, f));
            }
            orelse.iter().chain(finalbody).for_each(|s| walk_stmt_names(s, f));
        }
        Stmt::Assert { test, msg } => {
            walk_expr_names(test, f);
            if let Some(m) = msg {
                walk_expr_names(m, f);
            }
        }
        Stmt::Match { subject, cases } => {
            walk_expr_names(subject, f);
            for case in cases {
                walk_pattern_names(&case.pattern, f);
                if let Some(g) = &case.guard {
                    walk_expr_names(g, f);
                }
                case.body.iter().for_each(|s| walk_stmt_names(s, f));
            }
        }
        Stmt::Expr(e) => walk_expr_names(e, f),
        Stmt::Import(_)
        | Stmt::ImportFrom { .. }
        | Stmt::Global(_)
        | Stmt::Nonlocal(_)
        | Stmt::Pass
        | Stmt::Break
        | Stmt::Continue => {}
    }
}

/// Captures bind like assignment targets; value and class names are loads.
fn walk_pattern_names<F>(pattern: &Pattern, f: &mut F)
where
    F: FnMut(&str, ExprContext),
{
    match pattern {
        Pattern::Value(value) => walk_expr_names(value, f),
        Pattern::Singleton(_) | Pattern::Star(None) => {}
        Pattern::Star(Some(name)) => f(name, ExprContext::Store),
        Pattern::Sequence(patterns) | Pattern::Or(patterns) => {
            patterns.iter().for_each(|p| walk_pattern_names(p, f))
        }
        Pattern::Mapping {
            keys,
            patterns,
            rest,
        } => {
            keys.iter().for_each(|k| walk_expr_names(k, f));
            patterns.iter().for_each(|p| walk_pattern_names(p, f));
            if let Some(r) = rest {
                f(r, ExprContext::Store);
            }
        }
        Pattern::Class {
            cls,
            patterns,
            kwd_patterns,
            ..
        } => {
            walk_expr_names(cls, f);
            patterns
                .iter()
                .chain(kwd_patterns)
                .for_each(|p| walk_pattern_names(p, f));
        }
        Pattern::As { pattern, name } => {
            if let Some(p) = pattern {
                walk_pattern_names(p, f);
            }
            if let Some(n) = name {
                f(n, ExprContext::Store);
            }
        }
    }
}

fn walk_params_names<F>(params: &[Param], f: &mut F)
where
    F: FnMut(&str, ExprContext),
{
    for param in params {
        match param {
            Param::Plain { arg, default } => {
                if let Some(a) = &arg.annotation {
                    walk_expr_names(a, f);
                }
                if let Some(d) = default {
                    walk_expr_names(d, f);
                }
            }
            Param::VarArgs(Some(arg)) | Param::KwArgs(arg) => {
                if let Some(a) = &arg.annotation {
                    walk_expr_names(a, f);
                }
            }
            Param::VarArgs(None) | Param::PosOnlyMarker => {}
        }
    }
}

/// Visit every `Name` inside an expression, in evaluation-agnostic source order.
pub fn walk_expr_names<F>(expr: &Expr, f: &mut F)
where
    F: FnMut(&str, ExprContext),
{
    match expr {
        Expr::Name { id, ctx } => f(id, *ctx),
        Expr::Constant(_) => {}
        Expr::JoinedStr(parts) => {
            for part in parts {
                if let FStringPart::Formatted { value, .. } = part {
                    walk_expr_names(value, f);
                }
            }
        }
        Expr::Attribute { value, .. } => walk_expr_names(value, f),
        Expr::Subscript { value, slice, .. } => {
            walk_expr_names(value, f);
            walk_expr_names(slice, f);
        }
        Expr::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                walk_expr_names(part, f);
            }
        }
        Expr::Starred { value, .. } | Expr::Await(value) | Expr::YieldFrom(value) => {
            walk_expr_names(value, f)
        }
        Expr::Tuple { elts, .. } | Expr::List { elts, .. } | Expr::Set(elts) => {
            elts.iter().for_each(|e| walk_expr_names(e, f))
        }
        Expr::Dict { keys, values } => {
            for (key, value) in keys.iter().zip(values) {
                if let Some(k) = key {
                    walk_expr_names(k, f);
                }
                walk_expr_names(value, f);
            }
        }
        Expr::BinOp { left, right, .. } => {
            walk_expr_names(left, f);
            walk_expr_names(right, f);
        }
        Expr::UnaryOp { operand, .. } => walk_expr_names(operand, f),
        Expr::BoolOp { values, .. } => values.iter().for_each(|v| walk_expr_names(v, f)),
        Expr::Compare {
            left, comparators, ..
        } => {
            walk_expr_names(left, f);
            comparators.iter().for_each(|c| walk_expr_names(c, f));
        }
        Expr::Call {
            func,
            args,
            keywords,
        } => {
            walk_expr_names(func, f);
            args.iter().for_each(|a| walk_expr_names(a, f));
            keywords.iter().for_each(|k| walk_expr_names(&k.value, f));
        }
        Expr::IfExp { test, body, orelse } => {
            walk_expr_names(test, f);
            walk_expr_names(body, f);
            walk_expr_names(orelse, f);
        }
        Expr::Lambda { params, body } => {
            walk_params_names(params, f);
            walk_expr_names(body, f);
        }
        Expr::ListComp { elt, generators }
        | Expr::SetComp { elt, generators }
        | Expr::GeneratorExp { elt, generators } => {
            walk_generators(generators, f);
            walk_expr_names(elt, f);
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            walk_generators(generators, f);
            walk_expr_names(key, f);
            walk_expr_names(value, f);
        }
        Expr::Yield(value) => {
            if let Some(v) = value {
                walk_expr_names(v, f);
            }
        }
        Expr::NamedExpr { target, value } => {
            walk_expr_names(value, f);
            walk_expr_names(target, f);
        }
    }
}

fn walk_generators<F>(generators: &[Comprehension], f: &mut F)
where
    F: FnMut(&str, ExprContext),
{
    for generator in generators {
        walk_expr_names(&generator.iter, f);
        walk_expr_names(&generator.target, f);
        generator.ifs.iter().for_each(|i| walk_expr_names(i, f));
    }
}
