//! Recursive-descent parser producing [`Stmt`] trees

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use super::ParseError;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with",
    "yield",
];

/// Binary operator tiers from loosest to tightest binding
const BINARY_LEVELS: &[&[&str]] = &[
    &["|"],
    &["^"],
    &["&"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "//", "%", "@"],
];

/// Parse a whole module
pub fn parse_module(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).module()
}

/// Parse a standalone expression such as the body of an f-string field
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.testlist_star()?;
    parser.expect_newline()?;
    if !matches!(parser.peek(), TokenKind::EndMarker) {
        return Err(parser.error_here("unexpected trailing tokens"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    // --- token helpers ---

    fn token_at(&self, offset: usize) -> Option<&Token> {
        let index = (self.pos + offset).min(self.tokens.len().saturating_sub(1));
        self.tokens.get(index)
    }

    fn peek(&self) -> &TokenKind {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        self.token_at(n).map(|t| &t.kind).unwrap_or(&TokenKind::EndMarker)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let (line, col) = self.token_at(0).map(|t| (t.line, t.col)).unwrap_or((0, 0));
        ParseError::new(message, line, col)
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), TokenKind::Op(o) if *o == op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        is_keyword(self.peek(), keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), ParseError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{}'", op)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{}'", keyword)))
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            TokenKind::Name(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here("expected identifier")),
        }
    }

    fn expect_newline(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error_here("invalid syntax")),
        }
    }

    /// Whether the current token can begin an expression
    fn starts_expr(&self) -> bool {
        match self.peek() {
            TokenKind::Name(name) => {
                !KEYWORDS.contains(&name.as_str())
                    || matches!(
                        name.as_str(),
                        "True" | "False" | "None" | "not" | "lambda" | "await"
                    )
            }
            TokenKind::Number(_) | TokenKind::Str(_) => true,
            TokenKind::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."),
            _ => false,
        }
    }

    fn at_comprehension(&self) -> bool {
        self.at_keyword("for")
            || (self.at_keyword("async") && is_keyword(self.peek_nth(1), "for"))
    }

    /// Re-tag an expression as an assignment or deletion target
    fn set_ctx(&self, expr: Expr, ctx: ExprContext) -> Result<Expr, ParseError> {
        Ok(match expr {
            Expr::Name { id, .. } => Expr::Name { id, ctx },
            Expr::Attribute { value, attr, .. } => Expr::Attribute { value, attr, ctx },
            Expr::Subscript { value, slice, .. } => Expr::Subscript { value, slice, ctx },
            Expr::Starred { value, .. } => Expr::Starred {
                value: Box::new(self.set_ctx(*value, ctx)?),
                ctx,
            },
            Expr::Tuple { elts, .. } => Expr::Tuple {
                elts: self.set_ctx_all(elts, ctx)?,
                ctx,
            },
            Expr::List { elts, .. } => Expr::List {
                elts: self.set_ctx_all(elts, ctx)?,
                ctx,
            },
            _ => return Err(self.error_here("cannot assign to expression")),
        })
    }

    fn set_ctx_all(&self, elts: Vec<Expr>, ctx: ExprContext) -> Result<Vec<Expr>, ParseError> {
        elts.into_iter().map(|e| self.set_ctx(e, ctx)).collect()
    }

    // --- statements ---

    fn module(mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.advance();
                }
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    fn statement(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let keyword = match self.peek() {
            TokenKind::Name(name) => name.clone(),
            TokenKind::Op("@") => return Ok(vec![self.decorated()?]),
            _ => return self.simple_stmts(),
        };

        let stmt = match keyword.as_str() {
            "if" => self.if_stmt()?,
            "while" => self.while_stmt()?,
            "for" => self.for_stmt(false)?,
            "try" => self.try_stmt()?,
            "with" => self.with_stmt(false)?,
            "def" => self.function_def(Vec::new(), false)?,
            "class" => self.class_def(Vec::new())?,
            "match" => match self.match_stmt()? {
                Some(stmt) => stmt,
                None => return self.simple_stmts(),
            },
            "async" => {
                self.advance();
                match self.peek() {
                    kind if is_keyword(kind, "def") => self.function_def(Vec::new(), true)?,
                    kind if is_keyword(kind, "for") => self.for_stmt(true)?,
                    kind if is_keyword(kind, "with") => self.with_stmt(true)?,
                    _ => return Err(self.error_here("expected 'def', 'for' or 'with' after 'async'")),
                }
            }
            _ => return self.simple_stmts(),
        };
        Ok(vec![stmt])
    }

    fn simple_stmts(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = vec![self.small_stmt()?];
        while self.eat_op(";") {
            if matches!(self.peek(), TokenKind::Newline) {
                break;
            }
            stmts.push(self.small_stmt()?);
        }
        self.expect_newline()?;
        Ok(stmts)
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_op(":")?;
        if !matches!(self.peek(), TokenKind::Newline) {
            return self.simple_stmts();
        }
        self.advance();
        if !matches!(self.peek(), TokenKind::Indent) {
            return Err(self.error_here("expected an indented block"));
        }
        self.advance();

        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.advance();
                }
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    /// `if` or `elif`; the keyword itself is consumed here
    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let test = self.test()?;
        let body = self.block()?;
        let orelse = if self.at_keyword("elif") {
            vec![self.if_stmt()?]
        } else if self.eat_keyword("else") {
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { test, body, orelse })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("while")?;
        let test = self.test()?;
        let body = self.block()?;
        let orelse = self.else_block()?;
        Ok(Stmt::While { test, body, orelse })
    }

    fn for_stmt(&mut self, is_async: bool) -> Result<Stmt, ParseError> {
        self.expect_keyword("for")?;
        let target = self.exprlist()?;
        let target = self.set_ctx(target, ExprContext::Store)?;
        self.expect_keyword("in")?;
        let iter = self.testlist_star()?;
        let body = self.block()?;
        let orelse = self.else_block()?;
        Ok(Stmt::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        })
    }

    fn else_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.eat_keyword("else") {
            self.block()
        } else {
            Ok(Vec::new())
        }
    }

    fn try_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("try")?;
        let body = self.block()?;

        let mut handlers = Vec::new();
        while self.eat_keyword("except") {
            let (type_, name) = if self.at_op(":") {
                (None, None)
            } else {
                let type_ = self.test()?;
                let name = if self.eat_keyword("as") {
                    Some(self.expect_name()?)
                } else {
                    None
                };
                (Some(type_), name)
            };
            let body = self.block()?;
            handlers.push(ExceptHandler { type_, name, body });
        }

        let orelse = if !handlers.is_empty() {
            self.else_block()?
        } else {
            Vec::new()
        };
        let finalbody = if self.eat_keyword("finally") {
            self.block()?
        } else {
            Vec::new()
        };

        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error_here("expected 'except' or 'finally' block"));
        }
        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn with_stmt(&mut self, is_async: bool) -> Result<Stmt, ParseError> {
        self.expect_keyword("with")?;
        let mut items = Vec::new();
        loop {
            let context_expr = self.test()?;
            let optional_vars = if self.eat_keyword("as") {
                let target = self.star_or_expr()?;
                Some(self.set_ctx(target, ExprContext::Store)?)
            } else {
                None
            };
            items.push(WithItem {
                context_expr,
                optional_vars,
            });
            if !self.eat_op(",") {
                break;
            }
        }
        let body = self.block()?;
        Ok(Stmt::With {
            items,
            body,
            is_async,
        })
    }

    /// `match` is a soft keyword. A line that does not read as a match
    /// header is rewound and left to the simple statement parser.
    fn match_stmt(&mut self) -> Result<Option<Stmt>, ParseError> {
        let start = self.pos;
        self.advance();
        let subject = match self.testlist_star() {
            Ok(subject) if self.at_op(":") && matches!(self.peek_nth(1), TokenKind::Newline) => {
                subject
            }
            _ => {
                self.pos = start;
                return Ok(None);
            }
        };
        self.expect_op(":")?;
        self.expect_newline()?;
        if !matches!(self.peek(), TokenKind::Indent) {
            return Err(self.error_here("expected an indented block"));
        }
        self.advance();

        let mut cases = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.advance();
                }
                kind if is_keyword(kind, "case") => cases.push(self.match_case()?),
                _ => return Err(self.error_here("expected 'case' block")),
            }
        }
        if cases.is_empty() {
            return Err(self.error_here("expected 'case' block"));
        }
        Ok(Some(Stmt::Match { subject, cases }))
    }

    fn match_case(&mut self) -> Result<MatchCase, ParseError> {
        self.advance();
        let pattern = self.case_patterns()?;
        let guard = if self.eat_keyword("if") {
            Some(self.test()?)
        } else {
            None
        };
        let body = self.block()?;
        Ok(MatchCase {
            pattern,
            guard,
            body,
        })
    }

    /// Top-level `case` pattern; a bare comma list is a sequence
    fn case_patterns(&mut self) -> Result<Pattern, ParseError> {
        let first = self.maybe_star_pattern()?;
        if !self.at_op(",") {
            if matches!(first, Pattern::Star(_)) {
                return Err(self.error_here("starred pattern outside a sequence"));
            }
            return Ok(first);
        }
        let mut patterns = vec![first];
        while self.eat_op(",") {
            if self.at_op(":") || self.at_keyword("if") {
                break;
            }
            patterns.push(self.maybe_star_pattern()?);
        }
        Ok(Pattern::Sequence(patterns))
    }

    fn maybe_star_pattern(&mut self) -> Result<Pattern, ParseError> {
        if self.eat_op("*") {
            let name = self.expect_name()?;
            return Ok(Pattern::Star((name != "_").then_some(name)));
        }
        self.pattern()
    }

    /// `closed ('|' closed)* ['as' NAME]`
    fn pattern(&mut self) -> Result<Pattern, ParseError> {
        let mut alternatives = vec![self.closed_pattern()?];
        while self.eat_op("|") {
            alternatives.push(self.closed_pattern()?);
        }
        let pattern = if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Pattern::Or(alternatives)
        };

        if !self.eat_keyword("as") {
            return Ok(pattern);
        }
        let name = self.expect_name()?;
        if name == "_" {
            return Err(self.error_here("cannot use '_' as a target"));
        }
        Ok(Pattern::As {
            pattern: Some(Box::new(pattern)),
            name: Some(name),
        })
    }

    fn closed_pattern(&mut self) -> Result<Pattern, ParseError> {
        match self.peek().clone() {
            // signed and complex literals included
            TokenKind::Number(_) | TokenKind::Op("-") => Ok(Pattern::Value(self.binary_level(4)?)),
            TokenKind::Str(_) => Ok(Pattern::Value(self.strings()?)),
            TokenKind::Op("(") => {
                self.advance();
                let (mut patterns, trailing_comma) = self.pattern_items(")")?;
                self.expect_op(")")?;
                if patterns.len() == 1 && !trailing_comma && !matches!(patterns[0], Pattern::Star(_))
                {
                    return Ok(patterns.remove(0));
                }
                Ok(Pattern::Sequence(patterns))
            }
            TokenKind::Op("[") => {
                self.advance();
                let (patterns, _) = self.pattern_items("]")?;
                self.expect_op("]")?;
                Ok(Pattern::Sequence(patterns))
            }
            TokenKind::Op("{") => self.mapping_pattern(),
            TokenKind::Name(name) => match name.as_str() {
                "None" => {
                    self.advance();
                    Ok(Pattern::Singleton(Constant::None))
                }
                "True" | "False" => {
                    self.advance();
                    Ok(Pattern::Singleton(Constant::Bool(name == "True")))
                }
                "_" => {
                    self.advance();
                    Ok(Pattern::As {
                        pattern: None,
                        name: None,
                    })
                }
                _ => self.name_pattern(),
            },
            _ => Err(self.error_here("invalid pattern")),
        }
    }

    /// Comma-separated patterns up to `closing`, and whether a comma trailed
    fn pattern_items(&mut self, closing: &str) -> Result<(Vec<Pattern>, bool), ParseError> {
        let mut patterns = Vec::new();
        let mut trailing_comma = false;
        while !self.at_op(closing) {
            patterns.push(self.maybe_star_pattern()?);
            trailing_comma = self.eat_op(",");
            if !trailing_comma {
                break;
            }
        }
        Ok((patterns, trailing_comma))
    }

    /// Capture, dotted value or class pattern
    fn name_pattern(&mut self) -> Result<Pattern, ParseError> {
        let name = self.expect_name()?;
        let mut dotted = false;
        let mut expr = Expr::name(name.clone(), ExprContext::Load);
        while self.eat_op(".") {
            dotted = true;
            let attr = self.expect_name()?;
            expr = Expr::Attribute {
                value: Box::new(expr),
                attr,
                ctx: ExprContext::Load,
            };
        }

        if self.eat_op("(") {
            let pattern = self.class_pattern(expr)?;
            self.expect_op(")")?;
            return Ok(pattern);
        }
        Ok(if dotted {
            Pattern::Value(expr)
        } else {
            Pattern::As {
                pattern: None,
                name: Some(name),
            }
        })
    }

    fn class_pattern(&mut self, cls: Expr) -> Result<Pattern, ParseError> {
        let mut patterns = Vec::new();
        let mut kwd_attrs = Vec::new();
        let mut kwd_patterns = Vec::new();
        while !self.at_op(")") {
            if matches!(self.peek(), TokenKind::Name(_)) && matches!(self.peek_nth(1), TokenKind::Op("=")) {
                kwd_attrs.push(self.expect_name()?);
                self.advance();
                kwd_patterns.push(self.pattern()?);
            } else if kwd_attrs.is_empty() {
                patterns.push(self.pattern()?);
            } else {
                return Err(self.error_here("positional patterns follow keyword patterns"));
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(Pattern::Class {
            cls,
            patterns,
            kwd_attrs,
            kwd_patterns,
        })
    }

    fn mapping_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.expect_op("{")?;
        let mut keys = Vec::new();
        let mut patterns = Vec::new();
        let mut rest = None;
        while !self.at_op("}") {
            if self.eat_op("**") {
                rest = Some(self.expect_name()?);
                self.eat_op(",");
                break;
            }
            keys.push(self.mapping_key()?);
            self.expect_op(":")?;
            patterns.push(self.pattern()?);
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(Pattern::Mapping {
            keys,
            patterns,
            rest,
        })
    }

    fn mapping_key(&mut self) -> Result<Expr, ParseError> {
        match self.closed_pattern()? {
            Pattern::Value(key) => Ok(key),
            Pattern::Singleton(constant) => Ok(Expr::Constant(constant)),
            _ => Err(self.error_here("mapping keys must be literals or dotted names")),
        }
    }

    fn decorated(&mut self) -> Result<Stmt, ParseError> {
        let mut decorators = Vec::new();
        while self.eat_op("@") {
            decorators.push(self.test()?);
            self.expect_newline()?;
        }

        if self.at_keyword("def") {
            self.function_def(decorators, false)
        } else if self.at_keyword("class") {
            self.class_def(decorators)
        } else if self.eat_keyword("async") {
            self.function_def(decorators, true)
        } else {
            Err(self.error_here("expected function or class after decorator"))
        }
    }

    fn function_def(&mut self, decorators: Vec<Expr>, is_async: bool) -> Result<Stmt, ParseError> {
        self.expect_keyword("def")?;
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let params = self.params(")", true)?;
        self.expect_op(")")?;
        let returns = if self.eat_op("->") {
            Some(self.test()?)
        } else {
            None
        };
        let body = self.block()?;
        Ok(Stmt::FunctionDef {
            name,
            params,
            body,
            decorators,
            returns,
            is_async,
        })
    }

    fn params(&mut self, closing: &str, annotations: bool) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        while !self.at_op(closing) {
            if self.eat_op("/") {
                params.push(Param::PosOnlyMarker);
            } else if self.eat_op("**") {
                params.push(Param::KwArgs(self.arg(annotations)?));
            } else if self.eat_op("*") {
                if self.at_op(",") || self.at_op(closing) {
                    params.push(Param::VarArgs(None));
                } else {
                    params.push(Param::VarArgs(Some(self.arg(annotations)?)));
                }
            } else {
                let arg = self.arg(annotations)?;
                let default = if self.eat_op("=") {
                    Some(self.test()?)
                } else {
                    None
                };
                params.push(Param::Plain { arg, default });
            }

            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn arg(&mut self, annotations: bool) -> Result<Arg, ParseError> {
        let name = self.expect_name()?;
        let annotation = if annotations && self.eat_op(":") {
            Some(self.test()?)
        } else {
            None
        };
        Ok(Arg { name, annotation })
    }

    fn class_def(&mut self, decorators: Vec<Expr>) -> Result<Stmt, ParseError> {
        self.expect_keyword("class")?;
        let name = self.expect_name()?;
        let (bases, keywords) = if self.eat_op("(") {
            let args = self.call_args()?;
            self.expect_op(")")?;
            args
        } else {
            (Vec::new(), Vec::new())
        };
        let body = self.block()?;
        Ok(Stmt::ClassDef {
            name,
            bases,
            keywords,
            body,
            decorators,
        })
    }

    fn small_stmt(&mut self) -> Result<Stmt, ParseError> {
        let keyword = match self.peek() {
            TokenKind::Name(name) => name.clone(),
            _ => return self.expr_stmt(),
        };

        match keyword.as_str() {
            "pass" => {
                self.advance();
                Ok(Stmt::Pass)
            }
            "break" => {
                self.advance();
                Ok(Stmt::Break)
            }
            "continue" => {
                self.advance();
                Ok(Stmt::Continue)
            }
            "return" => {
                self.advance();
                let value = if self.starts_expr() {
                    Some(self.testlist_star()?)
                } else {
                    None
                };
                Ok(Stmt::Return(value))
            }
            "raise" => {
                self.advance();
                let exc = if self.starts_expr() {
                    Some(self.test()?)
                } else {
                    None
                };
                let cause = if exc.is_some() && self.eat_keyword("from") {
                    Some(self.test()?)
                } else {
                    None
                };
                Ok(Stmt::Raise { exc, cause })
            }
            "global" | "nonlocal" => {
                self.advance();
                let mut names = vec![self.expect_name()?];
                while self.eat_op(",") {
                    names.push(self.expect_name()?);
                }
                Ok(if keyword == "global" {
                    Stmt::Global(names)
                } else {
                    Stmt::Nonlocal(names)
                })
            }
            "del" => {
                self.advance();
                let targets = match self.exprlist()? {
                    Expr::Tuple { elts, .. } => elts,
                    target => vec![target],
                };
                Ok(Stmt::Delete(self.set_ctx_all(targets, ExprContext::Del)?))
            }
            "assert" => {
                self.advance();
                let test = self.test()?;
                let msg = if self.eat_op(",") {
                    Some(self.test()?)
                } else {
                    None
                };
                Ok(Stmt::Assert { test, msg })
            }
            "import" => {
                self.advance();
                let mut names = vec![self.dotted_alias()?];
                while self.eat_op(",") {
                    names.push(self.dotted_alias()?);
                }
                Ok(Stmt::Import(names))
            }
            "from" => self.import_from(),
            _ => self.expr_stmt(),
        }
    }

    fn dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_name()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn dotted_alias(&mut self) -> Result<Alias, ParseError> {
        let name = self.dotted_name()?;
        let asname = if self.eat_keyword("as") {
            Some(self.expect_name()?)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn import_from(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("from")?;
        let mut level = 0;
        loop {
            if self.eat_op(".") {
                level += 1;
            } else if self.eat_op("...") {
                level += 3;
            } else {
                break;
            }
        }
        let module = if self.at_keyword("import") {
            None
        } else {
            Some(self.dotted_name()?)
        };
        if module.is_none() && level == 0 {
            return Err(self.error_here("expected module name"));
        }
        self.expect_keyword("import")?;

        let names = if self.eat_op("*") {
            vec![Alias {
                name: "*".into(),
                asname: None,
            }]
        } else {
            let parenthesized = self.eat_op("(");
            let mut names = Vec::new();
            loop {
                let name = self.expect_name()?;
                let asname = if self.eat_keyword("as") {
                    Some(self.expect_name()?)
                } else {
                    None
                };
                names.push(Alias { name, asname });
                if !self.eat_op(",") || (parenthesized && self.at_op(")")) {
                    break;
                }
            }
            if parenthesized {
                self.expect_op(")")?;
            }
            names
        };

        Ok(Stmt::ImportFrom {
            module,
            names,
            level,
        })
    }

    fn expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let first = self.testlist_or_yield()?;

        if let TokenKind::Op(op) = self.peek() {
            if let Some(bin) = BinOp::from_augmented(op).filter(|_| op.len() >= 2) {
                self.advance();
                let target = self.set_ctx(first, ExprContext::Store)?;
                let value = self.testlist_or_yield()?;
                return Ok(Stmt::AugAssign {
                    target,
                    op: bin,
                    value,
                });
            }
        }

        if self.eat_op(":") {
            let target = self.set_ctx(first, ExprContext::Store)?;
            let annotation = self.test()?;
            let value = if self.eat_op("=") {
                Some(self.testlist_or_yield()?)
            } else {
                None
            };
            return Ok(Stmt::AnnAssign {
                target,
                annotation,
                value,
            });
        }

        if self.at_op("=") {
            let mut exprs = vec![first];
            while self.eat_op("=") {
                exprs.push(self.testlist_or_yield()?);
            }
            let value = exprs.pop().ok_or_else(|| self.error_here("invalid syntax"))?;
            let targets = self.set_ctx_all(exprs, ExprContext::Store)?;
            return Ok(Stmt::Assign { targets, value });
        }

        Ok(Stmt::Expr(first))
    }

    // --- expressions ---

    fn testlist_or_yield(&mut self) -> Result<Expr, ParseError> {
        if self.at_keyword("yield") {
            self.yield_expr()
        } else {
            self.testlist_star()
        }
    }

    fn yield_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("yield")?;
        if self.eat_keyword("from") {
            return Ok(Expr::YieldFrom(Box::new(self.test()?)));
        }
        if self.starts_expr() {
            Ok(Expr::Yield(Some(Box::new(self.testlist_star()?))))
        } else {
            Ok(Expr::Yield(None))
        }
    }

    /// Comma-separated tests or starred items; a tuple when a comma appears
    fn testlist_star(&mut self) -> Result<Expr, ParseError> {
        let first = self.star_or_test()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            elts.push(self.star_or_test()?);
        }
        Ok(Expr::Tuple {
            elts,
            ctx: ExprContext::Load,
        })
    }

    /// Target list of `for`, `del` and comprehensions
    fn exprlist(&mut self) -> Result<Expr, ParseError> {
        let first = self.star_or_expr()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            elts.push(self.star_or_expr()?);
        }
        Ok(Expr::Tuple {
            elts,
            ctx: ExprContext::Load,
        })
    }

    fn star_or_test(&mut self) -> Result<Expr, ParseError> {
        if self.eat_op("*") {
            Ok(Expr::Starred {
                value: Box::new(self.bitor()?),
                ctx: ExprContext::Load,
            })
        } else {
            self.test()
        }
    }

    fn star_or_expr(&mut self) -> Result<Expr, ParseError> {
        if self.eat_op("*") {
            Ok(Expr::Starred {
                value: Box::new(self.bitor()?),
                ctx: ExprContext::Load,
            })
        } else {
            self.bitor()
        }
    }

    fn test(&mut self) -> Result<Expr, ParseError> {
        if self.at_keyword("lambda") {
            return self.lambda();
        }

        let body = self.or_test()?;
        let expr = if self.eat_keyword("if") {
            let test = self.or_test()?;
            self.expect_keyword("else")?;
            let orelse = self.test()?;
            Expr::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            }
        } else {
            body
        };

        if self.at_op(":=") {
            if !matches!(expr, Expr::Name { .. }) {
                return Err(self.error_here("cannot use assignment expression here"));
            }
            self.advance();
            let target = self.set_ctx(expr, ExprContext::Store)?;
            let value = self.test()?;
            return Ok(Expr::NamedExpr {
                target: Box::new(target),
                value: Box::new(value),
            });
        }
        Ok(expr)
    }

    fn lambda(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("lambda")?;
        let params = self.params(":", false)?;
        self.expect_op(":")?;
        let body = self.test()?;
        Ok(Expr::Lambda {
            params,
            body: Box::new(body),
        })
    }

    fn or_test(&mut self) -> Result<Expr, ParseError> {
        let first = self.and_test()?;
        if !self.at_keyword("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("or") {
            values.push(self.and_test()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::Or,
            values,
        })
    }

    fn and_test(&mut self) -> Result<Expr, ParseError> {
        let first = self.not_test()?;
        if !self.at_keyword("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("and") {
            values.push(self.not_test()?);
        }
        Ok(Expr::BoolOp {
            op: BoolOp::And,
            values,
        })
    }

    fn not_test(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword("not") {
            Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(self.not_test()?),
            })
        } else {
            self.comparison()
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek() {
            TokenKind::Op("<") => CmpOp::Lt,
            TokenKind::Op(">") => CmpOp::Gt,
            TokenKind::Op("==") => CmpOp::Eq,
            TokenKind::Op(">=") => CmpOp::GtE,
            TokenKind::Op("<=") => CmpOp::LtE,
            TokenKind::Op("!=") => CmpOp::NotEq,
            kind if is_keyword(kind, "in") => CmpOp::In,
            kind if is_keyword(kind, "not") && is_keyword(self.peek_nth(1), "in") => {
                self.advance();
                CmpOp::NotIn
            }
            kind if is_keyword(kind, "is") => {
                if is_keyword(self.peek_nth(1), "not") {
                    self.advance();
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push(op);
            comparators.push(self.bitor()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn bitor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(0)
    }

    fn binary_level(&mut self, level: usize) -> Result<Expr, ParseError> {
        let Some(ops) = BINARY_LEVELS.get(level) else {
            return self.factor();
        };

        let mut left = self.binary_level(level + 1)?;
        loop {
            let op = match self.peek() {
                TokenKind::Op(op) if ops.contains(op) => BinOp::from_symbol(op),
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance();
            let right = self.binary_level(level + 1)?;
            left = Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Op("+") => UnaryOp::UAdd,
            TokenKind::Op("-") => UnaryOp::USub,
            TokenKind::Op("~") => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.advance();
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(self.factor()?),
        })
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = if self.eat_keyword("await") {
            Expr::Await(Box::new(self.primary()?))
        } else {
            self.primary()?
        };
        if self.eat_op("**") {
            let exponent = self.factor()?;
            return Ok(Expr::BinOp {
                left: Box::new(base),
                op: BinOp::Pow,
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                let (args, keywords) = self.call_args()?;
                self.expect_op(")")?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    keywords,
                };
            } else if self.eat_op("[") {
                let slice = self.subscript_list()?;
                self.expect_op("]")?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                    slice: Box::new(slice),
                    ctx: ExprContext::Load,
                };
            } else if self.eat_op(".") {
                let attr = self.expect_name()?;
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                    ctx: ExprContext::Load,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), ParseError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.at_op(")") {
            if self.eat_op("*") {
                args.push(Expr::Starred {
                    value: Box::new(self.test()?),
                    ctx: ExprContext::Load,
                });
            } else if self.eat_op("**") {
                keywords.push(Keyword {
                    arg: None,
                    value: self.test()?,
                });
            } else if matches!(self.peek(), TokenKind::Name(_))
                && matches!(self.peek_nth(1), TokenKind::Op("="))
            {
                let arg = self.expect_name()?;
                self.advance();
                keywords.push(Keyword {
                    arg: Some(arg),
                    value: self.test()?,
                });
            } else {
                let value = self.test()?;
                if self.at_comprehension() {
                    let generators = self.comprehensions()?;
                    args.push(Expr::GeneratorExp {
                        elt: Box::new(value),
                        generators,
                    });
                } else {
                    args.push(value);
                }
            }

            if !self.eat_op(",") {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn subscript_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.subscript_item()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            elts.push(self.subscript_item()?);
        }
        Ok(Expr::Tuple {
            elts,
            ctx: ExprContext::Load,
        })
    }

    fn subscript_item(&mut self) -> Result<Expr, ParseError> {
        let lower = if self.at_op(":") {
            None
        } else {
            let item = self.star_or_test()?;
            if !self.at_op(":") {
                return Ok(item);
            }
            Some(Box::new(item))
        };
        self.expect_op(":")?;

        let upper = if self.at_op(":") || self.at_op("]") || self.at_op(",") {
            None
        } else {
            Some(Box::new(self.test()?))
        };
        let step = if self.eat_op(":") && !(self.at_op("]") || self.at_op(",")) {
            Some(Box::new(self.test()?))
        } else {
            None
        };
        Ok(Expr::Slice { lower, upper, step })
    }

    fn comprehensions(&mut self) -> Result<Vec<Comprehension>, ParseError> {
        let mut generators = Vec::new();
        while self.at_comprehension() {
            let is_async = self.eat_keyword("async");
            self.expect_keyword("for")?;
            let target = self.exprlist()?;
            let target = self.set_ctx(target, ExprContext::Store)?;
            self.expect_keyword("in")?;
            let iter = self.or_test()?;
            let mut ifs = Vec::new();
            while self.eat_keyword("if") {
                ifs.push(self.or_test()?);
            }
            generators.push(Comprehension {
                target,
                iter,
                ifs,
                is_async,
            });
        }
        Ok(generators)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            TokenKind::Op("(") => self.paren_atom(),
            TokenKind::Op("[") => self.list_atom(),
            TokenKind::Op("{") => self.brace_atom(),
            TokenKind::Op("...") => {
                self.advance();
                Ok(Expr::Constant(Constant::Ellipsis))
            }
            TokenKind::Number(text) => {
                self.advance();
                Ok(Expr::Constant(number_constant(&text)))
            }
            TokenKind::Str(_) => self.strings(),
            TokenKind::Name(name) => {
                let constant = match name.as_str() {
                    "True" => Some(Constant::Bool(true)),
                    "False" => Some(Constant::Bool(false)),
                    "None" => Some(Constant::None),
                    _ => None,
                };
                if let Some(constant) = constant {
                    self.advance();
                    return Ok(Expr::Constant(constant));
                }
                if KEYWORDS.contains(&name.as_str()) {
                    return Err(self.error_here(format!("invalid syntax near '{}'", name)));
                }
                self.advance();
                Ok(Expr::name(name, ExprContext::Load))
            }
            _ => Err(self.error_here("invalid syntax")),
        }
    }

    fn paren_atom(&mut self) -> Result<Expr, ParseError> {
        self.expect_op("(")?;
        if self.eat_op(")") {
            return Ok(Expr::Tuple {
                elts: Vec::new(),
                ctx: ExprContext::Load,
            });
        }
        if self.at_keyword("yield") {
            let expr = self.yield_expr()?;
            self.expect_op(")")?;
            return Ok(expr);
        }

        let first = self.star_or_test()?;
        if self.at_comprehension() {
            let generators = self.comprehensions()?;
            self.expect_op(")")?;
            return Ok(Expr::GeneratorExp {
                elt: Box::new(first),
                generators,
            });
        }
        if !self.at_op(",") {
            self.expect_op(")")?;
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op(")") {
                break;
            }
            elts.push(self.star_or_test()?);
        }
        self.expect_op(")")?;
        Ok(Expr::Tuple {
            elts,
            ctx: ExprContext::Load,
        })
    }

    fn list_atom(&mut self) -> Result<Expr, ParseError> {
        self.expect_op("[")?;
        if self.eat_op("]") {
            return Ok(Expr::List {
                elts: Vec::new(),
                ctx: ExprContext::Load,
            });
        }

        let first = self.star_or_test()?;
        if self.at_comprehension() {
            let generators = self.comprehensions()?;
            self.expect_op("]")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                generators,
            });
        }

        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            elts.push(self.star_or_test()?);
        }
        self.expect_op("]")?;
        Ok(Expr::List {
            elts,
            ctx: ExprContext::Load,
        })
    }

    fn brace_atom(&mut self) -> Result<Expr, ParseError> {
        self.expect_op("{")?;
        if self.eat_op("}") {
            return Ok(Expr::Dict {
                keys: Vec::new(),
                values: Vec::new(),
            });
        }

        if self.eat_op("**") {
            let spread = self.bitor()?;
            return self.dict_rest(vec![None], vec![spread]);
        }

        let first = self.star_or_test()?;
        if self.eat_op(":") {
            let value = self.test()?;
            if self.at_comprehension() {
                let generators = self.comprehensions()?;
                self.expect_op("}")?;
                return Ok(Expr::DictComp {
                    key: Box::new(first),
                    value: Box::new(value),
                    generators,
                });
            }
            return self.dict_rest(vec![Some(first)], vec![value]);
        }

        if self.at_comprehension() {
            let generators = self.comprehensions()?;
            self.expect_op("}")?;
            return Ok(Expr::SetComp {
                elt: Box::new(first),
                generators,
            });
        }

        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            elts.push(self.star_or_test()?);
        }
        self.expect_op("}")?;
        Ok(Expr::Set(elts))
    }

    fn dict_rest(
        &mut self,
        mut keys: Vec<Option<Expr>>,
        mut values: Vec<Expr>,
    ) -> Result<Expr, ParseError> {
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            if self.eat_op("**") {
                keys.push(None);
                values.push(self.bitor()?);
            } else {
                keys.push(Some(self.test()?));
                self.expect_op(":")?;
                values.push(self.test()?);
            }
        }
        self.expect_op("}")?;
        Ok(Expr::Dict { keys, values })
    }

    /// Adjacent string literals concatenate; any f-string piece makes the
    /// whole literal a `JoinedStr`.
    fn strings(&mut self) -> Result<Expr, ParseError> {
        let mut pieces = Vec::new();
        while let TokenKind::Str(raw) = self.peek() {
            let raw = raw.clone();
            let (line, col) = self.token_at(0).map(|t| (t.line, t.col)).unwrap_or((0, 0));
            self.advance();
            pieces.push((raw, line, col));
        }

        let prefix_of = |raw: &str| -> String {
            raw.chars()
                .take_while(|c| *c != '\'' && *c != '"')
                .collect::<String>()
                .to_lowercase()
        };

        let has_fstring = pieces.iter().any(|(raw, _, _)| prefix_of(raw).contains('f'));
        if has_fstring {
            let mut parts: Vec<FStringPart> = Vec::new();
            for (raw, line, col) in &pieces {
                let prefix = prefix_of(raw);
                let body = string_body(raw);
                let piece_parts = if prefix.contains('f') {
                    parse_fstring_body(body, *line, *col)?
                } else {
                    vec![FStringPart::Literal(body.to_string())]
                };
                for part in piece_parts {
                    if let FStringPart::Literal(next) = &part {
                        if let Some(FStringPart::Literal(prev)) = parts.last_mut() {
                            prev.push_str(next);
                            continue;
                        }
                    }
                    parts.push(part);
                }
            }
            return Ok(Expr::JoinedStr(parts));
        }

        let joined = pieces
            .iter()
            .map(|(raw, _, _)| raw.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let is_bytes = pieces.iter().any(|(raw, _, _)| prefix_of(raw).contains('b'));
        Ok(Expr::Constant(if is_bytes {
            Constant::Bytes(joined)
        } else {
            Constant::Str(joined)
        }))
    }
}

fn is_keyword(kind: &TokenKind, keyword: &str) -> bool {
    matches!(kind, TokenKind::Name(name) if name == keyword)
}

fn number_constant(text: &str) -> Constant {
    let lower = text.to_lowercase();
    if lower.ends_with('j') {
        Constant::Complex(text.to_string())
    } else if lower.starts_with("0x") || lower.starts_with("0o") || lower.starts_with("0b") {
        Constant::Int(text.to_string())
    } else if lower.contains('.') || lower.contains('e') {
        Constant::Float(text.to_string())
    } else {
        Constant::Int(text.to_string())
    }
}

/// Text between the quotes of a raw string token
fn string_body(raw: &str) -> &str {
    let start = raw.find(|c| c == '\'' || c == '"').unwrap_or(0);
    let quoted = &raw[start..];
    let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        3
    } else {
        1
    };
    if quoted.len() < 2 * quote_len {
        return "";
    }
    &quoted[quote_len..quoted.len() - quote_len]
}

/// Split an f-string body into literal text and replacement fields
fn parse_fstring_body(body: &str, line: usize, col: usize) -> Result<Vec<FStringPart>, ParseError> {
    let chars: Vec<char> = body.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err(ParseError::new("f-string: single '}' is not allowed", line, col)),
            '{' => {
                let end = field_end(&chars, i + 1)
                    .ok_or_else(|| ParseError::new("f-string: expecting '}'", line, col))?;
                let mut expr_text: String = chars[i + 1..end].iter().collect();
                let mut j = end;

                let trimmed = expr_text.trim_end();
                let self_documenting = trimmed.ends_with('=')
                    && !matches!(
                        trimmed.chars().rev().nth(1),
                        Some('=' | '!' | '<' | '>')
                    );
                if self_documenting {
                    literal.push_str(&expr_text);
                    let without_eq = trimmed.len() - 1;
                    expr_text.truncate(without_eq);
                }

                let mut conversion = None;
                if chars.get(j) == Some(&'!') {
                    conversion = chars.get(j + 1).copied();
                    j += 2;
                }
                let mut format_spec = None;
                if chars.get(j) == Some(&':') {
                    let spec_end = spec_end(&chars, j + 1).ok_or_else(|| {
                        ParseError::new("f-string: expecting '}'", line, col)
                    })?;
                    format_spec = Some(chars[j + 1..spec_end].iter().collect());
                    j = spec_end;
                }
                if chars.get(j) != Some(&'}') {
                    return Err(ParseError::new("f-string: expecting '}'", line, col));
                }
                if self_documenting && conversion.is_none() && format_spec.is_none() {
                    conversion = Some('r');
                }

                if expr_text.trim().is_empty() {
                    return Err(ParseError::new("f-string: empty expression", line, col));
                }
                let value = parse_expression(&format!("({})", expr_text.trim()))
                    .map_err(|e| ParseError::new(format!("f-string: {}", e.message), line, col))?;

                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(FStringPart::Formatted {
                    value: Box::new(value),
                    conversion,
                    format_spec,
                });
                i = j + 1;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(FStringPart::Literal(literal));
    }
    Ok(parts)
}

/// Index of the `!`, `:` or `}` closing the expression of a field
fn field_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '}' if depth > 0 => depth -= 1,
                '}' => return Some(i),
                '!' if depth == 0 && chars.get(i + 1) != Some(&'=') => return Some(i),
                ':' if depth == 0 => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Index of the `}` closing a format spec, which may nest fields
fn spec_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in chars[start..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            '}' => return Some(start + offset),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> Stmt {
        let mut body = parse_module(source).unwrap();
        assert_eq!(body.len(), 1, "expected one statement in {source:?}");
        body.remove(0)
    }

    fn store(id: &str) -> Expr {
        Expr::name(id, ExprContext::Store)
    }

    fn load(id: &str) -> Expr {
        Expr::name(id, ExprContext::Load)
    }

    #[test]
    fn test_tuple_swap_contexts() {
        let stmt = parse_one("a, b = b, a\n");
        assert_eq!(
            stmt,
            Stmt::Assign {
                targets: vec![Expr::Tuple {
                    elts: vec![store("a"), store("b")],
                    ctx: ExprContext::Store,
                }],
                value: Expr::Tuple {
                    elts: vec![load("b"), load("a")],
                    ctx: ExprContext::Load,
                },
            }
        );
    }

    #[test]
    fn test_chained_assignment() {
        let Stmt::Assign { targets, value } = parse_one("x = y = 0\n") else {
            panic!("not an assignment");
        };
        assert_eq!(targets, vec![store("x"), store("y")]);
        assert_eq!(value, Expr::Constant(Constant::Int("0".into())));
    }

    #[test]
    fn test_precedence() {
        let Stmt::Expr(expr) = parse_one("1 + 2 * 3 ** -x\n") else {
            panic!("not an expression");
        };
        let Expr::BinOp { op, right, .. } = expr else {
            panic!("not a binop");
        };
        assert_eq!(op, BinOp::Add);
        let Expr::BinOp { op, right, .. } = *right else {
            panic!("not a binop");
        };
        assert_eq!(op, BinOp::Mult);
        assert!(matches!(*right, Expr::BinOp { op: BinOp::Pow, .. }));
    }

    #[test]
    fn test_elif_nests_in_orelse() {
        let stmt = parse_one("if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n");
        let Stmt::If { orelse, .. } = stmt else {
            panic!("not an if");
        };
        assert_eq!(orelse.len(), 1);
        let Stmt::If { orelse: inner, .. } = &orelse[0] else {
            panic!("elif did not nest");
        };
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn test_for_else_and_comprehension_targets() {
        let stmt = parse_one("for i, v in enumerate(xs):\n    pass\nelse:\n    done()\n");
        let Stmt::For { target, orelse, .. } = stmt else {
            panic!("not a for");
        };
        assert!(matches!(target, Expr::Tuple { ctx: ExprContext::Store, .. }));
        assert_eq!(orelse.len(), 1);

        let Stmt::Expr(Expr::ListComp { generators, .. }) =
            parse_one("[y for y in ys if y > 0]\n")
        else {
            panic!("not a list comprehension");
        };
        assert_eq!(generators[0].target, store("y"));
        assert_eq!(generators[0].ifs.len(), 1);
    }

    #[test]
    fn test_function_signature() {
        let source = "@cache\ndef f(a, b: int = 1, /, *args, c, **kw) -> int:\n    return a\n";
        let Stmt::FunctionDef {
            name,
            params,
            decorators,
            returns,
            ..
        } = parse_one(source)
        else {
            panic!("not a function");
        };
        assert_eq!(name, "f");
        assert_eq!(decorators, vec![load("cache")]);
        assert!(returns.is_some());
        assert_eq!(params.len(), 6);
        assert!(matches!(params[2], Param::PosOnlyMarker));
        assert!(matches!(params[5], Param::KwArgs(_)));
    }

    #[test]
    fn test_del_augassign_walrus() {
        assert_eq!(parse_one("del x\n"), Stmt::Delete(vec![Expr::name("x", ExprContext::Del)]));

        let Stmt::AugAssign { target, op, .. } = parse_one("total += n\n") else {
            panic!("not an augmented assignment");
        };
        assert_eq!(target, store("total"));
        assert_eq!(op, BinOp::Add);

        let Stmt::While { test, .. } = parse_one("while (n := next()) > 0:\n    pass\n") else {
            panic!("not a while");
        };
        let Expr::Compare { left, .. } = test else {
            panic!("not a comparison");
        };
        assert!(matches!(*left, Expr::NamedExpr { .. }));
    }

    #[test]
    fn test_try_with_imports() {
        let source = "\
import sys, os.path as p
from . import a
from ..pkg import (b, c as d,)
try:
    with open(f) as fh, lock:
        data = fh.read()
except (IOError, ValueError) as e:
    raise RuntimeError() from e
else:
    pass
finally:
    cleanup()
";
        let body = parse_module(source).unwrap();
        assert_eq!(body.len(), 4);
        assert!(matches!(&body[1], Stmt::ImportFrom { level: 1, module: None, .. }));
        let Stmt::ImportFrom { names, level, .. } = &body[2] else {
            panic!("not an import");
        };
        assert_eq!(*level, 2);
        assert_eq!(names[1].asname.as_deref(), Some("d"));
        let Stmt::Try { handlers, orelse, finalbody, .. } = &body[3] else {
            panic!("not a try");
        };
        assert_eq!(handlers[0].name.as_deref(), Some("e"));
        assert_eq!(orelse.len(), 1);
        assert_eq!(finalbody.len(), 1);
    }

    #[test]
    fn test_displays_and_slices() {
        let body = parse_module(
            "d = {'a': 1, **rest}\ns = {1, 2}\ne = {}\nt = (1,)\nm = a[1:2, ::3]\ng = sum(x for x in y)\n",
        )
        .unwrap();
        assert_eq!(body.len(), 6);
        let Stmt::Assign { value, .. } = &body[0] else {
            panic!()
        };
        assert!(matches!(value, Expr::Dict { keys, .. } if keys.len() == 2 && keys[1].is_none()));
        let Stmt::Assign { value, .. } = &body[3] else {
            panic!()
        };
        assert!(matches!(value, Expr::Tuple { elts, .. } if elts.len() == 1));
        let Stmt::Assign { value, .. } = &body[5] else {
            panic!()
        };
        assert!(matches!(value, Expr::Call { args, .. } if matches!(args[0], Expr::GeneratorExp { .. })));
    }

    #[test]
    fn test_fstring_fields() {
        let Stmt::Expr(Expr::JoinedStr(parts)) = parse_one("f'total={n + 1:>5} {{raw}} {name!r}'\n")
        else {
            panic!("not an f-string");
        };
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], FStringPart::Literal("total=".into()));
        assert!(matches!(
            &parts[1],
            FStringPart::Formatted { format_spec: Some(spec), .. } if spec == ">5"
        ));
        assert_eq!(parts[2], FStringPart::Literal(" {raw} ".into()));
        assert!(matches!(&parts[3], FStringPart::Formatted { conversion: Some('r'), .. }));
    }

    #[test]
    fn test_lambda_and_conditional() {
        let Stmt::Assign { value, .. } = parse_one("key = lambda p, q=2: p if p else q\n") else {
            panic!()
        };
        let Expr::Lambda { params, body } = value else {
            panic!("not a lambda");
        };
        assert_eq!(params.len(), 2);
        assert!(matches!(*body, Expr::IfExp { .. }));
    }

    fn capture(name: &str) -> Pattern {
        Pattern::As {
            pattern: None,
            name: Some(name.into()),
        }
    }

    #[test]
    fn test_match_statement() {
        let source = "match command.split():
    case [\"go\", direction] if direction:
        move(direction)
    case Point(x=0, y=py) | Origin() as p:
        pass
    case {\"k\": 1, **rest}:
        pass
    case -1 | None:
        pass
    case first, *_:
        pass
    case _:
        pass
";
        let Stmt::Match { subject, cases } = parse_one(source) else {
            panic!("expected a match statement");
        };
        assert!(matches!(subject, Expr::Call { .. }));
        assert_eq!(cases.len(), 6);

        let Pattern::Sequence(items) = &cases[0].pattern else {
            panic!("expected a sequence pattern");
        };
        assert!(matches!(items[0], Pattern::Value(Expr::Constant(Constant::Str(_)))));
        assert_eq!(items[1], capture("direction"));
        assert_eq!(cases[0].guard, Some(load("direction")));
        assert_eq!(cases[0].body.len(), 1);

        let Pattern::As {
            pattern: Some(inner),
            name,
        } = &cases[1].pattern
        else {
            panic!("expected an as pattern");
        };
        assert_eq!(name.as_deref(), Some("p"));
        let Pattern::Or(alternatives) = inner.as_ref() else {
            panic!("expected an or pattern");
        };
        assert_eq!(
            alternatives[0],
            Pattern::Class {
                cls: load("Point"),
                patterns: vec![],
                kwd_attrs: vec!["x".into(), "y".into()],
                kwd_patterns: vec![
                    Pattern::Value(Expr::Constant(Constant::Int("0".into()))),
                    capture("py"),
                ],
            }
        );

        assert!(matches!(
            &cases[2].pattern,
            Pattern::Mapping { keys, rest: Some(rest), .. } if keys.len() == 1 && rest == "rest"
        ));
        assert!(matches!(
            &cases[3].pattern,
            Pattern::Or(alternatives) if matches!(alternatives[..], [
                Pattern::Value(Expr::UnaryOp { op: UnaryOp::USub, .. }),
                Pattern::Singleton(Constant::None),
            ])
        ));
        assert_eq!(
            cases[4].pattern,
            Pattern::Sequence(vec![capture("first"), Pattern::Star(None)])
        );
        assert_eq!(
            cases[5].pattern,
            Pattern::As {
                pattern: None,
                name: None,
            }
        );
    }

    #[test]
    fn test_match_is_a_soft_keyword() {
        let body = parse_module("match = [1]\nmatch.append(2)\nmatch(x)\n").unwrap();
        assert_eq!(body.len(), 3);
        assert!(matches!(&body[0], Stmt::Assign { targets, .. } if targets[0] == store("match")));
        assert!(matches!(body[2], Stmt::Expr(Expr::Call { .. })));
    }

    #[test]
    fn test_match_captures_are_stores() {
        let stmt = parse_one("match p:\n    case (x, [*ys]) if x:\n        total = x\n");
        let mut names = Vec::new();
        walk_stmt_names(&stmt, &mut |name, ctx| names.push((name.to_string(), ctx)));
        assert_eq!(
            names,
            vec![
                ("p".to_string(), ExprContext::Load),
                ("x".to_string(), ExprContext::Store),
                ("ys".to_string(), ExprContext::Store),
                ("x".to_string(), ExprContext::Load),
                ("x".to_string(), ExprContext::Load),
                ("total".to_string(), ExprContext::Store),
            ]
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_module("def f(:\n    pass\n").is_err());
        assert!(parse_module("x = = 1\n").is_err());
        assert!(parse_module("if x\n    pass\n").is_err());
        assert!(parse_module("match x:\n    pass\n").is_err());
        assert!(parse_module("match x:\n    case *rest:\n        pass\n").is_err());
        assert!(parse_module("1 = x\n").is_err());
        assert!(parse_module("try:\n    pass\n").is_err());

        let err = parse_module("a = 1\nb = (2 +\n").unwrap_err();
        assert!(err.line >= 2);
    }
}
