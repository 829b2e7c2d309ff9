//! Tokenizer for Python source
//!
//! Produces the logical-line token stream the parser consumes: indentation
//! is turned into `Indent`/`Dedent`, newlines inside brackets and after a
//! backslash are swallowed, comments and blank lines vanish.

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword
    Name(String),
    /// Numeric literal as written
    Number(String),
    /// String literal as written, prefix and quotes included
    Str(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// Longest operators first so greedy matching works
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "->", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", ":=", "+", "-", "*", "/", "%", "@", "&", "|",
    "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "=",
];

const TAB_SIZE: usize = 8;

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 0,
            indents: vec![0],
            depth: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line, self.col)
    }

    fn push(&mut self, kind: TokenKind, line: usize, col: usize) {
        self.tokens.push(Token { kind, line, col });
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.handle_indentation()? {
                    break;
                }
                continue;
            }

            let Some(c) = self.peek() else { break };
            let (line, col) = (self.line, self.col);
            match c {
                ' ' | '\t' | '\x0c' | '\r' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\\' => {
                    self.bump();
                    if self.peek() == Some('\r') {
                        self.bump();
                    }
                    if self.bump() != Some('\n') {
                        return Err(ParseError::new(
                            "unexpected character after line continuation",
                            line,
                            col,
                        ));
                    }
                }
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        self.push(TokenKind::Newline, line, col);
                        self.at_line_start = true;
                    }
                }
                '"' | '\'' => {
                    let text = self.read_string(self.pos)?;
                    self.push(TokenKind::Str(text), line, col);
                }
                c if c.is_ascii_digit() => {
                    let text = self.read_number();
                    self.push(TokenKind::Number(text), line, col);
                }
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                    let text = self.read_number();
                    self.push(TokenKind::Number(text), line, col);
                }
                c if is_ident_start(c) => {
                    let start = self.pos;
                    while self.peek().is_some_and(is_ident_char) {
                        self.bump();
                    }
                    let word: String = self.chars[start..self.pos].iter().collect();
                    if is_string_prefix(&word) && matches!(self.peek(), Some('"' | '\'')) {
                        let text = self.read_string(start)?;
                        self.push(TokenKind::Str(text), line, col);
                    } else {
                        self.push(TokenKind::Name(word), line, col);
                    }
                }
                _ => {
                    let op = self.read_operator()?;
                    match op {
                        "(" | "[" | "{" => self.depth += 1,
                        ")" | "]" | "}" => {
                            if self.depth == 0 {
                                return Err(ParseError::new(
                                    format!("unmatched '{}'", op),
                                    line,
                                    col,
                                ));
                            }
                            self.depth -= 1;
                        }
                        _ => {}
                    }
                    self.push(TokenKind::Op(op), line, col);
                }
            }
        }

        if self.depth > 0 {
            return Err(self.error("unexpected EOF inside brackets"));
        }
        let (line, col) = (self.line, self.col);
        if !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Dedent)
        ) {
            self.push(TokenKind::Newline, line, col);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, col);
        }
        self.push(TokenKind::EndMarker, line, col);
        Ok(self.tokens)
    }

    /// Measure the indentation of a fresh line. Blank and comment-only lines
    /// are consumed whole. Returns `false` at end of input.
    fn handle_indentation(&mut self) -> Result<bool, ParseError> {
        let mut width = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / TAB_SIZE + 1) * TAB_SIZE,
                '\x0c' => width = 0,
                _ => break,
            }
            self.bump();
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n') => {
                self.bump();
                return Ok(true);
            }
            Some('\r') if self.peek_at(1) == Some('\n') => {
                self.bump();
                self.bump();
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.bump();
                }
                return Ok(true);
            }
            _ => {}
        }

        let (line, col) = (self.line, self.col);
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, line, col);
        } else if width < current {
            while self.indents.last().is_some_and(|&w| w > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent, line, col);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(ParseError::new(
                    "unindent does not match any outer indentation level",
                    line,
                    col,
                ));
            }
        }
        self.at_line_start = false;
        Ok(true)
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }

    /// Read a string whose prefix (possibly empty) starts at `start`; the
    /// cursor sits on the opening quote.
    fn read_string(&mut self, start: usize) -> Result<String, ParseError> {
        let (line, col) = (self.line, self.col);
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string"));
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        loop {
            match self.bump() {
                None => {
                    return Err(ParseError::new("unterminated string literal", line, col));
                }
                Some('\\') => {
                    self.bump();
                }
                Some('\n') if !triple => {
                    return Err(ParseError::new("unterminated string literal", line, col));
                }
                Some(c) if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                }
                Some(_) => {}
            }
        }

        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        let radix_prefix = self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'));

        if radix_prefix {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == '_') {
                self.bump();
            }
        } else {
            self.eat_digits();
            if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
                self.bump();
                self.eat_digits();
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let signed = matches!(self.peek_at(1), Some('+' | '-'));
                let digit_at = if signed { 2 } else { 1 };
                if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                    if signed {
                        self.bump();
                    }
                    self.eat_digits();
                }
            }
            if matches!(self.peek(), Some('j' | 'J')) {
                self.bump();
            }
        }

        self.chars[start..self.pos].iter().collect()
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn read_operator(&mut self) -> Result<&'static str, ParseError> {
        for op in OPERATORS {
            let matches = op
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if matches {
                for _ in 0..op.chars().count() {
                    self.bump();
                }
                return Ok(*op);
            }
        }
        let c = self.peek().unwrap_or('\0');
        Err(self.error(format!("invalid character '{}'", c)))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn name(s: &str) -> TokenKind {
        TokenKind::Name(s.to_string())
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            kinds("x = 1\n"),
            vec![
                name("x"),
                TokenKind::Op("="),
                TokenKind::Number("1".into()),
                TokenKind::Newline,
                TokenKind::EndMarker,
            ]
        );
    }

    #[test]
    fn test_indent_dedent() {
        let tokens = kinds("if x:\n    y = 1\n\n    # note\nz = 2\n");
        assert_eq!(
            tokens,
            vec![
                name("if"),
                name("x"),
                TokenKind::Op(":"),
                TokenKind::Newline,
                TokenKind::Indent,
                name("y"),
                TokenKind::Op("="),
                TokenKind::Number("1".into()),
                TokenKind::Newline,
                TokenKind::Dedent,
                name("z"),
                TokenKind::Op("="),
                TokenKind::Number("2".into()),
                TokenKind::Newline,
                TokenKind::EndMarker,
            ]
        );
    }

    #[test]
    fn test_dedents_closed_at_eof() {
        let tokens = kinds("def f():\n    if a:\n        return 1");
        let dedents = tokens.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(tokens.last(), Some(&TokenKind::EndMarker));
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = kinds("x = (1,\n     2)\n");
        let newlines = tokens.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!tokens.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_backslash_continuation() {
        let tokens = kinds("x = 1 + \\\n    2\n");
        assert!(!tokens.contains(&TokenKind::Indent));
        assert!(tokens.contains(&TokenKind::Number("2".into())));
    }

    #[test]
    fn test_strings() {
        let tokens = kinds("a = rb'x\\'y' + \"\"\"multi\nline\"\"\" + f\"{v}\"\n");
        assert!(tokens.contains(&TokenKind::Str("rb'x\\'y'".into())));
        assert!(tokens.contains(&TokenKind::Str("\"\"\"multi\nline\"\"\"".into())));
        assert!(tokens.contains(&TokenKind::Str("f\"{v}\"".into())));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("0xFF 1_000 3.14 1e-5 2j .5\n");
        let numbers: Vec<_> = tokens
            .into_iter()
            .filter_map(|k| match k {
                TokenKind::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec!["0xFF", "1_000", "3.14", "1e-5", "2j", ".5"]);
    }

    #[test]
    fn test_operators_longest_match() {
        let tokens = kinds("a **= b // c := d\n");
        assert!(tokens.contains(&TokenKind::Op("**=")));
        assert!(tokens.contains(&TokenKind::Op("//")));
        assert!(tokens.contains(&TokenKind::Op(":=")));
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("s = 'open\n").is_err());
        assert!(tokenize("x = (1,\n").is_err());
        assert!(tokenize("if x:\n        a\n    b\n").is_err());
        assert!(tokenize("x = $\n").is_err());
    }
}
