//! Lossless Python tokenizer.
//!
//! Every byte of the input belongs to exactly one token, so concatenating the
//! token texts gives back the original source. Besides the usual Python token
//! kinds the stream carries explicit `Whitespace` and `Continuation` tokens, and
//! zero-width `Indent`/`Dedent`/`EndMarker` markers.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    String,
    /// Operators and delimiters, brackets included
    Op,
    Comment,
    /// Line break ending a logical line
    Newline,
    /// Line break that does not end a logical line (blank line, comment-only
    /// line, or inside brackets)
    Nl,
    Indent,
    Dedent,
    /// Spaces, tabs and form feeds
    Whitespace,
    /// Backslash followed by a line break
    Continuation,
    EndMarker,
}

/// 1-based line, 0-based column counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: Position,
    pub end: Position,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Token<'_> {
    pub fn is_closing_bracket(&self) -> bool {
        self.kind == TokenKind::Op && matches!(self.text, ")" | "]" | "}")
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self.kind, TokenKind::Newline | TokenKind::Nl)
    }

    /// Tokens that carry no code: layout, markers and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Comment
                | TokenKind::Newline
                | TokenKind::Nl
                | TokenKind::Indent
                | TokenKind::Dedent
                | TokenKind::Whitespace
                | TokenKind::Continuation
                | TokenKind::EndMarker
        )
    }
}

const THREE_CHAR_OPS: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const TWO_CHAR_OPS: &[&str] = &[
    "**", "//", ">>", "<<", "<=", ">=", "==", "!=", "->", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "@=", ":=",
];
const ONE_CHAR_OPS: &str = "+-*/%@&|^~<>()[]{},:;.=!";

const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "t", "br", "rb", "fr", "rf", "tr", "rt"];

/// Replacement field state inside an f-string.
struct Field {
    bracket_depth: usize,
    in_format_spec: bool,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token<'a>>,
    brackets: Vec<(char, Position)>,
    indents: Vec<usize>,
    at_line_start: bool,
    line_has_code: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 0,
            tokens: Vec::new(),
            brackets: Vec::new(),
            indents: vec![0],
            at_line_start: true,
            line_has_code: false,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Consume one character, keeping line and column in sync. `\r\n` counts
    /// as a single line break on the `\n`.
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        match ch {
            '\n' => {
                self.line += 1;
                self.column = 0;
            }
            '\r' if self.peek() != Some('\n') => {
                self.line += 1;
                self.column = 0;
            }
            _ => self.column += 1,
        }
        Some(ch)
    }

    /// Consume a line break (`\n`, `\r\n` or `\r`) if one is next.
    fn bump_line_break(&mut self) -> bool {
        match self.peek() {
            Some('\r') => {
                self.bump();
                if self.peek() == Some('\n') {
                    self.bump();
                }
                true
            }
            Some('\n') => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn push(&mut self, kind: TokenKind, start_byte: usize, start: Position) {
        let token = Token {
            kind,
            text: &self.src[start_byte..self.pos],
            start,
            end: self.position(),
            start_byte,
            end_byte: self.pos,
        };
        if !token.is_trivia() {
            self.line_has_code = true;
        }
        self.tokens.push(token);
    }

    fn push_marker(&mut self, kind: TokenKind) {
        let start = self.position();
        self.push(kind, self.pos, start);
    }

    fn run(mut self) -> Result<Vec<Token<'a>>> {
        while self.pos < self.src.len() {
            if self.at_line_start {
                self.at_line_start = false;
                self.indentation()?;
                continue;
            }
            self.next_token()?;
        }
        self.finish()
    }

    fn indentation(&mut self) -> Result<()> {
        let start_byte = self.pos;
        let start = self.position();
        let mut width = 0;
        while let Some(ch) = self.peek() {
            match ch {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0C' => width = 0,
                _ => break,
            }
            self.bump();
        }
        if self.pos > start_byte {
            self.push(TokenKind::Whitespace, start_byte, start);
        }

        // Blank and comment-only lines do not take part in indentation.
        match self.peek() {
            None | Some('\n') | Some('\r') | Some('#') => return Ok(()),
            _ => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push_marker(TokenKind::Indent);
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.push_marker(TokenKind::Dedent);
            }
            if self.indents.last() != Some(&width) {
                return Err(Error::syntax(
                    self.line,
                    self.column,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<()> {
        let start_byte = self.pos;
        let start = self.position();
        let Some(ch) = self.peek() else {
            return Ok(());
        };

        match ch {
            ' ' | '\t' | '\x0C' => {
                while matches!(self.peek(), Some(' ' | '\t' | '\x0C')) {
                    self.bump();
                }
                self.push(TokenKind::Whitespace, start_byte, start);
            }
            '#' => {
                while !matches!(self.peek(), None | Some('\n' | '\r')) {
                    self.bump();
                }
                self.push(TokenKind::Comment, start_byte, start);
            }
            '\n' | '\r' => {
                self.bump_line_break();
                let kind = if self.brackets.is_empty() && self.line_has_code {
                    TokenKind::Newline
                } else {
                    TokenKind::Nl
                };
                self.push(kind, start_byte, start);
                if kind == TokenKind::Newline {
                    self.line_has_code = false;
                }
                if self.brackets.is_empty() {
                    self.at_line_start = true;
                }
            }
            '\\' => {
                self.bump();
                if !self.bump_line_break() {
                    let message = if self.peek().is_none() {
                        "unexpected end of file after line continuation character"
                    } else {
                        "unexpected character after line continuation character"
                    };
                    return Err(Error::syntax(start.line, start.column, message));
                }
                self.push(TokenKind::Continuation, start_byte, start);
            }
            '"' | '\'' => self.string(start_byte, start, "")?,
            c if c.is_ascii_digit() => self.number(start_byte, start),
            '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.number(start_byte, start)
            }
            c if is_identifier_start(c) => {
                while self.peek().is_some_and(is_identifier_continue) {
                    self.bump();
                }
                let word = &self.src[start_byte..self.pos];
                let is_prefix = STRING_PREFIXES.contains(&word.to_ascii_lowercase().as_str());
                if is_prefix && matches!(self.peek(), Some('"' | '\'')) {
                    self.string(start_byte, start, word)?;
                } else {
                    self.push(TokenKind::Name, start_byte, start);
                }
            }
            _ => self.operator(start_byte, start)?,
        }
        Ok(())
    }

    fn number(&mut self, start_byte: usize, start: Position) {
        let is_radix = self.rest().len() > 1
            && self.rest().starts_with('0')
            && matches!(self.peek_nth(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'));
        let mut prev = '\0';
        while let Some(ch) = self.peek() {
            let exponent_sign = !is_radix && matches!(prev, 'e' | 'E') && matches!(ch, '+' | '-');
            if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign) {
                break;
            }
            prev = ch;
            self.bump();
        }
        self.push(TokenKind::Number, start_byte, start);
    }

    fn operator(&mut self, start_byte: usize, start: Position) -> Result<()> {
        let rest = self.rest();
        let width = if THREE_CHAR_OPS.iter().any(|op| rest.starts_with(op)) {
            3
        } else if TWO_CHAR_OPS.iter().any(|op| rest.starts_with(op)) {
            2
        } else if rest.chars().next().is_some_and(|c| ONE_CHAR_OPS.contains(c)) {
            1
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            return Err(Error::syntax(
                start.line,
                start.column,
                format!("invalid character {ch:?}"),
            ));
        };
        for _ in 0..width {
            self.bump();
        }

        let op = &self.src[start_byte..self.pos];
        match op {
            "(" | "[" | "{" => {
                let open = op.chars().next().unwrap_or_default();
                self.brackets.push((open, start));
            }
            ")" | "]" | "}" => {
                let close = op.chars().next().unwrap_or_default();
                match self.brackets.pop() {
                    Some((open, _)) if matching_close(open) == close => {}
                    Some((open, _)) => {
                        return Err(Error::syntax(
                            start.line,
                            start.column,
                            format!(
                                "closing parenthesis '{close}' does not match \
                                 opening parenthesis '{open}'"
                            ),
                        ));
                    }
                    None => {
                        return Err(Error::syntax(
                            start.line,
                            start.column,
                            format!("unmatched '{close}'"),
                        ));
                    }
                }
            }
            _ => {}
        }
        self.push(TokenKind::Op, start_byte, start);
        Ok(())
    }

    /// Lex a string literal whose prefix (possibly empty) has already been consumed.
    fn string(&mut self, start_byte: usize, start: Position, prefix: &str) -> Result<()> {
        let prefix = prefix.to_ascii_lowercase();
        let formatted = prefix.contains('f') || prefix.contains('t');
        self.string_body(start, formatted, prefix.contains('r'))?;
        self.push(TokenKind::String, start_byte, start);
        Ok(())
    }

    fn string_body(&mut self, start: Position, formatted: bool, raw: bool) -> Result<()> {
        let unterminated = |triple: bool| {
            let message = if triple {
                "unterminated triple-quoted string literal"
            } else {
                "unterminated string literal"
            };
            Error::syntax(start.line, start.column, message)
        };

        let Some(quote) = self.bump() else {
            return Err(unterminated(false));
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut fields: Vec<Field> = Vec::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(unterminated(triple));
            };

            let in_expression = fields.last().is_some_and(|field| !field.in_format_spec);
            if in_expression {
                match ch {
                    '"' | '\'' => {
                        let nested = self.position();
                        self.string_body(nested, false, false)?;
                    }
                    '#' => {
                        // Comment inside a multi-line replacement field
                        while self.peek().is_some_and(|c| c != '\n' && c != '\r') {
                            self.bump();
                        }
                    }
                    '(' | '[' | '{' => {
                        if let Some(field) = fields.last_mut() {
                            field.bracket_depth += 1;
                        }
                        self.bump();
                    }
                    ')' | ']' => {
                        if let Some(field) = fields.last_mut() {
                            field.bracket_depth = field.bracket_depth.saturating_sub(1);
                        }
                        self.bump();
                    }
                    '}' => {
                        match fields.last_mut() {
                            Some(field) if field.bracket_depth > 0 => field.bracket_depth -= 1,
                            _ => {
                                fields.pop();
                            }
                        }
                        self.bump();
                    }
                    ':' => {
                        let top_level = fields.last().is_some_and(|f| f.bracket_depth == 0);
                        self.bump();
                        if top_level && self.peek() != Some('=') {
                            if let Some(field) = fields.last_mut() {
                                field.in_format_spec = true;
                            }
                        }
                    }
                    _ => {
                        self.bump();
                    }
                }
                continue;
            }

            match ch {
                '\\' => {
                    self.bump();
                    if self.bump_line_break() {
                        continue;
                    }
                    match self.peek() {
                        // A brace after a backslash is still a brace in an f-string
                        Some('{' | '}') if formatted => {}
                        // Named escape: \N{...} is not a replacement field
                        Some('N') if formatted && !raw && self.peek_nth(1) == Some('{') => {
                            while let Some(c) = self.peek() {
                                if c == quote || c == '\n' || c == '\r' {
                                    break;
                                }
                                self.bump();
                                if c == '}' {
                                    break;
                                }
                            }
                        }
                        _ => {
                            self.bump();
                        }
                    }
                }
                '{' if formatted => {
                    self.bump();
                    if fields.is_empty() && self.peek() == Some('{') {
                        self.bump();
                    } else {
                        fields.push(Field {
                            bracket_depth: 0,
                            in_format_spec: false,
                        });
                    }
                }
                '}' if formatted => {
                    self.bump();
                    if !fields.is_empty() {
                        fields.pop();
                    } else if self.peek() == Some('}') {
                        self.bump();
                    }
                }
                '\n' | '\r' => {
                    if !triple && fields.is_empty() {
                        return Err(unterminated(false));
                    }
                    self.bump_line_break();
                }
                c if c == quote => {
                    if !triple {
                        self.bump();
                        return Ok(());
                    }
                    if self.peek_nth(1) == Some(quote) && self.peek_nth(2) == Some(quote) {
                        self.bump();
                        self.bump();
                        self.bump();
                        return Ok(());
                    }
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn finish(mut self) -> Result<Vec<Token<'a>>> {
        if let Some(&(open, at)) = self.brackets.last() {
            return Err(Error::syntax(
                at.line,
                at.column,
                format!("'{open}' was never closed"),
            ));
        }
        if self.line_has_code {
            self.push_marker(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_marker(TokenKind::Dedent);
        }
        self.push_marker(TokenKind::EndMarker);
        Ok(self.tokens)
    }
}

fn matching_close(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic() || (!c.is_ascii() && !c.is_whitespace() && !c.is_control())
}

fn is_identifier_continue(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit() || c.is_numeric()
}

/// Tokenize Python source. Fails on anything the Python tokenizer would
/// reject structurally: unterminated strings, unbalanced brackets, bad dedents,
/// stray characters.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>> {
    Lexer::new(source).run()
}

/// Concatenate token texts back into source.
pub fn untokenize(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(|token| token.text).collect()
}
