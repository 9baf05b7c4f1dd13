//! Per-line views over a token stream.

use crate::lexer::{Token, TokenKind};

/// True iff the only code on the line is one or more closing brackets.
///
/// Line breaks, whitespace, indentation markers and comments are ignored. Any
/// other code token, including the tail of a string literal or an opening
/// bracket, makes the line a code line.
pub fn is_bracket_only_line(line_tokens: &[&Token<'_>]) -> bool {
    let mut code = line_tokens.iter().filter(|token| !token.is_trivia()).peekable();
    code.peek().is_some() && code.all(|token| token.is_closing_bracket())
}

#[derive(Debug, Clone, Default)]
struct LineInfo {
    /// Byte range of the line content, terminator excluded
    content: (usize, usize),
    /// Tokens starting on this line
    tokens: Vec<usize>,
    /// A multi-line token from an earlier line runs into this line
    covered_by: Option<usize>,
    /// Earliest line holding an opening bracket closed on this line
    group_start: Option<usize>,
    /// The line ends with a real line break token, not inside a string or
    /// after a backslash
    ends_clean: bool,
}

/// Line-addressable view of one file's tokens. Lines are 1-based.
pub struct LineTable<'t, 'a> {
    source: &'a str,
    tokens: &'t [Token<'a>],
    lines: Vec<LineInfo>,
}

impl<'t, 'a> LineTable<'t, 'a> {
    pub fn new(source: &'a str, tokens: &'t [Token<'a>]) -> Self {
        let mut lines: Vec<LineInfo> = split_lines(source)
            .into_iter()
            .map(|content| LineInfo {
                content,
                ..LineInfo::default()
            })
            .collect();

        let mut open_brackets: Vec<usize> = Vec::new();
        for (idx, token) in tokens.iter().enumerate() {
            if token.kind == TokenKind::Op && matches!(token.text, "(" | "[" | "{") {
                open_brackets.push(token.start.line);
            }
            let opened_on = if token.is_closing_bracket() {
                open_brackets.pop()
            } else {
                None
            };

            let Some(info) = lines.get_mut(token.start.line - 1) else {
                continue;
            };
            info.tokens.push(idx);
            if token.is_line_break() {
                info.ends_clean = true;
            }
            if let Some(opened_on) = opened_on {
                info.group_start = Some(info.group_start.map_or(opened_on, |l| l.min(opened_on)));
            }

            if token.kind == TokenKind::String && token.end.line > token.start.line {
                let first = token.start.line;
                let last = token.end.line.min(lines.len());
                for covered in &mut lines[first..last] {
                    covered.covered_by = Some(idx);
                }
            }
        }

        // A final line without a terminator still ends cleanly: nothing can be
        // open at end of file once tokenizing has succeeded.
        let ends_with_break = source.ends_with('\n') || source.ends_with('\r');
        if let Some(last) = lines.last_mut() {
            if !ends_with_break {
                last.ends_clean = true;
            }
        }

        Self {
            source,
            tokens,
            lines,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lines.len()
    }

    fn info(&self, line: usize) -> Option<&LineInfo> {
        line.checked_sub(1).and_then(|idx| self.lines.get(idx))
    }

    /// Tokens belonging to `line`: a multi-line string running into it, then
    /// every token that starts on it.
    pub fn line_tokens(&self, line: usize) -> Vec<&'t Token<'a>> {
        let Some(info) = self.info(line) else {
            return Vec::new();
        };
        let tokens = self.tokens;
        info.covered_by
            .iter()
            .chain(info.tokens.iter())
            .map(|&idx| &tokens[idx])
            .collect()
    }

    /// Indices into the token slice of the tokens starting on `line`.
    pub fn token_indices(&self, line: usize) -> &[usize] {
        self.info(line).map_or(&[], |info| info.tokens.as_slice())
    }

    pub fn is_bracket_only(&self, line: usize) -> bool {
        is_bracket_only_line(&self.line_tokens(line))
    }

    pub fn has_code(&self, line: usize) -> bool {
        self.line_tokens(line).iter().any(|token| !token.is_trivia())
    }

    /// Index of the comment token on `line`, if there is one.
    pub fn comment(&self, line: usize) -> Option<usize> {
        self.token_indices(line)
            .iter()
            .copied()
            .find(|&idx| self.tokens[idx].kind == TokenKind::Comment)
    }

    /// Earliest line with an opening bracket that a bracket on `line` closes.
    pub fn group_start(&self, line: usize) -> Option<usize> {
        self.info(line).and_then(|info| info.group_start)
    }

    pub fn ends_clean(&self, line: usize) -> bool {
        self.info(line).is_some_and(|info| info.ends_clean)
    }

    /// Whether a new line may be inserted directly above `line` without
    /// landing inside a string or breaking a backslash continuation.
    pub fn starts_clean(&self, line: usize) -> bool {
        line == 1 || (self.info(line).is_some() && self.ends_clean(line - 1))
    }

    /// Line content without its terminator.
    pub fn text(&self, line: usize) -> &'a str {
        self.info(line)
            .map_or("", |info| &self.source[info.content.0..info.content.1])
    }

    /// Leading spaces, tabs and form feeds of the line.
    pub fn indentation(&self, line: usize) -> &'a str {
        let text = self.text(line);
        let trimmed = text.trim_start_matches([' ', '\t', '\x0C']);
        &text[..text.len() - trimmed.len()]
    }
}

/// Content byte ranges of each line, split on `\n`, `\r\n` and `\r`.
fn split_lines(source: &str) -> Vec<(usize, usize)> {
    let bytes = source.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push((start, i));
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push((start, i));
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        lines.push((start, bytes.len()));
    }
    lines
}
