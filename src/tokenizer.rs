use crate::error::{ParseError, ParseErrorKind};

/// The token table, in priority order. When two patterns match the same
/// length the earlier one wins, which is how `$if ` becomes `IfStart` rather
/// than a variable named `if`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TokenKind {
    /// `$$`
    Dollar,
    /// `$if` + whitespace
    IfStart,
    /// `$else` + whitespace
    Else,
    /// `$endif` + whitespace
    IfEnd,
    /// `$for` + whitespace
    ForStart,
    /// `$endfor` + whitespace
    ForEnd,
    /// `$call` + whitespace
    CallStart,
    /// `$print` + whitespace
    Print,
    /// `$"..."` + optional whitespace
    ParsedLiteral,
    /// `$` + letter + letters/digits + optional whitespace
    Variable,
    /// A run of text without `$`
    Literal,
}

const KEYWORDS: [(&str, TokenKind); 7] = [
    ("if", TokenKind::IfStart),
    ("else", TokenKind::Else),
    ("endif", TokenKind::IfEnd),
    ("for", TokenKind::ForStart),
    ("endfor", TokenKind::ForEnd),
    ("call", TokenKind::CallStart),
    ("print", TokenKind::Print),
];

impl TokenKind {
    /// Human readable name used in parse errors.
    pub(crate) const fn describe(self) -> &'static str {
        match self {
            Self::Dollar => "'$$'",
            Self::IfStart => "'$if'",
            Self::Else => "'$else'",
            Self::IfEnd => "'$endif'",
            Self::ForStart => "'$for'",
            Self::ForEnd => "'$endfor'",
            Self::CallStart => "'$call'",
            Self::Print => "'$print'",
            Self::ParsedLiteral => "quoted literal",
            Self::Variable => "variable",
            Self::Literal => "text",
        }
    }
}

/// 1-indexed location of a token in the template source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    /// The full matched image, including any swallowed trailing whitespace.
    pub text: &'a str,
    pub position: Position,
}

/// The whitespace class used by the tag patterns.
pub(crate) const fn is_tag_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
}

impl<'a> Tokenizer<'a> {
    const fn new(input: &'a str) -> Self {
        Tokenizer {
            input,
            pos: 0,
            line: 1,
            line_start_pos: 0,
        }
    }

    #[inline]
    const fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.pos.saturating_sub(self.line_start_pos).saturating_add(1),
        }
    }

    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        let position = self.position();
        ParseError {
            line: position.line,
            column: position.column,
            kind,
        }
    }

    fn rest(&self) -> &'a str {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Consumes `len` bytes as a token of `kind`, keeping line tracking
    /// correct for images that span newlines.
    fn emit(&mut self, kind: TokenKind, len: usize) -> Token<'a> {
        let position = self.position();
        let text = self.rest().get(..len).unwrap_or_default();
        for (offset, c) in text.char_indices() {
            if c == '\n' {
                self.line = self.line.saturating_add(1);
                self.line_start_pos = self.pos.saturating_add(offset).saturating_add(1);
            }
        }
        self.pos = self.pos.saturating_add(text.len());
        Token {
            kind,
            text,
            position,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        let rest = self.rest();
        if rest.is_empty() {
            return Ok(None);
        }

        if !rest.starts_with('$') {
            let len = rest.find('$').unwrap_or(rest.len());
            return Ok(Some(self.emit(TokenKind::Literal, len)));
        }

        let (kind, len) = match_tag(rest).map_err(|kind| self.make_error(kind))?;
        Ok(Some(self.emit(kind, len)))
    }
}

/// Matches a tag at the start of `rest`, which must begin with `$`.
fn match_tag(rest: &str) -> Result<(TokenKind, usize), ParseErrorKind> {
    let after_dollar = rest.get(1..).unwrap_or_default();

    if after_dollar.starts_with('$') {
        return Ok((TokenKind::Dollar, 2));
    }

    if let Some(quoted) = after_dollar.strip_prefix('"') {
        let Some(close) = quoted.find('"') else {
            return Err(ParseErrorKind::UnterminatedLiteral);
        };
        // `$"` + body + `"`
        let image = close.saturating_add(3);
        let trailing = leading_space_len(rest.get(image..).unwrap_or_default());
        return Ok((TokenKind::ParsedLiteral, image.saturating_add(trailing)));
    }

    let starts_with_letter = after_dollar
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter {
        return Err(ParseErrorKind::InvalidTag {
            at: rest.chars().take(2).collect(),
        });
    }

    let ident_len = after_dollar
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after_dollar.len());
    let ident = after_dollar.get(..ident_len).unwrap_or_default();
    let after_ident = after_dollar.get(ident_len..).unwrap_or_default();
    let trailing = leading_space_len(after_ident);
    let len = ident_len.saturating_add(1).saturating_add(trailing);

    // Keywords need at least one whitespace character (or the end of input)
    // after them; otherwise the same characters form a variable of equal length.
    let keyword = KEYWORDS
        .iter()
        .find(|(word, _)| *word == ident)
        .map(|(_, kind)| *kind)
        .filter(|_| trailing > 0 || after_ident.is_empty());

    Ok((keyword.unwrap_or(TokenKind::Variable), len))
}

fn leading_space_len(s: &str) -> usize {
    s.find(|c: char| !is_tag_space(c)).unwrap_or(s.len())
}

/// Splits template text into tokens. Also returns the position just past the
/// last token so the parser can report errors at end of input.
pub(crate) fn tokenize(input: &str) -> Result<(Vec<Token<'_>>, Position), ParseError> {
    let mut tokenizer = Tokenizer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token()? {
        tokens.push(token);
    }
    Ok((tokens, tokenizer.position()))
}
