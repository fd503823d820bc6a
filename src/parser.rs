use crate::{
    analyzer,
    ast::Content,
    error::{ParseError, ParseErrorKind},
    tokenizer::{Position, Token, TokenKind, tokenize},
    tracing_macros::debug,
};

type ParseResult<T> = Result<T, ParseError>;

/// Deepest `$if`/`$for` nesting accepted. Parsing, rendering and dropping a
/// tree all recurse once per level.
pub(crate) const MAX_NESTING: usize = 256;

/// Recursive descent over the token stream.
///
/// ```text
/// email       := content
/// content     := (plain | instruction)*
/// plain       := (LITERAL | DOLLAR)+
/// instruction := if | for | output | expression
/// if          := IF_START expression content (ELSE content)? IF_END
/// for         := FOR_START VARIABLE content FOR_END
/// output      := PRINT expression
/// expression  := VARIABLE | call
/// call        := CALL_START (VARIABLE | NAME) (VARIABLE | PARSED_LITERAL)*
/// ```
///
/// `NAME` is a plain-text run holding a single identifier, so `$call upper`
/// and `$call $upper` name the same procedure.
struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    /// Position just past the final token, used for end-of-input errors.
    end: Position,
    /// Number of `content` productions currently open, the template body
    /// included.
    depth: usize,
}

impl<'a> Parser<'a> {
    const fn new(tokens: Vec<Token<'a>>, end: Position) -> Self {
        Parser {
            tokens,
            pos: 0,
            end,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos = self.pos.saturating_add(1);
        }
        token
    }

    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        let position = self.peek().map_or(self.end, |token| token.position);
        ParseError {
            line: position.line,
            column: position.column,
            kind,
        }
    }

    /// Error for the current token (or end of input) not being `expected`.
    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => self.make_error(ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.describe().to_string(),
            }),
            None => self.make_error(ParseErrorKind::unexpected_eof(Some(expected))),
        }
    }

    /// Consume a token of `kind` or fail describing `expected`.
    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token<'a>> {
        if self.peek_kind() == Some(kind) {
            if let Some(token) = self.advance() {
                return Ok(token);
            }
        }
        Err(self.unexpected(expected))
    }

    /// `email := content`, which must consume every token.
    fn parse_email(&mut self) -> ParseResult<Content> {
        let content = self.parse_content()?;
        if self.peek().is_some() {
            return Err(self.unexpected("text or an instruction"));
        }
        Ok(content)
    }

    fn parse_content(&mut self) -> ParseResult<Content> {
        if self.depth > MAX_NESTING {
            return Err(self.make_error(ParseErrorKind::NestingTooDeep { limit: MAX_NESTING }));
        }
        self.depth = self.depth.saturating_add(1);
        let content = self.parse_children();
        self.depth = self.depth.saturating_sub(1);
        content
    }

    fn parse_children(&mut self) -> ParseResult<Content> {
        let mut children = Vec::new();
        loop {
            let child = match self.peek_kind() {
                Some(TokenKind::Literal | TokenKind::Dollar) => self.parse_plain(),
                Some(TokenKind::IfStart) => self.parse_if()?,
                Some(TokenKind::ForStart) => self.parse_for()?,
                Some(TokenKind::Print) => self.parse_output()?,
                Some(TokenKind::Variable | TokenKind::CallStart) => self.parse_expression()?,
                // Anything else closes the enclosing block; the caller decides
                // whether it was expected.
                Some(
                    TokenKind::Else
                    | TokenKind::IfEnd
                    | TokenKind::ForEnd
                    | TokenKind::ParsedLiteral,
                )
                | None => break,
            };
            children.push(child);
        }
        Ok(analyzer::composite(children))
    }

    fn parse_plain(&mut self) -> Content {
        let mut children = Vec::new();
        while let Some(token) = self.peek().copied() {
            let child = match token.kind {
                TokenKind::Literal => analyzer::literal(&token),
                TokenKind::Dollar => analyzer::dollar(),
                TokenKind::IfStart
                | TokenKind::Else
                | TokenKind::IfEnd
                | TokenKind::ForStart
                | TokenKind::ForEnd
                | TokenKind::CallStart
                | TokenKind::Print
                | TokenKind::ParsedLiteral
                | TokenKind::Variable => break,
            };
            self.advance();
            children.push(child);
        }
        analyzer::composite(children)
    }

    fn parse_if(&mut self) -> ParseResult<Content> {
        self.expect(TokenKind::IfStart, TokenKind::IfStart.describe())?;
        let check = self.parse_expression()?;
        let then_branch = self.parse_content()?;

        let else_branch = if self.peek_kind() == Some(TokenKind::Else) {
            self.advance();
            let else_branch = self.parse_content()?;
            self.expect(TokenKind::IfEnd, "'$endif'")?;
            Some(else_branch)
        } else {
            self.expect(TokenKind::IfEnd, "'$else' or '$endif'")?;
            None
        };

        Ok(analyzer::if_then_else(check, then_branch, else_branch))
    }

    fn parse_for(&mut self) -> ParseResult<Content> {
        self.expect(TokenKind::ForStart, TokenKind::ForStart.describe())?;
        let name = self.expect(TokenKind::Variable, "loop variable")?;
        let body = self.parse_content()?;
        self.expect(TokenKind::ForEnd, "'$endfor'")?;
        Ok(analyzer::for_loop(&name, body))
    }

    /// `$print` only marks an expression for output; the value passes through.
    fn parse_output(&mut self) -> ParseResult<Content> {
        self.expect(TokenKind::Print, TokenKind::Print.describe())?;
        self.parse_expression()
    }

    fn parse_expression(&mut self) -> ParseResult<Content> {
        match self.peek_kind() {
            Some(TokenKind::CallStart) => self.parse_call(),
            Some(TokenKind::Variable) => {
                let token = self.expect(TokenKind::Variable, "variable")?;
                Ok(analyzer::variable(&token))
            }
            Some(_) | None => Err(self.unexpected("variable or '$call'")),
        }
    }

    fn parse_call(&mut self) -> ParseResult<Content> {
        self.expect(TokenKind::CallStart, TokenKind::CallStart.describe())?;
        let name = match self.peek().copied() {
            Some(token) if token.kind == TokenKind::Variable || analyzer::is_bare_name(&token) => {
                self.advance();
                token
            }
            Some(_) | None => return Err(self.unexpected("procedure name")),
        };

        let mut args = Vec::new();
        while let Some(token) = self.peek().copied() {
            let arg = match token.kind {
                TokenKind::Variable => analyzer::variable(&token),
                TokenKind::ParsedLiteral => analyzer::parsed_literal(&token),
                TokenKind::Dollar
                | TokenKind::IfStart
                | TokenKind::Else
                | TokenKind::IfEnd
                | TokenKind::ForStart
                | TokenKind::ForEnd
                | TokenKind::CallStart
                | TokenKind::Print
                | TokenKind::Literal => break,
            };
            self.advance();
            args.push(arg);
        }

        Ok(analyzer::call(&name, args))
    }
}

/// Parses a whole template. Any failure rejects the template; there is no
/// partial tree.
pub(crate) fn parse(input: &str) -> Result<Content, ParseError> {
    let (tokens, end) = tokenize(input)?;
    let mut parser = Parser::new(tokens, end);
    let content = parser.parse_email()?;
    debug!(
        tokens = parser.tokens.len(),
        nodes = content.node_count(),
        "parsed template"
    );
    Ok(content)
}
