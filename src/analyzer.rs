//! Turns completed grammar productions into [`Content`] nodes.
//!
//! The parser calls one of these functions each time it finishes a production,
//! so trees are assembled bottom-up.

use crate::ast::Content;
use crate::tokenizer::{Token, TokenKind, is_tag_space};

/// Strips trailing tag whitespace and the leading `$` from a token image.
fn remove_dollar(image: &str) -> &str {
    let trimmed = image.trim_end_matches(is_tag_space);
    trimmed.strip_prefix('$').unwrap_or(trimmed)
}

/// `$$`
pub(crate) fn dollar() -> Content {
    Content::Literal {
        text: "$".to_string(),
    }
}

/// Plain text, kept verbatim.
pub(crate) fn literal(token: &Token<'_>) -> Content {
    Content::Literal {
        text: token.text.to_string(),
    }
}

/// The bare identifier of a `VARIABLE` token, e.g. `"name"` for `"$name  "`.
pub(crate) fn variable_name<'a>(token: &Token<'a>) -> &'a str {
    remove_dollar(token.text)
}

pub(crate) fn variable(token: &Token<'_>) -> Content {
    Content::Variable {
        name: variable_name(token).to_string(),
    }
}

/// `$"text"` becomes the text between the quotes.
pub(crate) fn parsed_literal(token: &Token<'_>) -> Content {
    let quoted = remove_dollar(token.text);
    let text = quoted
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or_default();
    Content::Literal {
        text: text.to_string(),
    }
}

/// Used for both `content` and `plain` productions.
pub(crate) const fn composite(children: Vec<Content>) -> Content {
    Content::Composite { children }
}

pub(crate) fn if_then_else(
    check: Content,
    then_branch: Content,
    else_branch: Option<Content>,
) -> Content {
    Content::IfThenElse {
        check: Box::new(check),
        then_branch: Box::new(then_branch),
        else_branch: Box::new(else_branch.unwrap_or_else(Content::empty)),
    }
}

pub(crate) fn for_loop(name: &Token<'_>, body: Content) -> Content {
    Content::ForLoop {
        name: variable_name(name).to_string(),
        body: Box::new(body),
    }
}

/// Whether a plain-text token can name a procedure, as `upper` does in
/// `$call upper $x`: an identifier followed only by tag whitespace.
pub(crate) fn is_bare_name(token: &Token<'_>) -> bool {
    if token.kind != TokenKind::Literal {
        return false;
    }
    let mut chars = token.text.trim_end_matches(is_tag_space).chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_alphanumeric())
}

/// `name` is either a `VARIABLE` token or a bare name.
pub(crate) fn call(name: &Token<'_>, args: Vec<Content>) -> Content {
    Content::Call {
        name: variable_name(name).to_string(),
        args,
    }
}
