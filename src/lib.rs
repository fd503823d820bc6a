//! `mailplate` renders `$`-templates, the small templating language used for
//! transactional mail bodies.
//!
//! ```text
//! Dear $name ,
//! $if $items Your order:
//! $for $items - $call format $"%s x %s%n" $count $title $endfor
//! $else Your cart is empty.
//! $endif
//! ```
//!
//! A [`Template`] is compiled once and rendered against a [`Document`] (text
//! fields, text lists and lists of nested documents) plus a caller-owned
//! [`Procedures`] table. Unbound names and unknown procedures render as empty
//! text; only a failing procedure aborts a render.
mod analyzer;
mod ast;
mod builtins;
mod context;
mod engine;
mod error;
mod interface;
mod parser;
mod procedure;
mod template;
mod tokenizer;
mod tracing_macros;

// Public exports.
pub use engine::{EngineConfig, MailplateEngine, TemplateConfig};
pub use error::{MailplateError, MailplateResult, ParseError, ParseErrorKind, ProcedureError};
pub use interface::{Document, MailplateInterface, ReferenceKind, Value};
pub use procedure::{Procedure, ProcedureResult, Procedures};
pub use template::Template;
