use std::sync::Arc;

use crate::ast::Content;
use crate::context::Context;
use crate::error::{MailplateError, MailplateResult};
use crate::interface::{Document, ReferenceKind};
use crate::parser::parse;
use crate::procedure::Procedures;
use crate::tracing_macros::{debug, trace};

/// A Template is a compiled `$`-template that can be rendered any number of
/// times, from any number of threads.
///
/// The source is tokenized, parsed and analyzed once in [`Template::new`].
/// Rendering never mutates the template: every call to [`Template::render`]
/// evaluates the shared tree against a fresh scope built from the document.
///
/// # Example
///
/// ```rust
/// use mailplate::{Document, Procedures, Template};
///
/// let template = Template::new("Hello $print $name !").unwrap();
///
/// let document = Document::new().insert("name", "World").to_owned();
///
/// let result = template.render(&document, &Procedures::new()).unwrap();
/// assert_eq!(result, "Hello World!");
/// ```
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    root: Arc<Content>,
}

#[cfg(feature = "serde")]
impl serde::Serialize for Template {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(serde::Serialize)]
        struct TemplateHelper<'a> {
            source: &'a str,
        }

        TemplateHelper {
            source: &self.source,
        }
        .serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct TemplateHelper {
            source: String,
        }

        let helper = TemplateHelper::deserialize(deserializer)?;

        // The tree is not serialized; compile it again from the source.
        Template::new(helper.source)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse template: {}", e)))
    }
}

impl Template {
    /// Compiles `source` into a template.
    ///
    /// # Errors
    ///
    /// Returns a `MailplateError::Parse` error if the template syntax is
    /// invalid: a `$` that starts no known tag, an unterminated `$"..."`, or a
    /// block that is not closed by its matching end tag.
    pub fn new<S: Into<String>>(source: S) -> MailplateResult<Self> {
        let source = source.into();
        let root = parse(&source)?;
        Ok(Self {
            source,
            root: Arc::new(root),
        })
    }

    /// The text this template was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the template against `document`.
    ///
    /// Unbound names render as `""` and `$call`s to procedures missing from
    /// `procedures` render as `""`.
    ///
    /// # Errors
    ///
    /// Returns `MailplateError::Procedure` if a called procedure fails; the
    /// partial output is discarded.
    ///
    /// # Example
    ///
    /// ```
    /// use mailplate::{Document, Procedures, Template, Value};
    ///
    /// let template = Template::new("$for $tags [$print $tags ]$endfor ").unwrap();
    /// let document = Document::new()
    ///     .insert("tags", Value::texts(["a", "b"]))
    ///     .to_owned();
    ///
    /// let result = template.render(&document, &Procedures::new()).unwrap();
    /// assert_eq!(result, "[a][b]");
    /// ```
    pub fn render(&self, document: &Document, procedures: &Procedures<'_>) -> MailplateResult<String> {
        trace!(
            fields = document.len(),
            procedures = procedures.len(),
            "rendering template"
        );
        let mut context = Context::new(document);
        let mut output = String::with_capacity(self.source.len());
        render_node(&self.root, &mut context, procedures, &mut output)?;
        Ok(output)
    }

    /// Lists the names this template refers to, once per kind, in order of
    /// first appearance.
    ///
    /// # Example
    ///
    /// ```
    /// use mailplate::{ReferenceKind, Template};
    ///
    /// let template = Template::new("$for $items $call upper $name $endfor ").unwrap();
    ///
    /// assert_eq!(
    ///     template.references(),
    ///     vec![
    ///         ("items", ReferenceKind::Iterable),
    ///         ("upper", ReferenceKind::Procedure),
    ///         ("name", ReferenceKind::Variable),
    ///     ]
    /// );
    /// ```
    pub fn references(&self) -> Vec<(&str, ReferenceKind)> {
        let mut references = Vec::new();
        collect_references(&self.root, &mut references);
        references
    }
}

fn push_reference<'a>(
    references: &mut Vec<(&'a str, ReferenceKind)>,
    name: &'a str,
    kind: ReferenceKind,
) {
    if !references
        .iter()
        .any(|&(seen, seen_kind)| seen == name && seen_kind == kind)
    {
        references.push((name, kind));
    }
}

fn collect_references<'a>(node: &'a Content, references: &mut Vec<(&'a str, ReferenceKind)>) {
    match node {
        Content::Literal { .. } => {}
        Content::Composite { children } => {
            for child in children {
                collect_references(child, references);
            }
        }
        Content::Variable { name } => {
            push_reference(references, name, ReferenceKind::Variable);
        }
        Content::IfThenElse {
            check,
            then_branch,
            else_branch,
        } => {
            collect_references(check, references);
            collect_references(then_branch, references);
            collect_references(else_branch, references);
        }
        Content::ForLoop { name, body } => {
            push_reference(references, name, ReferenceKind::Iterable);
            collect_references(body, references);
        }
        Content::Call { name, args } => {
            push_reference(references, name, ReferenceKind::Procedure);
            for arg in args {
                collect_references(arg, references);
            }
        }
    }
}

/// Appends the evaluation of `node` to `output`.
fn render_node(
    node: &Content,
    context: &mut Context<'_>,
    procedures: &Procedures<'_>,
    output: &mut String,
) -> MailplateResult<()> {
    match node {
        Content::Literal { text } => {
            output.push_str(text);
        }
        Content::Composite { children } => {
            for child in children {
                render_node(child, context, procedures, output)?;
            }
        }
        Content::Variable { name } => {
            output.push_str(context.get(name));
        }
        Content::IfThenElse {
            check,
            then_branch,
            else_branch,
        } => {
            let mut condition = String::new();
            render_node(check, context, procedures, &mut condition)?;
            if condition.is_empty() {
                render_node(else_branch, context, procedures, output)?;
            } else {
                render_node(then_branch, context, procedures, output)?;
            }
        }
        Content::ForLoop { name, body } => {
            if context.start_loop(name) {
                while context.next() {
                    render_node(body, context, procedures, output)?;
                }
            }
        }
        Content::Call { name, args } => {
            // Arguments are evaluated even when the procedure is unknown.
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                let mut value = String::new();
                render_node(arg, context, procedures, &mut value)?;
                values.push(value);
            }

            match procedures.get(name) {
                Some(procedure) => {
                    let result = procedure
                        .call(&values)
                        .map_err(|e| MailplateError::procedure(name, &e))?;
                    output.push_str(&result);
                }
                None => {
                    debug!(name = name.as_str(), "skipping unknown procedure");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcedureError;
    use crate::interface::Value;
    use crate::procedure::{Procedure, ProcedureResult};

    fn render(source: &str, document: &Document) -> String {
        Template::new(source)
            .unwrap()
            .render(document, &Procedures::standard())
            .unwrap()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_template() {
        assert_eq!(render("", &Document::new()), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_literal_and_dollar() {
        assert_eq!(render("costs $$5", &Document::new()), "costs $5");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unbound_variable_is_empty() {
        assert_eq!(render("[$print $who ]", &Document::new()), "[]");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_if_branches() {
        let template = Template::new("$if $flag Y$else N$endif ").unwrap();
        let procedures = Procedures::new();

        let set = Document::new().insert("flag", "x").to_owned();
        assert_eq!(template.render(&set, &procedures).unwrap(), "Y");

        let empty = Document::new().insert("flag", "").to_owned();
        assert_eq!(template.render(&empty, &procedures).unwrap(), "N");
        assert_eq!(template.render(&Document::new(), &procedures).unwrap(), "N");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_if_on_array_is_false_outside_loop() {
        let document = Document::new()
            .insert("tags", Value::texts(["a"]))
            .to_owned();
        assert_eq!(render("$if $tags yes$else no$endif ", &document), "no");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_loop_over_unbound_name_renders_nothing() {
        let document = Document::new()
            .insert("tags", Value::texts(["a", "b"]))
            .to_owned();
        assert_eq!(
            render("$for $tags $tags $for $missing x$endfor $endfor ", &document),
            "ab"
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_call_arguments_render_left_to_right() {
        let document = Document::new().insert("a", "1").to_owned();
        let mut procedures = Procedures::new();
        procedures.insert("join", |args: &[String]| args.join(","));

        let template = Template::new(r#"$call join $a $"two" $b "#).unwrap();
        assert_eq!(template.render(&document, &procedures).unwrap(), "1,two,");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unknown_procedure_is_empty() {
        assert_eq!(render("<$call nothing $x >", &Document::new()), "<>");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_procedure_failure_aborts_render() {
        struct Fails;

        impl Procedure for Fails {
            fn call(&self, args: &[String]) -> ProcedureResult {
                Err(ProcedureError::new(format!("got {} args", args.len())))
            }
        }

        let mut procedures = Procedures::new();
        procedures.insert("fails", Fails);

        let template = Template::new("before $call fails $x $y ").unwrap();
        let err = template.render(&Document::new(), &procedures).unwrap_err();
        assert_eq!(
            err,
            MailplateError::Procedure {
                name: "fails".to_string(),
                message: "got 2 args".to_string(),
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_references_dedupe_per_kind() {
        let template =
            Template::new("$x $if $x $for $x $endfor $endif $call x $x $call x ").unwrap();
        assert_eq!(
            template.references(),
            vec![
                ("x", ReferenceKind::Variable),
                ("x", ReferenceKind::Iterable),
                ("x", ReferenceKind::Procedure),
            ]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_source_is_kept() {
        let template = Template::new("Hi $name ").unwrap();
        assert_eq!(template.source(), "Hi $name ");
    }
}
