/// A compiled template node.
///
/// Trees are immutable once built and are shared between renders; all
/// per-render state lives in [`crate::context::Context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Content {
    /// A constant block of text from the template, with `$$` already reduced.
    Literal { text: String },
    /// Children rendered left to right and concatenated.
    Composite { children: Vec<Content> },
    /// A name looked up in the current scope, `""` when unbound.
    Variable { name: String },
    /// Renders `then_branch` if `check` renders to a non-empty string.
    IfThenElse {
        check: Box<Content>,
        then_branch: Box<Content>,
        else_branch: Box<Content>,
    },
    /// Renders `body` once per element of the collection bound to `name`.
    ForLoop { name: String, body: Box<Content> },
    /// Invokes a named procedure with the rendered arguments.
    Call { name: String, args: Vec<Content> },
}

impl Content {
    pub(crate) fn empty() -> Self {
        Self::Literal {
            text: String::new(),
        }
    }

    /// Number of nodes in this tree, including `self`.
    #[cfg_attr(
        not(any(test, feature = "tracing")),
        allow(dead_code, reason = "only logged")
    )]
    pub(crate) fn node_count(&self) -> usize {
        let children: usize = match self {
            Self::Literal { .. } | Self::Variable { .. } => 0,
            Self::Composite { children } => children.iter().map(Self::node_count).sum(),
            Self::IfThenElse {
                check,
                then_branch,
                else_branch,
            } => check
                .node_count()
                .saturating_add(then_branch.node_count())
                .saturating_add(else_branch.node_count()),
            Self::ForLoop { body, .. } => body.node_count(),
            Self::Call { args, .. } => args.iter().map(Self::node_count).sum(),
        };
        children.saturating_add(1)
    }
}
