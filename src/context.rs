//! Per-render evaluation scope.
//!
//! A [`Context`] mirrors one [`Document`] as an arena of scope-nodes. Loop
//! cursors live in a table parallel to the arena, so the document itself is
//! only ever borrowed. The visible bindings (`flat`) are recomputed from
//! scratch after every cursor change:
//!
//! - the document's top-level fields are merged first;
//! - a text list contributes its current element (or `""` outside a loop);
//! - an object list contributes `""` under its own name and, while a loop has
//!   an element selected, queues that element's fields for the next level.
//!
//! Later levels overwrite earlier ones, so fields of the innermost active
//! object shadow outer names.

use std::collections::HashMap;

use crate::interface::{Document, Value};
use crate::tracing_macros::trace;

type NodeId = usize;
type ScopeId = usize;

/// The scope holding the document's top-level fields.
const ROOT: ScopeId = 0;

enum ScopeNode<'d> {
    Text(&'d str),
    TextArray(&'d [String]),
    ObjectArray(Vec<ScopeId>),
}

impl ScopeNode<'_> {
    fn len(&self) -> usize {
        match self {
            Self::Text(_) => 0,
            Self::TextArray(texts) => texts.len(),
            Self::ObjectArray(objects) => objects.len(),
        }
    }
}

/// An active `$for`. `saved` is the cursor the node had before the loop
/// started, restored when the loop ends.
struct LoopFrame {
    node: NodeId,
    saved: Option<usize>,
}

pub(crate) struct Context<'d> {
    nodes: Vec<ScopeNode<'d>>,
    /// `None` is "before the first element".
    cursors: Vec<Option<usize>>,
    scopes: Vec<Vec<(&'d str, NodeId)>>,
    flat: HashMap<&'d str, NodeId>,
    loops: Vec<LoopFrame>,
}

impl<'d> Context<'d> {
    pub(crate) fn new(document: &'d Document) -> Self {
        let mut context = Self {
            nodes: Vec::new(),
            cursors: Vec::new(),
            scopes: Vec::new(),
            flat: HashMap::new(),
            loops: Vec::new(),
        };
        context.build_scope(document);
        context.flatten();
        context
    }

    fn build_scope(&mut self, document: &'d Document) -> ScopeId {
        let scope = self.scopes.len();
        self.scopes.push(Vec::with_capacity(document.len()));

        let mut entries = Vec::with_capacity(document.len());
        for (name, value) in document.iter() {
            let node = self.build_node(value);
            entries.push((name, node));
        }

        if let Some(slot) = self.scopes.get_mut(scope) {
            *slot = entries;
        }
        scope
    }

    fn build_node(&mut self, value: &'d Value) -> NodeId {
        let node = match value {
            Value::Text(text) => ScopeNode::Text(text),
            Value::TextList(texts) => ScopeNode::TextArray(texts),
            Value::ObjectList(objects) => {
                let scopes = objects
                    .iter()
                    .map(|object| self.build_scope(object))
                    .collect();
                ScopeNode::ObjectArray(scopes)
            }
        };
        let id = self.nodes.len();
        self.nodes.push(node);
        self.cursors.push(None);
        id
    }

    fn cursor(&self, node: NodeId) -> Option<usize> {
        self.cursors.get(node).copied().flatten()
    }

    fn set_cursor(&mut self, node: NodeId, cursor: Option<usize>) {
        if let Some(slot) = self.cursors.get_mut(node) {
            *slot = cursor;
        }
    }

    /// The value currently visible under `key`, `""` when unbound.
    pub(crate) fn get(&self, key: &str) -> &'d str {
        let Some(&node) = self.flat.get(key) else {
            return "";
        };
        match self.nodes.get(node) {
            Some(&ScopeNode::Text(text)) => text,
            Some(&ScopeNode::TextArray(texts)) => self
                .cursor(node)
                .and_then(|index| texts.get(index))
                .map_or("", String::as_str),
            Some(&ScopeNode::ObjectArray(_)) | None => "",
        }
    }

    /// Starts iterating the node bound to `key`, rewinding it to before its
    /// first element. Returns `false`, and changes nothing, if `key` is
    /// unbound.
    pub(crate) fn start_loop(&mut self, key: &str) -> bool {
        let Some(&node) = self.flat.get(key) else {
            trace!(name = key, "loop over unbound name");
            return false;
        };
        let saved = self.cursor(node);
        self.set_cursor(node, None);
        self.loops.push(LoopFrame { node, saved });
        true
    }

    /// Advances the innermost loop. When it runs out of elements the loop is
    /// popped and `false` is returned.
    pub(crate) fn next(&mut self) -> bool {
        let Some(frame) = self.loops.last() else {
            return false;
        };
        let node = frame.node;
        let saved = frame.saved;

        let len = self.nodes.get(node).map_or(0, ScopeNode::len);
        let candidate = self.cursor(node).map_or(0, |index| index.saturating_add(1));
        let advanced = candidate < len;

        if advanced {
            self.set_cursor(node, Some(candidate));
        } else {
            self.loops.pop();
            self.set_cursor(node, saved);
        }
        self.flatten();
        advanced
    }

    /// Rebuilds the visible bindings breadth-first from the root scope.
    fn flatten(&mut self) {
        self.flat.clear();

        let mut queue = vec![ROOT];
        let mut level = 0;
        while let Some(&scope) = queue.get(level) {
            level = level.saturating_add(1);
            let Some(entries) = self.scopes.get(scope) else {
                continue;
            };
            for &(name, node) in entries {
                self.flat.insert(name, node);
                if let Some(ScopeNode::ObjectArray(objects)) = self.nodes.get(node) {
                    let selected = self
                        .cursors
                        .get(node)
                        .copied()
                        .flatten()
                        .and_then(|index| objects.get(index));
                    if let Some(&object) = selected {
                        queue.push(object);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(fields: &[(&str, &str)]) -> Document {
        fields.iter().copied().collect()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_get_text() {
        let document = object(&[("name", "Al")]);
        let context = Context::new(&document);
        assert_eq!(context.get("name"), "Al");
        assert_eq!(context.get("missing"), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_arrays_are_empty_outside_loops() {
        let document = Document::new()
            .insert("tags", Value::texts(["a", "b"]))
            .insert("items", Value::objects([object(&[("n", "1")])]))
            .to_owned();
        let context = Context::new(&document);
        assert_eq!(context.get("tags"), "");
        assert_eq!(context.get("items"), "");
        assert_eq!(context.get("n"), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_next_without_loop() {
        let document = Document::new();
        let mut context = Context::new(&document);
        assert!(!context.next());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_text_array_loop_shadows_own_name() {
        let document = Document::new()
            .insert("tags", Value::texts(["a", "b"]))
            .to_owned();
        let mut context = Context::new(&document);

        assert!(context.start_loop("tags"));
        assert!(context.next());
        assert_eq!(context.get("tags"), "a");
        assert!(context.next());
        assert_eq!(context.get("tags"), "b");
        assert!(!context.next());
        assert_eq!(context.get("tags"), "");
        assert!(context.loops.is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_text_loop_has_no_iterations() {
        let document = object(&[("name", "Al")]);
        let mut context = Context::new(&document);
        assert!(context.start_loop("name"));
        assert!(!context.next());
        assert_eq!(context.get("name"), "Al");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unbound_loop_is_noop() {
        let document = Document::new()
            .insert("tags", Value::texts(["a", "b"]))
            .to_owned();
        let mut context = Context::new(&document);

        assert!(context.start_loop("tags"));
        assert!(context.next());
        assert!(!context.start_loop("missing"));
        // The outer loop was not advanced by the failed start.
        assert_eq!(context.get("tags"), "a");
        assert_eq!(context.loops.len(), 1);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_object_fields_shadow_outer_names() {
        let document = Document::new()
            .insert("n", "outer")
            .insert(
                "items",
                Value::objects([object(&[("n", "1")]), object(&[("m", "2")])]),
            )
            .to_owned();
        let mut context = Context::new(&document);

        assert!(context.start_loop("items"));
        assert!(context.next());
        assert_eq!(context.get("n"), "1");
        assert_eq!(context.get("m"), "");
        assert_eq!(context.get("items"), "");

        assert!(context.next());
        assert_eq!(context.get("n"), "outer");
        assert_eq!(context.get("m"), "2");

        assert!(!context.next());
        assert_eq!(context.get("n"), "outer");
        assert_eq!(context.get("m"), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nested_loop_bindings_do_not_leak() {
        let inner_a = object(&[("leaf", "a1")]);
        let inner_b = object(&[("leaf", "b1")]);
        let document = Document::new()
            .insert(
                "groups",
                Value::objects([
                    Document::new()
                        .insert("name", "A")
                        .insert("children", Value::objects([inner_a]))
                        .to_owned(),
                    Document::new()
                        .insert("name", "B")
                        .insert("children", Value::objects([inner_b]))
                        .to_owned(),
                ]),
            )
            .to_owned();
        let mut context = Context::new(&document);

        assert!(context.start_loop("groups"));
        assert!(context.next());
        assert_eq!(context.get("name"), "A");

        assert!(context.start_loop("children"));
        assert!(context.next());
        assert_eq!(context.get("leaf"), "a1");
        assert_eq!(context.get("name"), "A");
        assert!(!context.next());
        assert_eq!(context.get("leaf"), "");

        assert!(context.next());
        assert_eq!(context.get("name"), "B");
        assert_eq!(context.get("leaf"), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_reentering_active_loop_restores_cursor() {
        let document = Document::new()
            .insert("tags", Value::texts(["a", "b"]))
            .to_owned();
        let mut context = Context::new(&document);

        assert!(context.start_loop("tags"));
        assert!(context.next());
        assert_eq!(context.get("tags"), "a");

        assert!(context.start_loop("tags"));
        assert!(context.next());
        assert!(context.next());
        assert_eq!(context.get("tags"), "b");
        assert!(!context.next());

        // Back in the outer loop, still on its first element.
        assert_eq!(context.get("tags"), "a");
        assert!(context.next());
        assert_eq!(context.get("tags"), "b");
        assert!(!context.next());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_fresh_contexts_are_independent() {
        let document = Document::new()
            .insert("tags", Value::texts(["a", "b"]))
            .to_owned();
        let mut first = Context::new(&document);
        assert!(first.start_loop("tags"));
        assert!(first.next());

        let second = Context::new(&document);
        assert_eq!(first.get("tags"), "a");
        assert_eq!(second.get("tags"), "");
    }
}
