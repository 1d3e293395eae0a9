//! Stack of open elements helpers.

use crate::types::NodeId;

/// Entry in the stack of open elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OpenElement {
    pub(crate) node: NodeId,
    pub(crate) name: String,
}

impl OpenElement {
    pub(crate) fn new(node: NodeId, name: &str) -> Self {
        Self {
            node,
            name: name.to_string(),
        }
    }
}

/// Scope classes used by end-tag handling.
///
/// Scope flavor is chosen by the caller algorithm context (for example, an
/// InBody end-tag path), not as a universal property of a tag name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    /// HTML "in scope" baseline.
    InScope,
    /// HTML "in button scope".
    Button,
    /// HTML "in list-item scope".
    ListItem,
}

fn is_scope_boundary(name: &str, kind: ScopeKind) -> bool {
    let base = matches!(
        name,
        "applet"
            | "caption"
            | "html"
            | "table"
            | "td"
            | "th"
            | "marquee"
            | "object"
            | "template"
    );
    base || match kind {
        ScopeKind::InScope => false,
        ScopeKind::Button => name == "button",
        ScopeKind::ListItem => matches!(name, "ol" | "ul"),
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct OpenElementsStack {
    items: Vec<OpenElement>,
    max_depth: u32,
}

impl OpenElementsStack {
    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn push(&mut self, entry: OpenElement) {
        self.items.push(entry);
        self.max_depth = self.max_depth.max(self.items.len() as u32);
    }

    pub(crate) fn current(&self) -> Option<&OpenElement> {
        self.items.last()
    }

    pub(crate) fn current_name(&self) -> Option<&str> {
        self.items.last().map(|e| e.name.as_str())
    }

    pub(crate) fn pop(&mut self) -> Option<OpenElement> {
        self.items.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub(crate) fn get(&self, index: usize) -> Option<&OpenElement> {
        self.items.get(index)
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.items.iter().map(|e| e.name.as_str())
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) {
        if let Some(index) = self.items.iter().rposition(|e| e.node == node) {
            self.items.remove(index);
        }
    }

    pub(crate) fn has_in_scope(&self, target: &str, kind: ScopeKind) -> bool {
        self.find_in_scope(|name| name == target, kind).is_some()
    }

    pub(crate) fn has_any_in_scope(&self, pred: impl Fn(&str) -> bool, kind: ScopeKind) -> bool {
        self.find_in_scope(pred, kind).is_some()
    }

    /// Removes elements from the top down to and including the topmost one
    /// matching `pred`, when it is visible in the requested scope.
    pub(crate) fn pop_until_including_in_scope(
        &mut self,
        pred: impl Fn(&str) -> bool,
        kind: ScopeKind,
    ) -> Option<OpenElement> {
        let index = self.find_in_scope(pred, kind)?;
        self.items.truncate(index + 1);
        self.items.pop()
    }

    fn find_in_scope(&self, pred: impl Fn(&str) -> bool, kind: ScopeKind) -> Option<usize> {
        for (index, entry) in self.items.iter().enumerate().rev() {
            if pred(&entry.name) {
                return Some(index);
            }
            if is_scope_boundary(&entry.name, kind) {
                return None;
            }
        }
        None
    }
}
