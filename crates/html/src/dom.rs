//! Arena-backed document tree owned by the coordinator.

use crate::html5::compact::CompactAttr;
use crate::html5::tree_builder::TreeSink;
use crate::types::{Node, NodeId};

#[derive(Clone, Debug)]
enum ArenaNode {
    Document {
        children: Vec<NodeId>,
    },
    Doctype {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    Element {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        inert: bool,
        children: Vec<NodeId>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl ArenaNode {
    fn children(&self) -> Option<&Vec<NodeId>> {
        match self {
            ArenaNode::Document { children } | ArenaNode::Element { children, .. } => {
                Some(children)
            }
            _ => None,
        }
    }
}

/// The real node tree. Node ids are arena indices and stay valid for the
/// lifetime of the document; nodes are never removed.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<ArenaNode>,
    mutations: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![ArenaNode::Document {
                children: Vec::new(),
            }],
            mutations: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of mutations applied so far. Lets callers observe that nothing
    /// touched the tree across an interval.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.index())
            .and_then(ArenaNode::children)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.index()) {
            Some(ArenaNode::Element { name, .. }) => Some(name),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, attr: &str) -> Option<&str> {
        match self.nodes.get(id.index()) {
            Some(ArenaNode::Element { attributes, .. }) => attributes
                .iter()
                .find(|(k, _)| k == attr)
                .map(|(_, v)| v.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    pub fn is_inert(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.index()),
            Some(ArenaNode::Element { inert: true, .. })
        )
    }

    /// Elements named `name`, in document order.
    pub fn elements_by_name(&self, name: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            if self.element_name(id) == Some(name) {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(ArenaNode::Text { text }) = self.nodes.get(id.index()) {
                out.push_str(text);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    fn push(&mut self, node: ArenaNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.mutations += 1;
        id
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        match self.nodes.get_mut(parent.index()) {
            Some(ArenaNode::Document { children } | ArenaNode::Element { children, .. }) => {
                children.push(child);
                self.mutations += 1;
            }
            _ => debug_assert!(false, "node {parent:?} cannot have children"),
        }
    }

    fn last_child(&self, parent: NodeId) -> Option<NodeId> {
        self.children(parent).last().copied()
    }

    /// Owned tree. The conversion is an iterative post-order walk, so deep
    /// documents do not recurse.
    pub fn to_node(&self) -> Node {
        let mut built: Vec<Node> = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, bool)> = vec![(NodeId::ROOT, false)];

        fn take_children(n: usize, built: &mut Vec<Node>) -> Vec<Node> {
            built.split_off(built.len().saturating_sub(n))
        }

        while let Some((id, visited)) = stack.pop() {
            let Some(node) = self.nodes.get(id.index()) else {
                continue;
            };
            if !visited {
                stack.push((id, true));
                // Reverse push so children land on `built` in document order.
                if let Some(children) = node.children() {
                    for &child in children.iter().rev() {
                        stack.push((child, false));
                    }
                }
                continue;
            }
            let out = match node {
                ArenaNode::Document { children } => Node::Document {
                    id,
                    children: take_children(children.len(), &mut built),
                },
                ArenaNode::Doctype {
                    name,
                    public_id,
                    system_id,
                } => Node::Doctype {
                    id,
                    name: name.clone(),
                    public_id: public_id.clone(),
                    system_id: system_id.clone(),
                },
                ArenaNode::Element {
                    name,
                    attributes,
                    inert,
                    children,
                } => Node::Element {
                    id,
                    name: name.clone(),
                    attributes: attributes.clone(),
                    inert: *inert,
                    children: take_children(children.len(), &mut built),
                },
                ArenaNode::Text { text } => Node::Text {
                    id,
                    text: text.clone(),
                },
                ArenaNode::Comment { text } => Node::Comment {
                    id,
                    text: text.clone(),
                },
            };
            built.push(out);
        }

        debug_assert_eq!(built.len(), 1, "document conversion must yield one root");
        built.pop().unwrap_or(Node::Document {
            id: NodeId::ROOT,
            children: Vec::new(),
        })
    }
}

impl TreeSink for Document {
    const KEEPS_CONTENT: bool = true;

    fn document(&self) -> NodeId {
        NodeId::ROOT
    }

    fn create_element(&mut self, name: &str, attrs: &[CompactAttr], inert: bool) -> NodeId {
        self.push(ArenaNode::Element {
            name: name.to_string(),
            attributes: attrs
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            inert,
            children: Vec::new(),
        })
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        self.add_child(parent, child);
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.last_child(parent) {
            if let Some(ArenaNode::Text { text: existing }) = self.nodes.get_mut(last.index()) {
                existing.push_str(text);
                self.mutations += 1;
                return;
            }
        }
        let node = self.push(ArenaNode::Text {
            text: text.to_string(),
        });
        self.add_child(parent, node);
    }

    fn append_comment(&mut self, parent: NodeId, text: &str) {
        let node = self.push(ArenaNode::Comment {
            text: text.to_string(),
        });
        self.add_child(parent, node);
    }

    fn append_doctype(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        let node = self.push(ArenaNode::Doctype {
            name: name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        });
        self.add_child(NodeId::ROOT, node);
    }
}

#[cfg(test)]
mod tests {
    use super::Document;
    use crate::html5::compact::CompactAttr;
    use crate::html5::tree_builder::TreeSink;
    use crate::types::Node;

    #[test]
    fn adjacent_text_coalesces() {
        let mut doc = Document::new();
        let p = doc.create_element("p", &[], false);
        doc.append(doc.root(), p);
        doc.append_text(p, "a");
        doc.append_text(p, "b");
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "ab");
    }

    #[test]
    fn to_node_preserves_order_and_attributes() {
        let mut doc = Document::new();
        let div = doc.create_element("div", &[CompactAttr::new("id", Some("x"))], false);
        doc.append(doc.root(), div);
        for name in ["a", "b", "c"] {
            let child = doc.create_element(name, &[], false);
            doc.append(div, child);
        }
        let Node::Document { children, .. } = doc.to_node() else {
            panic!("root must be a document");
        };
        let Node::Element {
            name,
            attributes,
            children,
            ..
        } = &children[0]
        else {
            panic!("expected element");
        };
        assert_eq!(name, "div");
        assert_eq!(attributes, &vec![("id".to_string(), Some("x".to_string()))]);
        let names: Vec<_> = children.iter().filter_map(Node::element_name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn deep_documents_convert_without_recursion() {
        let mut doc = Document::new();
        let mut parent = doc.root();
        for _ in 0..5_000 {
            let child = doc.create_element("div", &[], false);
            doc.append(parent, child);
            parent = child;
        }
        let node = doc.to_node();
        assert_eq!(node.children().len(), 1);
        assert_eq!(doc.node_count(), 5_001);
    }

    #[test]
    fn elements_by_name_is_document_order() {
        let mut doc = Document::new();
        let a = doc.create_element("p", &[], false);
        let b = doc.create_element("p", &[], false);
        let span = doc.create_element("span", &[], false);
        doc.append(doc.root(), a);
        doc.append(a, span);
        doc.append(doc.root(), b);
        assert_eq!(doc.elements_by_name("p"), vec![a, b]);
    }
}
