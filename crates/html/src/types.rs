use serde::Serialize;

/// Index of a node in a [`crate::Document`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owned node tree, produced by [`crate::Document::to_node`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Document {
        id: NodeId,
        children: Vec<Node>,
    },
    Doctype {
        id: NodeId,
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    Element {
        id: NodeId,
        name: String,
        attributes: Vec<(String, Option<String>)>,
        /// Neutralized by the content filter: never executed, never fetched.
        inert: bool,
        children: Vec<Node>,
    },
    Text {
        id: NodeId,
        text: String,
    },
    Comment {
        id: NodeId,
        text: String,
    },
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Document { id, .. }
            | Node::Doctype { id, .. }
            | Node::Element { id, .. }
            | Node::Text { id, .. }
            | Node::Comment { id, .. } => *id,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children, .. } | Node::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Document { children, .. } => Some(children),
            Node::Element { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn element_name(&self) -> Option<&str> {
        match self {
            Node::Element { name, .. } => Some(name),
            _ => None,
        }
    }
}
