use crate::Node;
use std::fmt::{self, Write};
use std::sync::OnceLock;

/// Deterministic DOM serialization and equality rules for pipeline tests.
/// Not a public stable format; intended for test comparisons and the CLI
/// report.
///
/// Equivalence rules:
/// - Node kinds must match.
/// - Element names and the inert flag must match.
/// - Attribute list order is significant; names and values must match.
/// - Text nodes must match exactly (post entity decode).
/// - Comments and doctypes must match exactly.
/// - IDs can be ignored, script elements dropped and the text around them
///   merged, by options.
#[derive(Clone, Copy, Debug)]
pub struct DomSnapshotOptions {
    pub ignore_ids: bool,
    /// Drop `script` elements before comparing, so a tree built with script
    /// output inserted can be compared with its pre-expanded source.
    pub ignore_script_elements: bool,
    /// Merge adjacent text siblings (after script removal).
    pub merge_adjacent_text: bool,
}

impl Default for DomSnapshotOptions {
    fn default() -> Self {
        Self {
            ignore_ids: true,
            ignore_script_elements: false,
            merge_adjacent_text: false,
        }
    }
}

impl DomSnapshotOptions {
    /// Options for comparing a speculatively built tree with the tree of the
    /// same document with script output written inline.
    pub fn script_expanded() -> Self {
        Self {
            ignore_ids: true,
            ignore_script_elements: true,
            merge_adjacent_text: true,
        }
    }
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(root: &Node, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        let mut indent_level = 0usize;
        let root = normalize(root, &options);
        walk_snapshot(&root, &options, &mut indent_level, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DomMismatch<'a> {
    path: String,
    detail: String,
    expected: String,
    actual: String,
    expected_node: &'a Node,
    actual_node: &'a Node,
    options: DomSnapshotOptions,
    expected_subtree: OnceLock<String>,
    actual_subtree: OnceLock<String>,
}

impl fmt::Display for DomMismatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected_subtree = self
            .expected_subtree
            .get_or_init(|| DomSnapshot::new(self.expected_node, self.options).render());
        let actual_subtree = self
            .actual_subtree
            .get_or_init(|| DomSnapshot::new(self.actual_node, self.options).render());
        writeln!(f, "DOM mismatch at {}: {}", self.path, self.detail)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        writeln!(f, "expected subtree:\n{}", expected_subtree)?;
        writeln!(f, "actual subtree:\n{}", actual_subtree)?;
        Ok(())
    }
}

impl std::error::Error for DomMismatch<'_> {}

pub fn assert_dom_eq(expected: &Node, actual: &Node, options: DomSnapshotOptions) {
    if let Err(mismatch) = compare_dom(expected, actual, options) {
        panic!("{mismatch}");
    }
}

/// Compare two trees. With normalizing options the comparison runs on
/// normalized copies; the mismatch then describes the normalized trees.
pub fn compare_dom(
    expected: &Node,
    actual: &Node,
    options: DomSnapshotOptions,
) -> Result<(), String> {
    let expected = normalize(expected, &options);
    let actual = normalize(actual, &options);
    let mut path = vec![node_label(&expected)];
    compare_nodes(&expected, &actual, &options, &mut path).map_err(|m| m.to_string())
}

/// Copy of `node` with the structural options applied.
fn normalize(node: &Node, options: &DomSnapshotOptions) -> Node {
    let mut node = node.clone();
    if options.ignore_script_elements || options.merge_adjacent_text {
        normalize_in_place(&mut node, options);
    }
    node
}

fn normalize_in_place(node: &mut Node, options: &DomSnapshotOptions) {
    let Some(children) = node.children_mut() else {
        return;
    };
    if options.ignore_script_elements {
        children.retain(|c| c.element_name() != Some("script"));
    }
    if options.merge_adjacent_text {
        let mut merged: Vec<Node> = Vec::with_capacity(children.len());
        for child in children.drain(..) {
            if let (Some(Node::Text { text: prev, .. }), Node::Text { text, .. }) =
                (merged.last_mut(), &child)
            {
                prev.push_str(text);
                continue;
            }
            merged.push(child);
        }
        *children = merged;
    }
    for child in children.iter_mut() {
        normalize_in_place(child, options);
    }
}

fn compare_nodes<'a>(
    expected: &'a Node,
    actual: &'a Node,
    options: &DomSnapshotOptions,
    path: &mut Vec<String>,
) -> Result<(), Box<DomMismatch<'a>>> {
    if !options.ignore_ids && expected.id() != actual.id() {
        return Err(Box::new(mismatch(path, "node id", expected, actual, options)));
    }
    match (expected, actual) {
        (
            Node::Document {
                children: expected_children,
                ..
            },
            Node::Document {
                children: actual_children,
                ..
            },
        ) => compare_children(
            expected,
            actual,
            expected_children,
            actual_children,
            options,
            path,
        ),
        (
            Node::Doctype {
                name: expected_name,
                public_id: expected_public,
                system_id: expected_system,
                ..
            },
            Node::Doctype {
                name: actual_name,
                public_id: actual_public,
                system_id: actual_system,
                ..
            },
        ) => {
            if expected_name != actual_name
                || expected_public != actual_public
                || expected_system != actual_system
            {
                return Err(Box::new(mismatch(
                    path, "doctype", expected, actual, options,
                )));
            }
            Ok(())
        }
        (
            Node::Element {
                name: expected_name,
                attributes: expected_attrs,
                inert: expected_inert,
                children: expected_children,
                ..
            },
            Node::Element {
                name: actual_name,
                attributes: actual_attrs,
                inert: actual_inert,
                children: actual_children,
                ..
            },
        ) => {
            if expected_name != actual_name {
                return Err(Box::new(mismatch(
                    path,
                    "element name",
                    expected,
                    actual,
                    options,
                )));
            }
            if expected_inert != actual_inert {
                return Err(Box::new(mismatch(
                    path, "inert flag", expected, actual, options,
                )));
            }
            if expected_attrs.len() != actual_attrs.len() {
                return Err(Box::new(mismatch(
                    path,
                    "attribute count",
                    expected,
                    actual,
                    options,
                )));
            }
            for (i, (exp, act)) in expected_attrs.iter().zip(actual_attrs.iter()).enumerate() {
                if exp.0 != act.0 {
                    return Err(Box::new(mismatch(
                        path,
                        &format!("attribute name at index {i}"),
                        expected,
                        actual,
                        options,
                    )));
                }
                if exp.1 != act.1 {
                    return Err(Box::new(mismatch(
                        path,
                        &format!("attribute value at index {i}"),
                        expected,
                        actual,
                        options,
                    )));
                }
            }
            compare_children(
                expected,
                actual,
                expected_children,
                actual_children,
                options,
                path,
            )
        }
        (
            Node::Text {
                text: expected_text,
                ..
            },
            Node::Text {
                text: actual_text, ..
            },
        ) => {
            if expected_text != actual_text {
                return Err(Box::new(mismatch(path, "text", expected, actual, options)));
            }
            Ok(())
        }
        (
            Node::Comment {
                text: expected_text,
                ..
            },
            Node::Comment {
                text: actual_text, ..
            },
        ) => {
            if expected_text != actual_text {
                return Err(Box::new(mismatch(
                    path, "comment", expected, actual, options,
                )));
            }
            Ok(())
        }
        _ => Err(Box::new(mismatch(
            path,
            "node kind",
            expected,
            actual,
            options,
        ))),
    }
}

fn compare_children<'a>(
    expected_parent: &'a Node,
    actual_parent: &'a Node,
    expected: &'a [Node],
    actual: &'a [Node],
    options: &DomSnapshotOptions,
    path: &mut Vec<String>,
) -> Result<(), Box<DomMismatch<'a>>> {
    if expected.len() != actual.len() {
        return Err(Box::new(mismatch(
            path,
            &format!(
                "child count (expected {}, actual {})",
                expected.len(),
                actual.len()
            ),
            expected_parent,
            actual_parent,
            options,
        )));
    }
    for (idx, (exp, act)) in expected.iter().zip(actual.iter()).enumerate() {
        path.push(format!("{}[{}]", node_label(exp), idx));
        let result = compare_nodes(exp, act, options, path);
        path.pop();
        result?;
    }
    Ok(())
}

fn mismatch<'a>(
    path: &[String],
    detail: &str,
    expected: &'a Node,
    actual: &'a Node,
    options: &DomSnapshotOptions,
) -> DomMismatch<'a> {
    let path = format!("/{}", path.join("/"));
    let expected_line = format_node_line(expected, options);
    let actual_line = format_node_line(actual, options);
    DomMismatch {
        path,
        detail: detail.to_string(),
        expected: truncate_line(expected_line, 160),
        actual: truncate_line(actual_line, 160),
        expected_node: expected,
        actual_node: actual,
        options: *options,
        expected_subtree: OnceLock::new(),
        actual_subtree: OnceLock::new(),
    }
}

fn node_label(node: &Node) -> String {
    match node {
        Node::Document { .. } => "#document".to_string(),
        Node::Doctype { .. } => "#doctype".to_string(),
        Node::Element {
            name, attributes, ..
        } => {
            let mut label = name.clone();
            let id_attr = attributes
                .iter()
                .find(|(key, _)| key == "id")
                .and_then(|(_, value)| value.as_deref())
                .filter(|value| !value.is_empty());
            let class_attr = attributes
                .iter()
                .find(|(key, _)| key == "class")
                .and_then(|(_, value)| value.as_deref())
                .filter(|value| !value.is_empty());
            if let Some(id_value) = id_attr {
                label.push('#');
                write_escaped(&mut label, id_value);
            } else if let Some(class_value) = class_attr {
                label.push_str(".class=");
                write_escaped(&mut label, class_value);
            }
            label
        }
        Node::Text { .. } => "#text".to_string(),
        Node::Comment { .. } => "#comment".to_string(),
    }
}

fn truncate_line(mut line: String, max_len: usize) -> String {
    if line.len() > max_len {
        line.truncate(max_len.saturating_sub(3));
        line.push_str("...");
    }
    line
}

fn walk_snapshot(
    node: &Node,
    options: &DomSnapshotOptions,
    indent_level: &mut usize,
    out: &mut Vec<String>,
) {
    let mut line = String::new();
    const INDENT_STEP: usize = 2;
    let spaces = indent_level.saturating_mul(INDENT_STEP);
    #[allow(clippy::manual_repeat_n)]
    line.extend(std::iter::repeat(' ').take(spaces));
    write_node_line(&mut line, node, options);
    out.push(line);
    match node {
        Node::Document { children, .. } | Node::Element { children, .. } => {
            *indent_level += 1;
            for child in children {
                walk_snapshot(child, options, indent_level, out);
            }
            debug_assert!(
                *indent_level > 0,
                "indent level underflow at {}",
                node_label(node)
            );
            *indent_level -= 1;
        }
        Node::Doctype { .. } | Node::Text { .. } | Node::Comment { .. } => {}
    }
}

fn format_node_line(node: &Node, options: &DomSnapshotOptions) -> String {
    let mut line = String::new();
    write_node_line(&mut line, node, options);
    line
}

fn write_node_line(out: &mut String, node: &Node, options: &DomSnapshotOptions) {
    match node {
        Node::Document { .. } => out.push_str("#document"),
        Node::Doctype {
            name,
            public_id,
            system_id,
            ..
        } => {
            out.push_str("<!DOCTYPE ");
            write_escaped(out, name);
            for id in [public_id, system_id].into_iter().flatten() {
                out.push_str(" \"");
                write_escaped(out, id);
                out.push('"');
            }
            out.push('>');
        }
        Node::Element {
            name,
            attributes,
            inert,
            ..
        } => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                if let Some(value) = value {
                    out.push('=');
                    out.push('"');
                    write_escaped(out, value);
                    out.push('"');
                }
            }
            if *inert {
                out.push_str(" [inert]");
            }
            out.push('>');
        }
        Node::Text { text, .. } => {
            out.push('"');
            write_escaped(out, text);
            out.push('"');
        }
        Node::Comment { text, .. } => {
            out.push_str("<!-- ");
            write_escaped(out, text);
            out.push_str(" -->");
        }
    }
    if !options.ignore_ids && !matches!(node, Node::Document { .. }) {
        let _ = write!(out, " #{}", node.id().0);
    }
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ if ch.is_ascii() => out.push(ch),
            _ => {
                let _ = write!(out, "\\u{{{:X}}}", ch as u32);
            }
        }
    }
}
