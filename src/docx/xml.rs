//! Owned arena XML tree. Text and attribute values are kept escaped exactly as
//! read, so untouched parts of a document serialize back byte for byte.

use crate::error::DocumentError;
use quick_xml::events::Event;
use quick_xml::Reader;

pub type NodeId = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        /// (qualified name, raw escaped value)
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    /// Raw escaped character data.
    Text(String),
    CData(String),
    Comment(String),
    Instruction(String),
    Declaration(String),
    DocType(String),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Nodes are never freed: detached subtrees stay in the arena but are unreachable from the root.
#[derive(Clone, Debug)]
pub struct XmlTree {
    nodes: Vec<Node>,
}

pub const ROOT: NodeId = 0;

impl XmlTree {
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_reader(bytes);
        let mut tree = XmlTree {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        };
        let mut stack: Vec<NodeId> = vec![ROOT];
        let mut buf = Vec::new();

        loop {
            let parent = *stack.last().unwrap_or(&ROOT);
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let (name, attrs) = element_parts(&e)?;
                    let id = tree.push(
                        parent,
                        NodeKind::Element {
                            name,
                            attrs,
                            self_closing: false,
                        },
                    );
                    stack.push(id);
                }
                Event::Empty(e) => {
                    let (name, attrs) = element_parts(&e)?;
                    tree.push(
                        parent,
                        NodeKind::Element {
                            name,
                            attrs,
                            self_closing: true,
                        },
                    );
                }
                Event::End(_) => {
                    if stack.len() <= 1 {
                        return Err(DocumentError::Malformed("unbalanced end tag".into()));
                    }
                    stack.pop();
                }
                Event::Text(e) => {
                    tree.push(parent, NodeKind::Text(lossy(&e)));
                }
                Event::CData(e) => {
                    tree.push(parent, NodeKind::CData(lossy(&e)));
                }
                Event::Comment(e) => {
                    tree.push(parent, NodeKind::Comment(lossy(&e)));
                }
                Event::PI(e) => {
                    tree.push(parent, NodeKind::Instruction(lossy(&e)));
                }
                Event::Decl(e) => {
                    tree.push(parent, NodeKind::Declaration(lossy(&e)));
                }
                Event::DocType(e) => {
                    tree.push(parent, NodeKind::DocType(lossy(&e)));
                }
                Event::Eof => break,
            }
            buf.clear();
        }

        if stack.len() != 1 {
            return Err(DocumentError::Malformed("unclosed element".into()));
        }
        Ok(tree)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    /// Element children with the given qualified name.
    pub fn children_named<'a>(&'a self, id: NodeId, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(move |&c| self.is(c, name))
    }

    pub fn first_child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children_named(id, name).next()
    }

    /// First element with this name in document order, searching the whole subtree.
    pub fn find_descendant(&self, id: NodeId, name: &str) -> Option<NodeId> {
        for &c in &self.nodes[id].children {
            if self.is(c, name) {
                return Some(c);
            }
            if let Some(found) = self.find_descendant(c, name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated raw text of direct text children.
    pub fn raw_text(&self, id: NodeId) -> String {
        self.nodes[id]
            .children
            .iter()
            .filter_map(|&c| match &self.nodes[c].kind {
                NodeKind::Text(t) | NodeKind::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Unescaped text of direct text children.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &c in &self.nodes[id].children {
            match &self.nodes[c].kind {
                NodeKind::Text(t) => match quick_xml::escape::unescape(t) {
                    Ok(s) => out.push_str(&s),
                    Err(_) => out.push_str(t),
                },
                NodeKind::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, raw_value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id].kind {
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = raw_value.to_string(),
                None => attrs.push((key.to_string(), raw_value.to_string())),
            }
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind: NodeKind::Element {
                name: name.to_string(),
                attrs: Vec::new(),
                self_closing: true,
            },
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached text node from unescaped text.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind: NodeKind::Text(quick_xml::escape::partial_escape(text).into_owned()),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        self.mark_open(parent);
    }

    /// Insert `child` into `parent` at position `index` (clamped).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let index = index.min(self.nodes[parent].children.len());
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.insert(index, child);
        self.mark_open(parent);
    }

    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) -> Result<(), DocumentError> {
        let parent = self
            .parent(sibling)
            .ok_or_else(|| DocumentError::Malformed("sibling has no parent".into()))?;
        let pos = self.position_in_parent(sibling).unwrap_or(0);
        self.insert_child(parent, pos + 1, node);
        Ok(())
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    /// Detach all children whose element name is in `names`.
    pub fn remove_children_named(&mut self, id: NodeId, names: &[&str]) {
        let doomed: Vec<NodeId> = self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&c| self.name(c).is_some_and(|n| names.contains(&n)))
            .collect();
        for c in doomed {
            self.detach(c);
        }
    }

    fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes[id].parent?;
        self.nodes[parent].children.iter().position(|&c| c == id)
    }

    fn mark_open(&mut self, id: NodeId) {
        if let NodeKind::Element { self_closing, .. } = &mut self.nodes[id].kind {
            *self_closing = false;
        }
    }

    /// Deep-copy a subtree; the copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id].kind.clone();
        let copy = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        let children = self.nodes[id].children.clone();
        for c in children {
            let child_copy = self.clone_subtree(c);
            self.nodes[child_copy].parent = Some(copy);
            self.nodes[copy].children.push(child_copy);
        }
        copy
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_node(ROOT, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Document => {
                for &c in &node.children {
                    self.write_node(c, out);
                }
            }
            NodeKind::Element {
                name,
                attrs,
                self_closing,
            } => {
                out.push('<');
                out.push_str(name);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&v.replace('"', "&quot;"));
                    out.push('"');
                }
                if node.children.is_empty() && *self_closing {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &c in &node.children {
                    self.write_node(c, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::CData(t) => {
                out.push_str("<![CDATA[");
                out.push_str(t);
                out.push_str("]]>");
            }
            NodeKind::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
            NodeKind::Instruction(t) => {
                out.push_str("<?");
                out.push_str(t);
                out.push_str("?>");
            }
            NodeKind::Declaration(t) => {
                out.push_str("<?");
                out.push_str(t);
                out.push_str("?>");
            }
            NodeKind::DocType(t) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(t);
                out.push('>');
            }
        }
    }
}

fn element_parts(e: &quick_xml::events::BytesStart<'_>) -> Result<(String, Vec<(String, String)>), DocumentError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    Ok((name, attrs))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
