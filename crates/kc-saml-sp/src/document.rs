//! Owned XML document model.
//!
//! SAML responses are parsed exactly once into an immutable arena of nodes.
//! Namespaces are resolved at parse time so that every later lookup matches
//! on `(namespace URI, local name)` rather than on whatever prefix the
//! identity provider happened to choose.
//!
//! Byte offsets of every element are retained, which lets the signer splice
//! a `<ds:Signature>` into the original text without re-serializing it.

use std::fmt;
use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{SamlError, SamlResult};
use crate::types::XML_NS;

/// Index of a node inside an [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A namespace declaration (`xmlns` or `xmlns:prefix`) in scope while building.
#[derive(Debug)]
struct NamespaceDeclaration {
    prefix: Option<String>,
    /// Empty undeclares the default namespace.
    uri: String,
}

/// A resolved element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Prefix as written in the document.
    pub prefix: Option<String>,
    /// Local name.
    pub local_name: String,
    /// Resolved namespace URI (unprefixed attributes have none).
    pub namespace: Option<String>,
    /// Normalized, unescaped value.
    pub value: String,
}

#[derive(Debug)]
struct ElementData {
    prefix: Option<String>,
    local_name: String,
    namespace: Option<String>,
    attributes: Vec<XmlAttribute>,
    span: Range<usize>,
    start_tag_end: usize,
}

#[derive(Debug)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// An immutable, fully owned XML document.
#[derive(Debug)]
pub struct XmlDocument {
    source: String,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl XmlDocument {
    /// Parses an XML document.
    ///
    /// Document type declarations are rejected, as are undeclared prefixes,
    /// mismatched end tags, multiple root elements and character data
    /// outside the root element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::XmlParse`] if the input is not a well-formed,
    /// namespace-valid XML document.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut builder = TreeBuilder::default();

        loop {
            let start = offset(&reader);
            let event = reader.read_event()?;
            let end = offset(&reader);

            match event {
                Event::Start(e) => builder.open(&e, tag_start(xml, start), end, false)?,
                Event::Empty(e) => builder.open(&e, tag_start(xml, start), end, true)?,
                Event::End(_) => builder.close(end)?,
                Event::Text(t) => builder.text(&t.unescape()?)?,
                Event::CData(c) => builder.text(std::str::from_utf8(&c)?)?,
                Event::DocType(_) => {
                    return Err(SamlError::XmlParse(
                        "document type declarations are not allowed".to_string(),
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        builder.finish(xml.to_string())
    }

    /// Returns the root element.
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.node(self.root)
    }

    /// Returns a handle for a node id produced by this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { doc: self, id }
    }

    /// Returns the text the document was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns every element whose `ID` attribute equals `id`, in document order.
    pub fn elements_with_id<'d>(&'d self, id: &'d str) -> impl Iterator<Item = Node<'d>> + 'd {
        self.root()
            .descendants()
            .filter(move |node| node.attribute("ID") == Some(id))
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Read-only handle to a node of an [`XmlDocument`].
#[derive(Clone, Copy)]
pub struct Node<'d> {
    doc: &'d XmlDocument,
    id: NodeId,
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data().kind {
            NodeKind::Element(e) => write!(
                f,
                "Element({{{}}}{})",
                e.namespace.as_deref().unwrap_or(""),
                e.local_name
            ),
            NodeKind::Text(t) => write!(f, "Text({t:?})"),
        }
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl<'d> Node<'d> {
    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id.0]
    }

    fn element(&self) -> Option<&'d ElementData> {
        match &self.data().kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    /// Returns this node's id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns true for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        self.element().is_some()
    }

    /// Returns the local name of an element, empty for text nodes.
    #[must_use]
    pub fn local_name(&self) -> &'d str {
        self.element().map_or("", |e| e.local_name.as_str())
    }

    /// Returns the prefix the element was written with.
    #[must_use]
    pub fn prefix(&self) -> Option<&'d str> {
        self.element().and_then(|e| e.prefix.as_deref())
    }

    /// Returns the resolved namespace URI of an element.
    #[must_use]
    pub fn namespace(&self) -> Option<&'d str> {
        self.element().and_then(|e| e.namespace.as_deref())
    }

    /// Returns true if this is an element with the given namespace and local name.
    #[must_use]
    pub fn has_name(&self, namespace: &str, local_name: &str) -> bool {
        self.element()
            .is_some_and(|e| {
                e.local_name == local_name && e.namespace.as_deref() == Some(namespace)
            })
    }

    /// Returns the value of an unqualified attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.attributes()
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == name)
            .map(|a| a.value.as_str())
    }

    /// Returns all attributes, excluding namespace declarations.
    #[must_use]
    pub fn attributes(&self) -> &'d [XmlAttribute] {
        self.element().map_or(&[], |e| e.attributes.as_slice())
    }

    /// Returns the content of a text node, or the concatenated direct text
    /// children of an element. `None` if an element has no text children.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match &self.data().kind {
            NodeKind::Text(t) => Some(t.clone()),
            NodeKind::Element(_) => {
                let mut texts = self.children().filter_map(|c| match &c.data().kind {
                    NodeKind::Text(t) => Some(t.as_str()),
                    NodeKind::Element(_) => None,
                });
                let first = texts.next()?;
                Some(texts.fold(first.to_string(), |acc, t| acc + t))
            }
        }
    }

    /// Iterates over direct children (elements and text).
    pub fn children(&self) -> impl Iterator<Item = Node<'d>> + 'd {
        let doc = self.doc;
        self.data().children.iter().map(move |&id| Node { doc, id })
    }

    /// Iterates over direct element children.
    pub fn child_elements(&self) -> impl Iterator<Item = Node<'d>> + 'd {
        self.children().filter(Node::is_element)
    }

    /// Returns the first direct child element with the given name.
    #[must_use]
    pub fn first_child(&self, namespace: &str, local_name: &str) -> Option<Node<'d>> {
        self.child_elements().find(|c| c.has_name(namespace, local_name))
    }

    /// Iterates over this node and all of its descendants in document order.
    #[must_use]
    pub fn descendants(&self) -> Descendants<'d> {
        Descendants {
            doc: self.doc,
            stack: vec![self.id],
        }
    }

    pub(crate) fn parent(&self) -> Option<Node<'d>> {
        let doc = self.doc;
        self.data().parent.map(|id| Node { doc, id })
    }

    /// Byte range of the whole element in the source text.
    pub(crate) fn span(&self) -> Option<Range<usize>> {
        self.element().map(|e| e.span.clone())
    }

    /// Byte offset just past the element's start tag.
    pub(crate) fn start_tag_end(&self) -> Option<usize> {
        self.element().map(|e| e.start_tag_end)
    }

    /// Returns true if the element was written as `<x/>`.
    pub(crate) fn is_self_closing(&self) -> bool {
        self.element().is_some_and(|e| e.start_tag_end == e.span.end)
    }
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'d> {
    doc: &'d XmlDocument,
    stack: Vec<NodeId>,
}

impl<'d> Iterator for Descendants<'d> {
    type Item = Node<'d>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.nodes[id.0].children.iter().rev().copied());
        Some(Node { doc: self.doc, id })
    }
}

fn offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

// The reader may or may not have consumed the `<` before handing out the
// previous event, so anchor on the nearest one.
fn tag_start(xml: &str, position: usize) -> usize {
    if xml.as_bytes().get(position) == Some(&b'<') {
        position
    } else {
        xml[..position.min(xml.len())].rfind('<').unwrap_or(position)
    }
}

fn split_qname(qname: &str) -> (Option<String>, String) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qname.to_string()),
    }
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Normalizes an attribute value (XML 1.0 section 3.3.3): literal line
/// breaks and tabs become spaces, then references are expanded, so `&#9;`
/// still yields a tab.
fn attribute_value(raw: &[u8]) -> SamlResult<String> {
    let raw = std::str::from_utf8(raw)?;
    let normalized = raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " ");
    Ok(quick_xml::escape::unescape(&normalized)?.into_owned())
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
    scopes: Vec<Vec<NamespaceDeclaration>>,
    root: Option<NodeId>,
}

impl TreeBuilder {
    fn open(
        &mut self,
        tag: &BytesStart<'_>,
        start: usize,
        end: usize,
        empty: bool,
    ) -> SamlResult<()> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(SamlError::XmlParse("multiple root elements".to_string()));
        }

        let (prefix, local_name) = split_qname(std::str::from_utf8(tag.name().as_ref())?);

        let mut declarations = Vec::new();
        let mut raw_attributes = Vec::new();
        for attr in tag.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?;
            let value = attribute_value(&attr.value)?;
            if key == "xmlns" {
                declarations.push(NamespaceDeclaration { prefix: None, uri: value });
            } else if let Some(declared) = key.strip_prefix("xmlns:") {
                declarations.push(NamespaceDeclaration {
                    prefix: Some(declared.to_string()),
                    uri: value,
                });
            } else {
                raw_attributes.push((key.to_string(), value));
            }
        }
        self.scopes.push(declarations);

        let namespace = self.resolve(prefix.as_deref())?;
        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (key, value) in raw_attributes {
            let (attr_prefix, attr_local) = split_qname(&key);
            let attr_namespace = match attr_prefix.as_deref() {
                Some(p) => self.resolve(Some(p))?,
                None => None,
            };
            attributes.push(XmlAttribute {
                prefix: attr_prefix,
                local_name: attr_local,
                namespace: attr_namespace,
                value,
            });
        }

        let id = NodeId(self.nodes.len());
        let parent = self.open.last().copied();
        self.nodes.push(NodeData {
            parent,
            children: Vec::new(),
            kind: NodeKind::Element(ElementData {
                prefix,
                local_name,
                namespace,
                attributes,
                span: start..end,
                start_tag_end: end,
            }),
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.root = Some(id),
        }

        if empty {
            self.scopes.pop();
        } else {
            self.open.push(id);
        }
        Ok(())
    }

    fn close(&mut self, end: usize) -> SamlResult<()> {
        let id = self
            .open
            .pop()
            .ok_or_else(|| SamlError::XmlParse("unexpected end tag".to_string()))?;
        self.scopes.pop();
        if let NodeKind::Element(e) = &mut self.nodes[id.0].kind {
            e.span.end = end;
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> SamlResult<()> {
        let Some(&parent) = self.open.last() else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(SamlError::XmlParse(
                "character data outside the root element".to_string(),
            ));
        };

        let text = normalize_line_endings(text);
        if let Some(&last) = self.nodes[parent.0].children.last() {
            if let NodeKind::Text(existing) = &mut self.nodes[last.0].kind {
                existing.push_str(&text);
                return Ok(());
            }
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: Some(parent),
            children: Vec::new(),
            kind: NodeKind::Text(text),
        });
        self.nodes[parent.0].children.push(id);
        Ok(())
    }

    fn resolve(&self, prefix: Option<&str>) -> SamlResult<Option<String>> {
        if prefix == Some("xml") {
            return Ok(Some(XML_NS.to_string()));
        }
        for scope in self.scopes.iter().rev() {
            if let Some(decl) = scope.iter().find(|d| d.prefix.as_deref() == prefix) {
                return Ok((!decl.uri.is_empty()).then(|| decl.uri.clone()));
            }
        }
        match prefix {
            Some(p) => Err(SamlError::XmlParse(format!("undeclared namespace prefix '{p}'"))),
            None => Ok(None),
        }
    }

    fn finish(self, source: String) -> SamlResult<XmlDocument> {
        if !self.open.is_empty() {
            return Err(SamlError::XmlParse("unclosed element at end of input".to_string()));
        }
        let root = self
            .root
            .ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))?;
        Ok(XmlDocument {
            source,
            nodes: self.nodes,
            root,
        })
    }
}
