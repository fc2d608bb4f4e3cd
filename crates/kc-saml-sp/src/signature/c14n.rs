//! Exclusive XML canonicalization.
//!
//! Implements the subset of Exclusive XML Canonicalization 1.0 needed for
//! SAML enveloped signatures: namespace declarations are emitted only where
//! visibly utilized and not already in effect on an output ancestor,
//! attributes are sorted, empty elements are expanded and character data is
//! escaped with the C14N rules. Comments and processing instructions are not
//! part of the document model and therefore never appear in the output.
//! `InclusiveNamespaces PrefixList` is not supported.

use std::collections::BTreeMap;

use crate::document::{Node, NodeId};

type Rendered = BTreeMap<Option<String>, String>;

/// Canonicalizes the subtree rooted at `apex`.
///
/// If `exclude` names a node inside the subtree, that node and its
/// descendants are omitted (the enveloped-signature transform).
#[must_use]
pub fn canonicalize(apex: Node<'_>, exclude: Option<NodeId>) -> String {
    let mut out = String::new();
    write_node(apex, exclude, &Rendered::new(), &mut out);
    out
}

fn write_node(node: Node<'_>, exclude: Option<NodeId>, rendered: &Rendered, out: &mut String) {
    if Some(node.id()) == exclude {
        return;
    }
    if !node.is_element() {
        escape_text(&node.text().unwrap_or_default(), out);
        return;
    }

    let qname = qualified(node.prefix(), node.local_name());
    out.push('<');
    out.push_str(&qname);

    let mut in_scope = rendered.clone();
    for (prefix, uri) in utilized_namespaces(node) {
        let current = rendered.get(&prefix).map_or("", String::as_str);
        if current == uri {
            continue;
        }
        // An unset default namespace is only written to undo an ancestor's.
        if prefix.is_none() && uri.is_empty() && !rendered.contains_key(&None) {
            continue;
        }
        match &prefix {
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        escape_attribute(&uri, out);
        out.push('"');
        in_scope.insert(prefix, uri);
    }

    let mut attributes: Vec<_> = node.attributes().iter().collect();
    attributes.sort_by(|a, b| {
        (a.namespace.as_deref().unwrap_or(""), a.local_name.as_str())
            .cmp(&(b.namespace.as_deref().unwrap_or(""), b.local_name.as_str()))
    });
    for attr in attributes {
        out.push(' ');
        out.push_str(&qualified(attr.prefix.as_deref(), &attr.local_name));
        out.push_str("=\"");
        escape_attribute(&attr.value, out);
        out.push('"');
    }
    out.push('>');

    for child in node.children() {
        write_node(child, exclude, &in_scope, out);
    }

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');
}

/// Namespace bindings visibly utilized by an element, sorted by prefix with
/// the default namespace first.
fn utilized_namespaces(node: Node<'_>) -> Rendered {
    let mut used = Rendered::new();
    used.insert(
        node.prefix().map(str::to_string),
        node.namespace().unwrap_or_default().to_string(),
    );
    for attr in node.attributes() {
        if let (Some(prefix), Some(ns)) = (&attr.prefix, &attr.namespace) {
            if prefix != "xml" {
                used.insert(Some(prefix.clone()), ns.clone());
            }
        }
    }
    used
}

fn qualified(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local_name}"),
        None => local_name.to_string(),
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
