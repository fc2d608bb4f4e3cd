//! SAML 2.0 protocol schema conformance.
//!
//! The rules in `schemas/saml20protocol.json` are a condensed form of the
//! `saml-schema-protocol-2.0` and `saml-schema-assertion-2.0` XSDs: allowed
//! document roots, attribute constraints and the content model (sequence
//! order and cardinality) of every element a service provider reads.
//! Elements marked `lax` accept arbitrary content, mirroring `xs:any` and
//! `anyType` in the original schemas.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Deserialize;
use tracing::debug;

use crate::document::{Node, XmlDocument};
use crate::error::{SamlError, SamlResult};
use crate::types::parse_instant;

const PROTOCOL_SCHEMA_SOURCE: &str = include_str!("../schemas/saml20protocol.json");

static PROTOCOL_SCHEMA: LazyLock<Result<ProtocolSchema, String>> =
    LazyLock::new(|| ProtocolSchema::from_json(PROTOCOL_SCHEMA_SOURCE).map_err(|e| e.to_string()));

/// A single schema nonconformance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Slash-separated local names from the root to the offending element.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Checks a parsed document against a schema.
pub trait SchemaValidator: Send + Sync {
    /// Returns every violation found, empty if the document conforms.
    fn validate(&self, document: &XmlDocument) -> Vec<SchemaViolation>;
}

type QName = (String, String);

#[derive(Debug, Deserialize)]
struct SchemaFile {
    namespaces: HashMap<String, String>,
    roots: Vec<String>,
    elements: Vec<ElementRule>,
}

#[derive(Debug, Deserialize)]
struct ElementRule {
    name: String,
    #[serde(default)]
    lax: bool,
    #[serde(default)]
    attributes: Vec<AttributeRule>,
    #[serde(default)]
    content: Vec<Particle>,
}

#[derive(Debug, Deserialize)]
struct AttributeRule {
    name: String,
    #[serde(default)]
    required: bool,
    fixed: Option<String>,
    #[serde(default, rename = "type")]
    kind: AttributeType,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AttributeType {
    #[default]
    String,
    DateTime,
    NonNegativeInteger,
}

#[derive(Debug, Deserialize)]
struct Particle {
    elements: Vec<String>,
    #[serde(default = "one")]
    min: u32,
    /// `None` means unbounded.
    #[serde(default = "some_one")]
    max: Option<u32>,
}

const fn one() -> u32 {
    1
}

const fn some_one() -> Option<u32> {
    Some(1)
}

#[derive(Debug)]
struct CompiledParticle {
    elements: Vec<QName>,
    min: u32,
    max: Option<u32>,
}

#[derive(Debug)]
struct CompiledRule {
    lax: bool,
    attributes: Vec<AttributeRule>,
    content: Vec<CompiledParticle>,
}

/// Rules for the SAML 2.0 protocol Response and the assertion vocabulary.
#[derive(Debug)]
pub struct ProtocolSchema {
    roots: Vec<QName>,
    rules: HashMap<QName, CompiledRule>,
}

impl ProtocolSchema {
    /// Returns the process-wide schema, loading the packaged rules on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if the packaged rules are invalid.
    pub fn shared() -> SamlResult<&'static Self> {
        PROTOCOL_SCHEMA
            .as_ref()
            .map_err(|e| SamlError::Configuration(format!("protocol schema: {e}")))
    }

    fn from_json(source: &str) -> SamlResult<Self> {
        let file: SchemaFile = serde_json::from_str(source)
            .map_err(|e| SamlError::Configuration(e.to_string()))?;

        let resolve = |qualified: &str| -> SamlResult<QName> {
            let (prefix, local) = qualified.split_once(':').ok_or_else(|| {
                SamlError::Configuration(format!("unqualified element name '{qualified}'"))
            })?;
            let ns = file.namespaces.get(prefix).ok_or_else(|| {
                SamlError::Configuration(format!("unknown schema prefix '{prefix}'"))
            })?;
            Ok((ns.clone(), local.to_string()))
        };

        let roots = file
            .roots
            .iter()
            .map(|r| resolve(r.as_str()))
            .collect::<SamlResult<Vec<_>>>()?;

        let mut rules = HashMap::with_capacity(file.elements.len());
        for element in file.elements {
            let content = element
                .content
                .iter()
                .map(|p| -> SamlResult<CompiledParticle> {
                    let elements = p
                        .elements
                        .iter()
                        .map(|e| resolve(e.as_str()))
                        .collect::<SamlResult<_>>()?;
                    Ok(CompiledParticle {
                        elements,
                        min: p.min,
                        max: p.max,
                    })
                })
                .collect::<SamlResult<Vec<_>>>()?;
            rules.insert(
                resolve(&element.name)?,
                CompiledRule {
                    lax: element.lax,
                    attributes: element.attributes,
                    content,
                },
            );
        }

        debug!(elements = rules.len(), "loaded SAML protocol schema");
        Ok(Self { roots, rules })
    }

    fn check_element(&self, node: Node<'_>, path: &str, violations: &mut Vec<SchemaViolation>) {
        let key = (
            node.namespace().unwrap_or_default().to_string(),
            node.local_name().to_string(),
        );
        let Some(rule) = self.rules.get(&key) else {
            return;
        };

        let mut violation = |message: String| {
            violations.push(SchemaViolation {
                path: path.to_string(),
                message,
            });
        };

        for attr in &rule.attributes {
            match node.attribute(&attr.name) {
                None if attr.required => {
                    violation(format!("missing required attribute '{}'", attr.name));
                }
                None => {}
                Some(value) => {
                    if let Some(fixed) = &attr.fixed {
                        if value != fixed {
                            violation(format!(
                                "attribute '{}' must be '{fixed}', found '{value}'",
                                attr.name
                            ));
                        }
                    }
                    let well_typed = match attr.kind {
                        AttributeType::String => true,
                        AttributeType::DateTime => parse_instant(value).is_some(),
                        AttributeType::NonNegativeInteger => value.trim().parse::<u64>().is_ok(),
                    };
                    if !well_typed {
                        violation(format!("attribute '{}' has invalid value '{value}'", attr.name));
                    }
                }
            }
        }

        if rule.lax {
            return;
        }

        let children: Vec<Node<'_>> = node.child_elements().collect();
        let mut index = 0;
        for particle in &rule.content {
            let mut count = 0;
            while index < children.len()
                && particle.max.map_or(true, |max| count < max)
                && particle
                    .elements
                    .iter()
                    .any(|(ns, local)| children[index].has_name(ns, local))
            {
                count += 1;
                index += 1;
            }
            if count < particle.min {
                let expected: Vec<&str> =
                    particle.elements.iter().map(|(_, l)| l.as_str()).collect();
                violation(format!("missing required element '{}'", expected.join("' or '")));
            }
        }
        if let Some(unexpected) = children.get(index) {
            violation(format!("unexpected element '{}'", unexpected.local_name()));
        }

        for child in &children[..index] {
            let child_path = format!("{path}/{}", child.local_name());
            self.check_element(*child, &child_path, violations);
        }
    }
}

impl SchemaValidator for ProtocolSchema {
    fn validate(&self, document: &XmlDocument) -> Vec<SchemaViolation> {
        let root = document.root();
        let path = format!("/{}", root.local_name());
        if !self.roots.iter().any(|(ns, local)| root.has_name(ns, local)) {
            return vec![SchemaViolation {
                path,
                message: format!(
                    "root element '{{{}}}{}' is not allowed",
                    root.namespace().unwrap_or_default(),
                    root.local_name()
                ),
            }];
        }

        let mut violations = Vec::new();
        self.check_element(root, &path, &mut violations);
        violations
    }
}
