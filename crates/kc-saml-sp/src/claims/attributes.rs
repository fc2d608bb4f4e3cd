//! Attribute claims keyed by interned names.

use std::borrow::Borrow;
use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError, Weak};

use serde::Serialize;

use crate::types::xbox_claims;

/// Entries below this count are never swept.
const MIN_SWEEP: usize = 64;

static SYMBOLS: LazyLock<Mutex<Interner>> = LazyLock::new(|| Mutex::new(Interner::default()));

/// Weak name table: a symbol lives only as long as some value holds it, so
/// names from discarded responses do not accumulate.
#[derive(Default)]
struct Interner {
    names: HashMap<Box<str>, Weak<str>>,
    sweep_at: usize,
}

impl Interner {
    fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(live) = self.names.get(name).and_then(Weak::upgrade) {
            return live;
        }
        if self.names.len() >= self.sweep_at.max(MIN_SWEEP) {
            self.sweep();
        }
        let symbol: Arc<str> = Arc::from(name);
        self.names.insert(Box::from(name), Arc::downgrade(&symbol));
        symbol
    }

    /// Drops dead entries and doubles the threshold for the next sweep.
    fn sweep(&mut self) {
        self.names.retain(|_, symbol| symbol.strong_count() > 0);
        self.sweep_at = self.names.len() * 2;
    }
}

/// An interned attribute name.
///
/// Interning the same text twice yields symbols sharing one allocation.
/// Symbols compare and order exactly like the text they hold, so a map keyed
/// by symbols can be queried with plain `&str` as well.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Returns the process-wide symbol for `name`.
    ///
    /// Symbols are shared while any copy is alive; once every copy is
    /// dropped the name is released.
    #[must_use]
    pub fn intern(name: &str) -> Self {
        let mut symbols = SYMBOLS.lock().unwrap_or_else(PoisonError::into_inner);
        Self(symbols.intern(name))
    }

    /// Returns the symbol's text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if both symbols share one interned allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::intern(name)
    }
}

/// A key attributes can be looked up by: a literal name or its symbol.
pub trait AttributeKey {
    /// The attribute name.
    fn attribute_name(&self) -> &str;
}

impl AttributeKey for str {
    fn attribute_name(&self) -> &str {
        self
    }
}

impl AttributeKey for String {
    fn attribute_name(&self) -> &str {
        self
    }
}

impl AttributeKey for Symbol {
    fn attribute_name(&self) -> &str {
        self.as_str()
    }
}

/// Single-valued attribute claims of the signed assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Attributes {
    values: BTreeMap<Symbol, String>,
}

impl Attributes {
    /// Sets an attribute, replacing any earlier value with the same name.
    pub fn insert(&mut self, name: &str, value: String) {
        self.values.insert(Symbol::intern(name), value);
    }

    /// Returns the value for a literal name or a symbol.
    #[must_use]
    pub fn get<K: AttributeKey + ?Sized>(&self, key: &K) -> Option<&str> {
        self.values.get(key.attribute_name()).map(String::as_str)
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn contains_key<K: AttributeKey + ?Sized>(&self, key: &K) -> bool {
        self.values.contains_key(key.attribute_name())
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over attributes in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, Symbol, String> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a Symbol, &'a String);
    type IntoIter = btree_map::Iter<'a, Symbol, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Xbox Live claims projected from well-known attribute names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct XboxClaims {
    /// Pairwise user id.
    pub pxuid: Option<String>,
    /// Title version.
    pub version: Option<String>,
    /// Account age group.
    pub age_group: Option<String>,
    /// Gamertag.
    pub gamer_tag: Option<String>,
    /// Subscription tier.
    pub tier: Option<String>,
}

impl XboxClaims {
    /// Projects the Xbox claims out of `attributes`.
    #[must_use]
    pub fn from_attributes(attributes: &Attributes) -> Self {
        let claim = |name: &str| attributes.get(name).map(str::to_string);
        Self {
            pxuid: claim(xbox_claims::PXUID),
            version: claim(xbox_claims::VERSION),
            age_group: claim(xbox_claims::AGE_GROUP),
            gamer_tag: claim(xbox_claims::GAMER_TAG),
            tier: claim(xbox_claims::TIER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_allocations() {
        let a = Symbol::intern("eduPersonPrincipalName");
        let b = Symbol::intern("eduPersonPrincipalName");
        assert!(a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, Symbol::intern("mail"));
    }

    #[test]
    fn dropped_attributes_release_their_symbols() {
        let name = "urn:test:released-attribute-name";
        let mut attributes = Attributes::default();
        attributes.insert(name, "value".to_string());
        let (symbol, _) = attributes.iter().next().unwrap();
        let weak = Arc::downgrade(&symbol.0);
        drop(attributes);
        assert!(weak.upgrade().is_none());

        // A fresh intern after release allocates again and stays usable.
        let again = Symbol::intern(name);
        assert_eq!(again.as_str(), name);
    }

    #[test]
    fn sweeping_bounds_the_name_table() {
        let mut interner = Interner::default();
        let kept = interner.intern("kept");
        for i in 0..10_000 {
            drop(interner.intern(&format!("transient-{i}")));
        }
        assert!(interner.names.len() <= MIN_SWEEP + 1, "{}", interner.names.len());
        assert!(Arc::ptr_eq(&kept, &interner.intern("kept")));
    }

    #[test]
    fn lookup_by_literal_and_symbol() {
        let mut attributes = Attributes::default();
        attributes.insert("eduPersonPrincipalName", "jdoe@example.org".to_string());

        assert_eq!(attributes.get("eduPersonPrincipalName"), Some("jdoe@example.org"));
        assert_eq!(
            attributes.get(&Symbol::intern("eduPersonPrincipalName")),
            Some("jdoe@example.org")
        );
        assert_eq!(attributes.get(&"eduPersonPrincipalName".to_string()), Some("jdoe@example.org"));
        assert_eq!(attributes.len(), 1);
        assert!(!attributes.contains_key("mail"));
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let mut attributes = Attributes::default();
        attributes.insert("role", "user".to_string());
        attributes.insert("role", "admin".to_string());
        assert_eq!(attributes.get("role"), Some("admin"));
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn serializes_as_plain_map() {
        let mut attributes = Attributes::default();
        attributes.insert("b", "2".to_string());
        attributes.insert("a", "1".to_string());
        assert_eq!(serde_json::to_string(&attributes).unwrap(), r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn projects_xbox_claims() {
        let mut attributes = Attributes::default();
        attributes.insert(xbox_claims::GAMER_TAG, "MasterChief".to_string());
        attributes.insert(xbox_claims::TIER, "Gold".to_string());
        let claims = XboxClaims::from_attributes(&attributes);
        assert_eq!(claims.gamer_tag.as_deref(), Some("MasterChief"));
        assert_eq!(claims.tier.as_deref(), Some("Gold"));
        assert_eq!(claims.pxuid, None);
    }
}
