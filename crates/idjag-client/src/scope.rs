//! Scope parameter normalization
//!
//! Callers may hand scopes over as a pre-joined string, an ordered list or a set.
//! Every form is sent as a single space-delimited `scope` field; an absent scope
//! is sent as the empty string rather than being omitted.

use std::collections::{BTreeSet, HashSet};

/// Scopes in any of the accepted input shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scopes {
    /// Already space-delimited, sent verbatim
    Joined(String),
    /// Ordered list, order preserved on the wire
    List(Vec<String>),
    /// Set of scopes, sent in lexical order
    Set(BTreeSet<String>),
}

impl Scopes {
    /// Space-joined wire form
    pub fn normalize(&self) -> String {
        match self {
            Self::Joined(s) => s.clone(),
            Self::List(list) => list.join(" "),
            Self::Set(set) => set.iter().map(String::as_str).collect::<Vec<_>>().join(" "),
        }
    }
}

/// Normalize optional scopes to the `scope` form field value
pub fn normalize_scopes(scopes: Option<&Scopes>) -> String {
    scopes.map(Scopes::normalize).unwrap_or_default()
}

impl From<&str> for Scopes {
    fn from(value: &str) -> Self {
        Self::Joined(value.to_string())
    }
}

impl From<String> for Scopes {
    fn from(value: String) -> Self {
        Self::Joined(value)
    }
}

impl From<Vec<String>> for Scopes {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for Scopes {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Scopes {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(|s| (*s).to_string()).collect())
    }
}

impl From<BTreeSet<String>> for Scopes {
    fn from(value: BTreeSet<String>) -> Self {
        Self::Set(value)
    }
}

impl From<HashSet<String>> for Scopes {
    fn from(value: HashSet<String>) -> Self {
        Self::Set(value.into_iter().collect())
    }
}
