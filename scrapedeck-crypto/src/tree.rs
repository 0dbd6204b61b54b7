//! Credential trees: nested key/value structures whose string leaves are the
//! only values the cipher ever touches.

use crate::error::TreeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum nesting accepted when building a tree from JSON.
pub const MAX_TREE_DEPTH: usize = 32;

/// A non-string leaf, carried through encryption untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
}

/// A single value in a [`CredentialTree`].
#[derive(Clone, Debug, PartialEq)]
pub enum CredentialValue {
    /// String leaf. Encrypted when the tree is encrypted.
    Text(String),
    Nested(CredentialTree),
    Scalar(Scalar),
}

/// Location of a leaf: the keys walked from the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafPath(Vec<String>);

impl LeafPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last segment, if any.
    pub fn key(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for LeafPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for LeafPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Ordered map from field name to [`CredentialValue`].
///
/// Serializes as a plain JSON object so it can be stored verbatim in a
/// profile record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct CredentialTree(BTreeMap<String, CredentialValue>);

impl CredentialTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a string leaf.
    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, CredentialValue::Text(value.into()));
        self
    }

    /// Builder-style insert of a nested tree.
    pub fn with_nested(mut self, key: impl Into<String>, tree: CredentialTree) -> Self {
        self.insert(key, CredentialValue::Nested(tree));
        self
    }

    /// Builder-style insert of a scalar leaf.
    pub fn with_scalar(mut self, key: impl Into<String>, scalar: Scalar) -> Self {
        self.insert(key, CredentialValue::Scalar(scalar));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: CredentialValue) -> Option<CredentialValue> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&CredentialValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CredentialValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nested tree stored under `key`, if that key holds one.
    pub fn nested(&self, key: &str) -> Option<&CredentialTree> {
        match self.0.get(key) {
            Some(CredentialValue::Nested(tree)) => Some(tree),
            _ => None,
        }
    }

    /// String leaf at `path`, if the path exists and ends in a `Text` value.
    pub fn text_at(&self, path: &LeafPath) -> Option<&str> {
        let (last, parents) = path.segments().split_last()?;
        let mut node = self;
        for segment in parents {
            node = node.nested(segment)?;
        }
        match node.0.get(last) {
            Some(CredentialValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Paths of every string leaf, depth-first in key order.
    pub fn text_paths(&self) -> Vec<LeafPath> {
        let mut out = Vec::new();
        self.collect_text_paths(&LeafPath::root(), &mut out);
        out
    }

    fn collect_text_paths(&self, prefix: &LeafPath, out: &mut Vec<LeafPath>) {
        for (key, value) in &self.0 {
            match value {
                CredentialValue::Text(_) => out.push(prefix.child(key)),
                CredentialValue::Nested(tree) => tree.collect_text_paths(&prefix.child(key), out),
                CredentialValue::Scalar(_) => {}
            }
        }
    }

    /// Returns a structurally identical tree with every string leaf replaced
    /// by `f(path, value)`. Scalars and keys are copied. Stops at the first
    /// error.
    pub fn try_map_text<E, F>(&self, mut f: F) -> Result<CredentialTree, E>
    where
        F: FnMut(&LeafPath, &str) -> Result<String, E>,
    {
        self.map_inner(&LeafPath::root(), &mut f)
    }

    fn map_inner<E, F>(&self, prefix: &LeafPath, f: &mut F) -> Result<CredentialTree, E>
    where
        F: FnMut(&LeafPath, &str) -> Result<String, E>,
    {
        let mut out = BTreeMap::new();
        for (key, value) in &self.0 {
            let path = prefix.child(key);
            let mapped = match value {
                CredentialValue::Text(text) => CredentialValue::Text(f(&path, text)?),
                CredentialValue::Nested(tree) => CredentialValue::Nested(tree.map_inner(&path, f)?),
                CredentialValue::Scalar(scalar) => CredentialValue::Scalar(scalar.clone()),
            };
            out.insert(key.clone(), mapped);
        }
        Ok(CredentialTree(out))
    }

    /// Whether `other` has exactly the same keys and nesting, ignoring leaf
    /// values.
    pub fn same_shape(&self, other: &CredentialTree) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().all(|(key, value)| match (value, other.0.get(key)) {
                (CredentialValue::Text(_), Some(CredentialValue::Text(_))) => true,
                (CredentialValue::Scalar(a), Some(CredentialValue::Scalar(b))) => a == b,
                (CredentialValue::Nested(a), Some(CredentialValue::Nested(b))) => a.same_shape(b),
                _ => false,
            })
    }
}

impl TryFrom<Value> for CredentialTree {
    type Error = TreeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => tree_from_map(map, &LeafPath::root(), 1),
            _ => Err(TreeError::NotAnObject),
        }
    }
}

fn tree_from_map(map: Map<String, Value>, prefix: &LeafPath, depth: usize) -> Result<CredentialTree, TreeError> {
    if depth > MAX_TREE_DEPTH {
        return Err(TreeError::TooDeep { max: MAX_TREE_DEPTH });
    }
    let mut out = BTreeMap::new();
    for (key, value) in map {
        let path = prefix.child(&key);
        let converted = match value {
            Value::String(s) => CredentialValue::Text(s),
            Value::Object(inner) => CredentialValue::Nested(tree_from_map(inner, &path, depth + 1)?),
            Value::Null => CredentialValue::Scalar(Scalar::Null),
            Value::Bool(b) => CredentialValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => CredentialValue::Scalar(Scalar::Number(n)),
            Value::Array(_) => {
                return Err(TreeError::UnsupportedValue {
                    path: path.to_string(),
                })
            }
        };
        out.insert(key, converted);
    }
    Ok(CredentialTree(out))
}

impl From<CredentialTree> for Value {
    fn from(tree: CredentialTree) -> Self {
        Value::Object(
            tree.0
                .into_iter()
                .map(|(key, value)| {
                    let json = match value {
                        CredentialValue::Text(s) => Value::String(s),
                        CredentialValue::Nested(inner) => Value::from(inner),
                        CredentialValue::Scalar(Scalar::Null) => Value::Null,
                        CredentialValue::Scalar(Scalar::Bool(b)) => Value::Bool(b),
                        CredentialValue::Scalar(Scalar::Number(n)) => Value::Number(n),
                    };
                    (key, json)
                })
                .collect(),
        )
    }
}
