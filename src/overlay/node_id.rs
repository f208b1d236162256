//! Overlay addressing: node ids, network paths and request ids

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::IdError;

/// Identifies a node of the overlay network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkingNodeId(String);

impl NetworkingNodeId {
    /// Id used as destination for "whoever is at the other end of the link".
    pub const ZERO: &'static str = "0";

    pub fn parse(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IdError::Empty {
                kind: "networking node id",
            });
        }
        if text.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(IdError::malformed("networking node id", text));
        }
        Ok(Self(text.to_string()))
    }

    pub fn zero() -> Self {
        Self(Self::ZERO.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkingNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NetworkingNodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NetworkingNodeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NetworkingNodeId> for String {
    fn from(id: NetworkingNodeId) -> Self {
        id.0
    }
}

/// The nodes a message passed through, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkPath(Vec<NetworkingNodeId>);

impl NetworkPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_source(source: NetworkingNodeId) -> Self {
        Self(vec![source])
    }

    /// Copy of this path with `node` appended.
    pub fn append(&self, node: NetworkingNodeId) -> Self {
        let mut nodes = self.0.clone();
        nodes.push(node);
        Self(nodes)
    }

    /// The originating node.
    pub fn source(&self) -> Option<&NetworkingNodeId> {
        self.0.first()
    }

    /// The node that handed the message to us.
    pub fn last(&self) -> Option<&NetworkingNodeId> {
        self.0.last()
    }

    pub fn contains(&self, node: &NetworkingNodeId) -> bool {
        self.0.contains(node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkingNodeId> {
        self.0.iter()
    }
}

impl FromIterator<NetworkingNodeId> for NetworkPath {
    fn from_iter<I: IntoIterator<Item = NetworkingNodeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for NetworkPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            f.write_str(node.as_str())?;
        }
        Ok(())
    }
}

/// Correlates a response with its request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NetworkingNodeId {
        NetworkingNodeId::parse(id).unwrap()
    }

    #[test]
    fn node_id_validation() {
        assert_eq!(node(" CSMS01 ").as_str(), "CSMS01");
        assert!(NetworkingNodeId::parse("").is_err());
        assert!(NetworkingNodeId::parse("a b").is_err());
        assert!(NetworkingNodeId::parse("a/b").is_err());
        assert!(NetworkingNodeId::zero().is_zero());
    }

    #[test]
    fn path_append_keeps_source() {
        let path = NetworkPath::from_source(node("A"));
        let path = path.append(node("B")).append(node("C"));
        assert_eq!(path.source(), Some(&node("A")));
        assert_eq!(path.last(), Some(&node("C")));
        assert!(path.contains(&node("B")));
        assert_eq!(path.to_string(), "A -> B -> C");
    }

    #[test]
    fn path_serializes_as_array() {
        let path: NetworkPath = [node("A"), node("B")].into_iter().collect();
        assert_eq!(serde_json::to_string(&path).unwrap(), r#"["A","B"]"#);
    }
}
