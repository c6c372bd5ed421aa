//! The schemaless document a predicate is evaluated against.

use serde_json::Value as Json;

/// A thin wrapper over a `serde_json::Value` document, with dotted-path
/// lookup (`"request.user.age"` walks `request` then `user` then `age`).
#[derive(Debug, Clone)]
pub struct Document {
    root: Json,
}

impl Document {
    pub fn new(root: Json) -> Self {
        Self { root }
    }

    pub fn from_str(s: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(s)?))
    }

    pub fn root(&self) -> &Json {
        &self.root
    }

    /// Resolve a dotted path (`"request.user.age"`) against the document.
    /// Quoted literals never reach here: the parser turns a quoted string
    /// into a `ConstantStr` node at parse time, so only bare identifier
    /// paths are looked up through this method.
    pub fn get_path(&self, path: &str) -> Option<&Json> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_nested_dotted_path() {
        let doc = Document::from_str(r#"{"request":{"user":{"age":42}}}"#).unwrap();
        assert_eq!(doc.get_path("request.user.age").unwrap(), &Json::from(42));
    }

    #[test]
    fn missing_path_resolves_to_none() {
        let doc = Document::from_str(r#"{"a":1}"#).unwrap();
        assert!(doc.get_path("a.b.c").is_none());
    }
}
