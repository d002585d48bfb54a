//! Reference and dependency records collected during the first pass and
//! resolved into edges once every node is stored.
use std::sync::LazyLock;

use infragraph_core::Uuid;
use infragraph_error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Reference targets matching this pattern are pseudo parameters of the
/// deployment engine and never resolve to a node.
static PSEUDO_PARAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AWS::").expect("static pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceKind {
    #[serde(rename = "Ref")]
    Ref,
    #[serde(rename = "Fn::GetAtt")]
    Attribute,
    #[serde(rename = "Fn::ImportValue")]
    Import,
}

impl ReferenceKind {
    pub fn edge_prefix(self) -> &'static str {
        match self {
            ReferenceKind::Ref => "REF:",
            ReferenceKind::Attribute => "ATT:",
            ReferenceKind::Import => "IMP:",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedReference {
    pub source: Uuid,
    #[serde(rename = "referenceType")]
    pub kind: ReferenceKind,
    /// Logical id for `Ref` / `Fn::GetAtt`, export name for imports.
    pub target: String,
    /// Attribute name of an attribute reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl UnresolvedReference {
    /// Edge uuid derived from the record, so the same reference found twice
    /// maps to one edge.
    pub fn edge_uuid(&self) -> Result<Uuid> {
        let key = serde_json::to_string(self).map_err(|e| {
            Error::serialization_failed("failed to encode unresolved reference").set_source(e)
        })?;
        Ok(Uuid::prefixed(self.kind.edge_prefix(), &key))
    }

    /// Identity used to de-duplicate merged reference lists.
    pub(crate) fn dedup_key(&self) -> (ReferenceKind, &str, &str, Option<&str>) {
        (
            self.kind,
            self.source.as_str(),
            &self.target,
            self.value.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    pub source: Uuid,
    pub target: Uuid,
}

impl UnresolvedDependency {
    pub fn new(source: Uuid, target: Uuid) -> Self {
        Self { source, target }
    }

    pub fn edge_uuid(&self) -> Uuid {
        Uuid::prefixed("DEP:", &format!("[{:?},{:?}]", self.source.as_str(), self.target.as_str()))
    }
}

/// Walk `from` and record every reference expression it contains.
///
/// Descent stops at a matched expression: the arguments of a `Fn::GetAtt`
/// are not searched for nested `Ref`s.
pub fn extract_unresolved_references(source: &Uuid, from: &Value) -> Vec<UnresolvedReference> {
    let mut references = Vec::new();
    walk(source, from, &mut references);
    references
}

fn walk(source: &Uuid, value: &Value, out: &mut Vec<UnresolvedReference>) {
    match value {
        Value::Object(map) => {
            for (key, node) in map {
                match key.as_str() {
                    "Ref" => match node {
                        Value::String(target) => {
                            if !PSEUDO_PARAMETER.is_match(target) {
                                out.push(reference(source, ReferenceKind::Ref, target, None));
                            }
                        }
                        other => warn!(%source, payload = %other, "found non-string Ref"),
                    },
                    "Fn::GetAtt" => match get_att_parts(node) {
                        Some((logical_id, attribute)) => out.push(reference(
                            source,
                            ReferenceKind::Attribute,
                            logical_id,
                            Some(attribute),
                        )),
                        None => warn!(%source, payload = %node, "unrecognized Fn::GetAtt"),
                    },
                    "Fn::ImportValue" => match node {
                        Value::String(name) => {
                            out.push(reference(source, ReferenceKind::Import, name, None))
                        }
                        other => warn!(%source, payload = %other, "found non-string Fn::ImportValue"),
                    },
                    _ => walk(source, node, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(source, item, out);
            }
        }
        _ => {}
    }
}

/// `["Logical", "Attr"]` or the short form `"Logical.Attr"`.
fn get_att_parts(node: &Value) -> Option<(&str, &str)> {
    match node {
        Value::Array(parts) => match parts.as_slice() {
            [Value::String(logical_id), Value::String(attribute)] => {
                Some((logical_id.as_str(), attribute.as_str()))
            }
            _ => None,
        },
        Value::String(short) => short.split_once('.'),
        _ => None,
    }
}

fn reference(
    source: &Uuid,
    kind: ReferenceKind,
    target: &str,
    value: Option<&str>,
) -> UnresolvedReference {
    UnresolvedReference {
        source: source.clone(),
        kind,
        target: target.to_string(),
        value: value.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn targets(refs: &[UnresolvedReference]) -> Vec<(ReferenceKind, &str, Option<&str>)> {
        refs.iter()
            .map(|r| (r.kind, r.target.as_str(), r.value.as_deref()))
            .collect()
    }

    #[test]
    fn test_extracts_all_expression_shapes() {
        let source = Uuid::new("src");
        let props = json!({
            "BucketName": { "Ref": "Bucket1" },
            "Role": { "Fn::GetAtt": ["Role1", "Arn"] },
            "Short": { "Fn::GetAtt": "Queue1.QueueUrl" },
            "Imported": { "Fn::ImportValue": "Shared:ExportsTable" },
            "Nested": [{ "Value": { "Ref": "Topic1" } }],
        });
        let refs = extract_unresolved_references(&source, &props);
        assert_eq!(
            targets(&refs),
            vec![
                (ReferenceKind::Ref, "Bucket1", None),
                (ReferenceKind::Import, "Shared:ExportsTable", None),
                (ReferenceKind::Ref, "Topic1", None),
                (ReferenceKind::Attribute, "Role1", Some("Arn")),
                (ReferenceKind::Attribute, "Queue1", Some("QueueUrl")),
            ]
        );
    }

    #[test]
    fn test_pseudo_parameters_and_bad_payloads_are_skipped() {
        let source = Uuid::new("src");
        let props = json!({
            "Region": { "Ref": "AWS::Region" },
            "Odd": { "Ref": { "Nested": true } },
            "Att": { "Fn::GetAtt": { "Ref": "Hidden" } },
        });
        assert!(extract_unresolved_references(&source, &props).is_empty());
    }

    #[test]
    fn test_edge_uuid_is_deterministic() {
        let make = || UnresolvedReference {
            source: Uuid::new("a"),
            kind: ReferenceKind::Attribute,
            target: "B".into(),
            value: Some("Arn".into()),
        };
        let uuid = make().edge_uuid().unwrap();
        assert!(uuid.as_str().starts_with("ATT:"));
        assert_eq!(uuid, make().edge_uuid().unwrap());

        let dep = UnresolvedDependency::new(Uuid::new("a"), Uuid::new("b"));
        assert!(dep.edge_uuid().as_str().starts_with("DEP:"));
        assert_ne!(
            dep.edge_uuid(),
            UnresolvedDependency::new(Uuid::new("b"), Uuid::new("a")).edge_uuid()
        );
    }
}
