//! Reader for the CX graph-exchange format.
//!
//! A CX document is a JSON array of aspect objects. The `nodes`, `edges` and
//! `nodeAttributes` aspects are located by key, so aspect order in the file
//! does not matter. Each eligible edge becomes one not-yet-canonical record with
//! `interactor_a`/`interactor_b` already populated from its endpoint nodes.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::GraphExchangeFormat;
use crate::constants::{INTERACTOR_A, INTERACTOR_B};
use crate::error::{ReconcileError, Result};
use crate::pipeline::processing::record::{FieldValue, Record};

/// Decoded CX document with nodes and attributes indexed by element id
#[derive(Debug, Default)]
pub struct CxDocument {
    nodes: HashMap<String, Value>,
    node_attributes: HashMap<String, Vec<Value>>,
    edges: Vec<Value>,
}

/// What became of one edge
#[derive(Debug, Clone, PartialEq)]
pub enum CxEdge {
    Eligible(Record),
    /// Interaction label differs from the configured one
    Filtered,
    /// Edge names a node the document does not define
    Dangling,
}

/// Element ids are integers in practice, but strings are tolerated
fn element_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

impl CxDocument {
    pub fn parse(source_id: &str, bytes: &[u8]) -> Result<Self> {
        let root: Value = serde_json::from_slice(bytes).map_err(|e| {
            ReconcileError::malformed(source_id, format!("invalid CX JSON: {}", e))
        })?;
        let Some(aspects) = root.as_array() else {
            return Err(ReconcileError::malformed(
                source_id,
                "CX document must be a JSON array of aspects",
            ));
        };

        let mut doc = CxDocument::default();
        for aspect in aspects {
            if let Some(nodes) = aspect.get("nodes").and_then(|n| n.as_array()) {
                for node in nodes {
                    if let Some(key) = node.get("@id").and_then(element_key) {
                        doc.nodes.insert(key, node.clone());
                    }
                }
            }
            if let Some(edges) = aspect.get("edges").and_then(|e| e.as_array()) {
                doc.edges.extend(edges.iter().cloned());
            }
            if let Some(attrs) = aspect.get("nodeAttributes").and_then(|a| a.as_array()) {
                for attr in attrs {
                    if let Some(key) = attr.get("po").and_then(element_key) {
                        doc.node_attributes.entry(key).or_default().push(attr.clone());
                    }
                }
            }
        }

        info!(
            "CxDocument[{}]: nodes={} edges={} attributed_nodes={}",
            source_id,
            doc.nodes.len(),
            doc.edges.len(),
            doc.node_attributes.len()
        );
        Ok(doc)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Classify every edge in document order
    pub fn edges<'a>(&'a self, graph: &'a GraphExchangeFormat) -> impl Iterator<Item = CxEdge> + 'a {
        self.edges.iter().map(move |edge| self.classify(edge, graph))
    }

    fn classify(&self, edge: &Value, graph: &GraphExchangeFormat) -> CxEdge {
        let label = edge.get("i").and_then(|i| i.as_str()).unwrap_or_default();
        if label != graph.edge_interaction {
            return CxEdge::Filtered;
        }

        let source = edge.get("s").and_then(element_key);
        let target = edge.get("t").and_then(element_key);
        let (Some(source), Some(target)) = (source, target) else {
            return CxEdge::Dangling;
        };
        let (Some(source_node), Some(target_node)) =
            (self.nodes.get(&source), self.nodes.get(&target))
        else {
            debug!("CxDocument: edge {:?} references unknown node", edge.get("@id"));
            return CxEdge::Dangling;
        };

        let mut record = Record::new();
        record.insert(
            INTERACTOR_A.to_string(),
            FieldValue::Object(self.interactor(source_node, &graph.namespace)),
        );
        record.insert(
            INTERACTOR_B.to_string(),
            FieldValue::Object(self.interactor(target_node, &graph.namespace)),
        );
        record.insert(
            "cx_edge_id".to_string(),
            edge.get("@id").map(FieldValue::from).unwrap_or(FieldValue::Null),
        );
        record.insert("interaction".to_string(), FieldValue::from(label));
        record.insert("source_attributes".to_string(), self.attributes(&source));
        record.insert("target_attributes".to_string(), self.attributes(&target));
        CxEdge::Eligible(record)
    }

    fn interactor(&self, node: &Value, namespace: &str) -> Record {
        let field = |key: &str| node.get(key).map(FieldValue::from).unwrap_or(FieldValue::Null);
        let mut interactor = Record::new();
        interactor.insert(namespace.to_string(), field("@id"));
        interactor.insert("name".to_string(), field("n"));
        interactor.insert("represents".to_string(), field("r"));
        interactor
    }

    fn attributes(&self, node_key: &str) -> FieldValue {
        match self.node_attributes.get(node_key) {
            Some(attrs) => FieldValue::List(attrs.iter().map(FieldValue::from).collect()),
            None => FieldValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> GraphExchangeFormat {
        GraphExchangeFormat {
            edge_interaction: "in-complex-with".to_string(),
            namespace: "ndex".to_string(),
        }
    }

    fn sample() -> Vec<u8> {
        json!([
            {"numberVerification": [{"longNumber": 281474976710655u64}]},
            {"nodes": [
                {"@id": 1, "n": "CDK2", "r": "uniprot:P24941"},
                {"@id": 2, "n": "CCNA2", "r": "uniprot:P20248"}
            ]},
            {"edges": [
                {"@id": 10, "s": 2, "t": 1, "i": "in-complex-with"},
                {"@id": 11, "s": 1, "t": 2, "i": "controls-state-change-of"},
                {"@id": 12, "s": 1, "t": 99, "i": "in-complex-with"}
            ]},
            {"nodeAttributes": [
                {"po": 1, "n": "type", "v": "Protein"}
            ]}
        ])
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_parse_indexes_aspects_by_key() {
        let doc = CxDocument::parse("ndex", &sample()).unwrap();
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.edge_count(), 3);
    }

    #[test]
    fn test_edges_classified() {
        let doc = CxDocument::parse("ndex", &sample()).unwrap();
        let g = graph();
        let edges: Vec<CxEdge> = doc.edges(&g).collect();

        assert_eq!(edges.len(), 3);
        assert_eq!(edges[1], CxEdge::Filtered);
        assert_eq!(edges[2], CxEdge::Dangling);

        let CxEdge::Eligible(record) = &edges[0] else {
            panic!("first edge should be eligible");
        };
        let a = record.get(INTERACTOR_A).and_then(|v| v.as_object()).unwrap();
        let b = record.get(INTERACTOR_B).and_then(|v| v.as_object()).unwrap();
        assert_eq!(a.get("ndex"), Some(&FieldValue::Int(2)));
        assert_eq!(a.get("name"), Some(&FieldValue::from("CCNA2")));
        assert_eq!(b.get("ndex"), Some(&FieldValue::Int(1)));
        assert_eq!(record.get("cx_edge_id"), Some(&FieldValue::Int(10)));
        assert_eq!(record.get("source_attributes"), Some(&FieldValue::Null));
        assert!(matches!(
            record.get("target_attributes"),
            Some(FieldValue::List(items)) if items.len() == 1
        ));
    }

    #[test]
    fn test_non_array_document_is_malformed() {
        let result = CxDocument::parse("ndex", br#"{"nodes": []}"#);
        assert!(matches!(result, Err(ReconcileError::MalformedInput { .. })));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let result = CxDocument::parse("ndex", b"[{");
        assert!(matches!(result, Err(ReconcileError::MalformedInput { .. })));
    }
}
