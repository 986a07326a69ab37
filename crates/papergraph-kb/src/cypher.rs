//! Cypher statement generation for node and relationship upserts.
//!
//! Labels, relationship types and property keys come straight from generated
//! records, so they are always emitted as backtick-quoted identifiers. Values are
//! always passed as parameters.

use crate::data::records::{NodeRecord, PropertyValue};
use crate::traits::graph_store::{EndpointRef, PropertyMode, RelationshipUpsert};

/// Column returned by relationship statements.
pub const MERGED_COLUMN: &str = "merged";

/// A parameterized Cypher statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherStatement {
    pub text: String,
    pub params: Vec<(String, PropertyValue)>,
}

impl CypherStatement {
    pub fn param(&self, name: &str) -> Option<&PropertyValue> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// Quotes an identifier for use as a label, relationship type or property key.
pub fn quote_identifier(raw: &str) -> String {
    format!("`{}`", raw.replace('`', "``"))
}

/// `MERGE` a node by `(label, id)` and write its attributes.
pub fn node_upsert(node: &NodeRecord, mode: PropertyMode) -> CypherStatement {
    let mut text = format!("MERGE (n:{} {{id: $id}})", quote_identifier(&node.label));
    let mut params = vec![("id".to_string(), PropertyValue::String(node.id.clone()))];

    let mut assignments = Vec::with_capacity(node.properties.len());
    for (index, (key, value)) in node.properties.iter().enumerate() {
        let param = format!("p{}", index);
        assignments.push((quote_identifier(key), param.clone()));
        params.push((param, value.clone()));
    }

    match mode {
        PropertyMode::Merge => {
            if !assignments.is_empty() {
                let set = assignments
                    .iter()
                    .map(|(key, param)| format!("n.{} = ${}", key, param))
                    .collect::<Vec<_>>()
                    .join(", ");
                text.push_str(&format!("\nSET {}", set));
            }
        },
        PropertyMode::Replace => {
            let mut entries = vec!["id: $id".to_string()];
            entries.extend(assignments.iter().map(|(key, param)| format!("{}: ${}", key, param)));
            text.push_str(&format!("\nSET n = {{{}}}", entries.join(", ")));
        },
    }

    CypherStatement { text, params }
}

/// `MERGE` a typed relationship between two matched endpoints and report how many
/// endpoint pairs it touched (zero when an endpoint is missing).
pub fn relationship_upsert(rel: &RelationshipUpsert) -> CypherStatement {
    let text = format!(
        "MATCH ({}), ({})\nMERGE (a)-[r:{}]->(b)\nRETURN count(r) AS {}",
        endpoint_pattern("a", &rel.from, "from_id"),
        endpoint_pattern("b", &rel.to, "to_id"),
        quote_identifier(&rel.rel_type),
        MERGED_COLUMN,
    );

    CypherStatement {
        text,
        params: vec![
            ("from_id".to_string(), PropertyValue::String(rel.from.id.clone())),
            ("to_id".to_string(), PropertyValue::String(rel.to.id.clone())),
        ],
    }
}

fn endpoint_pattern(alias: &str, endpoint: &EndpointRef, param: &str) -> String {
    match &endpoint.label {
        Some(label) => format!("{}:{} {{id: ${}}}", alias, quote_identifier(label), param),
        None => format!("{} {{id: ${}}}", alias, param),
    }
}
