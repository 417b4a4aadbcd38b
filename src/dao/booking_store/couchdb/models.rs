use serde::{Deserialize, Serialize};

use crate::dao::tables::Tables;

/// Identifier of the single document holding every booking table.
pub const TABLES_DOC_ID: &str = "slot-race::tables";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchTablesDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub tables: Tables,
}

impl CouchTablesDocument {
    pub fn new(tables: Tables, rev: Option<String>) -> Self {
        Self {
            id: TABLES_DOC_ID.to_string(),
            rev,
            tables,
        }
    }
}
