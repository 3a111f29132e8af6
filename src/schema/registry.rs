// src/schema/registry.rs

use serde::{Deserialize, Serialize};

use super::types::DocumentType;

/// Provenance column holding the basename of the originating CSV.
pub const SOURCE_FILE: &str = "source_file";
/// Provenance column holding the group key (year or district) of the originating CSV.
pub const SOURCE_YEAR: &str = "source_year";
pub const PROVENANCE_COLUMNS: [&str; 2] = [SOURCE_FILE, SOURCE_YEAR];

/// Identity columns stamped onto every row by the extraction step.
const FILING_COLUMNS: [&str; 4] = ["Bank Name", "table presence", "Bank_PDF-Name", "Year"];

/// Insider fields in published order (a2 = name ... b11 = other companies >= 25%).
const INSIDER_FIELDS: [&str; 12] = [
    "a2",
    "b2",
    "b3",
    "b4",
    "b5",
    "b6",
    "b7",
    "b8",
    "b9",
    "b10",
    "b11",
    "b9_full_voting_shares_text",
];

/// Column expectations for one document type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSchema {
    /// Columns every raw per-filing CSV must carry, provenance excluded.
    pub required_file_columns: Vec<String>,
    /// Fixed output order for the combined table, if the type has one.
    #[serde(default)]
    pub published_columns: Option<Vec<String>>,
}

impl DocumentSchema {
    /// `required_file_columns` followed by the provenance columns added at ingestion.
    pub fn required_full_columns(&self) -> Vec<String> {
        self.required_file_columns
            .iter()
            .cloned()
            .chain(PROVENANCE_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }
}

/// Immutable schema configuration for both document types.
///
/// Built-in defaults match the extraction prompt output; a pipeline config
/// file may replace either entry wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaRegistry {
    pub securities: DocumentSchema,
    pub insiders: DocumentSchema,
}

impl SchemaRegistry {
    pub fn get(&self, doc_type: DocumentType) -> &DocumentSchema {
        match doc_type {
            DocumentType::Securities => &self.securities,
            DocumentType::Insiders => &self.insiders,
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let required: Vec<String> = FILING_COLUMNS.iter().map(|c| c.to_string()).collect();

        let published = FILING_COLUMNS
            .iter()
            .chain(PROVENANCE_COLUMNS.iter())
            .chain(INSIDER_FIELDS.iter())
            .map(|c| c.to_string())
            .collect();

        Self {
            securities: DocumentSchema {
                required_file_columns: required.clone(),
                published_columns: None,
            },
            insiders: DocumentSchema {
                required_file_columns: required,
                published_columns: Some(published),
            },
        }
    }
}
