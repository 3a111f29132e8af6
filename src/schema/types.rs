// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two tables extracted from every FR Y-6 filing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Shareholders holding voting securities of the holding company.
    Securities,
    /// Directors, officers and principal shareholders.
    Insiders,
}

impl DocumentType {
    /// Processing order used by the pipeline.
    pub const ALL: [DocumentType; 2] = [DocumentType::Securities, DocumentType::Insiders];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Securities => "securities",
            DocumentType::Insiders => "insiders",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
