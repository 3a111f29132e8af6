pub mod project;
pub mod registry;
pub mod types;

pub use project::project_columns;
pub use registry::{
    DocumentSchema, SchemaRegistry, PROVENANCE_COLUMNS, SOURCE_FILE, SOURCE_YEAR,
};
pub use types::DocumentType;
