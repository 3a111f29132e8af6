pub mod reader;
pub mod union;
pub mod write;

pub use reader::{CsvReader, ReadMode};
pub use union::ColumnUnion;
pub use write::{write_csv, write_parquet};
