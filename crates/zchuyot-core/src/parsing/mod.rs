//! From logical rows to typed records: header bands, cell values, rows.

pub mod assemble;
pub mod header;
pub mod values;

pub use assemble::{assemble_row, AssembledRow, CellIssue, RowContext};
pub use header::{build_schema, detect_header, is_data_row, merge_header_band, HeaderCandidate};
pub use values::{parse_cell, CellError};
