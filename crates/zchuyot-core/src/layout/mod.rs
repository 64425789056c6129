//! Page geometry: from positioned fragments to ordered rows and columns.

pub mod direction;
pub mod rows;

pub use direction::{order_fragments, reverse_visual, DirectedRow, Script};
pub use rows::{reconstruct_page, CellSpan, ColumnBand, LogicalRow, PageLayout};
