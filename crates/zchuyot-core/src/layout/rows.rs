use std::collections::HashMap;

use crate::config::ExtractionConfig;
use crate::extraction::{PageContent, RawFragment};
use crate::layout::direction::{order_fragments, reverse_visual};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Horizontal extent of one column. Column 0 is the rightmost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBand {
    pub x_min: f32,
    pub x_max: f32,
}

impl ColumnBand {
    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    fn overlap(&self, x_min: f32, x_max: f32) -> f32 {
        (self.x_max.min(x_max) - self.x_min.max(x_min)).max(0.0)
    }

    fn distance(&self, x_min: f32, x_max: f32) -> f32 {
        if x_max < self.x_min {
            self.x_min - x_max
        } else if x_min > self.x_max {
            x_min - self.x_max
        } else {
            0.0
        }
    }
}

/// Text of one cell and the columns it covers (inclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct CellSpan {
    pub start_col: usize,
    pub end_col: usize,
    /// Column the cell overlaps most. A data value belongs here even when
    /// its box reaches into a neighbouring column.
    pub col: usize,
    pub text: String,
}

impl CellSpan {
    pub fn covers(&self, col: usize) -> bool {
        self.start_col <= col && col <= self.end_col
    }
}

/// One visual row with its cells in logical (right-to-left) column order.
#[derive(Debug, Clone)]
pub struct LogicalRow {
    pub page_number: usize,
    /// Vertical centre, in points from the top of the page.
    pub y: f32,
    pub height: f32,
    pub cells: Vec<CellSpan>,
    /// Number of horizontally separated chunks before column assignment.
    pub chunk_count: usize,
    /// Distinct columns holding a cell.
    pub covered_columns: usize,
    /// The row does not fill the grid one cell per column: a column is
    /// empty or shared, there are more chunks than columns, or a chunk lay
    /// beyond the outermost columns.
    pub mismatched: bool,
    /// At least one cell's reading order could not be determined.
    pub low_confidence: bool,
}

impl LogicalRow {
    /// Cell covering the given column, if any.
    pub fn cell_at(&self, col: usize) -> Option<&CellSpan> {
        self.cells.iter().find(|c| c.covers(col))
    }

    /// Cell texts laid out over `column_count` columns, each cell at the
    /// column it overlaps most.
    pub fn column_texts(&self, column_count: usize) -> Vec<String> {
        let mut texts = vec![String::new(); column_count];
        for cell in &self.cells {
            if let Some(slot) = texts.get_mut(cell.col) {
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(&cell.text);
            }
        }
        texts
    }

    /// All cell texts in reading order.
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_fragmentary(&self, min_columns: usize) -> bool {
        self.chunk_count < min_columns
    }
}

/// Reconstructed grid of one page.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub page_number: usize,
    pub columns: Vec<ColumnBand>,
    /// Mode of the per-row chunk counts among table-like rows; 0 if none.
    pub dominant_columns: usize,
    pub rows: Vec<LogicalRow>,
}

impl PageLayout {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Where a chunk landed in the grid.
struct Placement {
    start_col: usize,
    end_col: usize,
    col: usize,
    outside: bool,
}

/// Horizontally contiguous fragments of one row, read as a single phrase.
#[derive(Debug, Clone)]
struct Chunk {
    x_min: f32,
    x_max: f32,
    text: String,
    low_confidence: bool,
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

/// Turn a page's fragments into logical rows assigned to column bands.
pub fn reconstruct_page(page: &PageContent, config: &ExtractionConfig) -> PageLayout {
    let fragments: Vec<RawFragment> = page
        .fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .map(|f| {
            let mut f = f.clone();
            f.text = if config.visual_order_text {
                reverse_visual(f.text.trim())
            } else {
                f.text.trim().to_string()
            };
            f
        })
        .collect();

    let visual_rows = group_into_rows(&fragments, config.row_tolerance);
    let chunked: Vec<(f32, f32, Vec<Chunk>)> = visual_rows
        .iter()
        .map(|row| {
            let y = row.iter().map(|f| f.bbox.center_y()).sum::<f32>() / row.len() as f32;
            let height = row.iter().map(|f| f.bbox.height()).fold(0.0, f32::max);
            (y, height, split_chunks(row, config.word_gap))
        })
        .collect();

    let dominant = dominant_column_count(
        chunked.iter().map(|(_, _, chunks)| chunks.len()),
        config.min_columns,
    );
    let columns = match dominant {
        Some(count) => column_bands(
            chunked
                .iter()
                .map(|(_, _, chunks)| chunks)
                .filter(|chunks| chunks.len() == count),
            count,
        ),
        None => Vec::new(),
    };

    let rows = chunked
        .into_iter()
        .map(|(y, height, chunks)| {
            build_row(
                page.page_number,
                y,
                height,
                chunks,
                &columns,
                config.span_overlap,
            )
        })
        .collect();

    log::debug!(
        "page {}: {} row(s), {} column(s)",
        page.page_number,
        visual_rows.len(),
        columns.len()
    );

    PageLayout {
        page_number: page.page_number,
        columns,
        dominant_columns: dominant.unwrap_or(0),
        rows,
    }
}

/// Group fragments into visual rows by vertical centre.
///
/// A fragment joins the current row when its centre is within `tolerance`
/// of the row's running mean centre. Rows come back top to bottom.
fn group_into_rows(fragments: &[RawFragment], tolerance: f32) -> Vec<Vec<&RawFragment>> {
    let mut sorted: Vec<&RawFragment> = fragments.iter().collect();
    sorted.sort_by(|a, b| a.bbox.center_y().total_cmp(&b.bbox.center_y()));

    let mut rows: Vec<Vec<&RawFragment>> = Vec::new();
    let mut mean = 0.0f32;

    for fragment in sorted {
        let cy = fragment.bbox.center_y();
        match rows.last_mut() {
            Some(row) if (cy - mean).abs() <= tolerance => {
                row.push(fragment);
                mean += (cy - mean) / row.len() as f32;
            }
            _ => {
                rows.push(vec![fragment]);
                mean = cy;
            }
        }
    }
    rows
}

/// Merge fragments separated by at most `word_gap` into chunks, each read
/// in logical order. Chunks come back rightmost first.
fn split_chunks(row: &[&RawFragment], word_gap: f32) -> Vec<Chunk> {
    let mut sorted: Vec<&RawFragment> = row.to_vec();
    sorted.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));

    let mut groups: Vec<Vec<&RawFragment>> = Vec::new();
    let mut right_edge = f32::NEG_INFINITY;
    for fragment in sorted {
        match groups.last_mut() {
            Some(group) if fragment.bbox.x_min - right_edge <= word_gap => {
                group.push(fragment);
                right_edge = right_edge.max(fragment.bbox.x_max);
            }
            _ => {
                groups.push(vec![fragment]);
                right_edge = fragment.bbox.x_max;
            }
        }
    }

    let mut chunks: Vec<Chunk> = groups
        .iter()
        .map(|group| {
            let directed = order_fragments(group);
            Chunk {
                x_min: group.iter().map(|f| f.bbox.x_min).fold(f32::INFINITY, f32::min),
                x_max: group
                    .iter()
                    .map(|f| f.bbox.x_max)
                    .fold(f32::NEG_INFINITY, f32::max),
                text: directed.joined(),
                low_confidence: directed.low_confidence,
            }
        })
        .collect();

    chunks.sort_by(|a, b| b.x_max.total_cmp(&a.x_max));
    chunks
}

/// Most frequent chunk count among rows with at least `min_columns` chunks.
/// Ties go to the larger count.
fn dominant_column_count(
    counts: impl Iterator<Item = usize>,
    min_columns: usize,
) -> Option<usize> {
    let mut frequency: HashMap<usize, usize> = HashMap::new();
    for count in counts.filter(|&c| c >= min_columns) {
        *frequency.entry(count).or_insert(0) += 1;
    }
    frequency
        .into_iter()
        .max_by_key(|&(count, freq)| (freq, count))
        .map(|(count, _)| count)
}

/// Column bands from the rows that have exactly the dominant chunk count.
///
/// Each band runs between the median edges of the i-th chunks, so one wide
/// value cannot stretch its column over a neighbour. Bands that still
/// overlap are cut at the middle of the overlap; they are never merged.
fn column_bands<'a>(
    rows: impl Iterator<Item = &'a Vec<Chunk>>,
    count: usize,
) -> Vec<ColumnBand> {
    let mut lefts: Vec<Vec<f32>> = vec![Vec::new(); count];
    let mut rights: Vec<Vec<f32>> = vec![Vec::new(); count];
    for chunks in rows {
        for (i, chunk) in chunks.iter().enumerate().take(count) {
            lefts[i].push(chunk.x_min);
            rights[i].push(chunk.x_max);
        }
    }

    let mut bands: Vec<ColumnBand> = lefts
        .iter_mut()
        .zip(rights.iter_mut())
        .filter(|(l, _)| !l.is_empty())
        .map(|(l, r)| median_band(l, r))
        .collect();

    // rightmost first
    bands.sort_by(|a, b| (b.x_min + b.x_max).total_cmp(&(a.x_min + a.x_max)));
    for i in 1..bands.len() {
        let (right, left) = (bands[i - 1], bands[i]);
        if left.x_max > right.x_min {
            let cut = (left.x_max + right.x_min) / 2.0;
            bands[i].x_max = cut.max(left.x_min);
            bands[i - 1].x_min = cut.min(right.x_max);
        }
    }
    bands
}

/// Band between the median edges of one column's chunks.
///
/// Takes the upper median of left edges and the lower median of right
/// edges; when those cross (cells aligned to opposite sides), falls back to
/// the other medians.
fn median_band(lefts: &mut [f32], rights: &mut [f32]) -> ColumnBand {
    lefts.sort_by(f32::total_cmp);
    rights.sort_by(f32::total_cmp);
    let upper = |v: &[f32]| v[v.len() / 2];
    let lower = |v: &[f32]| v[(v.len() - 1) / 2];

    let (x_min, x_max) = (upper(lefts), lower(rights));
    if x_min <= x_max {
        return ColumnBand { x_min, x_max };
    }
    let (x_min, x_max) = (lower(lefts), upper(rights));
    ColumnBand {
        x_min: x_min.min(x_max),
        x_max: x_max.max(x_min),
    }
}

/// Place a chunk in the grid.
///
/// A chunk belongs to the column it overlaps most. It also spans every
/// column whose width it covers by at least `span_overlap`, which is how
/// header cells over merged columns are recognised. A chunk touching no
/// band goes to the nearest one and is `outside` when it lies beyond the
/// outermost columns.
fn assign_chunk(chunk: &Chunk, columns: &[ColumnBand], span_overlap: f32) -> Placement {
    let overlaps: Vec<f32> = columns
        .iter()
        .map(|c| c.overlap(chunk.x_min, chunk.x_max))
        .collect();

    let best = overlaps
        .iter()
        .enumerate()
        .filter(|(_, ov)| **ov > 0.0)
        .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(i, _)| i);

    let Some(col) = best else {
        let nearest = columns
            .iter()
            .enumerate()
            .min_by(|a, b| {
                a.1.distance(chunk.x_min, chunk.x_max)
                    .total_cmp(&b.1.distance(chunk.x_min, chunk.x_max))
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        let beyond = columns.iter().all(|c| chunk.x_max < c.x_min)
            || columns.iter().all(|c| chunk.x_min > c.x_max);
        return Placement {
            start_col: nearest,
            end_col: nearest,
            col: nearest,
            outside: beyond,
        };
    };

    let spanned: Vec<usize> = columns
        .iter()
        .zip(&overlaps)
        .enumerate()
        .filter(|(_, (band, ov))| band.width() > 0.0 && **ov >= span_overlap * band.width())
        .map(|(i, _)| i)
        .collect();
    let (start_col, end_col) = match (spanned.first(), spanned.last()) {
        (Some(&first), Some(&last)) if last > first => (first.min(col), last.max(col)),
        _ => (col, col),
    };

    Placement {
        start_col,
        end_col,
        col,
        outside: false,
    }
}

fn build_row(
    page_number: usize,
    y: f32,
    height: f32,
    chunks: Vec<Chunk>,
    columns: &[ColumnBand],
    span_overlap: f32,
) -> LogicalRow {
    let chunk_count = chunks.len();
    let low_confidence = chunks.iter().any(|c| c.low_confidence);

    if columns.is_empty() {
        let cells: Vec<CellSpan> = chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| CellSpan {
                start_col: i,
                end_col: i,
                col: i,
                text: c.text,
            })
            .collect();
        return LogicalRow {
            page_number,
            y,
            height,
            covered_columns: cells.len(),
            cells,
            chunk_count,
            mismatched: false,
            low_confidence,
        };
    }

    let mut cells: Vec<CellSpan> = Vec::with_capacity(chunks.len());
    let mut outside = false;
    for chunk in chunks {
        let placement = assign_chunk(&chunk, columns, span_overlap);
        outside |= placement.outside;
        // chunks arrive rightmost first, so appending keeps reading order
        match cells.iter_mut().find(|c| c.col == placement.col) {
            Some(cell) => {
                cell.text.push(' ');
                cell.text.push_str(&chunk.text);
                cell.start_col = cell.start_col.min(placement.start_col);
                cell.end_col = cell.end_col.max(placement.end_col);
            }
            None => cells.push(CellSpan {
                start_col: placement.start_col,
                end_col: placement.end_col,
                col: placement.col,
                text: chunk.text,
            }),
        }
    }
    cells.sort_by_key(|c| c.col);
    let covered_columns = cells.len();

    LogicalRow {
        page_number,
        y,
        height,
        cells,
        chunk_count,
        covered_columns,
        mismatched: outside
            || chunk_count > columns.len()
            || covered_columns != columns.len(),
        low_confidence,
    }
}
