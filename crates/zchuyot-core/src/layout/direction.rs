//! Logical reading order for right-to-left Hebrew rows.
//!
//! Hebrew runs right to left, but digit runs and Latin abbreviations inside
//! it are left-to-right islands. Fragments are ordered rightmost first and
//! each island is then flipped back so numbers read in their own order.

use crate::extraction::RawFragment;

/// Dominant script of a text fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Rtl,
    Ltr,
    /// Punctuation, symbols, whitespace only.
    Neutral,
    /// Both scripts, neither dominant.
    Ambiguous,
}

/// Fragments of one row in logical order.
#[derive(Debug, Clone)]
pub struct DirectedRow<'a> {
    pub order: Vec<&'a RawFragment>,
    /// Direction could not be inferred; `order` is raw left-to-right.
    pub low_confidence: bool,
}

impl DirectedRow<'_> {
    pub fn texts(&self) -> Vec<&str> {
        self.order.iter().map(|f| f.text.as_str()).collect()
    }

    pub fn joined(&self) -> String {
        self.texts().join(" ")
    }
}

pub fn is_hebrew(c: char) -> bool {
    matches!(c, '\u{0590}'..='\u{05FF}' | '\u{FB1D}'..='\u{FB4F}')
}

fn is_ltr_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || (c.is_alphabetic() && !is_hebrew(c))
}

pub fn classify_script(text: &str) -> Script {
    let mut rtl = 0usize;
    let mut ltr = 0usize;
    for c in text.chars() {
        if is_hebrew(c) {
            rtl += 1;
        } else if is_ltr_char(c) {
            ltr += 1;
        }
    }

    match (rtl, ltr) {
        (0, 0) => Script::Neutral,
        (_, 0) => Script::Rtl,
        (0, _) => Script::Ltr,
        (r, l) if r >= 2 * l => Script::Rtl,
        (r, l) if l >= 2 * r => Script::Ltr,
        _ => Script::Ambiguous,
    }
}

/// Order the fragments of one visual row for reading.
pub fn order_fragments<'a>(fragments: &[&'a RawFragment]) -> DirectedRow<'a> {
    let mut order: Vec<&RawFragment> = fragments.to_vec();
    if order.len() < 2 {
        return DirectedRow {
            order,
            low_confidence: false,
        };
    }

    let scripts: Vec<Script> = order.iter().map(|f| classify_script(&f.text)).collect();

    if scripts.contains(&Script::Ambiguous) {
        order.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
        return DirectedRow {
            order,
            low_confidence: true,
        };
    }

    if !scripts.contains(&Script::Rtl) {
        // a purely numeric/Latin row is one left-to-right run
        order.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
        return DirectedRow {
            order,
            low_confidence: false,
        };
    }

    order.sort_by(|a, b| b.bbox.x_max.total_cmp(&a.bbox.x_max));
    let scripts: Vec<Script> = order.iter().map(|f| classify_script(&f.text)).collect();

    for (start, end) in ltr_runs(&scripts) {
        order[start..end].reverse();
    }

    DirectedRow {
        order,
        low_confidence: false,
    }
}

/// Maximal LTR runs as half-open index ranges. Neutral fragments between
/// two LTR fragments belong to the run; neutral fragments at its edges do not.
fn ltr_runs(scripts: &[Script]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < scripts.len() {
        if scripts[i] != Script::Ltr {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i + 1;
        let mut j = i + 1;
        while j < scripts.len() && scripts[j] != Script::Rtl {
            if scripts[j] == Script::Ltr {
                end = j + 1;
            }
            j += 1;
        }
        if end - start > 1 {
            runs.push((start, end));
        }
        i = end;
    }
    runs
}

/// Convert text stored in visual order into logical order.
///
/// Characters are reversed, but digit runs (with their inner `,` `.` `/`
/// `-` separators) keep their left-to-right order.
pub fn reverse_visual(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut segments: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            let mut end = i + 1;
            let mut j = i + 1;
            while j < chars.len()
                && (chars[j].is_ascii_digit() || matches!(chars[j], ',' | '.' | '/' | '-'))
            {
                if chars[j].is_ascii_digit() {
                    end = j + 1;
                }
                j += 1;
            }
            segments.push(chars[start..end].iter().collect());
            i = end;
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_ascii_digit() {
                i += 1;
            }
            segments.push(chars[start..i].iter().rev().collect());
        }
    }

    segments.into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::BBox;

    fn frag(text: &str, x_min: f32, x_max: f32) -> RawFragment {
        RawFragment {
            text: text.to_string(),
            bbox: BBox {
                x_min,
                y_min: 100.0,
                x_max,
                y_max: 110.0,
            },
            page_index: 0,
            font_size: Some(10.0),
        }
    }

    #[test]
    fn test_classify_script() {
        assert_eq!(classify_script("קומות"), Script::Rtl);
        assert_eq!(classify_script("15"), Script::Ltr);
        assert_eq!(classify_script("19,183"), Script::Ltr);
        assert_eq!(classify_script("יח\"ד"), Script::Rtl);
        assert_eq!(classify_script("-"), Script::Neutral);
        assert_eq!(classify_script("אב12"), Script::Ambiguous);
    }

    #[test]
    fn test_label_with_trailing_number() {
        let a = frag("15", 10.0, 22.0);
        let b = frag("קומות", 50.0, 80.0);
        let c = frag("מספר", 100.0, 130.0);
        let row = order_fragments(&[&a, &b, &c]);
        assert_eq!(row.texts(), vec!["מספר", "קומות", "15"]);
        assert!(!row.low_confidence);
    }

    #[test]
    fn test_rtl_only_row_is_rightmost_first() {
        let a = frag("מגורים", 10.0, 50.0);
        let b = frag("אזור", 60.0, 90.0);
        let row = order_fragments(&[&a, &b]);
        assert_eq!(row.joined(), "אזור מגורים");
    }

    #[test]
    fn test_ltr_island_keeps_internal_order() {
        // "שטח 1 2 מ"ר" with the two digits forming one island
        let unit = frag("מ\"ר", 10.0, 30.0);
        let two = frag("2", 35.0, 40.0);
        let one = frag("1", 25.0, 32.0);
        let label = frag("שטח", 60.0, 90.0);
        let row = order_fragments(&[&unit, &two, &one, &label]);
        assert_eq!(row.texts(), vec!["שטח", "1", "2", "מ\"ר"]);
    }

    #[test]
    fn test_numeric_only_row_is_left_to_right() {
        let a = frag("3", 70.0, 80.0);
        let b = frag("1", 10.0, 20.0);
        let c = frag("2", 40.0, 50.0);
        let row = order_fragments(&[&a, &b, &c]);
        assert_eq!(row.texts(), vec!["1", "2", "3"]);
        assert!(!row.low_confidence);
    }

    #[test]
    fn test_ambiguous_falls_back_to_raw_order() {
        let a = frag("אב12", 50.0, 80.0);
        let b = frag("מגרש", 10.0, 40.0);
        let row = order_fragments(&[&a, &b]);
        assert!(row.low_confidence);
        assert_eq!(row.texts(), vec!["מגרש", "אב12"]);
    }

    #[test]
    fn test_neutral_inside_island_joins_run() {
        let a = frag("10", 10.0, 20.0);
        let dash = frag("-", 22.0, 26.0);
        let b = frag("20", 28.0, 38.0);
        let label = frag("בין", 50.0, 70.0);
        let row = order_fragments(&[&a, &dash, &b, &label]);
        assert_eq!(row.texts(), vec!["בין", "10", "-", "20"]);
    }

    #[test]
    fn test_reverse_visual() {
        assert_eq!(reverse_visual("םירוגמ"), "מגורים");
        assert_eq!(reverse_visual("390 שרגמ"), "מגרש 390");
        assert_eq!(reverse_visual("19,183"), "19,183");
        let result = reverse_visual("260 (1) שרגמ");
        assert!(result.contains("מגרש"));
        assert!(result.contains("260"));
    }
}
