use crate::config::ExtractionConfig;
use crate::model::{CellValue, SemanticType};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Why a non-empty cell could not be read as its column's type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    #[error("'{raw}' is not a number")]
    NotANumber { raw: String },

    #[error("'{raw}' is not a whole number")]
    NotIntegral { raw: String },
}

/// Parse a raw cell string into a typed value.
///
/// Handles formats like:
/// - "" or a placeholder ("-", "אין", "ל\"ר") -> None
/// - "0" -> Some(0), never None
/// - "1,200" -> 1200 (thousands separator)
/// - "2,5" -> 2.5 (decimal comma)
/// - "1,234.5" / "1.234,5" -> 1234.5 (rightmost separator is the decimal point)
/// - "250 (3)" -> 250 (footnote reference stripped); "(3)" alone -> None
/// - "250 מ\"ר", "60%" -> unit markers stripped
pub fn parse_cell(
    raw: &str,
    semantic_type: SemanticType,
    config: &ExtractionConfig,
) -> Result<Option<CellValue>, CellError> {
    let s = collapse_whitespace(raw);
    if s.is_empty() || config.is_placeholder(&s) {
        return Ok(None);
    }

    match semantic_type {
        SemanticType::Text => Ok(Some(CellValue::Text(s))),
        SemanticType::Number | SemanticType::Percent => {
            Ok(parse_number(&s, config)?.map(CellValue::Number))
        }
        SemanticType::Integer => {
            let Some(d) = parse_number(&s, config)? else {
                return Ok(None);
            };
            if !d.fract().is_zero() {
                return Err(CellError::NotIntegral { raw: s });
            }
            d.trunc()
                .to_i64()
                .map(|n| Some(CellValue::Integer(n)))
                .ok_or(CellError::NotANumber { raw: s })
        }
    }
}

/// Whether a cell reads as a number (or a placeholder standing in for one).
pub fn looks_numeric(raw: &str, config: &ExtractionConfig) -> bool {
    let s = collapse_whitespace(raw);
    if s.is_empty() {
        return false;
    }
    if config.is_placeholder(&s) {
        return true;
    }
    matches!(parse_number(&s, config), Ok(Some(_)))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_number(s: &str, config: &ExtractionConfig) -> Result<Option<Decimal>, CellError> {
    let stripped = strip_footnotes(s);
    if stripped.is_empty() || config.is_placeholder(&stripped) {
        return Ok(None);
    }

    let core = strip_units(&stripped, &config.unit_markers);
    let normalized = normalize_separators(&core).ok_or_else(|| CellError::NotANumber {
        raw: s.to_string(),
    })?;

    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|_| CellError::NotANumber { raw: s.to_string() })
}

/// Remove "(N)" footnote references.
fn strip_footnotes(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '(' {
            let digits = chars[i + 1..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if digits > 0 && chars.get(i + 1 + digits) == Some(&')') {
                i += digits + 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    collapse_whitespace(&out)
}

/// Strip unit markers from either end. A marker only counts when it is
/// separated from the number by whitespace or sits right against a digit.
fn strip_units(s: &str, markers: &[String]) -> String {
    let mut markers: Vec<&str> = markers.iter().map(String::as_str).collect();
    markers.sort_by_key(|m| std::cmp::Reverse(m.chars().count()));

    let mut current = s.trim().to_string();
    loop {
        let before = current.clone();
        for &marker in &markers {
            if let Some(rest) = current.strip_suffix(marker) {
                if rest.ends_with(|c: char| c.is_ascii_digit() || c.is_whitespace()) {
                    current = rest.trim().to_string();
                }
            }
            if let Some(rest) = current.strip_prefix(marker) {
                if rest.starts_with(|c: char| c.is_ascii_digit() || c.is_whitespace()) {
                    current = rest.trim().to_string();
                }
            }
        }
        if current == before {
            return current;
        }
    }
}

/// Canonical decimal string, or None if the text is not a plain number.
fn normalize_separators(s: &str) -> Option<String> {
    let s: String = s
        .chars()
        .filter(|c| !matches!(c, '\'' | '׳' | '\u{2019}'))
        .collect();

    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.strip_prefix('+').unwrap_or(&s)),
    };

    if !body.ends_with(|c: char| c.is_ascii_digit())
        || !body
            .chars()
            .all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    let normalized = match (body.rfind(','), body.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => body.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => body.replace(',', ""),
        (Some(_), None) if is_grouped(body, ',') => body.replace(',', ""),
        (Some(_), None) if body.matches(',').count() == 1 => body.replace(',', "."),
        (Some(_), None) => return None,
        (None, Some(_)) if body.matches('.').count() > 1 => {
            if !is_grouped(body, '.') {
                return None;
            }
            body.replace('.', "")
        }
        _ => body.to_string(),
    };

    if normalized.matches('.').count() > 1 {
        return None;
    }
    Some(format!("{sign}{normalized}"))
}

/// "12,345,678": a 1-3 digit lead group (not starting with 0) followed by
/// groups of exactly three digits.
fn is_grouped(body: &str, sep: char) -> bool {
    let mut parts = body.split(sep);
    let Some(first) = parts.next() else {
        return false;
    };
    (1..=3).contains(&first.len())
        && !first.starts_with('0')
        && first.chars().all(|c| c.is_ascii_digit())
        && parts.all(|p| p.len() == 3 && p.chars().all(|c| c.is_ascii_digit()))
}
