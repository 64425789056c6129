use crate::error::RightsError;
use crate::extraction::{BBox, PageContent, PdfExtractor, RawFragment};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Write;
use std::process::Command;

/// PDF extraction backend using pdftotext (from poppler-utils).
///
/// Uses `pdftotext -bbox` to get every word with its bounding box.
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        PdftotextExtractor
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for PdftotextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, RightsError> {
        let mut tmpfile =
            tempfile::NamedTempFile::new().map_err(|e| RightsError::Extraction(e.to_string()))?;
        tmpfile
            .write_all(pdf_bytes)
            .map_err(|e| RightsError::Extraction(e.to_string()))?;

        let output = Command::new("pdftotext")
            .arg("-bbox")
            .arg(tmpfile.path())
            .arg("-")
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RightsError::PdftotextNotFound
                } else {
                    RightsError::Extraction(format!("pdftotext -bbox failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(RightsError::PdftotextFailed { code, stderr });
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let pages = parse_bbox_xml(&xml)?;
        log::debug!(
            "pdftotext: {} page(s), {} word(s)",
            pages.len(),
            pages.iter().map(|p| p.fragments.len()).sum::<usize>()
        );
        Ok(pages)
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

/// Parse the XHTML produced by `pdftotext -bbox` into pages of word fragments.
fn parse_bbox_xml(xml: &str) -> Result<Vec<PageContent>, RightsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages: Vec<PageContent> = Vec::new();
    let mut current_word: Option<BBox> = None;
    let mut word_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => {
                    let page_number = pages.len() + 1;
                    pages.push(PageContent {
                        page_number,
                        width: attr_f32(&e, b"width")?.unwrap_or(0.0),
                        height: attr_f32(&e, b"height")?.unwrap_or(0.0),
                        fragments: Vec::new(),
                    });
                }
                b"word" => {
                    current_word = parse_bbox(&e)?;
                    word_text.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"page" => {
                let page_number = pages.len() + 1;
                pages.push(PageContent {
                    page_number,
                    width: attr_f32(&e, b"width")?.unwrap_or(0.0),
                    height: attr_f32(&e, b"height")?.unwrap_or(0.0),
                    fragments: Vec::new(),
                });
            }
            Ok(Event::Text(t)) => {
                if current_word.is_some() {
                    let text = t
                        .unescape()
                        .map_err(|e| RightsError::ParseError(e.to_string()))?;
                    word_text.push_str(&text);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"word" => {
                if let (Some(bbox), Some(page)) = (current_word.take(), pages.last_mut()) {
                    let text = word_text.trim();
                    if !text.is_empty() {
                        page.fragments.push(RawFragment {
                            text: text.to_string(),
                            bbox,
                            page_index: page.page_number - 1,
                            font_size: Some(bbox.height()),
                        });
                    }
                }
                word_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RightsError::ParseError(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(pages)
}

fn attr_f32(tag: &BytesStart<'_>, name: &[u8]) -> Result<Option<f32>, RightsError> {
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| RightsError::ParseError(e.to_string()))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| RightsError::ParseError(e.to_string()))?;
            return Ok(value.trim().parse().ok());
        }
    }
    Ok(None)
}

fn parse_bbox(tag: &BytesStart<'_>) -> Result<Option<BBox>, RightsError> {
    let (Some(x_min), Some(y_min), Some(x_max), Some(y_max)) = (
        attr_f32(tag, b"xMin")?,
        attr_f32(tag, b"yMin")?,
        attr_f32(tag, b"xMax")?,
        attr_f32(tag, b"yMax")?,
    ) else {
        return Ok(None);
    };
    Ok(Some(BBox {
        x_min,
        y_min,
        x_max,
        y_max,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
<title></title>
<meta name="Producer" content="GPL Ghostscript"/>
<meta http-equiv="Content-Type" content="text/html; charset=UTF-8"/>
</head>
<body>
<doc>
  <page width="595.276000" height="841.890000">
    <word xMin="500.0" yMin="100.0" xMax="530.0" yMax="110.0">מספר</word>
    <word xMin="460.0" yMin="100.0" xMax="495.0" yMax="110.0">קומות</word>
    <word xMin="420.0" yMin="100.0" xMax="432.0" yMax="110.0">15</word>
    <word xMin="10.0" yMin="120.0" xMax="30.0" yMax="130.0">A&amp;B</word>
  </page>
  <page width="595.276000" height="841.890000">
  </page>
</doc>
</body>
</html>"#;

    #[test]
    fn test_parse_bbox_xml_words() {
        let pages = parse_bbox_xml(SAMPLE).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].fragments.len(), 4);
        assert_eq!(pages[0].fragments[0].text, "מספר");
        assert_eq!(pages[0].fragments[0].bbox.x_min, 500.0);
        assert_eq!(pages[0].fragments[0].font_size, Some(10.0));
        assert_eq!(pages[0].fragments[3].text, "A&B");
        assert_eq!(pages[0].width, 595.276);
    }

    #[test]
    fn test_empty_page_has_no_text() {
        let pages = parse_bbox_xml(SAMPLE).unwrap();
        assert!(pages[0].has_text());
        assert!(!pages[1].has_text());
        assert_eq!(pages[1].page_number, 2);
    }

    #[test]
    fn test_word_without_bbox_is_skipped() {
        let xml = r#"<doc><page width="10" height="10"><word>loose</word></page></doc>"#;
        let pages = parse_bbox_xml(xml).unwrap();
        assert!(pages[0].fragments.is_empty());
    }
}
