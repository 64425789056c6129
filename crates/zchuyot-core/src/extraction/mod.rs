pub mod pdftotext;

use crate::error::RightsError;

/// Bounding box in PDF points, origin top-left, y growing downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn center_y(&self) -> f32 {
        (self.y_min + self.y_max) / 2.0
    }
}

/// A positioned piece of text on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment {
    pub text: String,
    pub bbox: BBox,
    /// 0-based page index.
    pub page_index: usize,
    pub font_size: Option<f32>,
}

/// Content extracted from a single page of a PDF.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number.
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub fragments: Vec<RawFragment>,
}

impl PageContent {
    pub fn has_text(&self) -> bool {
        self.fragments.iter().any(|f| !f.text.trim().is_empty())
    }
}

/// Trait for PDF text extraction backends.
pub trait PdfExtractor: Send + Sync {
    /// Extract positioned text from PDF bytes, returning one PageContent per page.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageContent>, RightsError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
