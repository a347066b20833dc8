pub mod poppler;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use types::{PageImage, PdfInfo, ToolDiag};

/// PDF operations the grader delegates to an external toolchain.
pub trait Engine {
    fn doctor(&self) -> Result<Vec<ToolDiag>>;
    fn pdf_info(&self, input: &Path) -> Result<PdfInfo>;
    /// Rasterize every page into `out_dir`, in page order.
    fn render_pages(&self, input: &Path, out_dir: &Path) -> Result<Vec<PageImage>>;
    /// Plain text of each page, in page order.
    fn extract_text(&self, input: &Path) -> Result<Vec<String>>;
}
