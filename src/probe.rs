use crate::{config::Config, engine::Engine};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub path: String,
    pub file_bytes: u64,
    pub page_count: u32,
    #[serde(default)]
    pub title: Option<String>,
}

/// Check an exam PDF against the configured limits before any page is
/// rendered.
pub fn probe_pdf(cfg: &Config, engine: &dyn Engine, input: &Path) -> Result<ProbeResult> {
    let meta = std::fs::metadata(input)
        .with_context(|| format!("stat input: {}", input.display()))?;
    let file_bytes = meta.len();
    if file_bytes > cfg.limits.max_input_file_bytes {
        anyhow::bail!("input exceeds max_input_file_bytes: {}", file_bytes);
    }

    let info = engine
        .pdf_info(input)
        .with_context(|| "engine pdf_info failed")?;

    if info.page_count > cfg.limits.max_input_pages {
        anyhow::bail!("input exceeds max_input_pages: {}", info.page_count);
    }
    if info.page_count == 0 {
        anyhow::bail!("input has zero pages");
    }

    Ok(ProbeResult {
        path: input.display().to_string(),
        file_bytes,
        page_count: info.page_count,
        title: info.title,
    })
}
