pub mod html;
pub mod text;

use crate::{config::Config, report::Report, util::file_timestamp};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub use html::HtmlPresenter;
pub use text::ConsolePresenter;

/// Where progress and the finished report go.
pub trait Presenter {
    fn progress(&mut self, percent: u8, status: &str);

    /// Show or persist the report; returns the files written.
    fn present(&mut self, report: &Report) -> Result<Vec<PathBuf>>;
}

/// The plain-text report shared by every presenter.
pub fn render_text_report(report: &Report, cfg: &Config) -> String {
    let heavy = "=".repeat(100);
    let light = "=".repeat(80);
    let mut out = String::new();

    let _ = writeln!(out, "\nEXAM GRADING REPORT\n{heavy}");
    let _ = writeln!(out, "Date: {}", report.timestamp);
    let _ = writeln!(out, "Exam: {}", cfg.global.exam_name);

    let _ = writeln!(out, "\nCONFIGURATION:");
    let _ = writeln!(out, "Model: {}", cfg.model.model);
    let _ = writeln!(out, "Temperature: {}", cfg.model.temperature);
    let _ = writeln!(out, "Seed: {}", cfg.model.seed);
    let _ = writeln!(out, "Retrieval top-k: {}", cfg.retrieval.top_k);
    let _ = writeln!(out, "Max tool rounds: {}", cfg.grading.max_tool_iterations);

    let _ = writeln!(out, "\nSUMMARY:");
    let _ = writeln!(
        out,
        "Total Score: {:.1}/{:.1}",
        report.total_obtained, report.total_possible
    );
    let _ = writeln!(out, "Percentage: {:.2}%", report.percentage);
    let _ = writeln!(out, "Grade: {}", report.grade);
    let _ = writeln!(out, "Questions Graded: {}", report.questions_graded());

    let _ = writeln!(out, "\nQUESTION-WISE SCORES:");
    for (idx, score) in report.question_scores.iter().enumerate() {
        let _ = writeln!(
            out,
            "Question {}: {:.1}/{:.1}",
            idx + 1,
            score.obtained,
            score.possible
        );
    }

    if let Some(check) = &report.consistency {
        let _ = writeln!(out, "\nCONSISTENCY CHECK:\n{}", check.summary());
    }

    let _ = writeln!(out, "\n{heavy}\nDETAILED EVALUATION:\n{heavy}\n");
    for section in &report.sections {
        let _ = writeln!(out, "\n{}\n{light}\n{}\n", section.name, section.content);
    }
    out
}

/// `<prefix>YYYYmmdd_HHMMSS.txt`
pub fn report_filename(prefix: &str, at: OffsetDateTime) -> String {
    format!("{prefix}{}.txt", file_timestamp(at))
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<PathBuf> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Write `report.json` into `out_dir` when enabled.
pub(crate) fn write_report_json(
    report: &Report,
    cfg: &Config,
    out_dir: &Path,
) -> Result<Option<PathBuf>> {
    if !cfg.output.write_report_json {
        return Ok(None);
    }
    let path = out_dir.join(&cfg.output.report_json_filename);
    write_file(&path, &serde_json::to_string_pretty(report)?).map(Some)
}
