use super::{render_text_report, report_filename, write_file, write_report_json, Presenter};
use crate::{
    config::Config,
    report::Report,
    scoring::Grade,
    util::{ensure_dir, now},
};
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2rem auto; max-width: 960px; color: #2c3e50; }
h1 { text-align: center; color: #1f77b4; }
.metrics { display: flex; gap: 1rem; margin: 1.5rem 0; }
.metric { flex: 1; padding: 1rem; border-radius: 8px; background: #f4f6f8; text-align: center; }
.metric .value { font-size: 1.6rem; font-weight: bold; }
.grade-badge { display: inline-block; padding: 0.4rem 1.2rem; border-radius: 8px; font-size: 1.8rem; font-weight: bold; color: #fff; }
.grade-a { background: #27ae60; } .grade-b { background: #2980b9; } .grade-c { background: #f39c12; }
.grade-d { background: #e67e22; } .grade-f { background: #c0392b; } .grade-n { background: #7f8c8d; }
.chart .row { display: flex; align-items: center; margin: 2px 0; }
.chart .label { width: 4rem; }
.chart .bar { background: #1f77b4; height: 1rem; }
.chart .pct { margin-left: 0.5rem; font-size: 0.85rem; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 4px 8px; text-align: right; }
pre { white-space: pre-wrap; background: #fafafa; padding: 1rem; }
.log { font-size: 0.85rem; color: #7f8c8d; }
"#;

/// Interactive presenter: one self-contained HTML page per run.
pub struct HtmlPresenter {
    cfg: Config,
    out_dir: PathBuf,
    log: Vec<(u8, String)>,
}

impl HtmlPresenter {
    pub fn new(cfg: &Config, out_dir: PathBuf) -> Self {
        Self {
            cfg: cfg.clone(),
            out_dir,
            log: Vec::new(),
        }
    }

    pub fn render(&self, report: &Report) -> String {
        let text = render_text_report(report, &self.cfg);
        let download = report_filename(&self.cfg.output.report_prefix, now());
        let mut out = String::new();

        let _ = writeln!(out, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">");
        let _ = writeln!(
            out,
            "<title>{} grading report</title>\n<style>{STYLE}</style>\n</head>\n<body>",
            escape_html(&self.cfg.global.exam_name)
        );
        let _ = writeln!(out, "<h1>Exam Grading System</h1>");
        let _ = writeln!(out, "<p>Graded {}</p>", escape_html(&report.timestamp));

        let _ = writeln!(out, "<details class=\"log\"><summary>Progress</summary><ul>");
        for (percent, status) in &self.log {
            let _ = writeln!(out, "<li>{percent}% {}</li>", escape_html(status));
        }
        let _ = writeln!(out, "</ul></details>");

        let _ = writeln!(out, "<h2>Grading Results</h2>\n<div class=\"metrics\">");
        metric(
            &mut out,
            "Total Score",
            &format!("{:.1}/{:.1}", report.total_obtained, report.total_possible),
        );
        metric(&mut out, "Percentage", &format!("{:.2}%", report.percentage));
        let _ = writeln!(
            out,
            "<div class=\"metric\"><div>Grade</div><span class=\"grade-badge {}\">{}</span></div>",
            grade_class(report.grade),
            escape_html(report.grade.as_str())
        );
        metric(&mut out, "Questions Graded", &report.questions_graded().to_string());
        let _ = writeln!(out, "</div>");

        if let Some(check) = &report.consistency {
            let _ = writeln!(out, "<p><strong>Consistency:</strong> {}</p>", escape_html(&check.summary()));
        }

        let _ = writeln!(out, "<h2>Question-wise Scores</h2>\n<div class=\"chart\">");
        for (idx, score) in report.question_scores.iter().enumerate() {
            let pct = question_percentage(score.obtained, score.possible);
            let _ = writeln!(
                out,
                "<div class=\"row\"><span class=\"label\">Q{}</span><span class=\"bar\" style=\"width: {:.1}%\"></span><span class=\"pct\">{:.1}%</span></div>",
                idx + 1,
                pct.clamp(0.0, 100.0),
                pct
            );
        }
        let _ = writeln!(out, "</div>");

        let _ = writeln!(
            out,
            "<details><summary>Detailed Score Table</summary>\n<table>\n<tr><th>Question</th><th>Obtained</th><th>Total</th><th>Percentage</th></tr>"
        );
        for (idx, score) in report.question_scores.iter().enumerate() {
            let _ = writeln!(
                out,
                "<tr><td>Q{}</td><td>{}</td><td>{}</td><td>{:.1}</td></tr>",
                idx + 1,
                score.obtained,
                score.possible,
                question_percentage(score.obtained, score.possible)
            );
        }
        let _ = writeln!(out, "</table>\n</details>");

        let _ = writeln!(out, "<h2>Detailed Evaluation</h2>");
        for section in &report.sections {
            let _ = writeln!(
                out,
                "<details><summary>{}</summary>\n<pre>{}</pre>\n</details>",
                escape_html(&section.name),
                escape_html(&section.content)
            );
        }

        let _ = writeln!(
            out,
            "<p><a download=\"{}\" href=\"data:text/plain;charset=utf-8;base64,{}\">Download Full Report</a></p>",
            escape_html(&download),
            STANDARD.encode(text.as_bytes())
        );
        let _ = writeln!(out, "</body>\n</html>");
        out
    }
}

impl Presenter for HtmlPresenter {
    fn progress(&mut self, percent: u8, status: &str) {
        info!("[{percent:>3}%] {status}");
        self.log.push((percent, status.to_string()));
    }

    fn present(&mut self, report: &Report) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.out_dir)?;
        let mut written = vec![write_file(
            &self.out_dir.join(&self.cfg.output.html_filename),
            &self.render(report),
        )?];
        written.extend(write_report_json(report, &self.cfg, &self.out_dir)?);
        for path in &written {
            info!("wrote {}", path.display());
        }
        Ok(written)
    }
}

fn metric(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        out,
        "<div class=\"metric\"><div>{}</div><div class=\"value\">{}</div></div>",
        escape_html(label),
        escape_html(value)
    );
}

fn question_percentage(obtained: f64, possible: f64) -> f64 {
    if possible > 0.0 {
        (obtained / possible * 1000.0).round() / 10.0
    } else {
        0.0
    }
}

fn grade_class(grade: Grade) -> &'static str {
    match grade {
        Grade::APlus | Grade::A => "grade-a",
        Grade::BPlus | Grade::B => "grade-b",
        Grade::C => "grade-c",
        Grade::D => "grade-d",
        Grade::F => "grade-f",
        Grade::NotApplicable => "grade-n",
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        report::{aggregate, SectionResult},
        scoring::QuestionScore,
    };
    use time::macros::datetime;

    #[test]
    fn escapes_model_output() {
        assert_eq!(escape_html("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }

    #[test]
    fn page_embeds_chart_transcript_and_download() {
        let report = aggregate(
            vec![SectionResult {
                name: "Section A".into(),
                content: "Question 1: 1/2 <script>".into(),
            }],
            vec![QuestionScore { obtained: 1.0, possible: 2.0 }],
            datetime!(2025-01-01 00:00:00 UTC),
        );
        let mut presenter = HtmlPresenter::new(&Config::default(), PathBuf::from("unused"));
        presenter.progress(10, "Converting PDF to images...");
        let html = presenter.render(&report);

        assert!(html.contains("<li>10% Converting PDF to images...</li>"));
        assert!(html.contains("grade-badge grade-c\">C</span>"));
        assert!(html.contains("style=\"width: 50.0%\""));
        assert!(html.contains("Question 1: 1/2 &lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("href=\"data:text/plain;charset=utf-8;base64,"));
    }

    #[test]
    fn failing_grade_gets_f_badge() {
        let report = aggregate(
            vec![SectionResult {
                name: "Section A".into(),
                content: "Question 1: 1/3".into(),
            }],
            vec![QuestionScore { obtained: 1.0, possible: 3.0 }],
            datetime!(2025-01-01 00:00:00 UTC),
        );
        let html = HtmlPresenter::new(&Config::default(), PathBuf::from("unused")).render(&report);
        assert!(html.contains("grade-badge grade-f\">F</span>"));
    }
}
