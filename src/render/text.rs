use super::{render_text_report, report_filename, write_file, write_report_json, Presenter};
use crate::{config::Config, report::Report, util::{ensure_dir, now}};
use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Batch presenter. Progress goes to the log; the report goes to stdout and
/// a timestamped text file.
pub struct ConsolePresenter {
    cfg: Config,
    out_dir: PathBuf,
}

impl ConsolePresenter {
    pub fn new(cfg: &Config, out_dir: PathBuf) -> Self {
        Self {
            cfg: cfg.clone(),
            out_dir,
        }
    }
}

impl Presenter for ConsolePresenter {
    fn progress(&mut self, percent: u8, status: &str) {
        info!("[{percent:>3}%] {status}");
    }

    fn present(&mut self, report: &Report) -> Result<Vec<PathBuf>> {
        let body = render_text_report(report, &self.cfg);
        if self.cfg.output.print_transcript {
            println!("{body}");
        }

        ensure_dir(&self.out_dir)?;
        let mut written = Vec::new();
        if self.cfg.output.write_text_report {
            let path = self
                .out_dir
                .join(report_filename(&self.cfg.output.report_prefix, now()));
            written.push(write_file(&path, &body)?);
        }
        written.extend(write_report_json(report, &self.cfg, &self.out_dir)?);

        for path in &written {
            info!("wrote {}", path.display());
        }
        Ok(written)
    }
}
