use super::{types::*, Engine};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const PAGE_PREFIX: &str = "page";

/// Drives poppler's command-line tools (`pdfinfo`, `pdftoppm`, `pdftotext`).
pub struct PopplerEngine {
    cfg: Config,
}

impl PopplerEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        if cfg.pdf.dpi == 0 {
            return Err(anyhow!("pdf.dpi must be positive"));
        }
        Ok(Self { cfg: cfg.clone() })
    }

    fn timeout(&self) -> Option<Duration> {
        (self.cfg.pdf.timeout_seconds > 0).then(|| Duration::from_secs(self.cfg.pdf.timeout_seconds))
    }

    fn run(&self, exe: &str, args: &[OsString]) -> Result<Output> {
        debug!("exec {} {:?} timeout={:?}", exe, args, self.timeout());
        let mut cmd = Command::new(exe);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().with_context(|| format!("spawning {}", exe))?;

        let output = match self.timeout() {
            Some(limit) => wait_with_timeout(&mut child, limit)?,
            None => child
                .wait_with_output()
                .with_context(|| format!("waiting for {}", exe))?,
        };

        if !output.status.success() {
            return Err(anyhow!(
                "{} failed ({}): {}",
                exe,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(output)
    }

    fn version_of(&self, exe: &str) -> ToolDiag {
        match self.run(exe, &["-v".into()]) {
            Ok(out) => {
                // poppler prints its banner on stderr
                let banner = if out.stderr.is_empty() { &out.stdout } else { &out.stderr };
                let version = String::from_utf8_lossy(banner)
                    .lines()
                    .next()
                    .map(|l| l.trim().to_string());
                ToolDiag {
                    tool: exe.to_string(),
                    ok: true,
                    version,
                    error: None,
                }
            }
            Err(e) => ToolDiag {
                tool: exe.to_string(),
                ok: false,
                version: None,
                error: Some(format!("{:#}", e)),
            },
        }
    }
}

impl Engine for PopplerEngine {
    fn doctor(&self) -> Result<Vec<ToolDiag>> {
        Ok([
            &self.cfg.pdf.pdfinfo_exe,
            &self.cfg.pdf.pdftoppm_exe,
            &self.cfg.pdf.pdftotext_exe,
        ]
        .iter()
        .map(|exe| self.version_of(exe))
        .collect())
    }

    fn pdf_info(&self, input: &Path) -> Result<PdfInfo> {
        let out = self.run(&self.cfg.pdf.pdfinfo_exe, &[input.as_os_str().to_owned()])?;
        parse_pdfinfo(&String::from_utf8_lossy(&out.stdout))
    }

    fn render_pages(&self, input: &Path, out_dir: &Path) -> Result<Vec<PageImage>> {
        let prefix = out_dir.join(PAGE_PREFIX);
        let args: Vec<OsString> = vec![
            "-jpeg".into(),
            "-jpegopt".into(),
            format!("quality={}", self.cfg.pdf.jpeg_quality).into(),
            "-r".into(),
            self.cfg.pdf.dpi.to_string().into(),
            input.as_os_str().to_owned(),
            prefix.as_os_str().to_owned(),
        ];
        self.run(&self.cfg.pdf.pdftoppm_exe, &args)?;

        let files = rendered_pages(out_dir)?;
        if files.is_empty() {
            return Err(anyhow!("pdftoppm produced no pages for {}", input.display()));
        }

        files
            .into_iter()
            .enumerate()
            .map(|(index, path)| {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("reading page image: {}", path.display()))?;
                Ok(PageImage {
                    index,
                    mime_type: "image/jpeg".to_string(),
                    bytes,
                })
            })
            .collect()
    }

    fn extract_text(&self, input: &Path) -> Result<Vec<String>> {
        let args: Vec<OsString> = vec![
            "-enc".into(),
            "UTF-8".into(),
            input.as_os_str().to_owned(),
            "-".into(),
        ];
        let out = self.run(&self.cfg.pdf.pdftotext_exe, &args)?;
        let text = String::from_utf8(out.stdout)
            .with_context(|| format!("pdftotext output is not UTF-8: {}", input.display()))?;
        Ok(split_pages(&text))
    }
}

fn parse_pdfinfo(raw: &str) -> Result<PdfInfo> {
    let mut page_count = None;
    let mut title = None;
    for line in raw.lines() {
        if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "Pages" => page_count = value.trim().parse::<u32>().ok(),
                "Title" if !value.trim().is_empty() => title = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    let page_count = page_count.ok_or_else(|| anyhow!("pdfinfo output has no page count"))?;
    Ok(PdfInfo { page_count, title })
}

/// pdftotext separates pages with form feeds and ends the last one with one too.
fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\u{000C}').map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Page images written by pdftoppm, ordered by page number. pdftoppm pads
/// numbers to the width of the page count, so names alone do not sort.
fn rendered_pages(out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut numbered = Vec::new();
    for entry in std::fs::read_dir(out_dir)
        .with_context(|| format!("listing {}", out_dir.display()))?
    {
        let path = entry?.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg"));
        if !is_jpeg {
            continue;
        }
        if let Some(num) = stem
            .strip_prefix(PAGE_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|n| n.parse::<u32>().ok())
        {
            numbered.push((num, path));
        }
    }
    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("pdf tool timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Err(anyhow!(
                "pdf tool exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
