use crate::{
    config::Config,
    embedding,
    engine::{poppler::PopplerEngine, Engine, PageImage},
    indexer::Indexer,
    postprocess::combine_sections,
    probe,
    provider::{OpenAiProvider, Provider, ProviderConfig},
    render::Presenter,
    report::{aggregate, ConsistencyCheck, Report},
    retrieval::{RetrievalTool, Toolbox},
    scoring::extract_scores,
    sections::SectionPlan,
    session::SessionRunner,
    splitter::RecursiveSplitter,
    store::VectorStore,
    util::{ensure_dir, hash_file, now},
};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// The two inputs of a grading run.
#[derive(Debug, Clone)]
pub struct DocumentPaths {
    pub marking_scheme: PathBuf,
    pub exam: PathBuf,
}

pub struct Pipeline<E: Engine, P: Provider> {
    cfg: Config,
    engine: E,
    provider: P,
}

impl<E: Engine, P: Provider> Pipeline<E, P> {
    pub fn new(cfg: &Config, engine: E, provider: P) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
            provider,
        }
    }

    /// Grade the exam section by section against the indexed marking scheme.
    ///
    /// Progress goes to `presenter`; rendering the finished report is left to
    /// the caller.
    pub fn run_report(
        &self,
        docs: &DocumentPaths,
        store: &mut VectorStore,
        presenter: &mut dyn Presenter,
    ) -> Result<Report> {
        let started = Instant::now();

        validate_input(&self.cfg, &docs.exam)?;
        let probe_res = probe::probe_pdf(&self.cfg, &self.engine, &docs.exam)?;
        info!(
            "probe page_count={} file_bytes={}",
            probe_res.page_count, probe_res.file_bytes
        );

        presenter.progress(0, "Loading marking scheme...");
        let splitter = RecursiveSplitter::from_config(&self.cfg.splitter)?;
        let outcome = Indexer::new(&self.engine, &splitter).index(store, &docs.marking_scheme)?;
        debug!(?outcome, "marking scheme index");

        presenter.progress(0, "Converting PDF to images...");
        let pages = self.load_pages(&docs.exam)?;
        presenter.progress(10, "Converting PDF to images...");
        presenter.progress(20, &format!("Processing {} pages...", pages.len()));

        let plan = SectionPlan::from_page_count(&self.cfg, pages.len());
        debug!(?plan, "section plan");
        if plan.sections.is_empty() {
            return Err(anyhow!("no grading sections configured"));
        }

        let toolbox = Toolbox::new().with(RetrievalTool::new(store, self.cfg.retrieval.top_k));
        let runner = SessionRunner::new(
            &self.provider,
            &toolbox,
            &self.cfg.grading.persona,
            self.cfg.grading.max_tool_iterations,
        );

        let total = plan.sections.len();
        let mut results = Vec::with_capacity(total);
        for (i, section) in plan.sections.iter().enumerate() {
            presenter.progress(section_progress(i, total), &format!("Grading {}...", section.name));
            info!(
                "section {} pages {}..{}",
                section.name, section.start_page, section.end_page
            );
            results.push(runner.run_section(section, &pages)?);
            presenter.progress(section_progress(i + 1, total), &format!("Graded {}", section.name));
        }

        presenter.progress(80, "Calculating final scores...");
        let combined = combine_sections(&results);
        let scores = extract_scores(&combined);
        if scores.is_empty() {
            warn!("no 'Question N: a/b' lines found in the model output");
        }

        let consistency = if self.cfg.grading.consistency_check {
            let first = &plan.sections[0];
            presenter.progress(80, &format!("Re-grading {} for consistency...", first.name));
            let rerun = runner.run_section(first, &pages)?;
            let check = ConsistencyCheck::compare(
                &first.name,
                &extract_scores(&results[0].content),
                &extract_scores(&rerun.content),
            );
            info!("consistency {}", check.summary());
            Some(check)
        } else {
            None
        };

        let mut report = aggregate(results, scores, now());
        report.consistency = consistency;

        info!(
            "graded {} questions: {:.1}/{:.1} ({:.2}%) grade {} in {:?}",
            report.questions_graded(),
            report.total_obtained,
            report.total_possible,
            report.percentage,
            report.grade,
            started.elapsed()
        );
        presenter.progress(100, "Grading complete!");
        Ok(report)
    }

    /// Rasterize the exam into a scratch directory and read the pages back.
    fn load_pages(&self, exam: &Path) -> Result<Vec<PageImage>> {
        let digest = hash_file(exam)?;
        let work_dir = Path::new(&self.cfg.paths.work_dir).join(&digest[..16]);
        ensure_dir(&work_dir)?;

        let pages = self
            .engine
            .render_pages(exam, &work_dir)
            .with_context(|| format!("rasterizing exam: {}", exam.display()));

        if !self.cfg.global.keep_intermediates {
            if let Err(e) = std::fs::remove_dir_all(&work_dir) {
                warn!("could not remove {}: {e}", work_dir.display());
            }
        }
        pages
    }
}

/// 20% once pages are loaded, then an equal share of 60% per section.
fn section_progress(done: usize, total: usize) -> u8 {
    (20 + (done * 60) / total.max(1)) as u8
}

/// Grade `docs` with the configured poppler tools, model endpoint, and vector
/// store.
pub fn run_report(
    docs: &DocumentPaths,
    cfg: &Config,
    presenter: &mut dyn Presenter,
) -> Result<Report> {
    let engine = PopplerEngine::new(cfg)?;
    let provider = OpenAiProvider::new(ProviderConfig::from_model(&cfg.model)?)?;
    let mut store = open_store(cfg)?;
    Pipeline::new(cfg, engine, provider).run_report(docs, &mut store, presenter)
}

pub fn open_store(cfg: &Config) -> Result<VectorStore> {
    let embedder = embedding::from_config(cfg)?;
    Ok(VectorStore::open(
        Path::new(&cfg.paths.vector_store_dir),
        &cfg.index.collection,
        embedder,
    )?
    .with_batch_size(cfg.index.batch_size))
}

pub fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if let Some(ext) = input.extension().and_then(|s| s.to_str()) {
        if !ext.eq_ignore_ascii_case("pdf") {
            return Err(anyhow!("input is not a PDF: {}", input.display()));
        }
    } else {
        warn!("input has no extension; assuming PDF: {}", input.display());
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
