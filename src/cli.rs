use crate::{
    config::Config,
    engine::{poppler::PopplerEngine, Engine},
    indexer::Indexer,
    pipeline::{self, open_store, validate_input, DocumentPaths},
    probe,
    render::{ConsolePresenter, HtmlPresenter, Presenter},
    retrieval::RetrievalTool,
    sections::SectionPlan,
    splitter::RecursiveSplitter,
    util::{ensure_dir, hash_file, now, rfc3339, sha256_hex},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "exam-grader")]
#[command(about = "Grades scanned exam answer sheets against a marking scheme with a tool-using vision model")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./exam-grader.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the poppler tools are installed.
    Doctor {},
    /// Load the marking scheme into the vector store.
    Index {
        /// Marking scheme PDF; defaults to paths.marking_scheme.
        #[arg(long)]
        scheme: Option<PathBuf>,
    },
    /// Print the marking-scheme chunks a query would retrieve.
    Retrieve {
        #[arg(long)]
        query: String,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Show how the exam pages map onto grading sections.
    Sections {
        #[arg(long)]
        input: PathBuf,
    },
    /// Grade an exam answer sheet.
    Grade {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        scheme: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Write an HTML page instead of the console report.
        #[arg(long)]
        html: bool,
        /// Grade the first section twice and compare question counts.
        #[arg(long)]
        check_consistency: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;

    match &args.cmd {
        Command::Doctor {} => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            doctor(&cfg)
        }
        Command::Index { scheme } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            index(&cfg, &scheme_path(&cfg, scheme.as_deref()))
        }
        Command::Retrieve { query, k } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            retrieve(&cfg, query, k.unwrap_or(cfg.retrieval.top_k))
        }
        Command::Sections { input } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            sections(&cfg, input)
        }
        Command::Grade {
            input,
            scheme,
            out_dir,
            html,
            check_consistency,
        } => {
            let mut cfg = cfg.clone();
            if *check_consistency {
                cfg.grading.consistency_check = true;
            }
            if *html {
                cfg.output.write_html_report = true;
            }
            let docs = DocumentPaths {
                marking_scheme: scheme_path(&cfg, scheme.as_deref()),
                exam: input.clone(),
            };
            grade(&args, &cfg, &docs, out_dir.as_deref())
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("exam-grader.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("exam-grader.example.toml"))
    }
}

fn scheme_path(cfg: &Config, user: Option<&Path>) -> PathBuf {
    user.map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.marking_scheme))
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = PopplerEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn index(cfg: &Config, scheme: &Path) -> Result<()> {
    let engine = PopplerEngine::new(cfg)?;
    let splitter = RecursiveSplitter::from_config(&cfg.splitter)?;
    let mut store = open_store(cfg)?;
    let outcome = Indexer::new(&engine, &splitter).index(&mut store, scheme)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "scheme": scheme,
            "store": store.path(),
            "outcome": outcome,
        }))?
    );
    Ok(())
}

fn retrieve(cfg: &Config, query: &str, k: usize) -> Result<()> {
    let store = open_store(cfg)?;
    if store.count() == 0 {
        return Err(anyhow!(
            "collection '{}' is empty; run `exam-grader index` first",
            store.collection()
        ));
    }
    println!("{}", RetrievalTool::new(&store, k).retrieve(query)?);
    Ok(())
}

fn sections(cfg: &Config, input: &Path) -> Result<()> {
    validate_input(cfg, input)?;
    let engine = PopplerEngine::new(cfg)?;
    let probe = probe::probe_pdf(cfg, &engine, input)?;
    let plan = SectionPlan::from_page_count(cfg, probe.page_count as usize);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "probe": probe,
            "plan": plan,
        }))?
    );
    Ok(())
}

fn grade(args: &Args, cfg: &Config, docs: &DocumentPaths, out_override: Option<&Path>) -> Result<()> {
    validate_input(cfg, &docs.exam)?;

    let cfg_norm = cfg.normalized_for_hash();
    let cfg_hash = sha256_hex(cfg_norm.as_bytes());
    let input_hash = hash_file(&docs.exam)
        .with_context(|| format!("hashing input: {}", docs.exam.display()))?;
    let run_id = sha256_hex(format!("{}:{}", cfg_hash, input_hash).as_bytes());

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let run_dir = out_root.join(&run_id);
    ensure_dir(&run_dir)?;
    ensure_dir(&run_dir.join("logs"))?;

    let log_path = resolve_log_path(cfg, Some(&run_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("run_id={run_id} out={}", run_dir.display());

    if cfg.output.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(run_dir.join("effective-config.toml"), raw)?;
    }

    ensure_dir(Path::new(&cfg.paths.work_dir))?;

    let mut presenter: Box<dyn Presenter> = if cfg.output.write_html_report {
        Box::new(HtmlPresenter::new(cfg, run_dir.clone()))
    } else {
        Box::new(ConsolePresenter::new(cfg, run_dir.clone()))
    };

    let started = rfc3339(now());
    let report = pipeline::run_report(docs, cfg, presenter.as_mut())?;
    let files = presenter.present(&report)?;

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "run_id": run_id,
                "run_dir": run_dir,
                "started": started,
                "finished": rfc3339(now()),
                "total_obtained": report.total_obtained,
                "total_possible": report.total_possible,
                "percentage": report.percentage,
                "grade": report.grade,
                "files": files,
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

fn resolve_log_path(cfg: &Config, run_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(run_dir) = run_dir {
        return Some(run_dir.join("logs").join("exam-grader.log"));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("exam-grader.log"))
}
