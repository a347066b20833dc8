use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub pdf: Pdf,
    #[serde(default)]
    pub splitter: Splitter,
    #[serde(default)]
    pub index: Index,
    #[serde(default)]
    pub retrieval: Retrieval,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub grading: Grading,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub exam_name: String,
    pub keep_intermediates: bool,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            exam_name: "Physics".into(),
            keep_intermediates: false,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
    pub marking_scheme: String,
    pub vector_store_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".exam-grader-work".into(),
            marking_scheme: "./example_data/Physics-MS.pdf".into(),
            vector_store_dir: "./memory_vector_database".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub max_input_pages: u32,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 512 * 1024 * 1024,
            max_input_pages: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pdf {
    pub pdfinfo_exe: String,
    pub pdftoppm_exe: String,
    pub pdftotext_exe: String,
    pub dpi: u32,
    pub jpeg_quality: u8,
    pub timeout_seconds: u64,
}
impl Default for Pdf {
    fn default() -> Self {
        Self {
            pdfinfo_exe: "pdfinfo".into(),
            pdftoppm_exe: "pdftoppm".into(),
            pdftotext_exe: "pdftotext".into(),
            dpi: 200,
            jpeg_quality: 90,
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Splitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}
impl Default for Splitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub collection: String,
    /// "http" (OpenAI-compatible embeddings endpoint) or "ngram" (offline).
    pub embedder: String,
    pub embedding_model: String,
    pub ngram_dimensions: usize,
    pub batch_size: usize,
}
impl Default for Index {
    fn default() -> Self {
        Self {
            collection: "exam_sheet_evaluator".into(),
            embedder: "http".into(),
            embedding_model: "gemini-embedding-001".into(),
            ngram_dimensions: 384,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    pub top_k: usize,
}
impl Default for Retrieval {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub seed: u64,
    /// 0 leaves the completion length to the model.
    pub max_tokens: u32,
    /// 0 disables the client-side timeout.
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}
impl Default for Model {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            model: "gemini-2.5-pro".into(),
            temperature: 0.0,
            seed: 42,
            max_tokens: 0,
            request_timeout_seconds: 0,
            max_retries: 2,
            retry_backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grading {
    pub persona: String,
    pub max_tool_iterations: usize,
    pub consistency_check: bool,
    pub sections: Vec<SectionSpec>,
}
impl Default for Grading {
    fn default() -> Self {
        Self {
            persona: crate::prompt::DEFAULT_PERSONA.into(),
            max_tool_iterations: 10,
            consistency_check: false,
            sections: default_sections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    pub name: String,
    pub description: String,
    /// Number of pages this section spans; 0 takes every remaining page.
    pub pages: usize,
}

fn default_sections() -> Vec<SectionSpec> {
    vec![
        SectionSpec {
            name: "Section A - Multiple Choice Questions".into(),
            description: "Grade all MCQ questions (typically Questions 1-16). Each correct answer gets full marks, incorrect gets 0.".into(),
            pages: 10,
        },
        SectionSpec {
            name: "Section B - Short Answer Questions".into(),
            description: "Grade all short answer questions. Apply the grading rubric based on completeness and accuracy.".into(),
            pages: 10,
        },
        SectionSpec {
            name: "Section C - Long Answer Questions".into(),
            description: "Grade all long answer questions. Check for methodology, steps, and final answers.".into(),
            pages: 10,
        },
        SectionSpec {
            name: "Section D - Numerical Problems".into(),
            description: "Grade all numerical problems. Check calculations, units, and final answers.".into(),
            pages: 0,
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_text_report: bool,
    pub write_html_report: bool,
    pub write_report_json: bool,
    pub report_prefix: String,
    pub html_filename: String,
    pub report_json_filename: String,
    pub dump_effective_config: bool,
    pub print_transcript: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_text_report: true,
            write_html_report: false,
            write_report_json: true,
            report_prefix: "grading_report_".into(),
            html_filename: "grading_report.html".into(),
            report_json_filename: "report.json".into(),
            dump_effective_config: false,
            print_transcript: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}
