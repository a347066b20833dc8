use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A contiguous run of exam pages graded under one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub description: String,
    pub start_page: usize, // 0-based inclusive
    pub end_page: usize,   // 0-based exclusive
}

impl Section {
    pub fn page_range(&self) -> Range<usize> {
        self.start_page..self.end_page
    }

    pub fn is_empty(&self) -> bool {
        self.start_page >= self.end_page
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPlan {
    pub page_count: usize,
    pub sections: Vec<Section>,
}

impl SectionPlan {
    /// Lay the configured sections over a document of `page_count` pages.
    ///
    /// Each section takes the next `pages` pages (0 = the rest), clamped to
    /// the document. Sections past the last page, or after one that took the
    /// rest, get an empty range.
    pub fn from_page_count(cfg: &Config, page_count: usize) -> SectionPlan {
        let mut sections = Vec::with_capacity(cfg.grading.sections.len());
        let mut next = 0usize;

        for spec in &cfg.grading.sections {
            let start = next.min(page_count);
            let end = if spec.pages == 0 {
                page_count
            } else {
                next.saturating_add(spec.pages).min(page_count)
            };
            sections.push(Section {
                name: spec.name.clone(),
                description: spec.description.clone(),
                start_page: start,
                end_page: end.max(start),
            });
            next = if spec.pages == 0 {
                page_count.max(next)
            } else {
                next.saturating_add(spec.pages)
            };
        }

        SectionPlan {
            page_count,
            sections,
        }
    }
}
