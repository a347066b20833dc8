use crate::config;
use crate::store::Document;
use anyhow::{bail, Result};
use serde_json::json;
use std::collections::VecDeque;

/// Splits text into windows of at most `chunk_size` characters that overlap
/// by up to `chunk_overlap` characters, preferring paragraph, then line, then
/// word boundaries.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("splitter.chunk_size must be positive");
        }
        if chunk_overlap > chunk_size {
            bail!(
                "splitter.chunk_overlap ({}) is larger than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: ["\n\n", "\n", " ", ""].map(String::from).to_vec(),
        })
    }

    pub fn from_config(cfg: &config::Splitter) -> Result<Self> {
        Self::new(cfg.chunk_size, cfg.chunk_overlap)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split each document, copying its metadata onto every window and
    /// adding `start_index`, the window's character offset in the source.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Document> {
        let mut out = Vec::new();
        for doc in docs {
            let mut index = 0usize;
            let mut previous_len = 0usize;
            for chunk in self.split_text(&doc.text) {
                let offset = (index + previous_len).saturating_sub(self.chunk_overlap);
                index = find_chars(&doc.text, &chunk, offset)
                    .or_else(|| find_chars(&doc.text, &chunk, 0))
                    .unwrap_or(offset);
                previous_len = char_len(&chunk);

                let mut metadata = doc.metadata.clone();
                metadata.insert("start_index".into(), json!(index));
                out.push(Document {
                    text: chunk,
                    metadata,
                });
            }
        }
        out
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() {
                break;
            }
            if text.contains(s.as_str()) {
                separator = s;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut final_chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for piece in split_keep_start(text, separator) {
            if char_len(&piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }
            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }
        final_chunks
    }

    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join_trimmed(&current) {
                    docs.push(doc);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_trimmed(&current) {
            docs.push(doc);
        }
        docs
    }
}

/// Split on `separator`, keeping it attached to the start of the following
/// piece. An empty separator splits into characters.
fn split_keep_start(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = pieces.next() {
        if !first.is_empty() {
            out.push(first.to_string());
        }
    }
    for piece in pieces {
        out.push(format!("{}{}", separator, piece));
    }
    out
}

fn join_trimmed(parts: &VecDeque<&str>) -> Option<String> {
    let joined: String = parts.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Character offset of `needle` in `haystack`, searching from character `from`.
fn find_chars(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let start = haystack
        .char_indices()
        .nth(from)
        .map(|(b, _)| b)
        .unwrap_or(haystack.len());
    let found = haystack[start..].find(needle)?;
    Some(from + haystack[start..start + found].chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_separator_on_following_piece() {
        assert_eq!(
            split_keep_start("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keep_start("\n\nb", "\n\n"), vec!["\n\nb"]);
    }

    #[test]
    fn finds_offsets_in_characters() {
        let text = "ééé abc abc";
        assert_eq!(find_chars(text, "abc", 0), Some(4));
        assert_eq!(find_chars(text, "abc", 5), Some(8));
        assert_eq!(find_chars(text, "zzz", 0), None);
    }
}
