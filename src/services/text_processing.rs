//! Turning uploaded files into text and splitting text into overlapping chunks

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::models::DocumentKind;

/// Tried in order; the empty separator splits between characters
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Recursive character splitter.
///
/// Text is split on the coarsest separator present, pieces that are still too
/// long are split again with the finer separators, and the pieces are merged
/// back into chunks of at most `chunk_size` characters that share up to
/// `chunk_overlap` characters with their predecessor.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(**s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let finer = &separators[(idx + 1).min(separators.len())..];

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut short = Vec::new();

        for piece in pieces {
            if piece.chars().count() < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge(&short, separator));
                short.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !short.is_empty() {
            chunks.extend(self.merge(&short, separator));
        }

        chunks
    }

    /// Join pieces with `separator` into chunks, carrying an overlap window
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = separator.chars().count();
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = piece.chars().count();
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                chunks.push(join(&window, separator));

                while let Some((_, first_len)) = window.front().copied() {
                    if total <= self.chunk_overlap && total + len + sep_len <= self.chunk_size {
                        break;
                    }
                    window.pop_front();
                    total -= first_len;
                    if !window.is_empty() {
                        total -= sep_len;
                    }
                }
            }

            if !window.is_empty() {
                total += sep_len;
            }
            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            chunks.push(join(&window, separator));
        }

        chunks
    }
}

fn join(window: &VecDeque<(&str, usize)>, separator: &str) -> String {
    window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Read a stored upload as text.
///
/// PDF parsing runs on a blocking thread and a panic inside the parser is
/// reported as an error.
pub async fn extract_text(path: &Path, kind: DocumentKind) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    match kind {
        DocumentKind::PlainText => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        DocumentKind::Pdf => {
            let display = path.display().to_string();
            tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                .await
                .context("PDF extraction task failed")?
                .with_context(|| format!("failed to extract text from {}", display))
        }
    }
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    })) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(anyhow!("PDF extraction failed: {}", e)),
        Err(_) => {
            tracing::error!("PDF extraction panicked, likely a malformed font");
            Err(anyhow!("PDF extraction panicked"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within(chunks: &[String], size: usize) {
        for chunk in chunks {
            assert!(
                chunk.chars().count() <= size,
                "chunk of {} chars exceeds {}",
                chunk.chars().count(),
                size
            );
        }
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = TextSplitter::new(100, 20);
        assert_eq!(splitter.split("Revenue grew 12%."), vec!["Revenue grew 12%."]);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        let splitter = TextSplitter::new(100, 20);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split(" \n\n \n").is_empty());
    }

    #[test]
    fn test_paragraphs_are_kept_together() {
        let splitter = TextSplitter::new(30, 0);
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = splitter.split(text);
        assert_eq!(
            chunks,
            vec!["First paragraph here.", "Second paragraph here.", "Third one."]
        );
    }

    #[test]
    fn test_word_overlap_between_chunks() {
        let splitter = TextSplitter::new(20, 10);
        let chunks = splitter.split("alpha beta gamma delta epsilon zeta eta theta");
        assert_within(&chunks, 20);
        assert!(chunks.len() > 1);
        // Consecutive chunks share at least one word
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].contains(last_word), "{:?}", pair);
        }
    }

    #[test]
    fn test_long_token_is_hard_split() {
        let splitter = TextSplitter::new(10, 2);
        let chunks = splitter.split(&"x".repeat(35));
        assert_within(&chunks, 10);
        assert_eq!(chunks[0].len(), 10);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(total >= 35);
    }

    #[test]
    fn test_multibyte_text_respects_char_budget() {
        let splitter = TextSplitter::new(8, 2);
        let chunks = splitter.split("매출 증가 영업 이익 개선 비용 절감 목표 달성");
        assert_within(&chunks, 8);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_realistic_document_never_exceeds_chunk_size() {
        let paragraph = "Q3 revenue reached $4.2M, up 12% on the prior quarter. \
            Operating margin held at 18% while headcount grew by 40.\n";
        let text = paragraph.repeat(60);
        let splitter = TextSplitter::new(2000, 400);
        let chunks = splitter.split(&text);
        assert_within(&chunks, 2000);
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let splitter = TextSplitter::new(5, 50);
        assert_eq!(splitter.chunk_overlap, 4);
        let chunks = splitter.split("a b c d e f g h");
        assert_within(&chunks, 5);
    }

    #[tokio::test]
    async fn test_extract_text_reads_plain_text_lossily() {
        let path = std::env::temp_dir().join(format!("eb_text_{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"Revenue \xff grew").await.unwrap();
        let text = extract_text(&path, DocumentKind::PlainText).await.unwrap();
        assert!(text.starts_with("Revenue "));
        assert!(text.ends_with(" grew"));
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_extract_text_rejects_invalid_pdf() {
        let path = std::env::temp_dir().join(format!("eb_bad_{}.pdf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"not a pdf").await.unwrap();
        assert!(extract_text(&path, DocumentKind::Pdf).await.is_err());
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_extract_text_missing_file() {
        let path = Path::new("/nonexistent/enterprise_brain/missing.txt");
        assert!(extract_text(path, DocumentKind::PlainText).await.is_err());
    }
}
