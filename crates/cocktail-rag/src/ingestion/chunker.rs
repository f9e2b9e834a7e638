//! Text chunking on line boundaries, with row batching for tables
//!
//! Sizes are budgeted in estimated tokens, where one token is four
//! characters. Prose is split on line boundaries; tables are batched a few
//! rows at a time so every chunk repeats the header.

use crate::config::ChunkingConfig;
use crate::types::{Chunk, RemoteDocument};

use super::extractor::{ExtractedText, TableText};

/// Characters per estimated token
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimated token count of `text`
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Line-boundary chunker with a min/max token post-filter
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_tokens: usize,
    min_tokens: usize,
    hard_max_tokens: usize,
    table_rows_per_chunk: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            min_tokens: config.min_tokens,
            hard_max_tokens: config.hard_max_tokens,
            table_rows_per_chunk: config.table_rows_per_chunk.max(1),
        }
    }

    /// Chunk a cleaned document into ordered chunks with stable ids
    pub fn chunk_document(&self, doc: &RemoteDocument, extracted: &ExtractedText) -> Vec<Chunk> {
        let document_id = doc.document_id();

        self.chunk_text(extracted)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                id: Chunk::chunk_id(&document_id, index),
                index,
                token_estimate: estimate_tokens(&text),
                text,
                filename: doc.filename.clone(),
                path: doc.path.clone(),
            })
            .collect()
    }

    /// Pick the strategy for the extracted shape, then drop out-of-bounds chunks
    pub fn chunk_text(&self, extracted: &ExtractedText) -> Vec<String> {
        let raw = match extracted {
            ExtractedText::Prose(text) => self.split_lines(text),
            ExtractedText::Table(table) => self.split_rows(table),
        };

        let total = raw.len();
        let kept: Vec<String> = raw.into_iter().filter(|c| self.keep(c)).collect();
        if kept.len() < total {
            tracing::debug!(
                dropped = total - kept.len(),
                min_tokens = self.min_tokens,
                max_tokens = self.hard_max_tokens,
                "Dropped out-of-bounds chunks"
            );
        }
        kept
    }

    /// Accumulate lines until the next one would overflow the budget.
    ///
    /// A single line longer than the budget becomes its own chunk; the
    /// post-filter decides whether it survives.
    pub fn split_lines(&self, text: &str) -> Vec<String> {
        let budget = self.max_tokens * CHARS_PER_TOKEN;
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;

        for line in text.lines() {
            let line_chars = line.chars().count() + 1;
            if !buffer.is_empty() && buffer_chars + line_chars > budget {
                push_trimmed(&mut chunks, &buffer);
                buffer.clear();
                buffer_chars = 0;
            }
            buffer.push_str(line);
            buffer.push('\n');
            buffer_chars += line_chars;
        }
        push_trimmed(&mut chunks, &buffer);

        chunks
    }

    /// Batch table rows: start with `table_rows_per_chunk` rows and shrink
    /// until the rendered block fits; a row that cannot fit alone is skipped.
    pub fn split_rows(&self, table: &TableText) -> Vec<String> {
        let rows = &table.rows;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < rows.len() {
            let mut take = self.table_rows_per_chunk.min(rows.len() - start);
            loop {
                if take == 0 {
                    tracing::warn!(
                        row = start,
                        max_tokens = self.max_tokens,
                        "Table row exceeds the token budget on its own, skipping"
                    );
                    start += 1;
                    break;
                }
                let block = table.render(start, start + take);
                if estimate_tokens(&block) <= self.max_tokens {
                    chunks.push(block);
                    start += take;
                    break;
                }
                take -= 1;
            }
        }

        chunks
    }

    /// Post-filter: within `[min_tokens, hard_max_tokens]`
    pub fn keep(&self, chunk: &str) -> bool {
        let tokens = estimate_tokens(chunk);
        !chunk.trim().is_empty() && tokens >= self.min_tokens && tokens <= self.hard_max_tokens
    }
}

fn push_trimmed(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::cleaner::clean_text;
    use proptest::prelude::*;

    fn chunker(max_tokens: usize, min_tokens: usize) -> TextChunker {
        TextChunker::new(&ChunkingConfig {
            max_tokens,
            min_tokens,
            hard_max_tokens: 4000,
            table_rows_per_chunk: 10,
        })
    }

    fn table(rows: Vec<String>) -> TableText {
        TableText {
            header: Some("name | spirit | method".to_string()),
            rows,
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefg"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(16_000)), 4000);
    }

    #[test]
    fn test_split_lines_respects_budget() {
        let chunker = chunker(11, 0); // 44 chars
        let text = "Build over cracked ice\nTop with soda water\nGarnish with a lime wedge\nServe";
        let chunks = chunker.split_lines(text);

        assert_eq!(
            chunks,
            vec![
                "Build over cracked ice\nTop with soda water",
                "Garnish with a lime wedge\nServe",
            ]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 44));
    }

    #[test]
    fn test_oversized_line_stands_alone() {
        let chunker = chunker(5, 0);
        let long = "a".repeat(60);
        let chunks = chunker.split_lines(&format!("short\n{}\ntail", long));
        assert_eq!(chunks, vec!["short".to_string(), long, "tail".to_string()]);
    }

    #[test]
    fn test_below_floor_produces_nothing() {
        let chunker = chunker(300, 8);
        let extracted = ExtractedText::Prose(clean_text("  Neat.  \n"));
        assert!(chunker.chunk_text(&extracted).is_empty());
    }

    #[test]
    fn test_hard_ceiling_drops_chunk() {
        let chunker = TextChunker::new(&ChunkingConfig {
            max_tokens: 10,
            min_tokens: 0,
            hard_max_tokens: 20,
            table_rows_per_chunk: 10,
        });
        let text = format!("{}\nkeep this line", "z".repeat(200));
        let chunks = chunker.chunk_text(&ExtractedText::Prose(text));
        assert_eq!(chunks, vec!["keep this line".to_string()]);
    }

    #[test]
    fn test_split_rows_batches_with_header() {
        let chunker = TextChunker::new(&ChunkingConfig {
            max_tokens: 1000,
            min_tokens: 0,
            hard_max_tokens: 4000,
            table_rows_per_chunk: 2,
        });
        let rows = (0..5).map(|i| format!("drink {} | gin | stir", i)).collect();
        let chunks = chunker.split_rows(&table(rows));

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.starts_with("name | spirit | method\n")));
        assert!(chunks[2].ends_with("drink 4 | gin | stir"));
    }

    #[test]
    fn test_split_rows_shrinks_batch() {
        // header (22 chars) + 10 rows of ~40 chars each is ~110 tokens
        let chunker = chunker(30, 0);
        let rows: Vec<String> = (0..10)
            .map(|i| format!("row {:02} | {}", i, "x".repeat(30)))
            .collect();
        let chunks = chunker.split_rows(&table(rows));

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| estimate_tokens(c) <= 30));
        let total_rows: usize = chunks.iter().map(|c| c.lines().count() - 1).sum();
        assert_eq!(total_rows, 10);
    }

    #[test]
    fn test_split_rows_skips_oversized_row() {
        let chunker = chunker(20, 0);
        let rows = vec![
            "ok | rum | shake".to_string(),
            format!("huge | {} | shake", "y".repeat(200)),
            "fine | mezcal | stir".to_string(),
        ];
        let chunks = chunker.split_rows(&table(rows));

        assert!(chunks.iter().all(|c| !c.contains("huge")));
        assert!(chunks.iter().any(|c| c.contains("ok | rum")));
        assert!(chunks.iter().any(|c| c.contains("fine | mezcal")));
    }

    #[test]
    fn test_chunk_document_assigns_ids() {
        let chunker = chunker(11, 0);
        let doc = RemoteDocument::new("pdfs/Bar Manual.pdf");
        let text = "Build over cracked ice\nTop with soda water\nGarnish with a lime wedge";
        let chunks = chunker.chunk_document(&doc, &ExtractedText::Prose(text.to_string()));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "pdfs_Bar~20Manual.pdf_0");
        assert_eq!(chunks[1].id, "pdfs_Bar~20Manual.pdf_1");
        assert_eq!(chunks[1].filename, "Bar Manual.pdf");
    }

    proptest! {
        #[test]
        fn prop_line_chunks_reconstruct_cleaned_text(
            lines in prop::collection::vec("[a-z]{1,12}( [a-z]{1,12}){0,6}", 0..40),
            max_tokens in 1usize..60,
        ) {
            let cleaned = clean_text(&lines.join("\n"));
            let chunks = chunker(max_tokens, 0).split_lines(&cleaned);
            prop_assert_eq!(chunks.join("\n"), cleaned);
        }

        #[test]
        fn prop_multi_line_chunks_fit_budget(
            lines in prop::collection::vec("[a-z]{1,20}", 1..60),
            max_tokens in 5usize..40,
        ) {
            let chunks = chunker(max_tokens, 0).split_lines(&lines.join("\n"));
            for chunk in chunks.iter().filter(|c| c.contains('\n')) {
                prop_assert!(chunk.chars().count() < max_tokens * CHARS_PER_TOKEN);
            }
        }
    }
}
