//! Citation grouping and the "Sources used" block

use crate::providers::WebResult;
use crate::types::{Citation, RetrievedChunk, SourceOrigin};

/// Label used for chunks without a `source` key
pub const UNKNOWN_SOURCE: &str = "unknown source";

/// Group retrieved chunks into one citation per source document.
///
/// Sources appear in first-retrieved order; chunk ordinals are sorted and
/// deduplicated. Labels are unique and the list is capped at `max`.
pub fn build_citations(chunks: &[RetrievedChunk], max: usize) -> Vec<Citation> {
    let mut groups: Vec<(String, Vec<usize>, Option<String>)> = Vec::new();

    for chunk in chunks {
        let source = chunk.source().unwrap_or(UNKNOWN_SOURCE);
        let position = match groups.iter().position(|(s, _, _)| s == source) {
            Some(position) => position,
            None => {
                groups.push((source.to_string(), Vec::new(), None));
                groups.len() - 1
            }
        };

        let group = &mut groups[position];
        if let Some(ordinal) = chunk.chunk_ordinal() {
            group.1.push(ordinal);
        }
        if group.2.is_none() {
            group.2 = chunk.url().map(str::to_string);
        }
    }

    let mut citations: Vec<Citation> = Vec::new();
    for (source, mut ordinals, link) in groups {
        ordinals.sort_unstable();
        ordinals.dedup();

        if citations.len() >= max {
            break;
        }
        let label = format_label(&source, &ordinals);
        if citations.iter().any(|c| c.label == label) {
            continue;
        }
        citations.push(Citation {
            label,
            source,
            chunks: ordinals,
            link,
            snippet: None,
            origin: SourceOrigin::Corpus,
        });
    }

    citations
}

fn format_label(source: &str, ordinals: &[usize]) -> String {
    let list = ordinals
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    match ordinals.len() {
        0 => source.to_string(),
        1 => format!("{} (chunk {})", source, list),
        _ => format!("{} (chunks {})", source, list),
    }
}

/// One citation per web result, numbered like the web context blocks
pub fn web_citations(results: &[WebResult], max: usize) -> Vec<Citation> {
    results
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, r)| {
            let title = if r.title.is_empty() { r.link.clone() } else { r.title.clone() };
            Citation {
                label: format!("[W{}] {}", i + 1, title),
                source: title,
                chunks: Vec::new(),
                link: (!r.link.is_empty()).then(|| r.link.clone()),
                snippet: (!r.snippet.is_empty()).then(|| r.snippet.clone()),
                origin: SourceOrigin::Web,
            }
        })
        .collect()
}

/// Footer appended to an answer; empty without citations
pub fn render_citation_block(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut block = String::from("\n\nSources used:");
    for citation in citations {
        block.push_str("\n- ");
        block.push_str(&citation.label);
        if citation.origin == SourceOrigin::Web {
            if let Some(link) = &citation.link {
                block.push_str(&format!(" ({})", link));
            }
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::retrieved;
    use crate::types::{Metadata, META_LEGACY_CHUNK, META_SOURCE};

    #[test]
    fn test_groups_by_source_in_retrieval_order() {
        let chunks = vec![
            retrieved("Liquid Intelligence.pdf", 7, "a"),
            retrieved("Meehan's.epub", 2, "b"),
            retrieved("Liquid Intelligence.pdf", 3, "c"),
            retrieved("Liquid Intelligence.pdf", 7, "d"),
        ];

        let labels: Vec<String> = build_citations(&chunks, 10)
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(
            labels,
            vec!["Liquid Intelligence.pdf (chunks 3, 7)", "Meehan's.epub (chunk 2)"]
        );
    }

    #[test]
    fn test_cap_and_legacy_key() {
        let mut chunks: Vec<RetrievedChunk> = (0..15)
            .map(|i| retrieved(&format!("doc{}.pdf", i), i, "t"))
            .collect();

        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.to_string(), "legacy.csv".into());
        metadata.insert(META_LEGACY_CHUNK.to_string(), "4".into());
        chunks.insert(0, RetrievedChunk {
            id: "legacy_4".to_string(),
            text: "t".to_string(),
            metadata,
            similarity: 1.0,
        });

        let citations = build_citations(&chunks, 10);
        assert_eq!(citations.len(), 10);
        assert_eq!(citations[0].label, "legacy.csv (chunk 4)");
        assert_eq!(citations[0].chunks, vec![4]);
    }

    #[test]
    fn test_zero_cap_yields_no_citations() {
        let chunks = vec![retrieved("Liquid Intelligence.pdf", 1, "a")];
        assert!(build_citations(&chunks, 0).is_empty());
        assert_eq!(render_citation_block(&build_citations(&chunks, 0)), "");
    }

    #[test]
    fn test_missing_source() {
        let chunk = RetrievedChunk {
            id: "x".to_string(),
            text: "t".to_string(),
            metadata: Metadata::new(),
            similarity: 0.5,
        };
        let citations = build_citations(&[chunk], 10);
        assert_eq!(citations[0].label, UNKNOWN_SOURCE);
    }

    #[test]
    fn test_render_block() {
        let chunks = vec![retrieved("a.pdf", 1, "t")];
        let block = render_citation_block(&build_citations(&chunks, 10));
        assert_eq!(block, "\n\nSources used:\n- a.pdf (chunk 1)");
        assert!(render_citation_block(&[]).is_empty());
    }

    #[test]
    fn test_web_citations() {
        let results = vec![WebResult {
            title: "Clarified punch".to_string(),
            link: "https://a.example".to_string(),
            snippet: "Milk curdles.".to_string(),
        }];
        let citations = web_citations(&results, 10);
        assert_eq!(citations[0].label, "[W1] Clarified punch");
        assert_eq!(citations[0].origin, SourceOrigin::Web);
        assert_eq!(
            render_citation_block(&citations),
            "\n\nSources used:\n- [W1] Clarified punch (https://a.example)"
        );
    }
}
