//! Formatting search results for readers.

use super::ContextChunk;
use crate::vector_store::SearchResult;

/// Convert search results into display chunks, keeping their order.
pub fn from_results(results: Vec<SearchResult>) -> Vec<ContextChunk> {
    results.into_iter().map(ContextChunk::from).collect()
}

/// One line per distinct source, in first-seen order.
pub fn format_sources(chunks: &[ContextChunk]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for chunk in chunks {
        if !seen.contains(&chunk.source.as_str()) {
            seen.push(&chunk.source);
        }
    }
    seen.iter()
        .map(|source| format!("- {}", source))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::Record;

    fn result(record: Record, score: f32, row: usize) -> SearchResult {
        SearchResult { record, score, row }
    }

    #[test]
    fn test_chunks_carry_provenance_and_display_text() {
        let chunks = from_results(vec![
            result(
                Record::new("page text").with_source("guide.pdf").with_page(4),
                0.91,
                3,
            ),
            result(
                Record::new("spoken words")
                    .with_source("talk.mp4")
                    .with_time_span(5.0, 12.0),
                0.5,
                0,
            ),
        ]);

        assert_eq!(chunks[0].source, "guide.pdf (page 4)");
        assert_eq!(chunks[0].content, "page text");
        assert_eq!(chunks[0].row, 3);
        assert_eq!(chunks[1].source, "talk.mp4 (timestamp 5.0s–12.0s)");
        assert_eq!(chunks[1].score, 0.5);
    }

    #[test]
    fn test_sources_deduplicated() {
        let chunks = from_results(vec![
            result(Record::new("a").with_source("x.pdf").with_page(1), 0.9, 0),
            result(Record::new("b").with_source("y.pdf"), 0.8, 1),
            result(Record::new("c").with_source("x.pdf").with_page(1), 0.7, 2),
        ]);

        assert_eq!(format_sources(&chunks), "- x.pdf (page 1)\n- y.pdf");
    }
}
