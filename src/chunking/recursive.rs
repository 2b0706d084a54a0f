//! Separator-hierarchy splitter with exact character overlap.

use super::{ChunkingConfig, Segment};

/// Splits `text` into segments of at most `config.max_length` characters,
/// preferring breaks at paragraph, line, sentence, then word boundaries
/// before falling back to a hard cut. Every segment after the first starts
/// with exactly `config.overlap` characters of its predecessor's tail, so
/// concatenating the segments minus their overlap prefixes reconstructs the
/// document.
///
/// A document no longer than `max_length` yields a single segment; empty
/// text yields none. Assumes `overlap < max_length`; run
/// [`ChunkingConfig::validate`] first.
pub fn chunk_recursive(text: &str, config: &ChunkingConfig) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n == 0 {
        return Vec::new();
    }
    if n <= config.max_length {
        return vec![Segment::new(0, 0, text)];
    }

    // Byte offset of every character boundary, end of text included.
    let mut byte_at: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    byte_at.push(text.len());

    // Core spans partition the character range; the overlap prefix is added
    // when the segments are materialized.
    let mut cores: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize;
    while start < n {
        let budget = if cores.is_empty() {
            config.max_length
        } else {
            config.max_length - config.overlap
        };
        let end = if n - start <= budget {
            n
        } else {
            break_point(&chars, start, start + budget)
        };
        cores.push((start, end));
        start = end;
    }

    cores
        .iter()
        .enumerate()
        .map(|(i, &(core_start, end))| {
            let content_start = if i == 0 {
                core_start
            } else {
                core_start.saturating_sub(config.overlap)
            };
            let offset = byte_at[content_start];
            Segment::new(i, offset, &text[offset..byte_at[end]])
        })
        .collect()
}

/// Best break position in `(start, limit]`, searched by separator priority:
/// paragraph break, line break, sentence end, whitespace, hard cut. The
/// separator stays with the leading piece so spans stay contiguous.
fn break_point(chars: &[char], start: usize, limit: usize) -> usize {
    for j in (start..limit.saturating_sub(1)).rev() {
        if chars[j] == '\n' && chars[j + 1] == '\n' {
            return j + 2;
        }
    }
    for j in (start..limit).rev() {
        if chars[j] == '\n' {
            return j + 1;
        }
    }
    for j in (start..limit.saturating_sub(1)).rev() {
        if matches!(chars[j], '.' | '!' | '?') && chars[j + 1].is_whitespace() {
            return j + 2;
        }
    }
    for j in (start..limit).rev() {
        if chars[j].is_whitespace() {
            return j + 1;
        }
    }
    limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingStrategy;

    fn config(max_length: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            strategy: ChunkingStrategy::Recursive,
            max_length,
            overlap,
            ..ChunkingConfig::default()
        }
    }

    #[test]
    fn short_document_yields_single_segment() {
        let text = "A short note that fits in one segment.";
        let segments = chunk_recursive(text, &config(500, 20));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].content, text);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[0].offset, 0);
    }

    #[test]
    fn empty_document_yields_no_segments() {
        assert!(chunk_recursive("", &config(100, 10)).is_empty());
    }

    #[test]
    fn three_paragraphs_split_at_paragraph_breaks() {
        let paragraphs: Vec<String> = (1..=3)
            .map(|i| format!("Paragraph {i} covers topic {i} in a steady and unhurried voice."))
            .collect();
        let text = paragraphs.join("\n\n");
        assert!(text.len() > 100, "document must force a split");

        let cfg = config(100, 10);
        let segments = chunk_recursive(&text, &cfg);
        assert_eq!(segments.len(), 3);

        // Concatenation minus the overlap prefixes reconstructs the text.
        let mut rebuilt = segments[0].content.clone();
        for segment in &segments[1..] {
            rebuilt.push_str(&segment.content[cfg.overlap..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn consecutive_segments_share_exactly_overlap_characters() {
        let text = "one two three four five six seven eight nine ten eleven twelve \
                    thirteen fourteen fifteen sixteen seventeen eighteen nineteen twenty";
        let cfg = config(40, 8);
        let segments = chunk_recursive(text, &cfg);
        assert!(segments.len() > 1);

        for pair in segments.windows(2) {
            let tail: String = pair[0]
                .content
                .chars()
                .skip(pair[0].content.chars().count() - cfg.overlap)
                .collect();
            let head: String = pair[1].content.chars().take(cfg.overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn segments_respect_max_length() {
        let text = "word ".repeat(200);
        let cfg = config(37, 5);
        for segment in chunk_recursive(text.trim_end(), &cfg) {
            assert!(segment.len() <= cfg.max_length);
        }
    }

    #[test]
    fn hard_cut_when_no_separator_exists() {
        let text = "x".repeat(95);
        let segments = chunk_recursive(&text, &config(40, 4));
        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.len() <= 40);
        }
    }

    #[test]
    fn multibyte_text_splits_on_character_boundaries() {
        let text = "Träume ändern sich. ".repeat(20);
        let segments = chunk_recursive(text.trim_end(), &config(50, 5));
        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.len() <= 50);
        }
    }
}
