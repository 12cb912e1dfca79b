use crate::models::TextChunk;

const PAGE_MARKER_PREFIX: &str = "--- Page ";

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Soft word limit per chunk, only checked at line boundaries.
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1_000 }
    }
}

impl From<&crate::models::IngestionOptions> for ChunkingConfig {
    fn from(value: &crate::models::IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// The text without its page marker lines.
pub fn strip_page_markers(text: &str) -> String {
    text.split('\n')
        .filter(|line| !line.starts_with(PAGE_MARKER_PREFIX))
        .collect::<Vec<_>>()
        .join("\n")
}

enum Line<'a> {
    /// `Some(n)` for a well-formed marker, `None` when the number is unreadable.
    Marker(Option<u32>),
    Text(&'a str),
}

fn classify_line(line: &str) -> Line<'_> {
    match line.strip_prefix(PAGE_MARKER_PREFIX) {
        Some(rest) => Line::Marker(
            rest.split(' ')
                .next()
                .and_then(|number| number.parse::<u32>().ok()),
        ),
        None => Line::Text(line),
    }
}

struct Accumulator {
    words: Vec<String>,
    chunks: Vec<TextChunk>,
}

impl Accumulator {
    fn flush(&mut self, page_number: u32) {
        if self.words.is_empty() {
            return;
        }
        self.chunks.push(TextChunk {
            text: self.words.join(" "),
            page_number,
        });
        self.words.clear();
    }
}

/// Splits page-marked text into page-attributed chunks of roughly `chunk_size` words.
///
/// A page marker always closes the running chunk. Lines are never split, so a
/// chunk can exceed the limit when a single line does.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<TextChunk> {
    let mut acc = Accumulator {
        words: Vec::new(),
        chunks: Vec::new(),
    };
    let mut current_page = 1u32;

    for line in text.split('\n') {
        match classify_line(line) {
            Line::Marker(page) => {
                acc.flush(current_page);
                current_page = page.unwrap_or_else(|| current_page.saturating_add(1));
            }
            Line::Text(line) => {
                let words = line.split_whitespace().map(str::to_string).collect::<Vec<_>>();
                if acc.words.len() + words.len() > config.chunk_size && !acc.words.is_empty() {
                    acc.flush(current_page);
                }
                acc.words.extend(words);
            }
        }
    }

    acc.flush(current_page);
    acc.chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, chunk_size: usize) -> Vec<TextChunk> {
        chunk_text(text, ChunkingConfig { chunk_size })
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk("", 100).is_empty());
        assert!(chunk("--- Page 1 ---\n\n", 100).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk("Это простой текст для тестирования разбивки на чанки", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, 1);
    }

    #[test]
    fn markers_flush_and_switch_page() {
        let text = "--- Page 1 ---\nfirst page words\n\n--- Page 2 ---\nsecond\n--- Page 4 ---\nfourth\n";
        let chunks = chunk(text, 1_000);

        assert_eq!(
            chunks,
            vec![
                TextChunk {
                    text: "first page words".to_string(),
                    page_number: 1
                },
                TextChunk {
                    text: "second".to_string(),
                    page_number: 2
                },
                TextChunk {
                    text: "fourth".to_string(),
                    page_number: 4
                },
            ]
        );
    }

    #[test]
    fn size_limit_is_checked_at_line_boundaries() {
        let text = "one two three\nfour five\nsix seven eight nine ten eleven";
        let chunks = chunk(text, 5);

        let texts = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec!["one two three four five", "six seven eight nine ten eleven"]
        );
    }

    #[test]
    fn markers_are_stripped() {
        assert_eq!(
            strip_page_markers("--- Page 1 ---\nbody\n--- Page 2 ---\nmore"),
            "body\nmore"
        );
    }

    #[test]
    fn unreadable_marker_number_advances_page() {
        let chunks = chunk("--- Page 3 ---\na\n--- Page x ---\nb", 10);
        assert_eq!(chunks[0].page_number, 3);
        assert_eq!(chunks[1].page_number, 4);
    }

    #[test]
    fn chunks_reconstruct_text_with_nondecreasing_pages() {
        let text = "--- Page 1 ---\nalpha beta\ngamma delta epsilon\n\n--- Page 2 ---\nzeta eta\ntheta\n\n--- Page 3 ---\n\n--- Page 5 ---\niota kappa lambda mu\n";
        for size in [1, 2, 3, 5, 100] {
            let chunks = chunk(text, size);

            let rebuilt = chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let expected = text
                .lines()
                .filter(|line| !line.starts_with(PAGE_MARKER_PREFIX))
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ");
            assert_eq!(rebuilt, expected);

            assert!(chunks
                .windows(2)
                .all(|pair| pair[0].page_number <= pair[1].page_number));
        }
    }
}
