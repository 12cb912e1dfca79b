use crate::models::{fold_case, ChunkQuery, SearchHit};
use crate::traits::DocumentStore;
use crate::StoreError;
use tracing::debug;

pub const DEFAULT_CONTEXT_CHARS: usize = 50;
/// Preview length used when the query cannot be located inside a chunk.
pub const FALLBACK_PREVIEW_CHARS: usize = 200;
pub const HIGHLIGHT_OPEN: &str = r#"<span class="search-highlight">"#;
pub const HIGHLIGHT_CLOSE: &str = "</span>";

const SENTENCE_TERMINATOR: char = '.';

pub struct SearchEngine<S> {
    store: S,
    context_chars: usize,
}

impl<S> SearchEngine<S>
where
    S: DocumentStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }

    pub fn with_context_chars(mut self, context_chars: usize) -> Self {
        self.context_chars = context_chars;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Case-insensitive substring search over every stored chunk, or only the
    /// chunks of `scope`. Hits come grouped by document display name, in page order.
    pub async fn search(
        &self,
        query: &str,
        scope: Option<&str>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let chunk_query = ChunkQuery::new(query).scoped(scope.map(str::to_string));
        let matches = self.store.search_chunks(&chunk_query).await?;
        debug!(query, scope = scope.unwrap_or("all"), hits = matches.len(), "chunk search finished");

        Ok(matches
            .into_iter()
            .map(|(chunk, document)| {
                let context = text_context(&chunk.text, query, self.context_chars);
                let highlighted = highlight(&context, query);
                SearchHit {
                    chunk,
                    document,
                    context,
                    highlighted,
                }
            })
            .collect())
    }
}

/// Char range `[start, end)` of the first case-insensitive occurrence of `needle`.
///
/// Matching runs on the same [`fold_case`] text the stores search, so every
/// stored hit gets a highlight. A match that covers part of a char's fold
/// widens to the whole original char.
pub fn find_case_insensitive(haystack: &[char], needle: &str) -> Option<(usize, usize)> {
    let folded_needle = fold_case(needle).chars().collect::<Vec<_>>();
    if folded_needle.is_empty() {
        return None;
    }

    let mut folded = Vec::with_capacity(haystack.len());
    let mut origin = Vec::with_capacity(haystack.len());
    for (index, ch) in haystack.iter().enumerate() {
        for lowered in ch.to_lowercase() {
            folded.push(lowered);
            origin.push(index);
        }
    }

    let width = folded_needle.len();
    if width > folded.len() {
        return None;
    }

    (0..=folded.len() - width)
        .find(|&at| folded[at..at + width] == folded_needle[..])
        .map(|at| (origin[at], origin[at + width - 1] + 1))
}

fn preview(chars: &[char]) -> String {
    if chars.len() > FALLBACK_PREVIEW_CHARS {
        let mut head = chars[..FALLBACK_PREVIEW_CHARS].iter().collect::<String>();
        head.push_str("...");
        head
    } else {
        chars.iter().collect()
    }
}

/// The part of `text` shown around the first match of `query`.
///
/// Left of the match the window reaches back to the previous `.` but never
/// more than `context_chars`. Right of the match it runs to the next `.` and
/// at least `context_chars`. Truncated sides are marked with `...`.
pub fn text_context(text: &str, query: &str, context_chars: usize) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    let Some((match_start, match_end)) = find_case_insensitive(&chars, query) else {
        return preview(&chars);
    };

    let sentence_start = chars[..match_start]
        .iter()
        .rposition(|ch| *ch == SENTENCE_TERMINATOR)
        .map_or(0, |dot| dot + 1);
    let start = if match_start - sentence_start > context_chars {
        match_start - context_chars
    } else {
        sentence_start
    };

    let sentence_end = chars[match_end..]
        .iter()
        .position(|ch| *ch == SENTENCE_TERMINATOR)
        .map_or(chars.len(), |offset| match_end + offset + 1);
    let minimum_end = (match_end + context_chars).min(chars.len());
    let end = sentence_end.max(minimum_end);

    let window = chars[start..end].iter().collect::<String>();
    let mut context = String::new();
    if start > 0 {
        context.push_str("... ");
    }
    context.push_str(window.trim());
    if end < chars.len() {
        context.push_str(" ...");
    }
    context
}

/// Escapes `text` for HTML and wraps the first case-insensitive match of
/// `query` in a highlight span, keeping the matched text's own casing.
pub fn highlight(text: &str, query: &str) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    match find_case_insensitive(&chars, query) {
        Some((start, end)) => {
            let before = chars[..start].iter().collect::<String>();
            let matched = chars[start..end].iter().collect::<String>();
            let after = chars[end..].iter().collect::<String>();
            format!(
                "{}{HIGHLIGHT_OPEN}{}{HIGHLIGHT_CLOSE}{}",
                escape_html(&before),
                escape_html(&matched),
                escape_html(&after)
            )
        }
        None => escape_html(text),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, NewDocument, TextChunk};
    use crate::stores::InMemoryStore;
    use chrono::Utc;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    fn new_document(original_name: &str) -> NewDocument {
        NewDocument {
            filename: original_name.to_string(),
            original_name: original_name.to_string(),
            file_size: 10,
            uploaded_at: Utc::now(),
            language: "en".to_string(),
            category: "other".to_string(),
            metadata: DocumentMetadata::default(),
        }
    }

    fn page(text: &str, page_number: u32) -> TextChunk {
        TextChunk {
            text: text.to_string(),
            page_number,
        }
    }

    #[test]
    fn finds_matches_regardless_of_case() {
        assert_eq!(find_case_insensitive(&chars("Hello World"), "WORLD"), Some((6, 11)));
        assert_eq!(find_case_insensitive(&chars("Стандарт ГОСТ"), "гост"), Some((9, 13)));
        assert_eq!(find_case_insensitive(&chars("abc"), "x"), None);
        assert_eq!(find_case_insensitive(&chars("abc"), ""), None);
        assert_eq!(find_case_insensitive(&chars("ab"), "abc"), None);
    }

    #[test]
    fn context_stops_at_sentence_boundaries() {
        let text = "First sentence. The pump is here. Last one";
        assert_eq!(text_context(text, "pump", 50), "... The pump is here. Last one");

        let text = "Intro. The pump is here. And then a long tail that keeps going well past fifty characters of text";
        assert_eq!(
            text_context(text, "pump", 5),
            "... The pump is here. ..."
        );
    }

    #[test]
    fn left_padding_is_capped() {
        let text = format!("{}needle", "x".repeat(80));
        let context = text_context(&text, "needle", 10);
        assert_eq!(context, format!("... {}needle", "x".repeat(10)));
    }

    #[test]
    fn right_side_reaches_at_least_context_chars() {
        let text = "Needle. abcdefghijklmnopqrstuvwxyz";
        assert_eq!(text_context(text, "needle", 10), "Needle. abcdefgh ...");
    }

    #[test]
    fn missing_query_falls_back_to_preview() {
        let long = "a".repeat(250);
        assert_eq!(text_context(&long, "zzz", 50), format!("{}...", "a".repeat(200)));
        assert_eq!(text_context("short text", "zzz", 50), "short text");
        assert_eq!(text_context("short text", "", 50), "short text");
    }

    #[test]
    fn highlight_wraps_only_first_occurrence() {
        let highlighted = highlight("Pump and pump and PUMP", "pump");
        assert_eq!(
            highlighted,
            r#"<span class="search-highlight">Pump</span> and pump and PUMP"#
        );
        assert_eq!(highlighted.matches(HIGHLIGHT_OPEN).count(), 1);
    }

    #[test]
    fn highlight_escapes_surrounding_text() {
        let highlighted = highlight("<b>a & b</b> valve", "VALVE");
        assert_eq!(
            highlighted,
            r#"&lt;b&gt;a &amp; b&lt;/b&gt; <span class="search-highlight">valve</span>"#
        );
        assert_eq!(highlight("x < y", "zzz"), "x &lt; y");
    }

    #[tokio::test]
    async fn every_stored_match_is_highlighted() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryStore::new();
        store
            .create(new_document("a.pdf"), &[page("ΟΔΟΣ İzmir", 1)])
            .await?;
        let engine = SearchEngine::new(store);

        let hits = engine.search("οδοσ", None).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].highlighted,
            r#"<span class="search-highlight">ΟΔΟΣ</span> İzmir"#
        );

        let hits = engine.search("i", None).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].highlighted,
            r#"ΟΔΟΣ <span class="search-highlight">İ</span>zmir"#
        );
        assert_eq!(hits[0].context, "ΟΔΟΣ İzmir");
        Ok(())
    }

    #[tokio::test]
    async fn empty_query_returns_nothing()-> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryStore::new();
        store.create(new_document("a.pdf"), &[page("text", 1)]).await?;
        let engine = SearchEngine::new(store);

        assert!(engine.search("", None).await?.is_empty());
        assert!(engine.search("   ", None).await?.is_empty());
        assert!(engine.search("absent", None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn results_are_ordered_by_name_then_page() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryStore::new();
        store
            .create(new_document("B.pdf"), &[page("valve on b", 1)])
            .await?;
        store
            .create(
                new_document("A.pdf"),
                &[page("valve on page three", 3), page("Valve on page one", 1)],
            )
            .await?;
        let engine = SearchEngine::new(store);

        let hits = engine.search("VALVE", None).await?;
        let order = hits
            .iter()
            .map(|hit| (hit.document.original_name.as_str(), hit.chunk.page_number))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![("A.pdf", 1), ("A.pdf", 3), ("B.pdf", 1)]);
        assert!(hits[0].highlighted.contains(r#"<span class="search-highlight">Valve</span>"#));
        Ok(())
    }

    #[tokio::test]
    async fn scope_limits_to_one_document() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryStore::new();
        let a = store.create(new_document("A.pdf"), &[page("valve", 1)]).await?;
        store.create(new_document("B.pdf"), &[page("valve", 1)]).await?;
        let engine = SearchEngine::new(store);

        let hits = engine.search("valve", Some(a.id.as_str())).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, a.id);
        Ok(())
    }
}
