//! Self-contained HTML report of a search.

use crate::models::{Document, SearchHit};
use crate::search::escape_html;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub content: String,
    pub filename: String,
}

struct DocumentSection<'a> {
    document: &'a Document,
    hits: Vec<&'a SearchHit>,
}

fn group_by_document(hits: &[SearchHit]) -> Vec<DocumentSection<'_>> {
    let mut sections: Vec<DocumentSection<'_>> = Vec::new();
    for hit in hits {
        match sections
            .iter_mut()
            .find(|section| section.document.id == hit.document.id)
        {
            Some(section) => section.hits.push(hit),
            None => sections.push(DocumentSection {
                document: &hit.document,
                hits: vec![hit],
            }),
        }
    }
    sections
}

pub fn report_filename(generated_at: DateTime<Utc>) -> String {
    format!(
        "search_report_{}.html",
        generated_at.format("%Y-%m-%d_%H-%M-%S")
    )
}

pub fn build_report(hits: &[SearchHit], query: &str) -> Report {
    build_report_at(hits, query, Utc::now())
}

/// Renders `hits` grouped per document in order of first appearance.
pub fn build_report_at(hits: &[SearchHit], query: &str, generated_at: DateTime<Utc>) -> Report {
    let sections = group_by_document(hits);
    let query_html = escape_html(query);

    let mut html = String::new();
    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Search report - "{query_html}"</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }}
.header {{ background: #f8f9fa; padding: 25px; border-radius: 8px; margin-bottom: 30px; }}
.stats {{ background: #e7f3ff; padding: 15px; border-radius: 5px; margin: 20px 0; }}
.document-section {{ margin: 25px 0; padding: 20px; border: 1px solid #dee2e6; border-radius: 8px; }}
.document-header {{ background: #e9ecef; padding: 15px; border-radius: 5px; margin-bottom: 15px; }}
.result-item {{ margin: 15px 0; padding: 15px; background: #f8f9fa; border-radius: 5px; border-left: 4px solid #007bff; }}
.search-highlight {{ background: #ffeb3b; font-weight: bold; padding: 2px 0; }}
.metadata {{ margin-top: 30px; padding-top: 20px; border-top: 2px solid #dee2e6; color: #6c757d; }}
</style>
</head>
<body>
<div class="header">
<h1>Search report</h1>
<div class="stats">
<p><strong>Query:</strong> "{query_html}"</p>
<p><strong>Total results:</strong> {total}</p>
<p><strong>Documents:</strong> {documents}</p>
<p><strong>Generated:</strong> {generated}</p>
</div>
</div>
"#,
        total = hits.len(),
        documents = sections.len(),
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    ));

    for section in &sections {
        let document = section.document;
        html.push_str(&format!(
            r#"<div class="document-section">
<div class="document-header">
<h2>{name}</h2>
<p><strong>Size:</strong> {size:.1} KB | <strong>Language:</strong> {language} | <strong>Category:</strong> {category} | <strong>Results:</strong> {count}</p>
</div>
"#,
            name = escape_html(&document.original_name),
            size = document.file_size as f64 / 1024.0,
            language = escape_html(&document.language),
            category = escape_html(&document.category),
            count = section.hits.len(),
        ));

        for hit in &section.hits {
            html.push_str(&format!(
                r#"<div class="result-item">
<p><strong>Page {page}:</strong></p>
<p>{context}</p>
</div>
"#,
                page = hit.chunk.page_number,
                context = hit.highlighted,
            ));
        }

        html.push_str("</div>\n");
    }

    html.push_str(&format!(
        r#"<div class="metadata">
<p>The report contains {total} results from {documents} documents</p>
</div>
</body>
</html>
"#,
        total = hits.len(),
        documents = sections.len(),
    ));

    Report {
        content: html,
        filename: report_filename(generated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentChunk, DocumentMetadata};
    use chrono::TimeZone;

    fn document(id: &str, name: &str) -> Document {
        Document {
            id: id.to_string(),
            filename: format!("{id}.pdf"),
            original_name: name.to_string(),
            file_size: 2048,
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            language: "ru".to_string(),
            category: "техника".to_string(),
            metadata: DocumentMetadata::default(),
        }
    }

    fn hit(document: &Document, page_number: u32, highlighted: &str) -> SearchHit {
        SearchHit {
            chunk: DocumentChunk {
                document_id: document.id.clone(),
                chunk_index: u64::from(page_number),
                page_number,
                text: String::new(),
            },
            document: document.clone(),
            context: String::new(),
            highlighted: highlighted.to_string(),
        }
    }

    #[test]
    fn report_groups_hits_and_counts() {
        let first = document("1", "B <draft>.pdf");
        let second = document("2", "A.pdf");
        let hits = vec![
            hit(&first, 1, "one"),
            hit(&second, 4, "two"),
            hit(&first, 7, "three"),
        ];
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();

        let report = build_report_at(&hits, "pump & valve", at);

        assert_eq!(report.filename, "search_report_2024-03-09_08-07-06.html");
        assert!(report.content.contains("<strong>Total results:</strong> 3"));
        assert!(report.content.contains("<strong>Documents:</strong> 2"));
        assert!(report.content.contains("pump &amp; valve"));
        assert!(report.content.contains("B &lt;draft&gt;.pdf"));
        assert!(report.content.contains("<strong>Size:</strong> 2.0 KB"));

        let first_section = report.content.find("B &lt;draft&gt;.pdf").unwrap_or(usize::MAX);
        let second_section = report.content.find("<h2>A.pdf</h2>").unwrap_or(0);
        assert!(first_section < second_section);
        assert!(report.content.find("three").unwrap_or(usize::MAX) < second_section);
    }

    #[test]
    fn report_is_deterministic_for_a_fixed_time() {
        let doc = document("1", "a.pdf");
        let hits = vec![hit(&doc, 1, "x")];
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 7, 6).unwrap();

        assert_eq!(build_report_at(&hits, "x", at), build_report_at(&hits, "x", at));
    }

    #[test]
    fn empty_report_still_renders() {
        let report = build_report_at(&[], "nothing", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(report.content.contains("<strong>Total results:</strong> 0"));
        assert!(report.content.ends_with("</html>\n"));
    }
}
