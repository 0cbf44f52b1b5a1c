//! Last-resort parsing of free-text search answers.
//!
//! Items recovered here carry `NewsOrigin::Heuristic` and should be treated
//! as low confidence.

use crate::domain::news::{NewsItem, NewsOrigin, Sentiment};

const GENERIC_SUMMARY_CHARS: usize = 300;
const FIELD_LABELS: &[&str] = &["source", "summary", "published", "date", "url", "sentiment"];

#[derive(Debug, Default)]
struct Draft {
    title: String,
    summary: String,
    source: Option<String>,
    url: Option<String>,
    published_date: Option<String>,
}

impl Draft {
    fn finish(self, default_source: &str) -> Option<NewsItem> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(NewsItem {
            title,
            summary: self.summary.trim().to_string(),
            source: self.source.unwrap_or_else(|| default_source.to_string()),
            url: self.url,
            published_date: self.published_date,
            sentiment: Sentiment::Neutral,
            relevance_score: 0.0,
            origin: NewsOrigin::Heuristic,
        })
    }
}

/// Strips list markers such as `1.`, `2)` or `-` from the start of a line.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_start_matches(|c: char| c == '-' || c == '•' || c.is_whitespace());
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

fn field<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim_start_matches('*').trim_start();
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].trim_start_matches('*').trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start_matches('*').trim())
}

fn bold_heading(line: &str) -> Option<&str> {
    if !line.starts_with("**") || line.chars().count() <= 10 {
        return None;
    }
    if FIELD_LABELS.iter().any(|label| field(line, label).is_some()) {
        return None;
    }
    let inner = line.trim_start_matches('*');
    let inner = match inner.find("**") {
        Some(end) => &inner[..end],
        None => inner,
    };
    let inner = inner.trim().trim_end_matches(':').trim();
    (!inner.is_empty()).then_some(inner)
}

/// Line-anchored extraction: `Title:` or a bold heading starts an item;
/// `Source:`, `Summary:`, `Date:`/`Published:` and `URL:` fill it. Provider
/// `Sentiment:` labels are ignored.
pub fn parse_heuristic(text: &str, default_source: &str) -> Vec<NewsItem> {
    let mut out = Vec::new();
    let mut current: Option<Draft> = None;

    for raw_line in text.lines() {
        let line = strip_list_marker(raw_line.trim());
        if line.is_empty() {
            continue;
        }

        let new_title = field(line, "title")
            .map(str::to_string)
            .or_else(|| bold_heading(line).map(str::to_string));
        if let Some(title) = new_title {
            if let Some(done) = current.take().and_then(|d| d.finish(default_source)) {
                out.push(done);
            }
            current = Some(Draft {
                title,
                ..Default::default()
            });
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };

        if let Some(v) = field(line, "source") {
            draft.source = Some(v.to_string()).filter(|s| !s.is_empty());
        } else if let Some(v) = field(line, "summary") {
            draft.summary = v.to_string();
        } else if let Some(v) = field(line, "published").or_else(|| field(line, "date")) {
            draft.published_date = Some(v.to_string()).filter(|s| !s.is_empty());
        } else if let Some(v) = field(line, "url") {
            draft.url = Some(v.to_string()).filter(|s| s.starts_with("http"));
        }
    }

    if let Some(done) = current.and_then(|d| d.finish(default_source)) {
        out.push(done);
    }
    out
}

/// Wraps an unparseable answer as one generic item.
pub fn generic_item(title: &str, content: &str, source: &str) -> NewsItem {
    let trimmed = content.trim();
    let mut summary: String = trimmed.chars().take(GENERIC_SUMMARY_CHARS).collect();
    if trimmed.chars().count() > GENERIC_SUMMARY_CHARS {
        summary.push_str("...");
    }
    NewsItem {
        title: title.to_string(),
        summary,
        source: source.to_string(),
        url: None,
        published_date: None,
        sentiment: Sentiment::Neutral,
        relevance_score: 0.0,
        origin: NewsOrigin::Heuristic,
    }
}
