use crate::domain::contract::LlmNewsPayload;
use anyhow::Context;

/// Pulls the JSON document out of model output: the body of the first
/// Markdown fence anywhere in the text, or else the span from the first
/// `{`/`[` to the matching last closer.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(fenced) = fenced_block(trimmed) {
        return Some(fenced);
    }

    let start = trimmed.find(['{', '['])?;
    let closer = if trimmed[start..].starts_with('{') {
        '}'
    } else {
        ']'
    };
    let end = trimmed.rfind(closer)?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

fn fenced_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // The rest of the opening line is the language tag.
    let body = &after_open[after_open.find('\n')? + 1..];
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}

/// Removes `//` comment lines and trailing commas, which models emit often
/// enough to be worth tolerating.
pub fn clean_json(raw: &str) -> String {
    let without_comments = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n");

    let chars: Vec<char> = without_comments.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn parse_news_payload(text: &str) -> anyhow::Result<LlmNewsPayload> {
    let json_str = extract_json(text).context("no JSON document in model output")?;
    let cleaned = clean_json(&json_str);
    serde_json::from_str::<LlmNewsPayload>(&cleaned)
        .with_context(|| format!("model output is not valid JSON for news schema: {cleaned}"))
}
