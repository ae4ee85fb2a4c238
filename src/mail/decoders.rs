use anyhow::{Context, Result};

/// Maximum number of characters of a body handed to a single model call.
pub const MAX_PROMPT_CHARS: usize = 2000;

const HTML_WRAP_WIDTH: usize = 200;

/// Decode an RFC 2047 subject into display text.
///
/// Decoding is best-effort: if the header cannot be parsed the raw subject is
/// returned unchanged.
pub fn decode_subject(raw: &str) -> String {
    // mailparse expects a full "Key: value" header line, unfolded
    let unfolded: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let mut line = b"Subject: ".to_vec();
    line.extend_from_slice(unfolded.as_bytes());
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(), // decodes RFC 2047 encoded-words
        Err(_) => raw.to_string(),
    }
}

/// Same as [`decode_subject`] for any other header value, e.g. `From`.
pub fn decode_mime_words(raw: &[u8]) -> String {
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Turn a raw body (plain text or HTML) into normalized plain text.
pub fn clean_body(raw: &str) -> Result<String> {
    let text = if looks_like_html(raw) {
        html2text::from_read(raw.as_bytes(), HTML_WRAP_WIDTH)
            .context("html to text conversion failed")?
    } else {
        raw.to_string()
    };
    Ok(normalize_whitespace(&text))
}

fn looks_like_html(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    ["<html", "<body", "<div", "<p>", "<p ", "<br", "<table", "<span", "<!doctype"]
        .iter()
        .any(|tag| lower.contains(tag))
}

fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0;
    for line in s.lines() {
        let line: String = line
            .chars()
            .filter(|c| !matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' | '\u{034f}'))
            .map(|c| if c == '\u{a0}' { ' ' } else { c })
            .collect();
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(line);
    }
    out
}

/// Prefix of `body` that is safe to put into a prompt.
pub fn prompt_excerpt(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Collapse text to a single line of at most `max_chars` characters.
pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    out.chars().take(max_chars).collect()
}
