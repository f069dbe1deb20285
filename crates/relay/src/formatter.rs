//! Adapting reply text to the transport's markup dialect.

use std::sync::Arc;

use {tgrelay_channels::Markup, tgrelay_config::FormatterKind};

/// Turns a raw chunk into the payload of the first delivery attempt.
///
/// Formatting never fails. If the transport refuses the result, delivery
/// falls back to the raw chunk with markup disabled.
pub trait Formatter: Send + Sync {
    /// Dialect the formatted payload is sent in.
    fn markup(&self) -> Markup;

    /// `None` maps to the empty string.
    fn format(&self, chunk: Option<&str>) -> String;
}

/// Sends model output as-is, declared as Telegram legacy Markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Formatter for Passthrough {
    fn markup(&self) -> Markup {
        Markup::Markdown
    }

    fn format(&self, chunk: Option<&str>) -> String {
        chunk.unwrap_or_default().to_string()
    }
}

/// Renders common Markdown (bold, italic, strikethrough, inline and fenced
/// code, links) to Telegram HTML, escaping everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelegramHtml;

impl Formatter for TelegramHtml {
    fn markup(&self) -> Markup {
        Markup::Html
    }

    fn format(&self, chunk: Option<&str>) -> String {
        chunk.map(render_html).unwrap_or_default()
    }
}

#[must_use]
pub fn formatter_for(kind: FormatterKind) -> Arc<dyn Formatter> {
    match kind {
        FormatterKind::Markdown => Arc::new(Passthrough),
        FormatterKind::Html => Arc::new(TelegramHtml),
    }
}

fn render_html(md: &str) -> String {
    let mut out = String::with_capacity(md.len() + md.len() / 4);
    let mut in_fence = false;

    for (i, line) in md.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.trim_start().starts_with("```") {
            out.push_str(if in_fence { "</pre>" } else { "<pre>" });
            in_fence = !in_fence;
        } else if in_fence {
            escape_into(&mut out, line);
        } else {
            let chars: Vec<char> = line.chars().collect();
            render_inline(&mut out, &chars);
        }
    }

    // A chunk boundary can fall inside a fence.
    if in_fence {
        out.push_str("</pre>");
    }
    out
}

fn render_inline(out: &mut String, chars: &[char]) {
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let consumed = match c {
            '`' => wrap_verbatim(out, chars, i, "code"),
            '*' if chars.get(i + 1) == Some(&'*') => wrap(out, chars, i, &['*', '*'], "b"),
            '~' if chars.get(i + 1) == Some(&'~') => wrap(out, chars, i, &['~', '~'], "s"),
            '*' => wrap(out, chars, i, &['*'], "i"),
            '_' if i == 0 || !chars[i - 1].is_alphanumeric() => wrap(out, chars, i, &['_'], "i"),
            '[' => link(out, chars, i),
            _ => None,
        };
        match consumed {
            Some(next) => i = next,
            None => {
                escape_char(out, c);
                i += 1;
            },
        }
    }
}

/// `delim inner delim` → `<tag>inner</tag>`, with `inner` rendered recursively.
fn wrap(out: &mut String, chars: &[char], at: usize, delim: &[char], tag: &str) -> Option<usize> {
    let open_end = at + delim.len();
    let close = find(chars, open_end, delim)?;
    let inner = &chars[open_end..close];
    if inner.is_empty() || inner[0].is_whitespace() {
        return None;
    }
    out.push('<');
    out.push_str(tag);
    out.push('>');
    render_inline(out, inner);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    Some(close + delim.len())
}

fn wrap_verbatim(out: &mut String, chars: &[char], at: usize, tag: &str) -> Option<usize> {
    let close = find(chars, at + 1, &['`'])?;
    if close == at + 1 {
        return None;
    }
    out.push('<');
    out.push_str(tag);
    out.push('>');
    for &c in &chars[at + 1..close] {
        escape_char(out, c);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    Some(close + 1)
}

/// `[label](url)`
fn link(out: &mut String, chars: &[char], at: usize) -> Option<usize> {
    let label_end = find(chars, at + 1, &[']', '('])?;
    let url_end = find(chars, label_end + 2, &[')'])?;
    let url: String = chars[label_end + 2..url_end].iter().collect();
    if url.is_empty() || url.chars().any(char::is_whitespace) {
        return None;
    }
    out.push_str("<a href=\"");
    for c in url.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            _ => escape_char(out, c),
        }
    }
    out.push_str("\">");
    render_inline(out, &chars[at + 1..label_end]);
    out.push_str("</a>");
    Some(url_end + 1)
}

fn find(chars: &[char], from: usize, pat: &[char]) -> Option<usize> {
    if from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(pat.len())
        .position(|w| w == pat)
        .map(|p| from + p)
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        escape_char(out, c);
    }
}

fn escape_char(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        _ => out.push(c),
    }
}
