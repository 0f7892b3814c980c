//! Plain-text to block-structured markup.
//!
//! Converts normalized description text into the HTML fragments consumed by
//! the receipt renderer. The input grammar is deliberately narrow: simple
//! paragraphs, single-level bullet lists with an optional `HEADER:` line,
//! and bare inline URLs. This is a small hand-rolled classifier, not a
//! general markup parser.

/// Format plain text into block markup, one block per output line.
///
/// Total: empty or whitespace-only input yields the empty string.
pub fn format_blocks(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let unified = text.replace("\r\n", "\n");
    let mut elements: Vec<String> = Vec::new();

    for block in unified.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        if is_list_block(block) {
            render_list(block, &mut elements);
        } else {
            elements.push(render_paragraph(block));
        }
    }

    linkify(&elements.join("\n"))
}

/// A block is a list when any of its lines starts with a dash-space marker
/// after leading whitespace.
fn is_list_block(block: &str) -> bool {
    block.lines().any(|line| line.trim_start().starts_with("- "))
}

/// Render a list block: leading lines ending with a colon become a sub-heading,
/// bulleted lines become `<li>` entries in a single `<ul>`.
///
/// Leading lines without a colon are kept as a paragraph rather than dropped.
/// Unbulleted lines between bullets are treated as continuations of the
/// previous entry.
fn render_list(block: &str, elements: &mut Vec<String>) {
    let mut header_lines: Vec<&str> = Vec::new();
    let mut loose_lines: Vec<&str> = Vec::new();
    let mut items: Vec<String> = Vec::new();
    let mut seen_bullet = false;

    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(item) = line.strip_prefix("- ") {
            items.push(item.trim().to_string());
            seen_bullet = true;
        } else if seen_bullet {
            if let Some(last) = items.last_mut() {
                last.push(' ');
                last.push_str(line);
            }
        } else if line.ends_with(':') {
            header_lines.push(line);
        } else {
            loose_lines.push(line);
        }
    }

    if !loose_lines.is_empty() {
        elements.push(format!("<p>{}</p>", loose_lines.join("<br/>")));
    }
    if !header_lines.is_empty() {
        elements.push(format!("<h4>{}</h4>", header_lines.join(" ")));
    }

    let mut list = String::from("<ul>");
    for item in &items {
        list.push_str("<li>");
        list.push_str(item);
        list.push_str("</li>");
    }
    list.push_str("</ul>");
    elements.push(list);
}

/// Render a paragraph block, preserving internal line breaks as `<br/>`.
fn render_paragraph(block: &str) -> String {
    let lines: Vec<&str> = block.lines().map(str::trim).collect();
    format!("<p>{}</p>", lines.join("<br/>"))
}

/// Wrap every bare `http://` / `https://` URL as a hyperlink whose visible
/// text is the URL itself. Runs once over the fully formatted output, so it
/// applies uniformly to paragraph and list-item text.
fn linkify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("http://") || rest.starts_with("https://") {
            let len = rest
                .find(|c: char| c.is_whitespace() || c == '<')
                .unwrap_or(rest.len());
            let url = &rest[..len];
            out.push_str("<a href=\"");
            out.push_str(url);
            out.push_str("\">");
            out.push_str(url);
            out.push_str("</a>");
            i += len;
            continue;
        }
        match rest.chars().next() {
            Some(ch) => {
                out.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }
    out
}
