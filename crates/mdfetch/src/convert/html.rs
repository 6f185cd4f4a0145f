//! HTML to Markdown conversion

use std::iter::Peekable;
use std::str::Chars;

/// Elements whose content never reaches the output
const SKIP_TAGS: &[&str] = &["head", "script", "style", "noscript", "iframe", "svg", "template"];

/// Check if content is HTML based on content type and body
pub fn is_html(content_type: &str, body: &str) -> bool {
    let ct_lower = content_type.to_lowercase();
    if ct_lower.contains("text/html") || ct_lower.contains("application/xhtml") {
        return true;
    }

    let head: String = body.trim_start().chars().take(15).collect();
    let head = head.to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Open list, with the next number for ordered lists
enum List {
    Unordered,
    Ordered(usize),
}

/// Link being written, with where its text starts in the output
struct OpenLink {
    href: String,
    text_start: usize,
}

#[derive(Default)]
struct Table {
    rows: Vec<Vec<String>>,
    cell: Option<String>,
}

impl Table {
    /// Move the open cell, if any, into the current row
    fn flush_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            if self.rows.is_empty() {
                self.rows.push(Vec::new());
            }
            if let Some(row) = self.rows.last_mut() {
                row.push(clean_whitespace(&cell).replace('\n', " "));
            }
        }
    }
}

/// Convert HTML to markdown
pub fn html_to_markdown(html: &str) -> String {
    let mut out = String::new();
    let mut skip_stack: Vec<String> = Vec::new();
    let mut lists: Vec<List> = Vec::new();
    let mut links: Vec<OpenLink> = Vec::new();
    let mut table: Option<Table> = None;
    let mut in_pre = false;
    let mut in_blockquote = false;

    let mut chars = html.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '<' {
            let tag = read_tag(&mut chars);
            if tag.starts_with("!--") {
                skip_comment(&tag, &mut chars);
                continue;
            }
            if tag.starts_with('!') || tag.starts_with('?') {
                continue;
            }

            let tag_lower = tag.to_ascii_lowercase();
            let is_closing = tag_lower.starts_with('/');
            let tag_name = tag_lower
                .trim_start_matches('/')
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or("");

            if SKIP_TAGS.contains(&tag_name) {
                if is_closing {
                    if let Some(pos) = skip_stack.iter().rposition(|t| t == tag_name) {
                        skip_stack.truncate(pos);
                    }
                } else if !tag.ends_with('/') {
                    skip_stack.push(tag_name.to_string());
                }
                continue;
            }
            if !skip_stack.is_empty() {
                continue;
            }

            let in_table = table.is_some();
            // Inside a table cell, output collects into the cell buffer.
            let target = match table.as_mut().and_then(|t| t.cell.as_mut()) {
                Some(cell) => cell,
                None => &mut out,
            };

            match tag_name {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    if is_closing {
                        target.push_str("\n\n");
                    } else {
                        let level = tag_name[1..].parse::<usize>().unwrap_or(1);
                        target.push_str("\n\n");
                        target.push_str(&"#".repeat(level));
                        target.push(' ');
                    }
                }
                "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav"
                | "aside" => {
                    target.push_str("\n\n");
                }
                "br" => target.push_str(if in_table { " " } else { "\n" }),
                "hr" => target.push_str("\n\n---\n\n"),
                "ul" | "ol" => {
                    if is_closing {
                        lists.pop();
                        if lists.is_empty() {
                            target.push('\n');
                        }
                    } else {
                        lists.push(if tag_name == "ol" {
                            List::Ordered(1)
                        } else {
                            List::Unordered
                        });
                    }
                }
                "li" => {
                    if !is_closing {
                        target.push('\n');
                        for _ in 0..lists.len().saturating_sub(1) {
                            target.push_str("  ");
                        }
                        match lists.last_mut() {
                            Some(List::Ordered(n)) => {
                                target.push_str(&format!("{n}. "));
                                *n += 1;
                            }
                            _ => target.push_str("- "),
                        }
                    }
                }
                "strong" | "b" => target.push_str("**"),
                "em" | "i" => target.push('*'),
                "pre" => {
                    target.push_str("\n```\n");
                    in_pre = !is_closing;
                }
                "code" => {
                    if !in_pre {
                        target.push('`');
                    }
                }
                "blockquote" => {
                    in_blockquote = !is_closing;
                    target.push_str(if is_closing { "\n" } else { "\n> " });
                }
                "a" => {
                    if is_closing {
                        if let Some(link) = links.pop() {
                            let start = link.text_start.min(target.len());
                            if !target.is_char_boundary(start) {
                                continue;
                            }
                            let text = target.split_off(start);
                            let text = text.trim();
                            if !text.is_empty() {
                                target.push_str(&format!("[{}]({})", text, link.href));
                            }
                        }
                    } else if let Some(href) = extract_attribute(&tag, "href") {
                        links.push(OpenLink {
                            href,
                            text_start: target.len(),
                        });
                    }
                }
                "img" => {
                    if let Some(src) = extract_attribute(&tag, "src") {
                        let alt = extract_attribute(&tag, "alt").unwrap_or_default();
                        target.push_str(&format!("![{alt}]({src})"));
                    }
                }
                "table" => {
                    if is_closing {
                        if let Some(mut t) = table.take() {
                            t.flush_cell();
                            out.push_str("\n\n");
                            out.push_str(&render_table(&t.rows));
                            out.push_str("\n\n");
                        }
                    } else {
                        table = Some(Table::default());
                    }
                }
                "tr" => {
                    if let Some(t) = table.as_mut() {
                        t.flush_cell();
                        if !is_closing {
                            t.rows.push(Vec::new());
                        }
                    }
                }
                "td" | "th" => {
                    if let Some(t) = table.as_mut() {
                        t.flush_cell();
                        if !is_closing {
                            t.cell = Some(String::new());
                        }
                    }
                }
                _ => {}
            }
        } else if skip_stack.is_empty() {
            let decoded = decode_entity(c, &mut chars);
            let target = match table.as_mut() {
                Some(t) => match t.cell.as_mut() {
                    Some(cell) => cell,
                    // Text between cells is dropped.
                    None => continue,
                },
                None => &mut out,
            };
            if in_pre || !decoded.is_whitespace() {
                target.push(decoded);
            } else if in_blockquote && decoded == '\n' {
                target.push_str("\n> ");
            } else if !target.is_empty() && !target.ends_with(char::is_whitespace) {
                target.push(' ');
            }
        }
    }

    if let Some(mut t) = table.take() {
        t.flush_cell();
        out.push_str("\n\n");
        out.push_str(&render_table(&t.rows));
    }

    clean_whitespace(&out)
}

/// Read a tag body after `<`, up to and excluding `>`
fn read_tag(chars: &mut Peekable<Chars>) -> String {
    let mut tag = String::new();
    let mut quote: Option<char> = None;
    for next in chars.by_ref() {
        match (quote, next) {
            (None, '>') => break,
            (None, '"' | '\'') if !tag.starts_with('!') => quote = Some(next),
            (Some(q), _) if q == next => quote = None,
            _ => {}
        }
        tag.push(next);
    }
    tag
}

/// Skip the rest of a comment whose start was read as a tag
fn skip_comment(tag: &str, chars: &mut Peekable<Chars>) {
    if tag.len() >= 5 && tag.ends_with("--") {
        return;
    }
    let mut dashes = 0;
    for next in chars.by_ref() {
        match next {
            '-' => dashes += 1,
            '>' if dashes >= 2 => return,
            _ => dashes = 0,
        }
    }
}

/// Render collected rows as a pipe table, first row as header
pub(crate) fn render_table(rows: &[Vec<String>]) -> String {
    let rows: Vec<&Vec<String>> = rows.iter().filter(|r| !r.is_empty()).collect();
    let Some(width) = rows.iter().map(|r| r.len()).max() else {
        return String::new();
    };

    let format_row = |row: &Vec<String>| {
        let mut line = String::from("|");
        for i in 0..width {
            let cell = row.get(i).map(|c| c.replace('|', "\\|")).unwrap_or_default();
            line.push_str(&format!(" {cell} |"));
        }
        line
    };

    let mut lines = vec![format_row(rows[0])];
    lines.push(format!("|{}", " --- |".repeat(width)));
    lines.extend(rows[1..].iter().map(|r| format_row(r)));
    lines.join("\n")
}

/// Extract attribute value from tag
///
/// Walks the attribute list after the tag name, so names inside quoted
/// values never match. Names compare ASCII case-insensitively.
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let mut rest = tag.trim_start_matches(|c: char| !c.is_whitespace());

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            return None;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after_eq) => {
                let after_eq = after_eq.trim_start();
                let (value, remaining) = match after_eq.chars().next() {
                    Some(quote @ ('"' | '\'')) => {
                        let inner = &after_eq[1..];
                        match inner.find(quote) {
                            Some(end) => (&inner[..end], &inner[end + 1..]),
                            None => (inner, ""),
                        }
                    }
                    _ => {
                        let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                        after_eq.split_at(end)
                    }
                };
                rest = remaining;
                Some(value)
            }
            None => None,
        };

        if name.eq_ignore_ascii_case(attr) {
            return value.map(str::to_string);
        }
    }
}

/// Decode HTML entity starting from ampersand
fn decode_entity(c: char, chars: &mut Peekable<Chars>) -> char {
    if c != '&' {
        return c;
    }

    // Look ahead on a clone so a bare `&` leaves the following text intact.
    let mut lookahead = chars.clone();
    let mut entity = String::new();
    let mut terminated = false;
    while let Some(&next) = lookahead.peek() {
        if next == ';' {
            lookahead.next();
            terminated = true;
            break;
        }
        if (!next.is_ascii_alphanumeric() && next != '#') || entity.len() > 10 {
            break;
        }
        entity.push(next);
        lookahead.next();
    }
    if !terminated {
        return '&';
    }

    let decoded = match entity.as_str() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        "hellip" => Some('…'),
        "copy" => Some('©'),
        "reg" => Some('®'),
        _ => entity.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };

    match decoded {
        Some(ch) => {
            *chars = lookahead;
            ch
        }
        None => '&',
    }
}

/// Clean whitespace: collapse runs inside lines, keep indentation, allow at
/// most one blank line in a row, trim the ends
pub fn clean_whitespace(s: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for line in s.split('\n') {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                lines.push(String::new());
            }
            continue;
        }
        blank_run = 0;
        let indent = line.len() - line.trim_start_matches(' ').len();
        lines.push(format!("{}{}", " ".repeat(indent), words.join(" ")));
    }

    lines.join("\n").trim().to_string()
}
