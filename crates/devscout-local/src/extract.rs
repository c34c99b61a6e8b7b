use std::io::Cursor;

/// Width used when rendering HTML with html2text.
const RENDER_WIDTH: usize = 100;

/// Convert HTML to plain text wrapped at `width`. Falls back to the raw input if rendering fails.
pub fn html_to_text(html: &str, width: usize) -> String {
    html2text::from_read(Cursor::new(html.as_bytes()), width).unwrap_or_else(|_| html.to_string())
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best-effort guess for whether bytes are HTML-ish.
pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let rest = &bytes[i..];
    let head: Vec<u8> = rest.iter().take(9).map(|b| b.to_ascii_lowercase()).collect();
    head.starts_with(b"<!doctype")
        || head.starts_with(b"<html")
        || head.starts_with(b"<head")
        || head.starts_with(b"<body")
}

fn class_or_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_boilerplate_container(el: &html_scraper::ElementRef) -> bool {
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    [
        "nav", "navbar", "menu", "sidebar", "footer", "header", "banner", "cookie", "consent",
        "advert", "promo", "newsletter",
    ]
    .iter()
    .any(|bad| s.contains(bad))
}

fn element_text_chars(el: &html_scraper::ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

fn element_link_text_chars(el: &html_scraper::ElementRef) -> usize {
    let Ok(sel) = html_scraper::Selector::parse("a") else {
        return 0;
    };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

/// Pick the densest non-navigation block of a page.
///
/// Product landing pages spread their pitch across many sections, so this only wins
/// when one block clearly dominates; otherwise callers fall back to whole-page rendering.
pub fn html_main_text(html: &str) -> Option<String> {
    let doc = html_scraper::Html::parse_document(html);
    let sel = html_scraper::Selector::parse("article, main, section, div").ok()?;

    let mut best_score: i64 = 0;
    let mut best_text: Option<String> = None;
    for el in doc.select(&sel).take(20_000) {
        if is_boilerplate_container(&el) {
            continue;
        }
        let txt = element_text_chars(&el);
        if txt < 20 {
            continue;
        }
        let link_txt = element_link_text_chars(&el);
        let mut score = txt as i64 - 2 * (link_txt as i64);
        match el.value().name() {
            "article" => score += 500,
            "main" => score += 300,
            _ => {}
        }
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            best_text = Some(norm_ws(&el.text().collect::<Vec<_>>().join(" ")));
        }
    }
    best_text.filter(|t| t.chars().any(|c| !c.is_whitespace()))
}

fn content_type_lc_prefix(ct: Option<&str>) -> String {
    ct.unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Remove `<tag ...> ... </tag>` blocks, ASCII-case-insensitively. Unclosed tags stop stripping.
pub fn strip_tag_blocks(html: &str, tag: &str) -> String {
    let open_pat = format!("<{}", tag.to_ascii_lowercase());
    let close_pat = format!("</{}>", tag.to_ascii_lowercase());

    let mut out = String::new();
    let mut i = 0usize;
    let lower = html.to_ascii_lowercase();
    while let Some(rel_start) = lower[i..].find(&open_pat) {
        let start = i + rel_start;
        let after_open = start + open_pat.len();
        if let Some(rel_end) = lower[after_open..].find(&close_pat) {
            out.push_str(&html[i..start]);
            i = after_open + rel_end + close_pat.len();
        } else {
            break;
        }
    }
    out.push_str(&html[i..]);
    out
}

/// Readable text from a fetched body.
///
/// HTML goes through main-block picking, then html2text on the script-free page.
/// Text-like bodies pass through. Binary bodies yield "".
pub fn text_from_bytes(bytes: &[u8], content_type: Option<&str>) -> String {
    let ct = content_type_lc_prefix(content_type);
    let is_html = ct == "text/html" || ct == "application/xhtml+xml" || bytes_look_like_html(bytes);
    if is_html {
        let raw = String::from_utf8_lossy(bytes);
        let mut html = raw.to_string();
        for tag in ["script", "style", "noscript", "svg"] {
            html = strip_tag_blocks(&html, tag);
        }
        let rendered = html_to_text(&html, RENDER_WIDTH);
        return match html_main_text(&html) {
            // Keep the main block only when it carries most of the page.
            Some(main) if main.chars().count() * 3 >= norm_ws(&rendered).chars().count() * 2 => {
                main
            }
            _ => rendered,
        };
    }

    let text_like = ct.is_empty()
        || ct.starts_with("text/")
        || ct.ends_with("json")
        || ct.ends_with("xml")
        || ct == "application/markdown";
    if !text_like || bytes.contains(&0) {
        return String::new();
    }
    String::from_utf8_lossy(bytes).to_string()
}
