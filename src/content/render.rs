use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::OnceLock,
};

use percent_encoding::{
    utf8_percent_encode,
    AsciiSet,
    NON_ALPHANUMERIC,
};
use pulldown_cmark::{
    html,
    CowStr,
    Event,
    Options,
    Parser,
    Tag,
};
use regex::Regex;

/// Characters left intact by `encodeURIComponent`; everything else is
/// percent-encoded so the flattened media filename stays stable.
const COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn data_uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*data:([a-z]+/[a-z]+(;[a-z-]+=[a-z-]+)?)?(;base64)?,[a-z0-9!$&',()*+;=\-._~:@/?%\s]*\s*$",
        )
        .unwrap()
    })
}

fn image_ext_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.(png|jpg|jpeg|bmp|tiff|gif|apng|svg|webp)$").unwrap())
}

fn web_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(https?://|www\.)[a-z0-9][a-z0-9.-]*\.[^\s]{2,}$").unwrap()
    })
}

fn leading_parents_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\.\./)+").unwrap())
}

/// A local image scheduled for storage in the remote media collection under
/// its flattened name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub media: Vec<MediaAsset>,
}

fn default_link_ok(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    !(lower.starts_with("javascript:")
        || lower.starts_with("vbscript:")
        || lower.starts_with("file:")
        || lower.starts_with("data:"))
}

/// Bare local image paths are allowed even though they would fail an
/// ordinary web-link check.
fn is_local_image(url: &str) -> bool {
    image_ext_re().is_match(url)
        && !web_url_re().is_match(url)
        && !url.trim_start().to_lowercase().starts_with("data:")
}

fn url_allowed(url: &str) -> bool {
    default_link_ok(url) || data_uri_re().is_match(url) || is_local_image(url)
}

fn flatten_name(url: &str) -> String {
    utf8_percent_encode(url, COMPONENT_SET).to_string()
}

fn resolve_media_path(graph_path: &Path, url: &str) -> PathBuf {
    graph_path.join(leading_parents_re().replace(url, "").as_ref())
}

/// Render normalized markup to card HTML. No markdown extensions are
/// enabled; raw HTML passes through, soft breaks become `<br />`, and code
/// block markup is suppressed since that syntax is reserved by the host app.
/// Local image references are rewritten to their flattened names and
/// collected as media assets for the caller to upload.
pub fn render(text: &str, graph_path: &Path) -> Rendered {
    let mut media = Vec::new();
    let mut events = Vec::new();
    let mut dropped_links = 0usize;
    let mut dropped_images = 0usize;

    for event in Parser::new_ext(text, Options::empty()) {
        match event {
            Event::SoftBreak => events.push(Event::Html(CowStr::from("<br />\n"))),
            Event::Start(Tag::CodeBlock(_)) | Event::End(Tag::CodeBlock(_)) => {}
            Event::Start(Tag::Image(link_type, dest, title)) => {
                if is_local_image(&dest) {
                    let flattened = flatten_name(&dest);
                    media.push(MediaAsset {
                        filename: flattened.clone(),
                        path: resolve_media_path(graph_path, &dest),
                    });
                    events.push(Event::Start(Tag::Image(
                        link_type,
                        CowStr::from(flattened),
                        title,
                    )));
                } else if url_allowed(&dest) {
                    events.push(Event::Start(Tag::Image(link_type, dest, title)));
                } else {
                    dropped_images += 1;
                }
            }
            Event::End(Tag::Image(link_type, dest, title)) => {
                if dropped_images > 0 {
                    dropped_images -= 1;
                } else if is_local_image(&dest) {
                    events.push(Event::End(Tag::Image(
                        link_type,
                        CowStr::from(flatten_name(&dest)),
                        title,
                    )));
                } else {
                    events.push(Event::End(Tag::Image(link_type, dest, title)));
                }
            }
            Event::Start(Tag::Link(link_type, dest, title)) => {
                if url_allowed(&dest) {
                    events.push(Event::Start(Tag::Link(link_type, dest, title)));
                } else {
                    dropped_links += 1;
                }
            }
            Event::End(Tag::Link(link_type, dest, title)) => {
                if dropped_links > 0 {
                    dropped_links -= 1;
                } else {
                    events.push(Event::End(Tag::Link(link_type, dest, title)));
                }
            }
            other => events.push(other),
        }
    }

    let mut html = String::new();
    html::push_html(&mut html, events.into_iter());

    // The pipeline may have double-escaped characters by this point; decode
    // so the card renderer displays them correctly.
    let html = html_escape::decode_html_entities(&html).into_owned();

    Rendered { html, media }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_str(text: &str) -> Rendered {
        render(text, Path::new("/graph"))
    }

    #[test]
    fn local_image_is_flattened_and_scheduled() {
        let out = render_str("![diagram](../assets/pic.png)");
        assert!(out.html.contains("src=\"..%2Fassets%2Fpic.png\""), "html: {}", out.html);
        assert_eq!(
            out.media,
            vec![MediaAsset {
                filename: "..%2Fassets%2Fpic.png".to_string(),
                path: PathBuf::from("/graph/assets/pic.png"),
            }]
        );
    }

    #[test]
    fn web_image_is_untouched_and_not_scheduled() {
        let out = render_str("![pic](https://example.com/pic.png)");
        assert!(out.html.contains("src=\"https://example.com/pic.png\""));
        assert!(out.media.is_empty());
    }

    #[test]
    fn script_link_is_dropped_but_text_kept() {
        let out = render_str("[click](javascript:alert(1))");
        assert!(!out.html.contains("<a"));
        assert!(out.html.contains("click"));
    }

    #[test]
    fn ordinary_web_link_survives() {
        let out = render_str("[site](https://example.com)");
        assert!(out.html.contains("<a href=\"https://example.com\""));
    }

    #[test]
    fn soft_breaks_become_br() {
        let out = render_str("line one\nline two");
        assert!(out.html.contains("line one<br />\nline two"));
    }

    #[test]
    fn raw_html_passes_through() {
        let out = render_str("<blockquote>hello</blockquote>");
        assert!(out.html.contains("<blockquote>hello</blockquote>"));
    }

    #[test]
    fn fenced_code_markup_is_suppressed() {
        let out = render_str("```\nlet x = 1;\n```");
        assert!(!out.html.contains("<pre>"));
        assert!(out.html.contains("let x = 1;"));
    }

    #[test]
    fn entities_are_decoded_in_final_output() {
        let out = render_str("salt & pepper");
        assert!(out.html.contains("salt & pepper"));
        assert!(!out.html.contains("&amp;"));
    }
}
