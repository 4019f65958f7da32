use std::path::Path;

use crate::core::SyncError;

pub mod cloze;
pub mod normalize;
pub mod render;

pub use render::{ MediaAsset, Rendered };

/// Full content pipeline for one source item: parse the cloze spec, wrap
/// matches in cloze markers, normalize graph markup, render to HTML.
pub fn to_card_html(text: &str, cloze_spec: &str, graph_path: &Path) -> Result<Rendered, SyncError> {
    let matchers = cloze::parse_spec(cloze_spec)?;
    let clozed = cloze::insert_clozes(text, &matchers);
    let normalized = normalize::normalize(&clozed);
    Ok(render::render(&normalized, graph_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_produces_cloze_html() {
        let text = "ankicloze:: mitochondria\nThe mitochondria is the powerhouse";
        let out = to_card_html(text, "mitochondria", Path::new("/graph")).unwrap();
        assert!(out.html.contains("{{c1::mitochondria}}"), "html: {}", out.html);
        assert!(!out.html.contains("ankicloze"));
        assert!(out.media.is_empty());
    }

    #[test]
    fn pipeline_converts_math_around_clozes() {
        let out = to_card_html("The value $x+1$ grows", "grows", Path::new("/graph")).unwrap();
        assert!(out.html.contains(r"\( x+1 \)"), "html: {}", out.html);
        assert!(out.html.contains("{{c1::grows}}"), "html: {}", out.html);
    }
}
