use regex::Regex;

use super::normalize::strip_property_lines;
use crate::core::SyncError;

/// One entry of a cloze pattern spec. Ordinal position in the parsed list
/// becomes the cloze group number (1-based).
#[derive(Debug, Clone)]
pub enum ClozeMatcher {
    /// Wraps every occurrence of the (trimmed) literal.
    Literal(String),
    /// Wraps regex matches; `global` decides first-only vs all occurrences.
    Pattern { regex: Regex, global: bool },
}

/// Parse a cloze property value into an ordered matcher list. Items are
/// comma-separated; `/pattern/flags` entries become regexes (`g` and `i`
/// flags honored, `m`/`s` mapped through), everything else is a literal.
pub fn parse_spec(spec: &str) -> Result<Vec<ClozeMatcher>, SyncError> {
    let mut matchers = Vec::new();
    for raw in spec.split(',') {
        let item = raw.trim();
        if item.is_empty() {
            continue;
        }
        if let Some(matcher) = parse_regex_item(item)? {
            matchers.push(matcher);
        } else {
            matchers.push(ClozeMatcher::Literal(item.to_string()));
        }
    }
    Ok(matchers)
}

fn parse_regex_item(item: &str) -> Result<Option<ClozeMatcher>, SyncError> {
    if !item.starts_with('/') || item.len() < 3 {
        return Ok(None);
    }
    let last_slash = match item.rfind('/') {
        Some(pos) if pos > 0 => pos,
        _ => return Ok(None),
    };
    let (body, flags) = (&item[1..last_slash], &item[last_slash + 1..]);
    if body.is_empty() || !flags.chars().all(|c| matches!(c, 'g' | 'i' | 'm' | 's')) {
        return Ok(None);
    }

    let mut pattern = String::new();
    for flag in ['i', 'm', 's'] {
        if flags.contains(flag) {
            pattern.push_str(&format!("(?{})", flag));
        }
    }
    pattern.push_str(body);

    let regex = Regex::new(&pattern)
        .map_err(|e| SyncError::BadClozeSpec(format!("{}: {}", item, e)))?;
    Ok(Some(ClozeMatcher::Pattern { regex, global: flags.contains('g') }))
}

/// True when the content between single `$` delimiters reads as math: it
/// must be non-empty and start and end on non-whitespace, the same shape the
/// normalizer's inline rule accepts. Keeps currency prose like
/// `5 $ and 6 $ fees` out of the span list.
fn is_inline_math(content: &str) -> bool {
    match (content.chars().next(), content.chars().last()) {
        (Some(first), Some(last)) => !first.is_whitespace() && !last.is_whitespace(),
        _ => false,
    }
}

/// Collect every `$...$` and `$$...$$` span (delimiters included) in one
/// left-to-right scan. An unterminated delimiter ends the scan.
pub fn math_spans(text: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(found) = text[pos..].find('$') {
        let start = pos + found;
        if text[start..].starts_with("$$") {
            match text[start + 2..].find("$$") {
                Some(rel) => {
                    let end = start + 2 + rel + 2;
                    spans.push(text[start..end].to_string());
                    pos = end;
                }
                None => break,
            }
        } else {
            match text[start + 1..].find('$') {
                Some(rel) => {
                    let end = start + 1 + rel + 1;
                    if is_inline_math(&text[start + 1..end - 1]) {
                        spans.push(text[start..end].to_string());
                        pos = end;
                    } else {
                        // Not a math opener; retry from the next dollar.
                        pos = start + 1;
                    }
                }
                None => break,
            }
        }
    }

    spans
}

/// Wrap one match as a cloze marker. A match found inside any math span has
/// its `}}` sequences spaced out so the marker's own closing braces stay
/// unambiguous; containment is textual, not positional.
fn wrap_cloze(group: usize, matched: &str, math: &[String]) -> String {
    if math.iter().any(|span| span.contains(matched)) {
        format!("{{{{c{}::{} }}}}", group, matched.replace("}}", "} } "))
    } else {
        format!("{{{{c{}::{}}}}}", group, matched)
    }
}

/// Strip property lines, then wrap every match of every matcher in a
/// numbered cloze marker. Matchers run in order over the already-wrapped
/// text, so earlier wraps may nest inside later matches; that ordering is
/// part of the contract.
pub fn insert_clozes(text: &str, matchers: &[ClozeMatcher]) -> String {
    let mut res = strip_property_lines(text);
    let math = math_spans(&res);

    for (i, matcher) in matchers.iter().enumerate() {
        let group = i + 1;
        match matcher {
            ClozeMatcher::Literal(lit) => {
                let needle = lit.trim();
                if needle.is_empty() {
                    continue;
                }
                res = res.replace(needle, &wrap_cloze(group, needle, &math));
            }
            ClozeMatcher::Pattern { regex, global } => {
                let rewritten = if *global {
                    regex.replace_all(&res, |caps: &regex::Captures| {
                        wrap_cloze(group, &caps[0], &math)
                    })
                } else {
                    regex.replace(&res, |caps: &regex::Captures| {
                        wrap_cloze(group, &caps[0], &math)
                    })
                };
                res = rewritten.into_owned();
            }
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literals(items: &[&str]) -> Vec<ClozeMatcher> {
        items.iter().map(|s| ClozeMatcher::Literal(s.to_string())).collect()
    }

    #[test]
    fn cloze_groups_follow_pattern_order() {
        let res = insert_clozes("foo bar", &literals(&["foo", "bar"]));
        assert_eq!(res, "{{c1::foo}} {{c2::bar}}");
    }

    #[test]
    fn every_occurrence_of_a_literal_is_wrapped() {
        let res = insert_clozes("ab x ab", &literals(&["ab"]));
        assert_eq!(res, "{{c1::ab}} x {{c1::ab}}");
    }

    #[test]
    fn match_inside_math_span_is_escaped() {
        let res = insert_clozes("$x}}y$", &literals(&["x}}y"]));
        assert_eq!(res, "${{c1::x} } y }}$");
    }

    #[test]
    fn match_outside_math_is_wrapped_verbatim() {
        let res = insert_clozes("$a+b$ and c", &literals(&["c"]));
        assert_eq!(res, "$a+b$ and {{c1::c}}");
    }

    #[test]
    fn property_lines_are_stripped_before_matching() {
        let res = insert_clozes("ankicloze:: foo\nfoo bar", &literals(&["foo"]));
        assert_eq!(res, "\n{{c1::foo}} bar");
    }

    #[test]
    fn global_regex_wraps_all_matches() {
        let matchers = parse_spec("/b.r/g").unwrap();
        let res = insert_clozes("bar bor", &matchers);
        assert_eq!(res, "{{c1::bar}} {{c1::bor}}");
    }

    #[test]
    fn non_global_regex_wraps_first_match_only() {
        let matchers = parse_spec("/b.r/").unwrap();
        let res = insert_clozes("bar bor", &matchers);
        assert_eq!(res, "{{c1::bar}} bor");
    }

    #[test]
    fn spec_mixes_literals_and_regexes() {
        let matchers = parse_spec("foo, /ba+r/gi").unwrap();
        assert!(matches!(&matchers[0], ClozeMatcher::Literal(s) if s == "foo"));
        assert!(matches!(&matchers[1], ClozeMatcher::Pattern { global: true, .. }));

        let res = insert_clozes("foo BAAR", &matchers);
        assert_eq!(res, "{{c1::foo}} {{c2::BAAR}}");
    }

    #[test]
    fn invalid_regex_in_spec_is_an_error() {
        assert!(matches!(parse_spec("/((/g"), Err(SyncError::BadClozeSpec(_))));
    }

    #[test]
    fn math_spans_collects_inline_and_block() {
        let spans = math_spans("a $x$ b $$y\nz$$ c");
        assert_eq!(spans, vec!["$x$".to_string(), "$$y\nz$$".to_string()]);
    }

    #[test]
    fn unterminated_math_ends_the_scan() {
        assert!(math_spans("a $x b").is_empty());
    }

    #[test]
    fn currency_dollars_are_not_a_math_span() {
        assert!(math_spans("5 $ and 6 $ fees").is_empty());
    }

    #[test]
    fn match_between_currency_dollars_is_wrapped_verbatim() {
        let res = insert_clozes("5 $ and 6 $ fees", &literals(&["and"]));
        assert_eq!(res, "5 $ {{c1::and}} 6 $ fees");
    }
}
