use std::sync::OnceLock;

use regex::Regex;

fn property_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[\w-]*::.*").unwrap())
}

fn info_proof_begin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#\+BEGIN_(INFO|PROOF)([ \t].*)?\r?\n").unwrap())
}

fn quote_begin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#\+BEGIN_(QUOTE)([ \t].*)?\r?\n").unwrap())
}

fn center_begin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#\+BEGIN_(CENTER)([ \t].*)?\r?\n").unwrap())
}

fn comment_begin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#\+BEGIN_(COMMENT)([ \t].*)?\r?\n").unwrap())
}

fn generic_begin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#\+BEGIN_(\w+)([ \t].*)?\r?\n").unwrap())
}

fn block_math_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\$([\s\S]*?)\$\$").unwrap())
}

fn inline_math_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Content starts on a non-space non-dollar character and ends on a
    // non-space; the lazy optional tail keeps adjacent spans separate.
    RE.get_or_init(|| Regex::new(r"\$([^\s$](?:[\s\S]*?[^\s])??)\$").unwrap())
}

/// Remove lines that are pure `key:: value` property declarations.
pub(crate) fn strip_property_lines(text: &str) -> String {
    property_line_re().replace_all(text, "").into_owned()
}

/// One container rewrite pass. Each `#+BEGIN_<TAG>` matched by `begin_re`
/// is paired with the nearest following `#+END_<TAG>`; an unterminated
/// container is left alone.
fn rewrite_containers(
    text: &str,
    begin_re: &Regex,
    replace: impl Fn(&str, &str) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(caps) = begin_re.captures(rest) {
        let open = caps.get(0).unwrap();
        let tag = caps.get(1).unwrap().as_str();

        let end_re = Regex::new(&format!(r"(?i)#\+END_{}", regex::escape(tag))).unwrap();
        let after_open = &rest[open.end()..];
        match end_re.find(after_open) {
            Some(close) => {
                out.push_str(&rest[..open.start()]);
                out.push_str(&replace(tag, &after_open[..close.start()]));
                rest = &after_open[close.end()..];
            }
            None => {
                out.push_str(&rest[..open.end()]);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Convert org-style containers in precedence order: removal classes run
/// over the whole text before quote/center/comment, so a removed block
/// nested inside another container never leaks onto the card.
fn convert_containers(text: &str) -> String {
    let res = rewrite_containers(text, info_proof_begin_re(), |_, _| String::new());
    let res = rewrite_containers(&res, quote_begin_re(), |_, inner| {
        format!("<blockquote>{}</blockquote>", inner.trim())
    });
    // span instead of div: block elements confuse the markdown renderer
    let res = rewrite_containers(&res, center_begin_re(), |_, inner| {
        format!("<span class=\"text-center\">{}</span>", inner.trim())
    });
    let res = rewrite_containers(&res, comment_begin_re(), |_, _| String::new());
    rewrite_containers(&res, generic_begin_re(), |tag, inner| {
        format!("<span class=\"{}\">{}</span>", tag.to_lowercase(), inner.trim())
    })
}

fn convert_math(text: &str) -> String {
    // Block math first so the inline rule never eats a `$$` delimiter.
    let res = block_math_re().replace_all(text, r"\[ $1 \]").into_owned();
    let converted = inline_math_re().replace_all(&res, |caps: &regex::Captures| {
        let matched = caps.get(0).unwrap();
        // A span opening right after another `$` is half of a malformed
        // block delimiter; leave it unconverted.
        if matched.start() > 0 && res.as_bytes()[matched.start() - 1] == b'$' {
            matched.as_str().to_string()
        } else {
            format!(r"\( {} \)", &caps[1])
        }
    });
    converted.into_owned()
}

/// Normalize graph markup into renderer-ready markdown. Stage order is
/// load-bearing: backslash doubling runs last because the markdown renderer
/// consumes one level of escaping, so every backslash, the inserted math
/// delimiters included, must arrive doubled to survive into the card HTML.
pub fn normalize(text: &str) -> String {
    let res = strip_property_lines(text);
    let res = convert_containers(&res);
    let res = convert_math(&res);
    res.replace('\\', "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_lines_are_removed() {
        let text = "collapsed:: true\nSome fact\n  ankicloze:: a, b\n";
        let res = normalize(text);
        assert!(!res.contains("collapsed"));
        assert!(!res.contains("ankicloze"));
        assert!(res.contains("Some fact"));
    }

    #[test]
    fn quote_container_becomes_blockquote() {
        let res = normalize("#+BEGIN_QUOTE\nhello\n#+END_QUOTE");
        assert_eq!(res, "<blockquote>hello</blockquote>");
    }

    #[test]
    fn comment_and_proof_containers_are_dropped() {
        assert_eq!(normalize("#+BEGIN_COMMENT\nsecret\n#+END_COMMENT"), "");
        assert_eq!(normalize("x\n#+BEGIN_PROOF\nqed\n#+END_PROOF\ny"), "x\n\ny");
    }

    #[test]
    fn info_nested_in_quote_is_removed_before_quote_converts() {
        let res = normalize("#+BEGIN_QUOTE\n#+BEGIN_INFO\nsecret\n#+END_INFO\n#+END_QUOTE");
        assert_eq!(res, "<blockquote></blockquote>");
    }

    #[test]
    fn center_and_named_containers_become_spans() {
        assert_eq!(
            normalize("#+BEGIN_CENTER\nmid\n#+END_CENTER"),
            "<span class=\"text-center\">mid</span>"
        );
        assert_eq!(
            normalize("#+BEGIN_WARNING note\ncareful\n#+END_WARNING"),
            "<span class=\"warning\">careful</span>"
        );
    }

    #[test]
    fn container_tags_are_case_insensitive() {
        assert_eq!(normalize("#+begin_quote\nhi\n#+end_quote"), "<blockquote>hi</blockquote>");
    }

    #[test]
    fn unterminated_container_is_left_alone() {
        let res = normalize("#+BEGIN_QUOTE\ndangling");
        assert!(res.contains("#+BEGIN_QUOTE"));
    }

    #[test]
    fn inline_math_is_converted() {
        assert_eq!(normalize("a $x+y$ b"), r"a \\( x+y \\) b");
        assert_eq!(normalize("$e$"), r"\\( e \\)");
    }

    #[test]
    fn block_math_is_converted() {
        assert_eq!(normalize("$$\\sum_i i$$"), r"\\[ \\sum_i i \\]");
    }

    #[test]
    fn adjacent_inline_spans_stay_separate() {
        assert_eq!(normalize("$x$ b $y$"), r"\\( x \\) b \\( y \\)");
    }

    #[test]
    fn dollar_adjacent_span_is_not_converted() {
        assert_eq!(normalize("$a$$b$"), r"\\( a \\)$b$");
    }

    #[test]
    fn space_padded_dollars_are_not_math() {
        assert_eq!(normalize("5 $ and 6 $ fees"), "5 $ and 6 $ fees");
    }

    #[test]
    fn backslashes_double_after_math_conversion() {
        // Source backslashes and the inserted delimiters both double; the
        // renderer's escape pass brings each back to a single backslash.
        assert_eq!(normalize(r"$\alpha$"), r"\\( \\alpha \\)");
    }
}
