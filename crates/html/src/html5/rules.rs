//! Element category tables shared by the tree builder and the simulator.
//!
//! Both consumers go through the same predicates so a token classified one
//! way on the worker is handled the same way on the coordinator.

/// Elements that never have children or an end tag.
pub fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "basefont"
            | "bgsound"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "keygen"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Start tags processed with "in head" rules wherever they appear before the
/// body content.
pub fn is_head_content(name: &str) -> bool {
    matches!(
        name,
        "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script" | "style" | "title"
    )
}

/// Start tags that close an open `p` in button scope.
pub fn closes_p(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "center"
            | "details"
            | "dialog"
            | "dir"
            | "div"
            | "dl"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "header"
            | "hgroup"
            | "main"
            | "menu"
            | "nav"
            | "ol"
            | "p"
            | "search"
            | "section"
            | "summary"
            | "ul"
    )
}

/// Block end tags that pop up to their matching element when it is in scope.
pub fn is_block_end(name: &str) -> bool {
    (closes_p(name) && name != "p") || matches!(name, "button" | "listing" | "pre" | "form")
}

pub fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Elements whose end tag may be implied.
pub fn has_implied_end_tag(name: &str) -> bool {
    matches!(
        name,
        "dd" | "dt" | "li" | "optgroup" | "option" | "p" | "rb" | "rp" | "rt" | "rtc"
    )
}

/// Elements the simplified insertion modes do not model. Their content may
/// be handled differently by a complete tree builder, so the simulator
/// treats them as a point of uncertainty.
pub fn is_unmodelled(name: &str) -> bool {
    matches!(
        name,
        "template"
            | "table"
            | "caption"
            | "colgroup"
            | "tbody"
            | "thead"
            | "tfoot"
            | "tr"
            | "td"
            | "th"
            | "svg"
            | "math"
            | "select"
            | "frameset"
            | "frame"
    )
}

/// Elements that stop the generic end-tag walk up the stack.
pub fn is_special(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "applet"
            | "area"
            | "article"
            | "aside"
            | "base"
            | "basefont"
            | "bgsound"
            | "blockquote"
            | "body"
            | "br"
            | "button"
            | "caption"
            | "center"
            | "col"
            | "colgroup"
            | "dd"
            | "details"
            | "dir"
            | "div"
            | "dl"
            | "dt"
            | "embed"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "frame"
            | "frameset"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "head"
            | "header"
            | "hgroup"
            | "hr"
            | "html"
            | "iframe"
            | "img"
            | "input"
            | "keygen"
            | "li"
            | "link"
            | "listing"
            | "main"
            | "marquee"
            | "menu"
            | "meta"
            | "nav"
            | "noembed"
            | "noframes"
            | "noscript"
            | "object"
            | "ol"
            | "p"
            | "param"
            | "plaintext"
            | "pre"
            | "script"
            | "search"
            | "section"
            | "select"
            | "source"
            | "style"
            | "summary"
            | "table"
            | "tbody"
            | "td"
            | "template"
            | "textarea"
            | "tfoot"
            | "th"
            | "thead"
            | "title"
            | "tr"
            | "track"
            | "ul"
            | "wbr"
            | "xmp"
    )
}

/// HTML whitespace for tree-construction purposes.
pub fn is_html_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\u{0C}' | '\r' | ' ')
}

/// Length of the leading whitespace prefix of `text`, in bytes.
pub fn leading_whitespace_len(text: &str) -> usize {
    text.find(|c: char| !is_html_whitespace(c))
        .unwrap_or(text.len())
}

/// Script `type` values that run as classic scripts.
pub fn is_classic_script_type(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return true;
    };
    let value = value.trim_matches(is_html_whitespace);
    value.is_empty()
        || [
            "text/javascript",
            "application/javascript",
            "application/ecmascript",
            "application/x-javascript",
            "text/ecmascript",
            "text/jscript",
        ]
        .iter()
        .any(|t| value.eq_ignore_ascii_case(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_do_not_overlap_unexpectedly() {
        assert!(closes_p("div") && is_block_end("div"));
        assert!(closes_p("p") && !is_block_end("p"));
        assert!(is_void("br") && is_special("br"));
        assert!(is_head_content("script"));
        assert!(is_unmodelled("table") && !is_unmodelled("div"));
    }

    #[test]
    fn whitespace_prefix() {
        assert_eq!(leading_whitespace_len(" \n\tx "), 3);
        assert_eq!(leading_whitespace_len("   "), 3);
        assert_eq!(leading_whitespace_len("x"), 0);
    }

    #[test]
    fn classic_script_types() {
        assert!(is_classic_script_type(None));
        assert!(is_classic_script_type(Some("")));
        assert!(is_classic_script_type(Some(" Text/JavaScript ")));
        assert!(!is_classic_script_type(Some("module")));
        assert!(!is_classic_script_type(Some("text/template")));
    }
}
