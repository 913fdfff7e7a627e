//! Bot text formatting
//!
//! Bot answers are Markdown-ish. [`MarkupFormatter`] turns them into the HTML
//! fragment a web embedder would inject, as an ordered list of named rewrite
//! rules: fenced code is cut out first, then each prose line goes through the
//! block rules (first match wins) and the inline rules, lines are joined with
//! `<br>`, runs of list items are wrapped and stray breaks around block
//! elements are removed.

use regex::{Captures, Regex};
use std::{borrow::Cow, sync::LazyLock};
use thiserror::Error;

/// Inputs longer than this are not formatted; callers fall back to raw text
pub const MAX_FORMAT_INPUT: usize = 512 * 1024;

/// Formatting failed; the raw text should be shown instead
#[derive(Debug, Error)]
#[error("Formatting failed: {0}")]
pub struct FormatError(pub String);

/// Turns raw bot text into display markup
pub trait Formatter: Send + Sync {
    fn format(&self, raw: &str) -> Result<String, FormatError>;
}

/// Leaves text untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl Formatter for PlainFormatter {
    fn format(&self, raw: &str) -> Result<String, FormatError> {
        Ok(raw.to_string())
    }
}

/// Markdown-ish text to HTML markup
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupFormatter;

impl Formatter for MarkupFormatter {
    fn format(&self, raw: &str) -> Result<String, FormatError> {
        if raw.len() > MAX_FORMAT_INPUT {
            return Err(FormatError(format!(
                "input of {} bytes exceeds {} bytes",
                raw.len(),
                MAX_FORMAT_INPUT
            )));
        }
        if raw.is_empty() {
            return Ok(String::new());
        }
        Ok(format_markup(raw))
    }
}

/// Format with a fallback to the raw text when the formatter fails
pub fn render_with(formatter: &dyn Formatter, raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match formatter.format(raw) {
        Ok(markup) => markup,
        Err(e) => {
            tracing::warn!("{}, showing raw text", e);
            raw.to_string()
        }
    }
}

/// Markup for a user message: escaped, line breaks kept
pub fn user_markup(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

/// A named rewrite applied with `replace_all`
struct Rule {
    name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

/// A line-level rule; group 1 (if any) is the inline content
struct BlockRule {
    name: &'static str,
    pattern: Regex,
    open: &'static str,
    close: &'static str,
}

fn rules(specs: &[(&'static str, &str, &'static str)]) -> Vec<Rule> {
    specs
        .iter()
        .filter_map(|&(name, pattern, replacement)| {
            Regex::new(pattern).ok().map(|pattern| Rule {
                name,
                pattern,
                replacement,
            })
        })
        .collect()
}

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w+-]*\n?(.*?)(?:```|\z)").unwrap());

static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());

static LIST_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:<li>.*?</li>(?:<br>)?)+").unwrap());

static BLOCK_RULES: LazyLock<Vec<BlockRule>> = LazyLock::new(|| {
    [
        ("h3", r"^### (.+)$", "<h3>", "</h3>"),
        ("h2", r"^## (.+)$", "<h2>", "</h2>"),
        ("h1", r"^# (.+)$", "<h1>", "</h1>"),
        ("hr", r"^(?:-{3,}|={3,}|\*{3,})\s*$", "<hr>", ""),
        ("blockquote", r"^&gt; (.+)$", "<blockquote>", "</blockquote>"),
        ("bullet", r"^[*-] (.+)$", "<li>", "</li>"),
        ("numbered", r"^\d+\. (.+)$", "<li>", "</li>"),
    ]
    .iter()
    .filter_map(|&(name, pattern, open, close)| {
        Regex::new(pattern).ok().map(|pattern| BlockRule {
            name,
            pattern,
            open,
            close,
        })
    })
    .collect()
});

// Bold before italic, links before bare URLs
static INLINE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(&[
        ("bold", r"\*\*(.+?)\*\*", "<strong>$1</strong>"),
        ("italic", r"\*([^*]+)\*", "<em>$1</em>"),
        ("italic_underscore", r"\b_([^_]+)_\b", "<em>$1</em>"),
        ("strikethrough", r"~~(.+?)~~", "<del>$1</del>"),
        (
            "link",
            r"\[([^\]]+)\]\(((?:https?://|mailto:)[^)\s]+)\)",
            r#"<a href="$2" target="_blank">$1</a>"#,
        ),
        (
            "url",
            r"(^|\s)(https?://[^\s<>]+)",
            r#"$1<a href="$2" target="_blank">$2</a>"#,
        ),
    ])
});

static CLEANUP_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(&[
        ("br_before_heading", r"<br>(<h[1-6]>)", "$1"),
        ("br_after_heading", r"(</h[1-6]>)<br>", "$1"),
        (
            "br_before_block",
            r"<br>(<ul>|<ol>|<li>|<blockquote>|<pre>|<hr>)",
            "$1",
        ),
        (
            "br_after_block",
            r"(</ul>|</ol>|</li>|</blockquote>|</pre>|<hr>)<br>",
            "$1",
        ),
    ])
});

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn format_markup(raw: &str) -> String {
    let escaped = escape_html(raw);
    let mut out = String::with_capacity(escaped.len() + 64);
    let mut last = 0;

    for caps in FENCE.captures_iter(&escaped) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&format_prose(&escaped[last..whole.start()]));
        let code = caps.get(1).map_or("", |m| m.as_str()).trim_end_matches('\n');
        out.push_str("<pre><code>");
        out.push_str(code);
        out.push_str("</code></pre>");
        last = whole.end();
    }
    out.push_str(&format_prose(&escaped[last..]));

    let wrapped = wrap_lists(&out);
    CLEANUP_RULES.iter().fold(wrapped, |acc, rule| apply(rule, &acc))
}

fn format_prose(text: &str) -> String {
    text.split('\n').map(format_line).collect::<Vec<_>>().join("<br>")
}

fn format_line(line: &str) -> String {
    let line = line.strip_suffix('\r').unwrap_or(line);
    for rule in BLOCK_RULES.iter() {
        if let Some(caps) = rule.pattern.captures(line) {
            tracing::trace!(rule = rule.name, "block rule matched");
            let content = caps.get(1).map_or("", |m| m.as_str());
            return format!("{}{}{}", rule.open, format_inline(content), rule.close);
        }
    }
    format_inline(line)
}

/// Inline rules, skipping the contents of backtick spans
fn format_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in INLINE_CODE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&apply_inline_rules(&text[last..whole.start()]));
        out.push_str("<code>");
        out.push_str(caps.get(1).map_or("", |m| m.as_str()));
        out.push_str("</code>");
        last = whole.end();
    }
    out.push_str(&apply_inline_rules(&text[last..]));
    out
}

fn apply_inline_rules(text: &str) -> String {
    INLINE_RULES
        .iter()
        .fold(text.to_string(), |acc, rule| apply(rule, &acc))
}

fn apply(rule: &Rule, text: &str) -> String {
    let result = rule.pattern.replace_all(text, rule.replacement);
    if matches!(result, Cow::Owned(_)) {
        tracing::trace!(rule = rule.name, "rule applied");
    }
    result.into_owned()
}

/// Wrap two or more consecutive list items in `<ul>`
fn wrap_lists(text: &str) -> String {
    LIST_RUN
        .replace_all(text, |caps: &Captures| {
            let run = &caps[0];
            if run.matches("<li>").count() > 1 {
                format!("<ul>{}</ul>", run.replace("<br>", ""))
            } else {
                run.to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(raw: &str) -> String {
        MarkupFormatter.format(raw).unwrap()
    }

    struct FailingFormatter;

    impl Formatter for FailingFormatter {
        fn format(&self, _raw: &str) -> Result<String, FormatError> {
            Err(FormatError("boom".into()))
        }
    }

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(BLOCK_RULES.len(), 7);
        assert_eq!(INLINE_RULES.len(), 6);
        assert_eq!(CLEANUP_RULES.len(), 4);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(fmt(""), "");
        assert_eq!(render_with(&MarkupFormatter, ""), "");
    }

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(fmt("Hello\nWorld"), "Hello<br>World");
    }

    #[test]
    fn test_headers() {
        assert_eq!(fmt("### Sub"), "<h3>Sub</h3>");
        assert_eq!(fmt("# Title\nBody"), "<h1>Title</h1>Body");
        assert_eq!(fmt("Intro\n## Part"), "Intro<h2>Part</h2>");
    }

    #[test]
    fn test_emphasis() {
        assert_eq!(
            fmt("**bold** and *it* and _em_"),
            "<strong>bold</strong> and <em>it</em> and <em>em</em>"
        );
        assert_eq!(fmt("~~gone~~"), "<del>gone</del>");
    }

    #[test]
    fn test_snake_case_is_not_italic() {
        assert_eq!(fmt("call snake_case_name now"), "call snake_case_name now");
    }

    #[test]
    fn test_links() {
        assert_eq!(
            fmt("[site](https://x.io)"),
            r#"<a href="https://x.io" target="_blank">site</a>"#
        );
        assert_eq!(
            fmt("see https://x.io now"),
            r#"see <a href="https://x.io" target="_blank">https://x.io</a> now"#
        );
    }

    #[test]
    fn test_lists_are_wrapped() {
        assert_eq!(fmt("- a\n- b"), "<ul><li>a</li><li>b</li></ul>");
        assert_eq!(fmt("1. one\n2. two"), "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn test_single_item_is_not_wrapped() {
        assert_eq!(fmt("- only\nafter"), "<li>only</li>after");
    }

    #[test]
    fn test_blockquote_and_rule() {
        assert_eq!(fmt("> quote"), "<blockquote>quote</blockquote>");
        assert_eq!(fmt("above\n---\nbelow"), "above<hr>below");
    }

    #[test]
    fn test_fenced_code() {
        assert_eq!(
            fmt("```rust\nlet x = 1;\n```"),
            "<pre><code>let x = 1;</code></pre>"
        );
        assert_eq!(
            fmt("para\n```\n**not bold**\n```\nafter"),
            "para<pre><code>**not bold**</code></pre>after"
        );
    }

    #[test]
    fn test_unterminated_fence_while_streaming() {
        assert_eq!(fmt("```\nfn main"), "<pre><code>fn main</code></pre>");
    }

    #[test]
    fn test_inline_code_is_protected() {
        assert_eq!(fmt("`*x*` and *y*"), "<code>*x*</code> and <em>y</em>");
    }

    #[test]
    fn test_link_cannot_leave_href() {
        assert_eq!(
            fmt(r#"[x](https://a"onmouseover="alert(1))"#),
            r#"<a href="https://a&quot;onmouseover=&quot;alert(1" target="_blank">x</a>)"#
        );
        assert_eq!(fmt("[x](javascript:alert(1))"), "[x](javascript:alert(1))");
        assert_eq!(
            fmt("[mail](mailto:a@b.io)"),
            r#"<a href="mailto:a@b.io" target="_blank">mail</a>"#
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(fmt(r#"say "hi" it's"#), "say &quot;hi&quot; it&#39;s");
        assert_eq!(user_markup("\"a\"\nb"), "&quot;a&quot;<br>b");
    }

    #[test]
    fn test_html_is_escaped() {
        assert_eq!(fmt("<b>hi</b> & co"), "&lt;b&gt;hi&lt;/b&gt; &amp; co");
    }

    #[test]
    fn test_oversized_input_fails() {
        let big = "a".repeat(MAX_FORMAT_INPUT + 1);
        assert!(MarkupFormatter.format(&big).is_err());
        assert_eq!(render_with(&MarkupFormatter, &big), big);
    }

    #[test]
    fn test_render_with_falls_back_to_raw() {
        assert_eq!(render_with(&FailingFormatter, "**raw**"), "**raw**");
    }

    #[test]
    fn test_plain_formatter() {
        assert_eq!(PlainFormatter.format("**x**").unwrap(), "**x**");
    }
}
