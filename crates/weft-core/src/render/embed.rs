//! Embedded HTML extraction for text blocks.
//!
//! Assistant text may carry fenced blocks explicitly tagged `html`. Each is
//! replaced in place with a dual-view construct: a rendered view inside a
//! sandboxed iframe (scripts allowed, unique origin) and an escaped source
//! view, toggled with a checkbox so switching needs no network round trip.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use super::{Locale, RenderContext};
use crate::markup::escape_html;

static HTML_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```html[ \t]*\r?\n(.*?)```").expect("valid fence regex"));

/// Renders one text block, replacing tagged fences with dual views and
/// passing the surrounding prose through the markup renderer. Text without
/// tagged fences goes through the markup renderer unchanged.
pub(super) fn render_text(text: &str, ctx: &mut RenderContext<'_>, out: &mut String) {
    let mut cursor = 0;
    for captures in HTML_FENCE_RE.captures_iter(text) {
        let whole = captures.get(0).expect("match");
        let body = captures.get(1).map_or("", |m| m.as_str());

        let before = &text[cursor..whole.start()];
        if !before.trim().is_empty() {
            out.push_str(&ctx.markup.render(before));
        }
        push_dual_view(body, ctx, out);
        cursor = whole.end();
    }

    let rest = &text[cursor..];
    if cursor == 0 {
        out.push_str(&ctx.markup.render(text));
    } else if !rest.trim().is_empty() {
        out.push_str(&ctx.markup.render(rest));
    }
}

fn push_dual_view(body: &str, ctx: &mut RenderContext<'_>, out: &mut String) {
    let cleaned = strip_blank_lines(body);
    let escaped = escape_html(&cleaned);
    let id = ctx.next_embed_id();
    let (rendered_label, source_label) = view_labels(ctx.locale);

    let _ = write!(
        out,
        concat!(
            "<div class=\"html-embed\">",
            "<input type=\"checkbox\" id=\"{id}\" class=\"html-embed-toggle\">",
            "<label for=\"{id}\" class=\"html-embed-tabs\" ",
            "data-rendered=\"{rendered}\" data-source=\"{source}\"></label>",
            "<div class=\"html-embed-rendered\">",
            "<iframe sandbox=\"allow-scripts\" srcdoc=\"{srcdoc}\"></iframe>",
            "</div>",
            "<div class=\"html-embed-source\">",
            "<pre><code class=\"language-html\">{code}</code></pre>",
            "</div>",
            "</div>"
        ),
        id = id,
        rendered = rendered_label,
        source = source_label,
        srcdoc = escaped,
        code = escaped,
    );
}

fn view_labels(locale: Locale) -> (&'static str, &'static str) {
    match locale {
        Locale::En => ("Rendered", "Source"),
        Locale::Zh => ("预览", "源码"),
    }
}

fn strip_blank_lines(body: &str) -> String {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::CmarkRenderer;

    fn render(text: &str) -> String {
        let markup = CmarkRenderer;
        let mut ctx = RenderContext::new(&markup, Locale::En);
        let mut out = String::new();
        render_text(text, &mut ctx, &mut out);
        out
    }

    #[test]
    fn plain_text_passes_through_markup_renderer() {
        let out = render("Just **bold** prose.");
        assert!(out.contains("<strong>bold</strong>"));
        assert!(!out.contains("html-embed"));
    }

    #[test]
    fn tagged_fence_becomes_dual_view() {
        let text = "Intro.\n\n```html\n<h1>Hi</h1>\n\n<script>go()</script>\n```\n\nOutro.";
        let out = render(text);

        // Both views present, script-capable sandbox, no same-origin grant.
        assert!(out.contains("sandbox=\"allow-scripts\""));
        assert!(out.contains("srcdoc=\"&lt;h1&gt;Hi&lt;/h1&gt;"));
        assert!(out.contains("language-html"));
        // Blank lines inside the fence are stripped.
        assert!(out.contains("&lt;h1&gt;Hi&lt;/h1&gt;\n&lt;script&gt;go()&lt;/script&gt;"));
        // The original fenced block is gone.
        assert!(!out.contains("```html"));
        assert!(!out.contains("<h1>Hi</h1>"));
        // Surrounding prose survives.
        assert!(out.contains("Intro."));
        assert!(out.contains("Outro."));
    }

    #[test]
    fn multiple_fences_get_distinct_ids() {
        let text = "```html\n<p>a</p>\n```\nmiddle\n```html\n<p>b</p>\n```";
        let out = render(text);
        assert!(out.contains("html-embed-0"));
        assert!(out.contains("html-embed-1"));
    }

    #[test]
    fn untagged_fence_is_left_to_the_markup_renderer() {
        let out = render("```python\nprint('hi')\n```");
        assert!(!out.contains("html-embed"));
        assert!(out.contains("print("));
    }
}
