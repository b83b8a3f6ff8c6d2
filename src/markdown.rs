//! Markdown to sanitized HTML.
//!
//! Guides are authored in Markdown. Fenced code blocks with a language tag are
//! highlighted into CSS classes, and everything is passed through an allow-list
//! sanitizer before it is stored.

use ammonia::Builder;
use once_cell::sync::Lazy;
use pulldown_cmark::escape::escape_html;
use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag};
use std::collections::{HashMap, HashSet};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "del", "div", "em", "h1", "h2", "h3", "h4", "h5",
    "h6", "hr", "i", "img", "li", "ol", "p", "pre", "s", "span", "strong", "sub", "sup", "table",
    "tbody", "td", "th", "thead", "tr", "ul",
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Rel applied to every link.
pub const LINK_REL: &str = "noopener noreferrer nofollow";

/// Renders Markdown to HTML that is safe to embed in a page.
pub fn render(raw: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut events = Vec::new();
    // Language and accumulated source of the fenced block being read.
    let mut fence: Option<(String, String)> = None;

    for event in Parser::new_ext(raw, options) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if !info.trim().is_empty() => {
                fence = Some((language_token(&info), String::new()));
            }
            Event::Text(text) if fence.is_some() => {
                if let Some((_, source)) = fence.as_mut() {
                    source.push_str(&text);
                }
            }
            Event::End(Tag::CodeBlock(_)) if fence.is_some() => {
                if let Some((lang, source)) = fence.take() {
                    events.push(Event::Html(highlight(&lang, &source).into()));
                }
            }
            event => events.push(event),
        }
    }

    let mut unsafe_html = String::with_capacity(raw.len() * 3 / 2);
    html::push_html(&mut unsafe_html, events.into_iter());
    sanitizer().clean(&unsafe_html).to_string()
}

fn sanitizer() -> Builder<'static> {
    let class_only: HashSet<&str> = HashSet::from(["class"]);
    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", HashSet::from(["href", "title"]));
    tag_attributes.insert("abbr", HashSet::from(["title"]));
    tag_attributes.insert("img", HashSet::from(["src", "alt", "title"]));
    tag_attributes.insert("th", HashSet::from(["align"]));
    tag_attributes.insert("td", HashSet::from(["align"]));
    for tag in ["span", "div", "pre", "code"] {
        tag_attributes.insert(tag, class_only.clone());
    }

    let mut builder = Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .link_rel(Some(LINK_REL));
    builder
}

/// First word of a fence info string, e.g. `rust` from "rust,ignore".
fn language_token(info: &str) -> String {
    info.split(|c: char| c.is_whitespace() || c == ',')
        .find(|token| !token.is_empty())
        .unwrap_or_default()
        .to_lowercase()
}

/// Highlighted code block. Unknown languages fall back to plain text.
fn highlight(lang: &str, source: &str) -> String {
    let syntax = SYNTAX_SET
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);

    for line in LinesWithEndings::from(source) {
        if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
            log::warn!("Highlighting {} failed: {}", lang, e);
            return format!(
                "<div class=\"codehilite\"><pre><code>{}</code></pre></div>",
                escaped(source)
            );
        }
    }

    format!(
        "<div class=\"codehilite\"><pre><code class=\"language-{}\">{}</code></pre></div>",
        escaped(lang),
        generator.finalize()
    )
}

/// Escapes text for an HTML body or a quoted attribute.
fn escaped(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    // Writing into a String cannot fail.
    let _ = escape_html(&mut output, input);
    output
}
