//! HTML region to markdown conversion.
//!
//! The region is walked once in document order. Headings (h2-h6) become ATX
//! headings and everything between two headings lands under the first, so a
//! page built from sibling headings and a page that wraps each section in its
//! own container produce the same shape. Inline content is accumulated and
//! flushed as a paragraph at every block boundary.

use scraper::node::Node;
use scraper::ElementRef;
use url::Url;

use super::dom::{collect_text, element_text, normalize_whitespace, resolve_href, selector, NoiseFilter};

const KNOWN_LANGUAGES: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "java",
    "ruby",
    "php",
    "cpp",
    "csharp",
    "go",
    "rust",
    "bash",
    "json",
    "yaml",
    "sql",
    "html",
    "css",
];

/// Elements that start a new block and are walked recursively.
const BLOCK_CONTAINERS: &[&str] = &[
    "div", "section", "article", "main", "figure", "details", "dl", "center", "body", "picture",
    "tbody", "address",
];

/// Elements whose text becomes a paragraph.
const TEXT_BLOCKS: &[&str] = &["p", "dt", "dd", "figcaption", "summary", "caption"];

/// Converts a content region to markdown.
pub struct MarkdownConverter<'a> {
    filter: &'a NoiseFilter,
    default_language: &'static str,
    base: Option<&'a Url>,
}

impl<'a> MarkdownConverter<'a> {
    pub fn new(filter: &'a NoiseFilter, default_language: &'static str) -> Self {
        Self {
            filter,
            default_language,
            base: None,
        }
    }

    /// Resolve image sources against `base`.
    pub fn with_base(mut self, base: &'a Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn convert(&self, region: ElementRef<'_>) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut inline = String::new();
        self.walk(region, &mut blocks, &mut inline);
        flush(&mut inline, &mut blocks);
        sanitize_markdown(&blocks.join("\n\n"))
    }

    fn walk(&self, element: ElementRef<'_>, blocks: &mut Vec<String>, inline: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => inline.push_str(&text.text),
                Node::Element(el) => {
                    if self.filter.is_noise(el) {
                        continue;
                    }
                    if let Some(child_ref) = ElementRef::wrap(child) {
                        self.element(child_ref, blocks, inline);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&self, el: ElementRef<'_>, blocks: &mut Vec<String>, inline: &mut String) {
        let name = el.value().name();
        match name {
            "h1" => flush(inline, blocks),
            "h2" | "h3" | "h4" | "h5" | "h6" => {
                flush(inline, blocks);
                let level = heading_level(name);
                let text = element_text(el, self.filter);
                if !text.is_empty() {
                    blocks.push(format!("{} {}", "#".repeat(level), text));
                }
            }
            "ul" | "ol" => {
                flush(inline, blocks);
                let mut lines = Vec::new();
                self.list_lines(el, 0, &mut lines);
                if !lines.is_empty() {
                    blocks.push(lines.join("\n"));
                }
            }
            "pre" => {
                flush(inline, blocks);
                if let Some(block) = self.code_block(el) {
                    blocks.push(block);
                }
            }
            "code" => {
                let raw: String = el.text().collect();
                if raw.trim().contains('\n') {
                    flush(inline, blocks);
                    if let Some(block) = self.code_block(el) {
                        blocks.push(block);
                    }
                } else {
                    inline.push_str(&raw);
                }
            }
            "table" => {
                flush(inline, blocks);
                if let Some(table) = self.table(el) {
                    blocks.push(table);
                }
            }
            "blockquote" => {
                flush(inline, blocks);
                let inner = self.convert(el);
                if !inner.is_empty() {
                    let quoted: Vec<String> = inner
                        .lines()
                        .map(|l| {
                            if l.is_empty() {
                                ">".to_string()
                            } else {
                                format!("> {}", l)
                            }
                        })
                        .collect();
                    blocks.push(quoted.join("\n"));
                }
            }
            "img" => {
                if let Some(image) = self.image(el) {
                    flush(inline, blocks);
                    blocks.push(image);
                }
            }
            "br" => inline.push('\n'),
            "hr" => flush(inline, blocks),
            _ if TEXT_BLOCKS.contains(&name) => {
                flush(inline, blocks);
                if images_only(el) {
                    self.walk(el, blocks, inline);
                    flush(inline, blocks);
                } else {
                    let text = element_text(el, self.filter);
                    if !text.is_empty() {
                        blocks.push(text);
                    }
                }
            }
            _ if BLOCK_CONTAINERS.contains(&name) => {
                flush(inline, blocks);
                self.walk(el, blocks, inline);
                flush(inline, blocks);
            }
            _ => self.walk(el, blocks, inline),
        }
    }

    fn list_lines(&self, list: ElementRef<'_>, depth: usize, out: &mut Vec<String>) {
        for item in list.children().filter_map(ElementRef::wrap) {
            if item.value().name() != "li" || self.filter.is_noise(item.value()) {
                continue;
            }
            let mut text = String::new();
            let mut nested = Vec::new();
            for child in item.children() {
                match child.value() {
                    Node::Text(t) => text.push_str(&t.text),
                    Node::Element(el) => {
                        if self.filter.is_noise(el) {
                            continue;
                        }
                        let Some(child_ref) = ElementRef::wrap(child) else { continue };
                        if matches!(el.name(), "ul" | "ol") {
                            nested.push(child_ref);
                        } else {
                            text.push(' ');
                            collect_text(child_ref, self.filter, &mut text);
                        }
                    }
                    _ => {}
                }
            }
            let text = normalize_whitespace(&text);
            if !text.is_empty() {
                out.push(format!("{}* {}", "  ".repeat(depth), text));
            }
            for sub in nested {
                self.list_lines(sub, depth + 1, out);
            }
        }
    }

    fn code_block(&self, el: ElementRef<'_>) -> Option<String> {
        let raw: String = el.text().collect();
        let code = raw.trim_matches('\n').trim_end();
        if code.trim().is_empty() {
            return None;
        }
        let language = detect_code_language(el, code, self.default_language);
        let fence = fence_for(code);
        Some(format!("{fence}{language}\n{code}\n{fence}"))
    }

    fn table(&self, table: ElementRef<'_>) -> Option<String> {
        let row_sel = selector("tr")?;
        let table_id = table.id();
        let rows: Vec<ElementRef<'_>> = table
            .select(&row_sel)
            .filter(|row| {
                row.ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|a| a.value().name() == "table")
                    .is_some_and(|t| t.id() == table_id)
            })
            .collect();

        let (first, rest) = rows.split_first()?;
        let header = self.row_cells(*first);
        if header.is_empty() {
            return None;
        }

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(format!("| {} |", header.join(" | ")));
        lines.push(format!("| {} |", vec!["---"; header.len()].join(" | ")));
        for row in rest {
            let mut cells = self.row_cells(*row);
            if cells.is_empty() {
                continue;
            }
            while cells.len() < header.len() {
                cells.push(String::new());
            }
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        Some(lines.join("\n"))
    }

    fn row_cells(&self, row: ElementRef<'_>) -> Vec<String> {
        row.children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
            .map(|c| element_text(c, self.filter).replace('|', "\\|"))
            .collect()
    }

    fn image(&self, img: ElementRef<'_>) -> Option<String> {
        let src = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))?
            .trim();
        if src.is_empty() || src.starts_with("data:") {
            return None;
        }
        let src = match self.base {
            Some(base) => resolve_href(base, src)?.to_string(),
            None => src.to_string(),
        };
        let alt = normalize_whitespace(img.value().attr("alt").unwrap_or(""));
        Some(format!("![{}]({})", alt, src))
    }
}

/// A text block holding images but no text, as in `<p><img></p>`.
fn images_only(el: ElementRef<'_>) -> bool {
    let has_text = el.text().any(|t| !t.trim().is_empty());
    !has_text
        && el
            .descendants()
            .filter_map(ElementRef::wrap)
            .any(|e| e.value().name() == "img")
}

fn flush(inline: &mut String, blocks: &mut Vec<String>) {
    let text = normalize_whitespace(inline);
    inline.clear();
    if !text.is_empty() {
        blocks.push(text);
    }
}

fn heading_level(tag: &str) -> usize {
    tag.get(1..)
        .and_then(|n| n.parse().ok())
        .unwrap_or(2)
}

/// Guess the language of a code block.
///
/// Checks, in order: a `language-*`/`lang-*` class on the element or a nested
/// `<code>`, a bare known language class, a `language-*`/`highlight-*` class on
/// the two nearest ancestors, content heuristics, then `default`.
pub fn detect_code_language(el: ElementRef<'_>, code: &str, default: &str) -> String {
    let mut classes: Vec<&str> = el.value().classes().collect();
    if let Some(sel) = selector("code") {
        if let Some(inner) = el.select(&sel).next() {
            classes.extend(inner.value().classes());
        }
    }

    for class in &classes {
        if let Some(lang) = class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
        {
            if let Some(lang) = normalize_language(lang) {
                return lang;
            }
        }
    }
    for class in &classes {
        let lower = class.to_lowercase();
        if KNOWN_LANGUAGES.contains(&lower.as_str()) {
            return lower;
        }
    }
    for ancestor in el.ancestors().filter_map(ElementRef::wrap).take(2) {
        for class in ancestor.value().classes() {
            if let Some(lang) = class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("highlight-"))
            {
                if let Some(lang) = normalize_language(lang) {
                    return lang;
                }
            }
        }
    }

    guess_language_from_content(code)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

fn normalize_language(lang: &str) -> Option<String> {
    let lang = lang.trim().to_lowercase();
    let mapped = match lang.as_str() {
        "" | "none" | "text" | "default" | "plaintext" => return None,
        "py" | "py3" | "python3" | "pycon" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "sh" | "shell" | "console" | "shell-session" => "bash",
        "c++" => "cpp",
        "cs" | "c#" => "csharp",
        "rs" => "rust",
        other => other,
    };
    Some(mapped.to_string())
}

fn guess_language_from_content(code: &str) -> Option<&'static str> {
    if code.contains("def ") && code.contains(':') {
        Some("python")
    } else if code.contains("function ") && code.contains('{') {
        Some("javascript")
    } else if code.contains("public class ") {
        Some("java")
    } else if code.contains("import React") {
        Some("jsx")
    } else if code.contains("<template>") && code.contains("<script>") {
        Some("vue")
    } else if code.contains("@Component") {
        Some("typescript")
    } else {
        None
    }
}

/// A backtick fence longer than any backtick run inside `code`.
fn fence_for(code: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in code.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Opening fence length of `line`, if it is a fence line.
fn fence_len(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let n = trimmed.chars().take_while(|c| *c == '`').count();
    (n >= 3).then_some(n)
}

/// Close any code fence left open at the end of `markdown`.
pub fn balance_fences(markdown: &str) -> String {
    let mut open: Option<usize> = None;
    for line in markdown.lines() {
        if let Some(n) = fence_len(line) {
            match open {
                None => open = Some(n),
                Some(o) if n >= o && line.trim().chars().all(|c| c == '`') => open = None,
                Some(_) => {}
            }
        }
    }
    match open {
        Some(n) => format!("{}\n{}", markdown.trim_end(), "`".repeat(n)),
        None => markdown.to_string(),
    }
}

/// Normalise converter output: blank-line runs outside code collapse to one,
/// trailing whitespace is trimmed and open fences are closed.
pub fn sanitize_markdown(markdown: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut open: Option<usize> = None;
    let mut blank_run = false;
    for line in markdown.lines() {
        if let Some(o) = open {
            out.push(line);
            if fence_len(line).is_some_and(|n| n >= o) && line.trim().chars().all(|c| c == '`') {
                open = None;
            }
            continue;
        }
        if let Some(n) = fence_len(line) {
            open = Some(n);
            blank_run = false;
            out.push(line.trim_end());
            continue;
        }
        let line = line.trim_end();
        if line.is_empty() {
            if !blank_run && !out.is_empty() {
                out.push("");
            }
            blank_run = true;
        } else {
            blank_run = false;
            out.push(line);
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    balance_fences(&out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn convert(html: &str) -> String {
        let doc = Html::parse_document(html);
        let filter = NoiseFilter::generic();
        let body = super::super::dom::select_first(&doc, "body", &filter).unwrap();
        MarkdownConverter::new(&filter, "text").convert(body)
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let md = convert(
            "<body><h1>Title</h1><p>Intro text.</p><h2>Basics</h2><p>First   para.</p>\
             <h3>Detail</h3><p>More.</p></body>",
        );
        assert_eq!(
            md,
            "Intro text.\n\n## Basics\n\nFirst para.\n\n### Detail\n\nMore."
        );
    }

    #[test]
    fn test_wrapped_sections() {
        let md = convert(
            r#"<body><div class="mw-heading"><h2>One</h2></div><p>a</p>
               <section><h2>Two</h2><div>loose <b>text</b></div></section></body>"#,
        );
        assert_eq!(md, "## One\n\na\n\n## Two\n\nloose text");
    }

    #[test]
    fn test_lists_nested() {
        let md = convert("<body><ul><li>one</li><li>two<ul><li>inner</li></ul></li></ul></body>");
        assert_eq!(md, "* one\n* two\n  * inner");
    }

    #[test]
    fn test_code_block_language_from_class() {
        let md = convert(r#"<body><pre><code class="language-rust">fn main() {}</code></pre></body>"#);
        assert_eq!(md, "```rust\nfn main() {}\n```");
    }

    #[test]
    fn test_code_block_language_from_parent() {
        let md = convert(
            r#"<body><div class="highlight-python3"><div class="highlight"><pre>x = 1</pre></div></div></body>"#,
        );
        assert_eq!(md, "```python\nx = 1\n```");
    }

    #[test]
    fn test_code_block_language_heuristics() {
        let md = convert("<body><pre>def f(x):\n    return x</pre></body>");
        assert!(md.starts_with("```python\n"));
        let md = convert("<body><pre>function f() { return 1; }</pre></body>");
        assert!(md.starts_with("```javascript\n"));
        let md = convert("<body><pre>SELECT 1</pre></body>");
        assert!(md.starts_with("```text\n"));
    }

    #[test]
    fn test_code_with_backticks_uses_longer_fence() {
        let md = convert("<body><pre>echo ```x```</pre></body>");
        assert_eq!(md, "````text\necho ```x```\n````");
    }

    #[test]
    fn test_table_with_headers() {
        let md = convert(
            "<body><table><tr><th>Name</th><th>Kind</th></tr>\
             <tr><td>a|b</td><td>x</td></tr><tr><td>c</td></tr></table></body>",
        );
        assert_eq!(
            md,
            "| Name | Kind |\n| --- | --- |\n| a\\|b | x |\n| c |  |"
        );
    }

    #[test]
    fn test_table_without_th_uses_first_row() {
        let md = convert("<body><table><tr><td>h</td></tr><tr><td>v</td></tr></table></body>");
        assert_eq!(md, "| h |\n| --- |\n| v |");
    }

    #[test]
    fn test_blockquote_and_image() {
        let doc = Html::parse_document(
            r#"<body><blockquote><p>Quoted.</p></blockquote><p><img src="/i.png" alt="pic"></p></body>"#,
        );
        let filter = NoiseFilter::generic();
        let base = Url::parse("https://example.com/page").unwrap();
        let body = super::super::dom::select_first(&doc, "body", &filter).unwrap();
        let md = MarkdownConverter::new(&filter, "text")
            .with_base(&base)
            .convert(body);
        assert_eq!(md, "> Quoted.\n\n![pic](https://example.com/i.png)");
    }

    #[test]
    fn test_noise_and_empty_elements_skipped() {
        let md = convert(
            "<body><nav><p>menu</p></nav><div class=\"ad\">buy</div><p></p><div> </div><p>kept</p></body>",
        );
        assert_eq!(md, "kept");
    }

    #[test]
    fn test_conversion_is_idempotent() {
        let html = "<body><h2>A</h2><p>x</p><pre>code</pre><ul><li>i</li></ul></body>";
        assert_eq!(convert(html), convert(html));
    }

    #[test]
    fn test_balance_fences() {
        assert_eq!(balance_fences("```py\nx"), "```py\nx\n```");
        assert_eq!(balance_fences("```\nx\n```"), "```\nx\n```");
        assert_eq!(balance_fences("````\n```\n"), "````\n```\n````");
    }

    #[test]
    fn test_sanitize_collapses_blank_runs_outside_code() {
        let md = sanitize_markdown("a\n\n\n\nb  \n```\n\n\nc\n```\n\n");
        assert_eq!(md, "a\n\nb\n```\n\n\nc\n```");
    }
}
