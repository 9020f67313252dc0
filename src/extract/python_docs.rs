//! Python documentation extractor (docs.python.org and python.org).

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use super::dom::{
    collect_links, document_title, element_text, extract_description, select_first, NoiseFilter,
};
use super::markdown::MarkdownConverter;
use super::PageContent;

const NOISE_CLASSES: &[&str] = &["headerlink", "related", "sphinxsidebar", "clearer"];

const FILTER: NoiseFilter = NoiseFilter::with_extras(NOISE_CLASSES, &[]);

const REGION_CANDIDATES: &[&str] = &["div.body", "[role=main]", "#content", ".document"];

static TITLE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*—\s*Python.*$").unwrap());

pub(super) fn can_handle(url: &Url) -> bool {
    url.host_str().is_some_and(is_python_host)
}

fn is_python_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "python.org" || host.ends_with(".python.org")
}

pub(super) fn parse(html: &Html, base: &Url) -> PageContent {
    let region = REGION_CANDIDATES
        .iter()
        .find_map(|css| select_first(html, css, &FILTER))
        .or_else(|| select_first(html, "body", &FILTER))
        .unwrap_or_else(|| html.root_element());

    let title = select_first(html, "h1", &FILTER)
        .map(|h| element_text(h, &FILTER).replace('¶', "").trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            document_title(html).map(|t| TITLE_SUFFIX.replace(&t, "").trim().to_string())
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Python Documentation".to_string());

    let description = extract_description(html, region, "p", &FILTER);
    let main_content = MarkdownConverter::new(&FILTER, "python")
        .with_base(base)
        .convert(region);
    let links = collect_links(region, base, &FILTER, can_handle);

    PageContent {
        title,
        description,
        main_content,
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><head><title>asyncio — Asynchronous I/O — Python 3.12.1 documentation</title></head>
        <body><div class="related"><a href="/3/index.html">index</a></div>
        <div class="document"><div class="body" role="main">
          <section id="asyncio">
            <h1>asyncio — Asynchronous I/O<a class="headerlink" href="#asyncio">¶</a></h1>
            <p>asyncio is a library to write concurrent code.</p>
            <div class="highlight-python3 notranslate"><div class="highlight"><pre>import asyncio

async def main():
    await asyncio.sleep(1)</pre></div></div>
            <section id="runners"><h2>Runners<a class="headerlink" href="#runners">¶</a></h2>
            <pre>asyncio.run(main())</pre>
            <p>See <a href="asyncio-task.html#coroutine">coroutines</a> and
               <a href="https://peps.python.org/pep-0492/">PEP 492</a> and
               <a href="https://github.com/python/cpython">source</a>.</p></section>
          </section>
        </div></div></body></html>"##;

    fn parse_page() -> PageContent {
        let base = Url::parse("https://docs.python.org/3/library/asyncio.html").unwrap();
        parse(&Html::parse_document(PAGE), &base)
    }

    #[test]
    fn test_can_handle() {
        assert!(can_handle(&Url::parse("https://docs.python.org/3/").unwrap()));
        assert!(can_handle(&Url::parse("https://www.python.org/").unwrap()));
        assert!(!can_handle(&Url::parse("https://pypi.org/").unwrap()));
    }

    #[test]
    fn test_title_without_pilcrow() {
        assert_eq!(parse_page().title, "asyncio — Asynchronous I/O");
    }

    #[test]
    fn test_code_defaults_to_python() {
        let content = parse_page();
        assert!(content
            .main_content
            .contains("```python\nimport asyncio\n\nasync def main():\n    await asyncio.sleep(1)\n```"));
        assert!(content.main_content.contains("## Runners\n\n```python\nasyncio.run(main())\n```"));
        assert!(!content.main_content.contains('¶'));
        assert!(!content.main_content.contains("index"));
    }

    #[test]
    fn test_links_stay_on_python_hosts() {
        let urls: Vec<String> = parse_page().links.into_iter().map(|l| l.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://docs.python.org/3/library/asyncio-task.html".to_string(),
                "https://peps.python.org/pep-0492/".to_string(),
            ]
        );
    }
}
