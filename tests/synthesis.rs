//! Multi-source merge tests, including the optional polishing step.

use async_trait::async_trait;

use cliche::llm::{polish_document, EnhancementError, LlmEnhancer, LlmError};
use cliche::models::ScrapedRecord;
use cliche::synthesis::MultiSourceSynthesizer;

fn record(url: &str, title: &str, description: &str, content: &str) -> ScrapedRecord {
    ScrapedRecord::new(url, title)
        .with_description(description)
        .with_content(content)
}

fn asyncio_records() -> Vec<ScrapedRecord> {
    vec![
        // Lower relevance, listed first so the merge has to reorder.
        record(
            "https://b.example/events",
            "Event loops",
            "Background reading.",
            "## Basic\n\nAsyncio is a library for concurrent code. It uses event loops to schedule coroutines.",
        ),
        record(
            "https://a.example/asyncio",
            "Python asyncio",
            "Python asyncio explained.",
            "Python asyncio in depth: python asyncio tasks and python asyncio streams.\n\n\
             ## Basics\n\nAsyncio is a library for concurrent code.",
        ),
    ]
}

#[test]
fn test_similar_sections_merge_with_sentence_dedup() {
    let doc = MultiSourceSynthesizer::new("Python asyncio").merge(&asyncio_records());

    assert!(doc.starts_with("# Comprehensive Guide: Python asyncio\n\n## Introduction\n\nPython asyncio explained."));
    assert_eq!(doc.matches(" {#").count(), 1, "expected a single merged section:\n{doc}");
    assert!(doc.contains("1. [Basics](#basics)"));

    let start = doc.find("## Basics {#basics}").unwrap();
    let section = &doc[start..];
    assert_eq!(section.matches("Asyncio is a library for concurrent code.").count(), 1);
    assert_eq!(section.matches("It uses event loops to schedule coroutines.").count(), 1);
    assert!(section.contains("**Sources:** [[1]](https://a.example/asyncio) [[2]](https://b.example/events)"));
}

#[test]
fn test_every_source_referenced_once() {
    let doc = MultiSourceSynthesizer::new("Python asyncio").merge(&asyncio_records());
    let references = &doc[doc.find("## References").unwrap()..];

    assert_eq!(references.matches("- [").count(), 2);
    assert_eq!(references.matches("https://a.example/asyncio").count(), 1);
    assert_eq!(references.matches("https://b.example/events").count(), 1);
}

#[test]
fn test_merge_is_deterministic() {
    let records = asyncio_records();
    let synthesizer = MultiSourceSynthesizer::new("Python asyncio");
    assert_eq!(synthesizer.merge(&records), synthesizer.merge(&records));
}

#[test]
fn test_synthesized_conclusion_names_sections() {
    let doc = MultiSourceSynthesizer::new("Python asyncio").merge(&asyncio_records());
    assert!(doc.contains("## Conclusion"));
    assert!(doc.contains("key aspects including Basics"));
}

#[test]
fn test_sentence_dedup_spans_sections_and_sources() {
    let shared = "Coroutines yield control back to the event loop.";
    let records = vec![
        record(
            "https://a.example/guide",
            "Guide",
            "A guide.",
            &format!(
                "## Alpha\n\n{shared} Alpha has its own sentence here.\n\n\
                 ## Zeta\n\n{shared} Zeta has its own sentence here."
            ),
        ),
        record(
            "https://b.example/notes",
            "Notes",
            "Some notes.",
            &format!("## Memory\n\n{shared} Memory has its own sentence here."),
        ),
    ];

    let doc = MultiSourceSynthesizer::new("coroutines").merge(&records);

    assert_eq!(doc.matches(shared).count(), 1, "{doc}");
    for heading in ["## Alpha {#alpha}", "## Zeta {#zeta}", "## Memory {#memory}"] {
        assert!(doc.contains(heading), "missing {heading}:\n{doc}");
    }
    for own in ["Alpha has its own", "Zeta has its own", "Memory has its own"] {
        assert_eq!(doc.matches(own).count(), 1);
    }
}

struct Unreachable;

#[async_trait]
impl LlmEnhancer for Unreachable {
    async fn enhance(&self, _prompt: &str) -> Result<String, EnhancementError> {
        Err(LlmError::Connection("connection refused".into()).into())
    }
}

struct Rewriter;

#[async_trait]
impl LlmEnhancer for Rewriter {
    async fn enhance(&self, _prompt: &str) -> Result<String, EnhancementError> {
        Ok("```markdown\n# Polished guide\n\nBetter prose.\n```".to_string())
    }
}

#[tokio::test]
async fn test_polish_falls_back_to_merge() {
    let merged = MultiSourceSynthesizer::new("Python asyncio").merge(&asyncio_records());
    let doc = polish_document(&Unreachable, &merged, "Python asyncio", 12000).await;
    assert_eq!(doc, merged);
}

#[tokio::test]
async fn test_polish_unwraps_markdown_fence() {
    let merged = MultiSourceSynthesizer::new("Python asyncio").merge(&asyncio_records());
    let doc = polish_document(&Rewriter, &merged, "Python asyncio", 12000).await;
    assert_eq!(doc, "# Polished guide\n\nBetter prose.");
}
