//! Generate command.

use std::path::Path;

use cliche::config::Settings;
use cliche::llm::{try_polish_document, LlmClient};
use cliche::storage::RecordStore;
use cliche::synthesis::MultiSourceSynthesizer;

use super::icons::{dim_arrow, success, warn};

/// Merge the stored records for `topic` and write the document.
pub async fn cmd_generate(
    settings: &Settings,
    topic: &str,
    raw: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let store = RecordStore::new(&settings.scrape_dir, &settings.docs_dir);
    let records = store.load_topic(topic)?;
    eprintln!(
        "{} Loaded {} records for '{}'",
        success(),
        records.len(),
        topic
    );

    let merged = MultiSourceSynthesizer::new(topic).merge(&records);

    let document = if raw || !(settings.enhancement_enabled && settings.llm.enabled) {
        merged
    } else {
        let llm = LlmClient::new(settings.llm.clone())?;
        match try_polish_document(&llm, &merged, topic, settings.llm.max_content_chars).await {
            Ok(polished) => polished,
            Err(e) => {
                eprintln!("{} LLM polishing failed, using merged content: {}", warn(), e);
                merged
            }
        }
    };

    let path = store.write_document(topic, &document, output)?;
    println!("{} Document written", success());
    println!("  {} {}", dim_arrow(), path.display());
    Ok(())
}
