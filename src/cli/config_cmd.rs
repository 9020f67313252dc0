//! Configuration commands.

use console::style;

use cliche::config::Settings;

use super::icons::dim_arrow;

/// Print the resolved settings as JSON, with secrets masked.
pub fn cmd_config_show(settings: &Settings) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&settings.redacted())?;
    println!("{}", json);
    Ok(())
}

/// Print the config file in use and the data directories.
pub fn cmd_config_path(settings: &Settings) -> anyhow::Result<()> {
    match settings.config_path {
        Some(ref path) => println!("{}", path.display()),
        None => println!("{}", style("No config file found, using defaults").dim()),
    }
    println!("  {} Records: {}", dim_arrow(), settings.scrape_dir.display());
    println!("  {} Documents: {}", dim_arrow(), settings.docs_dir.display());
    Ok(())
}
