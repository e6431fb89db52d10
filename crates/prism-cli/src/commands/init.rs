//! Project initialization command

use anyhow::Result;
use std::fs;
use std::path::Path;

const CONFIG_TEMPLATE: &str = r#"# Prism project configuration
# Environment variables override this file:
#   PRISM_FAL_API_KEY, PRISM_GEMINI_API_KEY, PRISM_USER

user = "me"

[providers.fal]
# api_key = "..."
api_url = "https://queue.fal.run"
enabled = true

[providers.gemini]
# api_key = "..."
enabled = true

[compare]
poll_interval_secs = 5
poll_timeout_secs = 180
max_prompt_chars = 2000
log_level = "info"

# Local credit balances per user
[credits]
me = 20

# Add or override catalog models
# [[models]]
# model = "fal-ai/flux/schnell"
# label = "Flux Schnell"
# style = "Fast"
# cost = 1
# provider = "fal"
"#;

pub fn run(force: bool) -> Result<()> {
    let prism_dir = Path::new(".prism");
    let config_path = prism_dir.join("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "'{}' already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    fs::create_dir_all(prism_dir.join("ledger"))?;
    fs::write(&config_path, CONFIG_TEMPLATE)?;

    println!("Created {}", config_path.display());
    println!("  Set PRISM_FAL_API_KEY or PRISM_GEMINI_API_KEY, then run:");
    println!("  prism compare \"a cute orange cat\"");
    Ok(())
}
