use anyhow::{Context, Result};
use dialoguer::FuzzySelect;
use dialoguer::theme::ColorfulTheme;

/// Show a fuzzy picker over tunnel names and return the chosen one.
pub fn pick_tunnel(prompt: &str, names: &[String]) -> Result<String> {
    if names.is_empty() {
        anyhow::bail!("no tunnels available");
    }

    let idx = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(names)
        .default(0)
        .interact()
        .context("selection cancelled")?;
    Ok(names[idx].clone())
}
