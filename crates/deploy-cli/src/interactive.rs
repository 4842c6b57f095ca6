//! Interactive prompts.
//!
//! `deploy init` collects a profile; create/update ask for the value of
//! every tag declared without one. Uses dialoguer for terminal UI prompts.

use std::io::{self, Write};

use anyhow::Result;
use console::style;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use deploy_core::commands::InitOptions;
use deploy_core::config::merge::{DEFAULT_PROFILE, DEFAULT_REGION};
use deploy_core::tags::{Tag, TagSet};

/// Pre-filled values from CLI args that skip prompts.
#[derive(Debug, Clone, Default)]
pub struct PrefilledInit {
    /// Profile name - if Some, skip profile prompt
    pub profile: Option<String>,
    /// Region - if Some, skip region prompt
    pub region: Option<String>,
}

/// Collects the values written by `deploy init`.
pub struct InitWizard<W: Write = io::Stdout> {
    prefilled: PrefilledInit,
    /// Output writer (for testing)
    writer: W,
    theme: ColorfulTheme,
}

impl InitWizard<io::Stdout> {
    pub fn new(prefilled: PrefilledInit) -> Self {
        Self {
            prefilled,
            writer: io::stdout(),
            theme: ColorfulTheme::default(),
        }
    }
}

impl<W: Write> InitWizard<W> {
    #[cfg(test)]
    pub fn with_writer(prefilled: PrefilledInit, writer: W) -> Self {
        Self {
            prefilled,
            writer,
            theme: ColorfulTheme::default(),
        }
    }

    /// Prompt for every value not supplied on the command line.
    pub fn collect(&mut self) -> Result<InitOptions> {
        self.print_header()?;

        let profile = match &self.prefilled.profile {
            Some(profile) => profile.clone(),
            None => Input::with_theme(&self.theme)
                .with_prompt("profile")
                .default(DEFAULT_PROFILE.to_string())
                .interact_text()?,
        };
        let region = match &self.prefilled.region {
            Some(region) => region.clone(),
            None => Input::with_theme(&self.theme)
                .with_prompt("region")
                .default(DEFAULT_REGION.to_string())
                .interact_text()?,
        };
        let account_id: String = Input::with_theme(&self.theme)
            .with_prompt("accountId")
            .interact_text()?;
        let access_key_id: String = Input::with_theme(&self.theme)
            .with_prompt("accessKeyId")
            .interact_text()?;
        let secret_access_key = Password::with_theme(&self.theme)
            .with_prompt("secretAccessKey")
            .interact()?;
        let github = Password::with_theme(&self.theme)
            .with_prompt("GitHub token (optional)")
            .allow_empty_password(true)
            .interact()?;

        Ok(InitOptions {
            profile,
            region,
            account_id,
            access_key_id,
            secret_access_key,
            github: Some(github),
        })
    }

    fn print_header(&mut self) -> Result<()> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", style("  Deploy Profile Setup").bold().cyan())?;
        writeln!(self.writer)?;
        Ok(())
    }
}

/// Ask for the value of each tag that has none.
pub fn prompt_tag_values(tags: &mut TagSet) -> Result<()> {
    let theme = ColorfulTheme::default();
    fill_tag_values(tags, |key| {
        Ok(Input::with_theme(&theme)
            .with_prompt(format!("Value for tag {}", key))
            .interact_text()?)
    })
}

fn fill_tag_values<F>(tags: &mut TagSet, mut answer: F) -> Result<()>
where
    F: FnMut(&str) -> Result<String>,
{
    let keys: Vec<String> = tags.unvalued().map(str::to_string).collect();
    for key in keys {
        let value = answer(&key)?;
        tags.insert(Tag::pair(key, value));
    }
    Ok(())
}
