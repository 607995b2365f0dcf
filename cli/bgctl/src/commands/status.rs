//! Status command.

use std::borrow::Cow;

use anyhow::Result;
use bluegreen_core::{BlueGreen, CommandRunner, ProcessUnitCount, Transport};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::print_output;

use super::{CommandContext, DEFAULT_TAG_KEY};

/// Status command - show what each application currently serves.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Applications to inspect.
    #[arg(required = true)]
    apps: Vec<String>,

    /// Environment variable holding the deployed tag.
    #[arg(long, default_value = DEFAULT_TAG_KEY)]
    tag_key: String,
}

#[derive(Debug, Serialize)]
struct AppStatus {
    app: String,
    cnames: Vec<String>,
    units: ProcessUnitCount,
    tag: Option<String>,
}

impl Tabled for AppStatus {
    const LENGTH: usize = 4;

    fn fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.app.as_str()),
            Cow::Owned(display_list(&self.cnames)),
            Cow::Owned(display_units(&self.units)),
            Cow::Borrowed(self.tag.as_deref().unwrap_or("-")),
        ]
    }

    fn headers() -> Vec<Cow<'static, str>> {
        vec!["App".into(), "Cnames".into(), "Units".into(), "Tag".into()]
    }
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn display_units(units: &ProcessUnitCount) -> String {
    if units.is_empty() {
        return "-".to_string();
    }
    units
        .iter()
        .map(|(process, count)| format!("{}={}", process, count))
        .collect::<Vec<_>>()
        .join(" ")
}

impl StatusCommand {
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        let bg = ctx.orchestrator()?;
        let rows = self.collect(&bg)?;
        print_output(&rows, ctx.format);
        Ok(())
    }

    fn collect<T: Transport, R: CommandRunner>(
        &self,
        bg: &BlueGreen<T, R>,
    ) -> Result<Vec<AppStatus>> {
        self.apps
            .iter()
            .map(|app| {
                Ok(AppStatus {
                    app: app.clone(),
                    cnames: bg.get_cnames(app)?.unwrap_or_default(),
                    units: bg.total_units(app)?,
                    tag: bg.env_get(app, &self.tag_key)?,
                })
            })
            .collect()
    }
}
