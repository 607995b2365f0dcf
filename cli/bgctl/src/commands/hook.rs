//! Hook command (run one hook by hand).

use anyhow::{bail, Result};
use clap::Args;

use crate::output::{print_info, print_success};

use super::{parse_env_pairs, CommandContext};

/// Hook command - run a configured hook outside of a deploy.
#[derive(Debug, Args)]
pub struct HookCommand {
    /// Hook name (e.g. pre-swap, post-swap).
    name: String,

    /// Extra environment variable in format KEY=VALUE.
    /// Can be specified multiple times.
    #[arg(long = "env", short = 'e')]
    env: Vec<String>,
}

impl HookCommand {
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        let env = parse_env_pairs(&self.env)?;
        let bg = ctx.orchestrator()?;

        if bg.session().hooks().command(&self.name).is_none() {
            print_info(&format!("No '{}' hook configured; nothing to run", self.name));
            return Ok(());
        }

        if !bg.run_hook(&self.name, &env) {
            bail!("The '{}' hook failed", self.name);
        }

        print_success(&format!("Ran '{}' hook", self.name));
        Ok(())
    }
}
