//! `taskpool init [--force]`

use anyhow::{bail, Result};
use clap::Args;

use taskpool_core::TaskPoolConfig;

use super::ConfigLocation;

/// Create an empty config file with the default group order.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, location: &ConfigLocation) -> Result<()> {
        if location.path().exists() && !self.force {
            bail!(
                "{} already exists; pass --force to overwrite it",
                location.display()
            );
        }

        let config = TaskPoolConfig::default();
        location.save(&config)?;

        println!("✓ Created {}", location.display());
        println!("  Group order: {}", config.group_order());
        Ok(())
    }
}
