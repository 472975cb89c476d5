//! `taskpool order <sequence>`

use anyhow::Result;
use clap::Args;

use super::ConfigLocation;

#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Comma-separated group ids, e.g. "2,1,3". Blank entries are dropped;
    /// repeating an id runs that group again.
    pub sequence: String,
}

impl OrderArgs {
    pub fn run(self, location: &ConfigLocation) -> Result<()> {
        let mut config = location.load()?;
        config.set_group_order(&self.sequence);
        location.save(&config)?;

        let order = config.group_order();
        if order.is_empty() {
            println!("✓ Group order cleared; `taskpool run` will execute nothing");
        } else {
            println!("✓ Group order: {order}");
        }

        let unscheduled: Vec<String> = config
            .tasks
            .iter()
            .map(|t| t.group_id().to_string())
            .filter(|g| !order.iter().any(|token| token == g))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        if !unscheduled.is_empty() {
            println!(
                "  Groups with tasks that will not run: {}",
                unscheduled.join(", ")
            );
        }
        Ok(())
    }
}
