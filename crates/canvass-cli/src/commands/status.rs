//! Graph status command.

use anyhow::Result;

use canvass_core::config::CanvassConfig;
use canvass_graph::CanvassStore;

use crate::output::{self, OutputFormat};

pub async fn execute(config: &CanvassConfig, format: OutputFormat) -> Result<()> {
    let store = super::connect(config).await?;
    let counts = store.counts().await?;
    output::emit(format, &counts, output::print_graph_counts)
}
