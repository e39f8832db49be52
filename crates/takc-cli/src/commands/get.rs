//! Get cached entry command

use crate::app::{GetArgs, OutputFormat};
use crate::output;
use anyhow::Result;
use takc_core::{CompressionRate, KnowledgeService};

pub async fn run(args: GetArgs, service: &KnowledgeService, format: OutputFormat) -> Result<()> {
    let rate: CompressionRate = args.rate.parse()?;
    let entry = service.get(&args.task_type, rate).await?;
    output::emit(&entry, format, |e| {
        output::terminal::print_entry(e, args.metadata)
    })
}
