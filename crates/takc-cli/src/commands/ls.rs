//! List cached entries command

use crate::app::{LsArgs, OutputFormat};
use crate::output;
use anyhow::Result;
use serde::Serialize;
use takc_core::{CompressionRate, KnowledgeService};

#[derive(Serialize)]
struct Listed<'a> {
    task_type: &'a str,
    rate: CompressionRate,
}

pub async fn run(args: LsArgs, service: &KnowledgeService, format: OutputFormat) -> Result<()> {
    let pairs = service.list(args.task_type.as_deref()).await?;

    match format {
        OutputFormat::Json => {
            let listed: Vec<Listed> = pairs
                .iter()
                .map(|(task_type, rate)| Listed {
                    task_type,
                    rate: *rate,
                })
                .collect();
            output::json::print(&listed)
        }
        OutputFormat::Cli => Ok(output::terminal::print_listing(&pairs)?),
    }
}
