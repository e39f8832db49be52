//! Compress command

use crate::app::{CompressArgs, OutputFormat};
use crate::output;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use takc_core::{CompressionRate, CompressionStrategy, Config, IngestOptions, KnowledgeService};

/// Apply per-invocation overrides before the service is built
pub fn configure(args: &CompressArgs, config: &mut Config) -> Result<()> {
    if let Some(strategy) = &args.strategy {
        config.compression.strategy = strategy.parse::<CompressionStrategy>()?;
    }
    if let Some(model) = &args.model {
        config.llm_service.model = model.clone();
    }
    Ok(())
}

pub async fn run(args: CompressArgs, service: &KnowledgeService, format: OutputFormat) -> Result<()> {
    let rates = args
        .rates
        .iter()
        .filter(|r| !r.trim().is_empty())
        .map(|r| r.parse::<CompressionRate>())
        .collect::<takc_core::Result<Vec<_>>>()?;

    let text = match args.input.as_deref() {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let few_shot_examples = match &args.examples {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };

    let options = IngestOptions {
        task_description: args.description.clone(),
        few_shot_examples,
        rates,
    };

    let run = service.ingest(&args.task_type, &text, options).await?;
    output::emit(&run, format, output::terminal::print_run)?;

    if !run.is_complete() {
        anyhow::bail!(
            "{} of {} rate(s) failed for {}",
            run.failures.len(),
            run.failures.len() + run.entries.len(),
            run.task_type
        );
    }
    Ok(())
}
