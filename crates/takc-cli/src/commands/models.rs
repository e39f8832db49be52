//! Models command

use crate::app::{ModelsArgs, OutputFormat};
use anyhow::Result;
use takc_core::{Config, VLLMClient};

pub async fn run(args: &ModelsArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let configured = config.resolve_model(&config.llm_service.model);

    let (check, metrics) = if args.check {
        let client = VLLMClient::new(config.llm_service.clone())?.with_model(configured.clone());
        let result = client.ping().await.map_err(|e| e.to_string());
        (Some(result), Some(client.metrics()))
    } else {
        (None, None)
    };

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "url": config.llm_service.url,
                "configured": configured,
                "models": config.models,
                "reachable": check.as_ref().map(|r| r.is_ok()),
                "error": check.as_ref().and_then(|r| r.as_ref().err()),
                "metrics": metrics,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Cli => {
            for (name, id) in &config.models {
                let marker = if *id == configured { "*" } else { " " };
                println!("{} {:<16} {}", marker, name, id);
            }
            if !config.models.values().any(|id| *id == configured) {
                println!("* {:<16} {}", "(custom)", configured);
            }
            println!();
            println!("Service: {}", config.llm_service.url);
        }
    }

    match check {
        Some(Ok(())) => {
            if matches!(format, OutputFormat::Cli) {
                let latency = metrics.map(|m| m.avg_latency_ms).unwrap_or_default();
                println!("Model {} is reachable ({:.0} ms)", configured, latency);
            }
            Ok(())
        }
        Some(Err(e)) => anyhow::bail!("Model {} is not reachable: {}", configured, e),
        None => Ok(()),
    }
}
