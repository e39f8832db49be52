//! MCP tool definitions and handlers

use crate::protocol::*;
use anyhow::Result;
use serde_json::Value;
use takc_core::{CompressionRate, IngestOptions, KnowledgeService, Query, TakcError};

fn rate_schema(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "enum": ["ultra", "high", "medium", "light"],
        "description": description
    })
}

pub fn query_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "query".to_string(),
        description: "Answer a question from the compressed context of a task type. \
                      The compression rate is picked from the question's complexity \
                      unless one is given."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "task_type": {
                    "type": "string",
                    "description": "Task type the context was compressed for"
                },
                "query": {
                    "type": "string",
                    "description": "Question to answer"
                },
                "rate": rate_schema("Force this compression rate")
            },
            "required": ["task_type", "query"]
        }),
    }
}

pub fn compress_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "compress".to_string(),
        description: "Compress a document for a task type and cache the result at each rate"
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "task_type": {
                    "type": "string",
                    "description": "Task type to store the entries under"
                },
                "text": {
                    "type": "string",
                    "description": "Raw document text"
                },
                "rates": {
                    "type": "array",
                    "items": rate_schema("Compression rate"),
                    "description": "Rates to produce (default: all)"
                },
                "description": {
                    "type": "string",
                    "description": "Task description used to decide what to keep"
                },
                "examples": {
                    "type": "string",
                    "description": "Few-shot examples for the compression prompt"
                }
            },
            "required": ["task_type", "text"]
        }),
    }
}

pub fn cache_get_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "cache_get".to_string(),
        description: "Fetch a cached compressed entry with its metadata".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "task_type": { "type": "string" },
                "rate": rate_schema("Compression rate")
            },
            "required": ["task_type", "rate"]
        }),
    }
}

pub fn cache_list_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "cache_list".to_string(),
        description: "List cached task types and the rates available for each".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "task_type": {
                    "type": "string",
                    "description": "Only list this task type"
                }
            }
        }),
    }
}

pub fn all_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        query_tool_definition(),
        compress_tool_definition(),
        cache_get_tool_definition(),
        cache_list_tool_definition(),
    ]
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing {}", key))
}

fn optional_rate(args: &Value, key: &str) -> Result<Option<CompressionRate>> {
    match args.get(key).and_then(|v| v.as_str()) {
        Some(rate) => Ok(Some(rate.parse()?)),
        None => Ok(None),
    }
}

/// Cache misses are ordinary answers for a client, not protocol failures
fn miss_result(err: &TakcError) -> Option<ToolResult> {
    match err {
        TakcError::CacheMiss { task_type, rate } => Some(ToolResult::error(
            err.to_string(),
            Some(serde_json::json!({
                "error": "cache_miss",
                "task_type": task_type,
                "rate": rate
            })),
        )),
        _ => None,
    }
}

pub async fn handle_query(service: &KnowledgeService, args: Value) -> Result<ToolResult> {
    let task_type = required_str(&args, "task_type")?;
    let text = required_str(&args, "query")?;

    let mut query = Query::new(task_type, text);
    if let Some(rate) = optional_rate(&args, "rate")? {
        query = query.with_rate(rate);
    }

    match service.answer(&query).await {
        Ok(answer) => Ok(ToolResult::text(
            answer.response.clone(),
            Some(serde_json::to_value(&answer)?),
        )),
        Err(e) => miss_result(&e).ok_or_else(|| e.into()),
    }
}

pub async fn handle_compress(service: &KnowledgeService, args: Value) -> Result<ToolResult> {
    let task_type = required_str(&args, "task_type")?;
    let text = required_str(&args, "text")?;

    let rates = match args.get("rates").and_then(|v| v.as_array()) {
        Some(values) => values
            .iter()
            .filter_map(|v| v.as_str())
            .map(|r| r.parse::<CompressionRate>())
            .collect::<takc_core::Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let options = IngestOptions {
        task_description: args
            .get("description")
            .and_then(|v| v.as_str())
            .map(String::from),
        few_shot_examples: args
            .get("examples")
            .and_then(|v| v.as_str())
            .map(String::from),
        rates,
    };

    let run = service.ingest(task_type, text, options).await?;

    let mut summary = format!(
        "Compressed {} ({} tokens):\n",
        run.task_type, run.original_tokens
    );
    for (rate, entry) in &run.entries {
        summary.push_str(&format!(
            "- {}: {} tokens ({:.1}x, {})\n",
            rate,
            entry.metadata.compressed_tokens,
            entry.metadata.achieved_ratio,
            entry.metadata.source
        ));
    }
    for (rate, reason) in &run.failures {
        summary.push_str(&format!("- {}: failed: {}\n", rate, reason));
    }

    let structured = serde_json::json!({
        "task_type": run.task_type,
        "original_tokens": run.original_tokens,
        "entries": run.entries.values().map(|e| serde_json::json!({
            "rate": e.rate,
            "compressed_tokens": e.metadata.compressed_tokens,
            "achieved_ratio": e.metadata.achieved_ratio,
            "target_ratio": e.metadata.target_ratio,
            "source": e.metadata.source,
        })).collect::<Vec<_>>(),
        "failures": run.failures,
    });

    if run.entries.is_empty() {
        return Ok(ToolResult::error(summary, Some(structured)));
    }
    Ok(ToolResult::text(summary, Some(structured)))
}

pub async fn handle_cache_get(service: &KnowledgeService, args: Value) -> Result<ToolResult> {
    let task_type = required_str(&args, "task_type")?;
    let rate: CompressionRate = required_str(&args, "rate")?.parse()?;

    match service.get(task_type, rate).await {
        Ok(entry) => Ok(ToolResult {
            content: vec![Content::Resource {
                resource: ResourceContent {
                    uri: crate::resources::entry_uri(task_type, rate),
                    name: Some(format!("{}/{}", task_type, rate)),
                    mime_type: "text/plain".to_string(),
                    text: entry.compressed_text.clone(),
                },
            }],
            structured_content: Some(serde_json::to_value(&entry)?),
            is_error: None,
        }),
        Err(e) => miss_result(&e).ok_or_else(|| e.into()),
    }
}

pub async fn handle_cache_list(service: &KnowledgeService, args: Value) -> Result<ToolResult> {
    let task_type = args.get("task_type").and_then(|v| v.as_str());
    let pairs = service.list(task_type).await?;

    let mut by_task: std::collections::BTreeMap<&str, Vec<CompressionRate>> = Default::default();
    for (task, rate) in &pairs {
        by_task.entry(task.as_str()).or_default().push(*rate);
    }

    let text = if by_task.is_empty() {
        "No cached entries".to_string()
    } else {
        by_task
            .iter()
            .map(|(task, rates)| {
                let rates: Vec<&str> = rates.iter().map(|r| r.as_str()).collect();
                format!("{}: {}", task, rates.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    Ok(ToolResult::text(
        text,
        Some(serde_json::json!({ "task_types": by_task })),
    ))
}
