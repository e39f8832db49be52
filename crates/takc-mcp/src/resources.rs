//! MCP resources: one per cached (task type, rate) entry

use crate::protocol::{ResourceContent, ResourceDescriptor};
use anyhow::Result;
use takc_core::{CompressionRate, KnowledgeService, RESOURCE_URI_PREFIX};

pub fn entry_uri(task_type: &str, rate: CompressionRate) -> String {
    format!("{}{}/{}", RESOURCE_URI_PREFIX, task_type, rate)
}

/// Split `takc://{task_type}/{rate}`
pub fn parse_uri(uri: &str) -> Option<(String, CompressionRate)> {
    let rest = uri.strip_prefix(RESOURCE_URI_PREFIX)?;
    let (task_type, rate) = rest.split_once('/')?;
    if task_type.is_empty() || rate.contains('/') {
        return None;
    }
    Some((task_type.to_string(), rate.parse().ok()?))
}

pub async fn list_resources(service: &KnowledgeService) -> Result<Vec<ResourceDescriptor>> {
    let pairs = service.list(None).await?;

    Ok(pairs
        .into_iter()
        .map(|(task_type, rate)| ResourceDescriptor {
            uri: entry_uri(&task_type, rate),
            name: format!("{}/{}", task_type, rate),
            description: Some(format!(
                "{} context compressed {}x",
                task_type,
                rate.target_ratio()
            )),
            mime_type: "text/plain".to_string(),
        })
        .collect())
}

/// Read one entry; `Ok(None)` when the URI is malformed or nothing is cached
pub async fn read_resource(
    service: &KnowledgeService,
    uri: &str,
) -> Result<Option<ResourceContent>> {
    let Some((task_type, rate)) = parse_uri(uri) else {
        return Ok(None);
    };

    match service.get(&task_type, rate).await {
        Ok(entry) => Ok(Some(ResourceContent {
            uri: uri.to_string(),
            name: Some(format!("{}/{}", task_type, rate)),
            mime_type: "text/plain".to_string(),
            text: entry.compressed_text,
        })),
        Err(takc_core::TakcError::CacheMiss { .. }) => Ok(None),
        Err(takc_core::TakcError::InvalidInput(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
