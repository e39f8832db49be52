//! MCP server tests driven over in-memory transports

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use takc_core::cache::{MemoryFastTier, SqliteObjectStore, TieredCache};
use takc_core::llm::{CompletionRequest, LLMClient};
use takc_core::{Config, KnowledgeService, Result};
use takc_mcp::McpServer;

/// Keeps the first words of the context; answers questions with a fixed line
struct StubService;

#[async_trait]
impl LLMClient for StubService {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let prompt = request.prompt_text();
        if prompt.contains("QUESTION:") {
            return Ok("Margins improved to 18%.".to_string());
        }
        let context = prompt
            .split("CONTEXT TO COMPRESS:")
            .nth(1)
            .unwrap_or_default();
        Ok(context.split_whitespace().take(5).collect::<Vec<_>>().join(" "))
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

fn service() -> KnowledgeService {
    let mut config = Config::default();
    config.compression.base_delay_ms = 1;
    let cache = Arc::new(TieredCache::new(
        Arc::new(MemoryFastTier::new()),
        Arc::new(SqliteObjectStore::open_in_memory().unwrap()),
    ));
    KnowledgeService::new(config, Arc::new(StubService), cache)
}

fn report() -> String {
    "Operating margin improved to 18% as cloud costs fell across the year. ".repeat(40)
}

/// Feed newline-delimited requests and collect the responses
async fn exchange(service: &KnowledgeService, requests: &[Value]) -> Vec<Value> {
    let input: String = requests
        .iter()
        .map(|r| format!("{}\n", r))
        .collect();
    let mut output = Vec::new();

    McpServer::new(service)
        .serve(input.as_bytes(), &mut output)
        .await
        .unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn call(id: u64, tool: &str, arguments: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments }
    })
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let service = service();
    let responses = exchange(
        &service,
        &[
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ],
    )
    .await;

    // The notification gets no reply
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "takc");
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");

    let names: Vec<&str> = responses[1]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["query", "compress", "cache_get", "cache_list"]);
}

#[tokio::test]
async fn test_compress_then_query() {
    let service = service();
    let responses = exchange(
        &service,
        &[
            call(
                1,
                "compress",
                serde_json::json!({"task_type": "finance", "text": report(), "rates": ["high", "light"]}),
            ),
            call(
                2,
                "query",
                serde_json::json!({"task_type": "finance", "query": "Analyze the margin trend"}),
            ),
            call(3, "cache_list", serde_json::json!({})),
        ],
    )
    .await;

    let compressed = &responses[0]["result"];
    assert!(compressed.get("isError").is_none());
    assert_eq!(compressed["structuredContent"]["entries"].as_array().unwrap().len(), 2);

    let answered = &responses[1]["result"];
    assert_eq!(answered["content"][0]["text"], "Margins improved to 18%.");
    assert_eq!(answered["structuredContent"]["rate_used"], "light");

    let listed = &responses[2]["result"];
    assert_eq!(listed["content"][0]["text"], "finance: high, light");
}

#[tokio::test]
async fn test_query_miss_is_reported_in_band() {
    let service = service();
    let responses = exchange(
        &service,
        &[call(
            1,
            "query",
            serde_json::json!({"task_type": "legal", "query": "What is the cap?"}),
        )],
    )
    .await;

    let result = &responses[0]["result"];
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"], "cache_miss");
    assert_eq!(result["structuredContent"]["task_type"], "legal");
}

#[tokio::test]
async fn test_bad_arguments_and_unknown_tool() {
    let service = service();
    let responses = exchange(
        &service,
        &[
            call(1, "cache_get", serde_json::json!({"task_type": "finance", "rate": "extreme"})),
            call(2, "search", serde_json::json!({})),
            serde_json::json!({"jsonrpc": "2.0", "id": 3, "method": "prompts/list"}),
        ],
    )
    .await;

    assert_eq!(responses[0]["result"]["isError"], true);
    let text = responses[0]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("Unknown compression rate"));

    assert_eq!(responses[1]["error"]["code"], -32602);
    assert_eq!(responses[2]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_resources_list_and_read() {
    let service = service();
    let responses = exchange(
        &service,
        &[
            call(
                1,
                "compress",
                serde_json::json!({"task_type": "finance", "text": report(), "rates": ["medium"]}),
            ),
            serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}),
            serde_json::json!({
                "jsonrpc": "2.0", "id": 3, "method": "resources/read",
                "params": {"uri": "takc://finance/medium"}
            }),
            serde_json::json!({
                "jsonrpc": "2.0", "id": 4, "method": "resources/read",
                "params": {"uri": "takc://finance/ultra"}
            }),
        ],
    )
    .await;

    let listed = responses[1]["result"]["resources"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["uri"], "takc://finance/medium");
    assert_eq!(listed[0]["mimeType"], "text/plain");

    let contents = &responses[2]["result"]["contents"][0];
    assert_eq!(contents["uri"], "takc://finance/medium");
    assert_eq!(contents["text"], "Operating margin improved to 18%");

    assert_eq!(responses[3]["error"]["code"], -32002);
}

#[tokio::test]
async fn test_parse_error_keeps_serving() {
    let service = service();
    let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n";
    let mut output = Vec::new();

    McpServer::new(&service)
        .serve(input.as_bytes(), &mut output)
        .await
        .unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["error"]["code"], -32700);
    assert_eq!(lines[1]["id"], 7);
    assert!(lines[1]["result"].is_object());
}
