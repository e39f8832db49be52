//! MCP server implementation

use crate::protocol::*;
use crate::{resources, tools};
use anyhow::Result;
use takc_core::KnowledgeService;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

pub struct McpServer<'a> {
    service: &'a KnowledgeService,
}

impl<'a> McpServer<'a> {
    pub fn new(service: &'a KnowledgeService) -> Self {
        Self { service }
    }

    /// Serve newline-delimited JSON-RPC over stdin/stdout
    pub async fn run(&self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = BufWriter::new(tokio::io::stdout());
        self.serve(reader, writer).await
    }

    /// Serve until `reader` reaches EOF
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let response = JsonRpcResponse::error(
                        None,
                        error_codes::PARSE_ERROR,
                        &format!("Parse error: {}", e),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            if request.is_notification() {
                tracing::debug!(method = %request.method, "Notification received");
                continue;
            }

            let response = self.handle_request(&request).await;
            write_response(&mut writer, &response).await?;
        }

        Ok(())
    }

    pub async fn handle_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "Request received");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "ping" => JsonRpcResponse::success(request.id.clone(), serde_json::json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "resources/list" => self.handle_resources_list(request).await,
            "resources/read" => self.handle_resources_read(request).await,
            _ => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": { "subscribe": false }
            },
            "serverInfo": {
                "name": "takc",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        JsonRpcResponse::success(request.id.clone(), result)
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(
            request.id.clone(),
            serde_json::json!({ "tools": tools::all_tool_definitions() }),
        )
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(name) = request.params.get("name").and_then(|v| v.as_str()) else {
            return JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                "Missing tool name",
            );
        };

        let arguments = request
            .params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::json!({}));

        let result = match name {
            "query" => tools::handle_query(self.service, arguments).await,
            "compress" => tools::handle_compress(self.service, arguments).await,
            "cache_get" => tools::handle_cache_get(self.service, arguments).await,
            "cache_list" => tools::handle_cache_list(self.service, arguments).await,
            _ => {
                return JsonRpcResponse::error(
                    request.id.clone(),
                    error_codes::INVALID_PARAMS,
                    &format!("Unknown tool: {}", name),
                )
            }
        };

        let tool_result = result.unwrap_or_else(|e| {
            tracing::warn!(tool = name, "Tool call failed: {:#}", e);
            ToolResult::error(format!("{:#}", e), None)
        });

        JsonRpcResponse::from_serializable(request.id.clone(), &tool_result)
    }

    async fn handle_resources_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        match resources::list_resources(self.service).await {
            Ok(list) => JsonRpcResponse::success(
                request.id.clone(),
                serde_json::json!({ "resources": list }),
            ),
            Err(e) => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INTERNAL_ERROR,
                &format!("{:#}", e),
            ),
        }
    }

    async fn handle_resources_read(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(uri) = request.params.get("uri").and_then(|v| v.as_str()) else {
            return JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INVALID_PARAMS,
                "Missing uri",
            );
        };

        match resources::read_resource(self.service, uri).await {
            Ok(Some(content)) => JsonRpcResponse::success(
                request.id.clone(),
                serde_json::json!({ "contents": [content] }),
            ),
            Ok(None) => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::RESOURCE_NOT_FOUND,
                &format!("Resource not found: {}", uri),
            ),
            Err(e) => JsonRpcResponse::error(
                request.id.clone(),
                error_codes::INTERNAL_ERROR,
                &format!("{:#}", e),
            ),
        }
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

pub async fn start_server(service: &KnowledgeService) -> Result<()> {
    tracing::info!("Starting MCP server on stdio");
    let server = McpServer::new(service);
    server.run().await
}
