//! MCP (Model Context Protocol) server implementation

use async_trait::async_trait;
use rust_mcp_schema::{
    schema_utils::CallToolError, CallToolRequest, CallToolResult, ContentBlock, Implementation,
    InitializeResult, ListToolsRequest, ListToolsResult, RpcError, ServerCapabilities,
    ServerCapabilitiesTools, TextContent, Tool, ToolInputSchema, LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{mcp_server::ServerHandler, McpServer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::pipeline::Text2Sql;

/// scopeql MCP Server Handler
pub struct ScopeqlServerHandler {
    pipeline: Arc<Text2Sql>,
}

fn string_property(description: &str) -> Map<String, Value> {
    let mut prop = Map::new();
    prop.insert("type".to_string(), Value::String("string".to_string()));
    prop.insert("description".to_string(), Value::String(description.to_string()));
    prop
}

fn text_result(text: String, is_error: bool) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::TextContent(TextContent::new(text, None, None))],
        is_error: Some(is_error).filter(|e| *e),
        meta: None,
        structured_content: None,
    }
}

fn required_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, CallToolError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CallToolError::from_message(format!("Missing required argument: {}", name)))
}

impl ScopeqlServerHandler {
    pub fn new(pipeline: Arc<Text2Sql>) -> Self {
        Self { pipeline }
    }

    /// Create server initialization details
    pub fn server_info() -> InitializeResult {
        InitializeResult {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools { list_changed: None }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "scopeql-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("scopeql tenant-scoped natural language queries".to_string()),
            },
            instructions: Some(
                "scopeql - answer questions about one tenant's shop data. \
                 Use the 'ask' tool with the question and the tenant schema."
                    .to_string(),
            ),
            meta: None,
        }
    }

    /// Define available MCP tools
    fn tools() -> Vec<Tool> {
        let mut tools = Vec::new();

        // Ask tool
        {
            let mut properties = HashMap::new();
            properties.insert(
                "question".to_string(),
                string_property("Natural language question (e.g., 'how many customers signed up this month')"),
            );
            properties.insert(
                "tenant".to_string(),
                string_property("Tenant schema the question is scoped to"),
            );

            tools.push(Tool {
                name: "ask".to_string(),
                description: Some(
                    "Answer a question about one tenant's data. The question is turned into a \
                     single SELECT, checked, and run inside the tenant schema. Returns the SQL, \
                     rows, and a plain-language explanation, or an error."
                        .to_string(),
                ),
                input_schema: ToolInputSchema::new(
                    vec!["question".to_string(), "tenant".to_string()],
                    Some(properties),
                ),
                title: None,
                annotations: None,
                meta: None,
                output_schema: None,
            });
        }

        // Schema tool
        tools.push(Tool {
            name: "schema".to_string(),
            description: Some(
                "List the tables and columns shared by every tenant schema.".to_string(),
            ),
            input_schema: ToolInputSchema::new(vec![], Some(HashMap::new())),
            title: None,
            annotations: None,
            meta: None,
            output_schema: None,
        });

        tools
    }
}

#[async_trait]
impl ServerHandler for ScopeqlServerHandler {
    async fn handle_list_tools_request(
        &self,
        _request: ListToolsRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<ListToolsResult, RpcError> {
        info!("Listing available tools");

        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn handle_call_tool_request(
        &self,
        request: CallToolRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        info!("Tool called: {}", request.params.name);

        match request.params.name.as_str() {
            "ask" => self.handle_ask_tool(request.params.arguments).await,
            "schema" => self.handle_schema_tool().await,
            _ => Err(CallToolError::unknown_tool(request.params.name.clone())),
        }
    }
}

impl ScopeqlServerHandler {
    async fn handle_ask_tool(
        &self,
        arguments: Option<Map<String, Value>>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        let args = arguments.ok_or_else(|| CallToolError::from_message("Missing arguments"))?;
        let question = required_str(&args, "question")?;
        let tenant = required_str(&args, "tenant")?;

        let attempt = self.pipeline.process_question(question, tenant).await;
        let response = attempt.to_response();

        let text = serde_json::to_string_pretty(&response).map_err(|e| {
            error!("Failed to serialize response: {}", e);
            CallToolError::from_message(format!("Failed to serialize response: {}", e))
        })?;

        Ok(text_result(text, !attempt.is_success()))
    }

    async fn handle_schema_tool(&self) -> std::result::Result<CallToolResult, CallToolError> {
        let info = self.pipeline.schema_info().await.map_err(|e| {
            error!("Failed to load schema: {}", e);
            CallToolError::from_message(e.to_string())
        })?;

        let text = serde_json::to_string_pretty(&info)
            .map_err(|e| CallToolError::from_message(format!("Failed to serialize schema: {}", e)))?;

        Ok(text_result(text, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_are_ask_and_schema() {
        let tools = ScopeqlServerHandler::tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["ask", "schema"]);

        let schema = serde_json::to_value(&tools[0].input_schema).unwrap();
        assert_eq!(schema["required"], serde_json::json!(["question", "tenant"]));
    }

    #[test]
    fn test_error_results_are_flagged() {
        assert_eq!(text_result("{}".to_string(), true).is_error, Some(true));
        assert_eq!(text_result("{}".to_string(), false).is_error, None);
    }
}
