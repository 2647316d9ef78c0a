use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParam, ClientCapabilities, ClientInfo, Implementation};
use rmcp::transport::SseClientTransport;
use token_swap_mcp::config::Config;
use token_swap_mcp::{LoadTokenRequest, Protocol, SwapTokensRequest};

/// Walks through a full session against a running server:
/// 1. connect the configured wallet
/// 2. load WETH and USDC with the account's balances
/// 3. swap the configured default amount of WETH to USDC on V3
/// 4. swap 0.01 WETH to USDC on V2
/// 5. read the notification feed and disconnect
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_yaml("config/default.yaml").await?;
    let uri = format!("http://localhost:{}/trading/sse", config.server.port);

    let transport = SseClientTransport::start(uri.as_str()).await?;

    let client_info = ClientInfo {
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "token-swap-client".to_string(),
            version: "0.1.0".to_string(),
            ..Default::default()
        },
    };

    let client = client_info
        .serve(transport)
        .await
        .inspect_err(|e| {
            eprintln!("client error: {e:?}");
        })?;

    println!("✓ Connected to MCP server at {}\n", uri);

    println!("=== Listing available tools ===");
    let tools_response = client.list_tools(None).await?;
    for tool in &tools_response.tools {
        let desc = tool
            .description
            .as_ref()
            .map(|s| s.as_ref())
            .unwrap_or("No description");
        println!("  - {}: {}", tool.name, desc);
    }
    println!();

    println!("=== Connecting wallet ===");
    let connect_result = client
        .call_tool(CallToolRequestParam {
            name: "connect_wallet".into(),
            arguments: None,
        })
        .await?;
    println!("{}\n", serde_json::to_string_pretty(&connect_result)?);

    for token in ["WETH", "USDC"] {
        println!("=== Loading {token} ===");
        let request = LoadTokenRequest {
            token: token.to_string(),
            owner: None,
        };
        let arguments = serde_json::to_value(&request)?.as_object().cloned();

        let load_result = client
            .call_tool(CallToolRequestParam {
                name: "load_token".into(),
                arguments,
            })
            .await?;
        println!("{}\n", serde_json::to_string_pretty(&load_result)?);
    }

    println!("=== Swapping WETH -> USDC on V3 (configured amount) ===");
    let v3_request = SwapTokensRequest {
        from_token: "WETH".to_string(),
        to_token: "USDC".to_string(),
        fee_tier: Some(500),
        ..Default::default()
    };
    let arguments = serde_json::to_value(&v3_request)?.as_object().cloned();

    let v3_result = client
        .call_tool(CallToolRequestParam {
            name: "swap_tokens".into(),
            arguments,
        })
        .await?;
    println!("{}\n", serde_json::to_string_pretty(&v3_result)?);

    println!("=== Swapping 0.01 WETH -> USDC on V2 ===");
    let v2_request = SwapTokensRequest {
        from_token: "WETH".to_string(),
        to_token: "USDC".to_string(),
        amount: Some("0.01".to_string()),
        slippage_tolerance: Some("1".to_string()),
        protocol: Some(Protocol::V2),
        ..Default::default()
    };
    let arguments = serde_json::to_value(&v2_request)?.as_object().cloned();

    let v2_result = client
        .call_tool(CallToolRequestParam {
            name: "swap_tokens".into(),
            arguments,
        })
        .await?;
    println!("{}\n", serde_json::to_string_pretty(&v2_result)?);

    println!("=== Notifications ===");
    let notifications = client
        .call_tool(CallToolRequestParam {
            name: "notifications".into(),
            arguments: None,
        })
        .await?;
    println!("{}\n", serde_json::to_string_pretty(&notifications)?);

    client
        .call_tool(CallToolRequestParam {
            name: "disconnect_wallet".into(),
            arguments: None,
        })
        .await?;

    client.cancel().await?;
    println!("=== Session closed ===");
    Ok(())
}
