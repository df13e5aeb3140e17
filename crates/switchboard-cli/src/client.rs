//! HTTP client commands against a running gateway.

use anyhow::Context;
use serde_json::Value;

/// Fetch and print the registry snapshot.
pub async fn run_status(base_url: String) -> anyhow::Result<()> {
    let url = format!("{}/api/status", base_url.trim_end_matches('/'));
    let status: Value = reqwest::get(&url)
        .await
        .with_context(|| format!("request to {url} failed"))?
        .json()
        .await
        .context("invalid status response")?;

    println!("connected: {}", status["connectedCount"]);
    if let Some(providers) = status["providers"].as_array() {
        for provider in providers {
            println!(
                "  {:<12} {:<24} {:>12}  {} tools",
                provider["id"].as_str().unwrap_or("?"),
                provider["displayName"].as_str().unwrap_or("?"),
                provider["status"].as_str().unwrap_or("?"),
                provider["toolCount"],
            );
        }
    }
    Ok(())
}

/// Dispatch one tool call and print the result envelope.
pub async fn run_call(
    base_url: String,
    provider: String,
    tool: String,
    params: String,
) -> anyhow::Result<()> {
    let params: Value = serde_json::from_str(&params).context("--params must be a JSON object")?;
    anyhow::ensure!(params.is_object(), "--params must be a JSON object");

    let url = format!("{}/api/call", base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "providerId": provider,
        "toolName": tool,
        "params": params,
    });

    let result: Value = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .json()
        .await
        .context("invalid call response")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
