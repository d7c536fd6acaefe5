//! Example demonstrating the rcp_utils UMA Organ interface
//!
//! Run with: cargo run --example uma_demo

use rcp_utils::{MutexId, Organ, Stimulus, UtilsOrgan};
use serde_json::json;
use std::collections::HashMap;

fn stimulus(op: &str, input: serde_json::Value) -> Stimulus {
    Stimulus {
        op: op.to_string(),
        input,
        context: HashMap::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== rcp_utils UMA Interface Demo ===\n");

    let organ = UtilsOrgan::new();

    // 1. Query capabilities
    println!("1. Querying organ capabilities...");
    let response = organ.stimulate(stimulus("rcp.capabilities", json!({}))).await?;
    println!("   Status: {}", if response.ok { "✓ SUCCESS" } else { "✗ FAILED" });
    println!("   Organ: {}", response.output["name"]);
    println!("   Version: {}", response.output["version"]);
    println!("   Functions: {}\n", response.output["functions"]);

    // 2. Timestamps
    println!("2. Reading the organ clock...");
    for _ in 0..3 {
        let response = organ.stimulate(stimulus("rcp.timestamp", json!({}))).await?;
        println!("   {} ms ({})", response.output["elapsed_ms"], response.output["mode"]);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    println!();

    // 3. Random values
    println!("3. Drawing random values...");
    let response = organ.stimulate(stimulus("rcp.rand", json!({"count": 5}))).await?;
    println!("   {}\n", response.output["values"]);

    // 4. Lock status while a local caller holds the connection lock
    println!("4. Probing named locks...");
    let registry = organ.registry();
    {
        let _guard = registry.guard(MutexId::Connection);
        let response = organ.stimulate(stimulus("rcp.mutex.status", json!({}))).await?;
        println!("   while held: {}", response.output);
    }
    let response = organ.stimulate(stimulus("rcp.mutex.status", json!({}))).await?;
    println!("   released:   {}\n", response.output);

    // 5. Unsupported operation
    println!("5. Testing unsupported operation...");
    let response = organ.stimulate(stimulus("rcp.debayer", json!({}))).await?;
    println!("   Status: {}", if response.ok { "✓ SUCCESS" } else { "✗ FAILED (expected)" });
    println!("   Available: {}\n", response.output["available_operations"]);

    // 6. Metrics
    println!("6. Metrics snapshot...");
    let response = organ.stimulate(stimulus("metrics", json!({}))).await?;
    println!("   {}", serde_json::to_string_pretty(&response.output)?);

    Ok(())
}
