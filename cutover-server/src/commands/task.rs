use anyhow::{Context, Result};
use cutover_models::TaskSummary;
use cutover_orchestrations::progress::{LogEvent, LogEventKind, RecordingLogSink};
use cutover_orchestrations::registry::create_task_registry;
use cutover_orchestrations::{TaskRequest, TaskResponse};
use reqwest::StatusCode;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{SubmitTask, SubmittedTask};
use crate::config::Config;

fn orchestration_name(name: &str) -> Result<&'static str> {
    super::resolve_orchestration(name).ok_or_else(|| anyhow::anyhow!("Unknown orchestration '{}'", name))
}

/// Run one orchestration in this process and print its response.
pub async fn run_local(config: &Config, orchestration: String, request: PathBuf, output: String) -> Result<()> {
    let name = orchestration_name(&orchestration)?;
    let request: TaskRequest = super::read_json(&request).await?;
    tokio::fs::create_dir_all(&config.work_dir).await?;

    let sink = Arc::new(RecordingLogSink::new());
    let ctx = config.task_context(config.create_platform(), sink.clone());
    let response = create_task_registry()
        .execute(&ctx, name, request)
        .await
        .context("Request rejected")?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_units(&sink.events());
        println!();
        print_response(&response)?;
    }

    if !response.is_success() {
        anyhow::bail!("Orchestration {} failed", name);
    }
    Ok(())
}

pub async fn submit(config: &Config, orchestration: String, request: PathBuf) -> Result<()> {
    let name = orchestration_name(&orchestration)?;
    let request: TaskRequest = super::read_json(&request).await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/tasks", config.api_url))
        .json(&SubmitTask {
            orchestration: name.to_string(),
            request,
        })
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to API: {}", e))?;

    if !response.status().is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        anyhow::bail!("API error: {}", body["error"].as_str().unwrap_or("unknown error"));
    }

    let submitted: SubmittedTask = response.json().await?;
    println!("✓ Task submitted");
    println!("  ID: {}", submitted.id);
    println!();
    println!("Use 'cutover-server task {} --logs' to follow it", submitted.id);
    Ok(())
}

pub async fn list(config: &Config, output: String) -> Result<()> {
    let response = reqwest::get(format!("{}/api/tasks", config.api_url))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to API: {}", e))?;

    if !response.status().is_success() {
        anyhow::bail!("API error: {}", response.status());
    }

    let tasks: Vec<TaskSummary> = response.json().await?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    } else {
        println!(
            "{:<38} {:<40} {:<15} {:<10} {:<20}",
            "ID", "ORCHESTRATION", "PREFIX", "STATE", "CREATED"
        );
        println!("{}", "-".repeat(125));

        for task in &tasks {
            println!(
                "{:<38} {:<40} {:<15} {:<10} {:<20}",
                task.id,
                task.orchestration,
                task.release_name_prefix,
                format!("{:?}", task.state).to_lowercase(),
                task.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        println!();
        println!("{} task(s) found", tasks.len());
    }

    Ok(())
}

pub async fn get(config: &Config, id: String, logs: bool) -> Result<()> {
    let response = reqwest::get(format!("{}/api/tasks/{}", config.api_url, id))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to API: {}", e))?;

    if response.status() == StatusCode::NOT_FOUND {
        anyhow::bail!("Task '{}' not found", id);
    }

    if !response.status().is_success() {
        anyhow::bail!("API error: {}", response.status());
    }

    let task: serde_json::Value = response.json().await?;

    println!("Task: {}", id);
    println!("{}", "=".repeat(60));
    println!();
    println!("  Orchestration:      {}", task["orchestration"].as_str().unwrap_or("-"));
    println!("  Prefix:             {}", task["release_name_prefix"].as_str().unwrap_or("-"));
    println!("  State:              {}", task["state"].as_str().unwrap_or("-"));
    println!("  Created:            {}", task["created_at"].as_str().unwrap_or("-"));
    println!("  Completed:          {}", task["completed_at"].as_str().unwrap_or("-"));
    if let Some(error) = task["error"].as_str() {
        println!("  Error:              {}", error);
    }
    if !task["response"].is_null() {
        let response: TaskResponse = serde_json::from_value(task["response"].clone())?;
        println!();
        print_response(&response)?;
    }

    if logs {
        let response = reqwest::get(format!("{}/api/tasks/{}/logs", config.api_url, id))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to API: {}", e))?;
        let events: Vec<LogEvent> = response.json().await?;
        println!();
        print_units(&events);
    }

    Ok(())
}

fn print_units(events: &[LogEvent]) {
    for event in events {
        let time = event.timestamp.format("%H:%M:%S");
        match &event.kind {
            LogEventKind::Opened => println!("{} [{}] started", time, event.unit),
            LogEventKind::Line { level, message } => {
                println!("{} [{}] {:<5} {}", time, event.unit, format!("{:?}", level).to_uppercase(), message)
            }
            LogEventKind::Closed { status } => println!("{} [{}] {:?}", time, event.unit, status),
        }
    }
}

fn print_response(response: &TaskResponse) -> Result<()> {
    println!("Status: {:?}", response.status);
    if let Some(message) = &response.error_message {
        println!("Error:  {}", message);
    }
    for revert_error in &response.revert_errors {
        println!("  revert: {}", revert_error);
    }
    if let Some(output) = &response.output {
        println!();
        println!("{}", serde_json::to_string_pretty(output)?);
    }
    Ok(())
}
