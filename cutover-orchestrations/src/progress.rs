//! Command unit progress reporting
//!
//! Each orchestration phase opens a named command unit, logs into it and
//! closes it with a status. A [`CommandUnit`] that is dropped without being
//! finished closes itself as failed, so early returns never leave a unit open.

use chrono::{DateTime, Utc};
use cutover_models::CommandUnitStatus;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Destination for command unit output
pub trait LogSink: Send + Sync {
    fn open(&self, unit: &str);
    fn log(&self, unit: &str, level: LogLevel, message: &str);
    fn close(&self, unit: &str, status: CommandUnitStatus);
}

fn trace(unit: &str, level: LogLevel, message: &str) {
    match level {
        LogLevel::Info => tracing::info!(unit, "{}", message),
        LogLevel::Warn => tracing::warn!(unit, "{}", message),
        LogLevel::Error => tracing::error!(unit, "{}", message),
    }
}

/// Sink that only forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn open(&self, unit: &str) {
        tracing::debug!(unit, "Command unit opened");
    }

    fn log(&self, unit: &str, level: LogLevel, message: &str) {
        trace(unit, level, message);
    }

    fn close(&self, unit: &str, status: CommandUnitStatus) {
        tracing::debug!(unit, ?status, "Command unit closed");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEventKind {
    Opened,
    Line { level: LogLevel, message: String },
    Closed { status: CommandUnitStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub unit: String,
    #[serde(flatten)]
    pub kind: LogEventKind,
}

/// Sink that keeps every event and also forwards to `tracing`
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, unit: &str, kind: LogEventKind) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(LogEvent {
                timestamp: Utc::now(),
                unit: unit.to_string(),
                kind,
            });
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event.kind {
                LogEventKind::Line { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Final status of every closed unit, in closing order
    pub fn unit_statuses(&self) -> Vec<(String, CommandUnitStatus)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event.kind {
                LogEventKind::Closed { status } => Some((event.unit, status)),
                _ => None,
            })
            .collect()
    }

    /// Units opened but never closed
    pub fn open_units(&self) -> Vec<String> {
        let mut open: Vec<String> = Vec::new();
        for event in self.events() {
            match event.kind {
                LogEventKind::Opened => open.push(event.unit),
                LogEventKind::Closed { .. } => {
                    if let Some(index) = open.iter().rposition(|unit| *unit == event.unit) {
                        open.remove(index);
                    }
                }
                LogEventKind::Line { .. } => {}
            }
        }
        open
    }
}

impl LogSink for RecordingLogSink {
    fn open(&self, unit: &str) {
        self.push(unit, LogEventKind::Opened);
    }

    fn log(&self, unit: &str, level: LogLevel, message: &str) {
        trace(unit, level, message);
        self.push(
            unit,
            LogEventKind::Line {
                level,
                message: message.to_string(),
            },
        );
    }

    fn close(&self, unit: &str, status: CommandUnitStatus) {
        self.push(unit, LogEventKind::Closed { status });
    }
}

/// Scoped handle on one open command unit
pub struct CommandUnit<'a> {
    sink: &'a dyn LogSink,
    name: &'static str,
    closed: bool,
}

impl<'a> CommandUnit<'a> {
    pub fn open(sink: &'a dyn LogSink, name: &'static str) -> Self {
        sink.open(name);
        Self {
            sink,
            name,
            closed: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.sink.log(self.name, LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.sink.log(self.name, LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.sink.log(self.name, LogLevel::Error, message.as_ref());
    }

    pub fn success(mut self) {
        self.close(CommandUnitStatus::Success);
    }

    pub fn failure(mut self) {
        self.close(CommandUnitStatus::Failure);
    }

    /// Close according to `result`, logging the error when there is one.
    pub fn finish<T, E: std::fmt::Display>(mut self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.close(CommandUnitStatus::Success),
            Err(e) => {
                self.error(e.to_string());
                self.close(CommandUnitStatus::Failure);
            }
        }
    }

    fn close(&mut self, status: CommandUnitStatus) {
        if !self.closed {
            self.closed = true;
            self.sink.close(self.name, status);
        }
    }
}

impl Drop for CommandUnit<'_> {
    fn drop(&mut self) {
        self.close(CommandUnitStatus::Failure);
    }
}
