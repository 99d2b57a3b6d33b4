use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::core::validation::ValidationIssue;
use crate::error::{PfError, Result};

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    Partial { completed: usize, failed: usize },
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

pub fn robot_partial<T: Serialize>(data: T, completed: usize, failed: usize) -> RobotResponse<T> {
    let mut response = robot_ok(data);
    response.status = RobotStatus::Partial { completed, failed };
    response
}

/// Robot envelope around `data`, with warnings attached.
pub fn emit_robot<T: Serialize>(data: T, warnings: Vec<String>) -> Result<()> {
    let mut response = robot_ok(data);
    response.warnings = warnings;
    emit_json(&response)
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| PfError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 22,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.bold().to_string());
        self.lines.push("-".repeat(text.len().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let padded = format!("{key:width$}", width = self.key_width);
        self.lines.push(format!("{} {value}", padded.dimmed()));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

/// Flat error object printed on stdout when a robot-mode command fails.
#[derive(Debug, Serialize)]
pub struct RobotError<'a> {
    pub error: bool,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub issues: &'a [ValidationIssue],
}

impl<'a> From<&'a PfError> for RobotError<'a> {
    fn from(err: &'a PfError) -> Self {
        Self {
            error: true,
            code: err.code(),
            message: err.to_string(),
            issues: err.issues(),
        }
    }
}

/// Report a failed command on the channel the caller reads.
pub fn report_error(err: &PfError, robot: bool) {
    if robot {
        match serde_json::to_string(&RobotError::from(err)) {
            Ok(line) => println!("{line}"),
            Err(ser) => eprintln!("Error: {err} (unserializable: {ser})"),
        }
        return;
    }
    eprintln!("{} {err}", "Error:".red().bold());
    for issue in err.issues() {
        eprintln!("  {}: {}", issue.code.yellow(), issue.message);
    }
}

/// Render an optional value, `-` when absent.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
