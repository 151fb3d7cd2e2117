use serde_json::{json, Value};

use crate::adapters::command::CommandOutput;

/// Pipeline stage a check failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    Clone,
    Frame,
    Branch,
    Commit,
    Install,
    Storycap,
    Aws,
    Comparison,
}

impl CheckStage {
    pub fn key(self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Frame => "frame",
            Self::Branch => "branch",
            Self::Commit => "commit",
            Self::Install => "install",
            Self::Storycap => "storycap",
            Self::Aws => "aws",
            Self::Comparison => "comp",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Clone => "failed to clone GitHub repo",
            Self::Frame => "Figma frame missing (no such file)",
            Self::Branch => "failed to sync GitHub repo, check branch",
            Self::Commit => "failed to checkout commit in GitHub repo",
            Self::Install => "npm install failed",
            Self::Storycap => "storycap failed",
            Self::Aws => "internal AWS error",
            Self::Comparison => "failed to generate visual comparison",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .stage.message())]
pub struct CheckError {
    pub stage: CheckStage,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl CheckError {
    pub fn new(stage: CheckStage) -> Self {
        Self {
            stage,
            stdout: None,
            stderr: None,
        }
    }

    /// Failure carrying a detail line in `stderr`, e.g. the missing path.
    pub fn with_detail(stage: CheckStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            stdout: None,
            stderr: Some(detail.into()),
        }
    }

    pub fn from_output(stage: CheckStage, output: &CommandOutput) -> Self {
        Self {
            stage,
            stdout: non_empty(&output.stdout),
            stderr: non_empty(&output.stderr),
        }
    }

    /// `{"<stage>": "<message>", "stdout": .., "stderr": ..}`
    pub fn to_value(&self) -> Value {
        json!({
            self.stage.key(): self.stage.message(),
            "stdout": self.stdout,
            "stderr": self.stderr,
        })
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
