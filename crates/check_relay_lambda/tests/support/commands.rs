use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use check_relay_lambda::adapters::command::{CommandInvocation, CommandOutput, CommandRunner};

pub fn ok_output() -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: String::new(),
        stderr: String::new(),
    }
}

pub fn failed_output(stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(1),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

/// Stands in for gh, git, npm, npx storycap and ImageMagick. Each tool leaves
/// behind the files the real one would, unless a failure is scripted for it.
pub struct ToolchainRunner {
    /// Screenshot storycap produces, relative to the checkout.
    screenshot: PathBuf,
    mae: String,
    failures: HashMap<String, CommandOutput>,
    invocations: Mutex<Vec<CommandInvocation>>,
}

impl ToolchainRunner {
    pub fn new(screenshot: impl Into<PathBuf>) -> Self {
        Self {
            screenshot: screenshot.into(),
            mae: "1234.5 (0.0188)".to_string(),
            failures: HashMap::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Scripts a failure for the first invocation whose rendered command line
    /// starts with `prefix`, e.g. `npm install`.
    pub fn failing(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.failures.insert(prefix.to_string(), output);
        self
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().expect("poisoned mutex").clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(|invocation| invocation.to_string())
            .collect()
    }

    fn scripted_failure(&self, invocation: &CommandInvocation) -> Option<CommandOutput> {
        let line = invocation.to_string();
        self.failures
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
    }
}

#[async_trait]
impl CommandRunner for ToolchainRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, String> {
        self.invocations
            .lock()
            .expect("poisoned mutex")
            .push(invocation.clone());
        if let Some(output) = self.scripted_failure(invocation) {
            return Ok(output);
        }

        let cwd = invocation.cwd.clone().unwrap_or_default();
        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
        match (invocation.program.as_str(), args.as_slice()) {
            ("gh", ["repo", "clone", _, target, ..]) => {
                touch(&Path::new(target).join("package.json"))?;
                Ok(ok_output())
            }
            ("npm", ["install", ..]) => {
                touch(&cwd.join("node_modules/.package-lock.json"))?;
                Ok(ok_output())
            }
            ("npx", ["storycap", ..]) => {
                touch(&cwd.join(&self.screenshot))?;
                Ok(ok_output())
            }
            ("convert", [.., output]) => {
                touch(&cwd.join(output))?;
                Ok(ok_output())
            }
            ("compare", ["-metric", ..]) => Ok(failed_output("", &self.mae)),
            ("compare", [.., output]) => {
                touch(&cwd.join(output))?;
                Ok(failed_output("", ""))
            }
            _ => Ok(ok_output()),
        }
    }
}

fn touch(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| error.to_string())?;
    }
    std::fs::write(path, b"png").map_err(|error| error.to_string())
}
