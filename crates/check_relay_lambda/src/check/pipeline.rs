use std::path::{Path, PathBuf};

use check_relay_core::contract::{
    CheckSpec, CheckSpecError, StatusUpdate, CHECK_STATUS_MESSAGES,
};
use check_relay_core::storage_keys::{
    check_prefix, frame_relative_path, report_object_key, results_object_key,
    screenshot_relative_path, story_source_path, RESULTS_FILE_NAME, SCREENSHOTS_DIR,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use super::error::{CheckError, CheckStage};
use crate::adapters::command::{CommandInvocation, CommandOutput, CommandRunner};
use crate::adapters::notifier::StatusNotifier;
use crate::adapters::object_store::ObjectStore;

const GRAY_DIFFERENCE: &str = "gray_difference.png";
const BLUE_DIFFERENCE: &str = "blue_difference.png";
const CODE_SNIPPET_LINES: usize = 5;

/// Characters kept as-is when a story name becomes part of a report URL.
const URL_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    /// Root for per-check working directories (`<scratch>/checks/<id>`).
    pub scratch_dir: PathBuf,
    pub github_token: Option<String>,
    pub default_topic_arn: Option<String>,
}

#[derive(Clone, Copy)]
pub struct CheckDeps<'a> {
    pub runner: &'a dyn CommandRunner,
    pub store: &'a dyn ObjectStore,
    pub notifier: &'a dyn StatusNotifier,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Completed { results_key: String, results: Value },
    Failed { error: CheckError },
    /// The request was refused before anything touched disk or the bucket.
    Rejected { error: CheckSpecError },
}

/// Runs one check end to end. Failures are reported through the status topic
/// and a failure `results.json`; they never escape as `Err`.
pub async fn run_check(spec: &CheckSpec, config: &CheckConfig, deps: CheckDeps<'_>) -> CheckOutcome {
    if let Err(error) = spec.validate() {
        tracing::error!(
            component = "check_worker",
            check_id = %spec.check_id,
            error = %error,
            "check request rejected"
        );
        return CheckOutcome::Rejected { error };
    }
    CheckRun::new(spec, config, deps).run().await
}

struct CheckRun<'a> {
    spec: &'a CheckSpec,
    config: &'a CheckConfig,
    deps: CheckDeps<'a>,
    step: usize,
    check_dir: PathBuf,
    code_dir: PathBuf,
    frame: PathBuf,
    screenshot: PathBuf,
    started_at: f64,
    code_path: String,
    code_snippet: String,
    mae: String,
}

impl<'a> CheckRun<'a> {
    fn new(spec: &'a CheckSpec, config: &'a CheckConfig, deps: CheckDeps<'a>) -> Self {
        let check_dir = config.scratch_dir.join(check_prefix(&spec.check_id));
        let code_dir = check_dir.join("code");
        Self {
            spec,
            config,
            deps,
            step: 0,
            frame: check_dir.join(frame_relative_path(&spec.story)),
            screenshot: code_dir.join(screenshot_relative_path(
                &spec.path,
                &spec.component,
                &spec.story,
            )),
            check_dir,
            code_dir,
            started_at: epoch_secs(),
            code_path: story_source_path(&spec.path, &spec.component),
            code_snippet: String::new(),
            mae: String::new(),
        }
    }

    async fn run(mut self) -> CheckOutcome {
        tracing::info!(
            component = "check_worker",
            check_id = %self.spec.check_id,
            repository = %self.spec.repository,
            "check started"
        );

        match self.run_steps().await {
            Ok((results_key, results)) => {
                tracing::info!(
                    component = "check_worker",
                    check_id = %self.spec.check_id,
                    duration_secs = epoch_secs() - self.started_at,
                    "check done"
                );
                CheckOutcome::Completed {
                    results_key,
                    results,
                }
            }
            Err(error) => {
                tracing::error!(
                    component = "check_worker",
                    check_id = %self.spec.check_id,
                    stage = error.stage.key(),
                    error = %error,
                    stdout = ?error.stdout,
                    stderr = ?error.stderr,
                    "check failed"
                );
                self.send_failure(&error).await;
                self.write_failure_results(&error).await;
                CheckOutcome::Failed { error }
            }
        }
    }

    async fn run_steps(&mut self) -> Result<(String, Value), CheckError> {
        self.log_disk_usage().await;
        self.send_progress().await;
        self.download().await?;
        let sync = self.checkout().await?;

        let in_repository = self.run_in_repository(sync).await;
        self.remove_node_modules().await;
        in_repository
    }

    async fn run_in_repository(&mut self, sync: bool) -> Result<(String, Value), CheckError> {
        self.sync_repository(sync).await?;
        self.install_packages().await?;
        self.capture_screenshots().await?;
        self.visual_comparisons().await?;
        self.numeric_comparison().await?;
        self.upload().await
    }

    async fn log_disk_usage(&self) {
        let invocation = CommandInvocation::new("df")
            .arg("-h")
            .arg(self.config.scratch_dir.display().to_string());
        match self.deps.runner.run(&invocation).await {
            Ok(output) => tracing::debug!(
                component = "check_worker",
                usage = %output.stdout.trim(),
                "scratch disk usage"
            ),
            Err(error) => tracing::debug!(
                component = "check_worker",
                error = %error,
                "disk usage unavailable"
            ),
        }
    }

    async fn download(&mut self) -> Result<(), CheckError> {
        tokio::fs::create_dir_all(&self.check_dir)
            .await
            .map_err(|error| CheckError::with_detail(CheckStage::Aws, error.to_string()))?;

        let objects = self
            .deps
            .store
            .download_prefix(&check_prefix(&self.spec.check_id), &self.check_dir)
            .await
            .map_err(|error| CheckError::with_detail(CheckStage::Aws, error))?;
        tracing::info!(
            component = "check_worker",
            check_id = %self.spec.check_id,
            objects,
            "downloaded check inputs"
        );

        if !path_exists(&self.frame).await {
            return Err(CheckError::with_detail(
                CheckStage::Frame,
                self.frame.display().to_string(),
            ));
        }
        self.send_progress().await;
        Ok(())
    }

    /// Clones the repository when it is not cached yet. Returns whether an
    /// existing checkout needs syncing instead.
    async fn checkout(&mut self) -> Result<bool, CheckError> {
        if path_exists(&self.code_dir).await {
            return Ok(true);
        }

        let mut clone = CommandInvocation::new("gh").args([
            "repo".to_string(),
            "clone".to_string(),
            self.spec.repository.clone(),
            self.code_dir.display().to_string(),
        ]);
        if let Some(token) = self.github_token() {
            clone = clone
                .arg("--")
                .arg("-c")
                .arg(format!(
                    "url.https://{token}:@github.com/.insteadOf=https://github.com/"
                ))
                .env("GITHUB_TOKEN", token)
                .redact(token);
        }
        self.run_checked(&clone, CheckStage::Clone).await?;
        Ok(false)
    }

    async fn sync_repository(&mut self, sync: bool) -> Result<(), CheckError> {
        if sync {
            // Local edits such as a regenerated package-lock.json block checkouts.
            let stash = self.in_code(CommandInvocation::new("git").arg("stash"));
            self.run_checked(&stash, CheckStage::Clone).await?;
        }

        if let Some(branch) = &self.spec.branch {
            let mut sync_branch = self.in_code(
                CommandInvocation::new("gh").args(["repo", "sync", "--branch", branch.as_str()]),
            );
            if let Some(token) = self.github_token() {
                sync_branch = sync_branch.env("GITHUB_TOKEN", token).redact(token);
            }
            self.run_checked(&sync_branch, CheckStage::Branch).await?;
        }

        if let Some(commit) = &self.spec.commit {
            let checkout = self.in_code(CommandInvocation::new("git").args(["checkout", commit.as_str()]));
            self.run_checked(&checkout, CheckStage::Commit).await?;
        }

        self.code_snippet = read_head(&self.code_dir.join(&self.code_path), CODE_SNIPPET_LINES).await;
        self.send_progress().await;
        Ok(())
    }

    async fn install_packages(&mut self) -> Result<(), CheckError> {
        let install = self.in_code(CommandInvocation::new("npm").arg("install"));
        self.run_checked(&install, CheckStage::Install).await?;
        self.send_progress().await;
        Ok(())
    }

    async fn capture_screenshots(&mut self) -> Result<(), CheckError> {
        let port = free_local_port()
            .map_err(|error| CheckError::with_detail(CheckStage::Storycap, error))?;
        let storycap = self.in_code(CommandInvocation::new("npx").args([
            "storycap".to_string(),
            format!("http://localhost:{port}"),
            "--viewport".to_string(),
            self.spec.viewport(),
            "--serverTimeout".to_string(),
            self.spec.server_timeout_ms().to_string(),
            "--captureTimeout".to_string(),
            self.spec.capture_timeout_ms().to_string(),
            "--serverCmd".to_string(),
            format!("start-storybook -p {port}"),
        ]));
        self.run_checked(&storycap, CheckStage::Storycap).await?;

        if !path_exists(&self.screenshot).await {
            return Err(CheckError::with_detail(
                CheckStage::Storycap,
                self.screenshot.display().to_string(),
            ));
        }
        self.send_progress().await;
        Ok(())
    }

    async fn visual_comparisons(&mut self) -> Result<(), CheckError> {
        let gray = self.code_dir.join(GRAY_DIFFERENCE);
        let screenshot = self.screenshot.display().to_string();
        let frame = self.frame.display().to_string();

        let convert = self.in_code(CommandInvocation::new("convert").args([
            screenshot.as_str(),
            "-flatten",
            "-grayscale",
            "Rec709Luminance",
            frame.as_str(),
            "-flatten",
            "-grayscale",
            "Rec709Luminance",
            "-clone",
            "0-1",
            "-compose",
            "darken",
            "-composite",
            "-channel",
            "RGB",
            "-combine",
            GRAY_DIFFERENCE,
        ]));
        self.run_checked(&convert, CheckStage::Comparison).await?;
        if !path_exists(&gray).await {
            return Err(CheckError::with_detail(
                CheckStage::Comparison,
                gray.display().to_string(),
            ));
        }

        // compare exits non-zero whenever the images differ
        let blue = self.code_dir.join(BLUE_DIFFERENCE);
        let highlight = self.in_code(CommandInvocation::new("compare").args([
            screenshot.as_str(),
            frame.as_str(),
            "-highlight-color",
            "blue",
            BLUE_DIFFERENCE,
        ]));
        self.run_unchecked(&highlight, CheckStage::Comparison).await?;
        if !path_exists(&blue).await {
            return Err(CheckError::with_detail(
                CheckStage::Comparison,
                blue.display().to_string(),
            ));
        }

        self.send_progress().await;
        Ok(())
    }

    async fn numeric_comparison(&mut self) -> Result<(), CheckError> {
        let metric = self.in_code(CommandInvocation::new("compare").args([
            "-metric".to_string(),
            "MAE".to_string(),
            self.screenshot.display().to_string(),
            self.frame.display().to_string(),
            "null".to_string(),
        ]));
        let output = self.run_unchecked(&metric, CheckStage::Comparison).await?;
        self.mae = output.stderr.trim().to_string();
        self.send_progress().await;
        Ok(())
    }

    async fn upload(&mut self) -> Result<(String, Value), CheckError> {
        let check_id = self.spec.check_id.clone();
        let check_id = check_id.as_str();
        let screenshots_root = self.code_dir.join(SCREENSHOTS_DIR);
        for file in list_files(&screenshots_root)
            .await
            .map_err(|error| CheckError::with_detail(CheckStage::Aws, error))?
        {
            let Ok(relative) = file.strip_prefix(&self.code_dir) else {
                continue;
            };
            let key = report_object_key(check_id, &slash_path(relative));
            self.put(&file, &key, true).await?;
        }

        let screenshot_relative =
            screenshot_relative_path(&self.spec.path, &self.spec.component, &self.spec.story);
        let mut urls = Map::new();
        urls.insert(
            "url_screenshot".to_string(),
            Value::from(self.report_url(&screenshot_relative)),
        );

        for name in [BLUE_DIFFERENCE, GRAY_DIFFERENCE] {
            let file = self.code_dir.join(name);
            self.put(&file, &report_object_key(check_id, name), true).await?;
            let stem = name.trim_end_matches(".png");
            urls.insert(format!("url_{stem}"), Value::from(self.report_url(name)));
        }

        let completed_at = epoch_secs();
        let mut results = self.spec.to_result_fields();
        results.extend(urls);
        results.insert("MAE".to_string(), Value::from(self.mae.clone()));
        results.insert("created_at".to_string(), Value::from(self.started_at));
        results.insert("completed_at".to_string(), Value::from(completed_at));
        results.insert("code_path".to_string(), Value::from(self.code_path.clone()));
        results.insert(
            "code_snippet".to_string(),
            Value::from(self.code_snippet.clone()),
        );
        let results = Value::Object(results);

        let results_key = results_object_key(check_id);
        self.write_results(&results)
            .await
            .map_err(|error| CheckError::with_detail(CheckStage::Aws, error))?;
        self.put(&self.check_dir.join(RESULTS_FILE_NAME), &results_key, false)
            .await?;

        self.send_progress().await;
        Ok((results_key, results))
    }

    async fn write_failure_results(&self, error: &CheckError) {
        let mut results = self.spec.to_result_fields();
        results.insert("error".to_string(), error.to_value());
        let results = Value::Object(results);

        let written = match self.write_results(&results).await {
            Ok(()) => {
                self.deps
                    .store
                    .upload_file(
                        &self.check_dir.join(RESULTS_FILE_NAME),
                        &results_object_key(&self.spec.check_id),
                        false,
                    )
                    .await
            }
            Err(error) => Err(error),
        };

        if let Err(upload_error) = written {
            tracing::error!(
                component = "check_worker",
                check_id = %self.spec.check_id,
                error = %upload_error,
                "failed to publish failure results"
            );
        }
    }

    async fn write_results(&self, results: &Value) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.check_dir)
            .await
            .map_err(|error| format!("failed to create {}: {error}", self.check_dir.display()))?;
        let body = serde_json::to_vec(results)
            .map_err(|error| format!("failed to serialize results: {error}"))?;
        let path = self.check_dir.join(RESULTS_FILE_NAME);
        tokio::fs::write(&path, body)
            .await
            .map_err(|error| format!("failed to write {}: {error}", path.display()))
    }

    async fn remove_node_modules(&self) {
        let node_modules = self.code_dir.join("node_modules");
        if !path_exists(&node_modules).await {
            return;
        }
        if let Err(error) = tokio::fs::remove_dir_all(&node_modules).await {
            tracing::warn!(
                component = "check_worker",
                path = %node_modules.display(),
                error = %error,
                "failed to remove node_modules"
            );
        }
    }

    async fn put(&self, file: &Path, key: &str, public: bool) -> Result<(), CheckError> {
        self.deps
            .store
            .upload_file(file, key, public)
            .await
            .map_err(|error| CheckError::with_detail(CheckStage::Aws, error))
    }

    async fn run_checked(
        &self,
        invocation: &CommandInvocation,
        stage: CheckStage,
    ) -> Result<CommandOutput, CheckError> {
        let output = self.run_unchecked(invocation, stage).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(CheckError::from_output(stage, &output))
        }
    }

    async fn run_unchecked(
        &self,
        invocation: &CommandInvocation,
        stage: CheckStage,
    ) -> Result<CommandOutput, CheckError> {
        self.deps
            .runner
            .run(invocation)
            .await
            .map_err(|error| CheckError::with_detail(stage, error))
    }

    async fn send_progress(&mut self) {
        let update = StatusUpdate::progress(&self.spec.check_id, self.step);
        if self.step < CHECK_STATUS_MESSAGES.len() {
            self.step += 1;
        }
        self.publish(&update).await;
    }

    async fn send_failure(&self, error: &CheckError) {
        let update = StatusUpdate::failure(&self.spec.check_id, self.step, error.to_value());
        self.publish(&update).await;
    }

    async fn publish(&self, update: &StatusUpdate) {
        let Some(topic_arn) = self
            .spec
            .sns_topic_arn
            .as_deref()
            .or(self.config.default_topic_arn.as_deref())
        else {
            tracing::debug!(component = "check_worker", "no status topic configured");
            return;
        };

        let message = match serde_json::to_string(update) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(component = "check_worker", error = %error, "unserializable status");
                return;
            }
        };
        tracing::info!(
            component = "check_worker",
            topic_arn,
            message = %message,
            "sending status update"
        );
        if let Err(error) = self.deps.notifier.publish(topic_arn, &message).await {
            tracing::warn!(
                component = "check_worker",
                topic_arn,
                error = %error,
                "status update not delivered"
            );
        }
    }

    fn github_token(&self) -> Option<&'a str> {
        self.spec
            .github_token
            .as_deref()
            .or(self.config.github_token.as_deref())
            .filter(|token| !token.is_empty())
    }

    fn in_code(&self, invocation: CommandInvocation) -> CommandInvocation {
        invocation.current_dir(&self.code_dir)
    }

    fn report_url(&self, relative_path: &str) -> String {
        let quoted = utf8_percent_encode(relative_path, URL_PATH).to_string();
        self.deps
            .store
            .object_url(&report_object_key(&self.spec.check_id, &quoted))
    }
}

fn epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1_000.0
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn free_local_port() -> Result<u16, String> {
    std::net::TcpListener::bind(("127.0.0.1", 0))
        .and_then(|listener| listener.local_addr())
        .map(|address| address.port())
        .map_err(|error| format!("failed to reserve a local port: {error}"))
}

async fn read_head(path: &Path, lines: usize) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text
            .split_inclusive('\n')
            .take(lines)
            .collect::<String>(),
        Err(_) => String::new(),
    }
}

/// Files below `root`, depth first. A missing root yields no files.
async fn list_files(root: &Path) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    if !path_exists(root).await {
        return Ok(files);
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|error| format!("failed to read {}: {error}", dir.display()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|error| format!("failed to read {}: {error}", dir.display()))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|error| format!("failed to stat {}: {error}", entry.path().display()))?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
