//! Intelligent Update: existing files are merged by the model instead of
//! overwritten, in batches bounded by the configured concurrency. The run is
//! all-or-nothing: results are buffered per file and nothing touches disk
//! until every file has succeeded, then buffers commit in the original
//! response order.

use super::revert::{self, OriginalFileState};
use super::{ApplyOutcome, Confirmer, ProgressCallback, TargetFile};
use crate::api::{ChunkCallback, ModelClient, ModelOutcome, ModelRequest};
use crate::errors::AppError;
use crate::utils::cancel::CancellationToken;
use crate::utils::config::DEFAULT_CONCURRENCY;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct IntelligentOptions {
    pub model: String,
    pub fallback_model: Option<String>,
    pub temperature: f32,
    pub concurrency: usize,
}

impl Default for IntelligentOptions {
    fn default() -> Self {
        IntelligentOptions {
            model: String::new(),
            fallback_model: None,
            temperature: 0.0,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

pub async fn run(
    client: &dyn ModelClient,
    confirmer: &dyn Confirmer,
    targets: &[TargetFile],
    options: &IntelligentOptions,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<ApplyOutcome, AppError> {
    // Pre-scan: capture every pre-change state up front so a committed run
    // is fully revertible, and so the model sees current content.
    let mut states: Vec<OriginalFileState> = Vec::with_capacity(targets.len());
    for target in targets {
        states.push(
            revert::capture_state(
                &target.absolute_path,
                &target.file.file_path,
                target.file.workspace_name.clone(),
            )
            .await?,
        );
    }

    // The largest existing file drives the progress bar. Its final length is
    // unknown mid-stream, so received bytes over current length is the
    // documented approximation.
    let largest = states
        .iter()
        .enumerate()
        .filter(|(i, _)| targets[*i].exists)
        .max_by_key(|(_, s)| s.content.len())
        .map(|(i, s)| (i, s.content.len() as u64));

    let mut buffered: Vec<Option<String>> = vec![None; targets.len()];
    let mut pending: Vec<usize> = Vec::new();
    for (i, target) in targets.iter().enumerate() {
        if target.exists {
            pending.push(i);
        } else {
            // New files carry their content verbatim; no model call.
            buffered[i] = Some(target.file.content.clone());
        }
    }

    let fallback_decision: Mutex<Option<bool>> = Mutex::new(None);
    let limit = options.concurrency.max(1);

    for batch in pending.chunks(limit) {
        if cancel.is_cancelled() {
            return Ok(ApplyOutcome::Cancelled(Vec::new()));
        }

        let mut in_flight: FuturesUnordered<_> = batch
            .iter()
            .map(|&i| {
                let on_chunk = match (&largest, &progress) {
                    (Some((largest_index, expected)), Some(progress)) if *largest_index == i => {
                        Some(track_progress(progress.clone(), *expected))
                    }
                    _ => None,
                };
                let outcome = process_file(
                    client,
                    confirmer,
                    options,
                    &fallback_decision,
                    &targets[i],
                    &states[i].content,
                    cancel,
                    on_chunk,
                );
                async move { (i, outcome.await) }
            })
            .collect();

        // Results are taken as they land so the first bad outcome can flip
        // the token while sibling requests are still streaming; the rest of
        // the batch is then drained, not abandoned.
        let mut failure: Option<AppError> = None;
        let mut was_cancelled = false;
        while let Some((i, outcome)) = in_flight.next().await {
            match outcome {
                ModelOutcome::Content(content) => buffered[i] = Some(content),
                ModelOutcome::Cancelled => {
                    cancel.cancel();
                    was_cancelled = true;
                }
                ModelOutcome::RateLimited => {
                    cancel.cancel();
                    failure.get_or_insert(AppError::Aborted(format!(
                        "rate limit persisted for {}",
                        targets[i].file.file_path
                    )));
                }
                ModelOutcome::Failed(reason) => {
                    cancel.cancel();
                    failure.get_or_insert(AppError::Aborted(format!(
                        "model call for {} failed: {}",
                        targets[i].file.file_path, reason
                    )));
                }
            }
        }
        if let Some(error) = failure {
            return Err(error);
        }
        if was_cancelled {
            return Ok(ApplyOutcome::Cancelled(Vec::new()));
        }
    }

    if cancel.is_cancelled() {
        return Ok(ApplyOutcome::Cancelled(Vec::new()));
    }

    // Committing: every file succeeded, write buffers in the original order.
    for (i, target) in targets.iter().enumerate() {
        let Some(content) = &buffered[i] else {
            continue;
        };
        if let Some(parent) = target.absolute_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target.absolute_path, ensure_trailing_newline(content)).await?;
        log::debug!("Committed {}", target.file.file_path);
    }

    Ok(ApplyOutcome::Completed(states))
}

/// One model call, with the interactive rate-limit fallback. The first file
/// to hit a 429 asks the user once; the decision is shared with the rest of
/// the run.
#[allow(clippy::too_many_arguments)]
async fn process_file(
    client: &dyn ModelClient,
    confirmer: &dyn Confirmer,
    options: &IntelligentOptions,
    fallback_decision: &Mutex<Option<bool>>,
    target: &TargetFile,
    current_content: &str,
    cancel: &CancellationToken,
    on_chunk: Option<ChunkCallback>,
) -> ModelOutcome {
    let request = ModelRequest {
        model: options.model.clone(),
        file_path: target.file.file_path.clone(),
        file_content: current_content.to_string(),
        instruction: target.file.content.clone(),
        temperature: options.temperature,
    };

    let outcome = client.send(request.clone(), cancel, on_chunk.clone()).await;
    let ModelOutcome::RateLimited = outcome else {
        return outcome;
    };

    let retry = {
        let mut decision = fallback_decision.lock().await;
        match *decision {
            Some(choice) => choice,
            None => {
                let choice = match &options.fallback_model {
                    Some(fallback) => {
                        confirmer
                            .confirm(&format!(
                                "Rate limited on {}. Retry with {}?",
                                options.model, fallback
                            ))
                            .await
                    }
                    None => false,
                };
                *decision = Some(choice);
                choice
            }
        }
    };

    match (retry, &options.fallback_model) {
        (true, Some(fallback)) => {
            log::warn!(
                "Rate limited; retrying {} with {}",
                target.file.file_path,
                fallback
            );
            let mut retry_request = request;
            retry_request.model = fallback.clone();
            client.send(retry_request, cancel, on_chunk).await
        }
        _ => ModelOutcome::RateLimited,
    }
}

/// Wraps the shared progress callback into a per-chunk byte counter.
fn track_progress(progress: ProgressCallback, expected: u64) -> ChunkCallback {
    let received = Arc::new(AtomicU64::new(0));
    Arc::new(move |chunk_len: usize| {
        let total = received.fetch_add(chunk_len as u64, Ordering::Relaxed) + chunk_len as u64;
        progress(total, expected);
    })
}

fn ensure_trailing_newline(content: &str) -> String {
    if content.ends_with('\n') || content.is_empty() {
        content.to_string()
    } else {
        format!("{}\n", content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::collect_targets;
    use crate::parser::ParsedFile;
    use crate::workspace::{WorkspaceRoot, WorkspaceRoots};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    struct StubClient<F: Fn(&ModelRequest) -> ModelOutcome + Send + Sync> {
        on: F,
        calls: AtomicUsize,
    }

    impl<F: Fn(&ModelRequest) -> ModelOutcome + Send + Sync> StubClient<F> {
        fn new(on: F) -> Self {
            StubClient {
                on,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl<F: Fn(&ModelRequest) -> ModelOutcome + Send + Sync> ModelClient for StubClient<F> {
        async fn send(
            &self,
            request: ModelRequest,
            _cancel: &CancellationToken,
            _on_chunk: Option<ChunkCallback>,
        ) -> ModelOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.on)(&request)
        }
    }

    struct Always(bool);

    #[async_trait]
    impl Confirmer for Always {
        async fn confirm(&self, _message: &str) -> bool {
            self.0
        }
    }

    fn roots_for(dir: &std::path::Path) -> WorkspaceRoots {
        WorkspaceRoots::new(vec![WorkspaceRoot {
            name: "main".to_string(),
            path: dir.to_path_buf(),
        }])
        .unwrap()
    }

    fn parsed(path: &str, content: &str) -> ParsedFile {
        ParsedFile {
            file_path: path.to_string(),
            content: content.to_string(),
            workspace_name: None,
        }
    }

    fn options() -> IntelligentOptions {
        IntelligentOptions {
            model: "primary".to_string(),
            fallback_model: Some("backup".to_string()),
            temperature: 0.2,
            concurrency: 2,
        }
    }

    #[tokio::test]
    async fn merges_existing_files_and_commits_all() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}\n").await.unwrap();
        fs::write(dir.path().join("b.rs"), "fn b() {}\n").await.unwrap();
        let roots = roots_for(dir.path());
        let files = vec![parsed("a.rs", "update a"), parsed("b.rs", "update b")];
        let (targets, _) = collect_targets(&roots, &files);

        let client = StubClient::new(|req: &ModelRequest| {
            ModelOutcome::Content(format!("merged {}", req.file_path))
        });
        let outcome = run(
            &client,
            &Always(true),
            &targets,
            &options(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        let ApplyOutcome::Completed(states) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].content, "fn a() {}\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("a.rs")).await.unwrap(),
            "merged a.rs\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("b.rs")).await.unwrap(),
            "merged b.rs\n"
        );
    }

    #[tokio::test]
    async fn one_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "keep a\n").await.unwrap();
        fs::write(dir.path().join("b.rs"), "keep b\n").await.unwrap();
        let roots = roots_for(dir.path());
        let files = vec![parsed("a.rs", "update"), parsed("b.rs", "update")];
        let (targets, _) = collect_targets(&roots, &files);

        let client = StubClient::new(|req: &ModelRequest| {
            if req.file_path == "b.rs" {
                ModelOutcome::Failed("stream broke".to_string())
            } else {
                ModelOutcome::Content("merged".to_string())
            }
        });
        let cancel = CancellationToken::new();
        let err = run(&client, &Always(true), &targets, &options(), &cancel, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Aborted(_)));
        assert!(cancel.is_cancelled());
        assert_eq!(
            fs::read_to_string(dir.path().join("a.rs")).await.unwrap(),
            "keep a\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("b.rs")).await.unwrap(),
            "keep b\n"
        );
    }

    #[tokio::test]
    async fn failure_cancels_in_flight_sibling_calls() {
        // One file fails immediately while its sibling is still streaming;
        // the sibling must observe the token instead of running to the end.
        struct SplitClient {
            sibling_saw_cancel: Arc<std::sync::atomic::AtomicBool>,
        }

        #[async_trait]
        impl ModelClient for SplitClient {
            async fn send(
                &self,
                request: ModelRequest,
                cancel: &CancellationToken,
                _on_chunk: Option<ChunkCallback>,
            ) -> ModelOutcome {
                if request.file_path == "a.rs" {
                    return ModelOutcome::Failed("stream broke".to_string());
                }
                for _ in 0..50 {
                    if cancel.is_cancelled() {
                        self.sibling_saw_cancel.store(true, Ordering::SeqCst);
                        return ModelOutcome::Cancelled;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                ModelOutcome::Content("ran to completion".to_string())
            }
        }

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "keep a\n").await.unwrap();
        fs::write(dir.path().join("b.rs"), "keep b\n").await.unwrap();
        let roots = roots_for(dir.path());
        let files = vec![parsed("a.rs", "update"), parsed("b.rs", "update")];
        let (targets, _) = collect_targets(&roots, &files);

        let sibling_saw_cancel = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let client = SplitClient {
            sibling_saw_cancel: Arc::clone(&sibling_saw_cancel),
        };
        let cancel = CancellationToken::new();
        let err = run(&client, &Always(true), &targets, &options(), &cancel, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Aborted(_)));
        assert!(sibling_saw_cancel.load(Ordering::SeqCst));
        assert_eq!(
            fs::read_to_string(dir.path().join("b.rs")).await.unwrap(),
            "keep b\n"
        );
    }

    #[tokio::test]
    async fn rate_limit_retries_once_on_fallback_model() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "old\n").await.unwrap();
        let roots = roots_for(dir.path());
        let (targets, _) = collect_targets(&roots, &[parsed("a.rs", "update")]);

        let client = StubClient::new(|req: &ModelRequest| {
            if req.model == "primary" {
                ModelOutcome::RateLimited
            } else {
                ModelOutcome::Content("from backup".to_string())
            }
        });
        let outcome = run(
            &client,
            &Always(true),
            &targets,
            &options(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, ApplyOutcome::Completed(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.rs")).await.unwrap(),
            "from backup\n"
        );
    }

    #[tokio::test]
    async fn declined_fallback_aborts_the_run() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "old\n").await.unwrap();
        let roots = roots_for(dir.path());
        let (targets, _) = collect_targets(&roots, &[parsed("a.rs", "update")]);

        let client = StubClient::new(|_: &ModelRequest| ModelOutcome::RateLimited);
        let err = run(
            &client,
            &Always(false),
            &targets,
            &options(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Aborted(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("a.rs")).await.unwrap(),
            "old\n"
        );
    }

    #[tokio::test]
    async fn new_files_skip_the_model() {
        let dir = tempdir().unwrap();
        let roots = roots_for(dir.path());
        let (targets, _) = collect_targets(&roots, &[parsed("fresh.rs", "fn fresh() {}")]);

        let client = StubClient::new(|_: &ModelRequest| {
            ModelOutcome::Failed("should not be called".to_string())
        });
        let outcome = run(
            &client,
            &Always(true),
            &targets,
            &options(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, ApplyOutcome::Completed(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("fresh.rs")).await.unwrap(),
            "fn fresh() {}\n"
        );
    }

    #[tokio::test]
    async fn cancellation_is_silent_and_writes_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "old\n").await.unwrap();
        let roots = roots_for(dir.path());
        let (targets, _) = collect_targets(&roots, &[parsed("a.rs", "update")]);

        let client = StubClient::new(|_: &ModelRequest| ModelOutcome::Cancelled);
        let outcome = run(
            &client,
            &Always(true),
            &targets,
            &options(),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();

        let ApplyOutcome::Cancelled(states) = outcome else {
            panic!("expected cancellation");
        };
        assert!(states.is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join("a.rs")).await.unwrap(),
            "old\n"
        );
    }
}
