mod api;
mod apply;
mod cli;
mod errors;
mod parser;
mod utils;
mod workspace;

use crate::utils::logger;
use api::client::ApiClient;
use api::ModelClient;
use apply::revert::OriginalFileState;
use apply::{ApplyMode, ApplyOutcome, IntelligentOptions};
use clap::Parser;
use cli::args::{Args, Commands, Mode};
use cli::display::CliDisplayManager;
use cli::TerminalConfirmer;
use errors::AppError;
use parser::ParsedResponse;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use utils::cancel::CancellationToken;
use utils::config::{read_config, write_config, Config};
use workspace::{WorkspaceRoot, WorkspaceRoots};

/// The main entry point of the application
#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    let config = read_config()?;
    logger::setup_logger(&config);

    match args.command {
        Commands::Apply { mode, from, root } => handle_apply(mode, from, root, config).await,
        Commands::Revert { root } => handle_revert(root).await,
        Commands::Config {
            set_api_key,
            set_model,
            set_fallback_model,
            set_base_url,
            set_temperature,
            set_concurrency,
            set_log_level,
        } => {
            handle_config_subcommand(
                config,
                set_api_key,
                set_model,
                set_fallback_model,
                set_base_url,
                set_temperature,
                set_concurrency,
                set_log_level,
            )
            .await
        }
    }
}

async fn handle_apply(
    mode: Mode,
    from: Option<String>,
    root_args: Vec<String>,
    config: Config,
) -> Result<(), AppError> {
    let start_time = Instant::now();
    let mut display_manager = CliDisplayManager::new();
    let roots = parse_roots(&root_args)?;

    display_manager.print_header();
    display_manager.print_parse_start(from.as_deref().unwrap_or("stdin"));

    let response = read_response(from.as_deref()).await?;
    let parsed = parser::parse_response(&response, roots.is_single_root());
    if parsed.is_empty() {
        return Err(AppError::InvalidInput(
            "No files, patches or completion recognized in the response".to_string(),
        ));
    }
    display_manager.print_parse_result(&describe(&parsed));

    // Ctrl-C flips the shared token; in-flight model calls resolve silently.
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let confirmer = TerminalConfirmer;
    let options = IntelligentOptions {
        model: config.model.clone(),
        fallback_model: config.fallback_model.clone(),
        temperature: config.temperature,
        concurrency: config.concurrency,
    };
    let client = build_client(&config);

    let states = match parsed {
        ParsedResponse::Files(files) => {
            let apply_mode = match mode {
                Mode::Fast => ApplyMode::FastReplace,
                Mode::Intelligent => ApplyMode::IntelligentUpdate,
            };
            display_manager.print_apply_start(match apply_mode {
                ApplyMode::FastReplace => "fast replace",
                ApplyMode::IntelligentUpdate => "intelligent update",
            });
            let (targets, skipped) = apply::collect_targets(&roots, &files);
            display_manager.print_skipped_paths(&skipped);

            let progress = match apply_mode {
                ApplyMode::IntelligentUpdate => Some(display_manager.progress_callback()),
                ApplyMode::FastReplace => None,
            };
            let outcome = apply::apply_files(
                &targets,
                apply_mode,
                client.as_deref(),
                &confirmer,
                &options,
                &cancel,
                progress,
            )
            .await;
            display_manager.finish_progress_bar();

            match outcome? {
                ApplyOutcome::Completed(states) => states,
                ApplyOutcome::Cancelled(states) => {
                    // Fast replace keeps what it already wrote; make that
                    // revertible too before going quiet.
                    if !states.is_empty() {
                        apply::revert::save_ledger(&roots, &states).await?;
                    }
                    display_manager.print_cancelled();
                    return Ok(());
                }
                ApplyOutcome::Declined => {
                    display_manager.print_cancelled();
                    return Ok(());
                }
            }
        }
        ParsedResponse::Patches(patches) => {
            display_manager.print_apply_start("patches");
            let mut report = apply::apply_patches(&roots, &patches, &cancel).await?;
            if !report.failed.is_empty() {
                if let Some(client) = client.as_deref() {
                    display_manager.start_spinner("Retrying failed patches with the model");
                    let result = apply::retry_failed_patches(
                        &roots,
                        &mut report,
                        client,
                        &confirmer,
                        &options,
                        &cancel,
                        None,
                    )
                    .await;
                    display_manager.stop_spinner();
                    result?;
                }
            }
            for patch in &report.failed {
                log::error!("Patch for {} was not applied", patch.file_path);
            }
            report.states
        }
        ParsedResponse::Completion(completion) => {
            display_manager.print_apply_start("code completion");
            apply::completion::run(&roots, &completion).await?
        }
    };

    if states.is_empty() {
        display_manager.print_cancelled();
        return Ok(());
    }

    for state in &states {
        if let Some(path) = roots.safe_path(state.workspace_name.as_deref(), &state.file_path) {
            let current = tokio::fs::read_to_string(&path).await.unwrap_or_default();
            display_manager.print_file_summary(&state.file_path, &state.content, &current);
        }
    }

    display_manager.print_ledger_start();
    apply::revert::save_ledger(&roots, &states).await?;
    display_manager.print_revert_hint();

    let created = states.iter().filter(|s| s.is_new).count();
    display_manager.print_footer(created, states.len() - created, start_time.elapsed());
    Ok(())
}

async fn handle_revert(root_args: Vec<String>) -> Result<(), AppError> {
    let roots = parse_roots(&root_args)?;
    let states: Vec<OriginalFileState> = apply::revert::load_ledger(&roots).await?;
    let count = states.len();

    if apply::revert::revert_files(&roots, &states).await {
        println!("Reverted {} file(s)", count);
    } else {
        println!("Reverted with errors; see log output");
    }
    apply::revert::clear_ledger(&roots).await?;
    Ok(())
}

/// Builds the model client when an API key is configured. Fast replace and
/// plain patch applies work without one.
fn build_client(config: &Config) -> Option<Box<dyn ModelClient>> {
    config
        .api_key
        .as_ref()
        .map(|key| Box::new(ApiClient::new(key.clone(), config.base_url.clone())) as Box<dyn ModelClient>)
}

/// Resolves `--root` flags into workspace roots. `NAME=PATH` names a root,
/// bare `PATH` is named after its final directory; no flags means a single
/// root at the current directory.
fn parse_roots(root_args: &[String]) -> Result<WorkspaceRoots, AppError> {
    if root_args.is_empty() {
        let cwd = std::env::current_dir()?;
        let name = root_name_for(&cwd);
        return WorkspaceRoots::new(vec![WorkspaceRoot { name, path: cwd }]);
    }

    let mut roots = Vec::with_capacity(root_args.len());
    for arg in root_args {
        let (name, path) = match arg.split_once('=') {
            Some((name, path)) if !name.is_empty() => (name.to_string(), PathBuf::from(path)),
            _ => {
                let path = PathBuf::from(arg);
                (root_name_for(&path), path)
            }
        };
        roots.push(WorkspaceRoot { name, path });
    }
    WorkspaceRoots::new(roots)
}

fn root_name_for(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string())
}

async fn read_response(from: Option<&str>) -> Result<String, AppError> {
    match from {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            Ok(buffer)
        }
    }
}

fn describe(parsed: &ParsedResponse) -> String {
    match parsed {
        ParsedResponse::Files(files) => format!("Recognized {} file block(s)", files.len()),
        ParsedResponse::Patches(patches) => format!("Recognized {} patch(es)", patches.len()),
        ParsedResponse::Completion(completion) => format!(
            "Recognized a code completion for {}:{}:{}",
            completion.file_path, completion.line, completion.character
        ),
    }
}

/// Handles the config subcommand
#[allow(clippy::too_many_arguments)]
async fn handle_config_subcommand(
    mut config: Config,
    set_api_key: Option<String>,
    set_model: Option<String>,
    set_fallback_model: Option<String>,
    set_base_url: Option<String>,
    set_temperature: Option<f32>,
    set_concurrency: Option<usize>,
    set_log_level: Option<String>,
) -> Result<(), AppError> {
    let mut changed = false;

    if let Some(api_key) = set_api_key {
        config.api_key = Some(api_key);
        println!("API key set");
        changed = true;
    }

    if let Some(model) = set_model {
        println!("Model set to {}", model);
        config.model = model;
        changed = true;
    }

    if let Some(fallback_model) = set_fallback_model {
        println!("Fallback model set to {}", fallback_model);
        config.fallback_model = Some(fallback_model);
        changed = true;
    }

    if let Some(base_url) = set_base_url {
        println!("Base URL set to {}", base_url);
        config.base_url = base_url;
        changed = true;
    }

    if let Some(temperature) = set_temperature {
        config.temperature = temperature;
        println!("Temperature set to {}", temperature);
        changed = true;
    }

    if let Some(concurrency) = set_concurrency {
        config.concurrency = concurrency;
        println!("Concurrency set to {}", concurrency);
        changed = true;
    }

    if let Some(log_level) = set_log_level {
        println!("Log level set to {}", log_level);
        config.log_level = log_level;
        changed = true;
    }

    if changed {
        utils::config::validate_config(&config)?;
        write_config(&config)?;
    } else {
        println!("{}", toml::to_string(&config).unwrap_or_default());
    }

    Ok(())
}
