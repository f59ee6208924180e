use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use playground::display::{render, Target};
use playground::{ExecutionMode, RunController, RunOutcome, SessionLifecycle, StartOutcome};
use sandbox_api::url::DEFAULT_BASE_URL;
use sandbox_api::{Language, OutputEvent, SandboxApiClient, SandboxApiConfig, TransportEvent};
use sandbox_term::{init_logging, stdin_is_terminal, EnvConfig, KeystrokeSplitter};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "playground", version, about = "Edit and run code in a remote sandbox")]
struct Cli {
    /// Sandbox API base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Language to run, by name or file extension.
    #[arg(long)]
    language: Option<String>,

    #[arg(long, value_enum)]
    mode: Option<ExecutionMode>,

    /// File whose content is sent as stdin to batch runs.
    #[arg(long)]
    stdin_file: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List runnable languages.
    Languages,
    /// Print the remote file tree.
    Tree,
    /// Upload local files and run the language's entry file.
    Run { files: Vec<PathBuf> },
    /// Print a remote file.
    Cat { path: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let env = EnvConfig::from_env();
    if let Err(error) = init_logging(&env, cli.verbose) {
        eprintln!("playground: logging disabled: {error}");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(cli, env))
}

async fn run(cli: Cli, env: EnvConfig) -> anyhow::Result<()> {
    let base_url = cli
        .base_url
        .clone()
        .or(env.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
    let config = SandboxApiConfig::new(base_url).with_timeout(REQUEST_TIMEOUT);
    let client = Arc::new(SandboxApiClient::new(config)?);

    let mut lifecycle = SessionLifecycle::<RunController>::new(client.clone());
    lifecycle.bootstrap().await;

    let mut controller = RunController::new(client.clone(), client.clone(), client.clone());
    lifecycle.register_teardown(|controller: &mut RunController| {
        controller.stop();
    });

    let result = run_command(&cli, &client, &mut controller).await;
    lifecycle.finish(&mut controller, result).await
}

async fn run_command(
    cli: &Cli,
    client: &SandboxApiClient,
    controller: &mut RunController,
) -> anyhow::Result<()> {
    match &cli.command {
        Command::Languages => list_languages(client).await,
        Command::Tree => print_tree(client).await,
        Command::Cat { path } => {
            let content = client.read_file(path).await?;
            print!("{content}");
            Ok(())
        }
        Command::Run { files } => run_files(cli, client, controller, files).await,
    }
}

async fn list_languages(client: &SandboxApiClient) -> anyhow::Result<()> {
    for language in client.list_languages().await? {
        println!(
            "{}\t{}\t{:?}",
            language.language_name, language.file_name, language.execution_type
        );
    }
    Ok(())
}

async fn print_tree(client: &SandboxApiClient) -> anyhow::Result<()> {
    for node in client.file_tree().await? {
        for path in node.file_paths() {
            println!("{path}");
        }
    }
    Ok(())
}

fn find_language(languages: Vec<Language>, wanted: &str) -> Option<Language> {
    let wanted = wanted.trim().trim_start_matches('.');
    languages.into_iter().find(|language| {
        language.language_name.eq_ignore_ascii_case(wanted)
            || language
                .file_extension
                .trim_start_matches('.')
                .eq_ignore_ascii_case(wanted)
    })
}

async fn run_files(
    cli: &Cli,
    client: &SandboxApiClient,
    controller: &mut RunController,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    let Some(wanted) = cli.language.as_deref() else {
        bail!("pass --language to choose what to run (see `playground languages`)");
    };
    let Some(language) = find_language(client.list_languages().await?, wanted) else {
        bail!("unknown language: {wanted}");
    };

    controller.select_language(language).await?;
    let entry = controller.cache().entry_file().unwrap_or_default().to_owned();

    for file in files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let remote = remote_name(file)?;
        if remote != entry {
            controller.create_file(&remote).await?;
        }
        controller.set_active(&remote)?;
        controller.edit_active(content);
    }
    if !entry.is_empty() {
        controller.set_active(&entry)?;
    }

    if let Some(mode) = cli.mode {
        controller.set_mode(mode)?;
    }
    if let Some(path) = &cli.stdin_file {
        let stdin = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        controller.set_stdin(stdin);
    }

    let mut print = |event: &OutputEvent| print_event(event, false);
    match controller.run(&mut print).await? {
        RunOutcome::Rejected => bail!("a run is already in progress"),
        RunOutcome::Batch(summary) => {
            debug!(?summary, "batch run done");
            Ok(())
        }
        RunOutcome::Interactive(StartOutcome::Connecting { session_id }) => {
            debug!(%session_id, "interactive session connecting");
            drive_session(controller).await
        }
        RunOutcome::Interactive(StartOutcome::Failed(message)) => bail!(message),
        RunOutcome::Interactive(StartOutcome::Rejected) => {
            bail!("a session is already running")
        }
    }
}

fn remote_name(file: &Path) -> anyhow::Result<String> {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .with_context(|| format!("not a file name: {}", file.display()))
}

enum Wake {
    Input(io::Result<usize>),
    Transport(Option<TransportEvent>),
    FlushDue,
    CtrlC,
}

/// Pumps keystrokes to the session and session output to the terminal until
/// the session ends.
async fn drive_session(controller: &mut RunController) -> anyhow::Result<()> {
    let raw = stdin_is_terminal();
    #[cfg(unix)]
    let _raw_mode = if raw {
        Some(sandbox_term::RawModeGuard::enable()?)
    } else {
        None
    };

    let mut stdin = tokio::io::stdin();
    let mut buffer = [0_u8; 1024];
    let mut stdin_open = true;
    let mut splitter = KeystrokeSplitter::default();

    while controller.is_running() {
        let deadline = splitter.next_deadline();
        let wake = tokio::select! {
            read = stdin.read(&mut buffer), if stdin_open => Wake::Input(read),
            event = controller.next_transport_event() => Wake::Transport(event),
            _ = sleep_until(deadline), if deadline.is_some() => Wake::FlushDue,
            _ = tokio::signal::ctrl_c() => Wake::CtrlC,
        };

        match wake {
            Wake::Input(Ok(0)) | Wake::Input(Err(_)) => {
                debug!("stdin closed");
                stdin_open = false;
            }
            Wake::Input(Ok(read)) => {
                let bytes = if raw {
                    buffer[..read].to_vec()
                } else {
                    // Line-mode stdin ends lines with `\n`; the line buffer
                    // commits on Enter.
                    buffer[..read]
                        .iter()
                        .map(|byte| if *byte == b'\n' { b'\r' } else { *byte })
                        .collect()
                };
                for unit in splitter.process(&bytes) {
                    feed(controller, &unit, raw);
                }
            }
            Wake::FlushDue => {
                for unit in splitter.flush_due(Instant::now()) {
                    feed(controller, &unit, raw);
                }
            }
            Wake::Transport(Some(event)) => {
                for event in controller.handle_transport_event(event) {
                    print_event(&event, raw);
                }
            }
            Wake::Transport(None) => break,
            Wake::CtrlC => {
                warn!("interrupted; stopping session");
                controller.stop();
            }
        }
    }
    Ok(())
}

fn feed(controller: &mut RunController, unit: &str, raw: bool) {
    let echo = controller.feed_keystroke(unit);
    // A terminal in line mode echoes on its own.
    if raw && !echo.is_empty() {
        let mut stdout = io::stdout();
        for piece in echo {
            let _ = stdout.write_all(piece.as_bytes());
        }
        let _ = stdout.flush();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
    }
}

fn print_event(event: &OutputEvent, raw: bool) {
    let (target, text) = render(event, raw);
    let result = match target {
        Target::Stdout => {
            let mut stdout = io::stdout();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
        }
        Target::Stderr => {
            let mut stderr = io::stderr();
            stderr
                .write_all(text.as_bytes())
                .and_then(|()| stderr.flush())
        }
    };
    if let Err(error) = result {
        warn!(%error, "output write failed");
    }
}
