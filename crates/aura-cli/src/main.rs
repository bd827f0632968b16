mod ui;

use std::env;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use aura_core::actions::open_tool;
use aura_core::config::Config;
use aura_core::config::ModelConfig;
use aura_core::ids::UuidIds;
use aura_core::mapper::Handoff;
use aura_core::persistence::SnapshotStore;
use aura_core::store::Store;
use aura_exec::GeminiClassifier;
use aura_exec::IntentClassifier;
use aura_exec::Router;
use aura_exec::RouterConfig;
use aura_exec::RouterEvent;
use aura_exec::SimulatedClassifier;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "aura_core=info,aura_exec=info,aura_cli=info";

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("aura {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "route" => {
            let options = parse_options(args.collect::<Vec<_>>())?;
            block_on(run_route(options))
        }
        "repl" => {
            let options = parse_options(args.collect::<Vec<_>>())?;
            block_on(run_repl(options))
        }
        "state" => {
            let options = parse_options(args.collect::<Vec<_>>())?;
            init_tracing();
            run_state(options)
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    simulate: bool,
    json: bool,
    words: Vec<String>,
}

fn parse_options(args: Vec<String>) -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "--data-dir" => {
                let Some(value) = args.get(i + 1) else {
                    return Err(format!("{} requires a path", args[i]).into());
                };
                if args[i] == "--config" {
                    options.config = Some(PathBuf::from(value));
                } else {
                    options.data_dir = Some(PathBuf::from(value));
                }
                i += 2;
            }
            "--simulate" => {
                options.simulate = true;
                i += 1;
            }
            "--json" => {
                options.json = true;
                i += 1;
            }
            flag if flag.starts_with("--") => {
                return Err(format!("unsupported argument: {flag}").into());
            }
            word => {
                options.words.push(word.to_string());
                i += 1;
            }
        }
    }
    Ok(options)
}

fn block_on(
    future: impl Future<Output = Result<(), Box<dyn std::error::Error>>>,
) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct Session {
    config: Config,
    store: Arc<Store>,
    snapshots: Arc<SnapshotStore>,
}

fn open_session(options: &Options) -> Result<Session, Box<dyn std::error::Error>> {
    let config_path = options.config.clone().or_else(Config::default_path);
    let mut config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    if let Some(dir) = &options.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }

    let snapshots = SnapshotStore::open(config.storage.resolve_data_dir())?;
    let store = Arc::new(Store::default());
    match snapshots.load() {
        Ok(Some(state)) => {
            store.hydrate(state)?;
            info!(path = %snapshots.path().display(), "restored snapshot");
        }
        Ok(None) => {}
        Err(err) => warn!("starting fresh, snapshot unreadable: {err}"),
    }

    Ok(Session {
        config,
        store,
        snapshots: Arc::new(snapshots),
    })
}

fn build_classifier(
    model: &ModelConfig,
    simulate: bool,
) -> Result<Arc<dyn IntentClassifier>, Box<dyn std::error::Error>> {
    if simulate {
        return Ok(Arc::new(SimulatedClassifier));
    }
    let provider = model.provider();
    if provider != "gemini" {
        return Err(format!("unsupported provider: {provider}").into());
    }
    let classifier = GeminiClassifier::from_config(model);
    if !classifier.has_credential() {
        warn!(
            checked = %model.api_key_env.join(", "),
            "no credential found; voice commands will be unavailable"
        );
    }
    Ok(Arc::new(classifier))
}

fn build_router(session: &Session, simulate: bool) -> Result<Router, Box<dyn std::error::Error>> {
    let classifier = build_classifier(&session.config.model, simulate)?;
    Ok(Router::new(
        Arc::clone(&session.store),
        classifier,
        Arc::new(UuidIds),
        RouterConfig::from(&session.config.router),
    ))
}

/// Saves every published snapshot in the background.
fn spawn_persistence(session: &Session) -> JoinHandle<()> {
    let mut rx = session.store.subscribe();
    let snapshots = Arc::clone(&session.snapshots);
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            if let Err(err) = snapshots.save(&state) {
                warn!("failed to persist snapshot: {err}");
            }
        }
    })
}

/// Plays the UI side of handoffs and prints what the router reports.
fn spawn_printer(mut rx: broadcast::Receiver<RouterEvent>, store: Arc<Store>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if let Some(line) = ui::event_line(&event) {
                println!("{line}");
            }
            if let RouterEvent::Handoff(Handoff::ShowTool(tab)) = event {
                for action in open_tool(tab) {
                    store.dispatch(action);
                }
                for line in ui::render_tool(&store.get_state(), tab) {
                    println!("{line}");
                }
            }
        }
    })
}

async fn finish_session(session: &Session, persistence: JoinHandle<()>) {
    persistence.abort();
    let _ = persistence.await;
    if let Err(err) = session.snapshots.save(&session.store.get_state()) {
        warn!("failed to persist snapshot: {err}");
    }
}

async fn run_route(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let utterance = options.words.join(" ");
    if utterance.trim().is_empty() {
        return Err("route requires an utterance".into());
    }
    let session = open_session(&options)?;
    let persistence = spawn_persistence(&session);
    let router = build_router(&session, options.simulate)?;
    let printer = spawn_printer(router.subscribe(), Arc::clone(&session.store));

    let outcome = router.run_turn(&utterance).await;
    drop(router);
    let _ = printer.await;
    finish_session(&session, persistence).await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&*session.store.get_state())?);
    } else if let Some(line) = ui::outcome_line(&outcome) {
        println!("{line}");
    }
    Ok(())
}

async fn run_repl(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(&options)?;
    let persistence = spawn_persistence(&session);
    let router = build_router(&session, options.simulate)?;
    let handle = router.spawn();
    let printer = spawn_printer(handle.subscribe(), Arc::clone(&session.store));

    println!("aura {} - type a request, Ctrl-D to quit", env!("CARGO_PKG_VERSION"));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interrupted = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break true,
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle.submit(line) {
                        break false;
                    }
                }
                None => break false,
            },
        }
    };

    if interrupted {
        handle.shutdown().await;
    } else {
        handle.finish().await;
    }
    let _ = printer.await;
    finish_session(&session, persistence).await;
    Ok(())
}

fn run_state(options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(&options)?;
    let state = session.store.get_state();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&*state)?);
    } else {
        println!("snapshot: {}", session.snapshots.path().display());
        for line in ui::render_summary(&state) {
            println!("{line}");
        }
    }
    Ok(())
}

fn print_help() {
    println!("aura {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  aura route [--simulate] [--json] [--data-dir PATH] [--config PATH] UTTERANCE...");
    println!("  aura repl [--simulate] [--data-dir PATH] [--config PATH]");
    println!("  aura state [--json] [--data-dir PATH] [--config PATH]");
    println!("  aura --help");
    println!("  aura --version");
    println!();
    println!("The service credential is read from GEMINI_API_KEY or API_KEY.");
}
