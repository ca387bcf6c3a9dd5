//! keyward entrypoint: a terminal demo of the shortcut engine.
use anyhow::Result;
use clap::Parser;
use core_events::{EVENT_CHANNEL_CAP, Event, EventSourceRegistry, SystemClock, TickEventSource};
use core_store::{FileStore, MemoryStore, Store};
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalGuard};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod runtime;
mod shortcuts;

use runtime::{BackgroundTasks, Runtime, TICK_INTERVAL};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "keyward", version, about = "Keyboard shortcut engine demo")]
struct Args {
    /// Configuration file path (overrides discovery of `keyward.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Directory for persisted behavior and recommendation records.
    #[arg(long = "store-dir", conflicts_with = "memory_store")]
    pub store_dir: Option<PathBuf>,
    /// Keep records in memory only; nothing survives the session.
    #[arg(long = "memory-store")]
    pub memory_store: bool,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

struct RuntimeContext<'a> {
    config: core_config::Config,
    store: Arc<dyn Store>,
    terminal_guard: TerminalGuard<'a>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn run<'a>(&'a mut self, args: &Args) -> Result<RuntimeContext<'a>> {
        self.configure_logging()?;
        Self::install_panic_hook();

        info!(target: "runtime", "startup");
        let config = core_config::load_from(args.config.clone())?;
        let store = select_store(args, &config);

        let release_events = self.backend.capabilities().key_release_events;
        self.backend.set_title("keyward")?;
        let guard = self.backend.enter_guard()?;

        info!(
            target: "runtime.startup",
            config_path = config.path.as_ref().map(|p| p.display().to_string()).as_deref(),
            config_override = args.config.is_some(),
            memory_store = args.memory_store,
            release_events,
            "bootstrap_complete"
        );

        Ok(RuntimeContext {
            config,
            store,
            terminal_guard: guard,
        })
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("keyward.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "keyward.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// `--memory-store` wins, then `--store-dir`, then `[storage] dir`, then the platform data dir.
fn select_store(args: &Args, config: &core_config::Config) -> Arc<dyn Store> {
    if args.memory_store {
        return Arc::new(MemoryStore::new());
    }
    let dir = args
        .store_dir
        .clone()
        .or_else(|| config.storage_dir())
        .or_else(FileStore::default_dir);
    match dir {
        Some(dir) => {
            info!(target: "runtime.startup", dir = %dir.display(), "file_store_selected");
            Arc::new(FileStore::new(dir))
        }
        None => {
            warn!(target: "runtime.startup", "no_data_dir_using_memory_store");
            Arc::new(MemoryStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let context = startup.run(&args)?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let (input_task, input_shutdown) = core_input::spawn_async_input(tx.clone());
    let mut registry = EventSourceRegistry::new();
    registry.register(TickEventSource::new(TICK_INTERVAL));
    let source_handles = registry.spawn_all(&tx);

    let mut runtime = Runtime::with_defaults(
        context.config.engine_settings(),
        Arc::new(SystemClock),
        context.store,
        context.terminal_guard,
    );
    let tasks = BackgroundTasks {
        tx: Some(tx),
        source_handles,
        input_task: Some(input_task),
        input_shutdown: Some(input_shutdown),
    };
    runtime.run(rx, tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("keyward").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn store_flags_parse() {
        let args = parse(&["--store-dir", "/tmp/kw", "--config", "kw.toml"]);
        assert_eq!(args.store_dir, Some(PathBuf::from("/tmp/kw")));
        assert_eq!(args.config, Some(PathBuf::from("kw.toml")));
        assert!(!args.memory_store);
    }

    #[test]
    fn memory_store_conflicts_with_store_dir() {
        let res = Args::try_parse_from(["keyward", "--memory-store", "--store-dir", "/tmp/kw"]);
        assert!(res.is_err());
    }

    #[test]
    fn memory_store_flag_selects_memory_backend() {
        let args = parse(&["--memory-store"]);
        let store = select_store(&args, &core_config::Config::default());
        store.set("probe", "1").unwrap();
        assert_eq!(store.get("probe").unwrap().as_deref(), Some("1"));
    }
}
