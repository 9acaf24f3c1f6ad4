/// Headless dashboard runner.
///
/// Usage:
///   flomon_dashboard [config.toml] [--dev <fixtures-dir>] [--verify]
///
/// Runs the refresh loop against the configured API (or a fixture
/// directory) and logs a one-line summary whenever the view model changes.
/// `--verify` probes every read endpoint once and exits. Ctrl-C stops the
/// loop.

use std::error::Error;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::info;

use flomon_dashboard::dev_mode::DevModeApi;
use flomon_dashboard::ingest::HttpApi;
use flomon_dashboard::{logging, verify};
use flomon_dashboard::{load_config, Command, DashboardApi, DashboardConfig, RefreshOrchestrator};

struct Args {
    config: Option<PathBuf>,
    dev_dir: Option<PathBuf>,
    verify: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        dev_dir: None,
        verify: false,
    };
    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--verify" => args.verify = true,
            "--dev" => {
                let dir = raw.next().ok_or("--dev needs a fixture directory")?;
                args.dev_dir = Some(PathBuf::from(dir));
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag {}", flag)),
            path => args.config = Some(PathBuf::from(path)),
        }
    }
    Ok(args)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;
    let _guard = logging::init_logger(config.logging.level, config.logging.file.as_deref(), true)?;

    match args.dev_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "dev mode: serving fixtures");
            run_with(DevModeApi::new(dir), config, args.verify).await
        }
        None => {
            let api = HttpApi::from_config(&config.api)?;
            info!(base_url = api.base_url(), "using live API");
            run_with(api, config, args.verify).await
        }
    }
}

async fn run_with<A: DashboardApi>(
    api: A,
    config: DashboardConfig,
    verify_only: bool,
) -> Result<(), Box<dyn Error>> {
    if verify_only {
        let report = verify::probe_endpoints(&api, config.scope).await;
        report.print_summary();
        return Ok(());
    }

    let orchestrator = RefreshOrchestrator::new(api, config);

    let mut updates = orchestrator.subscribe();
    let reporter = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let line = updates.borrow_and_update().summary_line();
            info!("{}", line);
        }
    });

    let (commands, receiver) = mpsc::channel(16);
    let shutdown = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = commands.send(Command::Shutdown).await;
        }
    });

    orchestrator.run(receiver).await;

    reporter.abort();
    shutdown.abort();
    Ok(())
}
