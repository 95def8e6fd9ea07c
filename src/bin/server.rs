//! `relfeat-server` — binds the length-framed JSON request protocol to a
//! TCP socket and serves fit/transform/check requests against projects
//! under the configured project root.
//!
//! ```bash
//! cargo run --bin relfeat-server
//! cargo run --bin relfeat-server -- --config config.toml
//! ```

use relfeat::config::Config;
use relfeat::project::Project;
use relfeat::protocol::server;
use std::env;

fn get_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1).cloned())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = match get_arg(&args, "--config") {
        Some(path) => Config::from_file(&path)?,
        None => Config::load().unwrap_or_default(),
    };

    init_logging(&config);

    if config.performance.num_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(relfeat::coordinator::thread_count(config.performance.num_threads))
            .build_global()
            .ok();
    }

    std::fs::create_dir_all(&config.project.root_dir)?;
    Project::open_or_create(&config.project.root_dir, &config.project.default_project)?;

    tracing::info!(
        bind_addr = %config.protocol.bind_addr,
        project_root = %config.project.root_dir.display(),
        default_project = %config.project.default_project,
        "starting relfeat-server"
    );

    server::serve(&config.protocol.bind_addr, &config.project.root_dir)?;
    Ok(())
}
