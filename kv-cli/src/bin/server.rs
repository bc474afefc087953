use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use kv::dispatch::{discover_job_files, run_job_pool, Job};
use kv::kvs::Server;
use kv::netkv::run_acceptor;
use kvcli::script::parse_line;

/// `server <jobs_dir> <max_threads> <max_backups> <registration_endpoint>`
#[derive(Debug, Parser)]
#[command(author, version, about = "kv storage server")]
struct Args {
    /// Directory scanned once at startup for `.job` files.
    jobs_dir: String,
    /// Size of the job-file worker pool.
    max_threads: usize,
    /// Cap on concurrently outstanding backup children.
    max_backups: usize,
    /// Named-pipe path clients connect to.
    registration_endpoint: String,

    #[clap(short = 'c', long = "config", default_value = "config/kvs.toml")]
    config: String,
    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    kvcli::setup_panic_hooks();

    let args = Args::parse();
    let mut cfg = kvcli::config::load(&args.config).unwrap_or_default();
    cfg.jobs_dir = Some(args.jobs_dir.clone());
    cfg.max_threads = Some(args.max_threads);
    cfg.max_backups = Some(args.max_backups);
    cfg.registration_endpoint = Some(args.registration_endpoint.clone());

    let log_dir = cfg.log_dir.clone().unwrap_or_else(kvcli::default_log_dir);
    let _guards = kvcli::trace::init_logging(&log_dir, "server", &args.log_level)?;
    info!("server starting with args: {:?}", args);

    let server = Arc::new(Server::init(cfg.max_backups()).context("failed to initialize store")?);

    let job_paths = discover_job_files(Path::new(&args.jobs_dir))
        .with_context(|| format!("failed to scan jobs dir {}", args.jobs_dir))?;
    let jobs: Vec<Job> = job_paths
        .iter()
        .map(|path| {
            let basename = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
            let text = std::fs::read_to_string(path).unwrap_or_default();
            let commands = text.lines().map(parse_line).collect();
            Job { basename, commands }
        })
        .collect();
    info!("discovered {} job file(s) in {}", jobs.len(), args.jobs_dir);

    let jobs_dir = args.jobs_dir.clone();
    let pool_server = server.clone();
    let pool_handle = std::thread::spawn(move || {
        run_job_pool(pool_server, jobs, cfg.max_threads(), Path::new(&jobs_dir).to_path_buf(), move |basename, output| {
            let out_path = Path::new(&jobs_dir).join(format!("{}.out", basename));
            if let Err(err) = std::fs::write(&out_path, output) {
                log::error!("failed to write output for job {}: {}", basename, err);
            }
        });
    });

    let acceptor_server = server.clone();
    let registration_endpoint = args.registration_endpoint.clone();
    let acceptor_handle = std::thread::spawn(move || {
        if let Err(err) = run_acceptor(acceptor_server, &registration_endpoint, kv::constants::MANAGING_THREADS) {
            log::error!("client acceptor exited: {}", err);
        }
    });

    pool_handle.join().expect("job pool thread panicked");
    acceptor_handle.join().expect("client acceptor thread panicked");

    server.terminate().ok();
    info!("server shut down cleanly");
    Ok(())
}
