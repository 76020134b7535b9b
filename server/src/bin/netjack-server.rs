#![warn(rust_2018_idioms)]

use std::str::FromStr;

use flexi_logger::{LogSpecBuilder, LoggerHandle};
use log::{error, info, warn, LevelFilter};
use tokio::sync::watch;

use netjack_server::{run, settings};

fn main() -> anyhow::Result<()> {
    let settings = settings::load()?;
    let _logger = setup_logger(&settings.logging)?;
    let shutdown_rx = setup_signal()?;
    let runtime = setup_runtime(&settings.runtime)?;

    runtime.block_on(async move {
        // Spin up the server, and wait for it to stop. It only stops on its
        // own after the interrupt signal; anything else is a failure.
        let server = tokio::spawn(run(settings.server, shutdown_rx));
        match server.await {
            Ok(Ok(stats)) => info!(
                "served {} connections ({} complete sessions), sent {} offers",
                stats.total_accepted_connections, stats.completed_sessions, stats.offers_sent
            ),
            Ok(Err(e)) => error!("server stopped: {}", e),
            Err(e) => error!("server task: {}", e),
        }
    });
    info!("good-bye, world!");
    Ok(())
}

fn setup_logger(l: &settings::Logging) -> anyhow::Result<LoggerHandle> {
    let level = LevelFilter::from_str(&l.level)
        .map_err(|e| anyhow::anyhow!("invalid log level {:?}: {}", l.level, e))?;
    let mut spec_builder = LogSpecBuilder::new();
    spec_builder.default(level);
    let spec = spec_builder.build();
    let handle = flexi_logger::Logger::with(spec)
        .format(flexi_logger::default_format)
        .start()?;
    Ok(handle)
}

fn setup_signal() -> anyhow::Result<watch::Receiver<bool>> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("received interrupt signal");
        if shutdown_tx.send(true).is_err() {
            warn!("server already gone");
        }
    })?;
    Ok(shutdown_rx)
}

fn setup_runtime(r: &settings::Runtime) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = if r.threaded {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        let worker_threads = if r.worker_threads == 0 {
            warn!("worker_threads must be at least 1; adjusting to 1");
            1
        } else {
            r.worker_threads
        };
        builder.worker_threads(worker_threads);
        builder
    } else {
        tokio::runtime::Builder::new_current_thread()
    };
    let max_blocking_threads = if r.max_blocking_threads == 0 {
        warn!("max_blocking_threads must be at least 1; adjusting to 1");
        1
    } else {
        r.max_blocking_threads
    };
    builder
        .enable_all()
        .max_blocking_threads(max_blocking_threads)
        .thread_name(r.thread_name.clone());
    Ok(builder.build()?)
}
