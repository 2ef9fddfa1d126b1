use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dbjson_module::{stdio, Module, ModuleConfig};
use dbjson_table_store::StoreOptions;
use tracing_subscriber::EnvFilter;

/// JSON database module. Speaks newline-delimited JSON on stdin/stdout.
#[derive(Parser, Debug)]
#[command(name = "dbjson")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory relative database files are resolved against
    #[arg(long, env = "DBJSON_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Seconds between background saves (0 disables autosave)
    #[arg(long, env = "DBJSON_AUTOSAVE_SECS", default_value_t = 5)]
    autosave_secs: u64,

    /// Save after every write
    #[arg(long, env = "DBJSON_SAVE_ON_WRITE")]
    save_on_write: bool,

    /// Pretty-print database files
    #[arg(long, env = "DBJSON_HUMAN_READABLE")]
    human_readable: bool,

    /// Host messages buffered before reading from stdin pauses
    #[arg(long, env = "DBJSON_CHANNEL_CAPACITY", default_value_t = 64)]
    channel_capacity: usize,
}

impl Args {
    fn into_config(self) -> ModuleConfig {
        let autosave_interval = match self.autosave_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        ModuleConfig {
            data_dir: self.data_dir,
            store: StoreOptions {
                save_on_write: self.save_on_write,
                human_readable: self.human_readable,
                autosave_interval,
            },
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}

fn init_logging() {
    // stdout belongs to the host
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DBJSON_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn serve(config: ModuleConfig) -> i32 {
    let (channel, writer) = stdio::spawn(config.channel_capacity);
    let mut module = Module::from_config(&config);

    let result = module.run(channel).await;
    if let Err(e) = writer.await {
        tracing::error!("output task failed: {}", e);
    }

    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config();
    init_logging();

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let code = runtime.block_on(serve(config));
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();
    std::process::exit(code);
}
