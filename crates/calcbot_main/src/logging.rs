use std::fs::File;
use std::path::Path;

use miette::{IntoDiagnostic, Result, WrapErr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const TERMINAL_FILTER: &str = "calcbot_core=info,calcbot_discord=info,calcbot=info,serenity=warn,info";
const DEBUG_FILTER: &str = "calcbot_core=debug,calcbot_discord=debug,calcbot=debug,serenity=info,info";
const FILE_FILTER: &str = "calcbot_core=debug,calcbot_discord=debug,calcbot=debug,serenity=info,info";

/// Open the log file, discarding whatever the previous run wrote.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    File::create(path)
}

/// Install the terminal and file layers. Keep the guard alive for the
/// life of the process or buffered file output is lost.
pub fn init_tracing(debug: bool, log_file: &Path) -> Result<WorkerGuard> {
    let file = open_log_file(log_file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to open log file {}", log_file.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG overrides the terminal filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { DEBUG_FILTER } else { TERMINAL_FILTER }));

    let terminal_layer = if debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .compact()
            .boxed()
    };

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(EnvFilter::new(FILE_FILTER)))
        .try_init()
        .into_diagnostic()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(guard)
}
