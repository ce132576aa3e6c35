use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the global logger, honouring `RUST_LOG` when set.
///
/// `verbose` lowers the default level from info to debug. Calling this more
/// than once is harmless, which lets tests and both binaries share it.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let env = Env::default().default_filter_or(level.to_string());
    let _ = Builder::from_env(env).format_timestamp_millis().try_init();
}
