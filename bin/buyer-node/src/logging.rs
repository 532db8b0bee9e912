//! Logging initialization: `--quiet` collapses to errors only, `RUST_LOG`
//! overrides the verbosity-derived base level, and `--log.filter` layers
//! additional directives on top.

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::LogArgs;

pub fn init(args: &LogArgs) -> Result<()> {
    let filter = if args.quiet {
        EnvFilter::new("error")
    } else {
        let base_level = match args.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

        if let Some(custom) = &args.filter {
            for directive in custom.split(',') {
                if let Ok(d) = directive.parse() {
                    filter = filter.add_directive(d);
                }
            }
        }

        filter
    };

    tracing_subscriber::fmt().with_env_filter(filter).without_time().init();
    Ok(())
}
