use anyhow::Result;
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

/// Initializes the process-wide subscriber. Workspace crates log through
/// the `log` facade; the default `tracing-log` bridge picks those records
/// up. `ATLAS_LOG` overrides the per-crate defaults.
pub fn initialize_logger(default_level: LevelFilter) -> Result<()> {
    let mut filter = EnvFilter::default().add_directive(default_level.into());

    if let Ok(env_filter) = EnvFilter::try_from_env("ATLAS_LOG") {
        for directive in env_filter.to_string().split(',') {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    fmt()
        .compact()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}
