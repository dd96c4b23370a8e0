use std::{path::Path, sync::Arc};

use anyhow::{ensure, Context as _, Result};
use bytesize::ByteSize;
use database::{Database, DatabaseMode};
use era_store::EraStore;
use http_api::{HttpApi, HttpApiConfig};
use log::info;
use types::config::Spec;
use validator_performance::Cancellation;

use crate::atlas_args::{
    AtlasCommand, EraInfoOptions, PerfOptions, ServeOptions, TilesOptions,
};

// MDBX maps the whole geometry lazily; this is an upper bound, not an
// allocation.
const DATABASE_MAX_SIZE: ByteSize = ByteSize::gib(256);

pub fn run(command: AtlasCommand) -> Result<()> {
    match command {
        AtlasCommand::Perf(options) => perf(options),
        AtlasCommand::Tiles(options) => tiles(options),
        AtlasCommand::Serve(options) => serve(options),
        AtlasCommand::EraInfo(options) => era_info(&options),
    }
}

fn load_spec(path: Option<&Path>) -> Result<Spec> {
    let Some(path) = path else {
        return Ok(Spec::mainnet());
    };

    let bytes = fs_err::read(path)?;

    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse spec file {}", path.display()))
}

fn perf(options: PerfOptions) -> Result<()> {
    let PerfOptions {
        era_dir,
        perf_db_path,
        spec,
        start_epoch,
        end_epoch,
        workers,
    } = options;

    ensure!(
        (1..=128).contains(&workers),
        "invalid worker count: {workers}",
    );

    let spec = load_spec(spec.as_deref())?;

    let database = Database::persistent(
        "perf",
        perf_db_path,
        DATABASE_MAX_SIZE,
        DatabaseMode::ReadWrite,
    )?;

    let era_store = EraStore::load(era_dir).context("failed to index era store")?;

    let (start_epoch, end_epoch) =
        validator_performance::clamped_range(&spec, &era_store, start_epoch, end_epoch)?;

    let cancellation = Arc::new(Cancellation::new());

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let mut computation = tokio::task::spawn_blocking({
            let cancellation = Arc::clone(&cancellation);

            move || {
                validator_performance::update_performance(
                    &database,
                    &spec,
                    &era_store,
                    start_epoch,
                    end_epoch,
                    workers,
                    &cancellation,
                )
            }
        });

        tokio::select! {
            result = &mut computation => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, cancelling");
                cancellation.cancel();
                computation.await?
            }
        }
    })
}

fn tiles(options: TilesOptions) -> Result<()> {
    let TilesOptions {
        perf_db_path,
        tiles_db_path,
        start_epoch,
        end_epoch,
    } = options;

    let perf_db = Database::persistent(
        "perf",
        perf_db_path,
        DATABASE_MAX_SIZE,
        DatabaseMode::ReadOnly,
    )?;

    let tiles_db = Database::persistent(
        "tiles",
        tiles_db_path,
        DATABASE_MAX_SIZE,
        DatabaseMode::ReadWrite,
    )?;

    tiles::update_tiles(&tiles_db, &perf_db, start_epoch, end_epoch)
}

fn serve(options: ServeOptions) -> Result<()> {
    let ServeOptions {
        tiles_db_path,
        listen_addr,
        public_endpoint,
        site_title,
    } = options;

    let tiles_db = Database::persistent(
        "tiles",
        tiles_db_path,
        DATABASE_MAX_SIZE,
        DatabaseMode::ReadOnly,
    )?;

    let http_api = HttpApi {
        tiles_db: Arc::new(tiles_db),
        config: HttpApiConfig {
            address: listen_addr,
            public_endpoint,
            site_title,
        },
    };

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        tokio::select! {
            result = http_api.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, closing server");
                Ok(())
            }
        }
    })
}

fn era_info(options: &EraInfoOptions) -> Result<()> {
    let summaries = era_store::summarize_era_file(&options.path)?;

    for summary in summaries {
        println!(
            "group with terminal state at slot {}: {} blocks present",
            summary.state_slot, summary.blocks_present,
        );
    }

    Ok(())
}
