use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use types::primitives::Epoch;

/// Build and serve a maps-like view of validator attestation performance,
/// reconstructed from era archives.
#[derive(Parser)]
#[clap(version, verbatim_doc_comment)]
pub struct AtlasArgs {
    /// Default log level; `ATLAS_LOG` refines it per crate.
    #[clap(long, default_value = "info", global = true)]
    pub log_level: String,

    #[clap(subcommand)]
    pub command: AtlasCommand,
}

#[derive(Subcommand)]
pub enum AtlasCommand {
    /// Compute per-epoch validator performance records from era archives.
    Perf(PerfOptions),
    /// Build the tile pyramid from stored performance records.
    Tiles(TilesOptions),
    /// Serve tile PNGs and the index page over HTTP.
    Serve(ServeOptions),
    /// Print the group layout of an era file.
    EraInfo(EraInfoOptions),
}

#[derive(Args)]
pub struct PerfOptions {
    /// Directory of .era files.
    #[clap(long)]
    pub era_dir: PathBuf,

    /// Performance database location.
    #[clap(long, default_value = "perf_db")]
    pub perf_db_path: PathBuf,

    /// Chain spec file in JSON form; mainnet when omitted.
    #[clap(long)]
    pub spec: Option<PathBuf>,

    /// Start epoch (inclusive) of the range to compute.
    #[clap(long, default_value_t = 0)]
    pub start_epoch: Epoch,

    /// End epoch (exclusive) of the range to compute.
    #[clap(long, default_value_t = Epoch::MAX)]
    pub end_epoch: Epoch,

    /// Worker threads, between 1 and 128.
    #[clap(long, default_value_t = 8)]
    pub workers: usize,
}

#[derive(Args)]
pub struct TilesOptions {
    /// Performance database to read from.
    #[clap(long, default_value = "perf_db")]
    pub perf_db_path: PathBuf,

    /// Tile database to write to.
    #[clap(long, default_value = "tiles_db")]
    pub tiles_db_path: PathBuf,

    /// Start epoch (inclusive) of the tile columns to rebuild.
    #[clap(long, default_value_t = 0)]
    pub start_epoch: Epoch,

    /// End epoch (exclusive) of the tile columns to rebuild.
    #[clap(long, default_value_t = Epoch::MAX)]
    pub end_epoch: Epoch,
}

#[derive(Args)]
pub struct ServeOptions {
    /// Tile database to serve from.
    #[clap(long, default_value = "tiles_db")]
    pub tiles_db_path: PathBuf,

    /// Listen address to bind to.
    #[clap(long, default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Public endpoint clients should fetch tiles from.
    #[clap(long, default_value = "http://127.0.0.1:8080")]
    pub public_endpoint: String,

    /// Title of the index page.
    #[clap(long, default_value = "validator atlas | mainnet")]
    pub site_title: String,
}

#[derive(Args)]
pub struct EraInfoOptions {
    /// Era file to inspect.
    pub path: PathBuf,
}
