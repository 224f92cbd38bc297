use std::{path::PathBuf, time::Instant};

use anyhow::Result;
use clap::Args;

use super::{format_elapsed, open_store};

/// Print depot id, encryption flag, shard count and chunk count of a store
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Base name of the store (e.g. `depotcache/228990_depotcache`). A path
    /// to one of its `.csm` or `.csd` files works as well.
    pub base: PathBuf,
}

/// Run the `info` command
pub fn run_info(args: InfoArgs) -> Result<()> {
    let start = Instant::now();
    let store = open_store(&args.base)?;
    let summary = store.summary();

    println!("Base:      {}", store.base_name().display());
    println!("Depot:     {}", summary.depot_id);
    println!("Encrypted: {}", summary.encrypted);
    println!("Shards:    {}", summary.shard_count);
    println!("Chunks:    {}", summary.chunk_count);

    eprintln!("Loaded store in {}", format_elapsed(start.elapsed()));

    Ok(())
}
