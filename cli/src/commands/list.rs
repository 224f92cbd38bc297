use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::Result;
use clap::Args;

use super::{format_elapsed, open_store};

/// List all chunks of a store
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Base name of the store
    pub base: PathBuf,
}

/// Run the `list` command. Prints one line per chunk with its hash, shard,
/// offset and length, ordered by shard and offset.
pub fn run_list(args: ListArgs) -> Result<()> {
    let start = Instant::now();
    let store = open_store(&args.base)?;

    let stdout = io::stdout().lock();
    let mut writer = BufWriter::new(stdout);

    let mut count = 0;
    for (hash, loc) in store.chunks() {
        writeln!(
            writer,
            "{hash}\t{}\t{}\t{}",
            loc.shard_id, loc.offset, loc.length
        )?;
        count += 1;
    }
    writer.flush()?;

    eprintln!("Listed {} chunks in {}", count, format_elapsed(start.elapsed()));

    Ok(())
}
