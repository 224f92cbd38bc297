use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use chunkstore_core::ChunkHash;
use clap::Args;

use super::{hash_error::IntoHashArgError, open_store};

/// Write the raw bytes of a chunk to stdout or a file. The bytes are
/// written exactly as stored, encrypted stores yield encrypted chunks.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Base name of the store
    pub base: PathBuf,

    /// The chunk's hash as 40 hex characters
    pub hash: String,

    /// Write the chunk to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the `get` command
pub fn run_get(args: GetArgs) -> Result<()> {
    let hash = args
        .hash
        .parse::<ChunkHash>()
        .map_err(|e| e.into_hash_arg_error(&args.hash))?;

    let store = open_store(&args.base)?;
    let chunk = store.read(&hash)?;

    match args.output {
        Some(path) => fs::write(&path, &chunk)
            .with_context(|| format!("Unable to write chunk to `{}'", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&chunk)?;
            stdout.flush()?;
        }
    }

    eprintln!("Read {} bytes of chunk {}", chunk.len(), hash);

    Ok(())
}
