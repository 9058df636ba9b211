//! `tile` command: drive the resolver until one tile is decoded.

use std::path::PathBuf;

use clap::Args;
use skylayer::codec::Textured;
use skylayer::coord::{TilePos, MAX_DEPTH};
use skylayer::resolver::{ResolveFlags, TileStatus};

use super::common::{load_config, poll_until, Session};
use crate::error::CliError;

/// Arguments of `skylayer tile`.
#[derive(Debug, Args)]
pub struct TileArgs {
    /// Survey root URL (http(s), file:// or a local path)
    pub url: String,

    /// Quadtree depth (HiPS order)
    #[arg(long)]
    pub depth: i32,

    /// Nested pixel index at that depth
    #[arg(long)]
    pub index: u64,

    /// Write the decoded tile to this PNG file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Check that `index` exists at `depth` (12 faces of 4^depth pixels).
fn validate(depth: i32, index: u64) -> Result<TilePos, CliError> {
    if !(0..=MAX_DEPTH).contains(&depth) {
        return Err(CliError::InvalidArgument(format!(
            "depth must be between 0 and {}",
            MAX_DEPTH
        )));
    }
    let pixels = 12u64 << (2 * depth);
    if index >= pixels {
        return Err(CliError::InvalidArgument(format!(
            "index must be below {} at depth {}",
            pixels, depth
        )));
    }
    Ok(TilePos::new(depth, index))
}

pub fn run(args: TileArgs) -> Result<(), CliError> {
    let pos = validate(args.depth, args.index)?;
    let config = load_config();
    let mut session = Session::open(&args.url, &config)?;
    session.wait_ready()?;

    println!("Resolving {} from {}", pos, session.survey.tile_url(pos));
    let flags = ResolveFlags::new().load_in_thread();
    let mut resolution = None;
    let settled = {
        let Session {
            resolver,
            survey,
            cache,
            timeout,
        } = &mut session;
        poll_until(*timeout, || {
            let res = resolver.resolve(survey, cache, pos, flags);
            let done = !matches!(res.status, TileStatus::Pending | TileStatus::Unreachable);
            resolution = Some(res);
            done
        })
    };

    let tile = pos.to_string();
    let resolution = match resolution {
        Some(res) if settled => res,
        _ => {
            return Err(CliError::Timeout {
                what: format!("tile {}", tile),
                secs: session.timeout.as_secs(),
            })
        }
    };

    let payload = match (resolution.status, resolution.payload) {
        (TileStatus::Ok, Some(payload)) => payload,
        (TileStatus::NotFound, _) => {
            return Err(CliError::Tile {
                tile,
                reason: "does not exist in this survey".to_string(),
            })
        }
        (status, _) => {
            return Err(CliError::Tile {
                tile,
                reason: format!("could not be loaded ({:?})", status),
            })
        }
    };

    println!("  Size: {}x{} px", payload.width(), payload.height());
    if let Some(parent) = pos.parent() {
        if let Some(parent_tile) = session.cache.peek(&session.survey.key(parent)) {
            println!("  Parent missing quadrants: {:04b}", parent_tile.missing_children().bits());
        }
    }

    if let Some(path) = args.output {
        let Some(texture) = payload.texture() else {
            return Err(CliError::Tile {
                tile,
                reason: "has no pixels to write".to_string(),
            });
        };
        texture
            .to_image()
            .save(&path)
            .map_err(|error| CliError::FileWrite {
                path: path.display().to_string(),
                error,
            })?;
        println!("  Written to {}", path.display());
    }
    Ok(())
}
