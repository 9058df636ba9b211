//! `traverse` command: breadth-first expansion to a fixed depth.
//!
//! Shows how many nodes a full-sky walk touches and where the bounded queue
//! gives up.

use clap::Args;
use skylayer::traverse::{traverse_with_capacity, Visit, QUEUE_CAPACITY};

use crate::error::CliError;

/// Arguments of `skylayer traverse`.
#[derive(Debug, Args)]
pub struct TraverseArgs {
    /// Deepest order to visit
    #[arg(long, default_value_t = 3)]
    pub depth: i32,

    /// Queue capacity
    #[arg(long, default_value_t = QUEUE_CAPACITY)]
    pub capacity: usize,
}

/// Count the nodes visited per depth when expanding everything above `depth`.
fn count_nodes(depth: i32, capacity: usize) -> Result<Vec<usize>, CliError> {
    let mut per_depth = vec![0usize; depth.max(0) as usize + 1];
    traverse_with_capacity(capacity, |pos| {
        per_depth[pos.depth as usize] += 1;
        if pos.depth < depth {
            Visit::Expand
        } else {
            Visit::Stop
        }
    })?;
    Ok(per_depth)
}

pub fn run(args: TraverseArgs) -> Result<(), CliError> {
    if args.depth < 0 {
        return Err(CliError::InvalidArgument("depth must not be negative".to_string()));
    }
    let per_depth = count_nodes(args.depth, args.capacity)?;
    for (depth, count) in per_depth.iter().enumerate() {
        println!("  Order {:>2}: {:>8} nodes", depth, count);
    }
    println!("Visited {} nodes", per_depth.iter().sum::<usize>());
    Ok(())
}
