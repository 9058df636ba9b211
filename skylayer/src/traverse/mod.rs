//! Breadth-first quadtree traversal.
//!
//! The walk starts from the 12 base faces and asks a visitor what to do with
//! each node. Expanded nodes enqueue their four children. The queue has a
//! fixed capacity; running out of room is reported as an error instead of
//! silently dropping nodes, so visitors must bound the depth they expand to.

mod render;

pub use render::{render_order, render_traverse, RenderPlan, View, MAX_RENDER_ORDER};

use std::collections::VecDeque;

use thiserror::Error;

use crate::coord::TilePos;

/// Default queue capacity.
pub const QUEUE_CAPACITY: usize = 1024;

/// Visitor decision for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Do not descend below this node.
    Stop,
    /// Enqueue the four children.
    Expand,
    /// End the whole traversal now.
    Abort,
}

/// Errors raised by a traversal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraverseError {
    /// Expanding a node would exceed the queue capacity.
    #[error("Traversal queue overflow (capacity {capacity})")]
    QueueOverflow { capacity: usize },
}

/// Summary of a finished traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traversal {
    /// Nodes handed to the visitor.
    pub visited: usize,
    /// The visitor stopped the walk early.
    pub aborted: bool,
}

/// Walk the forest with the default queue capacity.
pub fn traverse<F>(visit: F) -> Result<Traversal, TraverseError>
where
    F: FnMut(TilePos) -> Visit,
{
    traverse_with_capacity(QUEUE_CAPACITY, visit)
}

/// Walk the forest with a queue holding at most `capacity` nodes.
pub fn traverse_with_capacity<F>(capacity: usize, mut visit: F) -> Result<Traversal, TraverseError>
where
    F: FnMut(TilePos) -> Visit,
{
    let mut queue: VecDeque<TilePos> = VecDeque::with_capacity(capacity);
    queue.extend(TilePos::roots());
    let mut summary = Traversal::default();

    while let Some(pos) = queue.pop_front() {
        summary.visited += 1;
        match visit(pos) {
            Visit::Stop => {}
            Visit::Abort => {
                summary.aborted = true;
                break;
            }
            Visit::Expand => {
                if queue.len() + 4 >= capacity {
                    return Err(TraverseError::QueueOverflow { capacity });
                }
                queue.extend(pos.children());
            }
        }
    }
    Ok(summary)
}
