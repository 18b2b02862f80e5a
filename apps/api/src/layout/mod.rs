// Layout-Fitting: heuristic height estimation + page/column packing.
// Pure CPU-bound functions — no LLM calls, no I/O.

pub mod estimator;
pub mod packer;

use thiserror::Error;

// Re-export the public API consumed by other modules (handlers, state).
pub use estimator::{estimate_height, make_block, BlockKind, ContentBlock, TextMetrics};
pub use packer::{pack, LayoutPlan, PackerConfig};

/// Layout failures surfaced to the caller (e.g. ask for a shorter translation).
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A non-splittable block is taller than one column even after the
    /// safety-margin adjustment.
    #[error("layout overflow: {kind:?} block of {height_px:.0}px exceeds the usable column height of {capacity_px:.0}px")]
    Overflow {
        kind: BlockKind,
        height_px: f32,
        capacity_px: f32,
    },
}
