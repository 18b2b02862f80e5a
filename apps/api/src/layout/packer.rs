//! Page/Column Packer — deterministic greedy assignment of content blocks to
//! fixed-capacity pages and columns.
//!
//! Blocks are processed in the caller-supplied semantic order (instruction →
//! passage → options → translation). A column's running total never exceeds
//! `page_capacity - safety_margin`, except where it holds one half of a split
//! block. At most one designated splittable block is split per plan, at its
//! character midpoint, with both halves re-estimated. Identical input always
//! yields an identical plan.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::layout::estimator::{estimate_height, BlockKind, ContentBlock, TextMetrics};
use crate::layout::LayoutError;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Static packing configuration. Column count per page is configuration, not
/// computed — 2 for the standard exam sheet, 1 for single-column layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackerConfig {
    pub page_capacity_px: f32,
    /// Deduction absorbing height-estimation inaccuracy.
    pub safety_margin_px: f32,
    pub columns_per_page: u8,
    pub splittable_kinds: HashSet<BlockKind>,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            page_capacity_px: 998.0,
            safety_margin_px: 50.0,
            columns_per_page: 2,
            splittable_kinds: HashSet::from([BlockKind::Translation]),
        }
    }
}

impl PackerConfig {
    pub fn effective_capacity(&self) -> f32 {
        self.page_capacity_px - self.safety_margin_px
    }
}

/// One half of a split block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlockPart {
    pub kind: BlockKind,
    pub text: String,
    pub estimated_height: f32,
    /// 0 for the first half, 1 for the second.
    pub part_index: u8,
}

/// A column slot: either a whole block or one half of a split block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnEntry {
    Block(ContentBlock),
    Part(ContentBlockPart),
}

impl ColumnEntry {
    pub fn estimated_height(&self) -> f32 {
        match self {
            ColumnEntry::Block(b) => b.estimated_height,
            ColumnEntry::Part(p) => p.estimated_height,
        }
    }
}

/// One printed page: ordered columns, each an ordered list of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub columns: Vec<Vec<ColumnEntry>>,
}

/// The engine's final layout output, consumed by the external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPlan {
    pub pages: Vec<PageLayout>,
}

// ────────────────────────────────────────────────────────────────────────────
// Packing
// ────────────────────────────────────────────────────────────────────────────

/// Packs ordered content blocks into pages and columns.
///
/// Per block:
/// 1. fits in the current column → append;
/// 2. alone exceeds the effective capacity and is splittable → split at the
///    character midpoint, first half in the current column (or a fresh one),
///    second half at the start of the next column;
/// 3. alone exceeds the effective capacity and is not splittable →
///    `LayoutError::Overflow`;
/// 4. otherwise → close the column and start a new one with this block.
pub fn pack(
    blocks: &[ContentBlock],
    config: &PackerConfig,
    metrics: &TextMetrics,
) -> Result<LayoutPlan, LayoutError> {
    let effective = config.effective_capacity();
    let mut state = PackState::new(config.columns_per_page.max(1) as usize);
    let mut split_used = false;

    for block in blocks {
        let height = block.estimated_height;

        if state.running + height <= effective {
            state.push(ColumnEntry::Block(block.clone()));
        } else if height > effective && config.splittable_kinds.contains(&block.kind) {
            if split_used {
                // only one designated block may be split per plan
                return Err(LayoutError::Overflow {
                    kind: block.kind,
                    height_px: height,
                    capacity_px: effective,
                });
            }
            split_used = true;

            let (first, second) = split_at_char_midpoint(block, metrics);
            if state.running + first.estimated_height > effective {
                state.close_column();
            }
            state.push(ColumnEntry::Part(first));
            state.close_column();
            state.push(ColumnEntry::Part(second));
        } else if height > effective {
            return Err(LayoutError::Overflow {
                kind: block.kind,
                height_px: height,
                capacity_px: effective,
            });
        } else {
            state.close_column();
            state.push(ColumnEntry::Block(block.clone()));
        }
    }

    Ok(state.finish())
}

/// Splits a block's text at the character midpoint and re-estimates each half.
fn split_at_char_midpoint(
    block: &ContentBlock,
    metrics: &TextMetrics,
) -> (ContentBlockPart, ContentBlockPart) {
    let char_count = block.text.chars().count();
    let byte_mid = block
        .text
        .char_indices()
        .nth(char_count / 2)
        .map(|(i, _)| i)
        .unwrap_or(block.text.len());
    let (first_text, second_text) = block.text.split_at(byte_mid);

    let part = |text: &str, part_index: u8| ContentBlockPart {
        kind: block.kind,
        text: text.to_string(),
        estimated_height: estimate_height(text, metrics),
        part_index,
    };

    (part(first_text, 0), part(second_text, 1))
}

// ────────────────────────────────────────────────────────────────────────────
// Internal pack state
// ────────────────────────────────────────────────────────────────────────────

struct PackState {
    pages: Vec<PageLayout>,
    page_columns: Vec<Vec<ColumnEntry>>,
    column: Vec<ColumnEntry>,
    running: f32,
    columns_per_page: usize,
}

impl PackState {
    fn new(columns_per_page: usize) -> Self {
        Self {
            pages: Vec::new(),
            page_columns: Vec::new(),
            column: Vec::new(),
            running: 0.0,
            columns_per_page,
        }
    }

    fn push(&mut self, entry: ColumnEntry) {
        self.running += entry.estimated_height();
        self.column.push(entry);
    }

    fn close_column(&mut self) {
        if !self.column.is_empty() {
            self.page_columns.push(std::mem::take(&mut self.column));
        }
        self.running = 0.0;
        if self.page_columns.len() == self.columns_per_page {
            self.close_page();
        }
    }

    fn close_page(&mut self) {
        if !self.page_columns.is_empty() {
            self.pages.push(PageLayout {
                page_index: self.pages.len(),
                columns: std::mem::take(&mut self.page_columns),
            });
        }
    }

    fn finish(mut self) -> LayoutPlan {
        self.close_column();
        self.close_page();
        LayoutPlan { pages: self.pages }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: BlockKind, height: f32) -> ContentBlock {
        ContentBlock {
            kind,
            text: "x".to_string(),
            estimated_height: height,
        }
    }

    fn single_column_config() -> PackerConfig {
        PackerConfig {
            page_capacity_px: 998.0,
            safety_margin_px: 50.0,
            columns_per_page: 1,
            splittable_kinds: HashSet::new(),
        }
    }

    /// Sum of entry heights per column, with a flag for split-part columns.
    fn column_totals(plan: &LayoutPlan) -> Vec<(f32, bool)> {
        plan.pages
            .iter()
            .flat_map(|p| p.columns.iter())
            .map(|col| {
                let total = col.iter().map(|e| e.estimated_height()).sum();
                let has_part = col.iter().any(|e| matches!(e, ColumnEntry::Part(_)));
                (total, has_part)
            })
            .collect()
    }

    #[test]
    fn test_pack_scenario_400_500_700() {
        // §8 scenario: effective 948 — blocks 1+2 share a column (900 ≤ 948),
        // block 3 opens page 2 in the single-column configuration
        let blocks = vec![
            block(BlockKind::Instruction, 400.0),
            block(BlockKind::Passage, 500.0),
            block(BlockKind::Translation, 700.0),
        ];
        let plan = pack(&blocks, &single_column_config(), &TextMetrics::default()).unwrap();

        assert_eq!(plan.pages.len(), 2);
        assert_eq!(plan.pages[0].columns.len(), 1);
        assert_eq!(plan.pages[0].columns[0].len(), 2);
        assert_eq!(plan.pages[1].columns[0].len(), 1);
        assert_eq!(plan.pages[0].page_index, 0);
        assert_eq!(plan.pages[1].page_index, 1);
    }

    #[test]
    fn test_pack_two_columns_fill_one_page() {
        let blocks = vec![
            block(BlockKind::Instruction, 400.0),
            block(BlockKind::Passage, 500.0),
            block(BlockKind::Translation, 700.0),
        ];
        let config = PackerConfig {
            columns_per_page: 2,
            splittable_kinds: HashSet::new(),
            ..PackerConfig::default()
        };
        let plan = pack(&blocks, &config, &TextMetrics::default()).unwrap();

        assert_eq!(plan.pages.len(), 1, "two columns → everything fits page 1");
        assert_eq!(plan.pages[0].columns.len(), 2);
        assert_eq!(plan.pages[0].columns[1].len(), 1);
    }

    #[test]
    fn test_pack_idempotent() {
        let blocks = vec![
            block(BlockKind::Instruction, 120.0),
            block(BlockKind::Passage, 800.0),
            block(BlockKind::Options, 300.0),
            block(BlockKind::Translation, 640.0),
        ];
        let config = PackerConfig::default();
        let metrics = TextMetrics::default();

        let first = pack(&blocks, &config, &metrics).unwrap();
        let second = pack(&blocks, &config, &metrics).unwrap();
        assert_eq!(first, second, "identical input must yield an identical plan");
    }

    #[test]
    fn test_pack_capacity_invariant() {
        let blocks = vec![
            block(BlockKind::Instruction, 120.0),
            block(BlockKind::Passage, 700.0),
            block(BlockKind::Options, 400.0),
            block(BlockKind::Passage, 600.0),
            block(BlockKind::Options, 200.0),
            block(BlockKind::Translation, 900.0),
        ];
        let config = PackerConfig::default();
        let plan = pack(&blocks, &config, &TextMetrics::default()).unwrap();

        for (total, has_part) in column_totals(&plan) {
            if !has_part {
                assert!(
                    total <= config.effective_capacity() + 1e-3,
                    "column total {total} exceeds effective capacity"
                );
            }
        }
    }

    #[test]
    fn test_pack_splits_oversize_translation() {
        let metrics = TextMetrics::default();
        let long_text = "word ".repeat(500); // far taller than one column
        let oversize = crate::layout::estimator::make_block(
            BlockKind::Translation,
            long_text.clone(),
            &metrics,
        );
        assert!(oversize.estimated_height > PackerConfig::default().effective_capacity());

        let blocks = vec![block(BlockKind::Instruction, 100.0), oversize];
        let plan = pack(&blocks, &PackerConfig::default(), &metrics).unwrap();

        let parts: Vec<&ContentBlockPart> = plan
            .pages
            .iter()
            .flat_map(|p| p.columns.iter())
            .flatten()
            .filter_map(|e| match e {
                ColumnEntry::Part(p) => Some(p),
                _ => None,
            })
            .collect();

        assert_eq!(parts.len(), 2, "exactly one block split into two parts");
        assert_eq!(parts[0].part_index, 0);
        assert_eq!(parts[1].part_index, 1);
        assert_eq!(
            format!("{}{}", parts[0].text, parts[1].text),
            long_text,
            "the two halves must concatenate to the original text"
        );
    }

    #[test]
    fn test_pack_oversize_non_splittable_is_overflow() {
        let blocks = vec![block(BlockKind::Passage, 2000.0)];
        let result = pack(&blocks, &PackerConfig::default(), &TextMetrics::default());
        assert!(matches!(
            result,
            Err(LayoutError::Overflow {
                kind: BlockKind::Passage,
                ..
            })
        ));
    }

    #[test]
    fn test_pack_empty_blocks_empty_plan() {
        let plan = pack(&[], &PackerConfig::default(), &TextMetrics::default()).unwrap();
        assert!(plan.pages.is_empty());
    }

    #[test]
    fn test_pack_exact_fit_stays_in_column() {
        let config = single_column_config(); // effective 948
        let blocks = vec![
            block(BlockKind::Instruction, 448.0),
            block(BlockKind::Passage, 500.0), // exactly 948
        ];
        let plan = pack(&blocks, &config, &TextMetrics::default()).unwrap();
        assert_eq!(plan.pages.len(), 1);
        assert_eq!(plan.pages[0].columns[0].len(), 2);
    }
}
