//! Per-frame target-to-mask resolution.

use std::collections::HashMap;

use crate::layer::{Layer, LayerKind};
use crate::record::MAX_LAYERS;

/// Ephemeral map from target layer id to the snapshot index of the mask
/// that clips it.
///
/// Built once per frame by scanning the snapshot for Mask-type layers
/// with non-empty target lists. The first mask (in scan order) that
/// names a target wins; later masks naming the same target are ignored.
/// Negative target ids are skipped; ids that match no layer are simply
/// entries nothing looks up.
#[derive(Debug, Default)]
pub struct MaskIndex {
    by_target: HashMap<i32, usize>,
}

impl MaskIndex {
    /// Scan a snapshot and build the index.
    pub fn build(snapshot: &[Layer]) -> Self {
        let mut by_target = HashMap::new();
        for (index, layer) in snapshot.iter().enumerate() {
            if layer.kind != LayerKind::Mask || layer.mask.targets.is_empty() {
                continue;
            }
            for &target_id in layer.mask.targets.iter().take(MAX_LAYERS) {
                if target_id < 0 {
                    continue;
                }
                by_target.entry(target_id).or_insert(index);
            }
        }
        Self { by_target }
    }

    /// The snapshot index of the mask clipping `target_id`, if any.
    pub fn mask_for(&self, target_id: i32) -> Option<usize> {
        self.by_target.get(&target_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
