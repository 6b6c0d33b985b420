use crate::{
    grid::{GridPoint, Rotation},
    layer::LayerId,
    module::ModuleId,
    rule::RuleId,
};
use serde::{Deserialize, Serialize};

/// A single cell in a [GridMap](crate::GridMap). A cell is either empty, the
/// origin of a placed module, or a child cell covered by a multi-cell module.
///
/// For modules with footprints bigger than 1x1, every covered cell holds the
/// same module/rotation/rule/layer as the origin, and all non-origin cells
/// store the flat grid index of the origin in `parent`. Only the origin ever
/// owns instance or terrain data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub(super) position: GridPoint,
    pub(super) rotation: Rotation,
    pub(super) module: Option<ModuleId>,
    pub(super) rule: Option<RuleId>,
    pub(super) layer: Option<LayerId>,
    pub(super) parent: Option<usize>,
}

impl Cell {
    pub(super) fn new(position: GridPoint) -> Self {
        Self {
            position,
            rotation: Rotation::North,
            module: None,
            rule: None,
            layer: None,
            parent: None,
        }
    }

    pub fn position(&self) -> GridPoint {
        self.position
    }

    /// Rotation of the module placed here. Meaningless for empty cells.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// The module that covers this cell, if any
    pub fn module(&self) -> Option<&ModuleId> {
        self.module.as_ref()
    }

    /// The rule that produced this cell's module, if any. Modules can be
    /// placed without a rule, e.g. by hand.
    pub fn rule(&self) -> Option<&RuleId> {
        self.rule.as_ref()
    }

    /// The layer that produced this cell's module, if any
    pub fn layer(&self) -> Option<&LayerId> {
        self.layer.as_ref()
    }

    /// Flat index of this cell's origin, if this is a child cell of a
    /// multi-cell module
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Is nothing placed here? A child cell is never empty.
    pub fn is_empty(&self) -> bool {
        self.module.is_none() && self.parent.is_none()
    }

    /// Is this the origin cell of a placed module?
    pub fn is_origin(&self) -> bool {
        self.module.is_some() && self.parent.is_none()
    }

    /// Reset this cell to empty
    pub(super) fn clear(&mut self) {
        self.rotation = Rotation::North;
        self.module = None;
        self.rule = None;
        self.layer = None;
        self.parent = None;
    }
}
