use crate::layers::LayerSet;

/// Extra stroke weight applied to the selected ward, on top of its
/// build-time default.
pub const EMPHASIS_DELTA: f64 = 2.0;

/// Tracks the single highlighted ward across both collections.
///
/// Two states: unselected, or selected with a ward name. The controller
/// never outlives its layer set's dataset — a reload builds fresh layers
/// and resets the controller, so a click that races a reload resolves
/// against the new set and becomes a no-op when the ward id is gone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionController {
    selected: Option<String>,
}

impl SelectionController {
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Click transition. Restores the previous ward's recorded weight,
    /// emphasizes the clicked ward from its recorded default (so reselecting
    /// is idempotent), and bumps it to the front of the draw order.
    ///
    /// Returns `false` for a ward the layer set does not know — the stale
    /// click case.
    pub fn select(&mut self, layers: &mut LayerSet, ward: &str) -> bool {
        if !layers.contains(ward) {
            return false;
        }

        if let Some(previous) = self.selected.take()
            && previous != ward
        {
            layers.restore_weight(&previous);
        }

        layers.emphasize(ward, EMPHASIS_DELTA);
        layers.bring_to_front(ward);
        self.selected = Some(ward.to_string());
        true
    }

    /// Drop the selection, reverting any emphasis.
    pub fn clear(&mut self, layers: &mut LayerSet) {
        if let Some(previous) = self.selected.take() {
            layers.restore_weight(&previous);
        }
    }
}
