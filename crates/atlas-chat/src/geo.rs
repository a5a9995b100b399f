//! Map-mode tracking and viewport snapshots.

use atlas_core::GeoSnapshot;

/// Whether map mode is on, and the last viewport the map widget reported.
#[derive(Debug, Clone, Default)]
pub struct GeoContext {
    map_mode: bool,
    viewport: Option<GeoSnapshot>,
}

impl GeoContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_map_mode(&self) -> bool {
        self.map_mode
    }

    pub fn set_map_mode(&mut self, enabled: bool) {
        self.map_mode = enabled;
    }

    /// Flip map mode and return the new state.
    pub fn toggle_map_mode(&mut self) -> bool {
        self.map_mode = !self.map_mode;
        self.map_mode
    }

    /// Record the viewport after the map widget moves or zooms.
    pub fn set_viewport(&mut self, viewport: GeoSnapshot) {
        self.viewport = Some(viewport);
    }

    /// Bounding box to attach to the next turn.
    ///
    /// `None` whenever map mode is off, regardless of the last known viewport.
    pub fn snapshot(&self) -> Option<GeoSnapshot> {
        if self.map_mode {
            self.viewport
        } else {
            None
        }
    }
}
