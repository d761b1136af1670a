// Overlay registry: which markers and lines this session has put on the map

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::core::filter::FilteredRoster;
use crate::core::ports::MapSurface;
use crate::core::track::{Bounds, LatLng};

pub fn roster_marker_id(unique_id: &str) -> String {
    format!("device:{unique_id}")
}

pub fn live_marker_id(unique_id: &str) -> String {
    format!("live:{unique_id}")
}

/// Forwards drawing calls to the surface and remembers what is on it, so one
/// session can clean up exactly its own overlays.
pub struct OverlayRegistry {
    surface: Arc<dyn MapSurface>,
    markers: BTreeSet<String>,
    polylines: BTreeSet<String>,
}

impl OverlayRegistry {
    pub fn new(surface: Arc<dyn MapSurface>) -> Self {
        Self {
            surface,
            markers: BTreeSet::new(),
            polylines: BTreeSet::new(),
        }
    }

    pub fn set_view(&self, center: LatLng, zoom: u8) {
        self.surface.set_view(center, zoom);
    }

    pub fn fit_bounds(&self, bounds: &Bounds) {
        self.surface.fit_bounds(bounds);
    }

    pub fn place_marker(&mut self, id: &str, position: LatLng, transition: Duration) {
        self.surface.place_marker(id, position, transition);
        self.markers.insert(id.to_string());
    }

    pub fn remove_marker(&mut self, id: &str) {
        if self.markers.remove(id) {
            self.surface.remove_marker(id);
        }
    }

    pub fn draw_polyline(&mut self, id: &str, path: &[LatLng]) {
        self.surface.draw_polyline(id, path);
        self.polylines.insert(id.to_string());
    }

    pub fn remove_polyline(&mut self, id: &str) {
        if self.polylines.remove(id) {
            self.surface.remove_polyline(id);
        }
    }

    /// Removes every overlay whose id starts with `prefix`.
    pub fn clear_prefix(&mut self, prefix: &str) {
        let markers: Vec<String> = self.markers.iter().filter(|id| id.starts_with(prefix)).cloned().collect();
        for id in markers {
            self.remove_marker(&id);
        }
        let lines: Vec<String> = self.polylines.iter().filter(|id| id.starts_with(prefix)).cloned().collect();
        for id in lines {
            self.remove_polyline(&id);
        }
    }

    /// Makes the roster markers on the map match `filtered`.
    pub fn sync_roster(&mut self, filtered: &FilteredRoster) {
        let wanted: BTreeSet<String> = filtered.keys().map(|id| roster_marker_id(id)).collect();
        let stale: Vec<String> = self
            .markers
            .iter()
            .filter(|id| id.starts_with("device:") && !wanted.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            self.remove_marker(&id);
        }
        for device in filtered.values() {
            self.place_marker(&roster_marker_id(&device.unique_id), device.position(), Duration::ZERO);
        }
    }

    pub fn clear(&mut self) {
        self.clear_prefix("");
    }

    #[cfg(test)]
    pub fn marker_ids(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(String::as_str)
    }

    #[cfg(test)]
    pub fn has_marker(&self, id: &str) -> bool {
        self.markers.contains(id)
    }
}
