// Marker filtering: derives the visible roster from the active category

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::device::Device;
use crate::core::error::TrackerError;

pub type FilteredRoster = BTreeMap<String, Device>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterCategory {
    #[default]
    All,
    Tracking,
    NonTracking,
    Offline,
    Dead,
    NoData,
    NoGps,
    Halt,
    Idle,
    Running,
}

impl FilterCategory {
    pub const CATEGORIES: [FilterCategory; 10] = [
        FilterCategory::All,
        FilterCategory::Tracking,
        FilterCategory::NonTracking,
        FilterCategory::Offline,
        FilterCategory::Dead,
        FilterCategory::NoData,
        FilterCategory::NoGps,
        FilterCategory::Halt,
        FilterCategory::Idle,
        FilterCategory::Running,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterCategory::All => "ALL",
            FilterCategory::Tracking => "TRACKING",
            FilterCategory::NonTracking => "NON_TRACKING",
            FilterCategory::Offline => "OFFLINE",
            FilterCategory::Dead => "DEAD",
            FilterCategory::NoData => "NO_DATA",
            FilterCategory::NoGps => "NO_GPS",
            FilterCategory::Halt => "HALT",
            FilterCategory::Idle => "IDLE",
            FilterCategory::Running => "RUNNING",
        }
    }

    /// Category after the user clicks `clicked` while `self` is active.
    pub fn toggled(self, clicked: FilterCategory) -> FilterCategory {
        if self == clicked {
            FilterCategory::All
        } else {
            clicked
        }
    }

    pub fn matches(&self, device: &Device) -> bool {
        if *self == FilterCategory::All {
            return true;
        }

        if device.is_non_tracking() {
            return match self {
                FilterCategory::NonTracking => true,
                FilterCategory::Dead => device.is_offline && device.is_battery_disconnected(),
                FilterCategory::NoData => device.has_no_data(),
                FilterCategory::Offline => {
                    device.is_offline
                        && !device.is_battery_disconnected()
                        && !device.has_no_data()
                }
                _ => false,
            };
        }

        match self {
            FilterCategory::Tracking => true,
            FilterCategory::NoGps => device.is_no_gps,
            FilterCategory::Halt => device.halt_status,
            FilterCategory::Idle => device.idling_status,
            FilterCategory::Running => !device.halt_status && !device.idling_status,
            _ => false,
        }
    }
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterCategory {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        FilterCategory::CATEGORIES
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| TrackerError::Decode(format!("unknown filter category: {s}")))
    }
}

/// Holds the active category, the last filtered roster and the marker
/// selection. The selection is always a subset of the filtered roster keys.
#[derive(Debug, Default)]
pub struct MarkerFilterEngine {
    category: FilterCategory,
    filtered: FilteredRoster,
    selection: BTreeSet<String>,
}

impl MarkerFilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(&self) -> FilterCategory {
        self.category
    }

    pub fn filtered(&self) -> &FilteredRoster {
        &self.filtered
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    /// Applies a user click on `clicked`; clicking the active category resets to ALL.
    pub fn select_category(&mut self, clicked: FilterCategory, roster: &[Device]) -> &FilteredRoster {
        self.category = self.category.toggled(clicked);
        self.recompute(roster)
    }

    pub fn recompute(&mut self, roster: &[Device]) -> &FilteredRoster {
        let previous = std::mem::take(&mut self.filtered);
        let category = self.category;

        self.filtered = roster
            .iter()
            .filter(|device| category.matches(device))
            .map(|device| {
                let mut entry = device.clone();
                entry.is_selected = previous
                    .get(&device.unique_id)
                    .map(|prev| prev.is_selected)
                    .unwrap_or(false);
                (entry.unique_id.clone(), entry)
            })
            .collect();

        let filtered = &self.filtered;
        self.selection.retain(|id| filtered.contains_key(id));

        &self.filtered
    }

    /// Returns `false` if `id` is not currently visible.
    pub fn set_selected(&mut self, id: &str, selected: bool) -> bool {
        let Some(entry) = self.filtered.get_mut(id) else {
            return false;
        };
        entry.is_selected = selected;
        if selected {
            self.selection.insert(id.to_string());
        } else {
            self.selection.remove(id);
        }
        true
    }


    /// Number of roster devices each category would show.
    pub fn counts(roster: &[Device]) -> BTreeMap<FilterCategory, usize> {
        FilterCategory::CATEGORIES
            .iter()
            .map(|c| (*c, roster.iter().filter(|d| c.matches(d)).count()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> Device {
        let mut d = Device::new(id, 12.0, 77.0);
        d.timestamp = Some(1_700_000_000);
        d
    }

    fn roster() -> Vec<Device> {
        let mut no_data = device("no_data");
        no_data.timestamp = None;

        let mut offline = device("offline");
        offline.is_offline = true;

        let mut dead = device("dead");
        dead.is_offline = true;
        dead.is_primary_battery = Some(false);

        let mut halted = device("halted");
        halted.halt_status = true;

        let mut idling = device("idling");
        idling.idling_status = true;

        let mut no_gps = device("no_gps");
        no_gps.is_no_gps = true;

        let running = device("running");

        vec![no_data, offline, dead, halted, idling, no_gps, running]
    }

    fn visible(engine: &MarkerFilterEngine) -> Vec<&str> {
        engine.filtered().keys().map(String::as_str).collect()
    }

    #[test]
    fn test_category_precedence() {
        let roster = roster();
        let mut engine = MarkerFilterEngine::new();

        let cases = [
            (FilterCategory::All, vec!["dead", "halted", "idling", "no_data", "no_gps", "offline", "running"]),
            (FilterCategory::Tracking, vec!["halted", "idling", "no_gps", "running"]),
            (FilterCategory::NonTracking, vec!["dead", "no_data", "offline"]),
            (FilterCategory::Offline, vec!["offline"]),
            (FilterCategory::Dead, vec!["dead"]),
            (FilterCategory::NoData, vec!["no_data"]),
            (FilterCategory::NoGps, vec!["no_gps"]),
            (FilterCategory::Halt, vec!["halted"]),
            (FilterCategory::Idle, vec!["idling"]),
            (FilterCategory::Running, vec!["no_gps", "running"]),
        ];

        for (category, expected) in cases {
            engine.category = category;
            engine.recompute(&roster);
            assert_eq!(visible(&engine), expected, "category {category}");
        }
    }

    #[test]
    fn test_unknown_battery_is_offline_not_dead() {
        let mut d = device("v");
        d.is_offline = true;
        d.is_primary_battery = None;
        assert!(FilterCategory::Offline.matches(&d));
        assert!(!FilterCategory::Dead.matches(&d));
    }

    #[test]
    fn test_no_data_device_scenario() {
        let mut v1 = device("v1");
        v1.timestamp = None;
        let roster = vec![v1];
        let mut engine = MarkerFilterEngine::new();

        engine.recompute(&roster);
        assert_eq!(visible(&engine), vec!["v1"]);

        engine.select_category(FilterCategory::NoData, &roster);
        assert_eq!(visible(&engine), vec!["v1"]);

        engine.select_category(FilterCategory::Offline, &roster);
        assert!(engine.filtered().is_empty());
    }

    #[test]
    fn test_toggle_resets_to_all() {
        let roster = roster();
        let mut engine = MarkerFilterEngine::new();

        engine.select_category(FilterCategory::Halt, &roster);
        assert_eq!(engine.category(), FilterCategory::Halt);
        engine.select_category(FilterCategory::Halt, &roster);
        assert_eq!(engine.category(), FilterCategory::All);
        assert_eq!(engine.filtered().len(), roster.len());
    }

    #[test]
    fn test_all_then_category_equals_direct() {
        let roster = roster();

        let mut direct = MarkerFilterEngine::new();
        direct.select_category(FilterCategory::Running, &roster);

        let mut via_all = MarkerFilterEngine::new();
        via_all.select_category(FilterCategory::Idle, &roster);
        via_all.select_category(FilterCategory::All, &roster);
        via_all.select_category(FilterCategory::Running, &roster);

        assert_eq!(direct.filtered(), via_all.filtered());
    }

    #[test]
    fn test_selection_survives_only_for_visible_ids() {
        let roster = roster();
        let mut engine = MarkerFilterEngine::new();
        engine.recompute(&roster);

        assert!(engine.set_selected("halted", true));
        assert!(engine.set_selected("running", true));

        engine.select_category(FilterCategory::Halt, &roster);
        assert_eq!(engine.selection().iter().collect::<Vec<_>>(), vec!["halted"]);
        assert!(engine.filtered()["halted"].is_selected);

        // back to ALL: "running" was dropped and stays unselected
        engine.select_category(FilterCategory::Halt, &roster);
        assert!(!engine.filtered()["running"].is_selected);
        assert!(engine.filtered()["halted"].is_selected);
        for id in engine.selection() {
            assert!(engine.filtered().contains_key(id));
        }
    }

    #[test]
    fn test_select_invisible_id_rejected() {
        let roster = roster();
        let mut engine = MarkerFilterEngine::new();
        engine.select_category(FilterCategory::Dead, &roster);
        assert!(!engine.set_selected("running", true));
        assert!(engine.selection().is_empty());
    }

    #[test]
    fn test_roster_replacement_drops_missing_selection() {
        let mut engine = MarkerFilterEngine::new();
        engine.recompute(&roster());
        engine.set_selected("idling", true);

        engine.recompute(&[device("running")]);
        assert!(engine.selection().is_empty());
    }

    #[test]
    fn test_counts() {
        let counts = MarkerFilterEngine::counts(&roster());
        assert_eq!(counts[&FilterCategory::All], 7);
        assert_eq!(counts[&FilterCategory::NonTracking], 3);
        assert_eq!(counts[&FilterCategory::Running], 2);
    }

    #[test]
    fn test_parse_category() {
        assert_eq!("no_gps".parse::<FilterCategory>().unwrap(), FilterCategory::NoGps);
        assert_eq!("NON_TRACKING".parse::<FilterCategory>().unwrap(), FilterCategory::NonTracking);
        assert!("moving".parse::<FilterCategory>().is_err());
    }
}
