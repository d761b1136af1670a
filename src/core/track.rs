// Telemetry points, coordinates and map bounds

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// One position of a live batch or of a replay history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    pub ts: i64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub address: Option<String>,
    /// Harsh acceleration
    #[serde(rename = "isHA", default)]
    pub is_ha: bool,
    /// Harsh braking
    #[serde(rename = "isHB", default)]
    pub is_hb: bool,
}

impl TrackPoint {
    pub fn new(lat: f64, lng: f64, ts: i64) -> Self {
        Self {
            lat,
            lng,
            ts,
            speed: 0.0,
            address: None,
            is_ha: false,
            is_hb: false,
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayHistory {
    #[serde(default)]
    pub distance_travelled_kms: f64,
    #[serde(default)]
    pub points: Vec<TrackPoint>,
}

/// Axis-aligned lat/lng box, grown point by point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    pub fn around(point: LatLng) -> Self {
        Self {
            south_west: point,
            north_east: point,
        }
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    pub fn from_points<I: IntoIterator<Item = LatLng>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut bounds = Self::around(iter.next()?);
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    #[cfg(test)]
    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_points() {
        let b = Bounds::from_points(vec![
            LatLng::new(12.0, 77.0),
            LatLng::new(13.5, 76.5),
            LatLng::new(12.7, 78.1),
        ])
        .unwrap();
        assert_eq!(b.south_west, LatLng::new(12.0, 76.5));
        assert_eq!(b.north_east, LatLng::new(13.5, 78.1));
        assert!(b.contains(LatLng::new(12.7, 77.0)));
        assert!(!b.contains(LatLng::new(11.9, 77.0)));
    }

    #[test]
    fn test_bounds_empty() {
        assert!(Bounds::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_point_wire_names() {
        let json = r#"{"lat":1.0,"lng":2.0,"ts":10,"speed":3.5,"isHA":true,"isHB":false}"#;
        let p: TrackPoint = serde_json::from_str(json).unwrap();
        assert!(p.is_ha);
        assert!(!p.is_hb);
        assert_eq!(p.address, None);

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["isHA"], serde_json::json!(true));
    }
}
