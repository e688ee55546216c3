//! Per-device track grouping

use std::collections::HashMap;

use crate::track_point::TrackPoint;

/// Ordered fixes of one device, in log line order.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    device_id: String,
    points: Vec<TrackPoint>,
}

impl Track {
    pub fn new(device_id: impl Into<String>) -> Self {
        Track {
            device_id: device_id.into(),
            points: Vec::new(),
        }
    }

    pub fn from_points(device_id: impl Into<String>, points: Vec<TrackPoint>) -> Self {
        Track {
            device_id: device_id.into(),
            points,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub(crate) fn push(&mut self, point: TrackPoint) {
        self.points.push(point);
    }

    pub(crate) fn points_mut(&mut self) -> &mut Vec<TrackPoint> {
        &mut self.points
    }
}

/// Collects admitted points into one track per device id.
///
/// Device ids are remembered in first-seen order, including devices whose
/// points were all rejected, so callers can report on them.
#[derive(Debug, Default)]
pub struct TrackGrouper {
    device_ids: Vec<String>,
    tracks: HashMap<String, Track>,
}

impl TrackGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a device id without adding a point for it.
    pub fn observe(&mut self, device_id: &str) {
        if !self.device_ids.iter().any(|id| id == device_id) {
            self.device_ids.push(device_id.to_string());
        }
    }

    pub fn push(&mut self, device_id: &str, point: TrackPoint) {
        self.observe(device_id);
        self.tracks
            .entry(device_id.to_string())
            .or_insert_with(|| Track::new(device_id))
            .push(point);
    }

    pub fn device_ids(&self) -> &[String] {
        &self.device_ids
    }

    pub fn track(&self, device_id: &str) -> Option<&Track> {
        self.tracks.get(device_id)
    }

    /// All tracks in first-seen device order. Devices that never had a point
    /// admitted come back as empty tracks.
    pub fn into_tracks(mut self) -> Vec<Track> {
        self.device_ids
            .iter()
            .map(|id| self.tracks.remove(id).unwrap_or_else(|| Track::new(id.as_str())))
            .collect()
    }
}
