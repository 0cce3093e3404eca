use anyhow::{Context, Result};
use burrow_vision::core_modules::tracker::{BurrowTrack, BurrowTrackList};
use burrow_vision::{AnalysisStatus, AnalysisSummary};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct OutlineRecord {
    pub frame: u64,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize)]
pub struct TrackRecord {
    pub id: u64,
    pub active: bool,
    pub first_frame: u64,
    pub last_frame: u64,
    pub outlines: Vec<OutlineRecord>,
}

impl From<&BurrowTrack> for TrackRecord {
    fn from(track: &BurrowTrack) -> Self {
        Self {
            id: track.id,
            active: track.active,
            first_frame: track.first_frame(),
            last_frame: track.last_frame(),
            outlines: track
                .history()
                .iter()
                .map(|(frame, burrow)| OutlineRecord {
                    frame: *frame,
                    points: burrow.points().iter().map(|c| [c.x, c.y]).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryRecord {
    pub status: AnalysisStatus,
    pub frames_analyzed: u64,
    pub last_frame_index: Option<u64>,
    pub processing_time: f64,
    pub processing_fps: f64,
    pub tracks: usize,
    pub active_tracks: usize,
}

impl SummaryRecord {
    pub fn new(summary: &AnalysisSummary, tracks: &BurrowTrackList) -> Self {
        Self {
            status: summary.status,
            frames_analyzed: summary.frames_analyzed,
            last_frame_index: summary.last_frame_index,
            processing_time: summary.processing_time.as_secs_f64(),
            processing_fps: summary.processing_fps,
            tracks: tracks.len(),
            active_tracks: tracks.active_tracks().count(),
        }
    }
}

pub fn write_tracks(tracks: &BurrowTrackList, path: &Path) -> Result<()> {
    let records: Vec<TrackRecord> = tracks.tracks().iter().map(TrackRecord::from).collect();
    write_json(&records, path)
}

pub fn write_summary(summary: &SummaryRecord, path: &Path) -> Result<()> {
    write_json(summary, path)
}

fn write_json(value: &impl Serialize, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_vision::core_modules::burrow::Burrow;
    use burrow_vision::core_modules::tracker::FirstIntersectingMatcher;
    use geo::polygon;

    #[test]
    fn track_record_lists_every_outline() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)];
        let larger = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 8.0), (x: 0.0, y: 8.0)];
        let mut tracks = BurrowTrackList::new();
        tracks.update(3, vec![Burrow::new(square)], &FirstIntersectingMatcher);
        tracks.update(4, vec![Burrow::new(larger)], &FirstIntersectingMatcher);

        let record = TrackRecord::from(&tracks.tracks()[0]);
        assert_eq!((record.first_frame, record.last_frame), (3, 4));
        assert_eq!(record.outlines.len(), 2);
        assert_eq!(record.outlines[1].points[2], [4.0, 8.0]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["active"], true);
    }
}
