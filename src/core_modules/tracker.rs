// THEORY:
// The `tracker` module adds object permanence to burrows. A `Burrow` is a snapshot
// of one frame; a `BurrowTrack` is the history of one physical burrow over time.
//
// Key architectural principles:
// 1.  **Append-only history**: tracks are created, extended and deactivated but
//     never deleted or merged. An inactive track is history; it is never
//     extended again, even if an identical burrow reappears later.
// 2.  **Frame-local association**: burrows grow slowly compared to the distance
//     between them, so a new burrow simply continues the first active track whose
//     latest outline it intersects. The rule lives behind the `TrackMatcher` trait
//     so a stricter assignment can replace it without touching the pipeline.
// 3.  **Lifecycle**:
//     - **Birth**: a burrow matching no active track starts a new one.
//     - **Extension**: a matched track gets the new outline appended, unless it is
//       identical to the latest one.
//     - **Deactivation**: an active track nothing matched in this frame becomes
//       inactive.

use crate::core_modules::burrow::Burrow;

/// The history of one physical burrow.
#[derive(Debug, Clone, PartialEq)]
pub struct BurrowTrack {
    /// Stable id, unique within a `BurrowTrackList`.
    pub id: u64,
    /// `(frame index, outline)` pairs in frame order. Never empty.
    history: Vec<(u64, Burrow)>,
    /// Inactive tracks are kept for the record but never extended again.
    pub active: bool,
}

impl BurrowTrack {
    fn new(id: u64, frame_index: u64, burrow: Burrow) -> Self {
        Self {
            id,
            history: vec![(frame_index, burrow)],
            active: true,
        }
    }

    fn append(&mut self, frame_index: u64, burrow: Burrow) {
        self.history.push((frame_index, burrow));
    }

    /// The most recent outline.
    pub fn last(&self) -> &Burrow {
        &self.history[self.history.len() - 1].1
    }

    pub fn history(&self) -> &[(u64, Burrow)] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn first_frame(&self) -> u64 {
        self.history[0].0
    }

    pub fn last_frame(&self) -> u64 {
        self.history[self.history.len() - 1].0
    }
}

/// Decides which active track a new burrow continues.
pub trait TrackMatcher {
    /// Returns the position in `candidates` of the track `burrow` continues, if any.
    fn find_match(&self, burrow: &Burrow, candidates: &[&BurrowTrack]) -> Option<usize>;
}

/// Picks the first candidate whose latest outline intersects the burrow.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstIntersectingMatcher;

impl TrackMatcher for FirstIntersectingMatcher {
    fn find_match(&self, burrow: &Burrow, candidates: &[&BurrowTrack]) -> Option<usize> {
        candidates.iter().position(|track| burrow.intersects(track.last()))
    }
}

/// What one call to `BurrowTrackList::update` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    /// Ids of tracks that received a new outline.
    pub extended: Vec<u64>,
    /// Ids of tracks matched by an outline identical to their latest one.
    pub unchanged: Vec<u64>,
    pub created: Vec<u64>,
    pub deactivated: Vec<u64>,
}

/// All burrow tracks of a run, in creation order.
#[derive(Debug, Clone, Default)]
pub struct BurrowTrackList {
    tracks: Vec<BurrowTrack>,
    next_id: u64,
}

impl BurrowTrackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_track(&mut self, frame_index: u64, burrow: Burrow) -> u64 {
        let id = self.next_id;
        self.tracks.push(BurrowTrack::new(id, frame_index, burrow));
        self.next_id += 1;
        id
    }

    /// Associates this frame's burrows with the active tracks.
    pub fn update(
        &mut self,
        frame_index: u64,
        burrows: Vec<Burrow>,
        matcher: &dyn TrackMatcher,
    ) -> TrackUpdate {
        let mut report = TrackUpdate::default();

        // --- 1. Snapshot of the tracks that may be extended ---
        let active: Vec<usize> = (0..self.tracks.len()).filter(|&i| self.tracks[i].active).collect();
        let mut matched = vec![false; active.len()];

        // --- 2. Extend or create ---
        for burrow in burrows {
            let candidates: Vec<&BurrowTrack> = active.iter().map(|&i| &self.tracks[i]).collect();
            match matcher.find_match(&burrow, &candidates) {
                Some(slot) => {
                    matched[slot] = true;
                    let track = &mut self.tracks[active[slot]];
                    if burrow != *track.last() {
                        track.append(frame_index, burrow);
                        report.extended.push(track.id);
                    } else {
                        report.unchanged.push(track.id);
                    }
                }
                None => {
                    let id = self.create_track(frame_index, burrow);
                    report.created.push(id);
                }
            }
        }

        // --- 3. Deactivate tracks nothing matched ---
        for (slot, &index) in active.iter().enumerate() {
            if !matched[slot] {
                let track = &mut self.tracks[index];
                track.active = false;
                report.deactivated.push(track.id);
            }
        }

        report
    }

    pub fn tracks(&self) -> &[BurrowTrack] {
        &self.tracks
    }

    pub fn active_tracks(&self) -> impl Iterator<Item = &BurrowTrack> {
        self.tracks.iter().filter(|track| track.active)
    }

    /// Latest outline of every active track.
    pub fn active_burrows(&self) -> impl Iterator<Item = &Burrow> {
        self.active_tracks().map(BurrowTrack::last)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
