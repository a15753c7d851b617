use std::collections::{BTreeMap, BTreeSet};
use log::{warn, debug};
use serde::{Deserialize, Serialize};

use crate::errors::AlignmentError;
use crate::file_utils;
use crate::playlist::{PlaybackPath, ticks_to_ms};
use crate::subtitle_processor::SubtitleTrack;

// @module: Track-to-segment alignment and duration anomaly detection

/// Caller-supplied corrections to the default pairing. This is the data
/// structure an external review UI writes into; the resolver only consumes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingOverrides {
    /// Explicit track-to-segment assignments, track id to segment index
    #[serde(default)]
    pub assignments: BTreeMap<String, usize>,

    /// Extra per-track time shift in milliseconds, added on top of the
    /// computed cumulative offset
    #[serde(default)]
    pub manual_offsets_ms: BTreeMap<String, i64>,

    /// Segment indices to leave out of default pairing (menus, specials,
    /// creditless openings)
    #[serde(default)]
    pub skip_segments: BTreeSet<usize>,
}

/// Relates one subtitle track to one segment of the selected playback path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentMapping {
    /// Identifier of the mapped track
    pub track_id: String,

    /// Position of the track in the loaded-tracks slice
    pub track_index: usize,

    /// Index of the mapped segment within the playback path
    pub chapter_index: usize,

    /// Sum of durations of all segments preceding the mapped one, in ms.
    /// Computed from disc time; whether preceding segments carry subtitles
    /// is irrelevant.
    pub cumulative_offset_ms: u64,

    /// Manual per-track shift from the override table, composed with the
    /// cumulative offset at merge time only
    pub manual_offset_ms: i64,
}

impl AlignmentMapping {
    /// The shift actually applied to this track's events
    pub fn effective_offset_ms(&self) -> i64 {
        self.cumulative_offset_ms as i64 + self.manual_offset_ms
    }
}

/// Pair each loaded track with one segment of the selected playback path.
///
/// Default pairing is 1:1 in order: tracks sorted by natural episode order
/// against segments sorted by index, skipping caller-marked segments.
/// Explicit assignments replace the default for those tracks only; everything
/// else re-derives from the remaining segments in order. Unmapped segments
/// are legal, double-mapped segments are not.
pub fn resolve(
    path: &PlaybackPath,
    tracks: &[SubtitleTrack],
    overrides: &MappingOverrides,
) -> Result<Vec<AlignmentMapping>, AlignmentError> {
    // Natural episode order over the loaded set
    let mut order: Vec<usize> = (0..tracks.len()).collect();
    order.sort_by(|&a, &b| {
        file_utils::natural_path_cmp(&tracks[a].source_file, &tracks[b].source_file)
    });

    let known_ids: BTreeSet<String> = tracks.iter().map(SubtitleTrack::track_id).collect();

    // Validate the override table before any pairing happens
    let mut assigned: BTreeMap<usize, String> = BTreeMap::new();
    for (track_id, &segment) in &overrides.assignments {
        if !known_ids.contains(track_id) {
            return Err(AlignmentError::UnknownTrack {
                track: track_id.clone(),
            });
        }
        if path.segment(segment).is_none() {
            return Err(AlignmentError::UnknownSegment {
                track: track_id.clone(),
                segment,
            });
        }
        if overrides.skip_segments.contains(&segment) {
            return Err(AlignmentError::SkippedSegment {
                track: track_id.clone(),
                segment,
            });
        }
        if let Some(existing) = assigned.insert(segment, track_id.clone()) {
            return Err(AlignmentError::MappingConflict {
                segment,
                first: existing,
                second: track_id.clone(),
            });
        }
    }

    // Segments still free for default pairing, ascending
    let mut free: Vec<usize> = path
        .segments
        .iter()
        .map(|s| s.index)
        .filter(|i| !overrides.skip_segments.contains(i) && !assigned.contains_key(i))
        .collect();
    free.reverse(); // pop() yields the lowest index first

    let mut mappings = Vec::with_capacity(tracks.len());
    for &track_index in &order {
        let track_id = tracks[track_index].track_id();

        let chapter_index = match overrides.assignments.get(&track_id) {
            Some(&segment) => segment,
            None => free
                .pop()
                .ok_or_else(|| AlignmentError::SegmentsExhausted {
                    track: track_id.clone(),
                })?,
        };

        let manual_offset_ms = overrides
            .manual_offsets_ms
            .get(&track_id)
            .copied()
            .unwrap_or(0);

        mappings.push(AlignmentMapping {
            track_id,
            track_index,
            chapter_index,
            cumulative_offset_ms: ticks_to_ms(path.cumulative_offset_ticks(chapter_index)),
            manual_offset_ms,
        });
    }

    mappings.sort_by_key(|m| m.chapter_index);

    // Mapping invariant: chapter indices form a strictly increasing sequence
    for pair in mappings.windows(2) {
        if pair[0].chapter_index == pair[1].chapter_index {
            return Err(AlignmentError::MappingConflict {
                segment: pair[0].chapter_index,
                first: pair[0].track_id.clone(),
                second: pair[1].track_id.clone(),
            });
        }
    }

    for mapping in &mappings {
        debug!(
            "Mapped track {:?} to segment {} at offset {} ms",
            mapping.track_id, mapping.chapter_index, mapping.cumulative_offset_ms
        );
    }

    Ok(mappings)
}

/// Kinds of duration disagreement between a track and its segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// The track's overall duration disagrees with the segment duration,
    /// pointing at a wrong subtitle, wrong playlist, or mis-ordered episodes
    DurationMismatch,

    /// The track's last event runs past the end of the segment: subtitle
    /// content with no matching disc content
    TrailingOverrun,
}

/// Advisory flag attached to a mapping whose durations disagree beyond
/// tolerance. Never blocks the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyFlag {
    /// Identifier of the flagged track
    pub track_id: String,

    /// Index of the mapped segment
    pub chapter_index: usize,

    /// What kind of disagreement was measured
    pub kind: AnomalyKind,

    /// Signed deviation in milliseconds (track minus segment)
    pub deviation_ms: i64,
}

/// Cross-check every mapping's track duration against its segment duration
pub fn detect_anomalies(
    path: &PlaybackPath,
    tracks: &[SubtitleTrack],
    mappings: &[AlignmentMapping],
    tolerance_ms: u64,
) -> Vec<AnomalyFlag> {
    let mut flags = Vec::new();

    for mapping in mappings {
        let Some(segment) = path.segment(mapping.chapter_index) else {
            continue;
        };
        let track = &tracks[mapping.track_index];
        let segment_ms = segment.duration_ms() as i64;

        let deviation_ms = track.effective_duration_ms() as i64 - segment_ms;
        if deviation_ms.unsigned_abs() > tolerance_ms {
            warn!(
                "Track {:?} duration deviates from segment {} by {} ms (tolerance {} ms)",
                mapping.track_id, mapping.chapter_index, deviation_ms, tolerance_ms
            );
            flags.push(AnomalyFlag {
                track_id: mapping.track_id.clone(),
                chapter_index: mapping.chapter_index,
                kind: AnomalyKind::DurationMismatch,
                deviation_ms,
            });
        }

        // Raw last-event end, without the straggler guard: the specific case
        // of a final subtitle outlasting the disc content it belongs to
        let overrun_ms = track.total_duration_ms() as i64 - segment_ms;
        if overrun_ms > tolerance_ms as i64 {
            warn!(
                "Track {:?} runs {} ms past the end of segment {}",
                mapping.track_id, overrun_ms, mapping.chapter_index
            );
            flags.push(AnomalyFlag {
                track_id: mapping.track_id.clone(),
                chapter_index: mapping.chapter_index,
                kind: AnomalyKind::TrailingOverrun,
                deviation_ms: overrun_ms,
            });
        }
    }

    flags
}
