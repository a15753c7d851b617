/*!
 * Tests for track-to-segment alignment and anomaly detection
 */

use bdsubmerge::alignment::{self, AnomalyKind, MappingOverrides};
use bdsubmerge::errors::AlignmentError;
use crate::common;

/// Test default pairing follows natural episode order
#[test]
fn test_resolve_withDefaultOrder_shouldPairTracksNaturally() {
    let path = common::path_from_secs(&[1_400, 1_410, 1_395]);
    // Deliberately unsorted, with a two-digit episode number
    let tracks = vec![
        common::srt_track("Episode 10", 1_394_000),
        common::srt_track("Episode 2", 1_409_000),
        common::srt_track("Episode 1", 1_399_000),
    ];

    let mappings = alignment::resolve(&path, &tracks, &MappingOverrides::default()).unwrap();

    assert_eq!(mappings.len(), 3);
    assert_eq!(mappings[0].track_id, "Episode 1");
    assert_eq!(mappings[1].track_id, "Episode 2");
    assert_eq!(mappings[2].track_id, "Episode 10");
    assert_eq!(mappings[0].chapter_index, 0);
    assert_eq!(mappings[1].chapter_index, 1);
    assert_eq!(mappings[2].chapter_index, 2);
    // Each offset is the exact sum of all preceding segment durations
    assert_eq!(mappings[0].cumulative_offset_ms, 0);
    assert_eq!(mappings[1].cumulative_offset_ms, 1_400_000);
    assert_eq!(mappings[2].cumulative_offset_ms, 2_810_000);
}

/// Test an explicit assignment re-derives the rest of the pairing
#[test]
fn test_resolve_withExplicitAssignment_shouldRederiveOthers() {
    let path = common::path_from_secs(&[600, 600, 600]);
    let tracks = vec![
        common::srt_track("a", 599_000),
        common::srt_track("b", 599_000),
        common::srt_track("c", 599_000),
    ];
    let mut overrides = MappingOverrides::default();
    overrides.assignments.insert("c".to_string(), 0);

    let mappings = alignment::resolve(&path, &tracks, &overrides).unwrap();

    let by_track = |id: &str| mappings.iter().find(|m| m.track_id == id).unwrap();
    assert_eq!(by_track("c").chapter_index, 0);
    assert_eq!(by_track("a").chapter_index, 1);
    assert_eq!(by_track("b").chapter_index, 2);
}

/// Test skipped segments still count toward cumulative offsets
#[test]
fn test_resolve_withSkippedSegment_shouldOffsetPastIt() {
    // Segment 0 is a creditless opening nobody has subtitles for
    let path = common::path_from_secs(&[90, 1_400, 1_410]);
    let tracks = vec![
        common::srt_track("ep 1", 1_399_000),
        common::srt_track("ep 2", 1_409_000),
    ];
    let mut overrides = MappingOverrides::default();
    overrides.skip_segments.insert(0);

    let mappings = alignment::resolve(&path, &tracks, &overrides).unwrap();

    assert_eq!(mappings[0].chapter_index, 1);
    assert_eq!(mappings[0].cumulative_offset_ms, 90_000);
    assert_eq!(mappings[1].chapter_index, 2);
    assert_eq!(mappings[1].cumulative_offset_ms, 1_490_000);
}

/// Test manual offsets compose with the cumulative offset
#[test]
fn test_resolve_withManualOffset_shouldComposeAtEffectiveOffset() {
    let path = common::path_from_secs(&[1_400, 1_410]);
    let tracks = vec![
        common::srt_track("ep 1", 1_399_000),
        common::srt_track("ep 2", 1_409_000),
    ];
    let mut overrides = MappingOverrides::default();
    overrides.manual_offsets_ms.insert("ep 2".to_string(), -500);

    let mappings = alignment::resolve(&path, &tracks, &overrides).unwrap();

    assert_eq!(mappings[1].cumulative_offset_ms, 1_400_000);
    assert_eq!(mappings[1].manual_offset_ms, -500);
    assert_eq!(mappings[1].effective_offset_ms(), 1_399_500);
}

/// Test two tracks assigned to the same segment is rejected
#[test]
fn test_resolve_withConflictingAssignments_shouldFail() {
    let path = common::path_from_secs(&[600, 600]);
    let tracks = vec![
        common::srt_track("a", 599_000),
        common::srt_track("b", 599_000),
    ];
    let mut overrides = MappingOverrides::default();
    overrides.assignments.insert("a".to_string(), 1);
    overrides.assignments.insert("b".to_string(), 1);

    let err = alignment::resolve(&path, &tracks, &overrides).unwrap_err();
    assert!(matches!(err, AlignmentError::MappingConflict { segment: 1, .. }));
}

/// Test an override naming an unloaded track is rejected
#[test]
fn test_resolve_withUnknownTrack_shouldFail() {
    let path = common::path_from_secs(&[600]);
    let tracks = vec![common::srt_track("a", 599_000)];
    let mut overrides = MappingOverrides::default();
    overrides.assignments.insert("ghost".to_string(), 0);

    let err = alignment::resolve(&path, &tracks, &overrides).unwrap_err();
    assert!(matches!(err, AlignmentError::UnknownTrack { .. }));
}

/// Test an override naming a missing segment is rejected
#[test]
fn test_resolve_withUnknownSegment_shouldFail() {
    let path = common::path_from_secs(&[600]);
    let tracks = vec![common::srt_track("a", 599_000)];
    let mut overrides = MappingOverrides::default();
    overrides.assignments.insert("a".to_string(), 7);

    let err = alignment::resolve(&path, &tracks, &overrides).unwrap_err();
    assert!(matches!(err, AlignmentError::UnknownSegment { segment: 7, .. }));
}

/// Test an assignment into a skipped segment is rejected
#[test]
fn test_resolve_withAssignmentIntoSkippedSegment_shouldFail() {
    let path = common::path_from_secs(&[600, 600]);
    let tracks = vec![common::srt_track("a", 599_000)];
    let mut overrides = MappingOverrides::default();
    overrides.skip_segments.insert(0);
    overrides.assignments.insert("a".to_string(), 0);

    let err = alignment::resolve(&path, &tracks, &overrides).unwrap_err();
    assert!(matches!(err, AlignmentError::SkippedSegment { segment: 0, .. }));
}

/// Test more tracks than free segments is rejected
#[test]
fn test_resolve_withMoreTracksThanSegments_shouldFail() {
    let path = common::path_from_secs(&[600]);
    let tracks = vec![
        common::srt_track("a", 599_000),
        common::srt_track("b", 599_000),
    ];

    let err = alignment::resolve(&path, &tracks, &MappingOverrides::default()).unwrap_err();
    assert!(matches!(err, AlignmentError::SegmentsExhausted { .. }));
}

/// Test a large duration deviation is flagged and a small one is not
#[test]
fn test_detect_anomalies_withDeviations_shouldFlagOnlyBeyondTolerance() {
    let path = common::path_from_secs(&[1_400, 1_410]);
    let tracks = vec![
        // 80 s short of its segment
        common::srt_track("ep 1", 1_320_000),
        // 2 s short, within tolerance
        common::srt_track("ep 2", 1_408_000),
    ];
    let mappings = alignment::resolve(&path, &tracks, &MappingOverrides::default()).unwrap();

    let flags = alignment::detect_anomalies(&path, &tracks, &mappings, 5_000);

    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].track_id, "ep 1");
    assert_eq!(flags[0].kind, AnomalyKind::DurationMismatch);
    assert_eq!(flags[0].deviation_ms, -80_000);
}

/// Test a straggler event past the segment end raises a trailing overrun
#[test]
fn test_detect_anomalies_withStragglerPastSegmentEnd_shouldFlagOverrun() {
    let path = common::path_from_secs(&[1_400]);
    let mut track = common::srt_track("ep 1", 1_399_000);
    // Lone event 100 s past the disc content; the straggler guard keeps it
    // out of the effective duration, so only the overrun fires
    track.events.push(common::srt_event(1_490_000, 1_500_000, "note"));
    let tracks = vec![track];
    let mappings = alignment::resolve(&path, &tracks, &MappingOverrides::default()).unwrap();

    let flags = alignment::detect_anomalies(&path, &tracks, &mappings, 5_000);

    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].kind, AnomalyKind::TrailingOverrun);
    assert_eq!(flags[0].deviation_ms, 100_000);
}

/// Test well-matched tracks raise no flags
#[test]
fn test_detect_anomalies_withMatchingDurations_shouldStayQuiet() {
    let path = common::path_from_secs(&[1_400, 1_410]);
    let tracks = vec![
        common::srt_track("ep 1", 1_399_000),
        common::srt_track("ep 2", 1_409_500),
    ];
    let mappings = alignment::resolve(&path, &tracks, &MappingOverrides::default()).unwrap();

    let flags = alignment::detect_anomalies(&path, &tracks, &mappings, 5_000);
    assert!(flags.is_empty());
}
