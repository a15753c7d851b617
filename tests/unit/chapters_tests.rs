/*!
 * Tests for chapter list derivation and OGM rendering
 */

use bdsubmerge::alignment::AlignmentMapping;
use bdsubmerge::chapters::{derive_chapters, ChapterList};

fn mapping(track_id: &str, chapter_index: usize, offset_ms: u64) -> AlignmentMapping {
    AlignmentMapping {
        track_id: track_id.to_string(),
        track_index: chapter_index,
        chapter_index,
        cumulative_offset_ms: offset_ms,
        manual_offset_ms: 0,
    }
}

/// Test one chapter per mapping at the mapping's cumulative offset
#[test]
fn test_derive_chapters_withMappings_shouldUseCumulativeOffsets() {
    let mappings = vec![
        mapping("ep 1", 0, 0),
        mapping("ep 2", 1, 1_400_000),
        mapping("ep 3", 2, 2_810_000),
    ];

    let list = derive_chapters(&mappings, "Chapter");

    assert_eq!(list.entries.len(), 3);
    assert_eq!(list.entries[0].label, "Chapter 01");
    assert_eq!(list.entries[0].timestamp_ms, 0);
    assert_eq!(list.entries[1].timestamp_ms, 1_400_000);
    assert_eq!(list.entries[2].label, "Chapter 03");
    assert_eq!(list.entries[2].timestamp_ms, 2_810_000);
}

/// Test chapters come out in chapter order regardless of input order
#[test]
fn test_derive_chapters_withUnorderedMappings_shouldSortByChapterIndex() {
    let mappings = vec![
        mapping("ep 2", 1, 1_400_000),
        mapping("ep 1", 0, 0),
    ];

    let list = derive_chapters(&mappings, "Chapter");

    assert_eq!(list.entries[0].timestamp_ms, 0);
    assert_eq!(list.entries[1].timestamp_ms, 1_400_000);
    // Labels count up from one, not from the segment index
    assert_eq!(list.entries[0].label, "Chapter 01");
    assert_eq!(list.entries[1].label, "Chapter 02");
}

/// Test a custom label prefix is carried into every entry
#[test]
fn test_derive_chapters_withCustomPrefix_shouldUseIt() {
    let mappings = vec![mapping("ep 1", 0, 0)];

    let list = derive_chapters(&mappings, "Episode");
    assert_eq!(list.entries[0].label, "Episode 01");
}

/// Test OGM rendering matches the mkvmerge-compatible layout
#[test]
fn test_render_ogm_withEntries_shouldFormatTimestampsAndNames() {
    let mappings = vec![
        mapping("ep 1", 0, 0),
        mapping("ep 2", 1, 1_400_000),
        mapping("ep 3", 2, 2_810_500),
    ];

    let rendered = derive_chapters(&mappings, "Chapter").render_ogm();

    let expected = "CHAPTER01=00:00:00.000\n\
                    CHAPTER01NAME=Chapter 01\n\
                    CHAPTER02=00:23:20.000\n\
                    CHAPTER02NAME=Chapter 02\n\
                    CHAPTER03=00:46:50.500\n\
                    CHAPTER03NAME=Chapter 03\n";
    assert_eq!(rendered, expected);
}

/// Test an empty list renders to nothing
#[test]
fn test_render_ogm_withNoEntries_shouldRenderEmpty() {
    let list = ChapterList::default();
    assert_eq!(list.render_ogm(), "");
}
