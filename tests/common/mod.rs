/*!
 * Common test utilities for the bdsubmerge test suite
 */

use std::fs;
use std::path::PathBuf;
use anyhow::Result;
use tempfile::TempDir;

use bdsubmerge::playlist::{PlaybackPath, PlaylistMark, Segment, TICKS_PER_SECOND};
use bdsubmerge::subtitle_processor::{
    AssScriptVersion, SubtitleEvent, SubtitleFormat, SubtitleTrack,
};

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &PathBuf, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Whole seconds to 45 kHz ticks
pub fn secs_to_ticks(secs: u64) -> u64 {
    secs * TICKS_PER_SECOND
}

/// Builds a synthetic MPLS playlist from (clip id, in time, out time) play
/// items and (play item id, timestamp) marks. Clip ids must be exactly five
/// characters, matching the on-disc layout.
pub fn build_mpls(items: &[(&str, u64, u64)], marks: &[(u16, u64)]) -> Vec<u8> {
    let playlist_start: u32 = 16;
    let mark_start: u32 = playlist_start + 10 + 22 * items.len() as u32;

    let mut data = Vec::new();
    data.extend_from_slice(b"MPLS0200");
    data.extend_from_slice(&playlist_start.to_be_bytes());
    data.extend_from_slice(&mark_start.to_be_bytes());

    // PlayList table header
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&(items.len() as u16).to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());

    for (clip, in_time, out_time) in items {
        assert_eq!(clip.len(), 5, "clip ids are five characters on disc");
        data.extend_from_slice(&20u16.to_be_bytes());
        data.extend_from_slice(clip.as_bytes());
        data.extend_from_slice(&[0u8; 7]);
        data.extend_from_slice(&(*in_time as u32).to_be_bytes());
        data.extend_from_slice(&(*out_time as u32).to_be_bytes());
    }

    // PlayListMark table
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&(marks.len() as u16).to_be_bytes());
    for (item_id, timestamp) in marks {
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&item_id.to_be_bytes());
        data.extend_from_slice(&(*timestamp as u32).to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
    }

    data
}

/// Creates a BDMV/PLAYLIST tree under `disc_root` and drops the given
/// playlist files into it
pub fn write_disc(disc_root: &PathBuf, playlists: &[(&str, Vec<u8>)]) -> Result<()> {
    let playlist_dir = disc_root.join("BDMV").join("PLAYLIST");
    fs::create_dir_all(&playlist_dir)?;
    for (name, bytes) in playlists {
        fs::write(playlist_dir.join(name), bytes)?;
    }
    Ok(())
}

/// Builds an in-memory playback path from per-segment durations in seconds
pub fn path_from_secs(durations_secs: &[u64]) -> PlaybackPath {
    let mut segments = Vec::new();
    let mut clock = 0;
    for (index, secs) in durations_secs.iter().enumerate() {
        let ticks = secs_to_ticks(*secs);
        segments.push(Segment {
            index,
            clip_ids: vec![format!("{:05}", index + 1)],
            in_time: clock,
            out_time: clock + ticks,
        });
        clock += ticks;
    }

    PlaybackPath {
        source: PathBuf::from("00000.mpls"),
        segments,
        marks: Vec::new(),
    }
}

/// Builds an in-memory playback path with chapter marks on the first item
pub fn path_with_marks(durations_secs: &[u64], mark_count: usize) -> PlaybackPath {
    let mut path = path_from_secs(durations_secs);
    path.marks = (0..mark_count)
        .map(|i| PlaylistMark {
            play_item_id: 0,
            timestamp: secs_to_ticks(i as u64),
        })
        .collect();
    path
}

/// Builds an in-memory SRT track whose last event ends at `end_ms`
pub fn srt_track(name: &str, end_ms: u64) -> SubtitleTrack {
    let mut events = vec![srt_event(1_000, 4_000, "First line")];
    if end_ms > 60_000 {
        // Keeps the runner-up end close to the final one, so the straggler
        // guard leaves the track duration at `end_ms`
        events.push(srt_event(end_ms - 50_000, end_ms - 45_000, "Middle line"));
    }
    events.push(srt_event(end_ms.saturating_sub(3_000), end_ms, "Last line"));

    SubtitleTrack {
        source_file: PathBuf::from(format!("{}.srt", name)),
        format: SubtitleFormat::Srt,
        script_version: AssScriptVersion::V4Plus,
        events,
        script_info: Vec::new(),
        styles: Vec::new(),
        style_format: Vec::new(),
    }
}

/// Builds one SRT-style event
pub fn srt_event(start_ms: u64, end_ms: u64, text: &str) -> SubtitleEvent {
    SubtitleEvent {
        start_ms,
        end_ms,
        style: None,
        text: text.to_string(),
        ass_meta: None,
    }
}

/// Renders SRT content from (start ms, end ms, text) triples
pub fn srt_content(events: &[(u64, u64, &str)]) -> String {
    let mut out = String::new();
    for (seq, (start, end, text)) in events.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            seq + 1,
            SubtitleEvent::format_srt_timestamp(*start),
            SubtitleEvent::format_srt_timestamp(*end),
            text
        ));
    }
    out
}

/// A small complete ASS script with one Default style
pub fn sample_ass_content() -> String {
    concat!(
        "[Script Info]\n",
        "Title: sample episode\n",
        "ScriptType: v4.00+\n",
        "\n",
        "[V4+ Styles]\n",
        "Format: Name, Fontname, Fontsize, PrimaryColour, Bold\n",
        "Style: Default,Arial,20,&H00FFFFFF,0\n",
        "\n",
        "[Events]\n",
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
        "Dialogue: 0,0:00:01.00,0:00:04.00,Default,,0,0,0,,Hello, commas, kept\n",
        "Dialogue: 0,0:00:05.00,0:00:08.50,Default,,0,0,0,,Second line\n",
    )
    .to_string()
}
