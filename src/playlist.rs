use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Result;
use bytes::Buf;
use log::{warn, debug};
use walkdir::WalkDir;

use crate::errors::StructureError;

// @module: Blu-ray playback structure parsing and main-playlist ranking

/// MPLS timestamps tick at 45 kHz
pub const TICKS_PER_SECOND: u64 = 45_000;

/// Minimum play item body: 5-byte clip name, 7 bytes of codec id and flags,
/// two 4-byte timestamps
const MIN_PLAY_ITEM_LEN: usize = 20;

/// Convert 45 kHz ticks to rounded milliseconds
pub fn ticks_to_ms(ticks: u64) -> u64 {
    (ticks * 1_000 + TICKS_PER_SECOND / 2) / TICKS_PER_SECOND
}

// @struct: One playable unit within a playback path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    // @field: Position within the playback path
    pub index: usize,

    // @field: Underlying stream clip identifiers, in play order
    pub clip_ids: Vec<String>,

    // @field: Presentation start in 45 kHz ticks
    pub in_time: u64,

    // @field: Presentation end in 45 kHz ticks
    pub out_time: u64,
}

impl Segment {
    /// Exact duration in 45 kHz ticks, always positive for a parsed segment
    pub fn duration_ticks(&self) -> u64 {
        self.out_time - self.in_time
    }

    /// Duration in rounded milliseconds
    pub fn duration_ms(&self) -> u64 {
        ticks_to_ms(self.duration_ticks())
    }
}

/// A chapter mark inside a playlist, pointing into one play item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMark {
    /// Index of the play item the mark belongs to
    pub play_item_id: usize,
    /// Mark position in 45 kHz ticks, relative to the clip's own timeline
    pub timestamp: u64,
}

/// One candidate playback order parsed from a single .mpls file
#[derive(Debug, Clone)]
pub struct PlaybackPath {
    /// The .mpls file this path was parsed from
    pub source: PathBuf,

    /// Ordered playable segments
    pub segments: Vec<Segment>,

    /// Chapter marks, used for candidate ranking
    pub marks: Vec<PlaylistMark>,
}

impl PlaybackPath {
    /// Total playback duration in ticks, the sum of all segment durations
    pub fn total_duration_ticks(&self) -> u64 {
        self.segments.iter().map(Segment::duration_ticks).sum()
    }

    /// Total playback duration in rounded milliseconds
    pub fn total_duration_ms(&self) -> u64 {
        ticks_to_ms(self.total_duration_ticks())
    }

    /// Playback duration counting each distinct clip once. Menu loops and
    /// play-all playlists repeat clips; a path that inflates its runtime by
    /// repetition should not outrank the real main playlist.
    pub fn unique_clip_duration_ticks(&self) -> u64 {
        let mut per_clip: Vec<(&str, u64)> = Vec::new();
        for segment in &self.segments {
            let key = segment.clip_ids.first().map(String::as_str).unwrap_or("");
            if let Some(entry) = per_clip.iter_mut().find(|(clip, _)| *clip == key) {
                // Repeated clip, keep the latest duration seen
                entry.1 = segment.duration_ticks();
            } else {
                per_clip.push((key, segment.duration_ticks()));
            }
        }
        per_clip.iter().map(|(_, d)| d).sum()
    }

    /// Ranking score for main-playlist selection: deduplicated runtime scaled
    /// up by chapter-mark density. The real feature playlist carries both the
    /// longest unique runtime and the densest chapter marks.
    pub fn plausibility(&self) -> f64 {
        let unique_secs = self.unique_clip_duration_ticks() as f64 / TICKS_PER_SECOND as f64;
        unique_secs * (1.0 + self.marks.len() as f64 / 5.0)
    }

    /// Sum of durations of all segments strictly preceding `index`, in ticks.
    /// This is disc time: skipped or unmapped segments still count.
    pub fn cumulative_offset_ticks(&self, index: usize) -> u64 {
        self.segments
            .iter()
            .filter(|s| s.index < index)
            .map(Segment::duration_ticks)
            .sum()
    }

    /// Segment lookup by its playback-path index
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.iter().find(|s| s.index == index)
    }
}

/// Parse a single .mpls playlist file into a playback path
pub fn parse_mpls(path: &Path) -> Result<PlaybackPath, StructureError> {
    let data = fs::read(path)?;
    parse_mpls_bytes(&data, path)
}

/// Parse MPLS bytes. Layout reference: the PlayList and PlayListMark tables
/// addressed from the 16-byte header, all integers big-endian.
pub fn parse_mpls_bytes(data: &[u8], path: &Path) -> Result<PlaybackPath, StructureError> {
    need(data, 16, path)?;

    let magic = &data[0..8];
    if &magic[0..4] != b"MPLS" || !is_known_version(&magic[4..8]) {
        return Err(StructureError::BadMagic {
            path: path.to_path_buf(),
            magic: String::from_utf8_lossy(magic).into_owned(),
        });
    }

    let mut header = &data[8..16];
    let playlist_start = header.get_u32() as usize;
    let mark_start = header.get_u32() as usize;

    let segments = parse_play_items(data, playlist_start, path)?;
    let marks = parse_marks(data, mark_start, segments.len(), path)?;

    debug!(
        "Parsed {:?}: {} play items, {} marks, {} ms total",
        path.file_name().unwrap_or_default(),
        segments.len(),
        marks.len(),
        ticks_to_ms(segments.iter().map(Segment::duration_ticks).sum())
    );

    Ok(PlaybackPath {
        source: path.to_path_buf(),
        segments,
        marks,
    })
}

/// The format versions seen in the wild: 0100 (BD-ROM 1.0), 0200, 0300 (UHD)
fn is_known_version(version: &[u8]) -> bool {
    version == b"0100" || version == b"0200" || version == b"0300"
}

fn parse_play_items(data: &[u8], start: usize, path: &Path) -> Result<Vec<Segment>, StructureError> {
    // PlayList table: u32 length, u16 reserved, u16 item count, u16 sub-path count
    need(data, start + 10, path)?;
    let mut table = &data[start..];
    let _table_len = table.get_u32();
    let _reserved = table.get_u16();
    let nb_play_items = table.get_u16() as usize;
    let _nb_sub_paths = table.get_u16();

    let mut segments = Vec::with_capacity(nb_play_items);
    let mut pos = start + 10;

    for item_index in 0..nb_play_items {
        need(data, pos + 2, path)?;
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;

        if length != 0 {
            need(data, pos + 2 + length, path)?;
            if length < MIN_PLAY_ITEM_LEN {
                return Err(StructureError::Truncated {
                    path: path.to_path_buf(),
                    len: length,
                    needed: MIN_PLAY_ITEM_LEN,
                });
            }

            let mut body = &data[pos + 2..pos + 2 + length];
            let clip_id = match std::str::from_utf8(&body[..5]) {
                Ok(name) if name.chars().all(|c| c.is_ascii_alphanumeric()) => name.to_string(),
                _ => {
                    return Err(StructureError::BadClipReference {
                        path: path.to_path_buf(),
                        index: item_index,
                    })
                }
            };
            body.advance(5);
            // Clip codec identifier, connection flags, STC id
            body.advance(7);
            let in_time = u64::from(body.get_u32());
            let out_time = u64::from(body.get_u32());

            if out_time <= in_time {
                return Err(StructureError::EmptyPlayItem {
                    path: path.to_path_buf(),
                    index: item_index,
                    in_time,
                    out_time,
                });
            }

            segments.push(Segment {
                index: segments.len(),
                clip_ids: vec![clip_id],
                in_time,
                out_time,
            });
        }

        pos += length + 2;
    }

    Ok(segments)
}

fn parse_marks(
    data: &[u8],
    start: usize,
    play_item_count: usize,
    path: &Path,
) -> Result<Vec<PlaylistMark>, StructureError> {
    // PlayListMark table: u32 length, u16 mark count, then 14 bytes per mark
    need(data, start + 6, path)?;
    let mut table = &data[start..];
    let _table_len = table.get_u32();
    let nb_marks = table.get_u16() as usize;
    need(data, start + 6 + nb_marks * 14, path)?;

    let mut marks = Vec::with_capacity(nb_marks);
    for _ in 0..nb_marks {
        let _mark_type = table.get_u16();
        let play_item_id = table.get_u16() as usize;
        let timestamp = u64::from(table.get_u32());
        let _entry_es_pid = table.get_u16();
        let _duration = table.get_u32();

        if play_item_id >= play_item_count {
            return Err(StructureError::DanglingMark {
                path: path.to_path_buf(),
                play_item: play_item_id,
                count: play_item_count,
            });
        }

        marks.push(PlaylistMark {
            play_item_id,
            timestamp,
        });
    }

    Ok(marks)
}

fn need(data: &[u8], needed: usize, path: &Path) -> Result<(), StructureError> {
    if data.len() < needed {
        return Err(StructureError::Truncated {
            path: path.to_path_buf(),
            len: data.len(),
            needed,
        });
    }
    Ok(())
}

/// Locate the BDMV/PLAYLIST directory under a disc root
pub fn find_playlist_dir(disc_root: &Path) -> Result<PathBuf, StructureError> {
    for entry in WalkDir::new(disc_root).follow_links(true).into_iter().flatten() {
        let path = entry.path();
        if entry.file_type().is_dir()
            && path.file_name().is_some_and(|n| n == "PLAYLIST")
            && path.parent().and_then(Path::file_name).is_some_and(|n| n == "BDMV")
        {
            return Ok(path.to_path_buf());
        }
    }
    Err(StructureError::PlaylistDirMissing(disc_root.to_path_buf()))
}

/// Enumerate every playlist on the disc and return the plausible main-playback
/// candidates ranked most-likely first.
///
/// An individual unparsable .mpls is skipped with a warning; discs routinely
/// carry menu playlists with exotic extensions. The caller (or a human) makes
/// the final selection from the returned ranking, it is never forced here.
pub fn scan_disc(disc_root: &Path, min_duration_secs: u64) -> Result<Vec<PlaybackPath>, StructureError> {
    let playlist_dir = find_playlist_dir(disc_root)?;

    let mut candidates = Vec::new();
    for entry in fs::read_dir(&playlist_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_mpls = path
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("mpls"));
        if !path.is_file() || !is_mpls {
            continue;
        }

        match parse_mpls(&path) {
            Ok(playback_path) => {
                if playback_path.total_duration_ticks() >= min_duration_secs * TICKS_PER_SECOND {
                    candidates.push(playback_path);
                } else {
                    debug!(
                        "Skipping short playlist {:?} ({} ms)",
                        path.file_name().unwrap_or_default(),
                        playback_path.total_duration_ms()
                    );
                }
            }
            Err(e) => {
                warn!("Skipping unparsable playlist {:?}: {}", path.file_name().unwrap_or_default(), e);
            }
        }
    }

    if candidates.is_empty() {
        return Err(StructureError::NoCandidates(disc_root.to_path_buf()));
    }

    // Highest plausibility first; ties broken by file name so a rescan of the
    // same disc always yields the same ordering
    candidates.sort_by(|a, b| {
        b.plausibility()
            .partial_cmp(&a.plausibility())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source.cmp(&b.source))
    });

    Ok(candidates)
}
