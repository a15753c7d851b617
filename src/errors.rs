/*!
 * Error types for the bdsubmerge application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while parsing a disc's playback structure
#[derive(Error, Debug)]
pub enum StructureError {
    /// The disc root has no BDMV/PLAYLIST directory
    #[error("No BDMV/PLAYLIST directory found under {0}")]
    PlaylistDirMissing(PathBuf),

    /// The playlist file is shorter than its own declared structure
    #[error("Playlist file is truncated: {path} ({len} bytes, need {needed})")]
    Truncated {
        /// Offending playlist file
        path: PathBuf,
        /// Actual file length
        len: usize,
        /// Minimum length the structure requires
        needed: usize,
    },

    /// The file does not start with an MPLS magic number
    #[error("Not an MPLS playlist: {path} (magic {magic:?})")]
    BadMagic {
        /// Offending playlist file
        path: PathBuf,
        /// The first bytes that were found instead
        magic: String,
    },

    /// A play item references a clip with a non-decodable name
    #[error("Play item {index} in {path} has an invalid clip reference")]
    BadClipReference {
        /// Offending playlist file
        path: PathBuf,
        /// Play item position within the playlist
        index: usize,
    },

    /// A play item whose out-time does not lie after its in-time
    #[error("Play item {index} in {path} has non-positive duration (in={in_time}, out={out_time})")]
    EmptyPlayItem {
        /// Offending playlist file
        path: PathBuf,
        /// Play item position within the playlist
        index: usize,
        /// In-time in 45 kHz ticks
        in_time: u64,
        /// Out-time in 45 kHz ticks
        out_time: u64,
    },

    /// A playlist mark pointing at a play item that does not exist
    #[error("Playlist mark in {path} references play item {play_item}, but only {count} exist")]
    DanglingMark {
        /// Offending playlist file
        path: PathBuf,
        /// Referenced play item id
        play_item: usize,
        /// Number of play items actually present
        count: usize,
    },

    /// No playlist on the disc qualified as a main-playback candidate
    #[error("No main-playlist candidates found under {0}")]
    NoCandidates(PathBuf),

    /// Underlying I/O failure while reading disc structure
    #[error("I/O error reading disc structure: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while loading a single subtitle file
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The file extension or content matches none of the supported formats
    #[error("Unsupported subtitle format for {0}")]
    UnsupportedFormat(PathBuf),

    /// A timestamp that could not be parsed at all
    #[error("Unparsable timestamp at line {line}: {text:?}")]
    BadTimestamp {
        /// Line number within the file
        line: usize,
        /// The offending timestamp text
        text: String,
    },

    /// An event whose end time lies before its start time
    #[error("Event at line {line} ends before it starts ({start_ms} ms > {end_ms} ms)")]
    EventEndsBeforeStart {
        /// Line number within the file
        line: usize,
        /// Parsed start time in milliseconds
        start_ms: u64,
        /// Parsed end time in milliseconds
        end_ms: u64,
    },

    /// A file that parsed but produced no usable events
    #[error("No subtitle events found in {0}")]
    Empty(PathBuf),

    /// The file bytes decode neither as UTF-8 nor as BOM-marked UTF-16
    #[error("Undecodable text encoding in {0}")]
    BadEncoding(PathBuf),

    /// Underlying I/O failure while reading the subtitle file
    #[error("I/O error reading subtitle: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while resolving or merging alignment mappings
#[derive(Error, Debug)]
pub enum AlignmentError {
    /// Two tracks resolved to the same segment
    #[error("Tracks {first:?} and {second:?} both map to segment {segment}")]
    MappingConflict {
        /// Target segment index
        segment: usize,
        /// First track mapped to the segment
        first: String,
        /// Second track mapped to the segment
        second: String,
    },

    /// An override naming a track that was never loaded
    #[error("Override names unknown track {track:?}")]
    UnknownTrack {
        /// Track identifier from the override table
        track: String,
    },

    /// An override naming a segment the selected playlist does not have
    #[error("Override for track {track:?} names segment {segment}, which does not exist in the selected playlist")]
    UnknownSegment {
        /// Track identifier from the override table
        track: String,
        /// Segment index from the override table
        segment: usize,
    },

    /// An override naming a segment the caller marked as extra/special-feature
    #[error("Override for track {track:?} names segment {segment}, which is marked as skipped")]
    SkippedSegment {
        /// Track identifier from the override table
        track: String,
        /// Segment index from the override table
        segment: usize,
    },

    /// More tracks than free segments
    #[error("No free segment left for track {track:?}")]
    SegmentsExhausted {
        /// Track that could not be placed
        track: String,
    },

    /// Merge was requested with no mappings at all
    #[error("No mappings supplied, nothing to merge")]
    EmptyMappingSet,
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from disc structure parsing
    #[error("Disc structure error: {0}")]
    Structure(#[from] StructureError),

    /// Error from subtitle loading
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from alignment resolution or merging
    #[error("Alignment error: {0}")]
    Alignment(#[from] AlignmentError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
