/*!
 * # bdsubmerge
 *
 * A Rust library and CLI for aligning per-episode subtitle files to the
 * playback structure of a Blu-ray disc and merging them into one
 * continuous-timeline subtitle track.
 *
 * ## Features
 *
 * - Parse MPLS playlists into an ordered segment timeline (45 kHz ticks)
 * - Rank main-playlist candidates without forcing a selection
 * - Load SRT/ASS/SSA episode subtitles into one internal event model
 * - Pair tracks with segments in natural episode order, with explicit
 *   per-track overrides and extra/special-feature segment skips
 * - Flag duration anomalies (wrong subtitle, wrong playlist, mis-ordered
 *   episodes) without blocking the merge
 * - Emit a single time-corrected subtitle file plus an OGM chapter list
 *   for external chapter injection
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `playlist`: Disc playback structure parsing and candidate ranking
 * - `subtitle_processor`: Subtitle file loading and normalization
 * - `alignment`: Track-to-segment mapping and anomaly detection
 * - `merge`: Offset application and output rendering
 * - `chapters`: Chapter list derivation
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod file_utils;
pub mod playlist;
pub mod subtitle_processor;
pub mod alignment;
pub mod merge;
pub mod chapters;
pub mod app_controller;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use playlist::{PlaybackPath, Segment};
pub use subtitle_processor::{SubtitleEvent, SubtitleFormat, SubtitleTrack};
pub use alignment::{AlignmentMapping, AnomalyFlag, MappingOverrides};
pub use merge::MergedSubtitle;
pub use chapters::ChapterList;
pub use errors::{AlignmentError, AppError, StructureError, SubtitleError};
