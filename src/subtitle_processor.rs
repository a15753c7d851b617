use std::fmt;
use std::path::{Path, PathBuf};
use regex::Regex;
use once_cell::sync::Lazy;
use log::warn;

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;

// @module: Subtitle loading and normalization into one internal event model

// @const: SRT timestamp regex, comma or dot millisecond separator
static SRT_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2})[,.](\d{3}) --> (\d{2}):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

/// Events whose end lands more than this far behind the true maximum are
/// treated as the real track end; a single straggler (commentary reel,
/// translator note pinned past the episode) should not inflate the duration.
const STRAGGLER_GAP_MS: u64 = 60_000;

/// The closed set of supported subtitle formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    // @format: SubRip text
    Srt,
    // @format: Advanced SubStation Alpha (v4.00+)
    Ass,
    // @format: SubStation Alpha (v4.00)
    Ssa,
}

impl SubtitleFormat {
    /// Canonical file extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::Ssa => "ssa",
        }
    }

    /// Detect a format from the file extension, falling back to content
    /// sniffing for extension-less or mislabeled files
    pub fn detect(path: &Path, content: &str) -> Result<Self, SubtitleError> {
        if let Some(ext) = path.extension() {
            match ext.to_string_lossy().to_lowercase().as_str() {
                "srt" => return Ok(Self::Srt),
                "ass" => return Ok(Self::Ass),
                "ssa" => return Ok(Self::Ssa),
                _ => {}
            }
        }

        let head = content.trim_start();
        if head.starts_with("[Script Info]") {
            return Ok(Self::Ass);
        }
        if content.contains("-->") {
            return Ok(Self::Srt);
        }

        Err(SubtitleError::UnsupportedFormat(path.to_path_buf()))
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// SubStation script flavor carried through to output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssScriptVersion {
    /// v4.00 ([V4 Styles])
    V4,
    /// v4.00+ ([V4+ Styles])
    V4Plus,
}

/// Fields of a SubStation event line other than timing, style and text,
/// preserved verbatim for lossless output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssEventMeta {
    /// Line kind, "Dialogue" or "Comment"
    pub kind: String,
    /// Remaining (field name, value) pairs in file order
    pub extra: Vec<(String, String)>,
}

// @struct: One timed caption event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEvent {
    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Style name for SubStation events
    pub style: Option<String>,

    // @field: Text payload, opaque to every later stage
    pub text: String,

    // @field: SubStation line metadata, None for SRT events
    pub ass_meta: Option<AssEventMeta>,
}

impl SubtitleEvent {
    /// Format a millisecond timestamp as SRT (HH:MM:SS,mmm)
    pub fn format_srt_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    /// Format a millisecond timestamp as SubStation (H:MM:SS.cc)
    pub fn format_ass_timestamp(ms: u64) -> String {
        let centis = (ms + 5) / 10;
        let hours = centis / 360_000;
        let minutes = (centis % 360_000) / 6_000;
        let seconds = (centis % 6_000) / 100;
        let frac = centis % 100;

        format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, frac)
    }
}

/// A SubStation style definition; `fields` holds every attribute except the
/// name, aligned with the track's style format line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssStyle {
    /// Style name events refer to
    pub name: String,
    /// (field name, value) pairs excluding Name
    pub fields: Vec<(String, String)>,
}

/// One parsed subtitle file. Read-only after load: the merge step copies and
/// shifts events, it never mutates the track, so re-mapping after an override
/// change can reuse the same loaded data.
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Source filename
    pub source_file: PathBuf,

    /// Declared (or detected) format
    pub format: SubtitleFormat,

    /// SubStation script flavor, meaningful for Ass/Ssa tracks
    pub script_version: AssScriptVersion,

    /// Ordered events with original timestamps, exactly as authored
    pub events: Vec<SubtitleEvent>,

    /// Raw [Script Info] lines for SubStation tracks
    pub script_info: Vec<String>,

    /// Style definitions for SubStation tracks
    pub styles: Vec<AssStyle>,

    /// Style format field names (including Name) for SubStation tracks
    pub style_format: Vec<String>,
}

impl SubtitleTrack {
    /// Load and parse one subtitle file. Timestamps are preserved exactly;
    /// no offset is applied at this stage.
    pub fn load(path: &Path) -> Result<Self, SubtitleError> {
        let content = FileManager::read_text_lossy(path)?;
        let format = SubtitleFormat::detect(path, &content)?;

        let mut track = match format {
            SubtitleFormat::Srt => Self {
                source_file: path.to_path_buf(),
                format,
                script_version: AssScriptVersion::V4Plus,
                events: parse_srt(&content)?,
                script_info: Vec::new(),
                styles: Vec::new(),
                style_format: Vec::new(),
            },
            SubtitleFormat::Ass | SubtitleFormat::Ssa => {
                let mut track = parse_substation(&content)?;
                track.source_file = path.to_path_buf();
                track.format = format;
                track
            }
        };

        if track.events.is_empty() {
            return Err(SubtitleError::Empty(path.to_path_buf()));
        }
        Ok(track)
    }

    /// Stable identifier for override tables and error messages
    pub fn track_id(&self) -> String {
        self.source_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_file.to_string_lossy().into_owned())
    }

    /// Maximum end time across all events, in milliseconds
    pub fn total_duration_ms(&self) -> u64 {
        self.events.iter().map(|e| e.end_ms).max().unwrap_or(0)
    }

    /// Track duration with the straggler guard applied: when the latest end
    /// time sits alone more than a minute past the runner-up, the runner-up
    /// is the better estimate of where the episode actually ends.
    pub fn effective_duration_ms(&self) -> u64 {
        let mut ends: Vec<u64> = self.events.iter().map(|e| e.end_ms).collect();
        ends.sort_unstable();
        ends.dedup();

        match ends[..] {
            [] => 0,
            [only] => only,
            [.., runner_up, max] => {
                if runner_up + STRAGGLER_GAP_MS < max {
                    runner_up
                } else {
                    max
                }
            }
        }
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Track {}", self.track_id())?;
        writeln!(f, "Format: {}", self.format)?;
        writeln!(f, "Events: {}", self.events.len())?;
        writeln!(f, "Duration: {} ms", self.total_duration_ms())?;
        Ok(())
    }
}

/// Parse SRT content into events, preserving text verbatim
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEvent>, SubtitleError> {
    let mut events = Vec::new();

    // State variables for parsing
    let mut current_times: Option<(u64, u64)> = None;
    let mut current_text = String::new();

    let mut flush = |times: &mut Option<(u64, u64)>, text: &mut String| {
        if let Some((start_ms, end_ms)) = times.take() {
            if text.trim().is_empty() {
                warn!("Skipping empty subtitle entry at {} ms", start_ms);
            } else {
                events.push(SubtitleEvent {
                    start_ms,
                    end_ms,
                    style: None,
                    text: text.trim_end().to_string(),
                    ass_meta: None,
                });
            }
        }
        text.clear();
    };

    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            flush(&mut current_times, &mut current_text);
            continue;
        }

        // A bare number opening a new block is the sequence counter; the
        // merge writer renumbers anyway, so it is not kept
        if current_times.is_none() && current_text.is_empty() && trimmed.parse::<usize>().is_ok() {
            continue;
        }

        if current_times.is_none() {
            if let Some(caps) = SRT_TIMESTAMP_REGEX.captures(trimmed) {
                let start_ms = timestamp_captures_to_ms(&caps, 1);
                let end_ms = timestamp_captures_to_ms(&caps, 5);
                if end_ms < start_ms {
                    return Err(SubtitleError::EventEndsBeforeStart {
                        line: line_no,
                        start_ms,
                        end_ms,
                    });
                }
                current_times = Some((start_ms, end_ms));
                continue;
            }
            if trimmed.contains("-->") {
                return Err(SubtitleError::BadTimestamp {
                    line: line_no,
                    text: trimmed.to_string(),
                });
            }
        }

        if current_times.is_some() {
            if !current_text.is_empty() {
                current_text.push('\n');
            }
            current_text.push_str(line.trim_end());
        } else {
            warn!(
                "Unexpected text at line {} before any timestamp: {:?}",
                line_no, trimmed
            );
        }
    }

    // Final block without a trailing blank line
    flush(&mut current_times, &mut current_text);

    Ok(events)
}

fn timestamp_captures_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
    let field = |i: usize| -> u64 {
        caps.get(start_idx + i)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    (field(0) * 3_600 + field(1) * 60 + field(2)) * 1_000 + field(3)
}

/// Parse a SubStation timestamp (H:MM:SS.cc, fraction length flexible)
pub fn parse_ass_timestamp(text: &str) -> Option<u64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;

    let (secs_text, frac_text) = match parts[2].split_once('.') {
        Some((s, f)) => (s, f),
        None => (parts[2], ""),
    };
    let seconds: u64 = secs_text.parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    // Normalize the fraction to milliseconds regardless of digit count
    let mut millis: u64 = 0;
    if !frac_text.is_empty() {
        let digits: String = frac_text.chars().take(3).collect();
        if digits.chars().any(|c| !c.is_ascii_digit()) {
            return None;
        }
        let value: u64 = digits.parse().ok()?;
        millis = value * 10u64.pow(3 - digits.len() as u32);
    }

    Some((hours * 3_600 + minutes * 60 + seconds) * 1_000 + millis)
}

/// Parse ASS/SSA content into a track skeleton (source_file and format are
/// filled in by the caller)
fn parse_substation(content: &str) -> Result<SubtitleTrack, SubtitleError> {
    #[derive(PartialEq)]
    enum Section {
        None,
        Info,
        Styles,
        Events,
        Other,
    }

    let mut section = Section::None;
    let mut script_version = AssScriptVersion::V4Plus;
    let mut script_info = Vec::new();
    let mut style_format: Vec<String> = Vec::new();
    let mut styles = Vec::new();
    let mut event_format: Vec<String> = Vec::new();
    let mut events = Vec::new();

    for (line_no, raw_line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = raw_line.trim_end();
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let title = trimmed.to_lowercase();
            section = if title.contains("script info") {
                Section::Info
            } else if title.contains("style") {
                script_version = if title.contains('+') {
                    AssScriptVersion::V4Plus
                } else {
                    AssScriptVersion::V4
                };
                Section::Styles
            } else if title.contains("event") {
                Section::Events
            } else {
                Section::Other
            };
            continue;
        }

        match section {
            Section::Info => script_info.push(line.to_string()),
            Section::Styles => {
                if trimmed.starts_with(';') {
                    continue;
                }
                let Some((key, rest)) = trimmed.split_once(':') else {
                    continue;
                };
                if key.eq_ignore_ascii_case("format") {
                    style_format = rest.split(',').map(|f| f.trim().to_string()).collect();
                } else if key.eq_ignore_ascii_case("style") {
                    match parse_style_line(rest, &style_format) {
                        Some(style) => styles.push(style),
                        // One malformed style must not kill the whole file
                        None => warn!("Skipping malformed style line {}: {:?}", line_no, trimmed),
                    }
                }
            }
            Section::Events => {
                if trimmed.starts_with(';') {
                    continue;
                }
                let Some((kind, rest)) = trimmed.split_once(':') else {
                    continue;
                };
                if kind.eq_ignore_ascii_case("format") {
                    event_format = rest.split(',').map(|f| f.trim().to_string()).collect();
                    continue;
                }
                match parse_event_line(kind, rest, &event_format, line_no)? {
                    Some(event) => events.push(event),
                    None => warn!("Skipping malformed event line {}: {:?}", line_no, trimmed),
                }
            }
            Section::None | Section::Other => {}
        }
    }

    Ok(SubtitleTrack {
        source_file: PathBuf::new(),
        format: SubtitleFormat::Ass,
        script_version,
        events,
        script_info,
        styles,
        style_format,
    })
}

fn parse_style_line(rest: &str, format: &[String]) -> Option<AssStyle> {
    if format.is_empty() {
        return None;
    }
    let values: Vec<&str> = rest.splitn(format.len(), ',').map(str::trim).collect();
    if values.len() != format.len() {
        return None;
    }

    let mut name = None;
    let mut fields = Vec::with_capacity(format.len() - 1);
    for (field, value) in format.iter().zip(values) {
        if field.eq_ignore_ascii_case("name") {
            name = Some(value.to_string());
        } else {
            fields.push((field.clone(), value.to_string()));
        }
    }

    Some(AssStyle {
        name: name?,
        fields,
    })
}

fn parse_event_line(
    kind: &str,
    rest: &str,
    format: &[String],
    line_no: usize,
) -> Result<Option<SubtitleEvent>, SubtitleError> {
    if format.is_empty() {
        return Ok(None);
    }
    // splitn keeps commas inside the trailing text field intact
    let values: Vec<&str> = rest.splitn(format.len(), ',').collect();
    if values.len() != format.len() {
        return Ok(None);
    }

    let mut start = None;
    let mut end = None;
    let mut style = None;
    let mut text = None;
    let mut extra = Vec::new();

    for (field, value) in format.iter().zip(values) {
        let lowered = field.to_lowercase();
        match lowered.as_str() {
            "start" => start = Some((value.trim().to_string(), parse_ass_timestamp(value))),
            "end" => end = Some((value.trim().to_string(), parse_ass_timestamp(value))),
            "style" => style = Some(value.trim().to_string()),
            "text" => text = Some(value.to_string()),
            _ => extra.push((field.clone(), value.trim().to_string())),
        }
    }

    let (Some((start_text, start_parsed)), Some((end_text, end_parsed))) = (start, end) else {
        return Ok(None);
    };
    let Some(start_ms) = start_parsed else {
        return Err(SubtitleError::BadTimestamp {
            line: line_no,
            text: start_text,
        });
    };
    let Some(end_ms) = end_parsed else {
        return Err(SubtitleError::BadTimestamp {
            line: line_no,
            text: end_text,
        });
    };
    if end_ms < start_ms {
        return Err(SubtitleError::EventEndsBeforeStart {
            line: line_no,
            start_ms,
            end_ms,
        });
    }

    Ok(Some(SubtitleEvent {
        start_ms,
        end_ms,
        style,
        text: text.unwrap_or_default(),
        ass_meta: Some(AssEventMeta {
            kind: kind.trim().to_string(),
            extra,
        }),
    }))
}
