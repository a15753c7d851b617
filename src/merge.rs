use std::collections::HashMap;
use log::warn;

use crate::alignment::AlignmentMapping;
use crate::errors::AlignmentError;
use crate::subtitle_processor::{
    AssScriptVersion, AssStyle, SubtitleEvent, SubtitleFormat, SubtitleTrack,
};

// @module: Offset application, track concatenation, and output rendering

/// Standard v4.00+ style table used when SubStation output is requested but
/// no input track brought styles of its own (SRT-only inputs)
const DEFAULT_STYLE_FORMAT: &str = "Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";
const DEFAULT_STYLE_LINE: &str = "Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,\
0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1";

/// The final merged subtitle stream. Regenerated on every merge request,
/// never mutated incrementally.
#[derive(Debug, Clone)]
pub struct MergedSubtitle {
    /// Output format the stream renders as
    pub format: SubtitleFormat,

    /// Script flavor for SubStation output
    pub script_version: AssScriptVersion,

    /// [Script Info] lines carried from the first mapped SubStation track
    pub script_info: Vec<String>,

    /// Style format field names for SubStation output
    pub style_format: Vec<String>,

    /// Reconciled style table
    pub styles: Vec<AssStyle>,

    /// All events, offset-shifted, in chapter order
    pub events: Vec<SubtitleEvent>,
}

/// Apply each mapping's offset to its track's events and concatenate in
/// chapter-index order. Source tracks are copied from, never touched, so the
/// caller can re-merge after an override change without reloading.
///
/// Deterministic: identical inputs produce identical output, byte for byte.
pub fn merge(
    tracks: &[SubtitleTrack],
    mappings: &[AlignmentMapping],
    forced_format: Option<SubtitleFormat>,
) -> Result<MergedSubtitle, AlignmentError> {
    if mappings.is_empty() {
        return Err(AlignmentError::EmptyMappingSet);
    }

    let mut ordered: Vec<&AlignmentMapping> = mappings.iter().collect();
    ordered.sort_by_key(|m| m.chapter_index);

    let format = forced_format.unwrap_or_else(|| common_format(tracks, &ordered));
    let script_version = ordered
        .iter()
        .map(|m| &tracks[m.track_index])
        .find(|t| !t.styles.is_empty())
        .map(|t| t.script_version)
        .unwrap_or(AssScriptVersion::V4Plus);
    let script_info = ordered
        .iter()
        .map(|m| &tracks[m.track_index])
        .find(|t| !t.script_info.is_empty())
        .map(|t| t.script_info.clone())
        .unwrap_or_default();
    let style_format = ordered
        .iter()
        .map(|m| &tracks[m.track_index])
        .find(|t| !t.style_format.is_empty())
        .map(|t| t.style_format.clone())
        .unwrap_or_default();

    // Reconcile styles across tracks: identical definitions collapse, name
    // collisions with differing definitions get a renamed copy and the
    // colliding track's events are remapped to the new name
    let mut styles: Vec<AssStyle> = Vec::new();
    let mut sig_to_name: HashMap<Vec<(String, String)>, String> = HashMap::new();
    let mut used_names: HashMap<String, Vec<(String, String)>> = HashMap::new();
    let mut renames: Vec<HashMap<String, String>> = Vec::with_capacity(ordered.len());

    for mapping in &ordered {
        let track = &tracks[mapping.track_index];
        let mut rename = HashMap::new();

        for style in &track.styles {
            let sig = style_signature(style);

            if let Some(existing) = sig_to_name.get(&sig) {
                if *existing != style.name {
                    rename.insert(style.name.clone(), existing.clone());
                }
                continue;
            }

            let mut name = style.name.clone();
            while used_names.contains_key(&name) {
                name.push('1');
            }
            if name != style.name {
                warn!(
                    "Style {:?} from track {:?} conflicts with an earlier definition, renamed to {:?}",
                    style.name, mapping.track_id, name
                );
                rename.insert(style.name.clone(), name.clone());
            }

            styles.push(AssStyle {
                name: name.clone(),
                fields: style.fields.clone(),
            });
            sig_to_name.insert(sig.clone(), name.clone());
            used_names.insert(name, sig);
        }

        renames.push(rename);
    }

    // Copy-and-shift every mapped track's events in chapter order
    let mut events = Vec::new();
    for (mapping, rename) in ordered.iter().zip(&renames) {
        let track = &tracks[mapping.track_index];
        let offset = mapping.effective_offset_ms();

        for event in &track.events {
            let start = event.start_ms as i64 + offset;
            let end = event.end_ms as i64 + offset;
            if start < 0 {
                warn!(
                    "Event at {} ms in track {:?} shifted before zero, clamping",
                    event.start_ms, mapping.track_id
                );
            }

            let style = event.style.as_ref().map(|name| {
                rename.get(name).cloned().unwrap_or_else(|| name.clone())
            });

            events.push(SubtitleEvent {
                start_ms: start.max(0) as u64,
                end_ms: end.max(0) as u64,
                style,
                text: event.text.clone(),
                ass_meta: event.ass_meta.clone(),
            });
        }
    }

    Ok(MergedSubtitle {
        format,
        script_version,
        script_info,
        style_format,
        styles,
        events,
    })
}

/// Output format shared by every mapped track, or SRT as the lowest common
/// denominator for mixed inputs
fn common_format(tracks: &[SubtitleTrack], ordered: &[&AlignmentMapping]) -> SubtitleFormat {
    let mut formats = ordered.iter().map(|m| tracks[m.track_index].format);
    let Some(first) = formats.next() else {
        return SubtitleFormat::Srt;
    };
    if formats.all(|f| f == first) {
        first
    } else {
        warn!("Input tracks mix formats, rendering output as SRT");
        SubtitleFormat::Srt
    }
}

fn style_signature(style: &AssStyle) -> Vec<(String, String)> {
    style
        .fields
        .iter()
        .map(|(field, value)| (field.to_lowercase(), value.clone()))
        .collect()
}

impl MergedSubtitle {
    /// Render the merged stream in its output format
    pub fn render(&self) -> String {
        match self.format {
            SubtitleFormat::Srt => self.render_srt(),
            SubtitleFormat::Ass | SubtitleFormat::Ssa => self.render_substation(),
        }
    }

    fn render_srt(&self) -> String {
        let mut out = String::new();
        for (seq, event) in self.events.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                seq + 1,
                SubtitleEvent::format_srt_timestamp(event.start_ms),
                SubtitleEvent::format_srt_timestamp(event.end_ms),
                event.text
            ));
        }
        out
    }

    fn render_substation(&self) -> String {
        let mut out = String::new();

        out.push_str("[Script Info]\n");
        if self.script_info.is_empty() {
            out.push_str("Title: merged subtitle\n");
            out.push_str(match self.script_version {
                AssScriptVersion::V4Plus => "ScriptType: v4.00+\n",
                AssScriptVersion::V4 => "ScriptType: v4.00\n",
            });
        } else {
            for line in &self.script_info {
                out.push_str(line);
                out.push('\n');
            }
        }

        out.push_str(match self.script_version {
            AssScriptVersion::V4Plus => "\n[V4+ Styles]\n",
            AssScriptVersion::V4 => "\n[V4 Styles]\n",
        });
        if self.styles.is_empty() || self.style_format.is_empty() {
            out.push_str(&format!("Format: {}\n", DEFAULT_STYLE_FORMAT));
            out.push_str(&format!("Style: {}\n", DEFAULT_STYLE_LINE));
        } else {
            out.push_str(&format!("Format: {}\n", self.style_format.join(", ")));
            for style in &self.styles {
                out.push_str(&format!("Style: {}\n", render_style_values(style, &self.style_format)));
            }
        }

        out.push_str("\n[Events]\n");
        let event_format: &[&str] = match self.script_version {
            AssScriptVersion::V4Plus => &[
                "Layer", "Start", "End", "Style", "Name", "MarginL", "MarginR", "MarginV",
                "Effect", "Text",
            ],
            AssScriptVersion::V4 => &[
                "Marked", "Start", "End", "Style", "Name", "MarginL", "MarginR", "MarginV",
                "Effect", "Text",
            ],
        };
        out.push_str(&format!("Format: {}\n", event_format.join(", ")));
        for event in &self.events {
            out.push_str(&render_event_line(event, event_format));
            out.push('\n');
        }

        out
    }
}

fn render_style_values(style: &AssStyle, format: &[String]) -> String {
    let values: Vec<&str> = format
        .iter()
        .map(|field| {
            if field.eq_ignore_ascii_case("name") {
                style.name.as_str()
            } else {
                style
                    .fields
                    .iter()
                    .find(|(f, _)| f.eq_ignore_ascii_case(field))
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("")
            }
        })
        .collect();
    values.join(",")
}

fn render_event_line(event: &SubtitleEvent, format: &[&str]) -> String {
    let kind = event
        .ass_meta
        .as_ref()
        .map(|m| m.kind.as_str())
        .unwrap_or("Dialogue");

    let values: Vec<String> = format
        .iter()
        .map(|field| match *field {
            "Start" => SubtitleEvent::format_ass_timestamp(event.start_ms),
            "End" => SubtitleEvent::format_ass_timestamp(event.end_ms),
            "Style" => event.style.clone().unwrap_or_else(|| "Default".to_string()),
            "Text" => event.text.clone(),
            other => event
                .ass_meta
                .as_ref()
                .and_then(|m| {
                    m.extra
                        .iter()
                        .find(|(f, _)| f.eq_ignore_ascii_case(other))
                        .map(|(_, v)| v.clone())
                })
                .unwrap_or_else(|| default_event_field(other).to_string()),
        })
        .collect();

    format!("{}: {}", kind, values.join(","))
}

fn default_event_field(field: &str) -> &'static str {
    match field {
        "Layer" | "MarginL" | "MarginR" | "MarginV" => "0",
        "Marked" => "Marked=0",
        _ => "",
    }
}
