use crate::alignment::AlignmentMapping;

// @module: Chapter list derivation for the external injector

/// One chapter marker in merged-timeline coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterEntry {
    /// Stable display label
    pub label: String,
    /// Chapter position in milliseconds
    pub timestamp_ms: u64,
}

/// Ordered chapter markers, one per mapped segment boundary. Handed to an
/// external container-editing tool; this module never writes files itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterList {
    /// Entries in timestamp order
    pub entries: Vec<ChapterEntry>,
}

/// Derive one chapter per mapping, timestamp = that mapping's cumulative
/// offset. Mappings arrive sorted by chapter index, so timestamps come out
/// monotonically non-decreasing.
pub fn derive_chapters(mappings: &[AlignmentMapping], label_prefix: &str) -> ChapterList {
    let mut ordered: Vec<&AlignmentMapping> = mappings.iter().collect();
    ordered.sort_by_key(|m| m.chapter_index);

    let entries = ordered
        .iter()
        .enumerate()
        .map(|(i, mapping)| ChapterEntry {
            label: format!("{} {:02}", label_prefix, i + 1),
            timestamp_ms: mapping.cumulative_offset_ms,
        })
        .collect();

    ChapterList { entries }
}

impl ChapterList {
    /// Render in OGM text chapter format, the lingua franca of mkvmerge and
    /// mkvpropedit:
    ///
    /// ```text
    /// CHAPTER01=00:00:00.000
    /// CHAPTER01NAME=Chapter 01
    /// ```
    pub fn render_ogm(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let n = i + 1;
            out.push_str(&format!(
                "CHAPTER{:02}={}\n",
                n,
                format_ogm_timestamp(entry.timestamp_ms)
            ));
            out.push_str(&format!("CHAPTER{:02}NAME={}\n", n, entry.label));
        }
        out
    }
}

fn format_ogm_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
