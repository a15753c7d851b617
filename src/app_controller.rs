use anyhow::{anyhow, Context, Result};
use log::{warn, info, debug};
use std::path::{Path, PathBuf};
use std::time::Duration;
use indicatif::{ProgressBar, ProgressStyle};

use crate::alignment::{self, MappingOverrides};
use crate::app_config::Config;
use crate::chapters;
use crate::file_utils::FileManager;
use crate::merge;
use crate::playlist::{self, PlaybackPath};
use crate::subtitle_processor::SubtitleTrack;

// @module: Application controller wiring the alignment pipeline together

/// One merge request, fully described up front
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Disc root containing a BDMV/PLAYLIST tree (a mounted image or folder)
    pub disc_root: PathBuf,

    /// Directory holding the per-episode subtitle files
    pub subtitles_dir: PathBuf,

    /// Directory the merged subtitle and chapter files are written to
    pub output_dir: PathBuf,

    /// Playlist selection: a rank from `scan`, or an .mpls file stem.
    /// None takes the top-ranked candidate.
    pub playlist: Option<String>,

    /// Optional JSON override table (assignments, manual offsets, skips)
    pub overrides_path: Option<PathBuf>,

    /// Where to write the chapter file; defaults next to the subtitle output
    pub chapters_path: Option<PathBuf>,

    /// Overwrite existing output files
    pub force_overwrite: bool,
}

/// What a completed merge produced, for callers and tests
#[derive(Debug)]
pub struct MergeOutcome {
    /// Path of the merged subtitle file
    pub subtitle_path: PathBuf,

    /// Path of the OGM chapter file
    pub chapters_path: PathBuf,

    /// Number of tracks that made it into the merge
    pub track_count: usize,

    /// Number of advisory anomaly flags raised
    pub anomaly_count: usize,
}

/// Main application controller for subtitle merging
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// List the ranked main-playlist candidates for a disc on stdout
    pub async fn run_scan(&self, disc_root: &Path) -> Result<()> {
        let candidates = self.scan_candidates(disc_root).await?;

        println!("{:<5} {:<12} {:>12} {:>9} {:>7} {:>12}", "rank", "playlist", "duration", "segments", "marks", "score");
        for (rank, candidate) in candidates.iter().enumerate() {
            let name = candidate
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!(
                "{:<5} {:<12} {:>12} {:>9} {:>7} {:>12.1}",
                rank,
                name,
                format_duration(candidate.total_duration_ms()),
                candidate.segments.len(),
                candidate.marks.len(),
                candidate.plausibility()
            );
        }
        Ok(())
    }

    /// Run the full merge workflow for one disc
    pub async fn run_merge(&self, request: MergeRequest) -> Result<MergeOutcome> {
        let start_time = std::time::Instant::now();

        if !request.disc_root.exists() {
            return Err(anyhow!("Disc root does not exist: {:?}", request.disc_root));
        }
        if !request.subtitles_dir.exists() {
            return Err(anyhow!("Subtitle directory does not exist: {:?}", request.subtitles_dir));
        }
        FileManager::ensure_dir(&request.output_dir)?;

        // Timeline and subtitle loading are independent; the disc scan is
        // quick, so it runs first and parallelism is spent on the files
        let candidates = self.scan_candidates(&request.disc_root).await?;
        let selected = self.select_candidate(&candidates, request.playlist.as_deref())?;

        let subtitle_files = FileManager::find_subtitle_files(&request.subtitles_dir)?;
        if subtitle_files.is_empty() {
            return Err(anyhow!(
                "No subtitle files (.srt/.ass/.ssa) found in {:?}",
                request.subtitles_dir
            ));
        }

        let tracks = self.load_tracks(subtitle_files).await?;
        if tracks.is_empty() {
            return Err(anyhow!("No subtitle track could be loaded"));
        }

        let overrides = match &request.overrides_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read overrides file: {:?}", path))?;
                serde_json::from_str::<MappingOverrides>(&content)
                    .with_context(|| format!("Failed to parse overrides file: {:?}", path))?
            }
            None => MappingOverrides::default(),
        };

        let mappings = alignment::resolve(selected, &tracks, &overrides)?;
        let anomalies =
            alignment::detect_anomalies(selected, &tracks, &mappings, self.config.tolerance_ms());

        let merged = merge::merge(
            &tracks,
            &mappings,
            self.config.output_format.map(|f| f.as_subtitle_format()),
        )?;

        let subtitle_path = FileManager::generate_output_path(
            &request.disc_root,
            &request.output_dir,
            merged.format.extension(),
        );
        if subtitle_path.exists() && !request.force_overwrite {
            return Err(anyhow!(
                "Output already exists (use -f to force overwrite): {:?}",
                subtitle_path
            ));
        }
        FileManager::write_to_file(&subtitle_path, &merged.render())?;

        let chapter_list = derive_and_log_chapters(&mappings, &self.config.chapter_label_prefix);
        let chapters_path = request.chapters_path.clone().unwrap_or_else(|| {
            FileManager::generate_output_path(&request.disc_root, &request.output_dir, "chapters.txt")
        });
        FileManager::write_to_file(&chapters_path, &chapter_list.render_ogm())?;

        self.write_report(&request, selected, &mappings, &anomalies, &subtitle_path)?;

        info!(
            "Merged {} tracks into {:?} in {:.1}s ({} anomaly flags)",
            mappings.len(),
            subtitle_path.file_name().unwrap_or_default(),
            start_time.elapsed().as_secs_f64(),
            anomalies.len()
        );

        Ok(MergeOutcome {
            subtitle_path,
            chapters_path,
            track_count: mappings.len(),
            anomaly_count: anomalies.len(),
        })
    }

    /// Scan the disc's playlists under the configured I/O bound. The .mpls
    /// reads sit on the mounted image just like the video streams, so a
    /// stalled mount must surface as a timeout error, not a hang.
    async fn scan_candidates(&self, disc_root: &Path) -> Result<Vec<PlaybackPath>> {
        let limit = Duration::from_secs(self.config.io_timeout_secs);
        let root = disc_root.to_path_buf();
        let min_duration = self.config.min_main_duration_secs;

        let candidates = run_bounded(
            format!("Disc scan of {:?}", disc_root),
            limit,
            move || playlist::scan_disc(&root, min_duration),
        )
        .await??;
        Ok(candidates)
    }

    fn select_candidate<'a>(
        &self,
        candidates: &'a [PlaybackPath],
        selector: Option<&str>,
    ) -> Result<&'a PlaybackPath> {
        match selector {
            None => {
                let top = &candidates[0];
                info!(
                    "Selected top-ranked playlist {:?} ({} segments, {})",
                    top.source.file_name().unwrap_or_default(),
                    top.segments.len(),
                    format_duration(top.total_duration_ms())
                );
                Ok(top)
            }
            Some(sel) => {
                if let Ok(rank) = sel.parse::<usize>() {
                    return candidates.get(rank).ok_or_else(|| {
                        anyhow!(
                            "Playlist rank {} out of range, scan listed {} candidates",
                            rank,
                            candidates.len()
                        )
                    });
                }
                candidates
                    .iter()
                    .find(|c| {
                        c.source
                            .file_stem()
                            .is_some_and(|stem| stem.to_string_lossy().eq_ignore_ascii_case(sel))
                    })
                    .ok_or_else(|| anyhow!("No playlist candidate named {:?}", sel))
            }
        }
    }

    /// Load subtitle files concurrently. Each load is bounded by the I/O
    /// timeout, and a failure on one file never aborts the others.
    async fn load_tracks(&self, files: Vec<PathBuf>) -> Result<Vec<SubtitleTrack>> {
        let timeout = Duration::from_secs(self.config.io_timeout_secs);
        let progress = ProgressBar::new(files.len() as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} loading subtitles")
        {
            progress.set_style(style);
        }

        let mut handles = Vec::with_capacity(files.len());
        for path in files {
            let handle = tokio::spawn(async move {
                let parse_path = path.clone();
                let label = format!("Loading {:?}", path.file_name().unwrap_or_default());
                let result = run_bounded(label, timeout, move || SubtitleTrack::load(&parse_path))
                    .await
                    .and_then(|parsed| parsed.map_err(anyhow::Error::from));
                (path, result)
            });
            handles.push(handle);
        }

        let mut tracks = Vec::with_capacity(handles.len());
        for handle in futures::future::join_all(handles).await {
            let (path, result) = handle.context("Subtitle load task panicked")?;
            progress.inc(1);
            match result {
                Ok(track) => {
                    debug!("Loaded {:?}: {} events", path.file_name().unwrap_or_default(), track.events.len());
                    tracks.push(track);
                }
                // Isolated per file: the rest of the set keeps loading
                Err(e) => warn!("Skipping {:?}: {}", path.file_name().unwrap_or_default(), e),
            }
        }
        progress.finish_and_clear();

        Ok(tracks)
    }

    fn write_report(
        &self,
        request: &MergeRequest,
        selected: &PlaybackPath,
        mappings: &[crate::alignment::AlignmentMapping],
        anomalies: &[crate::alignment::AnomalyFlag],
        subtitle_path: &Path,
    ) -> Result<()> {
        let report_path = request.output_dir.join("merge_report.log");

        FileManager::append_to_report(
            &report_path,
            &format!(
                "merged {:?} against {:?} -> {:?}",
                request.subtitles_dir,
                selected.source.file_name().unwrap_or_default(),
                subtitle_path.file_name().unwrap_or_default()
            ),
        )?;
        for mapping in mappings {
            FileManager::append_to_report(
                &report_path,
                &format!(
                    "  track {:?} -> segment {} at {} (+{} ms manual)",
                    mapping.track_id,
                    mapping.chapter_index,
                    format_duration(mapping.cumulative_offset_ms),
                    mapping.manual_offset_ms
                ),
            )?;
        }
        for flag in anomalies {
            FileManager::append_to_report(
                &report_path,
                &format!(
                    "  anomaly {:?} on track {:?} segment {}: {} ms",
                    flag.kind, flag.track_id, flag.chapter_index, flag.deviation_ms
                ),
            )?;
        }

        Ok(())
    }
}

/// Run a blocking file operation on a worker thread with an upper time
/// bound. Disc-image access can stall outright; the pipeline's structure and
/// subtitle reads all go through here so a dead mount becomes an error.
pub async fn run_bounded<T, F>(label: String, limit: Duration, task: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let work = tokio::task::spawn_blocking(task);
    tokio::select! {
        joined = work => joined.with_context(|| format!("{} task panicked", label)),
        _ = tokio::time::sleep(limit) => {
            Err(anyhow!("{} timed out after {:?}", label, limit))
        }
    }
}

fn derive_and_log_chapters(
    mappings: &[crate::alignment::AlignmentMapping],
    label_prefix: &str,
) -> chapters::ChapterList {
    let list = chapters::derive_chapters(mappings, label_prefix);
    for entry in &list.entries {
        debug!("{} at {}", entry.label, format_duration(entry.timestamp_ms));
    }
    list
}

fn format_duration(ms: u64) -> String {
    let secs = ms / 1_000;
    format!("{}:{:02}:{:02}", secs / 3_600, (secs % 3_600) / 60, secs % 60)
}
