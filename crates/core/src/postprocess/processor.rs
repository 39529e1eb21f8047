//! Matching downloaded files to episodes and placing them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use super::placer::{place_file, remove_empty_dirs};
use super::{PostProcessError, PostProcessReport, ProcessedFile, SkippedFile};
use crate::config::{LibraryConfig, PostProcessingConfig, ProcessMethod};
use crate::history::{HistoryEvent, HistoryHandle};
use crate::library::{Episode, EpisodeStatus, EpisodeUpdate, LibraryError, LibraryStore, Show};
use crate::metrics;
use crate::naming::{parse_release_name, NamingContext, NamingPattern, ParsedRelease};
use crate::quality::Quality;

pub struct PostProcessor {
    library: Arc<dyn LibraryStore>,
    library_config: LibraryConfig,
    config: PostProcessingConfig,
    pattern: NamingPattern,
    history: Option<HistoryHandle>,
}

/// Outcome for one video file.
enum FileOutcome {
    Processed(ProcessedFile),
    Skipped(String),
}

impl PostProcessor {
    pub fn new(
        library: Arc<dyn LibraryStore>,
        library_config: LibraryConfig,
        config: PostProcessingConfig,
    ) -> Self {
        let pattern = NamingPattern::new(library_config.naming_pattern.clone());
        Self {
            library,
            library_config,
            config,
            pattern,
            history: None,
        }
    }

    pub fn with_history(mut self, history: HistoryHandle) -> Self {
        self.history = Some(history);
        self
    }

    pub fn download_dir(&self) -> Option<&Path> {
        self.config.download_dir.as_deref()
    }

    /// Process every video file below `dir`. `force` replaces existing
    /// episode files regardless of quality.
    pub async fn process_dir(
        &self,
        dir: &Path,
        force: bool,
    ) -> Result<PostProcessReport, PostProcessError> {
        if !fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(PostProcessError::NotADirectory(dir.to_path_buf()));
        }

        let files = self.video_files(dir).await;
        debug!(dir = %dir.display(), files = files.len(), "Post-processing directory");

        let mut report = PostProcessReport::default();
        for file in files {
            match self.process_file(&file, force).await {
                Ok(FileOutcome::Processed(processed)) => {
                    metrics::POSTPROCESSED_FILES
                        .with_label_values(&["processed"])
                        .inc();
                    report.processed.push(processed);
                }
                Ok(FileOutcome::Skipped(reason)) => {
                    debug!(file = %file.display(), reason, "Skipped file");
                    metrics::POSTPROCESSED_FILES
                        .with_label_values(&["skipped"])
                        .inc();
                    report.skipped.push(SkippedFile { path: file, reason });
                }
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Post-processing failed");
                    metrics::POSTPROCESSED_FILES
                        .with_label_values(&["failed"])
                        .inc();
                    report.failed.push(SkippedFile {
                        path: file,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if self.config.method == ProcessMethod::Move
            && self.config.delete_empty_dirs
            && !report.processed.is_empty()
        {
            let removed = remove_empty_dirs(dir).await;
            debug!(dir = %dir.display(), removed, "Removed empty directories");
        }

        info!(
            dir = %dir.display(),
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Post-processing finished"
        );
        Ok(report)
    }

    /// Video files below `dir`, sorted by path.
    async fn video_files(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut stack = vec![dir.to_path_buf()];

        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %current.display(), error = %e, "Cannot read directory");
                    continue;
                }
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                match entry.file_type().await {
                    Ok(t) if t.is_dir() => stack.push(path),
                    Ok(t) if t.is_file() && self.is_video(&path) => files.push(path),
                    _ => {}
                }
            }
        }

        files.sort();
        files
    }

    fn is_video(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| self.config.video_extensions.iter().any(|v| v.eq_ignore_ascii_case(&ext)))
    }

    async fn process_file(&self, file: &Path, force: bool) -> Result<FileOutcome, PostProcessError> {
        let file_name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let is_sample = file_name
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .any(|t| t == "sample");
        if is_sample {
            return Ok(FileOutcome::Skipped("sample file".to_string()));
        }

        let Some(parsed) = parse_file(file) else {
            return Ok(FileOutcome::Skipped("cannot parse release name".to_string()));
        };

        let Some(show) = self.library.find_show_by_name(&parsed.series_name)? else {
            return Ok(FileOutcome::Skipped(format!(
                "no show matches '{}'",
                parsed.series_name
            )));
        };

        let episodes = match self.find_episodes(&show, &parsed) {
            Ok(episodes) if !episodes.is_empty() => episodes,
            Ok(_) | Err(LibraryError::NotFound(_)) => {
                return Ok(FileOutcome::Skipped("episode not in library".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !force && !parsed.proper {
            let better = episodes.iter().find(|e| {
                matches!(e.status, EpisodeStatus::Downloaded | EpisodeStatus::Archived)
                    && e.quality.unwrap_or(Quality::Unknown) >= parsed.quality
            });
            if let Some(existing) = better {
                return Ok(FileOutcome::Skipped(format!(
                    "S{:02}E{:02} already downloaded in {}",
                    existing.season,
                    existing.episode,
                    existing.quality.unwrap_or(Quality::Unknown).display_name()
                )));
            }
        }

        let destination = self.destination(&show, &episodes, &parsed, file);
        let old_locations: Vec<PathBuf> = episodes
            .iter()
            .filter_map(|e| e.location.clone())
            .filter(|l| l != &destination)
            .collect();

        place_file(file, &destination, self.config.method).await?;
        let associated = self.place_associated(file, &destination).await;

        for old in old_locations {
            if fs::remove_file(&old).await.is_ok() {
                debug!(path = %old.display(), "Removed replaced episode file");
            }
        }

        let season = episodes[0].season;
        let numbers: Vec<u32> = episodes.iter().map(|e| e.episode).collect();
        let update = EpisodeUpdate::status(EpisodeStatus::Downloaded)
            .with_quality(parsed.quality)
            .with_location(destination.clone())
            .with_release_name(parsed.release_name.clone());
        for number in &numbers {
            self.library.update_episode(show.id, season, *number, &update)?;
        }

        info!(
            show = %show.name,
            season,
            episodes = ?numbers,
            destination = %destination.display(),
            "Placed episode"
        );

        if let Some(history) = &self.history {
            history
                .emit(HistoryEvent::Downloaded {
                    show_id: show.id,
                    season,
                    episodes: numbers.clone(),
                    release_name: parsed.release_name.clone(),
                    quality: parsed.quality.as_str().to_string(),
                    destination: destination.display().to_string(),
                })
                .await;
        }

        Ok(FileOutcome::Processed(ProcessedFile {
            source: file.to_path_buf(),
            destination,
            show_id: show.id,
            show_name: show.name,
            season,
            episodes: numbers,
            quality: parsed.quality,
            associated,
        }))
    }

    fn find_episodes(&self, show: &Show, parsed: &ParsedRelease) -> Result<Vec<Episode>, LibraryError> {
        if let Some(date) = parsed.air_date {
            return Ok(self
                .library
                .find_episode_by_airdate(show.id, date)?
                .into_iter()
                .collect());
        }

        let Some(season) = parsed.season else {
            return Ok(Vec::new());
        };
        parsed
            .episodes
            .iter()
            .map(|&e| self.library.get_episode(show.id, season, e))
            .collect()
    }

    fn destination(&self, show: &Show, episodes: &[Episode], parsed: &ParsedRelease, file: &Path) -> PathBuf {
        let numbers: Vec<u32> = episodes.iter().map(|e| e.episode).collect();
        let mut names: Vec<&str> = Vec::new();
        for e in episodes {
            if !e.name.is_empty() && !names.contains(&e.name.as_str()) {
                names.push(&e.name);
            }
        }
        let episode_name = names.join(" & ");

        let ctx = NamingContext {
            show_name: &show.name,
            season: episodes[0].season,
            episodes: &numbers,
            episode_name: &episode_name,
            quality: Some(parsed.quality),
            release_group: parsed.release_group.as_deref(),
            air_date: episodes[0].airdate.or(parsed.air_date),
        };

        let mut dir = show.location.clone();
        if self.library_config.season_folders {
            dir.push(NamingPattern::season_folder(
                &self.library_config.season_folder_format,
                episodes[0].season,
            ));
        }

        let mut name = self.pattern.render(&ctx);
        if let Some(ext) = extension(file) {
            name.push('.');
            name.push_str(&ext);
        }
        dir.join(name)
    }

    /// Move files named like the video (`Name.srt`, `Name.en.srt`) next to
    /// the placed video. Failures are logged and skipped.
    async fn place_associated(&self, video: &Path, destination: &Path) -> Vec<PathBuf> {
        let (Some(dir), Some(stem), Some(dest_stem)) = (
            video.parent(),
            video.file_stem().and_then(|s| s.to_str()),
            destination.file_stem().and_then(|s| s.to_str()),
        ) else {
            return Vec::new();
        };

        let mut placed = Vec::new();
        let Ok(mut entries) = fs::read_dir(dir).await else {
            return placed;
        };

        let prefix = format!("{}.", stem);
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(suffix) = name.strip_prefix(&prefix) else {
                continue;
            };
            let associated = extension(&path).is_some_and(|ext| {
                self.config
                    .associated_extensions
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(&ext))
            });
            if !associated {
                continue;
            }

            let target = destination.with_file_name(format!("{}.{}", dest_stem, suffix));
            match place_file(&path, &target, self.config.method).await {
                Ok(_) => placed.push(target),
                Err(e) => warn!(file = %path.display(), error = %e, "Failed to place associated file"),
            }
        }
        placed.sort();
        placed
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Parse the file name, falling back to the parent directory name when the
/// file name lacks the show name or an episode marker. The better quality of
/// the two wins when the file name carries none.
fn parse_file(file: &Path) -> Option<ParsedRelease> {
    let from_file = file
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_release_name);
    let from_dir = file
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .and_then(parse_release_name);

    match (from_file, from_dir) {
        (Some(mut file), Some(dir)) => {
            if file.series_name.is_empty() {
                file.series_name = dir.series_name;
            }
            if file.quality == Quality::Unknown {
                file.quality = dir.quality;
            }
            if file.release_group.is_none() {
                file.release_group = dir.release_group;
            }
            file.proper |= dir.proper;
            Some(file)
        }
        (Some(file), None) => (!file.series_name.is_empty()).then_some(file),
        (None, Some(dir)) if !dir.series_name.is_empty() => Some(dir),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_falls_back_to_parent() {
        let parsed = parse_file(Path::new(
            "/downloads/Show.Name.S01E02.720p.HDTV.x264-GRP/abc123.mkv",
        ))
        .unwrap();
        assert_eq!(parsed.series_name, "Show Name");
        assert_eq!(parsed.episodes, vec![2]);
        assert_eq!(parsed.quality, Quality::HdTv);
    }

    #[test]
    fn test_parse_file_merges_missing_show_name() {
        let parsed = parse_file(Path::new(
            "/downloads/Show.Name.S01E02.720p.HDTV.x264-GRP/s01e02.mkv",
        ))
        .unwrap();
        assert_eq!(parsed.series_name, "Show Name");
        assert_eq!(parsed.quality, Quality::HdTv);
    }

    #[test]
    fn test_parse_file_prefers_file_name() {
        let parsed = parse_file(Path::new(
            "/downloads/Season Pack/Show.Name.S01E03.1080p.WEB-DL-GRP.mkv",
        ))
        .unwrap();
        assert_eq!(parsed.episodes, vec![3]);
        assert_eq!(parsed.quality, Quality::FullHdWebDl);
        assert!(parse_file(Path::new("/downloads/random/movie.mkv")).is_none());
    }
}
