//! Post-processing integration tests: completed download directory ->
//! library folder, with episode state and history updated.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tempfile::TempDir;

use medusa_core::config::{LibraryConfig, PostProcessingConfig, ProcessMethod};
use medusa_core::postprocess::{PostProcessItem, PostProcessScheduler};
use medusa_core::queue::QueueAction;
use medusa_core::testing::fixtures;
use medusa_core::{
    create_history_system, EpisodeStatus, EpisodeUpdate, GenericQueue, HistoryFilter,
    HistoryStore, LibraryStore, PostProcessor, Quality, ScheduledAction, Show,
    SqliteHistoryStore, SqliteLibraryStore,
};

struct TestHarness {
    library: Arc<SqliteLibraryStore>,
    history_store: Arc<SqliteHistoryStore>,
    processor: Arc<PostProcessor>,
    downloads: std::path::PathBuf,
    tv: std::path::PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new(method: ProcessMethod) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let downloads = temp_dir.path().join("downloads");
        let tv = temp_dir.path().join("tv");
        std::fs::create_dir_all(&downloads).unwrap();

        let library = Arc::new(SqliteLibraryStore::in_memory().unwrap());
        let history_store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        let (history, writer) = create_history_system(history_store.clone(), 64);
        tokio::spawn(writer.run());

        let config = PostProcessingConfig {
            enabled: true,
            download_dir: Some(downloads.clone()),
            method,
            ..PostProcessingConfig::default()
        };
        let processor = Arc::new(
            PostProcessor::new(library.clone(), LibraryConfig::default(), config)
                .with_history(history),
        );

        Self {
            library,
            history_store,
            processor,
            downloads,
            tv,
            _temp_dir: temp_dir,
        }
    }

    fn add_show(&self, name: &str, episodes: u32) -> Show {
        let show = self
            .library
            .add_show(&fixtures::new_show(name, self.tv.join(name)))
            .unwrap();
        let aired = Some(Local::now().date_naive() - chrono::Duration::days(3));
        let new: Vec<_> = (1..=episodes)
            .map(|e| fixtures::new_episode(1, e, aired))
            .collect();
        self.library.upsert_episodes(show.id, &new).unwrap();
        show
    }

    fn download(&self, relative: &str, content: &[u8]) {
        let path = self.downloads.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

#[tokio::test]
async fn test_process_release_directory() {
    let h = TestHarness::new(ProcessMethod::Move);
    let show = h.add_show("Show Name", 2);

    h.download("Show.Name.S01E02.720p.HDTV.x264-GRP/show.name.s01e02.720p.hdtv.x264-grp.mkv", b"video");
    h.download("Show.Name.S01E02.720p.HDTV.x264-GRP/show.name.s01e02.720p.hdtv.x264-grp.srt", b"subs");
    h.download("Show.Name.S01E02.720p.HDTV.x264-GRP/sample-show.name.s01e02.mkv", b"sample");

    let report = h.processor.process_dir(&h.downloads, false).await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.failed.is_empty());

    let expected = h
        .tv
        .join("Show Name/Season 01/Show Name - S01E02 - Episode 2.mkv");
    assert_eq!(report.processed[0].destination, expected);
    assert_eq!(std::fs::read(&expected).unwrap(), b"video");
    assert!(exists(&expected.with_extension("srt")));

    let episode = h.library.get_episode(show.id, 1, 2).unwrap();
    assert_eq!(episode.status, EpisodeStatus::Downloaded);
    assert_eq!(episode.quality, Some(Quality::HdTv));
    assert_eq!(episode.location.as_deref(), Some(expected.as_path()));

    // moved video left the release dir holding only the sample
    assert!(exists(&h.downloads.join("Show.Name.S01E02.720p.HDTV.x264-GRP/sample-show.name.s01e02.mkv")));

    for _ in 0..50 {
        if h.history_store
            .count(&HistoryFilter::new().with_event_type("downloaded"))
            .unwrap()
            == 1
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("downloaded event not written");
}

#[tokio::test]
async fn test_move_removes_emptied_directories() {
    let h = TestHarness::new(ProcessMethod::Move);
    h.add_show("Show Name", 1);
    h.download("Show.Name.S01E01.1080p.WEB-DL-GRP/abc.mkv", b"video");

    let report = h.processor.process_dir(&h.downloads, false).await.unwrap();
    assert_eq!(report.processed.len(), 1);
    assert!(!exists(&h.downloads.join("Show.Name.S01E01.1080p.WEB-DL-GRP")));
    assert!(exists(&h.downloads));
}

#[tokio::test]
async fn test_copy_keeps_source() {
    let h = TestHarness::new(ProcessMethod::Copy);
    h.add_show("Show Name", 1);
    h.download("Show.Name.S01E01.720p.HDTV.x264-GRP.mkv", b"video");

    let report = h.processor.process_dir(&h.downloads, false).await.unwrap();
    assert_eq!(report.processed.len(), 1);
    assert!(exists(&h.downloads.join("Show.Name.S01E01.720p.HDTV.x264-GRP.mkv")));
    assert!(exists(&report.processed[0].destination));
}

#[tokio::test]
async fn test_does_not_replace_better_quality() {
    let h = TestHarness::new(ProcessMethod::Copy);
    let show = h.add_show("Show Name", 1);
    h.library
        .update_episode(
            show.id,
            1,
            1,
            &EpisodeUpdate::status(EpisodeStatus::Downloaded).with_quality(Quality::FullHdWebDl),
        )
        .unwrap();

    h.download("Show.Name.S01E01.720p.HDTV.x264-GRP.mkv", b"video");
    let report = h.processor.process_dir(&h.downloads, false).await.unwrap();
    assert!(report.processed.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("already downloaded"));

    // a proper or a forced run replaces it
    let report = h.processor.process_dir(&h.downloads, true).await.unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(
        h.library.get_episode(show.id, 1, 1).unwrap().quality,
        Some(Quality::HdTv)
    );
}

#[tokio::test]
async fn test_unknown_show_and_episode_are_skipped() {
    let h = TestHarness::new(ProcessMethod::Copy);
    h.add_show("Show Name", 1);
    h.download("Unknown.Show.S01E01.720p.HDTV.x264-GRP.mkv", b"video");
    h.download("Show.Name.S05E09.720p.HDTV.x264-GRP.mkv", b"video");
    h.download("notes.txt", b"not a video");

    let report = h.processor.process_dir(&h.downloads, false).await.unwrap();
    assert!(report.processed.is_empty());
    assert_eq!(report.skipped.len(), 2);
}

#[tokio::test]
async fn test_multi_episode_file() {
    let h = TestHarness::new(ProcessMethod::Move);
    let show = h.add_show("Show Name", 2);
    h.download("Show.Name.S01E01E02.720p.HDTV.x264-GRP.mkv", b"video");

    let report = h.processor.process_dir(&h.downloads, false).await.unwrap();
    assert_eq!(report.processed[0].episodes, vec![1, 2]);
    assert_eq!(
        report.processed[0].destination,
        h.tv
            .join("Show Name/Season 01/Show Name - S01E01-E02 - Episode 1 & Episode 2.mkv")
    );
    assert_eq!(
        h.library.get_episode(show.id, 1, 2).unwrap().status,
        EpisodeStatus::Downloaded
    );
}

#[tokio::test]
async fn test_post_process_item_runs_processor() {
    let h = TestHarness::new(ProcessMethod::Move);
    h.add_show("Show Name", 1);
    h.download("Show.Name.S01E01.720p.HDTV.x264-GRP.mkv", b"video");

    let item = PostProcessItem::new(h.processor.clone(), h.downloads.clone(), false);
    assert_eq!(item.kind(), "post_process");
    item.run().await.unwrap();

    let missing = PostProcessItem::new(h.processor.clone(), h.downloads.join("missing"), false);
    assert!(missing.run().await.is_err());
}

#[tokio::test]
async fn test_forced_scheduler_run_keeps_quality_guard() {
    let h = TestHarness::new(ProcessMethod::Copy);
    let show = h.add_show("Show Name", 1);
    h.library
        .update_episode(
            show.id,
            1,
            1,
            &EpisodeUpdate::status(EpisodeStatus::Downloaded).with_quality(Quality::FullHdBluRay),
        )
        .unwrap();
    h.download("Show.Name.S01E01.HDTV.x264-GRP.mkv", b"video");

    let queue = Arc::new(GenericQueue::new("postprocess"));
    let scheduler = PostProcessScheduler::new(queue.clone(), h.processor.clone());
    scheduler.run(true).await;
    assert_eq!(queue.len(), 1);

    for _ in 0..200 {
        queue.run(false);
        if queue.is_empty() && !queue.is_busy() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(queue.is_empty() && !queue.is_busy());

    let episode = h.library.get_episode(show.id, 1, 1).unwrap();
    assert_eq!(episode.quality, Some(Quality::FullHdBluRay));
    assert_eq!(queue.history()[0].success, Some(true));
}
