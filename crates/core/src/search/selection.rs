//! Choosing one release among provider results.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;
use tracing::trace;

use crate::config::SearchConfig;
use crate::library::Show;
use crate::naming::{parse_release_name, ParsedRelease};
use crate::provider::ProviderResult;

/// A provider result that passed filtering, with its parsed name.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRelease {
    pub result: ProviderResult,
    pub parsed: ParsedRelease,
}

/// Pick the best acceptable release.
///
/// Rejected: unparseable names, qualities the show doesn't allow, names with
/// an ignored word or without any required word, and failed releases
/// (`failed` holds lowercase release names). The rest are ranked by quality,
/// then proper/repack, then seeders, then publish date.
pub fn pick_best_result(
    show: &Show,
    results: &[ProviderResult],
    config: &SearchConfig,
    failed: &HashSet<String>,
) -> Option<CandidateRelease> {
    results
        .iter()
        .filter_map(|result| {
            let parsed = parse_release_name(&result.title)?;
            if let Some(reason) = rejection(show, &parsed, config, failed) {
                trace!(release = %result.title, reason, "Rejected release");
                return None;
            }
            Some(CandidateRelease {
                result: result.clone(),
                parsed,
            })
        })
        .max_by(compare)
}

fn rejection(
    show: &Show,
    parsed: &ParsedRelease,
    config: &SearchConfig,
    failed: &HashSet<String>,
) -> Option<&'static str> {
    if !show.allows(parsed.quality) {
        return Some("quality not allowed");
    }

    let words: Vec<String> = parsed
        .release_name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect();
    let has_word = |w: &String| words.contains(&w.to_lowercase());

    if config.ignored_words.iter().any(has_word) {
        return Some("contains ignored word");
    }
    if !config.required_words.is_empty() && !config.required_words.iter().any(has_word) {
        return Some("missing required word");
    }
    if failed.contains(&parsed.release_name.to_lowercase()) {
        return Some("previously failed");
    }
    None
}

fn compare(a: &CandidateRelease, b: &CandidateRelease) -> Ordering {
    a.parsed
        .quality
        .cmp(&b.parsed.quality)
        .then(a.parsed.proper.cmp(&b.parsed.proper))
        .then(a.result.seeders.unwrap_or(0).cmp(&b.result.seeders.unwrap_or(0)))
        .then(a.result.published.cmp(&b.result.published))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Quality;
    use crate::testing::fixtures;
    use chrono::{Duration, Utc};

    fn pick(show: &Show, results: &[ProviderResult]) -> Option<String> {
        pick_best_result(show, results, &SearchConfig::default(), &HashSet::new())
            .map(|c| c.result.title)
    }

    #[test]
    fn test_prefers_higher_quality() {
        let show = fixtures::show(1, "Show");
        let results = vec![
            fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-A", 100),
            fixtures::torrent_result("Show.S01E01.720p.WEB-DL.x264-B", 1),
            fixtures::torrent_result("Show.S01E01.HDTV.x264-C", 500),
        ];
        assert_eq!(pick(&show, &results).unwrap(), "Show.S01E01.720p.WEB-DL.x264-B");
    }

    #[test]
    fn test_respects_allowed_qualities() {
        let mut show = fixtures::show(1, "Show");
        show.qualities = vec![Quality::HdTv];
        let results = vec![
            fixtures::torrent_result("Show.S01E01.1080p.BluRay.x264-A", 100),
            fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-B", 1),
        ];
        assert_eq!(pick(&show, &results).unwrap(), "Show.S01E01.720p.HDTV.x264-B");

        show.qualities = vec![Quality::SdDvd];
        assert!(pick(&show, &results).is_none());
    }

    #[test]
    fn test_proper_then_seeders_then_newest() {
        let show = fixtures::show(1, "Show");
        let results = vec![
            fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-A", 100),
            fixtures::torrent_result("Show.S01E01.PROPER.720p.HDTV.x264-B", 1),
        ];
        assert_eq!(pick(&show, &results).unwrap(), "Show.S01E01.PROPER.720p.HDTV.x264-B");

        let results = vec![
            fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-A", 10),
            fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-B", 20),
        ];
        assert_eq!(pick(&show, &results).unwrap(), "Show.S01E01.720p.HDTV.x264-B");

        let mut older = fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-A", 10);
        older.published = Some(Utc::now() - Duration::days(2));
        let mut newer = fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-B", 10);
        newer.published = Some(Utc::now());
        assert_eq!(pick(&show, &[newer, older]).unwrap(), "Show.S01E01.720p.HDTV.x264-B");
    }

    #[test]
    fn test_ignored_and_required_words() {
        let show = fixtures::show(1, "Show");
        let results = vec![
            fixtures::torrent_result("Show.S01E01.GERMAN.1080p.WEB-DL-A", 100),
            fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-B", 1),
        ];
        assert_eq!(pick(&show, &results).unwrap(), "Show.S01E01.720p.HDTV.x264-B");

        let config = SearchConfig {
            required_words: vec!["web".to_string()],
            ignored_words: Vec::new(),
            ..SearchConfig::default()
        };
        let best = pick_best_result(&show, &results, &config, &HashSet::new()).unwrap();
        assert_eq!(best.result.title, "Show.S01E01.GERMAN.1080p.WEB-DL-A");
    }

    #[test]
    fn test_skips_failed_releases() {
        let show = fixtures::show(1, "Show");
        let results = vec![
            fixtures::torrent_result("Show.S01E01.1080p.WEB-DL-A", 100),
            fixtures::torrent_result("Show.S01E01.720p.HDTV.x264-B", 1),
        ];
        let failed: HashSet<String> = ["show.s01e01.1080p.web-dl-a".to_string()].into();
        let best = pick_best_result(&show, &results, &SearchConfig::default(), &failed).unwrap();
        assert_eq!(best.result.title, "Show.S01E01.720p.HDTV.x264-B");
    }
}
