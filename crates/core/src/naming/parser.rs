use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use tracing::trace;

use crate::quality::Quality;

static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<series>.*?)[ ._\-]+)?s(?P<season>\d{1,3})[ ._\-]?e(?P<episode>\d{1,3})(?P<extra>(?:[ ._\-]?e\d{1,3}|-\d{1,3}\b)*)",
    )
    .expect("valid regex")
});

static NUMBERED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<series>.*?)[ ._\-]+)?(?P<season>\d{1,2})x(?P<episode>\d{2,3})(?P<extra>(?:[x\-]\d{2,3}\b)*)",
    )
    .expect("valid regex")
});

static AIR_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<series>.*?)[ ._\-]+)?(?P<year>(?:19|20)\d{2})[ ._\-](?P<month>\d{2})[ ._\-](?P<day>\d{2})(?:[ ._\-]|$)",
    )
    .expect("valid regex")
});

static EXTRA_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,3}").expect("valid regex"));

static RELEASE_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(?P<group>[A-Za-z0-9]+)$").expect("valid regex"));

static TRAILING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ ._\-]*\[[^\]]*\]$").expect("valid regex"));

const STRIPPED_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "mpg", "mpeg", "ogm", "webm", "nzb",
    "torrent", "srt", "sub", "idx", "nfo",
];

const PROPER_TAGS: &[&str] = &["proper", "repack", "real", "rerip"];

/// What a release name says about its content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRelease {
    /// Show name as written in the release, separators turned into spaces.
    /// Empty when the name starts with the episode marker.
    pub series_name: String,
    pub season: Option<u32>,
    pub episodes: Vec<u32>,
    pub air_date: Option<NaiveDate>,
    pub quality: Quality,
    pub release_group: Option<String>,
    pub proper: bool,
    /// Input without file extension.
    pub release_name: String,
}

impl ParsedRelease {
    pub fn is_air_by_date(&self) -> bool {
        self.air_date.is_some()
    }
}

/// Parse a scene release or file name. `None` if it has no episode or air
/// date marker.
pub fn parse_release_name(name: &str) -> Option<ParsedRelease> {
    let release_name = strip_extension(name.trim()).to_string();
    let stem = TRAILING_TAG.replace(&release_name, "").into_owned();

    let (series, season, episodes, air_date) = if let Some(caps) = SEASON_EPISODE.captures(&stem) {
        let season: u32 = caps["season"].parse().ok()?;
        let first: u32 = caps["episode"].parse().ok()?;
        let episodes = episode_range(first, caps.name("extra").map_or("", |m| m.as_str()));
        (caps.name("series").map_or("", |m| m.as_str()), Some(season), episodes, None)
    } else if let Some(caps) = NUMBERED.captures(&stem) {
        let season: u32 = caps["season"].parse().ok()?;
        let first: u32 = caps["episode"].parse().ok()?;
        let episodes = episode_range(first, caps.name("extra").map_or("", |m| m.as_str()));
        (caps.name("series").map_or("", |m| m.as_str()), Some(season), episodes, None)
    } else if let Some(caps) = AIR_DATE.captures(&stem) {
        let date = NaiveDate::from_ymd_opt(
            caps["year"].parse().ok()?,
            caps["month"].parse().ok()?,
            caps["day"].parse().ok()?,
        )?;
        (caps.name("series").map_or("", |m| m.as_str()), None, Vec::new(), Some(date))
    } else {
        trace!(name, "No episode marker in release name");
        return None;
    };

    let lower = stem.to_lowercase();
    let proper = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|t| PROPER_TAGS.contains(&t));

    Some(ParsedRelease {
        series_name: clean_series_name(series),
        season,
        episodes,
        air_date,
        quality: Quality::from_name(&stem),
        release_group: RELEASE_GROUP
            .captures(&stem)
            .map(|c| c["group"].to_string()),
        proper,
        release_name,
    })
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if STRIPPED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => stem,
        _ => name,
    }
}

/// `E01E02E03` and `E01-E03` both mean episodes 1 through 3.
fn episode_range(first: u32, extra: &str) -> Vec<u32> {
    let last = EXTRA_NUMBER
        .find_iter(extra)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .last()
        .unwrap_or(first);

    if last > first && last - first < 100 {
        (first..=last).collect()
    } else {
        vec![first]
    }
}

fn clean_series_name(raw: &str) -> String {
    raw.replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_string()
}

/// Key used to compare show names across releases: lowercase, no
/// punctuation, single spaces, no trailing year.
pub fn normalize_show_name(name: &str) -> String {
    let lowered = name.to_lowercase().replace('&', " and ").replace('\'', "");
    let mut words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.len() > 1 {
        let is_year = words.last().is_some_and(|w| {
            w.len() == 4 && (w.starts_with("19") || w.starts_with("20")) && w.chars().all(|c| c.is_ascii_digit())
        });
        if is_year {
            words.pop();
        }
    }

    words.join(" ")
}
