use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::naming::normalize_show_name;
use crate::quality::Quality;

/// A tracked show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Show {
    pub id: i64,
    pub name: String,
    pub aliases: Vec<String>,
    /// Library directory of the show.
    pub location: PathBuf,
    /// Qualities that may be snatched or post-processed. Empty allows any.
    pub qualities: Vec<Quality>,
    pub paused: bool,
    /// Episodes are identified by air date rather than season/episode.
    pub air_by_date: bool,
    pub created_at: DateTime<Utc>,
}

impl Show {
    pub fn allows(&self, quality: Quality) -> bool {
        self.qualities.is_empty() || self.qualities.contains(&quality)
    }

    /// Normalized name plus normalized aliases.
    pub fn match_names(&self) -> Vec<String> {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .map(|n| normalize_show_name(n))
            .filter(|n| !n.is_empty())
            .collect()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        let wanted = normalize_show_name(name);
        !wanted.is_empty() && self.match_names().contains(&wanted)
    }
}

/// Input for adding a show.
#[derive(Debug, Clone, Deserialize)]
pub struct NewShow {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub location: PathBuf,
    #[serde(default)]
    pub qualities: Vec<Quality>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub air_by_date: bool,
}

/// Episode lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Unaired,
    Wanted,
    Skipped,
    Ignored,
    Snatched,
    SnatchedProper,
    Downloaded,
    Archived,
    Failed,
}

impl EpisodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::Unaired => "unaired",
            EpisodeStatus::Wanted => "wanted",
            EpisodeStatus::Skipped => "skipped",
            EpisodeStatus::Ignored => "ignored",
            EpisodeStatus::Snatched => "snatched",
            EpisodeStatus::SnatchedProper => "snatched_proper",
            EpisodeStatus::Downloaded => "downloaded",
            EpisodeStatus::Archived => "archived",
            EpisodeStatus::Failed => "failed",
        }
    }

    /// Statuses searched for by daily and backlog searches.
    pub fn is_wanted(&self) -> bool {
        matches!(self, EpisodeStatus::Wanted | EpisodeStatus::Failed)
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpisodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "unaired" => EpisodeStatus::Unaired,
            "wanted" => EpisodeStatus::Wanted,
            "skipped" => EpisodeStatus::Skipped,
            "ignored" => EpisodeStatus::Ignored,
            "snatched" => EpisodeStatus::Snatched,
            "snatched_proper" => EpisodeStatus::SnatchedProper,
            "downloaded" => EpisodeStatus::Downloaded,
            "archived" => EpisodeStatus::Archived,
            "failed" => EpisodeStatus::Failed,
            other => return Err(format!("unknown episode status: {}", other)),
        })
    }
}

/// An episode of a show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub show_id: i64,
    pub season: u32,
    pub episode: u32,
    pub name: String,
    pub airdate: Option<NaiveDate>,
    pub status: EpisodeStatus,
    pub quality: Option<Quality>,
    pub location: Option<PathBuf>,
    pub release_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or refreshing an episode.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEpisode {
    pub season: u32,
    pub episode: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub airdate: Option<NaiveDate>,
    /// Defaults to `wanted` for aired episodes, `unaired` otherwise.
    /// Existing episodes keep their status unless one is given.
    #[serde(default)]
    pub status: Option<EpisodeStatus>,
}

/// Fields to change on an episode; `None` leaves the field alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpisodeUpdate {
    #[serde(default)]
    pub status: Option<EpisodeStatus>,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub location: Option<PathBuf>,
    #[serde(default)]
    pub release_name: Option<String>,
}

impl EpisodeUpdate {
    pub fn status(status: EpisodeStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_release_name(mut self, release_name: impl Into<String>) -> Self {
        self.release_name = Some(release_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show() -> Show {
        Show {
            id: 1,
            name: "Doctor Who (2005)".to_string(),
            aliases: vec!["Dr Who".to_string()],
            location: PathBuf::from("/tv/Doctor Who"),
            qualities: vec![Quality::HdTv],
            paused: false,
            air_by_date: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_show_name_matching() {
        let show = show();
        assert!(show.matches_name("Doctor.Who"));
        assert!(show.matches_name("doctor who 2005"));
        assert!(show.matches_name("Dr. Who"));
        assert!(!show.matches_name("Doctor Foster"));
        assert!(!show.matches_name(""));
    }

    #[test]
    fn test_show_allows_quality() {
        let mut show = show();
        assert!(show.allows(Quality::HdTv));
        assert!(!show.allows(Quality::SdTv));
        show.qualities.clear();
        assert!(show.allows(Quality::SdTv));
    }

    #[test]
    fn test_status_names() {
        for status in [
            EpisodeStatus::Unaired,
            EpisodeStatus::SnatchedProper,
            EpisodeStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<EpisodeStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!("bogus".parse::<EpisodeStatus>().is_err());
        assert!(EpisodeStatus::Failed.is_wanted());
        assert!(!EpisodeStatus::Snatched.is_wanted());
    }
}
