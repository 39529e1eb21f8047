//! Release quality classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Quality of a release, ordered from worst to best.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Unknown,
    SdTv,
    SdDvd,
    HdTv,
    RawHdTv,
    FullHdTv,
    HdWebDl,
    FullHdWebDl,
    HdBluRay,
    FullHdBluRay,
    Uhd4kTv,
    Uhd4kWebDl,
    Uhd4kBluRay,
}

impl Quality {
    pub const ALL: [Quality; 13] = [
        Quality::Unknown,
        Quality::SdTv,
        Quality::SdDvd,
        Quality::HdTv,
        Quality::RawHdTv,
        Quality::FullHdTv,
        Quality::HdWebDl,
        Quality::FullHdWebDl,
        Quality::HdBluRay,
        Quality::FullHdBluRay,
        Quality::Uhd4kTv,
        Quality::Uhd4kWebDl,
        Quality::Uhd4kBluRay,
    ];

    /// Classify a release or file name from its scene tokens.
    pub fn from_name(name: &str) -> Quality {
        let lower = name.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let has = |t: &str| tokens.contains(&t);
        let has_pair = |a: &str, b: &str| tokens.windows(2).any(|w| w[0] == a && w[1] == b);

        let web = has("webdl")
            || has("webrip")
            || has("web")
            || has_pair("web", "dl")
            || has("amzn")
            || has("nf")
            || has("itunes");
        let bluray = has("bluray") || has("bdrip") || has("brrip") || has_pair("blu", "ray");
        let tv = has("hdtv") || has("pdtv") || has("sdtv") || has("dsr") || has("tvrip");
        let dvd = has("dvdrip") || has("dvd") || has("dvdr") || (has("bdrip") && !has("720p"));

        if has("2160p") || has("4k") || has("uhd") {
            return if bluray {
                Quality::Uhd4kBluRay
            } else if web {
                Quality::Uhd4kWebDl
            } else {
                Quality::Uhd4kTv
            };
        }

        if has("1080i") || (has("mpeg2") && (has("720p") || has("1080p"))) {
            return Quality::RawHdTv;
        }

        if has("1080p") {
            return if bluray {
                Quality::FullHdBluRay
            } else if web {
                Quality::FullHdWebDl
            } else {
                Quality::FullHdTv
            };
        }

        if has("720p") {
            return if bluray {
                Quality::HdBluRay
            } else if web {
                Quality::HdWebDl
            } else {
                Quality::HdTv
            };
        }

        if dvd {
            return Quality::SdDvd;
        }

        if tv || web || has("480p") || has("xvid") || has("x264") || has("h264") {
            return Quality::SdTv;
        }

        Quality::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Unknown => "unknown",
            Quality::SdTv => "sdtv",
            Quality::SdDvd => "sddvd",
            Quality::HdTv => "hdtv",
            Quality::RawHdTv => "rawhdtv",
            Quality::FullHdTv => "fullhdtv",
            Quality::HdWebDl => "hdwebdl",
            Quality::FullHdWebDl => "fullhdwebdl",
            Quality::HdBluRay => "hdbluray",
            Quality::FullHdBluRay => "fullhdbluray",
            Quality::Uhd4kTv => "uhd4ktv",
            Quality::Uhd4kWebDl => "uhd4kwebdl",
            Quality::Uhd4kBluRay => "uhd4kbluray",
        }
    }

    /// Name used in file names (`%QN`).
    pub fn display_name(&self) -> &'static str {
        match self {
            Quality::Unknown => "Unknown",
            Quality::SdTv => "SDTV",
            Quality::SdDvd => "SD DVD",
            Quality::HdTv => "720p HDTV",
            Quality::RawHdTv => "RawHD",
            Quality::FullHdTv => "1080p HDTV",
            Quality::HdWebDl => "720p WEB-DL",
            Quality::FullHdWebDl => "1080p WEB-DL",
            Quality::HdBluRay => "720p BluRay",
            Quality::FullHdBluRay => "1080p BluRay",
            Quality::Uhd4kTv => "4K UHD TV",
            Quality::Uhd4kWebDl => "4K UHD WEB-DL",
            Quality::Uhd4kBluRay => "4K UHD BluRay",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown quality: {}", s))
    }
}
