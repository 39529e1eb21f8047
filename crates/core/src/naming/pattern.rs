use chrono::NaiveDate;

use crate::quality::Quality;

/// Values substituted into a naming pattern.
#[derive(Debug, Clone, Default)]
pub struct NamingContext<'a> {
    pub show_name: &'a str,
    pub season: u32,
    pub episodes: &'a [u32],
    pub episode_name: &'a str,
    pub quality: Option<Quality>,
    pub release_group: Option<&'a str>,
    pub air_date: Option<NaiveDate>,
}

/// Longest tokens first so `%SN` wins over `%S`.
const TOKENS: &[&str] = &[
    "%S.N", "%SN", "%EN", "%QN", "%RG", "%AD", "%0S", "%0E", "%S", "%E",
];

/// File name template.
///
/// | token | value |
/// |---|---|
/// | `%SN` / `%S.N` | show name / show name with dots |
/// | `%S` / `%0S` | season / zero-padded season |
/// | `%E` / `%0E` | episode / zero-padded episode, multi-episode as `01-E02` |
/// | `%EN` | episode name |
/// | `%QN` | quality name |
/// | `%RG` | release group |
/// | `%AD` | air date (`YYYY-MM-DD`) |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPattern {
    pattern: String,
}

impl NamingPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Render a file name stem (no extension). The result is sanitized and
    /// loses separators left dangling by empty tokens.
    pub fn render(&self, ctx: &NamingContext<'_>) -> String {
        let rendered = expand(&self.pattern, ctx);
        let trimmed = rendered.trim_matches(|c: char| c == ' ' || c == '-' || c == '.' || c == '_');
        sanitize_file_name(trimmed)
    }

    /// Season folder name for `format` (e.g. `Season %0S`).
    pub fn season_folder(format: &str, season: u32) -> String {
        let ctx = NamingContext {
            season,
            ..Default::default()
        };
        sanitize_file_name(expand(format, &ctx).trim())
    }
}

fn expand(pattern: &str, ctx: &NamingContext<'_>) -> String {
    let mut out = String::with_capacity(pattern.len() + 32);
    let mut rest = pattern;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        match TOKENS.iter().find(|t| rest.starts_with(**t)) {
            Some(token) => {
                out.push_str(&token_value(token, ctx));
                rest = &rest[token.len()..];
            }
            None => {
                out.push('%');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn token_value(token: &str, ctx: &NamingContext<'_>) -> String {
    match token {
        "%SN" => ctx.show_name.to_string(),
        "%S.N" => ctx.show_name.split_whitespace().collect::<Vec<_>>().join("."),
        "%S" => ctx.season.to_string(),
        "%0S" => format!("{:02}", ctx.season),
        "%E" => join_episodes(ctx.episodes, false),
        "%0E" => join_episodes(ctx.episodes, true),
        "%EN" => ctx.episode_name.to_string(),
        "%QN" => ctx.quality.map(|q| q.display_name().to_string()).unwrap_or_default(),
        "%RG" => ctx.release_group.unwrap_or_default().to_string(),
        "%AD" => ctx
            .air_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn join_episodes(episodes: &[u32], padded: bool) -> String {
    let fmt = |e: &u32| {
        if padded {
            format!("{:02}", e)
        } else {
            e.to_string()
        }
    };
    episodes.iter().map(fmt).collect::<Vec<_>>().join("-E")
}

/// Remove characters that are not allowed in file names on common
/// filesystems. Slashes and `*` become `-`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' | '*' => Some('-'),
            ':' | '"' | '<' | '>' | '|' | '?' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    replaced
        .split(' ')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string()
}
