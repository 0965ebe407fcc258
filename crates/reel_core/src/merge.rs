use std::path::{Path, PathBuf};

use regex::Regex;

use crate::sanitize::sanitize_title;

/// Localized "episode N" marker, as in `三体 第12集.mp4`.
pub const DEFAULT_EPISODE_PATTERN: &str = r"第(\d+)集";
pub const FALLBACK_BASE_NAME: &str = "Playlist";

/// Extracts the sequence number embedded in a file name.
///
/// The first capture group holds the number; without a group the first digit
/// run inside the whole match is used.
#[derive(Debug, Clone)]
pub struct EpisodePattern {
    regex: Regex,
}

impl EpisodePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn episode(&self, name: &str) -> Option<u32> {
        let caps = self.regex.captures(name)?;
        let text = caps.get(1).or_else(|| caps.get(0))?.as_str();
        let digits: String = text
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }

    /// Text in front of the marker, trimmed; `None` without a marker.
    pub fn title_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        let found = self.regex.find(name)?;
        let prefix = name[..found.start()].trim();
        (!prefix.is_empty()).then_some(prefix)
    }
}

impl Default for EpisodePattern {
    fn default() -> Self {
        Self::new(DEFAULT_EPISODE_PATTERN).expect("built-in episode pattern compiles")
    }
}

/// A planned concatenation: ordered inputs and the derived output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub inputs: Vec<PathBuf>,
    pub base_name: String,
    pub episode_range: Option<(u32, u32)>,
    pub output_file_name: String,
}

/// Sorts ascending by episode number; files without one keep their relative
/// order after all numbered files.
pub fn order_inputs(files: &[PathBuf], pattern: &EpisodePattern) -> Vec<PathBuf> {
    let mut ordered = files.to_vec();
    // `sort_by_key` is stable, which keeps unnumbered files in input order.
    ordered.sort_by_key(|path| match pattern.episode(&file_name(path)) {
        Some(episode) => (0u8, episode),
        None => (1u8, 0),
    });
    ordered
}

/// Orders `files` and derives `Full_<base>[ <start>-<end>]_<timestamp>.<ext>`.
pub fn plan_merge(
    files: &[PathBuf],
    pattern: &EpisodePattern,
    extension: &str,
    timestamp: &str,
) -> MergeJob {
    let inputs = order_inputs(files, pattern);

    let base_name = inputs
        .first()
        .map(|first| file_stem(first))
        .and_then(|stem| pattern.title_prefix(&stem).map(sanitize_title))
        .unwrap_or_else(|| FALLBACK_BASE_NAME.to_string());

    let episodes: Vec<u32> = inputs
        .iter()
        .filter_map(|path| pattern.episode(&file_name(path)))
        .collect();
    let episode_range = match (episodes.first(), episodes.last()) {
        (Some(start), Some(end)) => Some((*start, *end)),
        _ => None,
    };

    let range = episode_range
        .map(|(start, end)| format!(" {start}-{end}"))
        .unwrap_or_default();
    let output_file_name = format!(
        "Full_{base_name}{range}_{timestamp}.{}",
        extension.trim_start_matches('.')
    );

    MergeJob {
        inputs,
        base_name,
        episode_range,
        output_file_name,
    }
}

/// Concat demuxer list: one `file '<name>'` line per input.
///
/// Inputs inside `list_dir` are referenced by bare name so the list survives
/// relocating the directory; anything else keeps its full path.
pub fn concat_list(inputs: &[PathBuf], list_dir: &Path) -> String {
    let mut list = String::new();
    for input in inputs {
        let reference = if input.parent() == Some(list_dir) {
            file_name(input)
        } else {
            input.to_string_lossy().into_owned()
        };
        list.push_str("file '");
        list.push_str(&reference.replace('\'', r"'\''"));
        list.push_str("'\n");
    }
    list
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
