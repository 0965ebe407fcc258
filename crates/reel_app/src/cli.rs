use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "reel",
    version,
    about = "Discover the videos of a playlist page, download them and optionally merge them"
)]
pub struct Cli {
    /// Listing page to discover video links on.
    #[arg(
        value_name = "URL",
        required_unless_present_any = ["links_file", "init_config"]
    )]
    pub seed_url: Option<String>,

    /// Add links from a file, one per line, instead of or in addition to discovery.
    #[arg(long, value_name = "FILE")]
    pub links_file: Option<PathBuf>,

    /// Download directory (overrides the settings file).
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Items to download: `all`, or 1-based indices and ranges like `1,3-5`.
    #[arg(long, value_name = "ITEMS", default_value = "all")]
    pub select: String,

    /// Concatenate the downloaded files into one once the batch finishes.
    #[arg(long, default_value_t = false)]
    pub merge: bool,

    /// After discovery, fetch up to N more batches of `max_items` links from
    /// the same page.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub load_more: u32,

    /// Stop after discovery and print the list.
    #[arg(long, default_value_t = false)]
    pub discover_only: bool,

    /// Settings file (RON). Defaults to `reel.ron` when present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the default settings to FILE and exit.
    #[arg(long, value_name = "FILE")]
    pub init_config: Option<PathBuf>,

    /// Print status events as JSON lines.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, value_name = "FILE", default_value = reel_logging::DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Also log to the terminal, at debug level.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Resolves a selection such as `1,3-5` against a list of `len` items into 0-based
/// indices, in ascending order without duplicates.
pub fn parse_selection(selection: &str, len: usize) -> Result<Vec<usize>, String> {
    let selection = selection.trim();
    if selection.eq_ignore_ascii_case("all") {
        return Ok((0..len).collect());
    }

    let mut picked = vec![false; len];
    for part in selection.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (index(start, len)?, index(end, len)?),
            None => {
                let single = index(part, len)?;
                (single, single)
            }
        };
        if start > end {
            return Err(format!("range {part} runs backwards"));
        }
        for slot in &mut picked[start..=end] {
            *slot = true;
        }
    }

    let indices: Vec<usize> = picked
        .iter()
        .enumerate()
        .filter_map(|(i, picked)| picked.then_some(i))
        .collect();
    if indices.is_empty() {
        return Err(format!("selection {selection:?} picks nothing"));
    }
    Ok(indices)
}

fn index(raw: &str, len: usize) -> Result<usize, String> {
    let position: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("{raw:?} is not a number"))?;
    if position == 0 || position > len {
        return Err(format!("{position} is outside 1..={len}"));
    }
    Ok(position - 1)
}
