use std::sync::OnceLock;

use regex::Regex;

/// One parsed progress line from the fetch tool.
///
/// Sizes are carried for display only; the unit is opaque and never
/// converted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub percent: f64,
    pub downloaded: Option<f64>,
    pub total: Option<f64>,
    pub unit: Option<String>,
}

impl ProgressRecord {
    /// Human readable summary, e.g. `45.0% (54.00MB/120MB)`.
    pub fn details(&self) -> String {
        match (self.downloaded, self.total, self.unit.as_deref()) {
            (Some(downloaded), Some(total), Some(unit)) => format!(
                "{:.1}% ({:.2}{unit}/{total}{unit})",
                self.percent, downloaded
            ),
            _ => format!("{:.1}%", self.percent),
        }
    }
}

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?P<percent>\d+(?:\.\d+)?)%(?:\s+of\s+~?\s*(?P<total>\d+(?:\.\d+)?)\s*(?P<unit>[A-Za-z]+))?",
        )
        .expect("progress pattern compiles")
    })
}

/// Parses a line such as `[download]  45.0% of ~120MB at 1.2MB/s`.
///
/// Returns `None` for lines without a percentage token or with a percentage
/// outside `0..=100`.
pub fn parse(line: &str) -> Option<ProgressRecord> {
    let caps = progress_regex().captures(line)?;
    let percent: f64 = caps.name("percent")?.as_str().parse().ok()?;
    if !(0.0..=100.0).contains(&percent) {
        return None;
    }

    let total = caps
        .name("total")
        .and_then(|m| m.as_str().parse::<f64>().ok());
    let unit = caps.name("unit").map(|m| m.as_str().to_string());
    let downloaded = match (total, unit.as_ref()) {
        (Some(total), Some(_)) => Some(total * percent / 100.0),
        _ => None,
    };

    Some(ProgressRecord {
        percent,
        downloaded,
        total,
        unit,
    })
}
