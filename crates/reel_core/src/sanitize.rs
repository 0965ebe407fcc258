const MAX_TITLE_CHARS: usize = 150;
const UNTITLED: &str = "untitled";

/// File name for a downloaded item: `{sanitized_title}.{extension}`.
pub fn output_file_name(title: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_title(title), extension.trim_start_matches('.'))
}

/// Strips `\ / * ? : " < > |` and control characters so a title can be used
/// as a file name.
pub fn sanitize_title(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| !is_forbidden(*c)).collect();
    // Windows refuses names ending in a dot or space.
    let trimmed = stripped.trim().trim_end_matches(&['.', ' '][..]);

    let mut cleaned: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    cleaned.truncate(cleaned.trim_end().len());
    if cleaned.is_empty() {
        return UNTITLED.to_string();
    }
    if is_reserved_windows_name(&cleaned) {
        cleaned.push('_');
    }
    cleaned
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}' | '\u{7F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
