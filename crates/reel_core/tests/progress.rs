use reel_core::progress::parse;

#[test]
fn parses_percent_and_total() {
    let record = parse("[download]  45.0% of ~120MB at 1.20MB/s ETA 00:55").unwrap();
    assert_eq!(record.percent, 45.0);
    assert_eq!(record.total, Some(120.0));
    assert_eq!(record.unit.as_deref(), Some("MB"));
    assert_eq!(record.downloaded, Some(54.0));
}

#[test]
fn parses_bare_fragment() {
    let record = parse("45.0% of ~120MB").unwrap();
    assert_eq!(record.percent, 45.0);
    assert_eq!(record.total, Some(120.0));
    assert_eq!(record.unit.as_deref(), Some("MB"));
    assert_eq!(record.downloaded, Some(54.0));
    assert_eq!(record.details(), "45.0% (54.00MB/120MB)");
}

#[test]
fn parses_spaced_total_with_binary_unit() {
    let record = parse("[download]  12.5% of   80.00MiB at  2.00MiB/s").unwrap();
    assert_eq!(record.percent, 12.5);
    assert_eq!(record.total, Some(80.0));
    assert_eq!(record.unit.as_deref(), Some("MiB"));
    assert_eq!(record.downloaded, Some(10.0));
}

#[test]
fn percent_without_total_has_no_sizes() {
    let record = parse("[download] 100%").unwrap();
    assert_eq!(record.percent, 100.0);
    assert_eq!(record.total, None);
    assert_eq!(record.downloaded, None);
    assert_eq!(record.details(), "100.0%");
}

#[test]
fn lines_without_percentage_do_not_match() {
    assert_eq!(parse("[youtube] Extracting URL: https://example.com"), None);
    assert_eq!(parse(""), None);
}

#[test]
fn out_of_range_percentage_does_not_match() {
    assert_eq!(parse("progress 250.0% of 10MB"), None);
}
