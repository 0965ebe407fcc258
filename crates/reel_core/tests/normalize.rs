use reel_core::{normalize, NormalizationError, Normalizer, NormalizerConfig};

#[test]
fn canonical_path_yields_embedded_identifier() {
    assert_eq!(
        normalize("https://www.douyin.com/video/7301234567890123456?previous_page=app").unwrap(),
        "7301234567890123456"
    );
    assert_eq!(
        normalize("https://www.dailymotion.com/video/x8abc12").unwrap(),
        "x8abc12"
    );
    assert_eq!(normalize("https://dai.ly/x7zz9").unwrap(), "x7zz9");
}

#[test]
fn query_keys_are_used_when_no_path_matches() {
    assert_eq!(
        normalize("https://www.douyin.com/user/MS4wLjAB?modal_id=7309876543210987654").unwrap(),
        "7309876543210987654"
    );
    assert_eq!(
        normalize("www.example.com/play?foo=1&vid=12345").unwrap(),
        "12345"
    );
}

#[test]
fn non_numeric_query_values_are_ignored() {
    // Falls through to pass-through because nothing else matches.
    let raw = "https://example.com/play?vid=abc";
    assert_eq!(normalize(raw).unwrap(), raw);
}

#[test]
fn long_digit_run_is_used_as_fallback() {
    assert_eq!(
        normalize("https://example.com/share/7311111111111111111/").unwrap(),
        "7311111111111111111"
    );
}

#[test]
fn unrecognized_link_passes_through_trimmed() {
    assert_eq!(
        normalize("  https://tv.sohu.com/v/abc.html \n").unwrap(),
        "https://tv.sohu.com/v/abc.html"
    );
}

#[test]
fn normalize_is_deterministic() {
    let inputs = [
        "https://www.douyin.com/video/7301234567890123456",
        "https://example.com/x?modal_id=1234",
        "plain-text-id",
    ];
    for raw in inputs {
        assert_eq!(normalize(raw), normalize(&raw.to_string()));
    }
}

#[test]
fn blank_input_is_rejected() {
    assert_eq!(normalize("   "), Err(NormalizationError::Empty));
    assert_eq!(normalize(""), Err(NormalizationError::Empty));
}

#[test]
fn share_text_yields_the_embedded_identifier() {
    assert_eq!(
        normalize("第1集 https://www.douyin.com/video/7301234567890123456").unwrap(),
        "7301234567890123456"
    );
    assert_eq!(
        normalize("看看这个 https://www.douyin.com/user/x?modal_id=7309876543210987654 复制打开").unwrap(),
        "7309876543210987654"
    );
    assert_eq!(
        normalize("分享 https://tv.sohu.com/v/abc.html 来自搜狐").unwrap(),
        "https://tv.sohu.com/v/abc.html"
    );
    assert_eq!(normalize("two words").unwrap(), "two words");
}

#[test]
fn share_text_link_item_keeps_only_the_link() {
    let item = Normalizer::default()
        .link_item("", "第2集 https://tv.sohu.com/v/abc.html")
        .unwrap();
    assert_eq!(item.url(), "https://tv.sohu.com/v/abc.html");
    assert_eq!(item.title(), "https://tv.sohu.com/v/abc.html");
}

#[test]
fn canonical_template_renders_watch_url() {
    let normalizer = Normalizer::new(NormalizerConfig {
        canonical_template: Some("https://www.douyin.com/video/{id}".to_string()),
        ..NormalizerConfig::default()
    })
    .unwrap();

    let item = normalizer
        .link_item(
            "  ",
            "https://www.douyin.com/user/abc?modal_id=7309876543210987654",
        )
        .unwrap();
    assert_eq!(item.id(), "7309876543210987654");
    assert_eq!(item.url(), "https://www.douyin.com/video/7309876543210987654");
    assert_eq!(item.title(), item.url());

    let passthrough = normalizer.link_item("Title", "https://tv.sohu.com/v/abc.html").unwrap();
    assert_eq!(passthrough.url(), "https://tv.sohu.com/v/abc.html");
    assert_eq!(passthrough.title(), "Title");
}

#[test]
fn invalid_path_pattern_is_reported() {
    let result = Normalizer::new(NormalizerConfig {
        path_patterns: vec!["(unclosed".to_string()],
        ..NormalizerConfig::default()
    });
    assert!(result.is_err());
}
