use ovs_core::errors::{ErrorInfo, OvsError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("slot", "3")
        .with_hint("collect more blocks")
}

#[test]
fn sample_error_surface() {
    let err = OvsError::Sample(sample_info("non-finite-sample", "weight is NaN"));
    assert_eq!(err.info().code, "non-finite-sample");
    assert!(err.info().context.contains_key("slot"));
}

#[test]
fn stat_error_surface() {
    let err = OvsError::Stat(sample_info("insufficient-blocks", "need two blocks"));
    assert_eq!(err.info().code, "insufficient-blocks");
    assert_eq!(err.info().hint.as_deref(), Some("collect more blocks"));
}

#[test]
fn search_error_surface() {
    let err = OvsError::Search(sample_info("search-degenerate-bias", "bias is zero"));
    assert_eq!(err.info().code, "search-degenerate-bias");
}

#[test]
fn persist_error_surface() {
    let err = OvsError::Persist(sample_info("bias-file-read", "permission denied"));
    assert_eq!(err.info().code, "bias-file-read");
}

#[test]
fn display_carries_code_context_and_hint() {
    let err = OvsError::Config(sample_info("config-temperature", "temperature must be positive"));
    let rendered = err.to_string();
    assert!(rendered.contains("config error"), "rendered: {rendered}");
    assert!(rendered.contains("(code: config-temperature)"));
    assert!(rendered.contains("slot=3"));
    assert!(rendered.contains("hint: collect more blocks"));
}

#[test]
fn errors_round_trip_through_json() {
    let err = OvsError::Grid(sample_info("grid-points", "need at least one point"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Grid\""), "json: {json}");
    let restored: OvsError = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, err);
}
