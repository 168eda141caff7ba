use ironpane::dedup::{DedupScope, Deduplicator};

#[test]
fn first_seen_wins() {
    let mut seen = Deduplicator::new();
    assert!(seen.admit("a"));
    assert!(!seen.admit("a"));
    assert!(seen.admit("b"));
    assert!(seen.contains(&"a"));
    assert_eq!(seen.len(), 2);

    seen.clear();
    assert!(seen.is_empty());
    assert!(seen.admit("a"));
}

#[test]
fn scope_parses_case_insensitively() {
    assert_eq!("GLOBAL".parse::<DedupScope>(), Ok(DedupScope::Global));
    assert_eq!("window".parse::<DedupScope>(), Ok(DedupScope::Window));
    assert_eq!("Pane".parse::<DedupScope>(), Ok(DedupScope::Pane));
    assert!("session".parse::<DedupScope>().is_err());
}

#[test]
fn scope_defaults_to_global_and_serializes_lowercase() -> anyhow::Result<()> {
    assert_eq!(DedupScope::default(), DedupScope::Global);
    assert_eq!(DedupScope::Pane.to_string(), "pane");
    assert_eq!(serde_json::to_string(&DedupScope::Global)?, "\"global\"");
    Ok(())
}
