use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("kvwatch".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    WATCH_EMISSIONS.with_label_values(&["tree"]).inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"kvwatch_watch_emissions"),
        "Missing kvwatch_watch_emissions"
    );
}

#[test]
fn test_counter_increment() {
    WATCH_RETRYABLE_FAILURES.with_label_values(&["metrics-test"]).inc();
    WATCH_RETRYABLE_FAILURES.with_label_values(&["metrics-test"]).inc();

    let value = WATCH_RETRYABLE_FAILURES.with_label_values(&["metrics-test"]).get();
    assert_eq!(value, 2, "Counter should increment correctly");
}

#[test]
fn test_double_registration_is_ignored() {
    let registry = create_test_registry();
    register_custom_metrics(&registry);

    WATCH_FETCHES.with_label_values(&["key"]).inc();
    let text = gather_text(&registry);
    assert!(text.contains("kvwatch_watch_fetches"));
}
