//! Integration tests that verify every shipped rule in `data/rules/`
//! loads and validates.

use tripwire_rules::schema::MostCommonSpec;
use tripwire_rules::{AlertRule, Filter, LoadStatus, RuleLoader, Severity};

/// Resolve the rules directory relative to the workspace root.
/// Integration tests run from the crate directory, so we go up two levels.
fn rules_dir() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../data/rules")
}

fn loader() -> RuleLoader {
    let mut loader = RuleLoader::new(rules_dir());
    let results = loader.load_all().expect("scan rules dir");
    for result in &results {
        if let LoadStatus::Failed { error } = &result.status {
            panic!("{} failed to load: {}", result.path.display(), error);
        }
    }
    loader
}

#[test]
fn all_shipped_rules_load() {
    let loader = loader();
    let ids: Vec<String> = loader.rules().iter().map(|r| r.id().to_string()).collect();
    assert_eq!(ids, vec!["amo-failed-logins", "ssl-blacklist-hit"]);
    assert!(loader.rules().iter().all(|r| r.enabled()));
}

#[test]
fn amo_failed_logins() {
    let rule = loader().get("amo-failed-logins").unwrap();
    let def = rule.definition();

    assert_eq!(rule.window(), chrono::Duration::minutes(10));
    assert_eq!(def.search.must.len(), 5);
    assert_eq!(def.search.must[1], Filter::term("signatureid", "authfail"));
    assert_eq!(
        def.search.must[3],
        Filter::match_phrase("msg", "The password was incorrect")
    );

    let aggregate = def.aggregate.as_ref().unwrap();
    assert_eq!(aggregate.field, "details.suser");
    assert_eq!(aggregate.samples_limit, Some(15));
    assert_eq!(aggregate.threshold, 20);

    assert_eq!(def.alert.category, "addons");
    assert_eq!(def.alert.severity, Severity::Notice);
    assert_eq!(
        def.alert.most_common,
        Some(MostCommonSpec {
            field: "_source.details.sourceipaddress".to_string(),
            limit: 5,
        })
    );
}

#[test]
fn ssl_blacklist_hit() {
    let rule = loader().get("ssl-blacklist-hit").unwrap();
    let def = rule.definition();

    assert_eq!(rule.window(), chrono::Duration::minutes(15));
    assert!(def.aggregate.is_none());
    assert_eq!(def.search.must[3], Filter::term("details.sources", "abuse.ch SSLBL"));
    assert_eq!(def.search.must[4], Filter::exists("details.sourceipaddress"));
    assert_eq!(def.alert.tags, vec!["nsm,bro,correlated"]);
    assert_eq!(def.alert.category, "correlatedalerts");
}
