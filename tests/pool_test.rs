mod common;

use std::collections::HashMap;

use lead_assign::pool::{load, save, PoolFile};
use lead_assign::predicate::parse_predicate;

use common::{make_lead, make_member, make_team};

fn sample_pool() -> PoolFile {
    let mut member = make_member(1, 1, 45);
    member.assignment_domain = Some(parse_predicate("probability >= 10").unwrap());
    let mut team = make_team(1, 1, 75, vec![member]);
    team.assignment_domain = Some(parse_predicate("country_id set").unwrap());

    let mut lead = make_lead(1, 42.5);
    lead.email = Some("carol@example.com".to_string());
    lead.country_id = Some(7);

    PoolFile::new(vec![lead, make_lead(2, 10.0)], vec![team])
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("LEADS.yaml");

    let pool = sample_pool();
    save(&path, &pool).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(loaded, pool);
    // Predicates survive the YAML trip
    assert!(loaded.teams[0].assignment_domain.is_some());
    assert!(loaded.teams[0].members[0].assignment_domain.is_some());
}

#[test]
fn save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deep").join("LEADS.yaml");
    save(&path, &sample_pool()).unwrap();
    assert!(path.exists());
}

#[test]
fn load_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(&dir.path().join("LEADS.yaml")).unwrap_err();
    assert!(err.contains("Failed to read"));
}

#[test]
fn load_rejects_wrong_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("LEADS.yaml");
    std::fs::write(&path, "schema_version: 99\nleads: []\nteams: []\n").unwrap();
    let err = load(&path).unwrap_err();
    assert!(err.contains("Unsupported schema_version 99"));
}

#[test]
fn load_rejects_malformed_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("LEADS.yaml");
    std::fs::write(&path, "schema_version: [not yaml").unwrap();
    let err = load(&path).unwrap_err();
    assert!(err.contains("Failed to parse YAML"));
}

#[test]
fn save_overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("LEADS.yaml");

    let mut pool = sample_pool();
    save(&path, &pool).unwrap();

    pool.leads.pop();
    save(&path, &pool).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded.leads.len(), 1);
}

#[test]
fn apply_counts_updates_member_counters() {
    let mut pool = sample_pool();
    assert_eq!(pool.teams[0].members[0].lead_month_count, 0);

    let counts = HashMap::from([(1u32, 3u32), (999u32, 7u32)]);
    pool.apply_counts(&counts);

    assert_eq!(pool.teams[0].members[0].lead_month_count, 3);
}
