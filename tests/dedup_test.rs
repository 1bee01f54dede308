mod common;

use chrono::Duration;

use lead_assign::dedup::{plan, DedupParams};
use lead_assign::types::Lead;

use common::{make_lead, ts};

fn params(window_days: u32) -> DedupParams {
    DedupParams {
        window_days,
        same_company_only: false,
    }
}

fn with_partner(mut lead: Lead, partner_id: u32) -> Lead {
    lead.partner_id = Some(partner_id);
    lead
}

fn with_email(mut lead: Lead, email: &str) -> Lead {
    lead.email = Some(email.to_string());
    lead
}

// --- Grouping ---

#[test]
fn same_partner_is_duplicate() {
    let leads = vec![
        with_partner(make_lead(1, 50.0), 100),
        with_partner(make_lead(2, 60.0), 100),
    ];
    let plans = plan(&leads, &params(30));
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].survivor_id, 1);
    assert_eq!(plans[0].duplicate_ids, vec![2]);
}

#[test]
fn same_email_is_duplicate_case_normalized() {
    let leads = vec![
        with_email(make_lead(1, 50.0), "Bob@Example.com"),
        with_email(make_lead(2, 60.0), "  bob@example.COM "),
    ];
    let plans = plan(&leads, &params(30));
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].duplicate_ids, vec![2]);
}

#[test]
fn different_keys_are_not_duplicates() {
    let leads = vec![
        with_partner(make_lead(1, 50.0), 100),
        with_partner(make_lead(2, 60.0), 200),
        with_email(make_lead(3, 70.0), "a@example.com"),
        with_email(make_lead(4, 80.0), "b@example.com"),
        make_lead(5, 90.0),
        make_lead(6, 95.0),
    ];
    assert!(plan(&leads, &params(30)).is_empty());
}

#[test]
fn groups_are_transitive_across_keys() {
    // 1 and 2 share a partner; 2 and 3 share an email; all one group
    let mut a = with_partner(make_lead(1, 50.0), 100);
    a.email = None;
    let b = with_email(with_partner(make_lead(2, 60.0), 100), "c@example.com");
    let c = with_email(make_lead(3, 70.0), "c@example.com");

    let plans = plan(&[a, b, c], &params(30));
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].survivor_id, 1);
    assert_eq!(plans[0].duplicate_ids, vec![2, 3]);
}

#[test]
fn assigned_and_inactive_leads_never_join_groups() {
    let pending = with_partner(make_lead(1, 50.0), 100);
    let mut assigned = with_partner(make_lead(2, 60.0), 100);
    assigned.team_id = Some(1);
    assigned.member_id = Some(1);
    let mut inactive = with_partner(make_lead(3, 70.0), 100);
    inactive.active = false;

    assert!(plan(&[pending, assigned, inactive], &params(30)).is_empty());
}

// --- Window ---

#[test]
fn leads_outside_window_are_not_duplicates() {
    let mut old = with_partner(make_lead(1, 50.0), 100);
    old.created = ts(1, 0);
    let mut recent = with_partner(make_lead(2, 60.0), 100);
    recent.created = ts(1, 0) + Duration::days(10);

    assert!(plan(&[old.clone(), recent.clone()], &params(7)).is_empty());
    assert_eq!(plan(&[old, recent], &params(10)).len(), 1);
}

// --- Survivor selection and merge ---

#[test]
fn survivor_is_earliest_created_then_lowest_id() {
    let mut early = with_partner(make_lead(5, 50.0), 100);
    early.created = ts(1, 0);
    let mut late = with_partner(make_lead(2, 60.0), 100);
    late.created = ts(2, 0);

    let plans = plan(&[late, early], &params(30));
    assert_eq!(plans[0].survivor_id, 5);

    // Equal timestamps: lowest id survives
    let a = with_partner(make_lead(9, 50.0), 200);
    let mut b = with_partner(make_lead(4, 60.0), 200);
    b.created = a.created;
    let plans = plan(&[a, b], &params(30));
    assert_eq!(plans[0].survivor_id, 4);
}

#[test]
fn patch_fills_missing_survivor_fields_from_next_oldest() {
    let mut survivor = with_partner(make_lead(1, 50.0), 100);
    survivor.created = ts(1, 0);
    let mut donor = with_partner(make_lead(2, 60.0), 100);
    donor.created = ts(1, 1);
    donor.email = Some("donor@example.com".to_string());
    donor.country_id = Some(7);

    let plans = plan(&[survivor, donor], &params(30));
    let patch = &plans[0].patch;
    // Survivor already has a partner; only missing fields are patched
    assert_eq!(patch.partner_id, None);
    assert_eq!(patch.email.as_deref(), Some("donor@example.com"));
    assert_eq!(patch.country_id, Some(7));
}

// --- Company scoping ---

#[test]
fn same_company_only_splits_by_company() {
    let mut a = with_partner(make_lead(1, 50.0), 100);
    a.company_id = Some(1);
    let mut b = with_partner(make_lead(2, 60.0), 100);
    b.company_id = Some(2);

    let scoped = DedupParams {
        window_days: 30,
        same_company_only: true,
    };
    assert!(plan(&[a.clone(), b.clone()], &scoped).is_empty());
    // Without scoping they are duplicates
    assert_eq!(plan(&[a, b], &params(30)).len(), 1);
}

// --- Idempotence ---

#[test]
fn planning_is_idempotent_after_apply() {
    let leads = vec![
        with_partner(make_lead(1, 50.0), 100),
        with_partner(make_lead(2, 60.0), 100),
        with_partner(make_lead(3, 70.0), 100),
    ];
    let plans = plan(&leads, &params(30));
    assert_eq!(plans.len(), 1);

    // Simulate applying the plan: deactivate duplicates
    let survivors: Vec<Lead> = leads
        .into_iter()
        .map(|mut l| {
            if plans[0].duplicate_ids.contains(&l.id) {
                l.active = false;
            }
            l
        })
        .collect();

    assert!(plan(&survivors, &params(30)).is_empty());
}

#[test]
fn planning_same_snapshot_twice_is_identical() {
    let leads = vec![
        with_partner(make_lead(1, 50.0), 100),
        with_partner(make_lead(2, 60.0), 100),
        with_email(make_lead(3, 70.0), "x@example.com"),
        with_email(make_lead(4, 80.0), "x@example.com"),
    ];
    assert_eq!(plan(&leads, &params(30)), plan(&leads, &params(30)));
}
