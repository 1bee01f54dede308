#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

use lead_assign::types::{Lead, Member, Priority, Team};

/// Timestamp helper: day/hour within a fixed month, so window arithmetic
/// in tests is easy to read.
pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

pub fn make_lead(id: u32, probability: f64) -> Lead {
    Lead {
        id,
        name: format!("lead-{}", id),
        partner_id: None,
        email: None,
        country_id: None,
        company_id: None,
        priority: Priority::Medium,
        probability,
        team_id: None,
        member_id: None,
        active: true,
        created: ts(1, 0) + chrono::Duration::minutes(i64::from(id)),
    }
}

pub fn make_member(id: u32, team_id: u32, assignment_max: u32) -> Member {
    Member {
        id,
        team_id,
        name: format!("member-{}", id),
        assignment_max,
        assignment_domain: None,
        lead_month_count: 0,
        active: true,
    }
}

pub fn make_team(id: u32, sequence: u32, assignment_max: u32, members: Vec<Member>) -> Team {
    Team {
        id,
        name: format!("team-{}", id),
        sequence,
        assignment_max,
        assignment_domain: None,
        active: true,
        members,
    }
}
