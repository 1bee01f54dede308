//! Pro-rated capacity arithmetic.
//!
//! A member's nominal capacity for a full period is `assignment_max`. A run
//! covering `work_days` of a `period_days` period may assign at most
//! `ceil(assignment_max * work_days / period_days)` leads, minus what the
//! member already received this period. Pure functions over a snapshot; the
//! allocator re-reads counts after every committed bundle.

use crate::types::{Member, Team};

/// Pro-rated quota for a run covering `work_days` out of `period_days`.
///
/// `work_days = 0` yields 0; `work_days >= period_days` yields the full max.
/// Rounds up, so a 45-lead monthly max over 2 of 30 days still allows 3.
pub fn prorated_quota(assignment_max: u32, work_days: u32, period_days: u32) -> u32 {
    if period_days == 0 || work_days == 0 {
        return 0;
    }
    if work_days >= period_days {
        return assignment_max;
    }
    let scaled = u64::from(assignment_max) * u64::from(work_days);
    let quota = scaled.div_ceil(u64::from(period_days));
    u32::try_from(quota).unwrap_or(u32::MAX).min(assignment_max)
}

/// Remaining capacity for a member in the current run, floored at zero.
pub fn remaining(member: &Member, work_days: u32, period_days: u32) -> u32 {
    prorated_quota(member.assignment_max, work_days, period_days)
        .saturating_sub(member.lead_month_count)
}

/// Remaining team-level capacity: the team's own `assignment_max` pro-rated
/// the same way, minus leads already assigned to its members this period.
pub fn team_remaining(team: &Team, work_days: u32, period_days: u32) -> u32 {
    let assigned: u32 = team
        .members
        .iter()
        .filter(|m| m.active)
        .map(|m| m.lead_month_count)
        .sum();
    prorated_quota(team.assignment_max, work_days, period_days).saturating_sub(assigned)
}
