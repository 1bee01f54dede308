use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::capacity;
use crate::dedup::{self, DedupParams};
use crate::error::AssignError;
use crate::log;
use crate::predicate;
use crate::store::LeadStore;
use crate::types::{Member, Team};
use crate::{log_debug, log_info, log_warn};

// --- Public types ---

/// Parameters for one assignment run.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Restrict the run to these team ids; `None` runs every active team.
    pub team_ids: Option<Vec<u32>>,
    /// Days of the period this run covers; caps are pro-rated accordingly.
    pub work_days: u32,
    /// Length of the capacity period (typically 30).
    pub period_days: u32,
    /// Max leads fetched and assigned per internal batch.
    pub bundle_size: u32,
    pub dedup: DedupParams,
}

/// Per-team configuration failure, reported without aborting other teams.
#[derive(Debug, Clone, Serialize)]
pub struct TeamError {
    pub team_id: u32,
    pub team_name: String,
    pub detail: String,
}

/// Result of an assignment run, returned to the caller for summary display.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub assigned_count: u32,
    /// member id -> leads assigned by this run.
    pub per_member: BTreeMap<u32, u32>,
    /// team id -> leads assigned by this run.
    pub per_team: BTreeMap<u32, u32>,
    pub duplicates_merged: u32,
    /// Pending leads left over after the run (normal terminal condition,
    /// not an error).
    pub unassigned_remaining: u32,
    pub errors: Vec<TeamError>,
}

// --- Run entry point ---

/// Run lead assignment over the given teams.
///
/// Deduplicates the pending pool first (so duplicates never consume two
/// members' capacity), then processes teams in sequence order. Each team's
/// progress commits independently; a malformed predicate aborts only that
/// team. Store or IO failures abort the whole run.
pub fn run(store: &dyn LeadStore, teams: &[Team], params: &RunParams) -> Result<RunReport, AssignError> {
    if params.bundle_size == 0 {
        return Err(AssignError::Config(
            "bundle_size must be >= 1".to_string(),
        ));
    }
    if params.period_days == 0 {
        return Err(AssignError::Config(
            "period_days must be >= 1".to_string(),
        ));
    }

    let mut report = RunReport::default();

    // Dedup before eligibility filtering and capacity consumption
    let snapshot = store.snapshot()?;
    let plans = dedup::plan(&snapshot, &params.dedup);
    for plan in &plans {
        let deactivated = store.apply_merge(plan)?;
        report.duplicates_merged += deactivated as u32;
        log_debug!(
            "Dedup: lead {} survives, {} duplicate(s) deactivated",
            plan.survivor_id,
            deactivated
        );
    }
    if !plans.is_empty() {
        log_info!("Dedup merged {} duplicate lead(s)", report.duplicates_merged);
    }

    let mut selected: Vec<&Team> = teams
        .iter()
        .filter(|t| t.active)
        .filter(|t| match &params.team_ids {
            Some(ids) => ids.contains(&t.id),
            None => true,
        })
        .collect();
    selected.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));

    for team in selected {
        match assign_team(store, team, params) {
            Ok(outcome) => {
                for (member_id, count) in outcome.per_member {
                    *report.per_member.entry(member_id).or_insert(0) += count;
                    *report.per_team.entry(team.id).or_insert(0) += count;
                    report.assigned_count += count;
                }
            }
            Err(e) if e.is_config() => {
                log_warn!("Team {} skipped: {}", team.name, e);
                report.errors.push(TeamError {
                    team_id: team.id,
                    team_name: team.name.clone(),
                    detail: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    report.unassigned_remaining = store
        .snapshot()?
        .iter()
        .filter(|l| l.is_pending())
        .count() as u32;

    log_info!(
        "Assigned {} lead(s) across {} member(s), {} pending remain",
        report.assigned_count,
        report.per_member.len(),
        report.unassigned_remaining
    );

    Ok(report)
}

// --- Per-team bundle loop ---

struct TeamOutcome {
    per_member: BTreeMap<u32, u32>,
}

fn validate_team_predicates(team: &Team, members: &[&Member]) -> Result<(), AssignError> {
    if let Some(pred) = &team.assignment_domain {
        predicate::validate(pred).map_err(|detail| AssignError::MalformedPredicate {
            team: team.id,
            detail,
        })?;
    }
    for member in members {
        if let Some(pred) = &member.assignment_domain {
            predicate::validate(pred).map_err(|detail| AssignError::MalformedPredicate {
                team: team.id,
                detail: format!("member {}: {}", member.name, detail),
            })?;
        }
    }
    Ok(())
}

/// Assign pending leads to one team's members in bundles.
///
/// Round-robin over members in id order: each assigned lead advances the
/// rotation cursor, so consecutive leads spread across members instead of
/// filling one member first. Capacity and team quota are re-read from the
/// store after every bundle.
fn assign_team(
    store: &dyn LeadStore,
    team: &Team,
    params: &RunParams,
) -> Result<TeamOutcome, AssignError> {
    let _scope = log::scope(format!("team {}", team.name));
    let members = team.active_members();
    let mut outcome = TeamOutcome {
        per_member: BTreeMap::new(),
    };

    if members.is_empty() {
        log_debug!("no active members");
        return Ok(outcome);
    }

    validate_team_predicates(team, &members)?;

    let member_ids: Vec<u32> = members.iter().map(|m| m.id).collect();
    let team_quota = capacity::prorated_quota(team.assignment_max, params.work_days, params.period_days);

    // Leads no member of this team can take; excluded from later fetches so
    // the bundle loop cannot spin on them.
    let mut stalled: HashSet<u32> = HashSet::new();
    let mut cursor = 0usize;

    loop {
        // Fresh counters each bundle: commits (ours or a concurrent run's)
        // change lead_month_count
        let counts = store.member_counts(&member_ids)?;
        let mut remaining: HashMap<u32, u32> = members
            .iter()
            .map(|m| {
                let assigned = counts.get(&m.id).copied().unwrap_or(0);
                let quota =
                    capacity::prorated_quota(m.assignment_max, params.work_days, params.period_days);
                (m.id, quota.saturating_sub(assigned))
            })
            .collect();

        let mut team_remaining = team_quota.saturating_sub(counts.values().sum::<u32>());
        if team_remaining == 0 {
            log_debug!("quota exhausted");
            break;
        }
        if remaining.values().all(|r| *r == 0) {
            log_debug!("no member has remaining capacity");
            break;
        }

        let bundle = store.pending_leads(
            team.assignment_domain.as_ref(),
            params.bundle_size as usize,
            &stalled,
        )?;
        if bundle.is_empty() {
            break;
        }

        let mut assigned_in_bundle = 0u32;
        for lead in &bundle {
            if team_remaining == 0 {
                break;
            }

            // Next member in rotation with matching predicate and capacity
            let mut chosen: Option<usize> = None;
            for offset in 0..members.len() {
                let idx = (cursor + offset) % members.len();
                let member = members[idx];
                if remaining.get(&member.id).copied().unwrap_or(0) == 0 {
                    continue;
                }
                let ok = predicate::eligible(lead, None, member.assignment_domain.as_ref())
                    .map_err(|detail| AssignError::MalformedPredicate {
                        team: team.id,
                        detail,
                    })?;
                if ok {
                    chosen = Some(idx);
                    break;
                }
            }

            let Some(idx) = chosen else {
                // No member can take this lead now; retried next run
                stalled.insert(lead.id);
                continue;
            };

            let member = members[idx];
            match store.commit_assignment(lead.id, team.id, member.id) {
                Ok(()) => {
                    *outcome.per_member.entry(member.id).or_insert(0) += 1;
                    if let Some(r) = remaining.get_mut(&member.id) {
                        *r -= 1;
                    }
                    team_remaining -= 1;
                    assigned_in_bundle += 1;
                    cursor = (idx + 1) % members.len();
                }
                Err(e) if e.is_retryable() => {
                    // Lost the claim race; the lead is no longer pending and
                    // drops out of the next fetch on its own
                    log_debug!("lead {} claimed concurrently, skipping", lead.id);
                }
                Err(e) => return Err(e),
            }
        }

        log_debug!("bundle of {} lead(s), {} assigned", bundle.len(), assigned_in_bundle);

        // A short bundle means the pool (minus stalled leads) is drained;
        // with nothing assigned either, another fetch cannot make progress
        if assigned_in_bundle == 0 && (bundle.len() as u32) < params.bundle_size {
            break;
        }
    }

    Ok(outcome)
}
