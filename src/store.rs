use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::dedup::MergePlan;
use crate::error::AssignError;
use crate::predicate::{self, Predicate};
use crate::types::{sort_pending, Lead, Team};

/// Persistence collaborator boundary. The allocator reads pending leads and
/// member counters through this trait and commits assignments back through
/// it; it never owns the aggregates itself.
///
/// Implementations must make `commit_assignment` an atomic claim: a lead
/// observed as pending by two concurrent runs is assigned to exactly one.
pub trait LeadStore {
    /// Full lead snapshot, used for dedup planning and status reporting.
    fn snapshot(&self) -> Result<Vec<Lead>, AssignError>;

    /// Pending leads matching the predicate in assignment order (priority
    /// desc, probability desc, created asc, id asc), at most `limit`,
    /// skipping ids in `exclude` (leads stalled earlier in this run).
    fn pending_leads(
        &self,
        pred: Option<&Predicate>,
        limit: usize,
        exclude: &HashSet<u32>,
    ) -> Result<Vec<Lead>, AssignError>;

    /// Fresh assigned-this-period counters for the given members. Re-read
    /// after every committed bundle; never cached across bundles.
    fn member_counts(&self, member_ids: &[u32]) -> Result<HashMap<u32, u32>, AssignError>;

    /// Claim a pending lead for a member. Fails with `Conflict` when the
    /// lead is no longer pending (claimed by a concurrent bundle).
    fn commit_assignment(
        &self,
        lead_id: u32,
        team_id: u32,
        member_id: u32,
    ) -> Result<(), AssignError>;

    /// Apply a dedup merge: patch the survivor, deactivate the duplicates.
    /// Returns how many leads were deactivated.
    fn apply_merge(&self, plan: &MergePlan) -> Result<usize, AssignError>;
}

// --- In-memory store ---

struct MemInner {
    leads: Vec<Lead>,
    /// member id -> leads assigned this period. Seeded from the pool's
    /// `lead_month_count` values and incremented on every commit.
    counts: HashMap<u32, u32>,
}

/// In-memory `LeadStore`. All reads and writes go through one mutex, so a
/// read-then-claim is atomic per lead within the process; cross-process
/// overlap is excluded by the pool lock (see `lock`).
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new(leads: Vec<Lead>, teams: &[Team]) -> Self {
        let counts = teams
            .iter()
            .flat_map(|t| t.members.iter())
            .map(|m| (m.id, m.lead_month_count))
            .collect();
        Self {
            inner: Mutex::new(MemInner { leads, counts }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemInner>, AssignError> {
        self.inner
            .lock()
            .map_err(|_| AssignError::Store("lead store mutex poisoned".to_string()))
    }

    /// Drain the store back into a lead list plus per-member counters,
    /// e.g. for writing an updated pool file.
    pub fn into_state(self) -> Result<(Vec<Lead>, HashMap<u32, u32>), AssignError> {
        let inner = self
            .inner
            .into_inner()
            .map_err(|_| AssignError::Store("lead store mutex poisoned".to_string()))?;
        Ok((inner.leads, inner.counts))
    }
}

impl LeadStore for MemStore {
    fn snapshot(&self) -> Result<Vec<Lead>, AssignError> {
        Ok(self.lock()?.leads.clone())
    }

    fn pending_leads(
        &self,
        pred: Option<&Predicate>,
        limit: usize,
        exclude: &HashSet<u32>,
    ) -> Result<Vec<Lead>, AssignError> {
        let inner = self.lock()?;
        let mut matching: Vec<Lead> = Vec::new();
        for lead in inner.leads.iter().filter(|l| l.is_pending()) {
            if exclude.contains(&lead.id) {
                continue;
            }
            let ok = match pred {
                Some(p) => predicate::matches(p, lead).map_err(AssignError::Config)?,
                None => true,
            };
            if ok {
                matching.push(lead.clone());
            }
        }
        sort_pending(&mut matching);
        matching.truncate(limit);
        Ok(matching)
    }

    fn member_counts(&self, member_ids: &[u32]) -> Result<HashMap<u32, u32>, AssignError> {
        let inner = self.lock()?;
        Ok(member_ids
            .iter()
            .map(|id| (*id, inner.counts.get(id).copied().unwrap_or(0)))
            .collect())
    }

    fn commit_assignment(
        &self,
        lead_id: u32,
        team_id: u32,
        member_id: u32,
    ) -> Result<(), AssignError> {
        let mut inner = self.lock()?;
        let lead = inner
            .leads
            .iter_mut()
            .find(|l| l.id == lead_id)
            .ok_or_else(|| AssignError::Store(format!("lead {} not found", lead_id)))?;
        if !lead.is_pending() {
            return Err(AssignError::Conflict { lead_id });
        }
        lead.team_id = Some(team_id);
        lead.member_id = Some(member_id);
        *inner.counts.entry(member_id).or_insert(0) += 1;
        Ok(())
    }

    fn apply_merge(&self, plan: &MergePlan) -> Result<usize, AssignError> {
        let mut inner = self.lock()?;

        if let Some(survivor) = inner.leads.iter_mut().find(|l| l.id == plan.survivor_id) {
            // Patches only fill fields the survivor is missing
            if survivor.partner_id.is_none() {
                survivor.partner_id = plan.patch.partner_id;
            }
            if survivor.email.is_none() {
                survivor.email = plan.patch.email.clone();
            }
            if survivor.country_id.is_none() {
                survivor.country_id = plan.patch.country_id;
            }
            if survivor.company_id.is_none() {
                survivor.company_id = plan.patch.company_id;
            }
        } else {
            return Err(AssignError::Store(format!(
                "merge survivor {} not found",
                plan.survivor_id
            )));
        }

        let mut deactivated = 0;
        for lead in inner.leads.iter_mut() {
            // Assigned leads are never merged away, even if listed
            if plan.duplicate_ids.contains(&lead.id) && lead.is_pending() {
                lead.active = false;
                deactivated += 1;
            }
        }
        Ok(deactivated)
    }
}
