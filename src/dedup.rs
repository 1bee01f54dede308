//! Duplicate-lead detection.
//!
//! Two pending leads are duplicates when they share a non-empty partner
//! reference or a non-empty normalized email, were created within the
//! configured rolling window of each other, and (optionally) belong to the
//! same company. Each duplicate group keeps one survivor; the rest are
//! deactivated after merging missing contact fields onto the survivor.
//!
//! This module only plans merges. The store applies them, so the planner
//! stays a pure function of the lead snapshot and is trivially idempotent.

use std::collections::HashMap;

use chrono::Duration;

use crate::types::Lead;

#[derive(Debug, Clone, Copy)]
pub struct DedupParams {
    /// Rolling window: leads further apart than this are not duplicates.
    pub window_days: u32,
    /// Restrict duplicate matching to leads sharing a company scope.
    pub same_company_only: bool,
}

/// Contact fields copied onto a survivor from its next-oldest duplicate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub partner_id: Option<u32>,
    pub email: Option<String>,
    pub country_id: Option<u32>,
    pub company_id: Option<u32>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        self.partner_id.is_none()
            && self.email.is_none()
            && self.country_id.is_none()
            && self.company_id.is_none()
    }
}

/// One planned merge: keep `survivor_id`, deactivate `duplicate_ids`,
/// apply `patch` to the survivor first.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub survivor_id: u32,
    pub duplicate_ids: Vec<u32>,
    pub patch: FieldPatch,
}

/// Duplicate-matching key: a shared partner or a shared normalized email,
/// optionally scoped by company.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DupKey {
    Partner {
        company: Option<u32>,
        partner_id: u32,
    },
    Email {
        company: Option<u32>,
        email: String,
    },
}

fn keys_for(lead: &Lead, params: &DedupParams) -> Vec<DupKey> {
    let company = if params.same_company_only {
        lead.company_id
    } else {
        None
    };
    let mut keys = Vec::with_capacity(2);
    if let Some(partner_id) = lead.partner_id {
        keys.push(DupKey::Partner {
            company,
            partner_id,
        });
    }
    if let Some(email) = lead.normalized_email() {
        keys.push(DupKey::Email { company, email });
    }
    keys
}

/// Union-find over lead indices, used to close duplicate groups
/// transitively (lead A shares a partner with B, B an email with C).
struct Groups {
    parent: Vec<usize>,
}

impl Groups {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Plan duplicate merges over the given snapshot. Only pending leads are
/// candidates: an already-assigned or inactive lead never joins a group.
///
/// Within a group the survivor is the earliest-created lead, ties broken by
/// lowest id. Output order is deterministic (survivor id ascending).
pub fn plan(leads: &[Lead], params: &DedupParams) -> Vec<MergePlan> {
    let pending: Vec<&Lead> = leads.iter().filter(|l| l.is_pending()).collect();

    let mut groups = Groups::new(pending.len());
    let mut by_key: HashMap<DupKey, usize> = HashMap::new();
    for (idx, lead) in pending.iter().enumerate() {
        for key in keys_for(lead, params) {
            match by_key.get(&key) {
                Some(&first) => groups.union(first, idx),
                None => {
                    by_key.insert(key, idx);
                }
            }
        }
    }

    let mut clusters: HashMap<usize, Vec<&Lead>> = HashMap::new();
    for (idx, lead) in pending.iter().enumerate() {
        clusters.entry(groups.find(idx)).or_default().push(lead);
    }

    let window = Duration::days(i64::from(params.window_days));
    let mut plans: Vec<MergePlan> = Vec::new();

    for mut members in clusters.into_values() {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        // Enforce the rolling window: a lead created more than `window`
        // after the subgroup's oldest member starts a fresh subgroup.
        let mut subgroup: Vec<&Lead> = Vec::new();
        for lead in members {
            match subgroup.first() {
                Some(oldest) if lead.created - oldest.created <= window => {
                    subgroup.push(lead);
                }
                Some(_) => {
                    if let Some(plan) = plan_for_subgroup(&subgroup) {
                        plans.push(plan);
                    }
                    subgroup = vec![lead];
                }
                None => subgroup.push(lead),
            }
        }
        if let Some(plan) = plan_for_subgroup(&subgroup) {
            plans.push(plan);
        }
    }

    plans.sort_by_key(|p| p.survivor_id);
    plans
}

fn plan_for_subgroup(subgroup: &[&Lead]) -> Option<MergePlan> {
    let (survivor, duplicates) = subgroup.split_first()?;
    if duplicates.is_empty() {
        return None;
    }

    // Fields absent on the survivor come from the next-oldest duplicate
    let donor = duplicates[0];
    let patch = FieldPatch {
        partner_id: if survivor.partner_id.is_none() {
            donor.partner_id
        } else {
            None
        },
        email: if survivor.email.is_none() {
            donor.email.clone()
        } else {
            None
        },
        country_id: if survivor.country_id.is_none() {
            donor.country_id
        } else {
            None
        },
        company_id: if survivor.company_id.is_none() {
            donor.company_id
        } else {
            None
        },
    };

    Some(MergePlan {
        survivor_id: survivor.id,
        duplicate_ids: duplicates.iter().map(|l| l.id).collect(),
        patch,
    })
}
