use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::predicate::Predicate;

// --- Enums ---

/// Lead priority, ordered low to urgent. Ordering drives the pending-pool
/// sort: higher priority leads are assigned first.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

pub fn parse_priority(s: &str) -> Result<Priority, String> {
    match s.to_lowercase().as_str() {
        "low" | "0" => Ok(Priority::Low),
        "medium" | "1" => Ok(Priority::Medium),
        "high" | "2" => Ok(Priority::High),
        "urgent" | "3" => Ok(Priority::Urgent),
        _ => Err(format!(
            "Invalid priority '{}': expected low, medium, high, or urgent",
            s
        )),
    }
}

// --- Structs ---

/// A sales lead. Created externally; mutated only by the allocator (setting
/// team/member) or the deduplicator (deactivation and field merge).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Lead {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<u32>,
    #[serde(default)]
    pub priority: Priority,
    /// Win probability score, computed externally. Read-only here.
    #[serde(default)]
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<u32>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created: DateTime<Utc>,
}

impl Lead {
    /// A lead is pending while it is active and has no team/member set.
    /// Once assigned it leaves the pending pool for subsequent runs.
    pub fn is_pending(&self) -> bool {
        self.active && self.team_id.is_none() && self.member_id.is_none()
    }

    /// Email normalized for duplicate matching: trimmed, lowercased.
    /// Empty after normalization counts as absent.
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// A sales team. `sequence` fixes the order teams are processed in a run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Team {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub sequence: u32,
    /// Maximum leads assignable to the whole team per period.
    pub assignment_max: u32,
    /// Team-level eligibility filter. Absent means every lead matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_domain: Option<Predicate>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Team {
    /// Active members in deterministic rotation order (membership id asc).
    pub fn active_members(&self) -> Vec<&Member> {
        let mut members: Vec<&Member> = self.members.iter().filter(|m| m.active).collect();
        members.sort_by_key(|m| m.id);
        members
    }
}

/// A team membership. A person may hold memberships across several teams;
/// each membership record belongs to exactly one team.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Member {
    pub id: u32,
    pub team_id: u32,
    pub name: String,
    /// Maximum leads assignable to this member per period.
    pub assignment_max: u32,
    /// Member-level filter, AND-ed with the team's. Absent matches all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_domain: Option<Predicate>,
    /// Leads assigned during the current period. Owned by the persistence
    /// collaborator; the allocator only reads it and records increments.
    #[serde(default)]
    pub lead_month_count: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Sort leads into assignment order: priority desc, probability desc,
/// created asc, id asc. This is the tie-break contract for the pending
/// pool and must stay deterministic.
pub fn sort_pending(leads: &mut [Lead]) {
    leads.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| {
                b.probability
                    .partial_cmp(&a.probability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.created.cmp(&b.created))
            .then_with(|| a.id.cmp(&b.id))
    });
}
