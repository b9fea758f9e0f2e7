use chrono::{DateTime, Utc};
use civic_types::{Category, Complaint, ComplaintStatus, Priority, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filters for complaint history. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplaintQuery {
    pub status: Option<ComplaintStatus>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<UserId>,
    /// Case-insensitive text matched against id, title, description and location.
    pub search: Option<String>,
    pub overdue: Option<bool>,
    /// Zero means no limit.
    pub limit: usize,
    pub offset: usize,
}

impl ComplaintQuery {
    pub fn matches(&self, complaint: &Complaint, now: DateTime<Utc>) -> bool {
        self.status.map_or(true, |s| complaint.status == s)
            && self.category.map_or(true, |c| complaint.category == c)
            && self.priority.map_or(true, |p| complaint.priority == p)
            && self
                .assigned_to
                .as_ref()
                .map_or(true, |id| complaint.assigned_employee.as_ref() == Some(id))
            && self
                .search
                .as_deref()
                .map_or(true, |needle| complaint.matches_text(needle))
            && self
                .overdue
                .map_or(true, |overdue| complaint.is_overdue(now) == overdue)
    }

    pub(crate) fn window<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        let iter = items.skip(self.offset);
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit).collect()
        }
    }
}

/// Dashboard counters over all complaints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintStatistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub overdue: usize,
    pub resolved: usize,
    /// Mean hours from submission to resolution, over resolved complaints.
    pub mean_resolution_hours: Option<f64>,
}

impl ComplaintStatistics {
    pub fn compute<'a>(
        complaints: impl IntoIterator<Item = &'a Complaint>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self {
            total: 0,
            by_status: ComplaintStatus::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), 0))
                .collect(),
            by_priority: [Priority::Low, Priority::Medium, Priority::High]
                .iter()
                .map(|p| (p.as_str().to_string(), 0))
                .collect(),
            by_category: Category::ALL
                .iter()
                .map(|c| (c.as_str().to_string(), 0))
                .collect(),
            overdue: 0,
            resolved: 0,
            mean_resolution_hours: None,
        };

        let mut resolution_hours = 0.0;
        for complaint in complaints {
            stats.total += 1;
            *stats.by_status.entry(complaint.status.as_str().to_string()).or_default() += 1;
            *stats.by_priority.entry(complaint.priority.as_str().to_string()).or_default() += 1;
            *stats.by_category.entry(complaint.category.as_str().to_string()).or_default() += 1;
            if complaint.is_overdue(now) {
                stats.overdue += 1;
            }
            if let Some(resolved_at) = complaint.resolved_at {
                stats.resolved += 1;
                resolution_hours += (resolved_at - complaint.created_at).num_minutes() as f64 / 60.0;
            }
        }
        if stats.resolved > 0 {
            stats.mean_resolution_hours = Some(resolution_hours / stats.resolved as f64);
        }
        stats
    }
}
