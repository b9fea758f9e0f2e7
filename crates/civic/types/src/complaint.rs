use crate::{Actor, ComplaintId, ParseEnumError, Role, UserId};
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde::{Deserialize, Serialize};

// ── Status ───────────────────────────────────────────────────────────

/// Lifecycle status of a complaint. Declaration order is lifecycle order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplaintStatus {
    Pending,
    Assigned,
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        ComplaintStatus::Pending,
        ComplaintStatus::Assigned,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::Assigned => "assigned",
            ComplaintStatus::InProgress => "in-progress",
            ComplaintStatus::Resolved => "resolved",
        }
    }

    /// The unique legal next status, if any.
    pub fn successor(&self) -> Option<ComplaintStatus> {
        match self {
            ComplaintStatus::Pending => Some(ComplaintStatus::Assigned),
            ComplaintStatus::Assigned => Some(ComplaintStatus::InProgress),
            ComplaintStatus::InProgress => Some(ComplaintStatus::Resolved),
            ComplaintStatus::Resolved => None,
        }
    }

    /// The status a complaint must hold to move into `self`.
    pub fn predecessor(&self) -> Option<ComplaintStatus> {
        match self {
            ComplaintStatus::Pending => None,
            ComplaintStatus::Assigned => Some(ComplaintStatus::Pending),
            ComplaintStatus::InProgress => Some(ComplaintStatus::Assigned),
            ComplaintStatus::Resolved => Some(ComplaintStatus::InProgress),
        }
    }

    /// Open complaints count toward an employee's workload.
    pub fn is_open(&self) -> bool {
        matches!(self, ComplaintStatus::Assigned | ComplaintStatus::InProgress)
    }
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ComplaintStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ComplaintStatus::Pending),
            "assigned" => Ok(ComplaintStatus::Assigned),
            "in-progress" | "in_progress" => Ok(ComplaintStatus::InProgress),
            "resolved" => Ok(ComplaintStatus::Resolved),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

// ── Priority & category ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(ParseEnumError::new("priority", other)),
        }
    }
}

/// Fixed complaint categories offered to citizens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    RoadSafety,
    StreetLight,
    Garbage,
    Traffic,
    Vendors,
    MissingPerson,
    PublicSafety,
    Infrastructure,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::RoadSafety,
        Category::StreetLight,
        Category::Garbage,
        Category::Traffic,
        Category::Vendors,
        Category::MissingPerson,
        Category::PublicSafety,
        Category::Infrastructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::RoadSafety => "road-safety",
            Category::StreetLight => "street-light",
            Category::Garbage => "garbage",
            Category::Traffic => "traffic",
            Category::Vendors => "vendors",
            Category::MissingPerson => "missing-person",
            Category::PublicSafety => "public-safety",
            Category::Infrastructure => "infrastructure",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::RoadSafety => "Road Safety & Potholes",
            Category::StreetLight => "Street Light",
            Category::Garbage => "Garbage Waste",
            Category::Traffic => "Traffic Problems",
            Category::Vendors => "Street Vendor Issues",
            Category::MissingPerson => "Missing Person",
            Category::PublicSafety => "Public Safety",
            Category::Infrastructure => "Infrastructure Issue",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ParseEnumError::new("category", normalized))
    }
}

// ── Complaint parts ──────────────────────────────────────────────────

/// Where the issue is: the street plus a landmark or exact spot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub street: String,
    pub detail: String,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.street, self.detail)
    }
}

/// Reference to an uploaded image. Binary content lives in file storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub reference: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl ImageAttachment {
    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .strip_prefix("image/")
            .is_some_and(|subtype| !subtype.is_empty())
    }
}

/// One append-only timeline entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub date: DateTime<Utc>,
    pub description: String,
    pub status: ComplaintStatus,
    pub actor: UserId,
}

// ── Complaint ────────────────────────────────────────────────────────

/// A citizen-submitted issue report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub title: String,
    pub category: Category,
    pub description: String,
    pub location: Location,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub created_by: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_employee: Option<UserId>,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_proof: Option<String>,
    pub timeline: Vec<TimelineEvent>,
    /// Incremented by the store on every committed mutation.
    pub version: u64,
}

impl Complaint {
    pub fn last_event(&self) -> Option<&TimelineEvent> {
        self.timeline.last()
    }

    /// Checks the timeline invariants: it starts at pending, every entry
    /// advances exactly one step, and the last entry matches `status`.
    pub fn timeline_is_consistent(&self) -> bool {
        let mut expected = Some(ComplaintStatus::Pending);
        for event in &self.timeline {
            if Some(event.status) != expected {
                return false;
            }
            expected = event.status.successor();
        }
        self.last_event()
            .is_some_and(|event| event.status == self.status)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != ComplaintStatus::Resolved && now > self.due_at
    }

    /// Whole days until `due_at`; negative once overdue.
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        (self.due_at - now).num_days()
    }

    /// Creator, assignee and government staff may read a complaint.
    pub fn visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Government => true,
            Role::Citizen => self.created_by == actor.id,
            Role::Employee => self.assigned_employee.as_ref() == Some(&actor.id),
        }
    }

    /// Case-insensitive match on id, title, description and location.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.id.0.to_lowercase().contains(&needle)
            || self.id.reference().to_lowercase().contains(&needle)
            || self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.location.to_string().to_lowercase().contains(&needle)
    }
}

/// Adds `days` weekdays to `start`, skipping Saturdays and Sundays.
pub fn add_working_days(start: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let mut current = start;
    let mut remaining = days;
    while remaining > 0 {
        current += Duration::days(1);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    current
}
