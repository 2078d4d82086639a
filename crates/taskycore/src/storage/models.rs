//! Persistent entities and their enums.
//!
//! Enum string forms (`SCREAMING_SNAKE_CASE`) are shared by serde bodies,
//! strum parsing of callback parameters and display labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{AsRefStr, Display, EnumIter, EnumMessage, EnumString};

use crate::storage::repository::Entity;

macro_rules! entity {
    ($ty:ty, $collection:literal) => {
        impl Entity for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }
        }
    };
}

/// Human-readable label carried in each variant's strum message.
macro_rules! labelled {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $ty {
                pub fn label(&self) -> &'static str {
                    self.get_message().unwrap_or_default()
                }
            }
        )+
    };
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    #[strum(message = "Planning")]
    Planning,
    #[strum(message = "Active")]
    Active,
    #[strum(message = "On Hold")]
    OnHold,
    #[strum(message = "Completed")]
    Completed,
    #[strum(message = "Archived")]
    Archived,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectPriority {
    #[strum(message = "Low")]
    Low,
    #[default]
    #[strum(message = "Medium")]
    Medium,
    #[strum(message = "High")]
    High,
    #[strum(message = "Critical")]
    Critical,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    #[strum(message = "To Do")]
    Todo,
    #[strum(message = "In Progress")]
    InProgress,
    #[strum(message = "In Review")]
    Review,
    #[strum(message = "Blocked")]
    Blocked,
    #[strum(message = "Done")]
    Done,
    #[strum(message = "Cancelled")]
    Cancelled,
}

impl TaskStatus {
    /// Done and cancelled tasks are never overdue
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    #[strum(message = "Low")]
    Low,
    #[default]
    #[strum(message = "Medium")]
    Medium,
    #[strum(message = "High")]
    High,
    #[strum(message = "Urgent")]
    Urgent,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
// callback tokens carry these in lower case
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum VoteValue {
    #[default]
    #[strum(message = "Available")]
    Available,
    #[strum(message = "Not Available")]
    NotAvailable,
    #[strum(message = "Maybe")]
    Maybe,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
// callback tokens carry these in lower case
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ApprovalType {
    #[default]
    #[strum(message = "Task Completion")]
    Task,
    #[strum(message = "Project Milestone")]
    Project,
    #[strum(message = "Report")]
    Report,
    #[strum(message = "Other")]
    Other,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    #[default]
    #[strum(message = "Pending")]
    Pending,
    #[strum(message = "Approved")]
    Approved,
    #[strum(message = "Rejected")]
    Rejected,
    #[strum(message = "Cancelled")]
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    #[strum(message = "Task Assigned")]
    TaskAssigned,
    #[strum(message = "Task Overdue")]
    TaskOverdue,
    #[strum(message = "Deadline Approaching")]
    DeadlineApproaching,
    #[strum(message = "Meeting Reminder")]
    MeetingReminder,
    #[strum(message = "Approval Required")]
    ApprovalRequired,
    #[strum(message = "Approval Response")]
    ApprovalResponse,
    #[strum(message = "Project Update")]
    ProjectUpdate,
    #[strum(message = "Mention")]
    Mention,
    #[default]
    #[strum(message = "System")]
    System,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, EnumMessage,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderType {
    #[strum(message = "Task Deadline")]
    TaskDeadline,
    #[strum(message = "Meeting")]
    Meeting,
    #[strum(message = "Daily Report")]
    DailyReport,
    #[strum(message = "Weekly Report")]
    WeeklyReport,
    #[default]
    #[strum(message = "Custom")]
    Custom,
}

labelled!(
    ProjectStatus,
    ProjectPriority,
    TaskStatus,
    TaskPriority,
    VoteValue,
    ApprovalType,
    ApprovalStatus,
    AlertType,
    ReminderType,
);

/// Notification categories a user can switch on or off from /settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    Deadline,
    Meeting,
    Approval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: String,
    pub timezone: String,
    pub notify_task_assigned: bool,
    pub notify_deadline_approaching: bool,
    pub notify_meeting_scheduled: bool,
    pub notify_approval_required: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(telegram_id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            telegram_id,
            username: None,
            first_name: first_name.into(),
            last_name: None,
            language_code: "en".to_string(),
            timezone: "UTC".to_string(),
            notify_task_assigned: true,
            notify_deadline_approaching: true,
            notify_meeting_scheduled: true,
            notify_approval_required: true,
            created_at: Utc::now(),
        }
    }

    /// Full name when known, else @username, else the Telegram id
    pub fn display_name(&self) -> String {
        let full = match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        };
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        match &self.username {
            Some(username) => format!("@{}", username),
            None => format!("User {}", self.telegram_id),
        }
    }

    pub fn notifications_enabled(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::TaskAssigned => self.notify_task_assigned,
            NotificationKind::Deadline => self.notify_deadline_approaching,
            NotificationKind::Meeting => self.notify_meeting_scheduled,
            NotificationKind::Approval => self.notify_approval_required,
        }
    }

    pub fn toggle_notifications(&mut self, kind: NotificationKind) {
        let flag = match kind {
            NotificationKind::TaskAssigned => &mut self.notify_task_assigned,
            NotificationKind::Deadline => &mut self.notify_deadline_approaching,
            NotificationKind::Meeting => &mut self.notify_meeting_scheduled,
            NotificationKind::Approval => &mut self.notify_approval_required,
        };
        *flag = !*flag;
    }
}

entity!(User, "users");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub owner_id: i64,
    pub member_ids: BTreeSet<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// New project in PLANNING, with the owner as its first member
    pub fn new(name: impl Into<String>, description: impl Into<String>, priority: ProjectPriority, owner_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            description: description.into(),
            status: ProjectStatus::Planning,
            priority,
            owner_id,
            member_ids: BTreeSet::from([owner_id]),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.owner_id == user_id || self.member_ids.contains(&user_id)
    }
}

entity!(Project, "projects");

/// Completed share of `tasks` as an integer percent, 0 when there are none.
pub fn progress_percent(tasks: &[Task]) -> u32 {
    if tasks.is_empty() {
        return 0;
    }
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    u32::try_from(done * 100 / tasks.len()).unwrap_or(100)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<i64>,
    pub created_by_id: i64,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    /// Tasks this one waits on; the relation is not mirrored
    pub depends_on: BTreeSet<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(project_id: i64, title: impl Into<String>, created_by_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            project_id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            assignee_id: None,
            created_by_id,
            deadline: None,
            estimated_hours: None,
            actual_hours: None,
            depends_on: BTreeSet::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) => deadline < now && !self.status.is_closed(),
            None => false,
        }
    }

    /// Whole days from `now` until the deadline; negative once it has passed
    pub fn days_until_deadline(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline.map(|deadline| (deadline - now).num_days())
    }

    /// Moves the task to `status`, stamping start and completion times
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        match status {
            TaskStatus::InProgress if self.started_at.is_none() => self.started_at = Some(now),
            TaskStatus::Done => self.completed_at = Some(now),
            _ => {}
        }
        self.status = status;
        self.updated_at = now;
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.assignee_id == Some(user_id) || self.created_by_id == user_id
    }
}

entity!(Task, "tasks");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub project_id: Option<i64>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub organizer_id: i64,
    pub participant_ids: BTreeSet<i64>,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Meeting {
    pub const DEFAULT_DURATION_MINUTES: u32 = 60;

    pub fn new(title: impl Into<String>, scheduled_at: DateTime<Utc>, organizer_id: i64) -> Self {
        Self {
            id: 0,
            title: title.into(),
            description: String::new(),
            project_id: None,
            scheduled_at,
            duration_minutes: Self::DEFAULT_DURATION_MINUTES,
            organizer_id,
            participant_ids: BTreeSet::from([organizer_id]),
            location: None,
            meeting_link: None,
            created_at: Utc::now(),
        }
    }
}

entity!(Meeting, "meetings");

/// One user's answer for one time slot of a meeting.
/// (meeting_id, user_id, time_slot) is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingVote {
    #[serde(default)]
    pub id: i64,
    pub meeting_id: i64,
    pub user_id: i64,
    pub time_slot: DateTime<Utc>,
    pub vote: VoteValue,
    pub created_at: DateTime<Utc>,
}

entity!(MeetingVote, "meeting_votes");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    #[serde(default)]
    pub id: i64,
    pub approval_type: ApprovalType,
    pub status: ApprovalStatus,
    pub requester_id: i64,
    pub approver_id: i64,
    pub task_id: Option<i64>,
    pub project_id: Option<i64>,
    pub reason: String,
    pub response_message: String,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Approval {
    pub fn respond(&mut self, status: ApprovalStatus, now: DateTime<Utc>) {
        self.status = status;
        self.responded_at = Some(now);
    }
}

entity!(Approval, "approvals");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: i64,
    pub user_id: i64,
    pub alert_type: AlertType,
    pub title: String,
    pub message: String,
    pub task_id: Option<i64>,
    pub project_id: Option<i64>,
    pub meeting_id: Option<i64>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(user_id: i64, alert_type: AlertType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            user_id,
            alert_type,
            title: title.into(),
            message: message.into(),
            task_id: None,
            project_id: None,
            meeting_id: None,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_read(&mut self, now: DateTime<Utc>) {
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(now);
        }
    }
}

entity!(Alert, "alerts");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(default)]
    pub id: i64,
    pub user_id: i64,
    pub reminder_type: ReminderType,
    pub message: String,
    pub remind_at: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

entity!(Reminder, "reminders");
