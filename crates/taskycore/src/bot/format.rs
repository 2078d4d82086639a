//! Message formatting: glyph tables and entity cards.
//!
//! Everything here is pure. Replies are sent as HTML, so user-supplied text
//! always goes through [`escape_html`].

use chrono::{DateTime, Utc};

use crate::core::config::format::{ELLIPSIS, PROJECT_DESCRIPTION_LIMIT, TASK_DESCRIPTION_LIMIT};
use crate::storage::models::{
    AlertType, Approval, ApprovalStatus, Meeting, Project, ProjectPriority, ProjectStatus, ReminderType, Task,
    TaskPriority, TaskStatus, User, VoteValue,
};

/// Named glyphs used across screens
pub mod emoji {
    pub const PROJECT: &str = "📁";
    pub const TASK: &str = "📝";
    pub const DONE: &str = "✅";
    pub const TODO: &str = "⏳";
    pub const IN_PROGRESS: &str = "🔄";
    pub const BLOCKED: &str = "🚫";
    pub const REVIEW: &str = "👀";
    pub const HIGH: &str = "🔴";
    pub const MEDIUM: &str = "🟡";
    pub const LOW: &str = "🟢";
    pub const URGENT: &str = "🚨";
    pub const DEADLINE: &str = "⏰";
    pub const MEETING: &str = "📅";
    pub const USER: &str = "👤";
    pub const TEAM: &str = "👥";
    pub const ALERT: &str = "🔔";
    pub const APPROVAL: &str = "✔️";
    pub const REPORT: &str = "📊";
    pub const RESOURCE: &str = "📚";
    pub const CALENDAR: &str = "📆";
    pub const CHART: &str = "📈";
    pub const WARNING: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const SUCCESS: &str = "✨";
    pub const SETTINGS: &str = "⚙️";
    pub const ERROR: &str = "❌";
    pub const UNREAD: &str = "📬";
    pub const READ: &str = "📭";
}

pub fn task_status_emoji(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => emoji::TODO,
        TaskStatus::InProgress => emoji::IN_PROGRESS,
        TaskStatus::Review => emoji::REVIEW,
        TaskStatus::Blocked => emoji::BLOCKED,
        TaskStatus::Done => emoji::DONE,
        TaskStatus::Cancelled => emoji::ERROR,
    }
}

pub fn project_status_emoji(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Planning => "📋",
        ProjectStatus::Active => emoji::IN_PROGRESS,
        ProjectStatus::OnHold => "⏸️",
        ProjectStatus::Completed => emoji::DONE,
        ProjectStatus::Archived => "🗄️",
    }
}

pub fn task_priority_emoji(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => emoji::LOW,
        TaskPriority::Medium => emoji::MEDIUM,
        TaskPriority::High => emoji::HIGH,
        TaskPriority::Urgent => emoji::URGENT,
    }
}

pub fn project_priority_emoji(priority: ProjectPriority) -> &'static str {
    match priority {
        ProjectPriority::Low => emoji::LOW,
        ProjectPriority::Medium => emoji::MEDIUM,
        ProjectPriority::High => emoji::HIGH,
        ProjectPriority::Critical => emoji::URGENT,
    }
}

pub fn alert_type_emoji(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::TaskAssigned => emoji::TASK,
        AlertType::TaskOverdue => emoji::WARNING,
        AlertType::DeadlineApproaching => emoji::DEADLINE,
        AlertType::MeetingReminder => emoji::MEETING,
        AlertType::ApprovalRequired | AlertType::ApprovalResponse => emoji::DONE,
        AlertType::ProjectUpdate => emoji::PROJECT,
        AlertType::Mention => emoji::USER,
        AlertType::System => "📢",
    }
}

pub fn reminder_type_emoji(reminder_type: ReminderType) -> &'static str {
    match reminder_type {
        ReminderType::TaskDeadline => emoji::DEADLINE,
        ReminderType::Meeting => emoji::MEETING,
        ReminderType::DailyReport | ReminderType::WeeklyReport => emoji::REPORT,
        ReminderType::Custom => emoji::ALERT,
    }
}

pub fn vote_emoji(vote: VoteValue) -> &'static str {
    match vote {
        VoteValue::Available => emoji::DONE,
        VoteValue::NotAvailable => emoji::ERROR,
        VoteValue::Maybe => "🤔",
    }
}

pub fn approval_status_emoji(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => emoji::TODO,
        ApprovalStatus::Approved => emoji::DONE,
        ApprovalStatus::Rejected => emoji::ERROR,
        ApprovalStatus::Cancelled => emoji::BLOCKED,
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Keeps the first `limit` characters, appending the ellipsis marker when text was cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// `MM/DD HH:MM`, used on list buttons
pub fn format_short_datetime(at: DateTime<Utc>) -> String {
    at.format("%m/%d %H:%M").to_string()
}

/// Project card. `progress` is shown when the caller computed it.
pub fn format_project(project: &Project, progress: Option<u32>) -> String {
    let mut msg = format!("{} <b>{}</b>\n", emoji::PROJECT, escape_html(&project.name));
    msg.push_str(&format!(
        "Status: {} {}\n",
        project_status_emoji(project.status),
        project.status.label()
    ));
    msg.push_str(&format!(
        "Priority: {} {}\n",
        project_priority_emoji(project.priority),
        project.priority.label()
    ));
    if let Some(progress) = progress {
        msg.push_str(&format!("Progress: {}%\n", progress));
    }
    if !project.description.is_empty() {
        msg.push('\n');
        msg.push_str(&escape_html(&truncate(&project.description, PROJECT_DESCRIPTION_LIMIT)));
    }
    msg
}

/// Deadline line relative to `now`: overdue, due today, or due in N days.
pub fn deadline_line(task: &Task, now: DateTime<Utc>) -> Option<String> {
    let days = task.days_until_deadline(now)?;
    let line = if task.status.is_closed() {
        format!("{} Deadline: {}", emoji::DEADLINE, format_datetime(task.deadline?))
    } else if task.is_overdue(now) {
        match days.unsigned_abs() {
            0 => format!("{} Overdue!", emoji::WARNING),
            n => format!("{} Overdue by {} days", emoji::WARNING, n),
        }
    } else if days == 0 {
        format!("{} Due today!", emoji::DEADLINE)
    } else {
        format!("{} Due in {} days", emoji::DEADLINE, days)
    };
    Some(line)
}

/// Task card with status, priority, assignee and deadline.
pub fn format_task(task: &Task, assignee: Option<&User>, now: DateTime<Utc>) -> String {
    let mut msg = format!("{} <b>{}</b>\n", task_status_emoji(task.status), escape_html(&task.title));
    msg.push_str(&format!(
        "{} Priority: {}\n",
        task_priority_emoji(task.priority),
        task.priority.label()
    ));
    if let Some(user) = assignee {
        msg.push_str(&format!(
            "{} Assigned to: {}\n",
            emoji::USER,
            escape_html(&user.display_name())
        ));
    }
    if let Some(line) = deadline_line(task, now) {
        msg.push_str(&line);
        msg.push('\n');
    }
    if !task.description.is_empty() {
        msg.push('\n');
        msg.push_str(&escape_html(&truncate(&task.description, TASK_DESCRIPTION_LIMIT)));
    }
    msg
}

pub fn format_meeting(meeting: &Meeting, project: Option<&Project>) -> String {
    let mut msg = format!("{} <b>{}</b>\n\n", emoji::MEETING, escape_html(&meeting.title));
    if !meeting.description.is_empty() {
        msg.push_str(&escape_html(&meeting.description));
        msg.push_str("\n\n");
    }
    msg.push_str(&format!("<b>Time:</b> {}\n", format_datetime(meeting.scheduled_at)));
    msg.push_str(&format!("<b>Duration:</b> {} minutes\n", meeting.duration_minutes));
    if let Some(project) = project {
        msg.push_str(&format!("<b>Project:</b> {}\n", escape_html(&project.name)));
    }
    if let Some(location) = meeting.location.as_deref().filter(|l| !l.is_empty()) {
        msg.push_str(&format!("<b>Location:</b> {}\n", escape_html(location)));
    }
    if let Some(link) = meeting.meeting_link.as_deref().filter(|l| !l.is_empty()) {
        msg.push_str(&format!("<b>Link:</b> {}\n", escape_html(link)));
    }
    msg
}

/// What an approval is about, for its card
pub enum ApprovalSubject<'a> {
    Task(&'a Task),
    Project(&'a Project),
    Missing,
}

pub fn format_approval(approval: &Approval, subject: ApprovalSubject<'_>, requester: Option<&User>) -> String {
    let mut msg = format!("{} <b>Approval Request</b>\n\n", emoji::APPROVAL);
    msg.push_str(&format!("<b>Type:</b> {}\n", approval.approval_type.label()));
    msg.push_str(&format!(
        "<b>Status:</b> {} {}\n",
        approval_status_emoji(approval.status),
        approval.status.label()
    ));
    match subject {
        ApprovalSubject::Task(task) => msg.push_str(&format!("<b>Task:</b> {}\n", escape_html(&task.title))),
        ApprovalSubject::Project(project) => {
            msg.push_str(&format!("<b>Project:</b> {}\n", escape_html(&project.name)))
        }
        ApprovalSubject::Missing => {}
    }
    if let Some(requester) = requester {
        msg.push_str(&format!(
            "<b>Requested by:</b> {}\n",
            escape_html(&requester.display_name())
        ));
    }
    msg.push_str(&format!("<b>Requested:</b> {}\n", format_datetime(approval.created_at)));
    if !approval.reason.is_empty() {
        msg.push_str(&format!("\n<b>Reason:</b>\n{}\n", escape_html(&approval.reason)));
    }
    msg
}
