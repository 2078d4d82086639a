//! Feature apps shipped with the bot.
//!
//! Each module implements [`BotApp`] and is listed once in [`default_apps`].
//! The registry sorts them by their declared order, so the list order only
//! breaks ties.

pub mod approvals;
pub mod basic;
pub mod meetings;
pub mod notifications;
pub mod projects;
pub mod tasks;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::bot::event::Reply;
use crate::bot::format::emoji;
use crate::bot::keyboard::Button;
use crate::bot::registry::{AppMeta, BotApp};
use crate::core::config::format::DATETIME_INPUT_FORMAT;
use crate::core::error::AppResult;
use crate::storage::models::{Alert, NotificationKind, User};
use crate::storage::Store;

/// The statically known app list.
pub fn default_apps() -> Vec<Box<dyn BotApp>> {
    vec![
        Box::new(basic::CoreApp),
        Box::new(projects::ProjectsApp),
        Box::new(tasks::TasksApp),
        Box::new(meetings::MeetingsApp),
        Box::new(approvals::ApprovalsApp),
        Box::new(notifications::NotificationsApp),
    ]
}

/// `"{emoji} {name}"` main-menu button of an app
pub(crate) fn menu_button(meta: AppMeta, token: &str) -> Button {
    Button::new(format!("{} {}", meta.emoji, meta.name), token)
}

/// Reply of a flow's `/cancel` fallback
pub(crate) fn cancelled(text: &str) -> Reply {
    Reply::html(format!("{} {}", emoji::INFO, text))
}

/// Parses `YYYY-MM-DD HH:MM` user input as a UTC instant.
pub(crate) fn parse_datetime_input(input: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(input.trim(), DATETIME_INPUT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Stores `alert` unless `recipient` switched that kind of notification off.
pub(crate) async fn notify(store: &Store, recipient: &User, kind: NotificationKind, alert: Alert) -> AppResult<()> {
    if !recipient.notifications_enabled(kind) {
        log::debug!("User {} has {} notifications off", recipient.id, kind);
        return Ok(());
    }
    let alert = store.alerts.create(alert).await?;
    log::info!("Alert {} ({}) created for user {}", alert.id, alert.alert_type, recipient.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::registry::AppRegistry;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_datetime_input() {
        let at = parse_datetime_input("2024-12-25 14:30").unwrap();
        assert_eq!((at.year(), at.month(), at.day()), (2024, 12, 25));
        assert_eq!((at.hour(), at.minute()), (14, 30));

        assert!(parse_datetime_input(" 2024-12-25 14:30 ").is_some());
        assert!(parse_datetime_input("tomorrow").is_none());
        assert!(parse_datetime_input("2024-13-01 10:00").is_none());
        assert!(parse_datetime_input("2024-12-25").is_none());
    }

    #[test]
    fn test_default_apps_register_cleanly() {
        let (router, catalog) = AppRegistry::new(default_apps()).assemble();

        assert_eq!(
            catalog.app_names(),
            vec!["Core", "Projects", "Tasks", "Meetings", "Approvals", "Notifications"]
        );
        for command in [
            "start",
            "help",
            "menu",
            "cancel",
            "projects",
            "myprojects",
            "createproject",
            "tasks",
            "mytasks",
            "createtask",
            "dailyreport",
            "weeklyreport",
            "meetings",
            "schedulemeeting",
            "approvals",
            "approve",
            "reject",
            "requestapproval",
            "notifications",
            "reminders",
            "settings",
        ] {
            assert!(router.has_command(command), "missing /{}", command);
        }
        assert_eq!(
            router.flow_ids(),
            vec!["create_project", "create_task", "request_approval", "schedule_meeting"]
        );
    }

    #[test]
    fn test_main_menu_follows_app_order() {
        let (_, catalog) = AppRegistry::new(default_apps()).assemble();
        let tokens: Vec<&str> = catalog.menu.iter().map(|b| b.token.as_str()).collect();
        assert_eq!(
            tokens,
            vec!["list_projects", "list_tasks", "list_meetings", "list_approvals", "notifications"]
        );
    }
}
