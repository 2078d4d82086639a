//! Notifications app: the alert inbox, upcoming reminders and per-user
//! notification preferences.

use chrono::Utc;
use strum::IntoEnumIterator;

use crate::apps::menu_button;
use crate::bot::context::HandlerContext;
use crate::bot::event::Reply;
use crate::bot::format::{
    alert_type_emoji, emoji, escape_html, format_datetime, format_short_datetime, reminder_type_emoji,
};
use crate::bot::keyboard::{back_button, build_menu, pagination_row, tokens, Button, Keyboard};
use crate::bot::pagination::paginate;
use crate::bot::registry::{AppMeta, BotApp, Registration};
use crate::bot::router::RouterBuilder;
use crate::core::config::pagination::{LIST_PAGE_SIZE, MAX_REMINDERS_SHOWN};
use crate::core::error::AppResult;
use crate::storage::models::{Alert, NotificationKind, User};

const INBOX_TOKEN: &str = "notifications:0";

pub struct NotificationsApp;

impl BotApp for NotificationsApp {
    fn meta(&self) -> AppMeta {
        AppMeta {
            name: "Notifications",
            emoji: "🔔",
            description: "Notifications and alerts",
            order: 5,
        }
    }

    fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
        router.command("notifications", list_notifications)?;
        router.command("reminders", list_reminders)?;
        router.command("settings", settings)?;

        router.callback(r"^notifications(:\d+)?$", list_notifications)?;
        router.callback(r"^notification:\d+$", notification_detail)?;
        router.callback("^mark_all_read$", mark_all_read)?;
        router.callback("^settings$", settings)?;
        router.callback("^toggle_notif:", toggle)?;
        Ok(Registration::Registered)
    }

    fn menu_entries(&self) -> Vec<Button> {
        vec![menu_button(self.meta(), "notifications")]
    }

    fn help_text(&self) -> Option<String> {
        Some(
            "<b>🔔 Notifications:</b>\n\
             /notifications - View all notifications\n\
             /reminders - Upcoming reminders\n\
             /settings - Notification preferences"
                .to_string(),
        )
    }
}

// ─── Inbox ───

async fn list_notifications(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let page = ctx.args.page(0)?;
    let user_id = user.id;

    let mut alerts = ctx.store().alerts.filter(move |a| a.user_id == user_id).await?;
    if alerts.is_empty() {
        let text = format!(
            "{} <b>Notifications</b>\n\nNo notifications.\n\nYou're all caught up! {}",
            emoji::ALERT,
            emoji::DONE
        );
        return Ok(ctx.screen(text, Keyboard::column([back_button(tokens::MENU)])));
    }

    // newest first
    alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let unread = alerts.iter().filter(|a| !a.is_read).count();

    let page = paginate(alerts, page, LIST_PAGE_SIZE);
    let text = format!(
        "{} <b>Notifications</b>\nUnread: {} | Total: {}\n\n",
        emoji::ALERT,
        unread,
        page.total_items
    );

    let buttons = page.items.iter().map(alert_button).collect();
    let mut keyboard = build_menu(buttons, 1, None, None);
    if unread > 0 {
        keyboard = keyboard.button(Button::new(format!("{} Mark All Read", emoji::DONE), "mark_all_read"));
    }
    if page.total_pages > 1 {
        keyboard = keyboard.row(pagination_row(page.current_page, page.total_pages, "notifications"));
    }
    let keyboard = keyboard.button(back_button(tokens::MENU));

    Ok(ctx.screen(text, keyboard))
}

fn alert_button(alert: &Alert) -> Button {
    let read = if alert.is_read { emoji::READ } else { emoji::UNREAD };
    Button::new(
        format!(
            "{} {} {} - {}",
            read,
            alert_type_emoji(alert.alert_type),
            alert.alert_type.label(),
            format_short_datetime(alert.created_at)
        ),
        format!("notification:{}", alert.id),
    )
}

/// Opens one alert and marks it read. Alerts of other users read as missing.
async fn notification_detail(ctx: HandlerContext) -> AppResult<Reply> {
    let alert_id = ctx.args.id(0)?;
    let user = ctx.current_user().await?;

    let owned = ctx
        .store()
        .alerts
        .get(alert_id)
        .await?
        .filter(|a| a.user_id == user.id);
    if owned.is_none() {
        return Ok(ctx.screen("Notification not found.", Keyboard::column([back_button(INBOX_TOKEN)])));
    }

    let Some(alert) = ctx
        .store()
        .alerts
        .update(alert_id, |a| a.mark_read(Utc::now()))
        .await?
    else {
        return Ok(ctx.screen("Notification not found.", Keyboard::column([back_button(INBOX_TOKEN)])));
    };

    let mut text = format!(
        "{} <b>{}</b>\n\n{}\n\n<b>Time:</b> {}\n",
        alert_type_emoji(alert.alert_type),
        escape_html(&alert.title),
        escape_html(&alert.message),
        format_datetime(alert.created_at)
    );

    let mut keyboard = Keyboard::default();
    if let Some(task) = match alert.task_id {
        Some(id) => ctx.store().tasks.get(id).await?,
        None => None,
    } {
        text.push_str(&format!("<b>Task:</b> {}\n", escape_html(&task.title)));
        keyboard = keyboard.button(Button::new("View Task", format!("task:{}", task.id)));
    }
    if let Some(project) = match alert.project_id {
        Some(id) => ctx.store().projects.get(id).await?,
        None => None,
    } {
        text.push_str(&format!("<b>Project:</b> {}\n", escape_html(&project.name)));
        keyboard = keyboard.button(Button::new("View Project", format!("project:{}", project.id)));
    }
    let keyboard = keyboard.button(back_button(INBOX_TOKEN));

    Ok(ctx.screen(text, keyboard))
}

async fn mark_all_read(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let user_id = user.id;

    let unread = ctx
        .store()
        .alerts
        .filter(move |a| a.user_id == user_id && !a.is_read)
        .await?;
    let now = Utc::now();
    for alert in &unread {
        ctx.store().alerts.update(alert.id, move |a| a.mark_read(now)).await?;
    }
    log::debug!("Marked {} alerts read for user {}", unread.len(), user_id);

    let text = format!("{} All notifications marked as read!", emoji::SUCCESS);
    Ok(ctx.screen(text, Keyboard::column([back_button(INBOX_TOKEN)])))
}

// ─── Reminders ───

async fn list_reminders(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let user_id = user.id;
    let now = Utc::now();

    let mut reminders = ctx
        .store()
        .reminders
        .filter(move |r| r.user_id == user_id && !r.is_sent && r.remind_at >= now)
        .await?;

    if reminders.is_empty() {
        let text = format!("{} <b>Upcoming Reminders</b>\n\nNo upcoming reminders.", emoji::DEADLINE);
        return Ok(ctx.screen(text, Keyboard::column([back_button(tokens::MENU)])));
    }

    reminders.sort_by_key(|r| r.remind_at);
    let mut text = format!(
        "{} <b>Upcoming Reminders</b>\nTotal: {}\n\n",
        emoji::DEADLINE,
        reminders.len()
    );
    for reminder in reminders.iter().take(MAX_REMINDERS_SHOWN) {
        text.push_str(&format!(
            "{} <b>{}</b>\n   {}\n\n",
            reminder_type_emoji(reminder.reminder_type),
            format_short_datetime(reminder.remind_at),
            escape_html(&reminder.message)
        ));
    }
    if reminders.len() > MAX_REMINDERS_SHOWN {
        text.push_str(&format!("... and {} more", reminders.len() - MAX_REMINDERS_SHOWN));
    }

    Ok(ctx.screen(text, Keyboard::column([back_button(tokens::MENU)])))
}

// ─── Settings ───

fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::TaskAssigned => "Task Assigned",
        NotificationKind::Deadline => "Deadline Approaching",
        NotificationKind::Meeting => "Meeting Scheduled",
        NotificationKind::Approval => "Approval Required",
    }
}

fn settings_screen(ctx: &HandlerContext, user: &User) -> Reply {
    let mut text = format!(
        "{} <b>Notification Settings</b>\n\nConfigure your notification preferences:\n\n",
        emoji::SETTINGS
    );
    let mut buttons = Vec::new();
    for kind in NotificationKind::iter() {
        let enabled = user.notifications_enabled(kind);
        let label = kind_label(kind);
        text.push_str(&format!("{} {}\n", if enabled { emoji::DONE } else { emoji::ERROR }, label));
        buttons.push(Button::new(
            format!("{} {}", if enabled { "Disable" } else { "Enable" }, label),
            format!("toggle_notif:{}", kind),
        ));
    }
    ctx.screen(text, build_menu(buttons, 1, None, Some(back_button(tokens::MENU))))
}

async fn settings(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    Ok(settings_screen(&ctx, &user))
}

async fn toggle(ctx: HandlerContext) -> AppResult<Reply> {
    let kind: NotificationKind = ctx.args.parse(0)?;
    let user = ctx.current_user().await?;

    let user = ctx
        .store()
        .users
        .update(user.id, move |u| u.toggle_notifications(kind))
        .await?
        .unwrap_or(user);
    log::info!(
        "User {} turned {} notifications {}",
        user.id,
        kind,
        if user.notifications_enabled(kind) { "on" } else { "off" }
    );

    Ok(settings_screen(&ctx, &user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::AlertType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_alert_button_shows_read_state() {
        let mut alert = Alert::new(1, AlertType::TaskAssigned, "t", "m");
        alert.id = 3;
        let unread = alert_button(&alert);
        assert!(unread.label.starts_with("📬 📝 Task Assigned - "));
        assert_eq!(unread.token, "notification:3");

        alert.mark_read(Utc::now());
        assert!(alert_button(&alert).label.starts_with("📭 "));
    }

    #[test]
    fn test_toggle_tokens_parse_back() {
        for kind in NotificationKind::iter() {
            let token = format!("toggle_notif:{}", kind);
            let args = crate::bot::context::CallbackArgs::from_token(&token);
            assert_eq!(args.parse::<NotificationKind>(0).unwrap(), kind);
        }
    }
}
