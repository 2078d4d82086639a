//! Core app: welcome, main menu, help, reports and the global cancel.

use chrono::{Duration, Utc};
use indoc::formatdoc;

use crate::bot::context::HandlerContext;
use crate::bot::conversation::CANCEL_COMMAND;
use crate::bot::event::Reply;
use crate::bot::format::{emoji, escape_html, truncate};
use crate::bot::keyboard::{back_button, build_menu, tokens, Button, Keyboard, NOOP_TOKEN};
use crate::bot::registry::{AppMeta, BotApp, Registration};
use crate::bot::router::RouterBuilder;
use crate::core::config::format::BUTTON_TITLE_LIMIT;
use crate::core::error::AppResult;
use crate::storage::models::TaskStatus;

/// Completed tasks listed by name in the weekly summary
const WEEKLY_LISTED_TASKS: usize = 5;

pub struct CoreApp;

impl BotApp for CoreApp {
    fn meta(&self) -> AppMeta {
        AppMeta {
            name: "Core",
            emoji: "🏠",
            description: "Core bot functionality",
            order: 0,
        }
    }

    fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
        router.command("start", start)?;
        router.command("menu", main_menu)?;
        router.command("help", help)?;
        router.command("dailyreport", daily_report)?;
        router.command("weeklyreport", weekly_report)?;
        router.command(CANCEL_COMMAND, nothing_to_cancel)?;

        router.callback("^menu$", main_menu)?;
        router.callback("^back$", main_menu)?;
        router.callback("^help$", help)?;
        router.callback("^cancel$", nothing_to_cancel)?;
        router.callback(&format!("^{}$", NOOP_TOKEN), noop)?;
        Ok(Registration::Registered)
    }

    fn help_text(&self) -> Option<String> {
        Some(formatdoc! {"
            <b>{report} Reports:</b>
            /dailyreport - Submit daily report
            /weeklyreport - View weekly summary

            <b>🏠 General:</b>
            /menu - Main menu
            /cancel - Stop the current dialog",
            report = emoji::REPORT,
        })
    }
}

async fn start(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;

    let text = formatdoc! {"
        {success} <b>Welcome to Tasky Project Manager!</b>

        Hello {name}! 👋

        I'm your personal project management assistant. I can help you:

        {project} Manage projects and tasks
        {user} Assign and track work
        {deadline} Set and monitor deadlines
        {meeting} Schedule meetings and votes
        {report} Generate daily/weekly reports
        {approval} Handle approvals and alerts
        {resource} Share learning resources

        Use /menu to see all available commands or /help for detailed information.",
        success = emoji::SUCCESS,
        name = escape_html(&user.first_name),
        project = emoji::PROJECT,
        user = emoji::USER,
        deadline = emoji::DEADLINE,
        meeting = emoji::MEETING,
        report = emoji::REPORT,
        approval = emoji::APPROVAL,
        resource = emoji::RESOURCE,
    };

    let keyboard = Keyboard::column([
        Button::new(format!("{} My Projects", emoji::PROJECT), "my_projects"),
        Button::new(format!("{} My Tasks", emoji::TASK), "my_tasks"),
        Button::new(format!("{} Meetings", emoji::MEETING), "list_meetings"),
        Button::new(format!("{} Notifications", emoji::ALERT), "notifications"),
        Button::new(format!("{} Help", emoji::INFO), "help"),
    ]);
    Ok(ctx.screen(text, keyboard))
}

async fn main_menu(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let text = format!(
        "{} <b>Main Menu</b>\n\nWhat would you like to do, {}?",
        emoji::PROJECT,
        escape_html(&user.first_name)
    );
    let keyboard = build_menu(
        ctx.catalog().menu.clone(),
        2,
        None,
        Some(Button::new(format!("{} Help", emoji::INFO), "help")),
    );
    Ok(ctx.screen(text, keyboard))
}

async fn help(ctx: HandlerContext) -> AppResult<Reply> {
    let text = format!(
        "{} <b>Tasky Bot Commands</b>\n\n{}\n\nUse inline buttons for easier navigation!",
        emoji::INFO,
        ctx.catalog().help
    );
    Ok(ctx.screen(text, Keyboard::column([back_button(tokens::MENU)])))
}

async fn daily_report(ctx: HandlerContext) -> AppResult<Reply> {
    ctx.current_user().await?;
    let text = formatdoc! {"
        {report} <b>Daily Report</b>

        Please send your daily report in the following format:

        <b>Completed:</b> Task 1, Task 2
        <b>In Progress:</b> Task 3
        <b>Blockers:</b> None
        <b>Tomorrow:</b> Task 4, Task 5
        ",
        report = emoji::REPORT,
    };
    Ok(Reply::html(text))
}

/// Last seven days of the user's own tasks.
async fn weekly_report(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let now = Utc::now();
    let since = now - Duration::days(7);
    let user_id = user.id;

    let tasks = ctx.store().tasks.filter(move |t| t.involves(user_id)).await?;
    let completed: Vec<_> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done && t.completed_at.is_some_and(|at| at >= since))
        .collect();
    let in_progress = tasks.iter().filter(|t| t.status == TaskStatus::InProgress).count();
    let overdue = tasks.iter().filter(|t| t.is_overdue(now)).count();
    let created = tasks.iter().filter(|t| t.created_at >= since).count();

    let mut text = format!(
        "{} <b>Weekly Summary</b>\n{} to {}\n\n",
        emoji::CHART,
        since.format("%m/%d"),
        now.format("%m/%d")
    );
    text.push_str(&format!("{} Completed: {}\n", emoji::DONE, completed.len()));
    text.push_str(&format!("{} In Progress: {}\n", emoji::IN_PROGRESS, in_progress));
    text.push_str(&format!("{} New Tasks: {}\n", emoji::TASK, created));
    text.push_str(&format!("{} Overdue: {}\n", emoji::WARNING, overdue));

    if !completed.is_empty() {
        text.push_str("\n<b>Done this week:</b>\n");
        for task in completed.iter().take(WEEKLY_LISTED_TASKS) {
            text.push_str(&format!("• {}\n", escape_html(&truncate(&task.title, BUTTON_TITLE_LIMIT))));
        }
        if completed.len() > WEEKLY_LISTED_TASKS {
            text.push_str(&format!("... and {} more\n", completed.len() - WEEKLY_LISTED_TASKS));
        }
    }

    Ok(Reply::html(text))
}

/// `/cancel` or the cancel button with no dialog open
async fn nothing_to_cancel(ctx: HandlerContext) -> AppResult<Reply> {
    if ctx.is_callback() {
        return Ok(Reply::notice_only("Nothing to cancel."));
    }
    Ok(Reply::html(format!("{} Nothing to cancel.", emoji::INFO)))
}

/// Page indicator buttons; acknowledged without a message
async fn noop(_ctx: HandlerContext) -> AppResult<Reply> {
    Ok(Reply::empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_lists_reports() {
        let help = CoreApp.help_text().unwrap();
        assert!(help.contains("/dailyreport - Submit daily report"));
        assert!(help.contains("/weeklyreport - View weekly summary"));
    }
}
