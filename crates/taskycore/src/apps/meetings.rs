//! Meetings app: upcoming meetings, availability votes and the
//! schedule-meeting conversation.

use chrono::Utc;

use crate::apps::{cancelled, menu_button, parse_datetime_input};
use crate::bot::context::HandlerContext;
use crate::bot::conversation::{text_input, Flow, Transition, CANCEL_COMMAND};
use crate::bot::event::Reply;
use crate::bot::format::{emoji, escape_html, format_datetime, format_meeting, format_short_datetime, truncate, vote_emoji};
use crate::bot::keyboard::{back_button, build_menu, cancel_button, pagination_row, tokens, Button, Keyboard};
use crate::bot::pagination::paginate;
use crate::bot::registry::{AppMeta, BotApp, Registration};
use crate::bot::router::RouterBuilder;
use crate::bot::session::FlowFields;
use crate::core::config::format::BUTTON_TITLE_LIMIT;
use crate::core::config::pagination::{LIST_PAGE_SIZE, MAX_CHOICE_BUTTONS};
use crate::core::error::AppResult;
use crate::storage::models::{Meeting, MeetingVote, VoteValue};

const FLOW_ID: &str = "schedule_meeting";

const TITLE: &str = "title";
const DESCRIPTION: &str = "description";
const PROJECT: &str = "project";
const TIME: &str = "time";

const TITLE_PROMPT: &str = "📅 <b>Schedule New Meeting</b>\n\nEnter meeting title:";
const DESCRIPTION_PROMPT: &str = "Enter meeting description (or /skip):";
const PROJECT_PROMPT: &str = "Select project (optional):";
const TIME_PROMPT: &str = "Enter meeting time (YYYY-MM-DD HH:MM):";
const INVALID_DATE: &str = "❌ Invalid date format. Please use YYYY-MM-DD HH:MM\nExample: 2024-12-25 14:30";

/// Project choice meaning "not linked to a project"
const NO_PROJECT: &str = "none";

pub struct MeetingsApp;

impl BotApp for MeetingsApp {
    fn meta(&self) -> AppMeta {
        AppMeta {
            name: "Meetings",
            emoji: "📅",
            description: "Meeting scheduling and management",
            order: 3,
        }
    }

    fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
        router.flow(
            Flow::new(FLOW_ID)
                .entry_command("schedulemeeting", start_scheduling)
                .entry_callback("^schedule_meeting$", start_scheduling)
                .text_state(TITLE, TITLE_PROMPT, title_received)
                .skippable_text_state(DESCRIPTION, DESCRIPTION_PROMPT, description_received)
                .callback_state(PROJECT, r"^meeting_project:(\d+|none)$", PROJECT_PROMPT, project_received)
                .text_state(TIME, TIME_PROMPT, time_received)
                .fallback_command(CANCEL_COMMAND, scheduling_cancelled)
                .fallback_callback("^cancel$", scheduling_cancelled),
        )?;

        router.command("meetings", list_meetings)?;
        router.callback(r"^list_meetings(:\d+)?$", list_meetings)?;
        router.callback(r"^meeting:\d+$", meeting_detail)?;
        router.callback("^vote_meeting:", vote_menu)?;
        router.callback("^vote_submit:", submit_vote)?;
        router.callback("^meeting_votes:", vote_summary)?;
        Ok(Registration::Registered)
    }

    fn menu_entries(&self) -> Vec<Button> {
        vec![menu_button(self.meta(), "list_meetings")]
    }

    fn help_text(&self) -> Option<String> {
        Some(
            "<b>📅 Meetings:</b>\n\
             /meetings - List upcoming meetings\n\
             /schedulemeeting - Schedule new meeting"
                .to_string(),
        )
    }
}

// ─── Listing and details ───

async fn list_meetings(ctx: HandlerContext) -> AppResult<Reply> {
    let page = ctx.args.page(0)?;
    let now = Utc::now();

    let mut meetings = ctx.store().meetings.filter(move |m| m.scheduled_at >= now).await?;
    meetings.sort_by_key(|m| m.scheduled_at);

    let schedule_button = Button::new("➕ Schedule Meeting", "schedule_meeting");

    if meetings.is_empty() {
        let text = format!(
            "{} <b>Upcoming Meetings</b>\n\nNo upcoming meetings scheduled.\n\nUse /schedulemeeting to create one!",
            emoji::MEETING
        );
        let keyboard = Keyboard::column([schedule_button, back_button(tokens::MENU)]);
        return Ok(ctx.screen(text, keyboard));
    }

    let page = paginate(meetings, page, LIST_PAGE_SIZE);
    let text = format!(
        "{} <b>Upcoming Meetings</b>\nShowing {} of {} meetings\n\n",
        emoji::MEETING,
        page.items.len(),
        page.total_items
    );

    let buttons = page
        .items
        .iter()
        .map(|m| {
            Button::new(
                format!(
                    "{} {} - {}",
                    emoji::MEETING,
                    truncate(&m.title, BUTTON_TITLE_LIMIT),
                    format_short_datetime(m.scheduled_at)
                ),
                format!("meeting:{}", m.id),
            )
        })
        .collect();

    let mut keyboard = build_menu(buttons, 1, None, None);
    if page.total_pages > 1 {
        keyboard = keyboard.row(pagination_row(page.current_page, page.total_pages, "list_meetings"));
    }
    let keyboard = keyboard.button(schedule_button).button(back_button(tokens::MENU));

    Ok(ctx.screen(text, keyboard))
}

fn meeting_not_found(ctx: &HandlerContext) -> Reply {
    ctx.screen("Meeting not found.", Keyboard::column([back_button("list_meetings:0")]))
}

async fn meeting_detail(ctx: HandlerContext) -> AppResult<Reply> {
    let meeting_id = ctx.args.id(0)?;
    match ctx.store().meetings.get(meeting_id).await? {
        Some(meeting) => meeting_screen(&ctx, &meeting).await,
        None => Ok(meeting_not_found(&ctx)),
    }
}

async fn meeting_screen(ctx: &HandlerContext, meeting: &Meeting) -> AppResult<Reply> {
    let project = match meeting.project_id {
        Some(id) => ctx.store().projects.get(id).await?,
        None => None,
    };
    let meeting_id = meeting.id;
    let votes = ctx.store().votes.count(move |v| v.meeting_id == meeting_id).await?;

    let mut text = format_meeting(meeting, project.as_ref());
    text.push_str(&format!("\n<b>{} Votes:</b> {}\n", emoji::TEAM, votes));

    let keyboard = Keyboard::column([
        Button::new(format!("{} Vote Available", emoji::DONE), format!("vote_meeting:{}", meeting.id)),
        Button::new(format!("{} View Votes", emoji::REPORT), format!("meeting_votes:{}", meeting.id)),
        back_button("list_meetings:0"),
    ]);
    Ok(ctx.screen(text, keyboard))
}

// ─── Votes ───

/// Callback token form of a vote value
fn vote_token(vote: VoteValue) -> String {
    vote.as_ref().to_lowercase()
}

async fn vote_menu(ctx: HandlerContext) -> AppResult<Reply> {
    let meeting_id = ctx.args.id(0)?;
    if ctx.store().meetings.get(meeting_id).await?.is_none() {
        return Ok(meeting_not_found(&ctx));
    }

    let user = ctx.current_user().await?;
    let user_id = user.id;
    let voted = ctx
        .store()
        .votes
        .count(move |v| v.meeting_id == meeting_id && v.user_id == user_id)
        .await?
        > 0;

    let text = if voted {
        "You've already voted for this meeting!\n\nChange your vote:"
    } else {
        "Vote for this meeting time:"
    };

    let keyboard = Keyboard::column(
        [VoteValue::Available, VoteValue::NotAvailable, VoteValue::Maybe]
            .into_iter()
            .map(|vote| {
                Button::new(
                    format!("{} {}", vote_emoji(vote), vote.label()),
                    format!("vote_submit:{}:{}", meeting_id, vote_token(vote)),
                )
            })
            .chain([back_button(&format!("meeting:{}", meeting_id))]),
    );
    Ok(ctx.screen(text, keyboard))
}

/// One vote per (meeting, user, slot); voting again replaces the value.
async fn submit_vote(ctx: HandlerContext) -> AppResult<Reply> {
    let meeting_id = ctx.args.id(0)?;
    let vote: VoteValue = ctx.args.parse(1)?;

    let Some(meeting) = ctx.store().meetings.get(meeting_id).await? else {
        return Ok(meeting_not_found(&ctx));
    };
    let user = ctx.current_user().await?;
    let user_id = user.id;
    let slot = meeting.scheduled_at;

    let existing = ctx
        .store()
        .votes
        .find(move |v| v.meeting_id == meeting_id && v.user_id == user_id && v.time_slot == slot)
        .await?;

    let notice = match existing {
        Some(existing) => {
            ctx.store().votes.update(existing.id, move |v| v.vote = vote).await?;
            "Vote updated!"
        }
        None => {
            ctx.store()
                .votes
                .create(MeetingVote {
                    id: 0,
                    meeting_id,
                    user_id,
                    time_slot: slot,
                    vote,
                    created_at: Utc::now(),
                })
                .await?;
            "Vote submitted!"
        }
    };
    log::info!("User {} voted {} for meeting {}", user_id, vote, meeting_id);

    Ok(meeting_screen(&ctx, &meeting).await?.with_notice(notice))
}

async fn vote_summary(ctx: HandlerContext) -> AppResult<Reply> {
    let meeting_id = ctx.args.id(0)?;
    let votes = ctx.store().votes.filter(move |v| v.meeting_id == meeting_id).await?;

    let text = if votes.is_empty() {
        format!("{} No votes yet for this meeting.", emoji::INFO)
    } else {
        let count = |value: VoteValue| votes.iter().filter(|v| v.vote == value).count();
        let mut text = format!("{} <b>Meeting Votes</b>\n\n", emoji::CHART);
        for value in [VoteValue::Available, VoteValue::NotAvailable, VoteValue::Maybe] {
            text.push_str(&format!("{} {}: {}\n", vote_emoji(value), value.label(), count(value)));
        }
        text.push_str(&format!("\n<b>Total:</b> {} votes", votes.len()));
        text
    };

    Ok(ctx.screen(text, Keyboard::column([back_button(&format!("meeting:{}", meeting_id))])))
}

// ─── Schedule meeting conversation ───

async fn start_scheduling(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let reply = ctx.screen(TITLE_PROMPT, Keyboard::column([cancel_button(tokens::CANCEL)]));
    Ok(Transition::next(TITLE, fields, reply))
}

async fn title_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    let title = text_input(&ctx).unwrap_or_default();
    if title.trim().is_empty() {
        return Ok(Transition::stay(fields, Reply::html(TITLE_PROMPT)));
    }
    fields.set(TITLE, title);
    Ok(Transition::next(DESCRIPTION, fields, Reply::plain(DESCRIPTION_PROMPT)))
}

/// Skips the project question entirely when there is nothing to pick.
async fn description_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    fields.set(DESCRIPTION, text_input(&ctx).unwrap_or_default());

    let projects = ctx.store().projects.all().await?;
    if projects.is_empty() {
        fields.set(PROJECT, "");
        return Ok(Transition::next(TIME, fields, Reply::plain(TIME_PROMPT)));
    }

    let buttons = projects
        .iter()
        .take(MAX_CHOICE_BUTTONS)
        .map(|p| Button::new(truncate(&p.name, BUTTON_TITLE_LIMIT), format!("meeting_project:{}", p.id)))
        .chain([Button::new("⏭️ Skip (No Project)", format!("meeting_project:{}", NO_PROJECT))])
        .collect();
    let keyboard = build_menu(buttons, 1, None, Some(cancel_button(tokens::CANCEL)));
    Ok(Transition::next(PROJECT, fields, ctx.screen(PROJECT_PROMPT, keyboard)))
}

async fn project_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    let choice = ctx.args.param(0)?;
    if choice == NO_PROJECT {
        fields.set(PROJECT, "");
    } else {
        fields.set(PROJECT, ctx.args.id(0)?.to_string());
    }
    Ok(Transition::next(TIME, fields, ctx.screen(TIME_PROMPT, Keyboard::default())))
}

async fn time_received(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let input = text_input(&ctx).unwrap_or_default();
    let Some(scheduled_at) = parse_datetime_input(&input) else {
        return Ok(Transition::stay(fields, Reply::plain(INVALID_DATE)));
    };

    let user = ctx.current_user().await?;
    let mut meeting = Meeting::new(fields.require(TITLE)?, scheduled_at, user.id);
    meeting.description = fields.text(DESCRIPTION);
    meeting.project_id = fields.optional_i64(PROJECT);

    let meeting = ctx.store().meetings.create(meeting).await?;
    log::info!("Meeting {} scheduled by user {}", meeting.id, user.id);

    let text = format!(
        "{} Meeting scheduled successfully!\n\n<b>{} {}</b>\n<b>Time:</b> {}\n<b>Duration:</b> {} minutes\n",
        emoji::SUCCESS,
        emoji::MEETING,
        escape_html(&meeting.title),
        format_datetime(meeting.scheduled_at),
        meeting.duration_minutes
    );
    let keyboard = Keyboard::column([
        Button::new("View Meeting", format!("meeting:{}", meeting.id)),
        back_button("list_meetings:0"),
    ]);
    Ok(Transition::done(ctx.screen(text, keyboard)))
}

async fn scheduling_cancelled(_ctx: HandlerContext) -> AppResult<Reply> {
    Ok(cancelled("Meeting creation cancelled."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_vote_tokens_parse_back() {
        for vote in [VoteValue::Available, VoteValue::NotAvailable, VoteValue::Maybe] {
            assert_eq!(VoteValue::from_str(&vote_token(vote)).unwrap(), vote);
        }
        assert_eq!(vote_token(VoteValue::NotAvailable), "not_available");
    }
}
