//! Approvals app: the approver's pending queue, approve/reject decisions and
//! the request-approval conversation.

use chrono::Utc;

use crate::apps::{cancelled, menu_button, notify};
use crate::bot::context::HandlerContext;
use crate::bot::conversation::{text_input, Flow, Transition, CANCEL_COMMAND};
use crate::bot::event::Reply;
use crate::bot::format::{emoji, escape_html, format_approval, format_datetime, truncate, ApprovalSubject};
use crate::bot::keyboard::{back_button, build_menu, cancel_button, pagination_row, tokens, Button, Keyboard};
use crate::bot::pagination::paginate;
use crate::bot::registry::{AppMeta, BotApp, Registration};
use crate::bot::router::RouterBuilder;
use crate::bot::session::FlowFields;
use crate::core::config::format::BUTTON_TITLE_LIMIT;
use crate::core::config::pagination::{LIST_PAGE_SIZE, MAX_CHOICE_BUTTONS};
use crate::core::error::AppResult;
use crate::storage::models::{Alert, AlertType, Approval, ApprovalStatus, ApprovalType, NotificationKind, TaskStatus};

const FLOW_ID: &str = "request_approval";

const KIND: &str = "kind";
const ITEM: &str = "item";
const REASON: &str = "reason";

const KIND_PROMPT: &str = "✔️ <b>Request Approval</b>\n\nSelect approval type:";
const ITEM_PROMPT: &str = "Select the item to approve:";
const REASON_PROMPT: &str = "Enter reason for approval request (or /skip):";

const CANCEL_TOKEN: &str = "cancel_approval";
const QUEUE_TOKEN: &str = "list_approvals:0";

pub struct ApprovalsApp;

impl BotApp for ApprovalsApp {
    fn meta(&self) -> AppMeta {
        AppMeta {
            name: "Approvals",
            emoji: "✔️",
            description: "Approval workflows and requests",
            order: 4,
        }
    }

    fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
        router.flow(
            Flow::new(FLOW_ID)
                .entry_command("requestapproval", start_request)
                .entry_callback("^request_approval$", start_request)
                .callback_state(KIND, "^approval_type:(task|project)$", KIND_PROMPT, kind_received)
                .callback_state(ITEM, r"^approval_item:(task|project):\d+$", ITEM_PROMPT, item_received)
                .skippable_text_state(REASON, REASON_PROMPT, reason_received)
                .fallback_command(CANCEL_COMMAND, request_cancelled)
                .fallback_callback("^cancel$", request_cancelled)
                .fallback_callback(&format!("^{}$", CANCEL_TOKEN), request_cancelled),
        )?;

        router.command("approvals", list_approvals)?;
        router.command("approve", approve_command)?;
        router.command("reject", reject_command)?;
        router.callback(r"^list_approvals(:\d+)?$", list_approvals)?;
        router.callback(r"^approval:\d+$", approval_detail)?;
        router.callback("^approve_action:", approve_action)?;
        router.callback("^reject_action:", reject_action)?;
        Ok(Registration::Registered)
    }

    fn menu_entries(&self) -> Vec<Button> {
        vec![menu_button(self.meta(), "list_approvals")]
    }

    fn help_text(&self) -> Option<String> {
        Some(
            "<b>✔️ Approvals:</b>\n\
             /approvals - Pending approvals\n\
             /approve [id] - Approve request\n\
             /reject [id] - Reject request\n\
             /requestapproval - Ask for an approval"
                .to_string(),
        )
    }
}

/// `TASK` reads as `Task` on list buttons
fn type_title(approval_type: ApprovalType) -> String {
    let lower = approval_type.as_ref().to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ─── Queue and details ───

async fn list_approvals(ctx: HandlerContext) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let page = ctx.args.page(0)?;
    let user_id = user.id;

    let pending = ctx
        .store()
        .approvals
        .filter(move |a| a.approver_id == user_id && a.status == ApprovalStatus::Pending)
        .await?;

    let request_button = Button::new("➕ Request Approval", "request_approval");

    if pending.is_empty() {
        let text = format!(
            "{} <b>Pending Approvals</b>\n\nNo pending approvals.\n\nYou're all caught up! {}",
            emoji::APPROVAL,
            emoji::DONE
        );
        return Ok(ctx.screen(text, Keyboard::column([request_button, back_button(tokens::MENU)])));
    }

    let page = paginate(pending, page, LIST_PAGE_SIZE);
    let text = format!(
        "{} <b>Pending Approvals</b>\nShowing {} of {} approvals\n\n",
        emoji::APPROVAL,
        page.items.len(),
        page.total_items
    );

    let buttons = page
        .items
        .iter()
        .map(|a| {
            Button::new(
                format!("📋 {} - {}", type_title(a.approval_type), a.created_at.format("%m/%d")),
                format!("approval:{}", a.id),
            )
        })
        .collect();

    let mut keyboard = build_menu(buttons, 1, None, None);
    if page.total_pages > 1 {
        keyboard = keyboard.row(pagination_row(page.current_page, page.total_pages, "list_approvals"));
    }
    let keyboard = keyboard.button(request_button).button(back_button(tokens::MENU));

    Ok(ctx.screen(text, keyboard))
}

fn approval_not_found(ctx: &HandlerContext) -> Reply {
    ctx.screen("Approval not found.", Keyboard::column([back_button(QUEUE_TOKEN)]))
}

async fn approval_detail(ctx: HandlerContext) -> AppResult<Reply> {
    let approval_id = ctx.args.id(0)?;
    let Some(approval) = ctx.store().approvals.get(approval_id).await? else {
        return Ok(approval_not_found(&ctx));
    };

    let task = match approval.task_id {
        Some(id) => ctx.store().tasks.get(id).await?,
        None => None,
    };
    let project = match (approval.project_id, &task) {
        (Some(id), None) => ctx.store().projects.get(id).await?,
        _ => None,
    };
    let subject = match (&task, &project) {
        (Some(task), _) => ApprovalSubject::Task(task),
        (None, Some(project)) => ApprovalSubject::Project(project),
        (None, None) => ApprovalSubject::Missing,
    };
    let requester = ctx.store().users.get(approval.requester_id).await?;

    let mut text = format_approval(&approval, subject, requester.as_ref());
    let keyboard = if approval.status == ApprovalStatus::Pending {
        Keyboard::column([
            Button::new("✅ Approve", format!("approve_action:{}", approval.id)),
            Button::new("❌ Reject", format!("reject_action:{}", approval.id)),
            back_button(QUEUE_TOKEN),
        ])
    } else {
        if let Some(at) = approval.responded_at {
            text.push_str(&format!("\n<b>Decided:</b> {}\n", format_datetime(at)));
        }
        if !approval.response_message.is_empty() {
            text.push_str(&format!("<b>Notes:</b> {}\n", escape_html(&approval.response_message)));
        }
        Keyboard::column([back_button(QUEUE_TOKEN)])
    };
    Ok(ctx.screen(text, keyboard))
}

// ─── Decisions ───

async fn approve_action(ctx: HandlerContext) -> AppResult<Reply> {
    let approval_id = ctx.args.id(0)?;
    decide(&ctx, approval_id, ApprovalStatus::Approved).await
}

async fn reject_action(ctx: HandlerContext) -> AppResult<Reply> {
    let approval_id = ctx.args.id(0)?;
    decide(&ctx, approval_id, ApprovalStatus::Rejected).await
}

/// `/approve 12` decides directly; without an id it shows the queue.
async fn approve_command(ctx: HandlerContext) -> AppResult<Reply> {
    match ctx.command_args().trim().parse::<i64>() {
        Ok(approval_id) => decide(&ctx, approval_id, ApprovalStatus::Approved).await,
        Err(_) => list_approvals(ctx).await,
    }
}

async fn reject_command(ctx: HandlerContext) -> AppResult<Reply> {
    match ctx.command_args().trim().parse::<i64>() {
        Ok(approval_id) => decide(&ctx, approval_id, ApprovalStatus::Rejected).await,
        Err(_) => list_approvals(ctx).await,
    }
}

/// Records the decision and tells the requester about it.
///
/// Only a pending request can be decided; the check and the write happen
/// in the same store transaction, so concurrent deciders can't both win.
async fn decide(ctx: &HandlerContext, approval_id: i64, decision: ApprovalStatus) -> AppResult<Reply> {
    let back = Keyboard::column([back_button(QUEUE_TOKEN)]);

    let Some((approval, decided)) = ctx
        .store()
        .approvals
        .update_with(approval_id, move |a| {
            let pending = a.status == ApprovalStatus::Pending;
            if pending {
                a.respond(decision, Utc::now());
            }
            pending
        })
        .await?
    else {
        return Ok(approval_not_found(ctx));
    };

    if !decided {
        let text = format!(
            "{} This request was already {}.",
            emoji::INFO,
            approval.status.label().to_lowercase()
        );
        return Ok(ctx.screen(text, back));
    }
    log::info!("Approval {} marked {}", approval.id, approval.status);

    if let Some(requester) = ctx.store().users.get(approval.requester_id).await? {
        let mut alert = Alert::new(
            requester.id,
            AlertType::ApprovalResponse,
            format!("Approval {}", approval.status.label().to_lowercase()),
            format!(
                "Your {} request was {}.",
                type_title(approval.approval_type).to_lowercase(),
                approval.status.label().to_lowercase()
            ),
        );
        alert.task_id = approval.task_id;
        alert.project_id = approval.project_id;
        notify(ctx.store(), &requester, NotificationKind::Approval, alert).await?;
    }

    let text = match decision {
        ApprovalStatus::Approved => format!(
            "{} <b>Approved!</b>\n\nThe approval request has been approved.",
            emoji::SUCCESS
        ),
        _ => format!(
            "{} <b>Rejected</b>\n\nThe approval request has been rejected.",
            emoji::ERROR
        ),
    };
    Ok(ctx.screen(text, back))
}

// ─── Request approval conversation ───

async fn start_request(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let keyboard = Keyboard::column([
        Button::new(format!("{} Task Approval", emoji::TASK), "approval_type:task"),
        Button::new(format!("{} Project Approval", emoji::PROJECT), "approval_type:project"),
        cancel_button(CANCEL_TOKEN),
    ]);
    Ok(Transition::next(KIND, fields, ctx.screen(KIND_PROMPT, keyboard)))
}

/// Offers the user's finished tasks, or every project. Nothing to offer ends the dialog.
async fn kind_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    let kind: ApprovalType = ctx.args.parse(0)?;

    let (prompt, buttons): (&str, Vec<Button>) = match kind {
        ApprovalType::Task => {
            let user = ctx.current_user().await?;
            let user_id = user.id;
            let tasks = ctx
                .store()
                .tasks
                .filter(move |t| {
                    t.assignee_id == Some(user_id) && matches!(t.status, TaskStatus::Done | TaskStatus::Review)
                })
                .await?;
            if tasks.is_empty() {
                return Ok(Transition::done(ctx.screen(
                    "You don't have any completed or in-review tasks to request approval for.",
                    Keyboard::default(),
                )));
            }
            let buttons = tasks
                .iter()
                .take(MAX_CHOICE_BUTTONS)
                .map(|t| {
                    Button::new(
                        format!("{} ({})", truncate(&t.title, BUTTON_TITLE_LIMIT), t.status.label()),
                        format!("approval_item:task:{}", t.id),
                    )
                })
                .collect();
            ("Select task for approval:", buttons)
        }
        _ => {
            let projects = ctx.store().projects.all().await?;
            if projects.is_empty() {
                return Ok(Transition::done(ctx.screen("No projects available.", Keyboard::default())));
            }
            let buttons = projects
                .iter()
                .take(MAX_CHOICE_BUTTONS)
                .map(|p| {
                    Button::new(
                        truncate(&p.name, BUTTON_TITLE_LIMIT),
                        format!("approval_item:project:{}", p.id),
                    )
                })
                .collect();
            ("Select project for approval:", buttons)
        }
    };

    fields.set(KIND, kind.to_string());
    let keyboard = build_menu(buttons, 1, None, Some(cancel_button(CANCEL_TOKEN)));
    Ok(Transition::next(ITEM, fields, ctx.screen(prompt, keyboard)))
}

async fn item_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    let item_id = ctx.args.id(1)?;
    fields.set(ITEM, item_id.to_string());
    Ok(Transition::next(REASON, fields, ctx.screen(REASON_PROMPT, Keyboard::default())))
}

/// Creates the request; the approver is the owner of the project involved,
/// or the requester when there is none.
async fn reason_received(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let user = ctx.current_user().await?;
    let kind: ApprovalType = fields.require_parsed(KIND)?;
    let item_id = fields.require_i64(ITEM)?;

    let mut approval = Approval {
        id: 0,
        approval_type: kind,
        status: ApprovalStatus::Pending,
        requester_id: user.id,
        approver_id: user.id,
        task_id: None,
        project_id: None,
        reason: text_input(&ctx).unwrap_or_default(),
        response_message: String::new(),
        created_at: Utc::now(),
        responded_at: None,
    };

    let project_id = match kind {
        ApprovalType::Task => {
            approval.task_id = Some(item_id);
            ctx.store().tasks.get(item_id).await?.map(|t| t.project_id)
        }
        _ => {
            approval.project_id = Some(item_id);
            Some(item_id)
        }
    };
    if let Some(project_id) = project_id {
        if let Some(project) = ctx.store().projects.get(project_id).await? {
            approval.approver_id = project.owner_id;
        }
    }

    let approval = ctx.store().approvals.create(approval).await?;
    log::info!(
        "Approval {} requested by user {} from user {}",
        approval.id,
        approval.requester_id,
        approval.approver_id
    );

    if let Some(approver) = ctx.store().users.get(approval.approver_id).await? {
        let mut alert = Alert::new(
            approver.id,
            AlertType::ApprovalRequired,
            "Approval required",
            format!(
                "{} requested a {} approval.",
                user.display_name(),
                type_title(approval.approval_type).to_lowercase()
            ),
        );
        alert.task_id = approval.task_id;
        alert.project_id = approval.project_id;
        notify(ctx.store(), &approver, NotificationKind::Approval, alert).await?;
    }

    let text = format!(
        "{} Approval request submitted!\n\nType: {}\nThe approver will be notified.",
        emoji::SUCCESS,
        approval.approval_type.label()
    );
    Ok(Transition::done(ctx.screen(text, Keyboard::column([back_button(QUEUE_TOKEN)]))))
}

async fn request_cancelled(_ctx: HandlerContext) -> AppResult<Reply> {
    Ok(cancelled("Approval request cancelled."))
}
