//! Tasks app: task lists, task cards, status changes, self-assignment and
//! the create-task conversation.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;

use crate::apps::{cancelled, menu_button, notify, parse_datetime_input};
use crate::bot::context::HandlerContext;
use crate::bot::conversation::{text_input, Flow, Transition, CANCEL_COMMAND};
use crate::bot::event::Reply;
use crate::bot::format::{emoji, escape_html, format_datetime, format_task, task_priority_emoji, task_status_emoji, truncate};
use crate::bot::keyboard::{back_button, build_menu, cancel_button, pagination_row, tokens, Button, Keyboard};
use crate::bot::pagination::paginate;
use crate::bot::registry::{AppMeta, BotApp, Registration};
use crate::bot::router::RouterBuilder;
use crate::bot::session::FlowFields;
use crate::core::config::format::BUTTON_TITLE_LIMIT;
use crate::core::config::pagination::{LIST_PAGE_SIZE, MAX_CHOICE_BUTTONS};
use crate::core::error::AppResult;
use crate::storage::models::{Alert, AlertType, NotificationKind, Task, TaskPriority, TaskStatus};

const FLOW_ID: &str = "create_task";

const PROJECT: &str = "project";
const TITLE: &str = "title";
const DESCRIPTION: &str = "description";
const PRIORITY: &str = "priority";
const DEADLINE: &str = "deadline";

const PROJECT_PROMPT: &str = "📝 <b>Create New Task</b>\n\nSelect a project:";
const TITLE_PROMPT: &str = "📝 <b>Create New Task</b>\n\nEnter task title:";
const DESCRIPTION_PROMPT: &str = "Enter task description (or /skip):";
const PRIORITY_PROMPT: &str = "Select task priority:";
const DEADLINE_PROMPT: &str = "Enter deadline (YYYY-MM-DD HH:MM) or /skip:";
const INVALID_DATE: &str = "❌ Invalid date format. Please use YYYY-MM-DD HH:MM\nExample: 2024-12-25 14:30";

const ALL_TASKS_TOKEN: &str = "list_tasks_all:0";

pub struct TasksApp;

impl BotApp for TasksApp {
    fn meta(&self) -> AppMeta {
        AppMeta {
            name: "Tasks",
            emoji: "📝",
            description: "Task management and tracking",
            order: 2,
        }
    }

    fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
        router.flow(
            Flow::new(FLOW_ID)
                .entry_command("createtask", start_from_command)
                .entry_callback(r"^create_task:\d+$", start_from_project)
                .callback_state(PROJECT, r"^task_project:\d+$", PROJECT_PROMPT, project_received)
                .text_state(TITLE, TITLE_PROMPT, title_received)
                .skippable_text_state(DESCRIPTION, DESCRIPTION_PROMPT, description_received)
                .callback_state(
                    PRIORITY,
                    "^task_priority:(LOW|MEDIUM|HIGH|URGENT)$",
                    PRIORITY_PROMPT,
                    priority_received,
                )
                .skippable_text_state(DEADLINE, DEADLINE_PROMPT, deadline_received)
                .fallback_command(CANCEL_COMMAND, creation_cancelled)
                .fallback_callback("^cancel$", creation_cancelled),
        )?;

        router.command("tasks", list_all)?;
        router.command("mytasks", list_mine)?;
        router.callback(r"^(list_tasks|list_tasks_all)(:\d+)?$", list_all)?;
        router.callback(r"^(my_tasks|list_tasks_my)(:\d+)?$", list_mine)?;
        router.callback(r"^project_tasks:\d+(:\d+)?$", list_project)?;
        router.callback(r"^task:\d+$", task_detail)?;
        router.callback("^task_status:", update_status)?;
        router.callback("^assign_task:", assign_to_me)?;
        Ok(Registration::Registered)
    }

    fn menu_entries(&self) -> Vec<Button> {
        vec![menu_button(self.meta(), "list_tasks")]
    }

    fn help_text(&self) -> Option<String> {
        Some(
            "<b>📝 Task Management:</b>\n\
             /tasks - List all tasks\n\
             /mytasks - Your assigned tasks\n\
             /createtask - Create new task"
                .to_string(),
        )
    }
}

// ─── Listing ───

#[derive(Debug, Clone, Copy)]
enum Scope {
    All,
    Mine,
    Project(i64),
}

async fn list_all(ctx: HandlerContext) -> AppResult<Reply> {
    let page = ctx.args.page(0)?;
    list_tasks(ctx, Scope::All, page).await
}

async fn list_mine(ctx: HandlerContext) -> AppResult<Reply> {
    let page = ctx.args.page(0)?;
    list_tasks(ctx, Scope::Mine, page).await
}

async fn list_project(ctx: HandlerContext) -> AppResult<Reply> {
    let project_id = ctx.args.id(0)?;
    let page = ctx.args.page(1)?;
    list_tasks(ctx, Scope::Project(project_id), page).await
}

async fn list_tasks(ctx: HandlerContext, scope: Scope, page: usize) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let user_id = user.id;

    let mut tasks = match scope {
        Scope::All => ctx.store().tasks.all().await?,
        Scope::Mine => ctx.store().tasks.filter(move |t| t.assignee_id == Some(user_id)).await?,
        Scope::Project(project_id) => ctx.store().project_tasks(project_id).await?,
    };

    if tasks.is_empty() {
        let text = format!("{} No tasks found.", emoji::INFO);
        let mut keyboard = Keyboard::default();
        if let Scope::Project(project_id) = scope {
            keyboard = keyboard
                .button(Button::new("➕ Add Task", format!("create_task:{}", project_id)))
                .button(back_button(&format!("project:{}", project_id)));
        } else {
            keyboard = keyboard.button(back_button(tokens::MENU));
        }
        return Ok(ctx.screen(text, keyboard));
    }

    sort_by_urgency(&mut tasks);

    let now = Utc::now();
    let page = paginate(tasks, page, LIST_PAGE_SIZE);
    let text = format!(
        "{} <b>Tasks</b>\nShowing {} of {} tasks\n\n",
        emoji::TASK,
        page.items.len(),
        page.total_items
    );

    let buttons = page.items.iter().map(|task| task_button(task, now)).collect();
    let mut keyboard = build_menu(buttons, 1, None, None);

    if page.total_pages > 1 {
        let prefix = match scope {
            Scope::All => "list_tasks_all".to_string(),
            Scope::Mine => "list_tasks_my".to_string(),
            Scope::Project(project_id) => format!("project_tasks:{}", project_id),
        };
        keyboard = keyboard.row(pagination_row(page.current_page, page.total_pages, &prefix));
    }

    let keyboard = match scope {
        Scope::Project(project_id) => keyboard
            .button(Button::new("➕ Add Task", format!("create_task:{}", project_id)))
            .button(back_button(&format!("project:{}", project_id))),
        Scope::All | Scope::Mine => keyboard
            .row(vec![
                Button::new("📋 All", ALL_TASKS_TOKEN),
                Button::new(format!("{} My Tasks", emoji::USER), "list_tasks_my:0"),
            ])
            .button(back_button(tokens::MENU)),
    };

    Ok(ctx.screen(text, keyboard))
}

/// Urgent first, then high, then everything else; earliest deadline first
/// within each band, tasks without a deadline last.
fn sort_by_urgency(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| {
        (
            t.priority != TaskPriority::Urgent,
            t.priority != TaskPriority::High,
            t.deadline.is_none(),
            t.deadline,
            Reverse(t.created_at),
        )
    });
}

fn task_button(task: &Task, now: DateTime<Utc>) -> Button {
    let mut label = format!(
        "{}{} {}",
        task_status_emoji(task.status),
        task_priority_emoji(task.priority),
        truncate(&task.title, BUTTON_TITLE_LIMIT)
    );
    if task.is_overdue(now) {
        label.push(' ');
        label.push_str(emoji::WARNING);
    }
    Button::new(label, format!("task:{}", task.id))
}

// ─── Task card ───

async fn task_detail(ctx: HandlerContext) -> AppResult<Reply> {
    let task_id = ctx.args.id(0)?;
    match ctx.store().tasks.get(task_id).await? {
        Some(task) => task_screen(&ctx, &task).await,
        None => Ok(task_not_found(&ctx)),
    }
}

fn task_not_found(ctx: &HandlerContext) -> Reply {
    ctx.screen("Task not found.", Keyboard::column([back_button(ALL_TASKS_TOKEN)]))
}

async fn task_screen(ctx: &HandlerContext, task: &Task) -> AppResult<Reply> {
    let assignee = match task.assignee_id {
        Some(id) => ctx.store().users.get(id).await?,
        None => None,
    };
    let project = ctx.store().projects.get(task.project_id).await?;

    let mut text = format_task(task, assignee.as_ref(), Utc::now());
    if let Some(project) = project {
        text.push_str(&format!("\n\n<b>Project:</b> {}\n", escape_html(&project.name)));
    } else {
        text.push_str("\n\n");
    }
    text.push_str(&format!("<b>Status:</b> {}\n", task.status.label()));
    text.push_str(&format!("<b>Created:</b> {}\n", format_datetime(task.created_at)));
    if let Some(hours) = task.estimated_hours {
        text.push_str(&format!("<b>Estimated:</b> {}h\n", hours));
    }
    if let Some(hours) = task.actual_hours {
        text.push_str(&format!("<b>Actual:</b> {}h\n", hours));
    }

    let status_button = |label: &str, status: TaskStatus| {
        Button::new(
            format!("{} {}", task_status_emoji(status), label),
            format!("task_status:{}:{}", task.id, status),
        )
    };
    let keyboard = Keyboard::default()
        .row(vec![
            status_button("Done", TaskStatus::Done),
            status_button("In Progress", TaskStatus::InProgress),
        ])
        .row(vec![
            status_button("Review", TaskStatus::Review),
            status_button("Blocked", TaskStatus::Blocked),
        ])
        .button(Button::new(format!("{} Assign to me", emoji::USER), format!("assign_task:{}", task.id)))
        .button(back_button(ALL_TASKS_TOKEN));

    Ok(ctx.screen(text, keyboard))
}

async fn update_status(ctx: HandlerContext) -> AppResult<Reply> {
    let task_id = ctx.args.id(0)?;
    let status: TaskStatus = ctx.args.parse(1)?;

    let updated = ctx
        .store()
        .tasks
        .update(task_id, move |task| task.set_status(status, Utc::now()))
        .await?;

    match updated {
        Some(task) => {
            log::info!("Task {} moved to {}", task.id, task.status);
            let notice = format!("Task status updated to {}!", task.status.label());
            Ok(task_screen(&ctx, &task).await?.with_notice(notice))
        }
        None => Ok(ctx.screen(
            "Failed to update task status.",
            Keyboard::column([back_button(ALL_TASKS_TOKEN)]),
        )),
    }
}

/// Assigns the task to whoever pressed the button.
async fn assign_to_me(ctx: HandlerContext) -> AppResult<Reply> {
    let task_id = ctx.args.id(0)?;
    let user = ctx.current_user().await?;
    let user_id = user.id;

    let Some(task) = ctx
        .store()
        .tasks
        .update(task_id, move |task| {
            task.assignee_id = Some(user_id);
            task.updated_at = Utc::now();
        })
        .await?
    else {
        return Ok(task_not_found(&ctx));
    };

    let mut alert = Alert::new(
        user.id,
        AlertType::TaskAssigned,
        "Task assigned",
        format!("You were assigned to \"{}\".", task.title),
    );
    alert.task_id = Some(task.id);
    alert.project_id = Some(task.project_id);
    notify(ctx.store(), &user, NotificationKind::TaskAssigned, alert).await?;

    Ok(task_screen(&ctx, &task).await?.with_notice("Task assigned to you"))
}

// ─── Create task conversation ───

async fn start_from_command(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let projects = ctx.store().projects.all().await?;
    if projects.is_empty() {
        let text = format!(
            "{} No projects found.\n\nCreate your first project with /createproject",
            emoji::INFO
        );
        return Ok(Transition::done(ctx.screen(text, Keyboard::default())));
    }

    let buttons = projects
        .iter()
        .take(MAX_CHOICE_BUTTONS)
        .map(|p| Button::new(truncate(&p.name, BUTTON_TITLE_LIMIT), format!("task_project:{}", p.id)))
        .collect();
    let keyboard = build_menu(buttons, 1, None, Some(cancel_button(tokens::CANCEL)));
    Ok(Transition::next(PROJECT, fields, ctx.screen(PROJECT_PROMPT, keyboard)))
}

async fn start_from_project(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    choose_project(ctx, fields).await
}

async fn project_received(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    choose_project(ctx, fields).await
}

/// Both `create_task:{id}` and `task_project:{id}` carry the project id first.
async fn choose_project(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    let project_id = ctx.args.id(0)?;
    if ctx.store().projects.get(project_id).await?.is_none() {
        return Ok(Transition::done(ctx.screen("Project not found.", Keyboard::default())));
    }

    fields.set(PROJECT, project_id.to_string());
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

async fn description_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    fields.set(DESCRIPTION, text_input(&ctx).unwrap_or_default());

    let buttons = [
        ("🟢 Low", TaskPriority::Low),
        ("🟡 Medium", TaskPriority::Medium),
        ("🔴 High", TaskPriority::High),
        ("🚨 Urgent", TaskPriority::Urgent),
    ]
    .into_iter()
    .map(|(label, priority)| Button::new(label, format!("task_priority:{}", priority)))
    .collect();
    let keyboard = build_menu(buttons, 2, None, Some(cancel_button(tokens::CANCEL)));
    Ok(Transition::next(PRIORITY, fields, ctx.screen(PRIORITY_PROMPT, keyboard)))
}

async fn priority_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    let priority: TaskPriority = ctx.args.parse(0)?;
    fields.set(PRIORITY, priority.to_string());
    Ok(Transition::next(DEADLINE, fields, ctx.screen(DEADLINE_PROMPT, Keyboard::default())))
}

async fn deadline_received(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let input = text_input(&ctx).unwrap_or_default();
    let deadline = if input.is_empty() {
        None
    } else {
        match parse_datetime_input(&input) {
            Some(deadline) => Some(deadline),
            None => return Ok(Transition::stay(fields, Reply::plain(INVALID_DATE))),
        }
    };

    let user = ctx.current_user().await?;
    let mut task = Task::new(fields.require_i64(PROJECT)?, fields.require(TITLE)?, user.id);
    task.description = fields.text(DESCRIPTION);
    task.priority = fields.require_parsed(PRIORITY)?;
    task.deadline = deadline;

    let task = ctx.store().tasks.create(task).await?;
    log::info!("Task {} created in project {} by user {}", task.id, task.project_id, user.id);

    let text = format!(
        "{} Task created successfully!\n\n{}",
        emoji::SUCCESS,
        format_task(&task, None, Utc::now())
    );
    let keyboard = Keyboard::column([
        Button::new("View Task", format!("task:{}", task.id)),
        back_button(ALL_TASKS_TOKEN),
    ]);
    Ok(Transition::done(ctx.screen(text, keyboard)))
}

async fn creation_cancelled(_ctx: HandlerContext) -> AppResult<Reply> {
    Ok(cancelled("Task creation cancelled."))
}
