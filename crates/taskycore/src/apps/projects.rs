//! Projects app: listing, details and the create-project conversation.

use std::collections::HashMap;

use crate::apps::{cancelled, menu_button};
use crate::bot::context::HandlerContext;
use crate::bot::conversation::{text_input, Flow, Transition, CANCEL_COMMAND};
use crate::bot::event::Reply;
use crate::bot::format::{emoji, format_project, project_status_emoji, truncate};
use crate::bot::keyboard::{back_button, build_menu, cancel_button, pagination_row, tokens, Button, Keyboard};
use crate::bot::pagination::paginate;
use crate::bot::registry::{AppMeta, BotApp, Registration};
use crate::bot::router::RouterBuilder;
use crate::bot::session::FlowFields;
use crate::core::config::format::BUTTON_TITLE_LIMIT;
use crate::core::config::pagination::LIST_PAGE_SIZE;
use crate::core::error::AppResult;
use crate::storage::models::{progress_percent, Project, ProjectPriority, Task, TaskStatus};

const FLOW_ID: &str = "create_project";

const NAME: &str = "name";
const DESCRIPTION: &str = "description";
const PRIORITY: &str = "priority";

const NAME_PROMPT: &str = "📁 <b>Create New Project</b>\n\nPlease enter the project name:";
const DESCRIPTION_PROMPT: &str = "ℹ️ Great! Now enter a description for the project (or /skip):";
const PRIORITY_PROMPT: &str = "ℹ️ Select project priority:";

pub struct ProjectsApp;

impl BotApp for ProjectsApp {
    fn meta(&self) -> AppMeta {
        AppMeta {
            name: "Projects",
            emoji: "📁",
            description: "Project management and tracking",
            order: 1,
        }
    }

    fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
        router.flow(
            Flow::new(FLOW_ID)
                .entry_command("createproject", start_creation)
                .entry_callback("^create_project$", start_creation)
                .text_state(NAME, NAME_PROMPT, name_received)
                .skippable_text_state(DESCRIPTION, DESCRIPTION_PROMPT, description_received)
                .callback_state(
                    PRIORITY,
                    "^priority:(LOW|MEDIUM|HIGH|CRITICAL)$",
                    PRIORITY_PROMPT,
                    priority_received,
                )
                .fallback_command(CANCEL_COMMAND, creation_cancelled)
                .fallback_callback("^cancel$", creation_cancelled),
        )?;

        router.command("projects", list_all)?;
        router.command("myprojects", list_mine)?;
        router.callback(r"^list_projects(:\d+)?$", list_all)?;
        router.callback(r"^my_projects(:\d+)?$", list_mine)?;
        router.callback(r"^project:\d+$", project_detail)?;
        Ok(Registration::Registered)
    }

    fn menu_entries(&self) -> Vec<Button> {
        vec![menu_button(self.meta(), "list_projects")]
    }

    fn help_text(&self) -> Option<String> {
        Some(
            "<b>📁 Project Management:</b>\n\
             /projects - List all projects\n\
             /myprojects - Your projects\n\
             /createproject - Create new project"
                .to_string(),
        )
    }
}

// ─── Listing ───

async fn list_all(ctx: HandlerContext) -> AppResult<Reply> {
    list_projects(ctx, false).await
}

async fn list_mine(ctx: HandlerContext) -> AppResult<Reply> {
    list_projects(ctx, true).await
}

async fn list_projects(ctx: HandlerContext, mine: bool) -> AppResult<Reply> {
    let user = ctx.current_user().await?;
    let page = ctx.args.page(0)?;

    let projects = if mine {
        let user_id = user.id;
        ctx.store().projects.filter(move |p| p.involves(user_id)).await?
    } else {
        ctx.store().projects.all().await?
    };

    if projects.is_empty() {
        let text = format!(
            "{} No projects found.\n\nCreate your first project with /createproject",
            emoji::INFO
        );
        let keyboard = Keyboard::column([create_button(), back_button(tokens::MENU)]);
        return Ok(ctx.screen(text, keyboard));
    }

    let tasks = ctx.store().tasks.all().await?;
    let by_project = group_by_project(tasks);

    let page = paginate(projects, page, LIST_PAGE_SIZE);
    let text = format!(
        "{} <b>Projects</b>\nShowing {} of {} projects\n\n",
        emoji::PROJECT,
        page.items.len(),
        page.total_items
    );

    let buttons = page
        .items
        .iter()
        .map(|project| {
            let progress = progress_percent(by_project.get(&project.id).map(Vec::as_slice).unwrap_or_default());
            project_button(project, progress)
        })
        .collect();

    let mut keyboard = build_menu(buttons, 1, None, None);
    if page.total_pages > 1 {
        let prefix = if mine { "my_projects" } else { "list_projects" };
        keyboard = keyboard.row(pagination_row(page.current_page, page.total_pages, prefix));
    }
    let keyboard = keyboard.button(create_button()).button(back_button(tokens::MENU));

    Ok(ctx.screen(text, keyboard))
}

fn group_by_project(tasks: Vec<Task>) -> HashMap<i64, Vec<Task>> {
    let mut grouped: HashMap<i64, Vec<Task>> = HashMap::new();
    for task in tasks {
        grouped.entry(task.project_id).or_default().push(task);
    }
    grouped
}

fn project_button(project: &Project, progress: u32) -> Button {
    Button::new(
        format!(
            "{} {} ({}%)",
            project_status_emoji(project.status),
            truncate(&project.name, BUTTON_TITLE_LIMIT),
            progress
        ),
        format!("project:{}", project.id),
    )
}

fn create_button() -> Button {
    Button::new("➕ Create Project", "create_project")
}

async fn project_detail(ctx: HandlerContext) -> AppResult<Reply> {
    let project_id = ctx.args.id(0)?;
    let Some(project) = ctx.store().projects.get(project_id).await? else {
        return Ok(ctx.screen("Project not found.", Keyboard::column([back_button("list_projects")])));
    };

    let tasks = ctx.store().project_tasks(project_id).await?;
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

    let mut text = format_project(&project, Some(progress_percent(&tasks)));
    text.push_str(&format!("\n\n{} <b>Statistics:</b>\n", emoji::CHART));
    text.push_str(&format!("Total Tasks: {}\n", tasks.len()));
    text.push_str(&format!("{} Done: {}\n", emoji::DONE, count(TaskStatus::Done)));
    text.push_str(&format!("{} In Progress: {}\n", emoji::IN_PROGRESS, count(TaskStatus::InProgress)));
    text.push_str(&format!("{} To Do: {}\n", emoji::TODO, count(TaskStatus::Todo)));

    let keyboard = Keyboard::column([
        Button::new(format!("{} View Tasks", emoji::TASK), format!("project_tasks:{}", project_id)),
        Button::new("➕ Add Task", format!("create_task:{}", project_id)),
        back_button("list_projects"),
    ]);
    Ok(ctx.screen(text, keyboard))
}

// ─── Create project conversation ───

async fn start_creation(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let reply = ctx.screen(NAME_PROMPT, Keyboard::column([cancel_button(tokens::CANCEL)]));
    Ok(Transition::next(NAME, fields, reply))
}

async fn name_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    let name = text_input(&ctx).unwrap_or_default();
    if name.trim().is_empty() {
        return Ok(Transition::stay(fields, Reply::html(NAME_PROMPT)));
    }
    fields.set(NAME, name);
    Ok(Transition::next(DESCRIPTION, fields, Reply::html(DESCRIPTION_PROMPT)))
}

async fn description_received(ctx: HandlerContext, mut fields: FlowFields) -> AppResult<Transition> {
    fields.set(DESCRIPTION, text_input(&ctx).unwrap_or_default());

    let priorities = [
        ("🟢 Low", ProjectPriority::Low),
        ("🟡 Medium", ProjectPriority::Medium),
        ("🔴 High", ProjectPriority::High),
        ("🚨 Critical", ProjectPriority::Critical),
    ]
    .into_iter()
    .map(|(label, priority)| Button::new(label, format!("priority:{}", priority)))
    .collect();
    let keyboard = build_menu(priorities, 2, None, Some(cancel_button(tokens::CANCEL)));

    let reply = ctx.screen(PRIORITY_PROMPT, keyboard);
    Ok(Transition::next(PRIORITY, fields, reply))
}

async fn priority_received(ctx: HandlerContext, fields: FlowFields) -> AppResult<Transition> {
    let priority: ProjectPriority = ctx.args.parse(0)?;
    let user = ctx.current_user().await?;

    let project = ctx
        .store()
        .projects
        .create(Project::new(fields.require(NAME)?, fields.text(DESCRIPTION), priority, user.id))
        .await?;
    log::info!("Project {} created by user {}", project.id, user.id);

    let text = format!(
        "{} Project created successfully!\n\n{}",
        emoji::SUCCESS,
        format_project(&project, Some(0))
    );
    let keyboard = Keyboard::column([
        Button::new(format!("{} Add Task", emoji::TASK), format!("create_task:{}", project.id)),
        Button::new(format!("{} View Project", emoji::PROJECT), format!("project:{}", project.id)),
        back_button("list_projects"),
    ]);
    Ok(Transition::done(ctx.screen(text, keyboard)))
}

async fn creation_cancelled(_ctx: HandlerContext) -> AppResult<Reply> {
    Ok(cancelled("Project creation cancelled."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::ProjectStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_project_button() {
        let mut project = Project::new("A rather long project name that will not fit", "", ProjectPriority::High, 1);
        project.id = 4;
        project.status = ProjectStatus::Active;

        let button = project_button(&project, 40);
        assert_eq!(button.token, "project:4");
        assert_eq!(button.label, "🔄 A rather long project name tha... (40%)");
    }

    #[test]
    fn test_group_by_project() {
        let tasks = vec![Task::new(1, "a", 1), Task::new(2, "b", 1), Task::new(1, "c", 1)];
        let grouped = group_by_project(tasks);
        assert_eq!(grouped[&1].len(), 2);
        assert_eq!(grouped[&2].len(), 1);
    }
}
