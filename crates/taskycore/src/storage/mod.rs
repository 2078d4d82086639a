//! Storage layer: SQLite pool, embedded migrations, entity models and the
//! generic repository facade.

pub mod db;
pub mod migrations;
pub mod models;
pub mod repository;

pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use repository::{Entity, Repository};

use models::{Alert, Approval, Meeting, MeetingVote, Project, Reminder, Task, User};

use crate::core::error::AppResult;

/// One repository per collection, all sharing a pool.
#[derive(Clone)]
pub struct Store {
    pub users: Repository<User>,
    pub projects: Repository<Project>,
    pub tasks: Repository<Task>,
    pub meetings: Repository<Meeting>,
    pub votes: Repository<MeetingVote>,
    pub approvals: Repository<Approval>,
    pub alerts: Repository<Alert>,
    pub reminders: Repository<Reminder>,
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: Repository::new(pool.clone()),
            projects: Repository::new(pool.clone()),
            tasks: Repository::new(pool.clone()),
            meetings: Repository::new(pool.clone()),
            votes: Repository::new(pool.clone()),
            approvals: Repository::new(pool.clone()),
            alerts: Repository::new(pool.clone()),
            reminders: Repository::new(pool),
        }
    }

    /// Opens (and migrates) the database file at `path`
    pub fn open(path: &str) -> AppResult<Self> {
        Ok(Self::new(create_pool(path)?))
    }

    pub async fn user_by_telegram_id(&self, telegram_id: i64) -> AppResult<Option<User>> {
        self.users.find(move |u| u.telegram_id == telegram_id).await
    }

    /// Tasks of one project, ordered by id
    pub async fn project_tasks(&self, project_id: i64) -> AppResult<Vec<Task>> {
        self.tasks.filter(move |t| t.project_id == project_id).await
    }

    /// Completed-task percentage, recomputed from the task collection
    pub async fn project_progress(&self, project_id: i64) -> AppResult<u32> {
        Ok(models::progress_percent(&self.project_tasks(project_id).await?))
    }
}
