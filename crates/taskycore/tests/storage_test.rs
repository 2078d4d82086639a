//! Integration tests for the repository facade
//!
//! Run with: cargo test -p taskycore --test storage_test

use chrono::Utc;
use pretty_assertions::assert_eq;
use taskycore::storage::models::{Project, ProjectPriority, Task, TaskStatus, User};
use taskycore::Store;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Store {
    let path = dir.path().join("storage-test.sqlite");
    Store::open(path.to_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_create_assigns_increasing_ids() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let first = store.users.create(User::new(1, "Ada")).await.unwrap();
    let second = store.users.create(User::new(2, "Grace")).await.unwrap();

    assert!(first.id > 0);
    assert!(second.id > first.id);
    assert_eq!(store.users.get(first.id).await.unwrap().unwrap().first_name, "Ada");
    assert!(store.users.get(999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_filter_keeps_id_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    for (project_id, title) in [(1, "a"), (2, "b"), (1, "c"), (1, "d")] {
        store.tasks.create(Task::new(project_id, title, 1)).await.unwrap();
    }

    let titles: Vec<String> = store
        .project_tasks(1)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["a", "c", "d"]);

    let first = store.tasks.find(|t| t.project_id == 1).await.unwrap().unwrap();
    assert_eq!(first.title, "a");
    assert!(store.tasks.find(|t| t.project_id == 9).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_applies_mutation() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let task = store.tasks.create(Task::new(1, "Ship", 1)).await.unwrap();

    let now = Utc::now();
    let updated = store
        .tasks
        .update(task.id, move |t| t.set_status(TaskStatus::Done, now))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Done);
    assert_eq!(updated.completed_at, Some(now));

    let stored = store.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored, updated);

    assert!(store.tasks.update(999, |t| t.title.clear()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_with_returns_closure_result() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let task = store.tasks.create(Task::new(1, "Ship", 1)).await.unwrap();

    let close_if_open = |t: &mut Task| {
        let was_open = !t.status.is_closed();
        if was_open {
            t.status = TaskStatus::Cancelled;
        }
        was_open
    };

    let (first, changed) = store.tasks.update_with(task.id, close_if_open).await.unwrap().unwrap();
    assert!(changed);
    assert_eq!(first.status, TaskStatus::Cancelled);

    let (_, changed) = store.tasks.update_with(task.id, close_if_open).await.unwrap().unwrap();
    assert!(!changed);

    assert!(store.tasks.update_with(999, close_if_open).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_and_count() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let alpha = store
        .projects
        .create(Project::new("Alpha", "", ProjectPriority::Low, 1))
        .await
        .unwrap();
    store
        .projects
        .create(Project::new("Beta", "", ProjectPriority::High, 1))
        .await
        .unwrap();

    assert_eq!(store.projects.count_all().await.unwrap(), 2);
    assert_eq!(
        store.projects.count(|p| p.priority == ProjectPriority::High).await.unwrap(),
        1
    );

    assert!(store.projects.delete(alpha.id).await.unwrap());
    assert!(!store.projects.delete(alpha.id).await.unwrap());
    assert_eq!(store.projects.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn test_find_or_create_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let (user, created) = store
        .users
        .find_or_create(|u| u.telegram_id == 42, || User::new(42, "Ada"))
        .await
        .unwrap();
    assert!(created);

    let (again, created) = store
        .users
        .find_or_create(|u| u.telegram_id == 42, || User::new(42, "Someone else"))
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(again.id, user.id);
    assert_eq!(again.first_name, "Ada");
    assert_eq!(store.user_by_telegram_id(42).await.unwrap().map(|u| u.id), Some(user.id));
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir);
        store
            .projects
            .create(Project::new("Persistent", "kept", ProjectPriority::Medium, 1))
            .await
            .unwrap();
    }

    let store = open_store(&dir);
    let projects = store.projects.all().await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].description, "kept");
}

#[tokio::test]
async fn test_project_progress() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let project = store
        .projects
        .create(Project::new("Alpha", "", ProjectPriority::Low, 1))
        .await
        .unwrap();

    assert_eq!(store.project_progress(project.id).await.unwrap(), 0);

    let now = Utc::now();
    for i in 0..4 {
        let mut task = Task::new(project.id, format!("t{}", i), 1);
        if i < 3 {
            task.set_status(TaskStatus::Done, now);
        }
        store.tasks.create(task).await.unwrap();
    }
    assert_eq!(store.project_progress(project.id).await.unwrap(), 75);
}
