//! Integration tests for the guided conversations
//!
//! Run with: cargo test -p taskycore --test flows_test

mod common;

use chrono::{TimeZone, Utc};
use common::{alice, bob, TestBot};
use taskycore::Sender;
use taskycore::storage::models::{AlertType, ApprovalStatus, Project, ProjectPriority, TaskPriority};

/// One user action inside a conversation
enum Input {
    Text(&'static str),
    Press(String),
}

async fn feed(bot: &TestBot, user: &Sender, inputs: &[Input]) {
    for input in inputs {
        match input {
            Input::Text(text) => bot.text(user, text).await,
            Input::Press(token) => bot.press(user, token).await,
        };
    }
}

// ============================================================================
// Create project
// ============================================================================

mod create_project {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_full_flow_with_skipped_description() {
        let bot = TestBot::new();
        let user = alice();

        let reply = bot.text(&user, "/createproject").await;
        assert!(reply.text().contains("Please enter the project name"));
        assert_eq!(bot.session_state(&user).await, Some(("create_project", "name")));

        bot.text(&user, "Alpha").await;
        assert_eq!(bot.session_state(&user).await, Some(("create_project", "description")));

        let reply = bot.text(&user, "/skip").await;
        assert_eq!(reply.text(), "ℹ️ Select project priority:");
        assert_eq!(bot.session_state(&user).await, Some(("create_project", "priority")));

        let reply = bot.press(&user, "priority:HIGH").await;
        assert!(reply.text().starts_with("✨ Project created successfully!"));
        assert_eq!(bot.session_state(&user).await, None);

        let projects = bot.store().projects.all().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Alpha");
        assert_eq!(projects[0].description, "");
        assert_eq!(projects[0].priority, ProjectPriority::High);

        let owner = bot.store().user_by_telegram_id(user.id).await.unwrap().unwrap();
        assert_eq!(projects[0].owner_id, owner.id);
    }

    #[tokio::test]
    async fn test_entry_by_button() {
        let bot = TestBot::new();
        let user = alice();

        bot.press(&user, "create_project").await;
        assert_eq!(bot.session_state(&user).await, Some(("create_project", "name")));
    }

    #[tokio::test]
    async fn test_cancel_from_every_state() {
        let bot = TestBot::new();
        let user = alice();
        let steps: [&[&str]; 3] = [&[], &["Alpha"], &["Alpha", "Some description"]];

        for answers in steps {
            bot.text(&user, "/createproject").await;
            for answer in answers {
                bot.text(&user, answer).await;
            }
            assert!(bot.session_state(&user).await.is_some());

            let reply = bot.text(&user, "/cancel").await;
            assert_eq!(reply.text(), "ℹ️ Project creation cancelled.");
            assert_eq!(bot.session_state(&user).await, None);
        }

        assert_eq!(bot.store().projects.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_button_ends_flow() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/createproject").await;
        bot.text(&user, "Alpha").await;
        bot.text(&user, "desc").await;

        let reply = bot.press(&user, "cancel").await;
        assert_eq!(reply.text(), "ℹ️ Project creation cancelled.");
        assert_eq!(bot.session_state(&user).await, None);
    }

    #[tokio::test]
    async fn test_skip_on_required_field_reprompts() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/createproject").await;
        let reply = bot.text(&user, "/skip").await;

        assert!(reply.text().contains("Please enter the project name"));
        assert!(reply.text().ends_with("<i>Send /cancel to stop.</i>"));
        assert_eq!(bot.session_state(&user).await, Some(("create_project", "name")));
    }

    #[tokio::test]
    async fn test_text_at_button_state_reprompts() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/createproject").await;
        bot.text(&user, "Alpha").await;
        bot.text(&user, "/skip").await;

        let reply = bot.text(&user, "high please").await;
        assert!(reply.text().starts_with("ℹ️ Select project priority:"));
        assert!(reply.text().contains("Pick one of the buttons below"));
        let tokens = reply.keyboard().map(|k| k.tokens()).unwrap_or_default();
        assert!(tokens.contains(&"priority:HIGH"));
        assert_eq!(bot.session_state(&user).await, Some(("create_project", "priority")));
    }

    #[tokio::test]
    async fn test_unrelated_button_keeps_session() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/createproject").await;
        bot.text(&user, "Alpha").await;
        bot.text(&user, "/skip").await;

        let reply = bot.press(&user, "list_projects").await;
        assert!(reply.text().contains("No projects found"));
        assert_eq!(bot.session_state(&user).await, Some(("create_project", "priority")));

        bot.press(&user, "priority:LOW").await;
        assert_eq!(bot.store().projects.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reentry_restarts_flow() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/createproject").await;
        bot.text(&user, "Alpha").await;
        bot.text(&user, "/createproject").await;

        assert_eq!(bot.session_state(&user).await, Some(("create_project", "name")));
    }

    #[tokio::test]
    async fn test_interleaved_users_keep_separate_sessions() {
        let bot = TestBot::new();
        let (a, b) = (alice(), bob());

        bot.text(&a, "/createproject").await;
        bot.text(&b, "/createproject").await;
        bot.text(&a, "Alpha").await;
        bot.text(&b, "Beta").await;
        bot.text(&b, "Beta description").await;
        bot.text(&a, "/skip").await;

        assert_eq!(bot.session_state(&a).await, Some(("create_project", "priority")));
        assert_eq!(bot.session_state(&b).await, Some(("create_project", "priority")));

        bot.press(&b, "priority:LOW").await;
        assert_eq!(bot.session_state(&a).await, Some(("create_project", "priority")));
        bot.press(&a, "priority:CRITICAL").await;

        let projects = bot.store().projects.all().await.unwrap();
        let names: Vec<(&str, &str, ProjectPriority)> = projects
            .iter()
            .map(|p| (p.name.as_str(), p.description.as_str(), p.priority))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Beta", "Beta description", ProjectPriority::Low),
                ("Alpha", "", ProjectPriority::Critical),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_users_do_not_mix_fields() {
        let bot = std::sync::Arc::new(TestBot::new());
        let mut handles = Vec::new();

        for i in 0..8i64 {
            let bot = bot.clone();
            handles.push(tokio::spawn(async move {
                let user = taskycore::Sender::new(500 + i, format!("User {}", i));
                bot.text(&user, "/createproject").await;
                bot.text(&user, &format!("Project {}", i)).await;
                bot.text(&user, &format!("Owned by {}", i)).await;
                bot.press(&user, "priority:MEDIUM").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let projects = bot.store().projects.all().await.unwrap();
        assert_eq!(projects.len(), 8);
        for project in projects {
            let suffix = project.name.trim_start_matches("Project ");
            assert_eq!(project.description, format!("Owned by {}", suffix));
        }
    }
}

// ============================================================================
// Create task
// ============================================================================

mod create_task {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_project(bot: &TestBot) -> i64 {
        bot.store()
            .projects
            .create(Project::new("Alpha", "", ProjectPriority::Medium, 1))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_without_projects_ends_immediately() {
        let bot = TestBot::new();
        let user = alice();

        let reply = bot.text(&user, "/createtask").await;
        assert!(reply.text().contains("No projects found"));
        assert_eq!(bot.session_state(&user).await, None);
    }

    #[tokio::test]
    async fn test_full_flow_with_deadline() {
        let bot = TestBot::new();
        let user = alice();
        let project_id = seed_project(&bot).await;

        bot.text(&user, "/createtask").await;
        assert_eq!(bot.session_state(&user).await, Some(("create_task", "project")));

        bot.press(&user, &format!("task_project:{}", project_id)).await;
        bot.text(&user, "Write docs").await;
        bot.text(&user, "/skip").await;
        bot.press(&user, "task_priority:URGENT").await;
        assert_eq!(bot.session_state(&user).await, Some(("create_task", "deadline")));

        let reply = bot.text(&user, "next tuesday").await;
        assert!(reply.text().starts_with("❌ Invalid date format."));
        assert_eq!(bot.session_state(&user).await, Some(("create_task", "deadline")));

        let reply = bot.text(&user, "2030-01-15 09:00").await;
        assert!(reply.text().starts_with("✨ Task created successfully!"));
        assert_eq!(bot.session_state(&user).await, None);

        let tasks = bot.store().project_tasks(project_id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Write docs");
        assert_eq!(tasks[0].description, "");
        assert_eq!(tasks[0].priority, TaskPriority::Urgent);
        assert_eq!(
            tasks[0].deadline,
            Some(Utc.with_ymd_and_hms(2030, 1, 15, 9, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_text_at_project_choice_offers_projects_again() {
        let bot = TestBot::new();
        let user = alice();
        let project_id = seed_project(&bot).await;

        bot.text(&user, "/createtask").await;
        let reply = bot.text(&user, "Alpha").await;

        let expected = format!("task_project:{}", project_id);
        let tokens = reply.keyboard().map(|k| k.tokens()).unwrap_or_default();
        assert!(tokens.contains(&expected.as_str()));
        assert_eq!(bot.session_state(&user).await, Some(("create_task", "project")));
    }

    #[tokio::test]
    async fn test_entry_from_project_screen_skips_project_choice() {
        let bot = TestBot::new();
        let user = alice();
        let project_id = seed_project(&bot).await;

        bot.press(&user, &format!("create_task:{}", project_id)).await;
        assert_eq!(bot.session_state(&user).await, Some(("create_task", "title")));

        bot.text(&user, "Ship it").await;
        bot.text(&user, "Release build").await;
        bot.press(&user, "task_priority:LOW").await;
        bot.text(&user, "/skip").await;

        let tasks = bot.store().project_tasks(project_id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].deadline, None);
        assert_eq!(tasks[0].description, "Release build");
    }

    #[tokio::test]
    async fn test_cancel() {
        let bot = TestBot::new();
        let user = alice();
        let project_id = seed_project(&bot).await;

        bot.press(&user, &format!("create_task:{}", project_id)).await;
        bot.text(&user, "Ship it").await;
        let reply = bot.text(&user, "/cancel").await;

        assert_eq!(reply.text(), "ℹ️ Task creation cancelled.");
        assert_eq!(bot.session_state(&user).await, None);
        assert_eq!(bot.store().tasks.count_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_from_every_state() {
        let bot = TestBot::new();
        let user = alice();
        let project_id = seed_project(&bot).await;
        let path = [
            Input::Press(format!("task_project:{}", project_id)),
            Input::Text("Write docs"),
            Input::Text("/skip"),
            Input::Press("task_priority:HIGH".to_string()),
        ];
        let states = ["project", "title", "description", "priority", "deadline"];

        for (depth, state) in states.into_iter().enumerate() {
            for by_button in [false, true] {
                bot.text(&user, "/createtask").await;
                feed(&bot, &user, &path[..depth]).await;
                assert_eq!(bot.session_state(&user).await, Some(("create_task", state)));

                let reply = if by_button {
                    bot.press(&user, "cancel").await
                } else {
                    bot.text(&user, "/cancel").await
                };
                assert_eq!(reply.text(), "ℹ️ Task creation cancelled.");
                assert_eq!(bot.session_state(&user).await, None);
            }
        }

        assert_eq!(bot.store().tasks.count_all().await.unwrap(), 0);
    }
}

// ============================================================================
// Schedule meeting
// ============================================================================

mod schedule_meeting {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_without_projects_skips_project_choice() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/schedulemeeting").await;
        bot.text(&user, "Standup").await;
        bot.text(&user, "/skip").await;
        assert_eq!(bot.session_state(&user).await, Some(("schedule_meeting", "time")));

        let reply = bot.text(&user, "soon").await;
        assert!(reply.text().starts_with("❌ Invalid date format."));

        bot.text(&user, "2030-03-01 10:30").await;
        assert_eq!(bot.session_state(&user).await, None);

        let meetings = bot.store().meetings.all().await.unwrap();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].title, "Standup");
        assert_eq!(meetings[0].project_id, None);
        assert_eq!(meetings[0].scheduled_at, Utc.with_ymd_and_hms(2030, 3, 1, 10, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_with_project() {
        let bot = TestBot::new();
        let user = alice();
        let project = bot
            .store()
            .projects
            .create(Project::new("Alpha", "", ProjectPriority::Medium, 1))
            .await
            .unwrap();

        bot.text(&user, "/schedulemeeting").await;
        bot.text(&user, "Planning").await;
        bot.text(&user, "Quarterly planning").await;
        assert_eq!(bot.session_state(&user).await, Some(("schedule_meeting", "project")));

        bot.press(&user, &format!("meeting_project:{}", project.id)).await;
        bot.text(&user, "2030-03-01 10:30").await;

        let meetings = bot.store().meetings.all().await.unwrap();
        assert_eq!(meetings[0].project_id, Some(project.id));
        assert_eq!(meetings[0].description, "Quarterly planning");
    }

    #[tokio::test]
    async fn test_cancel_from_every_state() {
        let bot = TestBot::new();
        let user = alice();
        let project = bot
            .store()
            .projects
            .create(Project::new("Alpha", "", ProjectPriority::Medium, 1))
            .await
            .unwrap();
        let path = [
            Input::Text("Standup"),
            Input::Text("/skip"),
            Input::Press(format!("meeting_project:{}", project.id)),
        ];
        let states = ["title", "description", "project", "time"];

        for (depth, state) in states.into_iter().enumerate() {
            for by_button in [false, true] {
                bot.text(&user, "/schedulemeeting").await;
                feed(&bot, &user, &path[..depth]).await;
                assert_eq!(bot.session_state(&user).await, Some(("schedule_meeting", state)));

                let reply = if by_button {
                    bot.press(&user, "cancel").await
                } else {
                    bot.text(&user, "/cancel").await
                };
                assert_eq!(reply.text(), "ℹ️ Meeting creation cancelled.");
                assert_eq!(bot.session_state(&user).await, None);
            }
        }

        assert_eq!(bot.store().meetings.count_all().await.unwrap(), 0);
    }
}

// ============================================================================
// Request approval
// ============================================================================

mod request_approval {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_project_approval_goes_to_owner() {
        let bot = TestBot::new();
        let (requester, owner) = (alice(), bob());

        bot.text(&owner, "/start").await;
        let owner_id = bot.store().user_by_telegram_id(owner.id).await.unwrap().unwrap().id;
        let project = bot
            .store()
            .projects
            .create(Project::new("Alpha", "", ProjectPriority::Medium, owner_id))
            .await
            .unwrap();

        bot.text(&requester, "/requestapproval").await;
        bot.press(&requester, "approval_type:project").await;
        bot.press(&requester, &format!("approval_item:project:{}", project.id)).await;
        let reply = bot.text(&requester, "Ready for launch").await;
        assert!(reply.text().starts_with("✨ Approval request submitted!"));
        assert_eq!(bot.session_state(&requester).await, None);

        let approvals = bot.store().approvals.all().await.unwrap();
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].approver_id, owner_id);
        assert_eq!(approvals[0].project_id, Some(project.id));
        assert_eq!(approvals[0].reason, "Ready for launch");

        let alerts = bot.store().alerts.filter(move |a| a.user_id == owner_id).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::ApprovalRequired);

        let reply = bot.press(&owner, &format!("approve_action:{}", approvals[0].id)).await;
        assert!(reply.text().contains("<b>Approved!</b>"));
        let decided = bot.store().approvals.get(approvals[0].id).await.unwrap().unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
        assert!(decided.responded_at.is_some());

        let reply = bot.text(&owner, &format!("/reject {}", approvals[0].id)).await;
        assert_eq!(reply.text(), "ℹ️ This request was already approved.");
    }

    #[tokio::test]
    async fn test_concurrent_decisions_only_one_wins() {
        let bot = TestBot::new();
        let (requester, owner) = (alice(), bob());
        let deputy = taskycore::Sender::new(303, "Carol");

        bot.text(&owner, "/start").await;
        let owner_id = bot.store().user_by_telegram_id(owner.id).await.unwrap().unwrap().id;
        let project = bot
            .store()
            .projects
            .create(Project::new("Alpha", "", ProjectPriority::Medium, owner_id))
            .await
            .unwrap();

        bot.text(&requester, "/requestapproval").await;
        bot.press(&requester, "approval_type:project").await;
        bot.press(&requester, &format!("approval_item:project:{}", project.id)).await;
        bot.text(&requester, "/skip").await;
        let approval_id = bot.store().approvals.all().await.unwrap()[0].id;

        let approve = format!("approve_action:{}", approval_id);
        let reject = format!("reject_action:{}", approval_id);
        let (approved, rejected) = tokio::join!(bot.press(&owner, &approve), bot.press(&deputy, &reject));

        let winners = [approved.text(), rejected.text()]
            .iter()
            .filter(|text| !text.contains("already"))
            .count();
        assert_eq!(winners, 1);

        let decided = bot.store().approvals.get(approval_id).await.unwrap().unwrap();
        assert_ne!(decided.status, ApprovalStatus::Pending);

        let requester_id = bot.store().user_by_telegram_id(requester.id).await.unwrap().unwrap().id;
        let responses = bot
            .store()
            .alerts
            .count(move |a| a.user_id == requester_id && a.alert_type == AlertType::ApprovalResponse)
            .await
            .unwrap();
        assert_eq!(responses, 1);
    }

    #[tokio::test]
    async fn test_task_approval_without_finished_tasks() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/requestapproval").await;
        let reply = bot.press(&user, "approval_type:task").await;

        assert!(reply.text().contains("don't have any completed"));
        assert_eq!(bot.session_state(&user).await, None);
    }

    #[tokio::test]
    async fn test_cancel_button() {
        let bot = TestBot::new();
        let user = alice();

        bot.text(&user, "/requestapproval").await;
        let reply = bot.press(&user, "cancel_approval").await;

        assert_eq!(reply.text(), "ℹ️ Approval request cancelled.");
        assert_eq!(bot.session_state(&user).await, None);
    }
    #[tokio::test]
    async fn test_cancel_from_every_state() {
        let bot = TestBot::new();
        let user = alice();
        let project = bot
            .store()
            .projects
            .create(Project::new("Alpha", "", ProjectPriority::Medium, 1))
            .await
            .unwrap();
        let path = [
            Input::Press("approval_type:project".to_string()),
            Input::Press(format!("approval_item:project:{}", project.id)),
        ];
        let states = ["kind", "item", "reason"];

        for (depth, state) in states.into_iter().enumerate() {
            for cancel in ["/cancel", "cancel", "cancel_approval"] {
                bot.text(&user, "/requestapproval").await;
                feed(&bot, &user, &path[..depth]).await;
                assert_eq!(bot.session_state(&user).await, Some(("request_approval", state)));

                let reply = if cancel.starts_with('/') {
                    bot.text(&user, cancel).await
                } else {
                    bot.press(&user, cancel).await
                };
                assert_eq!(reply.text(), "ℹ️ Approval request cancelled.");
                assert_eq!(bot.session_state(&user).await, None);
            }
        }

        assert_eq!(bot.store().approvals.count_all().await.unwrap(), 0);
    }
}
