//! Integration tests for the notification outbox relay.

use std::sync::{Arc, Mutex};

use excursions_core::notification::{Notification, Template};
use excursions_core::workflow::WorkflowDefinition;
use excursions_db::models::outbox::{OUTBOX_STATUS_FAILED, OUTBOX_STATUS_PENDING, OUTBOX_STATUS_SENT};
use excursions_db::repositories::OutboxRepo;
use excursions_events::{EmailError, MessageSender, NotificationRelay, RelayConfig};
use sqlx::PgPool;

const WORKFLOW: &str = r#"{
    "steps": [
        {
            "step_type": "senior_hoss",
            "name": "Head of Senior School",
            "approvers": [{"username": "hoss", "email": "hoss@school.example"}]
        }
    ],
    "campuses": {"primary": [], "senior": ["senior_hoss"]}
}"#;

/// Records every delivery; fails all of them when `fail` is set.
#[derive(Clone, Default)]
struct RecordingSender {
    fail: bool,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MessageSender for RecordingSender {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::Build("connection refused".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

fn relay(pool: PgPool, sender: RecordingSender) -> NotificationRelay<RecordingSender> {
    let definition = Arc::new(WorkflowDefinition::from_json(WORKFLOW).unwrap());
    let config = RelayConfig {
        email_domain: "school.test".to_string(),
        ..RelayConfig::default()
    };
    NotificationRelay::new(pool, definition, sender, config)
}

async fn enqueue(pool: &PgPool, recipient: &str) {
    let mut conn = pool.acquire().await.unwrap();
    let notification = Notification {
        template: Template::ApprovalRequired,
        recipient: recipient.to_string(),
        context: serde_json::json!({"activity_id": 1, "activity_name": "Zoo visit", "status": 2}),
    };
    OutboxRepo::enqueue(&mut conn, None, &[notification]).await.unwrap();
}

async fn statuses(pool: &PgPool) -> Vec<(String, i32)> {
    sqlx::query_as::<_, (String, i32)>(
        "SELECT status, attempts FROM notification_outbox ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn delivered_messages_are_marked_sent(pool: PgPool) {
    enqueue(&pool, "hoss").await;
    enqueue(&pool, "teacher").await;

    let sender = RecordingSender::default();
    let stats = relay(pool.clone(), sender.clone()).process_batch().await.unwrap();
    assert_eq!(stats.sent, 2);

    let sent = sender.sent.lock().unwrap().clone();
    assert!(sent.contains(&("hoss@school.example".to_string(), "Approval required: Zoo visit".to_string())));
    assert!(sent.iter().any(|(to, _)| to == "teacher@school.test"));

    for (status, _) in statuses(&pool).await {
        assert_eq!(status, OUTBOX_STATUS_SENT);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_delivery_is_rescheduled(pool: PgPool) {
    enqueue(&pool, "teacher").await;

    let sender = RecordingSender {
        fail: true,
        ..RecordingSender::default()
    };
    let stats = relay(pool.clone(), sender).process_batch().await.unwrap();
    assert_eq!(stats.retried, 1);
    assert_eq!(statuses(&pool).await, vec![(OUTBOX_STATUS_PENDING.to_string(), 1)]);

    let (error, delay_secs): (Option<String>, f64) = sqlx::query_as(
        "SELECT last_error, EXTRACT(EPOCH FROM next_attempt_at - NOW())::FLOAT8 \
         FROM notification_outbox",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(error.unwrap().contains("connection refused"));
    assert!(delay_secs > 30.0, "retry should be pushed into the future");

    // Not due yet, so a second pass claims nothing.
    let stats = relay(pool.clone(), RecordingSender::default()).process_batch().await.unwrap();
    assert_eq!(stats.sent, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn last_attempt_marks_message_failed(pool: PgPool) {
    enqueue(&pool, "teacher").await;
    sqlx::query("UPDATE notification_outbox SET attempts = 4")
        .execute(&pool)
        .await
        .unwrap();

    let sender = RecordingSender {
        fail: true,
        ..RecordingSender::default()
    };
    let stats = relay(pool.clone(), sender).process_batch().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(statuses(&pool).await, vec![(OUTBOX_STATUS_FAILED.to_string(), 5)]);
}
