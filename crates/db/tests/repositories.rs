//! Integration tests for the repository layer.
//!
//! Exercises the repositories against a real database to verify that:
//! - Activity lists are stored as child rows and read back sorted
//! - The optimistic version check rejects stale writes
//! - Only one active approval step per type can exist
//! - A conflict pair is stored once regardless of direction
//! - Outbox claims skip rows that are not yet due

use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;
use excursions_core::activity::{ActivityFields, ActivityStatus, Campus};
use excursions_core::approval::NewApprovalStep;
use excursions_core::conflict::{ConflictStatus, EventKind};
use excursions_core::notification::{Notification, Template};
use excursions_core::permission::{PermissionKind, PermissionResponse};
use excursions_core::workflow::StepType;
use excursions_db::models::event::CreateEvent;
use excursions_db::repositories::{
    ActivityRepo, ApprovalStepRepo, ConflictRepo, EventRepo, OutboxRepo, PermissionRepo,
    PlatformEventRepo,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fields() -> ActivityFields {
    let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
    ActivityFields {
        activity_name: "Zoo visit".to_string(),
        campus: Campus::Senior,
        activity_type: "excursion".to_string(),
        location: "City Zoo".to_string(),
        timestart: start,
        timeend: start + Duration::hours(6),
        students: vec!["s1".to_string(), "s2".to_string()],
        staff_in_charge: "teacher".to_string(),
        accompanying_staff: vec!["aide".to_string()],
        planning_staff: vec!["planner".to_string()],
        cost: Some(12.5),
        transport: "bus".to_string(),
        details: String::new(),
        permissions_type: PermissionKind::System,
        permissions_limit: 0,
        permissions_due_by: None,
    }
}

fn event(name: &str, start_min: i64, end_min: i64) -> CreateEvent {
    let base = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
    CreateEvent {
        event_name: name.to_string(),
        event_type: "on_campus".to_string(),
        timestart: base + Duration::minutes(start_min),
        timeend: base + Duration::minutes(end_min),
        areas: vec!["Senior School".to_string()],
        nonnegotiable: false,
        nonnegotiable_reason: None,
    }
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_activity_round_trips_with_lists(pool: PgPool) {
    excursions_db::health_check(&pool).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let created = ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::Autosave)
        .await
        .unwrap();
    assert_eq!(created.status, 0);
    assert_eq!(created.version, 1);

    let lists = ActivityRepo::load_lists(&pool, created.id).await.unwrap();
    assert_eq!(lists.students, vec!["s1".to_string(), "s2".to_string()]);
    assert_eq!(lists.accompanying_staff, vec!["aide".to_string()]);
    assert_eq!(lists.planning_staff, vec!["planner".to_string()]);

    let snapshot = created.fields(&lists).unwrap();
    assert_eq!(snapshot, fields());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stale_version_is_rejected(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let created = ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::Draft)
        .await
        .unwrap();

    let mut edited = fields();
    edited.students.push("s3".to_string());

    let updated = ActivityRepo::update_fields(
        &mut conn,
        created.id,
        &edited,
        ActivityStatus::Draft,
        Some(created.version),
        true,
    )
    .await
    .unwrap()
    .expect("current version should apply");
    assert_eq!(updated.version, created.version + 1);

    let stale = ActivityRepo::update_fields(
        &mut conn,
        created.id,
        &fields(),
        ActivityStatus::Draft,
        Some(created.version),
        false,
    )
    .await
    .unwrap();
    assert!(stale.is_none());

    let lists = ActivityRepo::load_lists(&pool, created.id).await.unwrap();
    assert_eq!(lists.students.len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_soft_deleted_activity_is_hidden(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let created = ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::Draft)
        .await
        .unwrap();

    assert!(ActivityRepo::soft_delete(&pool, created.id).await.unwrap());
    assert!(!ActivityRepo::soft_delete(&pool, created.id).await.unwrap());
    assert!(ActivityRepo::find_by_id(&pool, created.id).await.unwrap().is_none());
    assert!(ActivityRepo::list_for_user(&pool, "owner").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_for_user_covers_staff_roles(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let draft = ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::Draft)
        .await
        .unwrap();
    ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::Autosave)
        .await
        .unwrap();

    for user in ["teacher", "aide", "planner"] {
        let listed = ActivityRepo::list_for_user(&pool, user).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![draft.id], "{user} should see only the draft");
    }
    assert_eq!(ActivityRepo::list_for_user(&pool, "owner").await.unwrap().len(), 2);
    assert!(ActivityRepo::list_for_user(&pool, "s1").await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Approval steps
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_one_active_step_per_type(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let activity = ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::InReview)
        .await
        .unwrap();

    let step = NewApprovalStep {
        step_type: StepType::SeniorRa,
        sequence: 1,
        description: "Risk assessment review".to_string(),
    };
    let rows = ApprovalStepRepo::insert_many(&mut conn, activity.id, &[step.clone()])
        .await
        .unwrap();

    let duplicate = ApprovalStepRepo::insert_many(&mut conn, activity.id, &[step.clone()]).await;
    assert!(duplicate.is_err(), "second active row of the same type must be refused");

    ApprovalStepRepo::invalidate(&pool, &[rows[0].id]).await.unwrap();
    ApprovalStepRepo::insert_many(&mut conn, activity.id, &[step])
        .await
        .unwrap();

    let all = ApprovalStepRepo::list_for_activity(&pool, activity.id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|r| !r.invalidated).count(), 1);

    // Invalidated rows can no longer be actioned.
    let stale = ApprovalStepRepo::set_status(
        &pool,
        rows[0].id,
        excursions_core::approval::ApprovalStatus::Approved,
        "ra_officer",
    )
    .await
    .unwrap();
    assert!(stale.is_none());
}

// ---------------------------------------------------------------------------
// Events and conflicts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_conflict_pair_is_stored_once(pool: PgPool) {
    let a = EventRepo::create(&pool, "owner", &event("A", 0, 60)).await.unwrap();
    let b = EventRepo::create(&pool, "owner", &event("B", 30, 90)).await.unwrap();

    assert!(ConflictRepo::insert(&pool, a.id, EventKind::Event, b.id, EventKind::Event)
        .await
        .unwrap());
    assert!(!ConflictRepo::insert(&pool, b.id, EventKind::Event, a.id, EventKind::Event)
        .await
        .unwrap());

    let stored = ConflictRepo::list_for_event(&pool, b.id).await.unwrap();
    assert_eq!(stored.len(), 1);

    let ignored = ConflictRepo::set_status(&pool, stored[0].id, ConflictStatus::Ignored)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ignored.status, 1);

    let summaries = ConflictRepo::list_summaries(&pool, b.id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].other_event_id, a.id);
    assert_eq!(summaries[0].other_event_name, "A");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overlap_query_uses_half_open_ranges(pool: PgPool) {
    let a = EventRepo::create(&pool, "owner", &event("A", 0, 60)).await.unwrap();
    EventRepo::create(&pool, "owner", &event("Adjacent", 60, 120)).await.unwrap();
    let overlapping = EventRepo::create(&pool, "owner", &event("Overlap", 59, 120))
        .await
        .unwrap();

    let found = EventRepo::list_overlapping(&pool, a.timestart, a.timeend, a.id)
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![overlapping.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_backing_event_upsert_reuses_row(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let activity = ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::Draft)
        .await
        .unwrap();

    let first = EventRepo::upsert_for_activity(
        &pool,
        activity.id,
        "owner",
        &CreateEvent::for_activity(&fields()),
    )
    .await
    .unwrap();
    assert!(first.is_activity);

    let mut moved = fields();
    moved.timestart += Duration::hours(1);
    let second =
        EventRepo::upsert_for_activity(&pool, activity.id, "owner", &CreateEvent::for_activity(&moved))
            .await
            .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.timestart, moved.timestart);

    let deleted = EventRepo::soft_delete_for_activity(&pool, activity.id).await.unwrap();
    assert_eq!(deleted, Some(first.id));
    assert!(EventRepo::find_for_activity(&pool, activity.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_pending_permissions_are_not_duplicated(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let activity = ActivityRepo::create(&mut conn, "owner", &fields(), ActivityStatus::Draft)
        .await
        .unwrap();

    let students = vec!["s1".to_string(), "s1".to_string()];
    let parents = vec!["mum".to_string(), "dad".to_string()];
    assert_eq!(
        PermissionRepo::insert_pending(&pool, activity.id, &students, &parents).await.unwrap(),
        2
    );
    assert_eq!(
        PermissionRepo::insert_pending(&pool, activity.id, &students, &parents).await.unwrap(),
        0
    );

    let row = PermissionRepo::set_response(&pool, activity.id, "s1", "dad", PermissionResponse::No)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.response, 2);

    let removed = PermissionRepo::delete_students_not_in(&pool, activity.id, &["s2".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, 2);
}

// ---------------------------------------------------------------------------
// Outbox and audit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_outbox_claim_and_retry(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let notifications = vec![Notification {
        template: Template::ApprovalRequired,
        recipient: "ra_officer".to_string(),
        context: serde_json::json!({"activity_name": "Zoo visit"}),
    }];
    assert_eq!(OutboxRepo::enqueue(&mut conn, None, &notifications).await.unwrap(), 1);
    assert_eq!(OutboxRepo::count_pending(&pool).await.unwrap(), 1);

    let claimed = OutboxRepo::claim_due(&pool, 10, 60).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].attempts, 1);

    // Leased rows are not due again until the lease expires.
    assert!(OutboxRepo::claim_due(&pool, 10, 60).await.unwrap().is_empty());

    OutboxRepo::schedule_retry(&pool, claimed[0].id, "smtp down", Utc::now() - Duration::seconds(1))
        .await
        .unwrap();
    let again = OutboxRepo::claim_due(&pool, 10, 60).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].attempts, 2);
    assert_eq!(again[0].last_error.as_deref(), Some("smtp down"));

    OutboxRepo::mark_sent(&pool, again[0].id).await.unwrap();
    OutboxRepo::schedule_retry(&pool, again[0].id, "late", Utc::now() - Duration::seconds(1))
        .await
        .unwrap();
    assert!(OutboxRepo::claim_due(&pool, 10, 60).await.unwrap().is_empty());
    assert_eq!(OutboxRepo::count_pending(&pool).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_platform_events_listed_per_entity(pool: PgPool) {
    let payload = serde_json::json!({"from": 1, "to": 2});
    PlatformEventRepo::insert(&pool, "activity.status_changed", Some("activity"), Some(7), Some("owner"), &payload)
        .await
        .unwrap();
    PlatformEventRepo::insert(&pool, "activity.deleted", Some("activity"), Some(8), None, &payload)
        .await
        .unwrap();

    let rows = PlatformEventRepo::list_for_entity(&pool, "activity", 7).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_type, "activity.status_changed");
    assert_eq!(rows[0].payload["to"], 2);
}
