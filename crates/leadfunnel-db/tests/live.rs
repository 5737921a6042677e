//! Live integration tests for leadfunnel-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/leadfunnel-db/`).

use leadfunnel_core::{FunnelStep, LeadFields, LeadId};
use leadfunnel_db::{DbError, LeadStore, PgLeadStore};
use serde_json::{json, Value};

fn fields(value: Value) -> LeadFields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_and_get_lead(pool: sqlx::PgPool) {
    let store = PgLeadStore::new(pool);
    let created = store
        .create(fields(json!({"funnelStep": "addressEntry", "gclid": "abc"})))
        .await
        .expect("create lead");

    let fetched = store
        .get(created.id)
        .await
        .expect("get lead")
        .expect("lead exists");
    assert_eq!(fetched.fields["gclid"], "abc");
    assert_eq!(fetched.funnel_step(), Some(FunnelStep::AddressEntry));
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_unknown_lead_returns_none(pool: sqlx::PgPool) {
    let store = PgLeadStore::new(pool);
    let fetched = store.get(LeadId::new()).await.expect("query runs");
    assert!(fetched.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_merges_partial_fields(pool: sqlx::PgPool) {
    let store = PgLeadStore::new(pool);
    let created = store
        .create(fields(json!({"funnelStep": "addressEntry", "gclid": "abc"})))
        .await
        .expect("create lead");

    let updated = store
        .update(
            created.id,
            fields(json!({"funnelStep": "enrichment", "address": "123 Main St"})),
        )
        .await
        .expect("update lead");

    assert_eq!(updated.fields["gclid"], "abc");
    assert_eq!(updated.fields["address"], "123 Main St");
    assert_eq!(updated.funnel_step(), Some(FunnelStep::Enrichment));
    assert!(updated.updated_at >= created.updated_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn submitted_step_is_not_rolled_back(pool: sqlx::PgPool) {
    let store = PgLeadStore::new(pool);
    let created = store
        .create(fields(json!({"funnelStep": "submitted"})))
        .await
        .expect("create lead");

    let updated = store
        .update(created.id, fields(json!({"funnelStep": "addressEntry"})))
        .await
        .expect("update lead");
    assert_eq!(updated.funnel_step(), Some(FunnelStep::Submitted));
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_unknown_lead_is_not_found(pool: sqlx::PgPool) {
    let store = PgLeadStore::new(pool);
    let err = store
        .update(LeadId::new(), fields(json!({"phone": "5551234567"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}
