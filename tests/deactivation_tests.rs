//! Integration tests for the cascading deactivation flow.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use identarr::constants::properties::DEFAULT_ISSUE_ASSIGNEE;
use identarr::entities::{group_memberships, properties, user_roles};
use identarr::{FixedClock, NewUser, Store};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};

async fn spawn_store() -> Store {
    let db_path = std::env::temp_dir().join(format!("identarr-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to create store")
}

fn new_user(login: &str) -> NewUser {
    NewUser {
        login: login.to_string(),
        name: None,
        email: Some(format!("{login}@example.com")),
        scm_accounts: Vec::new(),
        is_root: false,
    }
}

/// Seeds one row in every partition the cascade touches, plus the global
/// default-assignee property naming the login.
async fn seed_dependents(store: &Store, user_id: i64, login: &str) {
    group_memberships::ActiveModel {
        user_id: Set(user_id),
        group_id: Set(42),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("failed to seed group membership");

    properties::ActiveModel {
        prop_key: Set("notifications.digest".to_string()),
        user_id: Set(Some(user_id)),
        text_value: Set(Some("weekly".to_string())),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("failed to seed user property");

    user_roles::ActiveModel {
        user_id: Set(user_id),
        role: Set("admin".to_string()),
        resource_id: Set(None),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("failed to seed role grant");

    properties::ActiveModel {
        prop_key: Set(DEFAULT_ISSUE_ASSIGNEE.to_string()),
        user_id: Set(None),
        text_value: Set(Some(login.to_string())),
        ..Default::default()
    }
    .insert(&store.conn)
    .await
    .expect("failed to seed default assignee property");
}

async fn membership_count(store: &Store, user_id: i64) -> u64 {
    group_memberships::Entity::find()
        .filter(group_memberships::Column::UserId.eq(user_id))
        .count(&store.conn)
        .await
        .expect("failed to count memberships")
}

async fn user_property_count(store: &Store, user_id: i64) -> u64 {
    properties::Entity::find()
        .filter(properties::Column::UserId.eq(user_id))
        .count(&store.conn)
        .await
        .expect("failed to count user properties")
}

async fn role_count(store: &Store, user_id: i64) -> u64 {
    user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .count(&store.conn)
        .await
        .expect("failed to count role grants")
}

async fn default_assignee_count(store: &Store, login: &str) -> u64 {
    properties::Entity::find()
        .filter(properties::Column::PropKey.eq(DEFAULT_ISSUE_ASSIGNEE))
        .filter(properties::Column::TextValue.eq(login))
        .count(&store.conn)
        .await
        .expect("failed to count default assignee properties")
}

#[tokio::test]
async fn deactivating_unknown_login_returns_false_and_changes_nothing() {
    let store = spawn_store().await;

    let user = store.insert_user(new_user("keeper")).await.unwrap();
    seed_dependents(&store, user.id, "keeper").await;

    assert!(!store.deactivate_user_by_login("ghost").await.unwrap());

    let kept = store.get_user_by_login("keeper").await.unwrap().unwrap();
    assert!(kept.active);
    assert_eq!(membership_count(&store, user.id).await, 1);
    assert_eq!(user_property_count(&store, user.id).await, 1);
    assert_eq!(role_count(&store, user.id).await, 1);
    assert_eq!(default_assignee_count(&store, "keeper").await, 1);
}

#[tokio::test]
async fn deactivation_cascades_across_all_partitions() {
    let store = spawn_store().await;

    let target = store.insert_user(new_user("target")).await.unwrap();
    let bystander = store.insert_user(new_user("bystander")).await.unwrap();
    seed_dependents(&store, target.id, "target").await;
    seed_dependents(&store, bystander.id, "bystander").await;

    assert!(store.deactivate_user_by_login("target").await.unwrap());

    assert!(store.get_active_user_by_login("target").await.unwrap().is_none());
    let record = store.get_user_by_login("target").await.unwrap().unwrap();
    assert!(!record.active);

    assert_eq!(membership_count(&store, target.id).await, 0);
    assert_eq!(user_property_count(&store, target.id).await, 0);
    assert_eq!(role_count(&store, target.id).await, 0);
    assert_eq!(default_assignee_count(&store, "target").await, 0);

    // Another user's data is untouched, including their default-assignee
    // property under the same key.
    assert_eq!(membership_count(&store, bystander.id).await, 1);
    assert_eq!(user_property_count(&store, bystander.id).await, 1);
    assert_eq!(role_count(&store, bystander.id).await, 1);
    assert_eq!(default_assignee_count(&store, "bystander").await, 1);
}

#[tokio::test]
async fn deactivation_keeps_the_user_record_and_stamps_the_clock() {
    let pinned = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
    let db_path = std::env::temp_dir().join(format!("identarr-test-{}.db", uuid::Uuid::new_v4()));
    let store = Store::with_clock(
        &format!("sqlite:{}", db_path.display()),
        Arc::new(FixedClock(pinned)),
    )
    .await
    .expect("failed to create store");

    let user = store.insert_user(new_user("leaver")).await.unwrap();
    assert!(store.deactivate_user_by_login("leaver").await.unwrap());

    let record = store.get_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(record.login, "leaver");
    assert!(!record.active);
    assert_eq!(record.updated_at, pinned.to_rfc3339());
}

#[tokio::test]
async fn repeated_deactivation_runs_the_cascade_again_and_returns_true() {
    let store = spawn_store().await;

    let user = store.insert_user(new_user("twice")).await.unwrap();
    seed_dependents(&store, user.id, "twice").await;

    assert!(store.deactivate_user_by_login("twice").await.unwrap());
    // The lookup is unfiltered, so the second call still finds the record
    // and re-runs the cascade against the now-empty partitions.
    assert!(store.deactivate_user_by_login("twice").await.unwrap());

    assert_eq!(membership_count(&store, user.id).await, 0);
    let record = store.get_user_by_login("twice").await.unwrap().unwrap();
    assert!(!record.active);
}
