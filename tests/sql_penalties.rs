//! SQL backend tests for penalties and permission groups.

mod common;

use tribunal_storage::models::{GroupQuery, Penalty, PenaltyKind};
use tribunal_storage::{Storage, StorageError};

#[tokio::test]
async fn test_ban_lifecycle() {
    // Insert client -> ban -> count -> disable -> count, end to end.
    let (storage, _pool) = common::sql_storage().await;

    let client = common::seed_client(&storage, "ABC123", "Alice").await;
    assert_eq!(client.id, Some(1));

    let ban = storage
        .set_client_penalty(&common::penalty(1, PenaltyKind::Ban))
        .await
        .expect("insert ban");
    assert_eq!(ban.id, Some(1));
    assert!(ban.active);
    assert_eq!(ban.expires_at, None);

    assert_eq!(
        storage.num_penalties(1, Some(PenaltyKind::Ban)).await.unwrap(),
        1
    );
    assert_eq!(storage.disable_client_penalties(1, None).await.unwrap(), 1);
    assert_eq!(
        storage.num_penalties(1, Some(PenaltyKind::Ban)).await.unwrap(),
        0
    );

    // Idempotent: nothing left to disable.
    assert_eq!(storage.disable_client_penalties(1, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_penalty_for_missing_client_is_not_found() {
    let (storage, _pool) = common::sql_storage().await;
    let err = storage
        .set_client_penalty(&common::penalty(999, PenaltyKind::Kick))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn test_expiry_before_issue_is_rejected() {
    let (storage, _pool) = common::sql_storage().await;
    let client = common::seed_client(&storage, "ABC123", "Alice").await;

    let err = storage
        .set_client_penalty(&Penalty {
            issued_at: 2_000_000_000,
            expires_at: Some(1_000_000_000),
            ..common::penalty(client.id.unwrap(), PenaltyKind::TempBan)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Invalid(_)), "got {err:?}");
}

#[tokio::test]
async fn test_first_and_last_penalty_ignore_insertion_order() {
    let (storage, _pool) = common::sql_storage().await;
    let client = common::seed_client(&storage, "ABC123", "Alice").await;
    let client_id = client.id.unwrap();

    let base = chrono::Utc::now().timestamp();
    // Insert out of order: T2, T3, T1.
    for offset in [-100, -50, -200] {
        storage
            .set_client_penalty(&Penalty {
                issued_at: base + offset,
                keyword: format!("t{offset}"),
                ..common::penalty(client_id, PenaltyKind::Warning)
            })
            .await
            .expect("insert");
    }

    let first = storage
        .get_client_first_penalty(client_id, None)
        .await
        .expect("first");
    assert_eq!(first.issued_at, base - 200);

    let last = storage
        .get_client_last_penalty(client_id, None)
        .await
        .expect("last");
    assert_eq!(last.issued_at, base - 50);

    let all = storage
        .get_client_penalties(client_id, None)
        .await
        .expect("list");
    let issued: Vec<i64> = all.iter().map(|p| p.issued_at).collect();
    assert_eq!(issued, vec![base - 50, base - 100, base - 200]);
}

#[tokio::test]
async fn test_kind_filter() {
    let (storage, _pool) = common::sql_storage().await;
    let client = common::seed_client(&storage, "ABC123", "Alice").await;
    let client_id = client.id.unwrap();

    for kind in [PenaltyKind::Warning, PenaltyKind::Warning, PenaltyKind::Kick] {
        storage
            .set_client_penalty(&common::penalty(client_id, kind))
            .await
            .expect("insert");
    }

    assert_eq!(
        storage
            .num_penalties(client_id, Some(PenaltyKind::Warning))
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        storage
            .disable_client_penalties(client_id, Some(PenaltyKind::Warning))
            .await
            .unwrap(),
        2
    );
    // The kick is untouched.
    assert_eq!(storage.num_penalties(client_id, None).await.unwrap(), 1);
    let remaining = storage
        .get_client_last_penalty(client_id, None)
        .await
        .expect("kick survives");
    assert_eq!(remaining.kind, PenaltyKind::Kick);
}

#[tokio::test]
async fn test_expired_but_active_row_is_not_in_force() {
    let (storage, _pool) = common::sql_storage().await;
    let client = common::seed_client(&storage, "ABC123", "Alice").await;
    let client_id = client.id.unwrap();

    let now = chrono::Utc::now().timestamp();
    // Expired a minute ago, active flag never cleared.
    storage
        .set_client_penalty(&Penalty {
            issued_at: now - 3_600,
            expires_at: Some(now - 60),
            ..common::penalty(client_id, PenaltyKind::TempBan)
        })
        .await
        .expect("insert");

    assert_eq!(storage.num_penalties(client_id, None).await.unwrap(), 0);
    assert!(matches!(
        storage.get_client_last_penalty(client_id, None).await,
        Err(StorageError::NotFound(_))
    ));
    // Nothing currently active, so nothing to disable.
    assert_eq!(
        storage.disable_client_penalties(client_id, None).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_penalty_update_touches_only_active_and_reason() {
    let (storage, _pool) = common::sql_storage().await;
    let client = common::seed_client(&storage, "ABC123", "Alice").await;
    let client_id = client.id.unwrap();

    let inserted = storage
        .set_client_penalty(&common::penalty(client_id, PenaltyKind::Ban))
        .await
        .expect("insert");

    let updated = storage
        .set_client_penalty(&Penalty {
            active: false,
            reason: Some("appealed".to_string()),
            // A re-issue attempt through the update path must be ignored.
            issued_at: inserted.issued_at + 9_999,
            ..inserted.clone()
        })
        .await
        .expect("update");

    assert_eq!(updated.id, inserted.id);
    assert!(!updated.active);
    assert_eq!(updated.reason.as_deref(), Some("appealed"));
    assert_eq!(updated.issued_at, inserted.issued_at);

    // Append-only: no new row was minted.
    let counts = storage.counts().await.expect("counts");
    assert_eq!(counts.get("penalties"), Some(&1));

    // Lookup by id still returns the (now inactive) row.
    let fetched = storage
        .get_client_penalty(inserted.id.unwrap())
        .await
        .expect("by id");
    assert!(!fetched.active);
}

#[tokio::test]
async fn test_disabled_penalty_stays_disabled() {
    let (storage, _pool) = common::sql_storage().await;
    let client = common::seed_client(&storage, "ABC123", "Alice").await;
    let client_id = client.id.unwrap();

    storage
        .set_client_penalty(&common::penalty(client_id, PenaltyKind::Ban))
        .await
        .expect("insert");
    storage
        .disable_client_penalties(client_id, None)
        .await
        .expect("disable");

    assert!(matches!(
        storage.get_client_first_penalty(client_id, None).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(storage
        .get_client_penalties(client_id, None)
        .await
        .expect("list")
        .is_empty());
}

// ========== Groups ==========

#[tokio::test]
async fn test_groups_ordered_by_level_descending() {
    let (storage, _pool) = common::sql_storage().await;

    let groups = storage.get_groups().await.expect("groups");
    assert_eq!(groups.len(), 8);
    assert_eq!(groups[0].keyword, "superadmin");
    assert_eq!(groups[0].level, 100);
    assert_eq!(groups.last().unwrap().keyword, "guest");

    let levels: Vec<i64> = groups.iter().map(|g| g.level).collect();
    let mut sorted = levels.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(levels, sorted);
}

#[tokio::test]
async fn test_group_lookup_by_id_and_keyword() {
    let (storage, _pool) = common::sql_storage().await;

    let by_keyword = storage
        .get_group(&GroupQuery::Keyword("admin".to_string()))
        .await
        .expect("by keyword");
    assert_eq!(by_keyword.level, 40);

    let by_id = storage
        .get_group(&GroupQuery::Id(by_keyword.id))
        .await
        .expect("by id");
    assert_eq!(by_id, by_keyword);

    let err = storage
        .get_group(&GroupQuery::Keyword("wizard".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}
