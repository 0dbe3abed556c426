use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use backoffice_authz::authz::{AuthorityLevel, AuthoritySource, GrantStore, PermissionResolver};
use backoffice_authz::codes::CodeRegistry;
use backoffice_authz::db::SqliteStore;
use backoffice_authz::menu::{MenuSource, MenuVisibilityEngine};
use backoffice_authz::tree::TreeCache;

async fn seed(pool: &SqlitePool, user_id: Uuid) {
    let statements = [
        "INSERT INTO users (id, username, email) VALUES (?1, 'kim', 'kim@example.com')",
        "INSERT INTO roles (role_code, role_name) VALUES ('CLERK', 'Clerk'), ('MANAGER', 'Manager')",
        "INSERT INTO programs (program_id, program_name, close_yn) VALUES ('PRD', 'Products', 'N'), ('ORD', 'Orders', 'N'), ('OLD', 'Legacy', 'Y')",
        "INSERT INTO user_roles (user_id, role_code) VALUES (?1, 'CLERK'), (?1, 'MANAGER')",
        "INSERT INTO role_programs (role_code, program_id, role_authority, use_yn) VALUES \
            ('CLERK', 'PRD', 'READ', 'Y'), ('MANAGER', 'PRD', 'WRITE', 'Y'), \
            ('MANAGER', 'ORD', 'ADMIN', 'N'), ('CLERK', 'OLD', 'ADMIN', 'Y'), ('CLERK', 'ORD', 'bogus', 'Y')",
        "INSERT INTO user_programs (user_id, program_id, user_authority, valid_begin_date, valid_end_date) \
            VALUES (?1, 'ORD', 'EXECUTE', '2025-01-01', '20250131')",
        "INSERT INTO menus (id, parent_id, menu_name, sort_order, use_yn, program_id) VALUES \
            (1, NULL, 'Catalog', 0, 'Y', NULL), (2, 1, 'Products', 0, 'Y', 'PRD'), \
            (3, NULL, 'Sales', 1, 'Y', NULL), (4, 3, 'Orders', 0, 'Y', 'ORD'), (5, NULL, 'Help', 2, 'Y', '')",
        "INSERT INTO favorite_menus (user_id, menu_id) VALUES (?1, 2), (?1, 4)",
        "INSERT INTO common_code_groups (group_code, group_name, sort_order, use_yn) VALUES ('ORDER_STATUS', 'Order status', 0, 'Y')",
        "INSERT INTO common_codes (group_code, code, code_name, sort_order, use_yn) VALUES \
            ('ORDER_STATUS', 'PLACED', 'Placed', 1, 'Y'), ('ORDER_STATUS', 'VOID', 'Void', 2, 'N')",
    ];

    for statement in statements {
        let mut query = sqlx::query(statement);
        if statement.contains("?1") {
            query = query.bind(user_id.to_string());
        }
        query.execute(pool).await.unwrap();
    }
}

#[sqlx::test]
async fn grant_rows_are_decoded(pool: SqlitePool) {
    let user = Uuid::new_v4();
    seed(&pool, user).await;
    let store = SqliteStore::new(pool);

    let roles = store.role_codes(user).await.unwrap();
    assert_eq!(roles, BTreeSet::from(["CLERK".to_string(), "MANAGER".to_string()]));

    let grants = store.role_grants(&roles, "ORD").await.unwrap();
    assert_eq!(grants.len(), 2);
    assert!(grants.iter().any(|g| g.role_code == "MANAGER" && !g.use_yn));
    assert!(grants.iter().any(|g| g.role_code == "CLERK" && g.authority == AuthorityLevel::None));

    let ov = store.user_override(user, "ORD").await.unwrap().unwrap();
    assert_eq!(ov.authority, AuthorityLevel::Execute);
    assert_eq!(ov.valid_end_date, chrono::NaiveDate::from_ymd_opt(2025, 1, 31));

    assert!(store.program("OLD").await.unwrap().unwrap().closed);
    assert!(store.program("NOPE").await.unwrap().is_none());

    let wanted = BTreeSet::from(["PRD".to_string(), "NOPE".to_string()]);
    assert_eq!(store.programs(&wanted).await.unwrap().len(), 1);
}

#[sqlx::test]
async fn resolver_over_sqlite(pool: SqlitePool) {
    let user = Uuid::new_v4();
    seed(&pool, user).await;
    let resolver = PermissionResolver::new(Arc::new(SqliteStore::new(pool)));

    let in_window = Utc.with_ymd_and_hms(2025, 1, 31, 18, 0, 0).unwrap();
    let after_window = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

    assert_eq!(resolver.resolve(user, "PRD", in_window).await.unwrap(), AuthorityLevel::Write);
    assert_eq!(resolver.resolve(user, "ORD", in_window).await.unwrap(), AuthorityLevel::Execute);

    let lapsed = resolver.resolve_detailed(user, "ORD", after_window).await.unwrap();
    assert_eq!(lapsed.authority, AuthorityLevel::None);
    assert_eq!(lapsed.source, AuthoritySource::NoGrant);

    let closed = resolver.resolve_detailed(user, "OLD", in_window).await.unwrap();
    assert_eq!(closed.source, AuthoritySource::Closed);
}

#[sqlx::test]
async fn menus_and_favorites_over_sqlite(pool: SqlitePool) {
    let user = Uuid::new_v4();
    seed(&pool, user).await;
    let store = Arc::new(SqliteStore::new(pool));

    let mapping = store.program_mapping().await.unwrap();
    assert_eq!(mapping.get(&2).map(String::as_str), Some("PRD"));
    assert!(!mapping.contains_key(&5));

    let engine = MenuVisibilityEngine::new(
        PermissionResolver::new(Arc::clone(&store)),
        Arc::clone(&store),
        Arc::new(TreeCache::new(true)),
    );
    let as_of = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();

    let visible = engine.visible_menu_tree(user, as_of).await.unwrap();
    let names: Vec<&str> = visible.tree.walk().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Catalog", "Products", "Help"]);

    let favorites = engine.visible_favorites(user, as_of).await.unwrap();
    assert_eq!(favorites.iter().map(|m| m.id).collect::<Vec<_>>(), vec![2]);
}

#[sqlx::test]
async fn codes_over_sqlite(pool: SqlitePool) {
    seed(&pool, Uuid::new_v4()).await;
    let registry = CodeRegistry::new(Arc::new(SqliteStore::new(pool.clone())));

    let active = registry.active_codes("ORDER_STATUS").await.unwrap();
    assert_eq!(active.iter().map(|c| c.code.as_str()).collect::<Vec<_>>(), vec!["PLACED"]);
    assert!(registry.resolve_code("ORDER_STATUS", "VOID").await.unwrap_err().is_not_found());

    sqlx::query("UPDATE common_code_groups SET use_yn = 'N' WHERE group_code = 'ORDER_STATUS'")
        .execute(&pool)
        .await
        .unwrap();
    assert!(registry.active_codes("ORDER_STATUS").await.unwrap().is_empty());
}
