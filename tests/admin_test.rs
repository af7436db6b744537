//! Admin actions over an in-memory directory.

mod common;

use std::sync::atomic::Ordering;

use serde_json::json;

use aquamine_console::identity::{DirectoryError, Role};
use aquamine_console::{AdminActions, AdminError};
use common::{claims, user, MemoryDirectory};

// ---

fn directory() -> MemoryDirectory {
    MemoryDirectory::with_users(vec![
        user("u_root", "root@aquamine.id", json!({"role": "superadmin", "allowlisted": true})),
        user("u_ops", "ops@aquamine.id", json!({"allowlisted": true})),
        user("u_new", "new@aquamine.id", json!({})),
    ])
}

#[tokio::test]
async fn non_superadmin_never_reaches_directory() {
    // ---
    let admin = AdminActions::new(directory(), None);
    let caller = claims("u_ops", Some("admin"), true);

    assert!(matches!(admin.list_users(&caller).await, Err(AdminError::Unauthorized)));
    assert!(matches!(
        admin.set_role(&caller, "u_new", Some(Role::Admin)).await,
        Err(AdminError::Unauthorized)
    ));
    assert!(matches!(
        admin.set_allowlisted(&caller, "u_new", true).await,
        Err(AdminError::Unauthorized)
    ));

    assert_eq!(admin.directory().lists(), 0);
    assert_eq!(admin.directory().updates(), 0);
}

#[tokio::test]
async fn listing_reads_directory_every_time() -> anyhow::Result<()> {
    // ---
    let admin = AdminActions::new(directory(), None);
    let root = claims("u_root", Some("superadmin"), true);

    assert_eq!(admin.list_users(&root).await?.len(), 3);
    assert_eq!(admin.list_users(&root).await?.len(), 3);
    assert_eq!(admin.directory().lists(), 2);

    let updated = admin.set_role(&root, "u_ops", Some(Role::Admin)).await?;
    assert_eq!(updated.role(), Some(Role::Admin));

    let users = admin.list_users(&root).await?;
    assert_eq!(admin.directory().lists(), 3);
    let ops = users.iter().find(|u| u.id == "u_ops").unwrap();
    assert_eq!(ops.role(), Some(Role::Admin));
    assert!(ops.is_allowlisted());
    Ok(())
}

#[tokio::test]
async fn late_sign_up_appears_in_next_listing() -> anyhow::Result<()> {
    // ---
    let admin = AdminActions::new(directory(), None);
    let root = claims("u_root", Some("superadmin"), true);
    assert_eq!(admin.list_users(&root).await?.len(), 3);

    admin
        .directory()
        .add(user("u_late", "late@aquamine.id", json!({})));

    let users = admin.list_users(&root).await?;
    let late = users.iter().find(|u| u.id == "u_late").unwrap();
    assert!(!late.is_allowlisted());

    let approved = admin.set_allowlisted(&root, "u_late", true).await?;
    assert!(approved.is_allowlisted());
    Ok(())
}

#[tokio::test]
async fn clearing_role_removes_the_key() -> anyhow::Result<()> {
    // ---
    let admin = AdminActions::new(directory(), None);
    let root = claims("u_root", Some("superadmin"), true);

    admin.set_role(&root, "u_ops", Some(Role::Admin)).await?;
    let cleared = admin.set_role(&root, "u_ops", None).await?;
    assert_eq!(cleared.role(), None);
    assert!(!cleared.public_metadata.contains_key("role"));
    assert!(cleared.is_allowlisted());

    let approved = admin.set_allowlisted(&root, "u_new", true).await?;
    assert!(approved.is_allowlisted());
    Ok(())
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    // ---
    let admin = AdminActions::new(directory(), None);
    let root = claims("u_root", Some("superadmin"), true);

    let err = admin.set_allowlisted(&root, "u_ghost", true).await.unwrap_err();
    assert!(matches!(err, AdminError::Directory(DirectoryError::NotFound(ref id)) if id == "u_ghost"));
}

#[tokio::test]
async fn listing_pages_until_short_page() -> anyhow::Result<()> {
    // ---
    let mut all = vec![user("u_root", "root@aquamine.id", json!({"role": "superadmin"}))];
    all.extend((0..205).map(|i| user(&format!("u_{i}"), &format!("u{i}@aquamine.id"), json!({}))));
    let admin = AdminActions::new(MemoryDirectory::with_users(all), None);
    let root = claims("u_root", Some("superadmin"), true);

    assert_eq!(admin.list_users(&root).await?.len(), 206);
    assert_eq!(admin.directory().lists(), 3);
    Ok(())
}

#[tokio::test]
async fn bare_list_is_read_once() -> anyhow::Result<()> {
    // ---
    let mut all = vec![user("u_root", "root@aquamine.id", json!({"role": "superadmin"}))];
    all.extend((0..99).map(|i| user(&format!("u_{i}"), &format!("u{i}@aquamine.id"), json!({}))));
    let dir = MemoryDirectory::with_users(all);
    dir.bare.store(true, Ordering::SeqCst);
    let admin = AdminActions::new(dir, None);
    let root = claims("u_root", Some("superadmin"), true);

    assert_eq!(admin.list_users(&root).await?.len(), 100);
    assert_eq!(admin.directory().lists(), 1);
    Ok(())
}

#[tokio::test]
async fn bootstrap_promotes_configured_email_once() -> anyhow::Result<()> {
    // ---
    let dir = MemoryDirectory::with_users(vec![
        user("u_boss", "boss@aquamine.id", json!({})),
        user("u_twin", "boss@aquamine.id", json!({})),
    ]);
    let admin = AdminActions::new(dir, Some("Boss@AquaMine.id".into()));

    assert!(!admin.bootstrap_superadmin("u_boss", "someone@aquamine.id").await?);
    assert_eq!(admin.directory().updates(), 0);

    assert!(admin.bootstrap_superadmin("u_boss", "BOSS@aquamine.id").await?);
    let boss = admin.directory().find("u_boss").unwrap();
    assert_eq!(boss.role(), Some(Role::Superadmin));
    assert!(boss.is_allowlisted());

    assert!(!admin.bootstrap_superadmin("u_twin", "boss@aquamine.id").await?);
    assert_eq!(admin.directory().find("u_twin").unwrap().role(), None);
    assert_eq!(admin.directory().updates(), 1);
    Ok(())
}

#[tokio::test]
async fn bootstrap_disabled_without_configured_email() -> anyhow::Result<()> {
    // ---
    let admin = AdminActions::new(directory(), None);
    assert!(!admin.bootstrap_superadmin("u_new", "new@aquamine.id").await?);
    assert_eq!(admin.directory().lists(), 0);
    Ok(())
}
