//! Integration tests for the keystore-store crate.
//!
//! These tests exercise the account and vault lifecycle end to end against a
//! real SQLite database on disk (via tempfile).

use chrono::{Duration, Utc};
use keystore_store::{Database, StoreError, User, UserStore, VaultRecordStore, migration};
use keystore_vault::{EntryFields, EntryPatch, PlainEntry, VaultRecord, identity, is_token_valid};

fn entry(app: &str, password: &str) -> PlainEntry {
    EntryFields {
        app: app.into(),
        email: "me@example.com".into(),
        username: "me".into(),
        password: password.into(),
        authenticator: String::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Database lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn database_open_and_migrate_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("keystore.db");

    let db = Database::open_and_migrate(db_path.clone()).await.unwrap();
    drop(db);
    let db = Database::open_and_migrate(db_path).await.unwrap();

    let version = db.execute(|conn| migration::current_version(conn)).await.unwrap();
    assert_eq!(version, migration::latest_version());
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("keystore.db");

    let user = User::register("Dana", "dana@example.com", "password-1", Utc::now()).unwrap();
    let record_id = {
        let db = Database::open_and_migrate(db_path.clone()).await.unwrap();
        UserStore::new(db.clone()).create(&user).await.unwrap();
        let record =
            VaultRecord::create(&user.id, &entry("Bank", "s3cret"), &user.field_key(), Utc::now())
                .unwrap();
        VaultRecordStore::new(db).for_owner(&user.id).insert(&record).await.unwrap();
        record.id
    };

    let db = Database::open_and_migrate(db_path).await.unwrap();
    let loaded = UserStore::new(db.clone())
        .find_by_lookup_id(&identity::identify("DANA@example.com"))
        .await
        .unwrap()
        .expect("user should survive reopen");
    let record = VaultRecordStore::new(db)
        .for_owner(&loaded.id)
        .find(&record_id)
        .await
        .unwrap()
        .expect("record should survive reopen");

    assert_eq!(record.open(&loaded.field_key()).unwrap().password, "s3cret");
}

// ═══════════════════════════════════════════════════════════════════════
//  Account lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn register_login_rotate_delete() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let users = UserStore::new(db.clone());
    let records = VaultRecordStore::new(db);

    // Register.
    let user = User::register("Erin", "Erin@Example.com", "password-1", Utc::now()).unwrap();
    users.create(&user).await.unwrap();

    // Login by normalized email.
    let mut found = users
        .find_by_lookup_id(&identity::identify("erin@example.com"))
        .await
        .unwrap()
        .unwrap();
    assert!(found.verify_password("password-1"));
    let issued_at = Utc::now();

    // Store an entry, then rotate the account password.
    let vault = records.for_owner(&found.id);
    let record =
        VaultRecord::create(&found.id, &entry("Mail", "pw"), &found.field_key(), Utc::now())
            .unwrap();
    vault.insert(&record).await.unwrap();

    found
        .rotate_password("password-2", issued_at + Duration::seconds(1))
        .unwrap();
    users.save(&found).await.unwrap();

    let reloaded = users.find_by_id(&found.id).await.unwrap().unwrap();
    assert!(!is_token_valid(issued_at, &reloaded));

    // Entries stay readable: the field key does not depend on the password.
    let stored = vault.find(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.open(&reloaded.field_key()).unwrap().app, "Mail");

    // Delete the account and everything it owns.
    assert!(users.delete(&found.id).await.unwrap());
    assert!(vault.list().await.unwrap().is_empty());
    assert!(
        users
            .find_by_lookup_id(&identity::identify("erin@example.com"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_registration_is_rejected_regardless_of_case() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let users = UserStore::new(db);

    let first = User::register("F", "frank@example.com", "password-1", Utc::now()).unwrap();
    users.create(&first).await.unwrap();

    let second = User::register("F2", "FRANK@Example.COM", "password-2", Utc::now()).unwrap();
    assert!(matches!(
        users.create(&second).await,
        Err(StoreError::DuplicateIdentity)
    ));
}

// ═══════════════════════════════════════════════════════════════════════
//  Ownership isolation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn owners_never_see_each_others_records() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let users = UserStore::new(db.clone());
    let records = VaultRecordStore::new(db);

    let alice = User::register("Alice", "alice@example.com", "password-1", Utc::now()).unwrap();
    let bob = User::register("Bob", "bob@example.com", "password-1", Utc::now()).unwrap();
    users.create(&alice).await.unwrap();
    users.create(&bob).await.unwrap();

    let alice_vault = records.for_owner(&alice.id);
    let bob_vault = records.for_owner(&bob.id);

    let t0 = Utc::now();
    let mut alice_ids = Vec::new();
    for (i, app) in ["GitHub", "Bank"].into_iter().enumerate() {
        let created = t0 + Duration::seconds(i as i64);
        let record =
            VaultRecord::create(&alice.id, &entry(app, "a"), &alice.field_key(), created).unwrap();
        alice_vault.insert(&record).await.unwrap();
        alice_ids.push(record.id);
    }
    let bobs =
        VaultRecord::create(&bob.id, &entry("Chat", "b"), &bob.field_key(), Utc::now()).unwrap();
    bob_vault.insert(&bobs).await.unwrap();

    let listed: Vec<String> = alice_vault.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(listed, alice_ids);
    assert_eq!(bob_vault.list().await.unwrap().len(), 1);

    for id in &alice_ids {
        assert!(bob_vault.find(id).await.unwrap().is_none());
        assert!(!bob_vault.delete(id).await.unwrap());
    }

    // Bob's handle refuses to insert a record labelled with Alice's id.
    let forged =
        VaultRecord::create(&alice.id, &entry("Forged", "x"), &bob.field_key(), Utc::now())
            .unwrap();
    assert!(matches!(
        bob_vault.insert(&forged).await,
        Err(StoreError::InvalidArgument(_))
    ));

    // Even with a stolen row, Bob's key cannot open Alice's ciphertext.
    let stolen = alice_vault.find(&alice_ids[0]).await.unwrap().unwrap();
    assert!(stolen.open(&bob.field_key()).is_err());
}

#[tokio::test]
async fn partial_update_round_trips_through_storage() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let users = UserStore::new(db.clone());
    let records = VaultRecordStore::new(db);

    let user = User::register("G", "g@example.com", "password-1", Utc::now()).unwrap();
    users.create(&user).await.unwrap();
    let key = user.field_key();
    let vault = records.for_owner(&user.id);

    let mut record = VaultRecord::create(&user.id, &entry("App", "old"), &key, Utc::now()).unwrap();
    vault.insert(&record).await.unwrap();

    record
        .apply(
            &EntryPatch {
                username: Some("renamed".into()),
                authenticator: Some("JBSWY3DPEHPK3PXP".into()),
                ..Default::default()
            },
            &key,
            Utc::now(),
        )
        .unwrap();
    assert!(vault.update(&record).await.unwrap());

    let opened = vault.find(&record.id).await.unwrap().unwrap().open(&key).unwrap();
    assert_eq!(opened.username, "renamed");
    assert_eq!(opened.authenticator, "JBSWY3DPEHPK3PXP");
    assert_eq!(opened.password, "old");
    assert_eq!(opened.app, "App");
}
