use roster_core::db::{open_db, open_db_in_memory};
use roster_core::{
    DedupKey, Identity, IdentityRepository, IdentityValidationError, RepoError,
    SqliteIdentityRepository,
};

#[test]
fn insert_then_find_by_key_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();

    let identity = Identity::new("Ana", None);
    let stored = repo.insert(&identity).unwrap();
    assert_eq!(stored, identity);

    let loaded = repo.find_by_key("Ana").unwrap().unwrap();
    assert_eq!(loaded, identity);
}

#[test]
fn find_by_key_is_exact_match() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();
    repo.insert(&Identity::new("Ana", None)).unwrap();

    assert!(repo.find_by_key("ana").unwrap().is_none());
    assert!(repo.find_by_key("An").unwrap().is_none());
    assert!(repo.find_by_key("Ana ").unwrap().is_none());
}

#[test]
fn unique_constraint_rejects_second_insert_of_same_key() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();
    repo.insert(&Identity::new("Ana", None)).unwrap();

    let err = repo
        .insert(&Identity::new("Ana", Some("ana@x.com".to_string())))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateKey(ref key) if key == "Ana"));
    assert_eq!(repo.list_all().unwrap().len(), 1);
}

#[test]
fn email_key_allows_same_name_and_rejects_same_email() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Email).unwrap();

    repo.insert(&Identity::new("Bia", Some("bia@x.com".to_string())))
        .unwrap();
    repo.insert(&Identity::new("Bia", Some("bia@y.com".to_string())))
        .unwrap();
    let err = repo
        .insert(&Identity::new("Beatriz", Some("bia@x.com".to_string())))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateKey(ref key) if key == "bia@x.com"));

    let found = repo.find_by_key("bia@y.com").unwrap().unwrap();
    assert_eq!(found.name, "Bia");
}

#[test]
fn email_key_insert_without_email_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Email).unwrap();

    let err = repo.insert(&Identity::new("Ana", None)).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(IdentityValidationError::MissingEmail)
    ));
}

#[test]
fn invalid_identity_is_not_written() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();

    let err = repo.insert(&Identity::new("  ", None)).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(IdentityValidationError::EmptyName)
    ));
    assert!(repo.list_all().unwrap().is_empty());
}

#[test]
fn list_all_returns_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();

    for name in ["Caio", "Ana", "Bia"] {
        repo.insert(&Identity::new(name, None)).unwrap();
    }

    let names: Vec<String> = repo
        .list_all()
        .unwrap()
        .into_iter()
        .map(|identity| identity.name)
        .collect();
    assert_eq!(names, vec!["Caio", "Ana", "Bia"]);
}

#[test]
fn corrupted_row_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO identities (uuid, name, email, dedup_field, dedup_value, created_at)
         VALUES ('not-a-uuid', 'Ana', NULL, 'name', 'Ana', 0);",
        [],
    )
    .unwrap();
    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();

    let err = repo.find_by_key("Ana").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn identity_serializes_with_snake_case_fields() {
    let identity = Identity::new("Ana", Some("ana@x.com".to_string()));
    let value = serde_json::to_value(&identity).unwrap();
    assert_eq!(value["name"], "Ana");
    assert_eq!(value["email"], "ana@x.com");
    assert!(value["created_at_ms"].is_i64());
}

#[test]
fn switching_dedup_key_on_existing_database_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.sqlite3");

    let conn = open_db(&path).unwrap();
    SqliteIdentityRepository::try_new(&conn, DedupKey::Name)
        .unwrap()
        .insert(&Identity::new("Bia", Some("bia@x.com".to_string())))
        .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    let err = SqliteIdentityRepository::try_new(&conn, DedupKey::Email)
        .err()
        .unwrap();
    match err {
        RepoError::DedupKeyMismatch { stored, configured } => {
            assert_eq!(stored, "name");
            assert_eq!(configured, DedupKey::Email);
        }
        other => panic!("unexpected error: {other}"),
    }

    let repo = SqliteIdentityRepository::try_new(&conn, DedupKey::Name).unwrap();
    let emails: Vec<Option<String>> = repo
        .list_all()
        .unwrap()
        .into_iter()
        .map(|identity| identity.email)
        .collect();
    assert_eq!(emails, vec![Some("bia@x.com".to_string())]);
}

#[test]
fn fresh_database_pins_the_first_dedup_key() {
    let conn = open_db_in_memory().unwrap();

    SqliteIdentityRepository::try_new(&conn, DedupKey::Email).unwrap();
    SqliteIdentityRepository::try_new(&conn, DedupKey::Email).unwrap();
    assert!(matches!(
        SqliteIdentityRepository::try_new(&conn, DedupKey::Name),
        Err(RepoError::DedupKeyMismatch { .. })
    ));
}
