//! Identity repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Append identities and look them up by the configured dedup key.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - The `UNIQUE (dedup_field, dedup_value)` constraint is the source of
//!   truth for duplicates; `find_by_key` is only a fast path.
//! - A database serves one dedup key for its whole life. The first repository
//!   opened on it pins the key in `store_settings`; a different key is refused.
//! - Write paths call `Identity::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::identity::{DedupKey, Identity, IdentityValidationError};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DEDUP_KEY_SETTING: &str = "dedup_key";

const IDENTITY_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    email,
    created_at
FROM identities";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for identity persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(IdentityValidationError),
    /// Another record already holds this dedup value.
    DuplicateKey(String),
    /// The database was built for another dedup key.
    DedupKeyMismatch {
        stored: String,
        configured: DedupKey,
    },
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateKey(key) => write!(f, "identity already exists: `{key}`"),
            Self::DedupKeyMismatch { stored, configured } => write!(
                f,
                "database deduplicates by `{stored}`; refusing to use it with `{configured}`"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted identity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::DuplicateKey(_) | Self::DedupKeyMismatch { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<IdentityValidationError> for RepoError {
    fn from(value: IdentityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Record store contract used by the submission workflow.
pub trait IdentityRepository {
    /// Dedup field this repository enforces uniqueness on.
    fn dedup_key(&self) -> DedupKey;
    /// Exact-match lookup on the dedup field.
    fn find_by_key(&self, key: &str) -> RepoResult<Option<Identity>>;
    /// Appends one identity and returns the stored record.
    fn insert(&self, identity: &Identity) -> RepoResult<Identity>;
    /// All identities in insertion order.
    fn list_all(&self) -> RepoResult<Vec<Identity>>;
}

impl<R: IdentityRepository + ?Sized> IdentityRepository for &R {
    fn dedup_key(&self) -> DedupKey {
        (**self).dedup_key()
    }

    fn find_by_key(&self, key: &str) -> RepoResult<Option<Identity>> {
        (**self).find_by_key(key)
    }

    fn insert(&self, identity: &Identity) -> RepoResult<Identity> {
        (**self).insert(identity)
    }

    fn list_all(&self) -> RepoResult<Vec<Identity>> {
        (**self).list_all()
    }
}

/// SQLite-backed identity repository.
pub struct SqliteIdentityRepository<'conn> {
    conn: &'conn Connection,
    dedup_key: DedupKey,
}

impl<'conn> SqliteIdentityRepository<'conn> {
    /// Binds a repository to `conn` for `dedup_key`.
    ///
    /// The first call on a fresh database records `dedup_key`; later calls
    /// must pass the same key.
    ///
    /// # Errors
    /// - `DedupKeyMismatch` when the database was pinned to another key.
    /// - `InvalidData` when the stored key cannot be parsed.
    pub fn try_new(conn: &'conn Connection, dedup_key: DedupKey) -> RepoResult<Self> {
        conn.execute(
            "INSERT OR IGNORE INTO store_settings (key, value) VALUES (?1, ?2);",
            params![DEDUP_KEY_SETTING, dedup_key.as_str()],
        )?;
        let stored: String = conn.query_row(
            "SELECT value FROM store_settings WHERE key = ?1;",
            [DEDUP_KEY_SETTING],
            |row| row.get(0),
        )?;

        let stored_key = stored.parse::<DedupKey>().map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid dedup key `{stored}` in store_settings.value"
            ))
        })?;
        if stored_key != dedup_key {
            return Err(RepoError::DedupKeyMismatch {
                stored,
                configured: dedup_key,
            });
        }

        Ok(Self { conn, dedup_key })
    }
}

impl IdentityRepository for SqliteIdentityRepository<'_> {
    fn dedup_key(&self) -> DedupKey {
        self.dedup_key
    }

    fn find_by_key(&self, key: &str) -> RepoResult<Option<Identity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{IDENTITY_SELECT_SQL}
             WHERE dedup_field = ?1
               AND dedup_value = ?2;"
        ))?;

        let mut rows = stmt.query(params![self.dedup_key.as_str(), key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_identity_row(row)?));
        }

        Ok(None)
    }

    fn insert(&self, identity: &Identity) -> RepoResult<Identity> {
        identity.validate()?;
        let dedup_value = identity
            .dedup_value(self.dedup_key)
            .ok_or(IdentityValidationError::MissingEmail)?;

        let result = self.conn.execute(
            "INSERT INTO identities (
                uuid,
                name,
                email,
                dedup_field,
                dedup_value,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                identity.uuid.to_string(),
                identity.name.as_str(),
                identity.email.as_deref(),
                self.dedup_key.as_str(),
                dedup_value,
                identity.created_at_ms,
            ],
        );

        match result {
            Ok(_) => Ok(identity.clone()),
            Err(err) if is_unique_violation(&err) => {
                debug!(
                    "event=identity_insert module=repo status=conflict dedup_field={}",
                    self.dedup_key
                );
                Err(RepoError::DuplicateKey(dedup_value.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn list_all(&self) -> RepoResult<Vec<Identity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{IDENTITY_SELECT_SQL} ORDER BY rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut identities = Vec::new();

        while let Some(row) = rows.next()? {
            identities.push(parse_identity_row(row)?);
        }

        Ok(identities)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

fn parse_identity_row(row: &Row<'_>) -> RepoResult<Identity> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in identities.uuid"))
    })?;

    let identity = Identity {
        uuid,
        name: row.get("name")?,
        email: row.get("email")?,
        created_at_ms: row.get("created_at")?,
    };
    identity.validate()?;
    Ok(identity)
}
