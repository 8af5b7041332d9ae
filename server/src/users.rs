use crate::{auth, db, error::AppError, model::User};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Create a user with an already hashed password. Emails are unique ignoring case.
pub fn create_user(
    conn: &Connection,
    email: &str,
    name: Option<&str>,
    password_hash: &str,
) -> Result<User, AppError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::InvalidInput("Invalid email".into()));
    }
    let id = Uuid::new_v4().to_string();
    let now = db::now_millis();
    let res = conn.execute(
        "INSERT INTO users (id, email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, email, name, password_hash, now],
    );
    match res {
        Ok(_) => Ok(User {
            id,
            email: email.into(),
            name: name.map(Into::into),
            password_hash: password_hash.into(),
            created_at: now,
        }),
        Err(e) => {
            if matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::ConstraintViolation)
            ) {
                Err(AppError::InvalidInput("Email already registered".into()))
            } else {
                Err(e.into())
            }
        }
    }
}

/// Create the user unless one with this email already exists. Returns the stored user.
pub fn ensure_user(
    conn: &Connection,
    email: &str,
    name: Option<&str>,
    password: &str,
) -> Result<User, AppError> {
    if let Some(user) = find_by_email(conn, email)? {
        return Ok(user);
    }
    let hash = auth::hash_password(password)?;
    create_user(conn, email, name, &hash)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, name, password_hash, created_at FROM users WHERE lower(email) = lower(?1)",
    )?;
    let user = stmt.query_row([email.trim()], row_to_user).optional()?;
    Ok(user)
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<User>, AppError> {
    let mut stmt =
        conn.prepare("SELECT id, email, name, password_hash, created_at FROM users WHERE id = ?1")?;
    let user = stmt.query_row([id], row_to_user).optional()?;
    Ok(user)
}

/// Check an email/password pair against the credential store.
pub fn authenticate(
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let Some(user) = find_by_email(conn, email)? else {
        return Ok(None);
    };
    if auth::verify_password(password, &user.password_hash) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}
