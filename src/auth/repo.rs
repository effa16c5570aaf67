use crate::auth::repo_types::{NewUser, User};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, password_hash, is_active, is_staff, created_at";

impl User {
    /// Find a user by (already normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert a new user. `None` when the email is already taken.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash, is_staff)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.email)
        .bind(new.name)
        .bind(new.password_hash)
        .bind(new.is_staff)
        .fetch_optional(db)
        .await
    }

    /// Persist profile fields. `None` when the new email belongs to another account.
    pub async fn save_profile(db: &PgPool, user: &User) -> Result<Option<User>, sqlx::Error> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = $2, name = $3, password_hash = $4
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .fetch_optional(db)
        .await;

        match res {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            other => other,
        }
    }
}
