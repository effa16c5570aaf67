use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    claims::TokenKind,
    dto::{RegisterRequest, TokenRequest, UpdateMeRequest},
    jwt::{JwtKeys, TokenPair},
    password,
    repo_types::{NewUser, User},
};
use crate::{
    config::AdminBootstrap,
    error::{AppError, FieldErrors},
};

const MAX_EMAIL_LEN: usize = 255;
const MAX_NAME_LEN: usize = 255;
const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex");
}

/// Trims the address and lower-cases its domain part; the local part is kept as typed.
pub fn normalize_email(raw: &str) -> String {
    let email = raw.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.add("email", "This field may not be blank.");
    } else if !is_valid_email(email) {
        errors.add("email", "Enter a valid email address.");
    }
}

fn check_name(name: &str, errors: &mut FieldErrors) {
    if name.chars().count() > MAX_NAME_LEN {
        errors.add("name", format!("Ensure this field has no more than {MAX_NAME_LEN} characters."));
    }
}

fn check_password(plain: &str, errors: &mut FieldErrors) {
    if let Err(msg) = password::check_policy(plain) {
        errors.add("password", msg);
    }
}

/// Validates and normalizes a registration payload without touching the database.
pub fn validate_registration(req: &RegisterRequest) -> Result<(String, String), AppError> {
    let email = normalize_email(&req.email);
    let name = req.name.trim().to_string();
    let mut errors = FieldErrors::new();
    check_email(&email, &mut errors);
    check_name(&name, &mut errors);
    check_password(&req.password, &mut errors);
    errors.into_result()?;
    Ok((email, name))
}

pub async fn register(db: &PgPool, req: RegisterRequest) -> Result<User, AppError> {
    let (email, name) = validate_registration(&req)?;
    let hash = password::hash_password(&req.password)?;

    let user = User::create(
        db,
        &NewUser {
            email: &email,
            name: &name,
            password_hash: &hash,
            is_staff: false,
        },
    )
    .await?
    .ok_or_else(|| {
        warn!(%email, "email already registered");
        AppError::field("email", "user with this email already exists.")
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Exchanges email/password for a token pair. Every failure cause reads the same to the caller.
pub async fn issue_tokens(
    db: &PgPool,
    keys: &JwtKeys,
    req: TokenRequest,
) -> Result<(User, TokenPair), AppError> {
    let email = normalize_email(&req.email);
    let user = match User::find_by_email(db, &email).await? {
        Some(u) => u,
        None => {
            password::verify_dummy(&req.password);
            warn!(%email, "token request for unknown email");
            return Err(AppError::field("non_field_errors", BAD_CREDENTIALS));
        }
    };

    if !password::verify_password(&req.password, &user.password_hash)? || !user.is_active {
        warn!(user_id = %user.id, "token request rejected");
        return Err(AppError::field("non_field_errors", BAD_CREDENTIALS));
    }

    let pair = keys.issue_pair(user.id)?;
    info!(user_id = %user.id, "token issued");
    Ok((user, pair))
}

pub async fn refresh_tokens(
    db: &PgPool,
    keys: &JwtKeys,
    refresh_token: &str,
) -> Result<(User, TokenPair), AppError> {
    let claims = keys
        .verify_kind(refresh_token, TokenKind::Refresh)
        .map_err(|_| AppError::Unauthenticated)?;
    let user = active_user(db, claims.sub).await?;
    let pair = keys.issue_pair(user.id)?;
    Ok((user, pair))
}

/// Loads the caller's row; a token for a removed or deactivated account is unauthenticated.
pub async fn active_user(db: &PgPool, user_id: Uuid) -> Result<User, AppError> {
    match User::find_by_id(db, user_id).await? {
        Some(u) if u.is_active => Ok(u),
        _ => Err(AppError::Unauthenticated),
    }
}

/// Applies a profile patch to `user` in memory, validating every present field.
pub fn apply_profile_patch(user: &mut User, patch: UpdateMeRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    let email = patch.email.as_deref().map(normalize_email);
    if let Some(email) = &email {
        check_email(email, &mut errors);
    }
    let name = patch.name.as_deref().map(|n| n.trim().to_string());
    if let Some(name) = &name {
        check_name(name, &mut errors);
    }
    if let Some(plain) = &patch.password {
        check_password(plain, &mut errors);
    }
    errors.into_result()?;

    if let Some(email) = email {
        user.email = email;
    }
    if let Some(name) = name {
        user.name = name;
    }
    if let Some(plain) = patch.password {
        user.password_hash = password::hash_password(&plain)?;
    }
    Ok(())
}

pub async fn update_me(
    db: &PgPool,
    user_id: Uuid,
    patch: UpdateMeRequest,
) -> Result<User, AppError> {
    let mut user = active_user(db, user_id).await?;
    apply_profile_patch(&mut user, patch)?;
    let saved = User::save_profile(db, &user)
        .await?
        .ok_or_else(|| AppError::field("email", "user with this email already exists."))?;
    info!(user_id = %saved.id, "profile updated");
    Ok(saved)
}

/// Ensures the configured staff account exists. An existing row is left untouched.
pub async fn bootstrap_superuser(db: &PgPool, admin: &AdminBootstrap) -> anyhow::Result<()> {
    let email = normalize_email(&admin.email);
    anyhow::ensure!(is_valid_email(&email), "ADMIN_EMAIL is not a valid address");
    if let Err(msg) = password::check_policy(&admin.password) {
        anyhow::bail!("ADMIN_PASSWORD rejected: {msg}");
    }

    if User::find_by_email(db, &email).await?.is_some() {
        info!(%email, "staff account already present");
        return Ok(());
    }

    let hash = password::hash_password(&admin.password)?;
    if let Some(user) = User::create(
        db,
        &NewUser {
            email: &email,
            name: "admin",
            password_hash: &hash,
            is_staff: true,
        },
    )
    .await?
    {
        info!(user_id = %user.id, %email, "staff account created");
    }
    Ok(())
}
