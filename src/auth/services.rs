use tracing::{info, instrument, warn};

use crate::auth::{
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::User,
};
use crate::error::{AppError, AppResult, RepositoryError};

/// Create an account. Usernames are matched exactly, case included.
#[instrument(skip(users, password))]
pub async fn register(users: &dyn UserStore, username: &str, password: &str) -> AppResult<User> {
    if users.find_by_username(username).await?.is_some() {
        warn!("username already registered");
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let hash = hash_password(password)?;

    // A concurrent registration can still win the unique index.
    let user = users.create(username, &hash).await.map_err(|e| match e {
        RepositoryError::Conflict => {
            warn!("username taken concurrently");
            AppError::Conflict("Username already exists".into())
        }
        other => other.into(),
    })?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Check credentials and return the stored account.
#[instrument(skip(users, password))]
pub async fn login(users: &dyn UserStore, username: &str, password: &str) -> AppResult<User> {
    let Some(user) = users.find_by_username(username).await? else {
        warn!("login unknown username");
        return Err(invalid_credentials());
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

fn invalid_credentials() -> AppError {
    AppError::Auth("Invalid credentials".into())
}
