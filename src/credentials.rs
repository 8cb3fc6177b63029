//! Credential hashing and the startup admin seed.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::{
    error::AppError,
    models::{Account, NewAccount, RequestStatus, Role},
    repository::{Repository, RepositoryError},
};

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Argon2 is deliberately slow; keep it off the async worker threads.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Dependency(format!("hashing task failed: {e}")))?
        .map_err(|e| AppError::Dependency(format!("could not hash credential: {e}")))
}

pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

/// seed_admin
///
/// Ensures an approved admin account exists for `email`. Admins never pass through the
/// approval queue, so this is the only way one comes into being. The email is stored
/// lowercased, the same form `login` looks it up by.
pub async fn seed_admin(
    repo: &dyn Repository,
    email: &str,
    password: &str,
) -> Result<Account, RepositoryError> {
    let email = email.trim().to_lowercase();
    if let Some(existing) = repo.find_account_by_login(&email).await? {
        if existing.role != Role::Admin {
            return Err(RepositoryError::Conflict(format!(
                "{email} is registered to a {} account",
                existing.role
            )));
        }
        return Ok(existing);
    }

    let password_hash =
        hash_password(password).map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

    let admin = repo
        .create_account(NewAccount {
            name: "Administrator".to_string(),
            mobile: None,
            email: Some(email.clone()),
            password_hash,
            role: Role::Admin,
            request_status: RequestStatus::Approved,
            is_verified: true,
        })
        .await?;
    tracing::info!(account_id = %admin.id, %email, "admin account seeded");
    Ok(admin)
}
