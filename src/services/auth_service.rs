use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{LoginRequest, RefreshRequest, RegisterRequest, TokenPair, TokenType, encode_token},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, decode_token},
    models::User,
    repository::accounts,
    response::ApiResponse,
    state::AppState,
    status::Role,
};

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest { email, password } = payload;
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("invalid email".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if accounts::find_user_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email is already taken".into()));
    }

    let password_hash = hash_password(&password)?;
    let user = accounts::insert_user(&state.pool, &email, &password_hash, Role::User)
        .await
        .map_err(|e| e.with_conflict_message("Email is already taken"))?;

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    Ok(ApiResponse::success("User created", user, None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<TokenPair>> {
    let LoginRequest { email, password } = payload;
    let user = accounts::find_user_by_email(&state.pool, &email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid_credentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid_credentials());
    }

    let role = user
        .role()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown role {}", user.role)))?;
    let tokens = issue_tokens(&state.config, user.id, role)?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    Ok(ApiResponse::success("Logged in", tokens, None))
}

/// Trades a refresh token for a fresh pair. The account must still exist.
pub async fn refresh(
    state: &AppState,
    payload: RefreshRequest,
) -> AppResult<ApiResponse<TokenPair>> {
    let claims = decode_token(
        &payload.refresh_token,
        &state.config.jwt_secret,
        TokenType::Refresh,
    )?;
    let AuthUser { user_id, .. } = AuthUser::try_from(claims)?;
    let user = accounts::find_user(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".into()))?;
    let role = user
        .role()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown role {}", user.role)))?;
    let tokens = issue_tokens(&state.config, user.id, role)?;
    Ok(ApiResponse::success("Token refreshed", tokens, None))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn issue_tokens(config: &AppConfig, user_id: i64, role: Role) -> AppResult<TokenPair> {
    Ok(TokenPair {
        access_token: encode_token(
            user_id,
            role,
            TokenType::Access,
            config.access_token_ttl_minutes,
            &config.jwt_secret,
        )?,
        refresh_token: encode_token(
            user_id,
            role,
            TokenType::Refresh,
            config.refresh_token_ttl_hours * 60,
            &config.jwt_secret,
        )?,
    })
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("correct horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"correct horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
