use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LegacyRegisterRequest, LoginRequest, PublicUser, RegisterRequest},
        password::{hash_password, temporary_password, verify_password},
        repo_types::NewUser,
        services::{derive_user_id, is_valid_email},
    },
    error::{required, AppError, AppJson, AppResult},
    messaging::DirectoryUser,
    state::AppState,
};

const BAD_CREDENTIALS: &str = "Incorrect email or password";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn legacy_routes() -> Router<AppState> {
    Router::new().route("/register-user", post(register_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    const MISSING: &str = "Name, email and password are required";
    let name = required(&payload.name, MISSING)?;
    let email = required(&payload.email, MISSING)?;
    let password = required(&payload.password, MISSING)?;

    if !is_valid_email(email) {
        return Err(AppError::Validation("Invalid email".into()));
    }

    let user_id = derive_user_id(email);
    if state.users.exists(&user_id).await? {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let hash = hash_password(password)?;

    state
        .messaging
        .upsert_user(&DirectoryUser::member(&user_id, name, email))
        .await?;

    let created = state
        .users
        .create(NewUser { user_id: &user_id, name, email, password_hash: &hash })
        .await?
        .ok_or_else(|| {
            warn!(%user_id, "user id taken by a concurrent registration");
            AppError::Conflict("User already exists".into())
        })?;

    let token = state.jwt.sign(&created.user_id, &created.email)?;

    info!(user_id = %created.user_id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".into(),
            token,
            user: PublicUser {
                user_id: created.user_id,
                name: created.name,
                email: created.email,
            },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    const MISSING: &str = "Email and password are required";
    let email = required(&payload.email, MISSING)?;
    let password = required(&payload.password, MISSING)?;

    let user_id = derive_user_id(email);
    let user = match state.users.find_by_id(&user_id).await? {
        Some(u) => u,
        None => {
            warn!(%user_id, "login for unknown user");
            return Err(AppError::Auth(BAD_CREDENTIALS.into()));
        }
    };

    let Some(hash) = user.password_hash.as_deref().filter(|h| !h.is_empty()) else {
        warn!(%user_id, "login for user without a password hash");
        return Err(AppError::Auth(BAD_CREDENTIALS.into()));
    };

    let ok = verify_password(password, hash).unwrap_or_else(|e| {
        error!(error = %e, %user_id, "stored password hash is unreadable");
        false
    });
    if !ok {
        warn!(%user_id, "login invalid password");
        return Err(AppError::Auth(BAD_CREDENTIALS.into()));
    }

    let token = state.jwt.sign(&user.user_id, &user.email)?;

    info!(%user_id, "user logged in");
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token,
        user: PublicUser {
            user_id: user.user_id,
            name: user.name,
            email: user.email,
        },
    }))
}

/// Older clients register without a password; the account gets an
/// unguessable temporary one.
#[instrument(skip(state, payload))]
pub async fn register_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LegacyRegisterRequest>,
) -> AppResult<Json<PublicUser>> {
    const MISSING: &str = "Name and email are required";
    let name = required(&payload.name, MISSING)?;
    let email = required(&payload.email, MISSING)?;

    let user_id = derive_user_id(email);

    if !state.messaging.user_exists(&user_id).await? {
        state
            .messaging
            .upsert_user(&DirectoryUser::member(&user_id, name, email))
            .await?;
    }

    if !state.users.exists(&user_id).await? {
        info!(%user_id, "user missing from database, adding");
        let hash = hash_password(&temporary_password())?;
        state
            .users
            .create(NewUser { user_id: &user_id, name, email, password_hash: &hash })
            .await?;
    }

    Ok(Json(PublicUser {
        user_id,
        name: name.to_string(),
        email: email.to_string(),
    }))
}
