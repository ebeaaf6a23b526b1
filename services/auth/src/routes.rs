//! Authentication service routes

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    AppState,
    error::{ActionError, ActionResult},
    google::CredentialError,
    models::auth_token::generate_token,
    pin::{self, PinIssuance},
    redaction::mask_email,
    session,
    validation::{GoogleForm, LoginForm, SubmitForm, is_local_redirect, is_well_formed_pin},
};

/// Body returned by the sign-in actions
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<bool>,
}

/// Query accepted by the PIN page
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub redirect_url: Option<String>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/pin_code", get(pin_code_page))
        .route("/pin_code/login", post(login))
        .route("/pin_code/submit", post(submit))
        .route("/pin_code/google", post(google))
        .with_state(state)
}

/// 302 to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, database) = match &state.db_pool {
        Some(pool) => {
            if common::database::health_check(pool).await {
                (StatusCode::OK, "ok")
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
            }
        }
        None => (StatusCode::OK, "in-memory"),
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "pin-auth",
            "database": database,
        })),
    )
}

/// PIN page guard: signed-in visitors are sent on to `redirect_url`,
/// everyone else back home
pub async fn pin_code_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> ActionResult<Response> {
    let user = session::current_user(&state, &jar).await.map_err(|e| {
        error!("Failed to resolve session: {}", e);
        ActionError::InternalServerError
    })?;

    if user.is_none() {
        return Ok(found(&state.config.home_path));
    }

    let target = query
        .redirect_url
        .filter(|target| is_local_redirect(target))
        .unwrap_or_else(|| state.config.home_path.clone());

    Ok(found(&target))
}

/// `login` action: issue and mail a PIN
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ActionResult<Response> {
    let Ok(input) = form.validate() else {
        info!("Login submitted without email, redirecting home");
        return Ok(found(&state.config.home_path));
    };

    let issuance = pin::issue_pin(&state, &input.email).await.map_err(|e| {
        error!("Failed to issue PIN: {}", e);
        ActionError::InternalServerError
    })?;

    let response = match issuance {
        PinIssuance::UnknownUser => ActionResponse {
            success: Some(false),
            email: Some(input.email),
            missing: Some(false),
            credentials: Some(true),
        },
        PinIssuance::Issued { .. } => ActionResponse {
            success: Some(true),
            email: Some(input.email),
            missing: Some(false),
            credentials: Some(false),
        },
    };

    Ok(Json(response).into_response())
}

/// `submit` action: verify a PIN and start a session
pub async fn submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SubmitForm>,
) -> ActionResult<(CookieJar, Json<ActionResponse>)> {
    let input = form
        .validate()
        .map_err(|e| ActionError::Missing { email: e.email })?;

    if !is_well_formed_pin(&input.pin_code, state.config.pin_length) {
        return Err(ActionError::InvalidCredentials { email: input.email });
    }

    let token = pin::verify_pin(&state, &input.email, &input.pin_code)
        .await
        .map_err(|e| {
            error!("Failed to verify PIN: {}", e);
            ActionError::InternalServerError
        })?
        .ok_or_else(|| ActionError::InvalidCredentials {
            email: input.email.clone(),
        })?;

    let jar = state.cookies.set_session_id(jar, &token.token);

    Ok((
        jar,
        Json(ActionResponse {
            success: Some(true),
            email: Some(input.email),
            ..Default::default()
        }),
    ))
}

/// `google` action: sign in with a Google Identity credential
pub async fn google(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<GoogleForm>,
) -> ActionResult<Response> {
    let input = form.validate().map_err(|_| {
        warn!("Google sign-in submitted without credential");
        ActionError::InvalidCredential
    })?;

    let identity = state
        .verifier
        .verify(&input.credential)
        .await
        .map_err(|e| match e {
            CredentialError::KeySet(reason) => {
                error!("Google signing keys unavailable: {}", reason);
                ActionError::InternalServerError
            }
            other => {
                warn!("Rejected Google credential: {}", other);
                ActionError::InvalidCredential
            }
        })?;

    info!(
        "Google credential for subject {} ({})",
        identity.sub,
        mask_email(&identity.email)
    );

    let user = state
        .users
        .find_by_email(&identity.email)
        .await
        .map_err(|e| {
            error!("Failed to look up user: {}", e);
            ActionError::InternalServerError
        })?;

    let Some(user) = user else {
        info!("No account for {}", mask_email(&identity.email));
        return Ok(Json(ActionResponse {
            email: Some(identity.email),
            missing: Some(false),
            credentials: Some(true),
            ..Default::default()
        })
        .into_response());
    };

    let token = state
        .tokens
        .rotate(user.id, &generate_token())
        .await
        .map_err(|e| {
            error!("Failed to rotate session token: {}", e);
            ActionError::InternalServerError
        })?;

    info!("Google sign-in, session rotated for user: {}", user.id);

    let jar = state.cookies.set_session_id(jar, &token.token);
    Ok((jar, found(&state.config.login_path)).into_response())
}
