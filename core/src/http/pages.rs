use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{Html, Response},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, redirect};
use crate::auth::session;
use crate::error::ServiceError;

const LOGIN_FAILED_LOCATION: &str = "/login?error=Invalid+username+or+password";

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Login - Polymarket Dashboard</title>
    <style>
        body { font-family: system-ui, sans-serif; background: #f3f4f6; min-height: 100vh; margin: 0;
               display: flex; align-items: center; justify-content: center; }
        .card { background: #fff; padding: 2rem; border-radius: 0.5rem; width: 100%; max-width: 28rem;
                box-shadow: 0 1px 3px rgba(0, 0, 0, 0.1); }
        h1 { font-size: 1.5rem; color: #1f2937; margin: 0; text-align: center; }
        p.sub { color: #4b5563; text-align: center; margin-bottom: 2rem; }
        .error { margin-bottom: 1rem; padding: 1rem; background: #fef2f2; border: 1px solid #fecaca;
                 border-radius: 0.375rem; color: #dc2626; font-size: 0.875rem; }
        label { display: block; font-size: 0.875rem; color: #374151; }
        input { display: block; width: 100%; box-sizing: border-box; margin: 0.25rem 0 1.5rem;
                padding: 0.5rem 0.75rem; border: 1px solid #d1d5db; border-radius: 0.375rem; }
        button { width: 100%; padding: 0.5rem 1rem; border: 0; border-radius: 0.375rem;
                 background: #2563eb; color: #fff; font-size: 0.875rem; cursor: pointer; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Polymarket Dashboard</h1>
        <p class="sub">Sign in to continue</p>
        {error_message}
        <form method="post" action="/auth/login">
            <label for="username">Username</label>
            <input type="text" id="username" name="username" required>
            <label for="password">Password</label>
            <input type="password" id="password" name="password" required>
            <button type="submit">Sign in</button>
        </form>
    </div>
</body>
</html>
"#;

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub(super) fn render_login_page(error: Option<&str>) -> String {
    let error_html = error
        .filter(|e| !e.is_empty())
        .map(|e| format!(r#"<div class="error">{}</div>"#, escape_html(e)))
        .unwrap_or_default();
    LOGIN_PAGE.replace("{error_message}", &error_html)
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginPageQuery {
    error: Option<String>,
}

pub(super) async fn get_login_page(Query(query): Query<LoginPageQuery>) -> Html<String> {
    Html(render_login_page(query.error.as_deref()))
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub(super) async fn post_login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let token = match state.service.login(&form.username, &form.password).await {
        Ok(token) => token,
        Err(ServiceError::Unauthorized(_)) => {
            warn!("failed login attempt for user {:?}", form.username);
            return Ok(redirect(LOGIN_FAILED_LOCATION));
        }
        Err(e) => return Err(e.into()),
    };

    info!("user {} logged in", form.username);
    let cookie = session::session_cookie(
        &token,
        state.service.access_ttl_secs(),
        state.service.config().server_config.cookie_secure,
    );
    let mut response = redirect("/");
    append_cookie(&mut response, &cookie)?;
    Ok(response)
}

pub(super) async fn get_logout(State(state): State<AppState>) -> Result<Response, ApiError> {
    let cookie =
        session::expired_session_cookie(state.service.config().server_config.cookie_secure);
    let mut response = redirect("/login");
    append_cookie(&mut response, &cookie)?;
    Ok(response)
}

#[derive(Debug, Serialize)]
pub(super) struct AuthStatus {
    authenticated: bool,
    username: Option<String>,
}

pub(super) async fn get_auth_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<AuthStatus> {
    let username =
        session::token_from_headers(&headers).and_then(|token| state.service.session_user(token));
    Json(AuthStatus {
        authenticated: username.is_some(),
        username,
    })
}

fn append_cookie(response: &mut Response, cookie: &str) -> Result<(), ApiError> {
    let value = cookie.parse::<HeaderValue>().map_err(|_| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "invalid session cookie")
    })?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}
