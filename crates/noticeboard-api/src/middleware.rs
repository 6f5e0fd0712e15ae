use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::error::ApiError;
use crate::state::AppState;

/// Gate for protected routes: resolves the session cookie and hands the
/// [`SessionUser`](crate::session::SessionUser) to the handler as a request
/// extension. Anonymous requests stop here with 401.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = state.sessions.read(&jar).ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
