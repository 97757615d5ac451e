/// CSRF (Cross-Site Request Forgery) protection
///
/// State-changing API calls (POST, PUT, PATCH, DELETE) must echo the
/// session's CSRF token in the `X-CSRF-Token` header.
///
/// The token is:
/// - Generated once per session
/// - Stored in the session cookie
/// - Handed to the client by `GET /api/session`
/// - Checked by the [`CsrfGuard`] extractor before the handler runs
///
/// Usage in handlers:
/// ```rust,ignore
/// #[post("/citizens")]
/// async fn create(_csrf: CsrfGuard, client: ClientCtx, ...) -> PortalResult<HttpResponse> {
///     // Token already verified
/// }
/// ```
use crate::session::constant_time_eq;
use actix_session::{Session, SessionExt};
use actix_web::dev::Payload;
use actix_web::http::Method;
use actix_web::{error, Error, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use rand::{distributions::Alphanumeric, Rng};

pub const CSRF_TOKEN_LENGTH: usize = 32;
pub const CSRF_HEADER: &str = "X-CSRF-Token";
const CSRF_SESSION_KEY: &str = "csrf_token";

/// Generate a new CSRF token
pub fn generate_csrf_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Get or create CSRF token for the current session
///
/// This is automatically called when ClientCtx is created from session,
/// ensuring every request has a CSRF token available.
pub fn get_or_create_csrf_token(session: &Session) -> Result<String, Error> {
    match session.get::<String>(CSRF_SESSION_KEY) {
        Ok(Some(token)) => Ok(token),
        _ => {
            let token = generate_csrf_token();
            session
                .insert(CSRF_SESSION_KEY, token.clone())
                .map_err(|_| error::ErrorInternalServerError("Failed to store CSRF token"))?;
            Ok(token)
        }
    }
}

/// Validate a CSRF token against the one stored in the session
pub fn validate_csrf_token(session: &Session, provided_token: &str) -> Result<(), Error> {
    let expected_token = session
        .get::<String>(CSRF_SESSION_KEY)
        .map_err(|_| error::ErrorInternalServerError("Failed to get CSRF token"))?
        .ok_or_else(|| error::ErrorForbidden("CSRF token not found in session"))?;

    if !constant_time_eq(provided_token, &expected_token) {
        log::warn!("CSRF token validation failed");
        return Err(error::ErrorForbidden("Invalid CSRF token"));
    }

    Ok(())
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Extractor that rejects state-changing requests without a valid token.
#[derive(Clone, Copy, Debug)]
pub struct CsrfGuard;

impl FromRequest for CsrfGuard {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if is_safe_method(req.method()) {
            return ready(Ok(CsrfGuard));
        }

        let provided = req
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        ready(validate_csrf_token(&req.get_session(), provided).map(|_| CsrfGuard))
    }
}
