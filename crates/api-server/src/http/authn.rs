use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::warn;

use super::errors::unauthorized_response;
use super::{AppState, AuthUser};

/// Tokens are issued by the account service; either claim key carries
/// the numeric user id depending on the issuer version.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, rename = "userId")]
    user_id: Option<i64>,
}

pub(super) async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        warn!("missing or invalid authorization header");
        return unauthorized_response();
    };

    let user_id = match decode_user_id(token, &state.jwt_secret) {
        Some(user_id) => user_id,
        None => {
            warn!("jwt rejected");
            return unauthorized_response();
        }
    };

    req.extensions_mut().insert(AuthUser { user_id });
    next.run(req).await
}

fn decode_user_id(token: &str, secret: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked when present; not every issuer sets it.
    validation.required_spec_claims.clear();

    let decoded = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()?;

    decoded.claims.id.or(decoded.claims.user_id)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;

    use super::decode_user_id;

    const SECRET: &str = "test-secret";

    fn encode(claims: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("token should encode")
    }

    #[test]
    fn id_claim_resolves_the_user() {
        let token = encode(json!({"id": 42}));
        assert_eq!(decode_user_id(&token, SECRET), Some(42));
    }

    #[test]
    fn user_id_claim_is_accepted_as_fallback() {
        let token = encode(json!({"userId": 7}));
        assert_eq!(decode_user_id(&token, SECRET), Some(7));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode(json!({"id": 42}));
        assert_eq!(decode_user_id(&token, "other-secret"), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = encode(json!({"id": 42, "exp": 1_000_000}));
        assert_eq!(decode_user_id(&token, SECRET), None);
    }

    #[test]
    fn token_without_exp_claim_is_accepted() {
        // Not every issuer version sets an expiry; only a present,
        // stale exp must reject.
        let token = encode(json!({"id": 42}));
        assert_eq!(decode_user_id(&token, SECRET), Some(42));
    }
}
