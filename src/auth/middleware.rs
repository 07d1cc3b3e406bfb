use actix_web::{HttpRequest, HttpResponse};

use super::keys::{key_suffix, ApiKeySet};
use crate::ErrorResponse;

const API_KEY_HEADER: &str = "x-api-key";

/// Extract the API key from the `x-api-key` header.
fn extract_api_key(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Gate a request on the configured key set.
///
/// When the set is empty authentication is disabled and every request
/// passes; this is the documented fallback for deployments that configure
/// no keys. Only the last four characters of a presented key ever reach
/// the logs.
pub fn require_api_key(req: &HttpRequest, keys: &ApiKeySet) -> Result<(), HttpResponse> {
    if keys.is_empty() {
        log::debug!("No API keys configured, skipping authentication");
        return Ok(());
    }

    let api_key = match extract_api_key(req) {
        Some(key) => key,
        None => {
            return Err(HttpResponse::Unauthorized().json(ErrorResponse::new(
                "Unauthorized",
                "Missing API key. Provide x-api-key in request headers",
            )));
        }
    };

    if !keys.is_valid(&api_key) {
        log::warn!(
            "Rejected request with invalid API key ending in ...{}",
            key_suffix(&api_key)
        );
        return Err(HttpResponse::Unauthorized().json(ErrorResponse::new(
            "Unauthorized",
            "The provided API key is not valid",
        )));
    }

    log::info!(
        "Request authenticated with key ending in ...{}",
        key_suffix(&api_key)
    );
    Ok(())
}
