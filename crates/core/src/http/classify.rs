//! Response classification.
//!
//! 401 is always an auth failure. 403 only counts as one when the server
//! says the token itself is bad; otherwise it is a real permission denial.

use authwire_domain::{ApiResponse, Classification};
use serde_json::Value;

const INVALID_TOKEN_CODES: [&str; 2] = ["invalid_token", "token_expired"];

/// Classify a transport-level response.
pub fn classify_response(response: &ApiResponse) -> Classification {
    match response.status {
        200..=399 => Classification::Success,
        401 => Classification::AuthFailure,
        403 if carries_invalid_token(response) => Classification::AuthFailure,
        408 | 429 => Classification::TransientFailure,
        500..=599 => Classification::TransientFailure,
        _ => Classification::PermanentFailure,
    }
}

fn carries_invalid_token(response: &ApiResponse) -> bool {
    if let Some(challenge) = response.header("www-authenticate") {
        if challenge.to_ascii_lowercase().contains("invalid_token") {
            return true;
        }
    }

    let Ok(body) = serde_json::from_slice::<Value>(&response.body) else {
        return false;
    };
    ["error", "code"].iter().any(|field| {
        body.get(field)
            .and_then(Value::as_str)
            .is_some_and(|code| INVALID_TOKEN_CODES.contains(&code.to_ascii_lowercase().as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ranges() {
        let cases = [
            (200, Classification::Success),
            (204, Classification::Success),
            (304, Classification::Success),
            (401, Classification::AuthFailure),
            (403, Classification::PermanentFailure),
            (404, Classification::PermanentFailure),
            (408, Classification::TransientFailure),
            (422, Classification::PermanentFailure),
            (429, Classification::TransientFailure),
            (500, Classification::TransientFailure),
            (503, Classification::TransientFailure),
        ];
        for (status, expected) in cases {
            assert_eq!(classify_response(&ApiResponse::new(status)), expected, "status {status}");
        }
    }

    #[test]
    fn forbidden_with_invalid_token_challenge_is_auth_failure() {
        let response = ApiResponse::new(403)
            .with_header("WWW-Authenticate", r#"Bearer error="invalid_token""#);
        assert_eq!(classify_response(&response), Classification::AuthFailure);
    }

    #[test]
    fn forbidden_with_token_error_body_is_auth_failure() {
        let response = ApiResponse::new(403).with_body(r#"{"code": "TOKEN_EXPIRED"}"#);
        assert_eq!(classify_response(&response), Classification::AuthFailure);

        let response = ApiResponse::new(403).with_body(r#"{"error": "insufficient_scope"}"#);
        assert_eq!(classify_response(&response), Classification::PermanentFailure);
    }
}
