use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1";

/// Id tokens are refreshed this long before they lapse.
pub const REFRESH_MARGIN_SECS: i64 = 300;
const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// A signed-in desk user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    pub local_id: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Unix time the id token lapses. Sessions saved without it count as expired.
    #[serde(default)]
    pub expires_at: i64,
}

impl Session {
    /// True once the id token is within [`REFRESH_MARGIN_SECS`] of lapsing.
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - now <= REFRESH_MARGIN_SECS
    }
}

/// `expiresIn` arrives as a string of seconds.
fn expiry(expires_in: &str, now: i64) -> i64 {
    now + expires_in.trim().parse::<i64>().unwrap_or(DEFAULT_LIFETIME_SECS)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The service refused the credentials; the message is fit for display.
    #[error("{0}")]
    Rejected(String),
    #[error("could not reach the sign-in service: {0}")]
    Network(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    #[serde(default)]
    email: String,
    local_id: String,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: String,
}

impl PasswordResponse {
    fn into_session(self, email: &str, now: i64) -> Session {
        Session {
            email: if self.email.is_empty() { email.trim().to_string() } else { self.email },
            local_id: self.local_id,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_at: expiry(&self.expires_in, now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Email/password accounts through the Identity Toolkit REST API.
#[derive(Clone)]
pub struct AuthClient {
    endpoint: String,
    token_endpoint: String,
    api_key: String,
    http: Client,
}

impl AuthClient {
    pub fn new(api_key: &str) -> Result<Self, AuthError> {
        Self::with_endpoints(api_key, DEFAULT_ENDPOINT, DEFAULT_TOKEN_ENDPOINT)
    }

    pub fn with_endpoints(api_key: &str, endpoint: &str, token_endpoint: &str) -> Result<Self, AuthError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AuthError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token_endpoint: token_endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.password_call("accounts:signInWithPassword", email, password).await?;
        log::info!("Signed in as {}", session.email);
        Ok(session)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.password_call("accounts:signUp", email, password).await?;
        log::info!("Registered {}", session.email);
        Ok(session)
    }

    /// Exchanges a refresh token for a fresh id token.
    pub async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let url = format!("{}/token", self.token_endpoint);
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let text = read_success(resp).await?;
        let body: RefreshResponse = serde_json::from_str(&text)
            .map_err(|e| AuthError::Network(format!("Unexpected token response: {}", e)))?;
        log::debug!("Refreshed id token for {}", session.email);
        Ok(Session {
            email: session.email.clone(),
            local_id: body.user_id,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: expiry(&body.expires_in, chrono::Utc::now().timestamp()),
        })
    }

    async fn password_call(&self, method: &str, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/{}", self.endpoint, method);
        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "email": email.trim(),
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let text = read_success(resp).await?;
        let body: PasswordResponse = serde_json::from_str(&text)
            .map_err(|e| AuthError::Network(format!("Unexpected sign-in response: {}", e)))?;
        Ok(body.into_session(email, chrono::Utc::now().timestamp()))
    }
}

async fn read_success(resp: reqwest::Response) -> Result<String, AuthError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| AuthError::Network(format!("Failed to read response: {}", e)))?;
    if status.is_success() {
        Ok(text)
    } else {
        Err(rejection(&text))
    }
}

fn rejection(body: &str) -> AuthError {
    let code = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_default();
    AuthError::Rejected(friendly_message(&code))
}

/// Turns an Identity Toolkit error code into something a receptionist can act on.
fn friendly_message(code: &str) -> String {
    // Some codes carry detail after " : ", e.g. "WEAK_PASSWORD : Password should be ..."
    let (head, detail) = match code.split_once(" : ") {
        Some((head, detail)) => (head.trim(), Some(detail.trim())),
        None => (code.trim(), None),
    };
    let message = match head {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Incorrect email or password."
        }
        "INVALID_EMAIL" => "That email address is not valid.",
        "EMAIL_EXISTS" => "An account with this email already exists.",
        "WEAK_PASSWORD" => return detail.unwrap_or("Password is too weak.").to_string(),
        "USER_DISABLED" => "This account has been disabled.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts. Try again later.",
        "MISSING_PASSWORD" => "Enter a password.",
        "" => "Sign-in failed.",
        other => return other.to_string(),
    };
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_codes() {
        assert_eq!(friendly_message("EMAIL_NOT_FOUND"), "Incorrect email or password.");
        assert_eq!(friendly_message("EMAIL_EXISTS"), "An account with this email already exists.");
        assert_eq!(
            friendly_message("WEAK_PASSWORD : Password should be at least 6 characters"),
            "Password should be at least 6 characters"
        );
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(friendly_message("OPERATION_NOT_ALLOWED"), "OPERATION_NOT_ALLOWED");
        assert_eq!(friendly_message(""), "Sign-in failed.");
    }

    #[test]
    fn rejection_reads_error_body() {
        let body = r#"{"error": {"code": 400, "message": "INVALID_PASSWORD", "errors": []}}"#;
        assert_eq!(
            rejection(body),
            AuthError::Rejected("Incorrect email or password.".to_string())
        );
        assert_eq!(rejection("not json"), AuthError::Rejected("Sign-in failed.".to_string()));
    }

    #[test]
    fn parses_password_response() {
        let text = r#"{
          "kind": "identitytoolkit#VerifyPasswordResponse",
          "localId": "u1",
          "email": "desk@example.com",
          "idToken": "id",
          "refreshToken": "refresh",
          "expiresIn": "3600",
          "registered": true
        }"#;
        let body: PasswordResponse = serde_json::from_str(text).unwrap();
        assert_eq!(body.local_id, "u1");
        let session = body.into_session("ignored@example.com", 1_000);
        assert_eq!(session.email, "desk@example.com");
        assert_eq!(session.refresh_token, "refresh");
        assert_eq!(session.expires_at, 4_600);
    }

    #[test]
    fn refresh_is_due_near_expiry() {
        let session = Session {
            email: "desk@example.com".to_string(),
            local_id: "u1".to_string(),
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 10_000,
        };
        assert!(!session.needs_refresh(10_000 - REFRESH_MARGIN_SECS - 1));
        assert!(session.needs_refresh(10_000 - REFRESH_MARGIN_SECS));
        assert!(session.needs_refresh(20_000));
    }

    #[test]
    fn sessions_saved_without_expiry_need_refresh() {
        let saved = r#"{"email":"a@b.c","local_id":"u1","id_token":"id","refresh_token":"r"}"#;
        let session: Session = serde_json::from_str(saved).unwrap();
        assert_eq!(session.expires_at, 0);
        assert!(session.needs_refresh(chrono::Utc::now().timestamp()));
    }

    #[tokio::test]
    async fn refresh_returns_new_token_and_expiry() {
        use wiremock::matchers::{body_string_contains, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_token": "fresh",
                "refresh_token": "new-refresh",
                "user_id": "u1",
                "expires_in": "3600"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::with_endpoints("key", &server.uri(), &server.uri()).unwrap();
        let stale = Session {
            email: "desk@example.com".to_string(),
            local_id: "u1".to_string(),
            id_token: "stale".to_string(),
            refresh_token: "old-refresh".to_string(),
            expires_at: 0,
        };
        let now = chrono::Utc::now().timestamp();
        let fresh = client.refresh(&stale).await.unwrap();
        assert_eq!(fresh.id_token, "fresh");
        assert_eq!(fresh.refresh_token, "new-refresh");
        assert_eq!(fresh.email, "desk@example.com");
        assert!(!fresh.needs_refresh(now));
    }
}
