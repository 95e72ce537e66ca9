pub mod api;
pub mod config;
pub mod oauth;

use crate::types::{ServiceError, ServiceRequest, ServiceResponse, ServiceResult};
use crate::Service;
use anyhow::{Context, Result};
use async_trait::async_trait;
use linkgate::config::LinkedInConfig;
use linkgate::credentials::TokenStore;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use tracing::{debug, info, warn};

use self::api::{JobSearch, LinkedInClient, ProfileSection, RemoteError};
use self::config::{DEFAULT_JOB_COUNT, DEFAULT_JOB_TITLE, DEFAULT_USER_ID, SERVICE_NAME, USER_AGENT};
use self::oauth::{build_auth_url, exchange_code_for_token, ClientCredentials};

const NO_VALID_TOKEN: &str = "No valid stored token found. Please authenticate first.";
const CREDENTIALS_NOT_CONFIGURED: &str = "LinkedIn OAuth credentials not configured. Please set LINKEDIN_CLIENT_ID and LINKEDIN_CLIENT_SECRET environment variables.";

/// Operations the LinkedIn service dispatches on.
///
/// The wire name of each variant is its snake_case form, e.g.
/// `LinkedInMethod::GetProfile` is `"get_profile"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum LinkedInMethod {
    GetAuthUrl,
    StartAuthFlow,
    ExchangeCodeForToken,
    GetProfile,
    GetUserInfo,
    GetConnections,
    GetPosts,
    CreatePost,
    GetCertifications,
    GetCourses,
    GetExperience,
    SearchJobs,
}

impl LinkedInMethod {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// What the operation fetches, used in failure messages.
    fn capability(self) -> &'static str {
        match self {
            LinkedInMethod::GetAuthUrl | LinkedInMethod::StartAuthFlow => "authorization",
            LinkedInMethod::ExchangeCodeForToken => "token exchange",
            LinkedInMethod::GetProfile => "profile",
            LinkedInMethod::GetUserInfo => "user info",
            LinkedInMethod::GetConnections => "connections",
            LinkedInMethod::GetPosts => "posts",
            LinkedInMethod::CreatePost => "post creation",
            LinkedInMethod::GetCertifications => "certifications",
            LinkedInMethod::GetCourses => "courses",
            LinkedInMethod::GetExperience => "job experience",
            LinkedInMethod::SearchJobs => "job search",
        }
    }

    /// Remediation text for a 403 from the provider.
    fn permission_hint(self) -> String {
        let permissions = match self {
            LinkedInMethod::GetCertifications | LinkedInMethod::GetCourses => {
                "the necessary 'r_compliance' or 'r_basicprofile' permissions"
            }
            LinkedInMethod::GetProfile | LinkedInMethod::GetPosts => {
                "the necessary 'openid' and 'profile' permissions"
            }
            LinkedInMethod::CreatePost => "the necessary 'w_member_social' permission",
            _ => "the necessary permissions",
        };
        format!(
            "Permission denied. Your access token may not have {} for {}.",
            permissions,
            self.capability()
        )
    }

    /// Maps a provider failure onto the service error taxonomy.
    fn remote_failure(self, err: RemoteError) -> ServiceError {
        match err {
            RemoteError::Forbidden { .. } => ServiceError::permission_denied(self.permission_hint()),
            RemoteError::Unauthorized { .. } => ServiceError::unauthenticated(
                "LinkedIn rejected the access token. Please authenticate again.",
            ),
            other => ServiceError::remote(format!(
                "Failed to fetch {}: {}",
                self.capability(),
                other
            )),
        }
    }
}

/// LinkedIn backend: OAuth plumbing plus read/write operations on the
/// member's account.
pub struct LinkedInService {
    config: LinkedInConfig,
    store: Arc<dyn TokenStore>,
    http_client: Client,
}

impl LinkedInService {
    /// Creates the service. Endpoint URLs come from `config`, which is how
    /// tests redirect traffic to a mock server.
    pub fn new(config: LinkedInConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            store,
            http_client,
        })
    }

    fn client(&self, access_token: &str) -> LinkedInClient {
        LinkedInClient::new(
            self.http_client.clone(),
            self.config.api_base_url.as_str(),
            access_token,
        )
    }

    async fn run(&self, method: LinkedInMethod, request: &ServiceRequest) -> ServiceResult {
        match method {
            LinkedInMethod::GetAuthUrl => self.get_auth_url(request),
            LinkedInMethod::StartAuthFlow => self.start_auth_flow(request),
            LinkedInMethod::ExchangeCodeForToken => self.exchange_code_for_token(request).await,
            LinkedInMethod::GetProfile => self.get_profile(request).await,
            LinkedInMethod::GetUserInfo => self.get_user_info(request).await,
            LinkedInMethod::GetConnections => self.get_connections(request).await,
            LinkedInMethod::GetPosts => self.get_posts(request).await,
            LinkedInMethod::CreatePost => self.create_post(request).await,
            LinkedInMethod::GetCertifications => {
                self.get_profile_section(method, ProfileSection::Certifications, request)
                    .await
            }
            LinkedInMethod::GetCourses => {
                self.get_profile_section(method, ProfileSection::Courses, request)
                    .await
            }
            LinkedInMethod::GetExperience => {
                self.get_profile_section(method, ProfileSection::Positions, request)
                    .await
            }
            LinkedInMethod::SearchJobs => self.search_jobs(request).await,
        }
    }

    /// Inline `access_token` wins; otherwise the stored token for `user_id`
    /// (default `default_user`) if it is still valid.
    fn resolve_access_token(&self, request: &ServiceRequest) -> Result<String, ServiceError> {
        if let Some(token) = request.param_non_empty("access_token") {
            return Ok(token.to_string());
        }

        let user_id = user_id(request);
        self.store
            .get_valid(user_id)
            .map_err(ServiceError::storage)?
            .map(|record| record.access_token)
            .ok_or_else(|| {
                debug!(user_id = %user_id, "No valid stored token");
                ServiceError::unauthenticated(NO_VALID_TOKEN)
            })
    }

    fn get_auth_url(&self, request: &ServiceRequest) -> ServiceResult {
        let client_id = self
            .config
            .client_id
            .as_deref()
            .ok_or_else(|| ServiceError::configuration(CREDENTIALS_NOT_CONFIGURED))?;
        let (scope, state) = self.scope_and_state(request);

        let auth_url = build_auth_url(
            &self.config.auth_url,
            client_id,
            &self.config.redirect_uri,
            &scope,
            &state,
        );

        Ok(json!({ "auth_url": auth_url, "state": state }))
    }

    fn start_auth_flow(&self, request: &ServiceRequest) -> ServiceResult {
        let (Some(client_id), Some(_)) = (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) else {
            return Err(ServiceError::configuration(CREDENTIALS_NOT_CONFIGURED));
        };
        let (scope, state) = self.scope_and_state(request);

        let redirect_url = build_auth_url(
            &self.config.auth_url,
            client_id,
            &self.config.redirect_uri,
            &scope,
            &state,
        );

        Ok(json!({
            "redirect_url": redirect_url,
            "state": state,
            "message": "Visit the redirect_url to authorize the application. After authorization, you'll be redirected to the callback URL where the token will be stored."
        }))
    }

    /// Caller-supplied scope and state, or the configured scopes and a fresh
    /// UUID state.
    fn scope_and_state(&self, request: &ServiceRequest) -> (String, String) {
        let scope = request
            .param_non_empty("scope")
            .unwrap_or(self.config.scopes.as_str())
            .to_string();
        let state = request
            .param_non_empty("state")
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        (scope, state)
    }

    async fn exchange_code_for_token(&self, request: &ServiceRequest) -> ServiceResult {
        let code = request
            .param_non_empty("code")
            .ok_or_else(|| ServiceError::validation("Authorization code is required"))?;
        let user_id = user_id(request);

        let (Some(client_id), Some(client_secret)) = (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) else {
            return Err(ServiceError::configuration(CREDENTIALS_NOT_CONFIGURED));
        };

        let credentials = ClientCredentials {
            client_id,
            client_secret,
            redirect_uri: &self.config.redirect_uri,
        };
        let payload =
            exchange_code_for_token(&self.http_client, &self.config.token_url, code, &credentials)
                .await
                .map_err(|e| ServiceError::remote(format!("{:#}", e)))?;

        // Best effort: a missing email never fails the exchange.
        let email = match self.client(&payload.access_token).userinfo().await {
            Ok(info) => info
                .get("email")
                .and_then(Value::as_str)
                .map(str::to_string),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to fetch email after token exchange");
                None
            }
        };

        let record = self
            .store
            .store(user_id, &payload, email.as_deref())
            .map_err(ServiceError::storage)?;

        info!(
            user_id = %record.user_id,
            has_email = record.email.is_some(),
            has_refresh_token = record.refresh_token.is_some(),
            "Stored LinkedIn token"
        );

        Ok(json!({
            "message": "Token stored successfully in database",
            "user_id": record.user_id,
            "email": record.email,
            "token_type": record.token_type,
            "expires_at": record.expires_at.map(|dt| dt.to_rfc3339()),
            "scope": record.scope,
        }))
    }

    async fn get_profile(&self, request: &ServiceRequest) -> ServiceResult {
        let token = self.resolve_access_token(request)?;
        self.client(&token)
            .userinfo()
            .await
            .map_err(|e| LinkedInMethod::GetProfile.remote_failure(e))
    }

    async fn get_user_info(&self, request: &ServiceRequest) -> ServiceResult {
        let method = LinkedInMethod::GetUserInfo;
        let token = self.resolve_access_token(request)?;
        let client = self.client(&token);

        let profile = client.profile().await.map_err(|e| method.remote_failure(e))?;
        let email = client
            .email_address()
            .await
            .map_err(|e| method.remote_failure(e))?;

        Ok(json!({ "profile": profile, "email": email }))
    }

    async fn get_connections(&self, request: &ServiceRequest) -> ServiceResult {
        let token = self.resolve_access_token(request)?;
        self.client(&token)
            .connections()
            .await
            .map_err(|e| LinkedInMethod::GetConnections.remote_failure(e))
    }

    async fn get_posts(&self, request: &ServiceRequest) -> ServiceResult {
        let method = LinkedInMethod::GetPosts;
        let token = self.resolve_access_token(request)?;
        let client = self.client(&token);

        let person_id = person_id(&client, method, "fetching posts").await?;
        client
            .posts_by_author(&person_id)
            .await
            .map_err(|e| method.remote_failure(e))
    }

    async fn create_post(&self, request: &ServiceRequest) -> ServiceResult {
        let method = LinkedInMethod::CreatePost;
        let content = self.validate_post_content(request)?;
        let token = self.resolve_access_token(request)?;
        let client = self.client(&token);

        let person_id = person_id(&client, method, "posting").await?;
        let created = client
            .create_text_post(&person_id, content)
            .await
            .map_err(|e| method.remote_failure(e))?;

        let post_id = created
            .body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(created.restli_id);
        if post_id.is_none() {
            warn!("LinkedIn accepted the post but returned no post id");
        }

        info!(post_id = ?post_id, "Created LinkedIn post");

        Ok(json!({
            "post_id": post_id,
            "post_url": post_id.as_deref().map(config::post_url),
            "content": content,
            "character_count": content.chars().count(),
        }))
    }

    /// Rejects bad content before any remote call is made.
    fn validate_post_content<'a>(&self, request: &'a ServiceRequest) -> Result<&'a str, ServiceError> {
        let content = request
            .param_str("content")
            .ok_or_else(|| ServiceError::validation("Post content is required"))?;

        if content.trim().is_empty() {
            return Err(ServiceError::validation("Post content cannot be empty"));
        }

        if self.config.enforce_post_limits {
            let length = content.chars().count();
            if length > self.config.max_post_length {
                return Err(ServiceError::validation(format!(
                    "Post content exceeds {} character limit",
                    self.config.max_post_length
                )));
            }

            let mentions = content.matches('@').count();
            if mentions > self.config.max_mentions {
                return Err(ServiceError::validation(format!(
                    "Too many mentions ({}). LinkedIn limit is {} per post.",
                    mentions, self.config.max_mentions
                )));
            }
        }

        Ok(content)
    }

    async fn get_profile_section(
        &self,
        method: LinkedInMethod,
        section: ProfileSection,
        request: &ServiceRequest,
    ) -> ServiceResult {
        let token = self.resolve_access_token(request)?;
        let data = self
            .client(&token)
            .profile_section(section)
            .await
            .map_err(|e| method.remote_failure(e))?;

        Ok(data
            .get(section.field())
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    async fn search_jobs(&self, request: &ServiceRequest) -> ServiceResult {
        let token = self.resolve_access_token(request)?;
        let search = JobSearch {
            title: request
                .param_non_empty("title")
                .unwrap_or(DEFAULT_JOB_TITLE)
                .to_string(),
            count: request.param_u64("count").unwrap_or(DEFAULT_JOB_COUNT),
            location: request.param_non_empty("location").map(str::to_string),
            company: request.param_non_empty("company").map(str::to_string),
        };

        self.client(&token)
            .search_jobs(&search)
            .await
            .map_err(|e| LinkedInMethod::SearchJobs.remote_failure(e))
    }
}

fn user_id(request: &ServiceRequest) -> &str {
    request.param_non_empty("user_id").unwrap_or(DEFAULT_USER_ID)
}

/// Resolves the acting member's id (userinfo `sub`).
async fn person_id(
    client: &LinkedInClient,
    method: LinkedInMethod,
    purpose: &str,
) -> Result<String, ServiceError> {
    let info = client.userinfo().await.map_err(|e| match e {
        RemoteError::Forbidden { .. } | RemoteError::Unauthorized { .. } => method.remote_failure(e),
        other => ServiceError::remote(format!(
            "Failed to get user profile for {}: {}",
            purpose, other
        )),
    })?;

    info.get("sub")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ServiceError::remote(format!(
                "Failed to get user profile for {}: userinfo response has no 'sub'",
                purpose
            ))
        })
}

#[async_trait]
impl Service for LinkedInService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn available_methods(&self) -> Vec<String> {
        LinkedInMethod::iter()
            .map(|method| method.as_str().to_string())
            .collect()
    }

    async fn handle(&self, request: ServiceRequest) -> ServiceResponse {
        let Ok(method) = request.method.parse::<LinkedInMethod>() else {
            warn!(method = %request.method, "Unknown LinkedIn method");
            return ServiceResponse::failure(ServiceError::not_found(format!(
                "Unknown method: {}",
                request.method
            )));
        };

        debug!(method = method.as_str(), "Handling LinkedIn request");

        let result = self.run(method, &request).await;
        if let Err(e) = &result {
            warn!(
                method = method.as_str(),
                error_kind = ?e.kind,
                error = %e,
                "LinkedIn request failed"
            );
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_round_trip() {
        for method in LinkedInMethod::iter() {
            assert_eq!(method.as_str().parse::<LinkedInMethod>(), Ok(method));
        }
        assert_eq!(
            "exchange_code_for_token".parse::<LinkedInMethod>(),
            Ok(LinkedInMethod::ExchangeCodeForToken)
        );
        assert!("getProfile".parse::<LinkedInMethod>().is_err());
    }

    #[test]
    fn test_permission_hints() {
        assert_eq!(
            LinkedInMethod::GetCertifications.permission_hint(),
            "Permission denied. Your access token may not have the necessary 'r_compliance' or 'r_basicprofile' permissions for certifications."
        );
        assert_eq!(
            LinkedInMethod::GetExperience.permission_hint(),
            "Permission denied. Your access token may not have the necessary permissions for job experience."
        );
    }

    #[test]
    fn test_remote_failure_mapping() {
        use crate::types::ErrorKind;

        let err = LinkedInMethod::GetCourses.remote_failure(RemoteError::Forbidden {
            body: String::new(),
        });
        assert_eq!(err.kind, ErrorKind::PermissionDenied);

        let err = LinkedInMethod::GetCourses.remote_failure(RemoteError::Unauthorized {
            body: String::new(),
        });
        assert_eq!(err.kind, ErrorKind::Unauthenticated);

        let err = LinkedInMethod::GetCourses.remote_failure(RemoteError::Decode("eof".into()));
        assert_eq!(err.kind, ErrorKind::Remote);
        assert!(err.message.starts_with("Failed to fetch courses"));
    }
}
