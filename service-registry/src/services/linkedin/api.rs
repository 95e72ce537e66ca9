use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;

use super::config::{
    person_urn, CERTIFICATIONS_PROJECTION, CONNECTIONS_PATH, COURSES_PROJECTION,
    EMAIL_ADDRESS_PATH, EXPERIENCE_PROJECTION, JOB_SEARCH_PATH, LINKEDIN_VERSION, MEMBER_PATH,
    POSTS_PATH, PROFILE_PATH, RESTLI_ID_HEADER, RESTLI_PROTOCOL_VERSION, UGC_POSTS_PATH,
    USERINFO_PATH,
};

/// Failure talking to the LinkedIn API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// 401: token expired, revoked or malformed
    #[error("LinkedIn rejected the access token (401): {body}")]
    Unauthorized { body: String },

    /// 403: the token lacks a scope the endpoint needs
    #[error("LinkedIn denied access (403): {body}")]
    Forbidden { body: String },

    #[error("LinkedIn API error {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Request to LinkedIn failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid JSON from LinkedIn: {0}")]
    Decode(String),
}

/// Member-profile sections reachable through `/v2/me` projections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileSection {
    Certifications,
    Courses,
    Positions,
}

impl ProfileSection {
    fn projection(self) -> &'static str {
        match self {
            ProfileSection::Certifications => CERTIFICATIONS_PROJECTION,
            ProfileSection::Courses => COURSES_PROJECTION,
            ProfileSection::Positions => EXPERIENCE_PROJECTION,
        }
    }

    /// Key of the section in the `/v2/me` response.
    pub fn field(self) -> &'static str {
        match self {
            ProfileSection::Certifications => "certifications",
            ProfileSection::Courses => "courses",
            ProfileSection::Positions => "positions",
        }
    }
}

/// Filters for `/v2/jobSearch`.
#[derive(Clone, Debug, Default)]
pub struct JobSearch {
    pub title: String,
    pub count: u64,
    pub location: Option<String>,
    pub company: Option<String>,
}

/// Result of creating a UGC post.
#[derive(Debug)]
pub struct CreatedPost {
    pub body: Value,
    /// URN from the `x-restli-id` response header, if sent
    pub restli_id: Option<String>,
}

/// Authenticated client for the LinkedIn REST API.
///
/// Every request carries `Authorization: Bearer <access_token>`.
pub struct LinkedInClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl LinkedInClient {
    /// `http_client` is shared across requests; only the token is per-client.
    pub fn new(http_client: Client, base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http_client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
    }

    /// OpenID Connect userinfo for the token's member.
    pub async fn userinfo(&self) -> Result<Value, RemoteError> {
        send_json(self.get(USERINFO_PATH)).await
    }

    /// Legacy lite profile (id, names, headline).
    pub async fn profile(&self) -> Result<Value, RemoteError> {
        send_json(self.get(PROFILE_PATH)).await
    }

    pub async fn email_address(&self) -> Result<Value, RemoteError> {
        send_json(self.get(EMAIL_ADDRESS_PATH)).await
    }

    pub async fn connections(&self) -> Result<Value, RemoteError> {
        send_json(self.get(CONNECTIONS_PATH)).await
    }

    /// Posts authored by the member with the given userinfo `sub`.
    pub async fn posts_by_author(&self, person_id: &str) -> Result<Value, RemoteError> {
        let request = self
            .get(POSTS_PATH)
            .query(&[("author", person_urn(person_id).as_str()), ("q", "author")])
            .header("LinkedIn-Version", LINKEDIN_VERSION)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION);
        send_json(request).await
    }

    /// Fetches one section of the member profile.
    pub async fn profile_section(&self, section: ProfileSection) -> Result<Value, RemoteError> {
        let request = self
            .get(MEMBER_PATH)
            .query(&[("projection", section.projection())]);
        send_json(request).await
    }

    /// Publishes a public text-only post as `person_id`.
    pub async fn create_text_post(&self, person_id: &str, text: &str) -> Result<CreatedPost, RemoteError> {
        let body = serde_json::json!({
            "author": person_urn(person_id),
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": text },
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
            }
        });

        let response = self
            .http_client
            .post(self.url(UGC_POSTS_PATH))
            .bearer_auth(&self.access_token)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .json(&body)
            .send()
            .await?;

        let restli_id = response
            .headers()
            .get(RESTLI_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(CreatedPost {
            body: read_json(response).await?,
            restli_id,
        })
    }

    pub async fn search_jobs(&self, search: &JobSearch) -> Result<Value, RemoteError> {
        let mut query: Vec<(&str, String)> = vec![
            ("keywords", search.title.clone()),
            ("count", search.count.to_string()),
        ];
        if let Some(location) = &search.location {
            query.push(("location", location.clone()));
        }
        if let Some(company) = &search.company {
            query.push(("companyName", company.clone()));
        }

        send_json(self.get(JOB_SEARCH_PATH).query(&query)).await
    }
}

async fn send_json(request: RequestBuilder) -> Result<Value, RemoteError> {
    let response = request.send().await?;
    read_json(response).await
}

/// Classifies the status, then parses the body. An empty success body
/// becomes `null`.
async fn read_json(response: reqwest::Response) -> Result<Value, RemoteError> {
    let status = response.status();
    let body = response.text().await?;

    match status {
        StatusCode::UNAUTHORIZED => Err(RemoteError::Unauthorized { body }),
        StatusCode::FORBIDDEN => Err(RemoteError::Forbidden { body }),
        s if !s.is_success() => Err(RemoteError::Status { status: s, body }),
        _ if body.trim().is_empty() => Ok(Value::Null),
        _ => serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(server: &Server, token: &str) -> LinkedInClient {
        LinkedInClient::new(Client::new(), server.url(), token)
    }

    #[tokio::test]
    async fn test_userinfo_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/userinfo")
            .match_header("authorization", "Bearer tok-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sub": "abc123", "email": "alice@example.com"}"#)
            .create_async()
            .await;

        let info = client(&server, "tok-123").userinfo().await.unwrap();
        assert_eq!(info["sub"], "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_classification() {
        let mut server = Server::new_async().await;
        let _unauthorized = server
            .mock("GET", "/v2/userinfo")
            .with_status(401)
            .with_body("expired")
            .create_async()
            .await;
        let _forbidden = server
            .mock("GET", "/v2/connections")
            .with_status(403)
            .with_body(r#"{"message": "Not enough permissions"}"#)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", Matcher::Regex(r"^/v2/people/".to_string()))
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let client = client(&server, "tok");
        assert!(matches!(
            client.userinfo().await,
            Err(RemoteError::Unauthorized { .. })
        ));
        assert!(matches!(
            client.connections().await,
            Err(RemoteError::Forbidden { .. })
        ));
        match client.profile().await {
            Err(RemoteError::Status { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "oops");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/connections")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        assert!(matches!(
            client(&server, "tok").connections().await,
            Err(RemoteError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_posts_by_author_uses_versioned_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/posts?author=urn%3Ali%3Aperson%3Aabc123&q=author")
            .match_header("linkedin-version", LINKEDIN_VERSION)
            .match_header("x-restli-protocol-version", RESTLI_PROTOCOL_VERSION)
            .with_status(200)
            .with_body(r#"{"elements": []}"#)
            .create_async()
            .await;

        let posts = client(&server, "tok").posts_by_author("abc123").await.unwrap();
        assert_eq!(posts["elements"], serde_json::json!([]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_text_post_reads_restli_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/ugcPosts")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "author": "urn:li:person:abc123",
                "lifecycleState": "PUBLISHED"
            })))
            .with_status(201)
            .with_header("x-restli-id", "urn:li:share:42")
            .create_async()
            .await;

        let created = client(&server, "tok")
            .create_text_post("abc123", "Hello")
            .await
            .unwrap();
        assert_eq!(created.restli_id.as_deref(), Some("urn:li:share:42"));
        assert!(created.body.is_null());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_jobs_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v2/jobSearch".to_string()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("keywords".into(), "rust engineer".into()),
                Matcher::UrlEncoded("count".into(), "5".into()),
                Matcher::UrlEncoded("companyName".into(), "Acme".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"elements": [{"title": "Rust Engineer"}]}"#)
            .create_async()
            .await;

        let search = JobSearch {
            title: "rust engineer".to_string(),
            count: 5,
            location: None,
            company: Some("Acme".to_string()),
        };
        let jobs = client(&server, "tok").search_jobs(&search).await.unwrap();
        assert_eq!(jobs["elements"][0]["title"], "Rust Engineer");
        mock.assert_async().await;
    }
}
