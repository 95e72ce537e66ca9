//! LinkedIn endpoint mapping.
//!
//! Paths are relative to the configured API base URL so the whole mapping can
//! be pointed at a different host (a mock server in tests).

/// Registry key of the LinkedIn service.
pub const SERVICE_NAME: &str = "linkedin";

/// Identity used when a request names no `user_id`.
pub const DEFAULT_USER_ID: &str = "default_user";

/// OpenID Connect userinfo (`sub`, `email`, names, picture)
pub const USERINFO_PATH: &str = "/v2/userinfo";
pub const PROFILE_PATH: &str = "/v2/people/~:(id,first-name,last-name,headline)";
pub const EMAIL_ADDRESS_PATH: &str = "/v2/emailAddress?q=members&projection=(elements*(handle~))";
pub const CONNECTIONS_PATH: &str = "/v2/connections";
pub const MEMBER_PATH: &str = "/v2/me";
pub const UGC_POSTS_PATH: &str = "/v2/ugcPosts";
pub const POSTS_PATH: &str = "/rest/posts";
pub const JOB_SEARCH_PATH: &str = "/v2/jobSearch";

pub const CERTIFICATIONS_PROJECTION: &str = "(certifications*(id,name,authority,startDate,endDate))";
pub const COURSES_PROJECTION: &str = "(courses*(id,name,authority))";
pub const EXPERIENCE_PROJECTION: &str =
    "(positions*(id,title,companyName,startDate,endDate,location))";

/// Versioned REST API headers, required by `/rest/*` endpoints
pub const LINKEDIN_VERSION: &str = "202411";
pub const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

/// Header carrying the created entity's URN on UGC post creation.
pub const RESTLI_ID_HEADER: &str = "x-restli-id";

pub const POST_URL_BASE: &str = "https://www.linkedin.com/feed/update/";

pub const USER_AGENT: &str = "linkgate/0.1";

pub const DEFAULT_JOB_TITLE: &str = "python";
pub const DEFAULT_JOB_COUNT: u64 = 2;

/// Canonical feed URL for a created post.
pub fn post_url(post_id: &str) -> String {
    format!("{}{}", POST_URL_BASE, post_id)
}

/// Person URN for a userinfo `sub`.
pub fn person_urn(person_id: &str) -> String {
    format!("urn:li:person:{}", person_id)
}
