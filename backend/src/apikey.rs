use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::error::BackendError;

/// Master-key authentication for the game-server facing endpoints.
///
/// The `Authorization` header has to carry the master api key of the
/// community named in the request path, and the community must not be
/// disabled. Anything else is rejected as an unknown community so a caller
/// cannot probe which communities exist.
#[derive(Debug, Clone)]
pub struct MasterKey {
    pub community_name: String,
}

#[async_trait::async_trait]
impl axum::extract::FromRequestParts<std::sync::Arc<crate::Services>> for MasterKey {
    type Rejection = BackendError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &std::sync::Arc<crate::Services>,
    ) -> Result<Self, Self::Rejection> {
        let params = axum::extract::Path::<
            std::collections::HashMap<String, String>,
        >::from_request_parts(parts, state)
        .await
        .map_err(|_| BackendError::InvalidCommunity)?;

        let community_name = params
            .0
            .get("community")
            .cloned()
            .ok_or(BackendError::InvalidCommunity)?;

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(BackendError::InvalidCommunity)?;
        let provided_key = header.strip_prefix("Bearer ").unwrap_or(header);

        let mut con = state.db_connection().await?;

        let found: Option<crate::models::Community> = crate::schema::api_keys::dsl::api_keys
            .inner_join(crate::schema::communities::dsl::communities)
            .filter(crate::schema::api_keys::dsl::api_key.eq(provided_key))
            .filter(crate::schema::api_keys::dsl::community_name.eq(&community_name))
            .filter(crate::schema::api_keys::dsl::master.eq(true))
            .filter(crate::schema::communities::dsl::disabled.eq(false))
            .select(crate::models::Community::as_select())
            .first(&mut con)
            .await
            .optional()?;

        found.ok_or(BackendError::InvalidCommunity)?;

        Ok(Self { community_name })
    }
}
