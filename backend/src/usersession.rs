use crate::error::BackendError;

#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct UserSessionData {
    pub steam_id: Option<u64>,
}

/// Browser session for the web UI, backed by the `sessions` table.
pub struct UserSession {
    pub session: tower_sessions::Session,
    data: UserSessionData,
}

impl UserSession {
    pub(crate) const KEY: &'static str = "user.data";

    /// The logged-in steam id, or `NotLoggedIn` for anonymous sessions.
    pub fn require_login(&self) -> Result<u64, BackendError> {
        self.data.steam_id.ok_or(BackendError::NotLoggedIn)
    }

    pub async fn set_steam_id(&mut self, steam_id: u64) -> Result<(), BackendError> {
        self.data.steam_id = Some(steam_id);

        self.session
            .insert(Self::KEY, &self.data)
            .await
            .map_err(|e| BackendError::Session(e.to_string()))
    }
}

#[async_trait::async_trait]
impl<S> axum::extract::FromRequestParts<S> for UserSession
where
    S: Send + Sync,
{
    type Rejection = (axum::http::StatusCode, &'static str);

    async fn from_request_parts(
        req: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let session = tower_sessions::Session::from_request_parts(req, state).await?;

        let data = match session.get::<UserSessionData>(Self::KEY).await {
            Ok(data) => data.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Loading session data: {:?}", e);
                UserSessionData::default()
            }
        };

        Ok(Self { session, data })
    }
}
