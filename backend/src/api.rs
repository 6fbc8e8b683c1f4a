//! HTTP surface of the backend, nested under `/api/`.
//!
//! Game servers authenticate with their community's master api key, the web
//! frontend with a Steam-login browser session.

use std::sync::Arc;

use crate::Services;

pub fn router(services: Arc<Services>) -> axum::Router {
    axum::Router::new()
        .route("/:community", axum::routing::get(community::details))
        .route("/:community/key", axum::routing::post(community::regenerate_key))
        .route(
            "/:community/matches",
            axum::routing::post(matches::list).delete(matches::bulk_delete),
        )
        .route("/:community/matches/create", axum::routing::post(matches::create))
        .route(
            "/:community/matches/:match_id",
            axum::routing::get(matches::scoreboard)
                .post(matches::update)
                .delete(matches::end),
        )
        .route(
            "/:community/matches/:match_id/demo",
            axum::routing::put(matches::upload_demo)
                .layer(axum::extract::DefaultBodyLimit::max(500 * 1024 * 1024)),
        )
        .route("/:community/profile/:steam_id", axum::routing::get(profile::get))
        .route("/steam/login", axum::routing::get(steam::login))
        .route("/steam/callback", axum::routing::get(steam::callback))
        .route("/user/status", axum::routing::get(user::status))
        .with_state(services)
}

fn validate_create(request: &common::CreateMatchRequest) -> Result<(), crate::error::BackendError> {
    if request.map_name.is_empty() || request.map_name.chars().count() > 24 {
        return Err(crate::error::BackendError::BadRequest(
            "map_name must be 1-24 characters",
        ));
    }

    for name in [&request.team_1_name, &request.team_2_name] {
        if name.is_empty() || name.chars().count() > 64 {
            return Err(crate::error::BackendError::BadRequest(
                "team names must be 1-64 characters",
            ));
        }
    }

    Ok(())
}

fn validate_players(players: &[common::PlayerSnapshot]) -> Result<(), crate::error::BackendError> {
    for player in players {
        if player.name.is_empty() || player.name.chars().count() > 42 {
            return Err(crate::error::BackendError::BadRequest(
                "player names must be 1-42 characters",
            ));
        }
        if player.steam_id.is_empty() {
            return Err(crate::error::BackendError::BadRequest(
                "player steam_id must not be empty",
            ));
        }
    }

    Ok(())
}

pub mod matches {
    use std::sync::Arc;

    use axum::extract::{Path, State};

    use crate::error::BackendError;
    use crate::{MasterKey, Services, UserSession};

    #[tracing::instrument(skip(services, _key, request))]
    pub async fn create(
        State(services): State<Arc<Services>>,
        _key: MasterKey,
        Path(community_name): Path<String>,
        axum::Json(request): axum::Json<common::CreateMatchRequest>,
    ) -> Result<axum::Json<common::CreateMatchResponse>, BackendError> {
        super::validate_create(&request)?;

        let mut con = services.db_connection().await?;
        let record = crate::matches::create(&mut con, &community_name, &request).await?;

        Ok(axum::Json(common::CreateMatchResponse {
            match_id: record.match_id,
        }))
    }

    #[tracing::instrument(skip(services, _key, request))]
    pub async fn update(
        State(services): State<Arc<Services>>,
        _key: MasterKey,
        Path((community_name, match_id)): Path<(String, String)>,
        axum::Json(request): axum::Json<common::MatchUpdateRequest>,
    ) -> Result<(), BackendError> {
        if let Some(players) = &request.players {
            super::validate_players(players)?;
        }

        let mut con = services.db_connection().await?;
        crate::matches::update(&mut con, &community_name, &match_id, &request).await
    }

    #[tracing::instrument(skip(services, _key))]
    pub async fn end(
        State(services): State<Arc<Services>>,
        _key: MasterKey,
        Path((community_name, match_id)): Path<(String, String)>,
    ) -> Result<(), BackendError> {
        let mut con = services.db_connection().await?;
        crate::matches::end(&mut con, &community_name, &match_id).await
    }

    #[tracing::instrument(skip(services, session))]
    pub async fn scoreboard(
        State(services): State<Arc<Services>>,
        session: UserSession,
        Path((community_name, match_id)): Path<(String, String)>,
    ) -> Result<axum::Json<common::MatchScoreboard>, BackendError> {
        session.require_login()?;

        let mut con = services.db_connection().await?;
        let (record, rows) = crate::matches::scoreboard(&mut con, &community_name, &match_id).await?;

        Ok(axum::Json(common::MatchScoreboard {
            info: record.into(),
            players: rows.into_iter().map(Into::into).collect(),
        }))
    }

    #[tracing::instrument(skip(services, session, query))]
    pub async fn list(
        State(services): State<Arc<Services>>,
        session: UserSession,
        Path(community_name): Path<String>,
        axum::Json(query): axum::Json<common::MatchesQuery>,
    ) -> Result<axum::Json<Vec<common::MatchInfo>>, BackendError> {
        session.require_login()?;

        let mut con = services.db_connection().await?;
        let records = crate::matches::list(&mut con, &community_name, &query).await?;

        Ok(axum::Json(records.into_iter().map(Into::into).collect()))
    }

    #[tracing::instrument(skip(services, _key, request))]
    pub async fn bulk_delete(
        State(services): State<Arc<Services>>,
        _key: MasterKey,
        Path(community_name): Path<String>,
        axum::Json(request): axum::Json<common::BulkDeleteRequest>,
    ) -> Result<(), BackendError> {
        let deleted = {
            let mut con = services.db_connection().await?;
            crate::matches::bulk_delete(&mut con, &community_name, &request.matches).await?
        };

        if services.storage.is_some() {
            services.deletions.enqueue(deleted);
        }

        Ok(())
    }

    #[tracing::instrument(skip(services, _key, request))]
    pub async fn upload_demo(
        State(services): State<Arc<Services>>,
        _key: MasterKey,
        Path((community_name, match_id)): Path<(String, String)>,
        request: axum::extract::Request,
    ) -> Result<(), BackendError> {
        let demo_config = services
            .config
            .demos
            .as_ref()
            .ok_or(BackendError::BadRequest("Demo storage is disabled"))?;
        let storage = services
            .storage
            .as_ref()
            .ok_or(BackendError::BadRequest("Demo storage is disabled"))?;

        {
            let mut con = services.db_connection().await?;
            crate::matches::claim_demo_slot(&mut con, &community_name, &match_id).await?;
        }

        let object_path = crate::matches::demo_object_path(&demo_config.pathway, &match_id);
        let mut upload = storage
            .begin_upload(object_path)
            .await
            .map_err(BackendError::Storage)?;

        let limits = crate::upload::UploadLimits {
            max_size: demo_config.max_upload_size,
            part_delay: demo_config.upload_delay,
        };
        let stream = request.into_body().into_data_stream();

        let outcome = crate::upload::stream_demo(upload.as_mut(), stream, &limits)
            .await
            .map_err(BackendError::Storage)?;

        match outcome {
            crate::upload::UploadOutcome::Stored { total } => {
                let mut con = services.db_connection().await?;
                crate::matches::set_demo_status(
                    &mut con,
                    &community_name,
                    &match_id,
                    crate::models::demo_status::STORED,
                )
                .await?;

                tracing::info!(total, "Stored demo");
            }
            crate::upload::UploadOutcome::Cancelled { total } => {
                // The slot stays claimed. A cancelled upload cannot be
                // retried without manually resetting demo_status.
                tracing::warn!(total, "Demo upload cancelled");
            }
        }

        Ok(())
    }
}

pub mod community {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    use crate::error::BackendError;
    use crate::{MasterKey, Services};

    #[tracing::instrument(skip(services, _key))]
    pub async fn details(
        State(services): State<Arc<Services>>,
        _key: MasterKey,
        Path(community_name): Path<String>,
    ) -> Result<axum::Json<common::CommunityInfo>, BackendError> {
        let mut con = services.db_connection().await?;

        let found: Option<(crate::models::Community, crate::models::ApiKey)> =
            crate::schema::communities::dsl::communities
                .inner_join(crate::schema::api_keys::dsl::api_keys)
                .filter(crate::schema::communities::dsl::community_name.eq(&community_name))
                .filter(crate::schema::api_keys::dsl::master.eq(true))
                .select((
                    crate::models::Community::as_select(),
                    crate::models::ApiKey::as_select(),
                ))
                .first(&mut con)
                .await
                .optional()?;

        let (community, key) = found.ok_or(BackendError::InvalidCommunity)?;

        Ok(axum::Json(common::CommunityInfo {
            community_name: community.community_name,
            owner_steam_id: community.owner_steam_id,
            disabled: community.disabled,
            master_api_key: key.api_key,
            timestamp: community.timestamp,
        }))
    }

    /// Replaces the community's master api key, immediately invalidating the
    /// previous one.
    #[tracing::instrument(skip(services, _key))]
    pub async fn regenerate_key(
        State(services): State<Arc<Services>>,
        _key: MasterKey,
        Path(community_name): Path<String>,
    ) -> Result<axum::Json<common::MasterKeyResponse>, BackendError> {
        let new_key = uuid::Uuid::new_v4().simple().to_string();

        let mut con = services.db_connection().await?;

        let updated = diesel::dsl::update(
            crate::schema::api_keys::dsl::api_keys
                .filter(crate::schema::api_keys::dsl::community_name.eq(&community_name))
                .filter(crate::schema::api_keys::dsl::master.eq(true)),
        )
        .set((
            crate::schema::api_keys::dsl::api_key.eq(&new_key),
            crate::schema::api_keys::dsl::timestamp.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(&mut con)
        .await?;

        if updated == 0 {
            return Err(BackendError::InvalidCommunity);
        }

        Ok(axum::Json(common::MasterKeyResponse {
            master_api_key: new_key,
        }))
    }
}

pub mod profile {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    use crate::error::BackendError;
    use crate::{Services, UserSession};

    #[tracing::instrument(skip(services, session))]
    pub async fn get(
        State(services): State<Arc<Services>>,
        session: UserSession,
        Path((community_name, steam_id)): Path<(String, String)>,
    ) -> Result<axum::Json<common::ProfileInfo>, BackendError> {
        session.require_login()?;

        let mut con = services.db_connection().await?;

        let found: Option<(String, crate::models::StatisticRow)> =
            crate::schema::statistics::dsl::statistics
                .inner_join(crate::schema::users::dsl::users)
                .filter(crate::schema::statistics::dsl::community_name.eq(&community_name))
                .filter(crate::schema::statistics::dsl::steam_id.eq(&steam_id))
                .select((
                    crate::schema::users::dsl::name,
                    crate::models::StatisticRow::as_select(),
                ))
                .first(&mut con)
                .await
                .optional()?;

        let (name, stats) = found.ok_or(BackendError::InvalidSteamId)?;

        Ok(axum::Json(common::ProfileInfo {
            steam_id: stats.steam_id,
            name,
            kills: stats.kills,
            headshots: stats.headshots,
            assists: stats.assists,
            deaths: stats.deaths,
            shots_fired: stats.shots_fired,
            shots_hit: stats.shots_hit,
            mvps: stats.mvps,
        }))
    }
}

pub mod steam {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::extract::State;
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;
    use serde::Deserialize;

    use crate::error::BackendError;
    use crate::Services;

    #[derive(Debug, Deserialize)]
    struct ProfileInfoResponse {
        players: Vec<ProfileInfo>,
    }

    #[derive(Debug, Deserialize)]
    struct ProfileInfo {
        steamid: String,
        personaname: String,
        #[serde(flatten)]
        other: HashMap<String, serde_json::Value>,
    }

    #[tracing::instrument(skip(services))]
    pub async fn login(
        State(services): State<Arc<Services>>,
    ) -> Result<axum::response::Redirect, BackendError> {
        let steam = services
            .steam
            .as_ref()
            .ok_or(BackendError::BadRequest("Steam login is not configured"))?;

        Ok(axum::response::Redirect::to(steam.openid.get_redirect_url()))
    }

    #[tracing::instrument(skip(services, session, request))]
    pub async fn callback(
        State(services): State<Arc<Services>>,
        mut session: crate::UserSession,
        request: axum::extract::Request,
    ) -> Result<axum::response::Redirect, BackendError> {
        let steam = services
            .steam
            .as_ref()
            .ok_or(BackendError::BadRequest("Steam login is not configured"))?;

        let query = request
            .uri()
            .query()
            .ok_or(BackendError::BadRequest("Missing query parameters"))?;

        let id = steam.openid.verify(query).await.map_err(|e| {
            tracing::error!("Verifying OpenID response: {:?}", e);
            BackendError::BadRequest("OpenID verification failed")
        })?;

        let client = crate::steam_api::Client::new(steam.api_key.clone());
        let profile: ProfileInfoResponse = client
            .get(
                "http://api.steampowered.com/ISteamUser/GetPlayerSummaries/v2/",
                &[("steamids", &format!("{}", id))],
            )
            .await
            .map_err(BackendError::Steam)?;

        let mut con = services.db_connection().await?;
        for player in profile.players {
            let query = diesel::dsl::insert_into(crate::schema::users::dsl::users)
                .values(crate::models::User {
                    steam_id: player.steamid.clone(),
                    name: player.personaname.clone(),
                    timestamp: chrono::Utc::now().naive_utc(),
                })
                .on_conflict(crate::schema::users::dsl::steam_id)
                .do_update()
                .set(crate::schema::users::dsl::name.eq(player.personaname.clone()));

            if let Err(e) = query.execute(&mut con).await {
                tracing::error!("Upserting user steam info: {:?}", e);
            }
        }

        session.set_steam_id(id).await?;

        Ok(axum::response::Redirect::to("/"))
    }
}

pub mod user {
    use std::sync::Arc;

    use axum::extract::State;
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;

    use crate::error::BackendError;
    use crate::{Services, UserSession};

    #[tracing::instrument(skip(services, session))]
    pub async fn status(
        State(services): State<Arc<Services>>,
        session: UserSession,
    ) -> Result<axum::Json<common::UserStatus>, BackendError> {
        let steam_id = session.require_login()?;

        let mut con = services.db_connection().await?;

        let found: Option<crate::models::User> = crate::schema::users::dsl::users
            .filter(crate::schema::users::dsl::steam_id.eq(steam_id.to_string()))
            .select(crate::models::User::as_select())
            .first(&mut con)
            .await
            .optional()?;

        let user = found.ok_or(BackendError::NotLoggedIn)?;

        Ok(axum::Json(common::UserStatus {
            name: user.name,
            steam_id: user.steam_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create_request() -> common::CreateMatchRequest {
        common::CreateMatchRequest {
            team_1_name: "Ninjas".to_string(),
            team_2_name: "Pirates".to_string(),
            team_1_side: 0,
            team_2_side: 1,
            team_1_score: 0,
            team_2_score: 0,
            map_name: "de_dust2".to_string(),
        }
    }

    #[test]
    fn create_request_within_bounds_is_accepted() {
        assert!(validate_create(&create_request()).is_ok());
    }

    #[test]
    fn map_name_bounds_are_enforced() {
        let mut request = create_request();
        request.map_name = String::new();
        assert!(validate_create(&request).is_err());

        request.map_name = "x".repeat(25);
        assert!(validate_create(&request).is_err());

        request.map_name = "x".repeat(24);
        assert!(validate_create(&request).is_ok());
    }

    #[test]
    fn name_bounds_count_characters_not_bytes() {
        // 24 two-byte characters, 48 bytes. Still within the map name bound.
        let mut request = create_request();
        request.map_name = "ü".repeat(24);
        assert!(validate_create(&request).is_ok());

        request.map_name = "ü".repeat(25);
        assert!(validate_create(&request).is_err());

        let mut request = create_request();
        request.team_1_name = "ü".repeat(64);
        assert!(validate_create(&request).is_ok());
    }

    #[test]
    fn team_name_bounds_are_enforced() {
        let mut request = create_request();
        request.team_2_name = "x".repeat(65);
        assert!(validate_create(&request).is_err());

        request.team_2_name = "x".repeat(64);
        assert!(validate_create(&request).is_ok());
    }

    #[test]
    fn player_validation_rejects_out_of_bounds_names() {
        let player = common::PlayerSnapshot {
            name: "x".repeat(43),
            steam_id: "76561198000000000".to_string(),
            team: 0,
            alive: true,
            ping: 20,
            kills: 0,
            headshots: 0,
            assists: 0,
            deaths: 0,
            shots_fired: 0,
            shots_hit: 0,
            mvps: 0,
            score: 0,
            disconnected: false,
        };

        assert!(validate_players(std::slice::from_ref(&player)).is_err());

        let mut valid = player;
        valid.name = "player".to_string();
        assert_eq!((), validate_players(std::slice::from_ref(&valid)).unwrap());
    }

    #[test]
    fn player_validation_rejects_empty_steam_id() {
        let player = common::PlayerSnapshot {
            name: "player".to_string(),
            steam_id: String::new(),
            team: 0,
            alive: true,
            ping: 20,
            kills: 0,
            headshots: 0,
            assists: 0,
            deaths: 0,
            shots_fired: 0,
            shots_hit: 0,
            mvps: 0,
            score: 0,
            disconnected: false,
        };

        assert!(validate_players(&[player]).is_err());
    }
}
