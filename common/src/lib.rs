//! Wire types shared between the backend and its API consumers (the
//! game-server plugin posting scoreboards and the web frontend).

/// One player's statistics snapshot on a match scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub steam_id: String,
    pub team: i16,
    pub alive: bool,
    pub ping: i32,
    pub kills: i32,
    pub headshots: i32,
    pub assists: i32,
    pub deaths: i32,
    pub shots_fired: i32,
    pub shots_hit: i32,
    pub mvps: i32,
    pub score: i32,
    pub disconnected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CreateMatchRequest {
    pub team_1_name: String,
    pub team_2_name: String,
    pub team_1_side: i16,
    pub team_2_side: i16,
    pub team_1_score: i32,
    pub team_2_score: i32,
    pub map_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CreateMatchResponse {
    pub match_id: String,
}

/// Partial update for a running match. Only the supplied fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchUpdateRequest {
    pub team_1_score: Option<i32>,
    pub team_2_score: Option<i32>,
    pub team_1_side: Option<i16>,
    pub team_2_side: Option<i16>,
    pub players: Option<Vec<PlayerSnapshot>>,
    pub end: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchInfo {
    pub match_id: String,
    pub community_name: String,
    pub team_1_name: String,
    pub team_2_name: String,
    pub team_1_side: i16,
    pub team_2_side: i16,
    pub team_1_score: i32,
    pub team_2_score: i32,
    pub map: String,
    pub status: i16,
    pub demo_status: i16,
    pub timestamp: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchScoreboard {
    #[serde(flatten)]
    pub info: MatchInfo,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchesQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub desc: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BulkDeleteRequest {
    pub matches: Vec<String>,
}

/// Aggregated per-community statistics for one player.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProfileInfo {
    pub steam_id: String,
    pub name: String,
    pub kills: i64,
    pub headshots: i64,
    pub assists: i64,
    pub deaths: i64,
    pub shots_fired: i64,
    pub shots_hit: i64,
    pub mvps: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommunityInfo {
    pub community_name: String,
    pub owner_steam_id: String,
    pub disabled: bool,
    pub master_api_key: String,
    pub timestamp: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MasterKeyResponse {
    pub master_api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserStatus {
    pub name: String,
    pub steam_id: String,
}
