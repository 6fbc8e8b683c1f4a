use diesel::prelude::*;

/// `matches.status` values. A match starts live and ends exactly once.
pub mod match_status {
    pub const ENDED: i16 = 0;
    pub const LIVE: i16 = 1;
}

/// `matches.demo_status` values. Advances NONE -> UPLOADING -> STORED.
pub mod demo_status {
    pub const NONE: i16 = 0;
    pub const UPLOADING: i16 = 1;
    pub const STORED: i16 = 2;
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::matches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Match {
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

impl From<Match> for common::MatchInfo {
    fn from(value: Match) -> Self {
        Self {
            match_id: value.match_id,
            community_name: value.community_name,
            team_1_name: value.team_1_name,
            team_2_name: value.team_2_name,
            team_1_side: value.team_1_side,
            team_2_side: value.team_2_side,
            team_1_score: value.team_1_score,
            team_2_score: value.team_2_score,
            map: value.map,
            status: value.status,
            demo_status: value.demo_status,
            timestamp: value.timestamp,
        }
    }
}

/// Partial update for a match row, applied field-by-field only when present.
#[derive(AsChangeset, Debug, Default, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::matches)]
pub struct MatchChanges {
    pub team_1_score: Option<i32>,
    pub team_2_score: Option<i32>,
    pub team_1_side: Option<i16>,
    pub team_2_side: Option<i16>,
}

impl MatchChanges {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<&common::MatchUpdateRequest> for MatchChanges {
    fn from(value: &common::MatchUpdateRequest) -> Self {
        Self {
            team_1_score: value.team_1_score,
            team_2_score: value.team_2_score,
            team_1_side: value.team_1_side,
            team_2_side: value.team_2_side,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::scoreboard)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScoreboardRow {
    pub match_id: String,
    pub steam_id: String,
    pub name: String,
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

impl ScoreboardRow {
    pub fn from_snapshot(match_id: &str, player: &common::PlayerSnapshot) -> Self {
        Self {
            match_id: match_id.to_string(),
            steam_id: player.steam_id.clone(),
            name: player.name.clone(),
            team: player.team,
            alive: player.alive,
            ping: player.ping,
            kills: player.kills,
            headshots: player.headshots,
            assists: player.assists,
            deaths: player.deaths,
            shots_fired: player.shots_fired,
            shots_hit: player.shots_hit,
            mvps: player.mvps,
            score: player.score,
            disconnected: player.disconnected,
        }
    }
}

impl From<ScoreboardRow> for common::PlayerSnapshot {
    fn from(value: ScoreboardRow) -> Self {
        Self {
            name: value.name,
            steam_id: value.steam_id,
            team: value.team,
            alive: value.alive,
            ping: value.ping,
            kills: value.kills,
            headshots: value.headshots,
            assists: value.assists,
            deaths: value.deaths,
            shots_fired: value.shots_fired,
            shots_hit: value.shots_hit,
            mvps: value.mvps,
            score: value.score,
            disconnected: value.disconnected,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::statistics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StatisticRow {
    pub community_name: String,
    pub steam_id: String,
    pub kills: i64,
    pub headshots: i64,
    pub assists: i64,
    pub deaths: i64,
    pub shots_fired: i64,
    pub shots_hit: i64,
    pub mvps: i64,
}

impl StatisticRow {
    pub fn from_scoreboard(community_name: &str, row: &ScoreboardRow) -> Self {
        Self {
            community_name: community_name.to_string(),
            steam_id: row.steam_id.clone(),
            kills: row.kills as i64,
            headshots: row.headshots as i64,
            assists: row.assists as i64,
            deaths: row.deaths as i64,
            shots_fired: row.shots_fired as i64,
            shots_hit: row.shots_hit as i64,
            mvps: row.mvps as i64,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::communities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Community {
    pub community_name: String,
    pub owner_steam_id: String,
    pub disabled: bool,
    pub timestamp: chrono::NaiveDateTime,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::api_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ApiKey {
    pub api_key: String,
    pub community_name: String,
    pub master: bool,
    pub timestamp: chrono::NaiveDateTime,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub steam_id: String,
    pub name: String,
    pub timestamp: chrono::NaiveDateTime,
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: String,
    pub steam_id: Option<String>,
    pub expiry_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn match_changes_only_supplied_fields() {
        let request = common::MatchUpdateRequest {
            team_1_score: Some(16),
            end: Some(true),
            ..Default::default()
        };

        let changes = MatchChanges::from(&request);
        assert_eq!(Some(16), changes.team_1_score);
        assert_eq!(None, changes.team_2_score);
        assert_eq!(None, changes.team_1_side);
        assert_eq!(None, changes.team_2_side);
        assert!(!changes.is_empty());
    }

    #[test]
    fn match_changes_empty_for_end_only_update() {
        let request = common::MatchUpdateRequest {
            end: Some(true),
            ..Default::default()
        };

        assert!(MatchChanges::from(&request).is_empty());
    }
}
