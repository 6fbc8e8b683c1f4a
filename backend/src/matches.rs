//! Match lifecycle and scoreboard persistence.
//!
//! The only place that mutates `matches.status` and `matches.demo_status`.
//! All operations are scoped to the owning community.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::error::BackendError;
use crate::models;

/// Matches are listed five per page, matching the frontend's pagination.
const PAGE_SIZE: i64 = 5;

/// Object key for a stored demo, `<pathway>/<match_id>.dem`.
pub fn demo_object_path(pathway: &str, match_id: &str) -> String {
    format!("{}/{}.dem", pathway.trim_end_matches('/'), match_id)
}

pub async fn create(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    request: &common::CreateMatchRequest,
) -> Result<models::Match, BackendError> {
    let record = models::Match {
        match_id: uuid::Uuid::new_v4().to_string(),
        community_name: community_name.to_string(),
        team_1_name: request.team_1_name.clone(),
        team_2_name: request.team_2_name.clone(),
        team_1_side: request.team_1_side,
        team_2_side: request.team_2_side,
        team_1_score: request.team_1_score,
        team_2_score: request.team_2_score,
        map: request.map_name.clone(),
        status: models::match_status::LIVE,
        demo_status: models::demo_status::NONE,
        timestamp: chrono::Utc::now().naive_utc(),
    };

    diesel::dsl::insert_into(crate::schema::matches::dsl::matches)
        .values(&record)
        .execute(con)
        .await?;

    Ok(record)
}

pub async fn get(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
) -> Result<models::Match, BackendError> {
    crate::schema::matches::dsl::matches
        .filter(crate::schema::matches::dsl::match_id.eq(match_id))
        .filter(crate::schema::matches::dsl::community_name.eq(community_name))
        .select(models::Match::as_select())
        .first(con)
        .await
        .optional()?
        .ok_or(BackendError::InvalidMatchId)
}

/// Applies a partial update: supplied score/side fields, an optional full
/// scoreboard replacement and an optional end-of-match flag, atomically.
pub async fn update(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
    request: &common::MatchUpdateRequest,
) -> Result<(), BackendError> {
    let community_name = community_name.to_string();
    let match_id = match_id.to_string();
    let request = request.clone();

    con.build_transaction()
        .run(move |con| {
            Box::pin(async move {
                get(con, &community_name, &match_id).await?;

                let changes = models::MatchChanges::from(&request);
                if !changes.is_empty() {
                    diesel::dsl::update(
                        crate::schema::matches::dsl::matches
                            .filter(crate::schema::matches::dsl::match_id.eq(&match_id)),
                    )
                    .set(changes)
                    .execute(con)
                    .await?;
                }

                if let Some(players) = &request.players {
                    replace_players(con, &match_id, players).await?;
                }

                if request.end.unwrap_or(false) {
                    end_in_transaction(con, &community_name, &match_id).await?;
                }

                Ok::<_, BackendError>(())
            })
        })
        .await
}

pub async fn end(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
) -> Result<(), BackendError> {
    let community_name = community_name.to_string();
    let match_id = match_id.to_string();

    con.build_transaction()
        .run(move |con| {
            Box::pin(async move {
                get(con, &community_name, &match_id).await?;
                end_in_transaction(con, &community_name, &match_id).await
            })
        })
        .await
}

type ScopedMatch<'a, C> = diesel::dsl::Filter<
    diesel::dsl::Filter<
        diesel::dsl::Filter<
            crate::schema::matches::table,
            diesel::dsl::Eq<crate::schema::matches::match_id, &'a str>,
        >,
        diesel::dsl::Eq<crate::schema::matches::community_name, &'a str>,
    >,
    diesel::dsl::Eq<C, i16>,
>;

/// Conditional LIVE -> ENDED update. Only touches a row that is still live,
/// so a repeated end request changes nothing.
fn end_match_query<'a>(
    community_name: &'a str,
    match_id: &'a str,
) -> diesel::dsl::Update<
    ScopedMatch<'a, crate::schema::matches::status>,
    diesel::dsl::Eq<crate::schema::matches::status, i16>,
> {
    diesel::dsl::update(
        crate::schema::matches::dsl::matches
            .filter(crate::schema::matches::dsl::match_id.eq(match_id))
            .filter(crate::schema::matches::dsl::community_name.eq(community_name))
            .filter(crate::schema::matches::dsl::status.eq(models::match_status::LIVE)),
    )
    .set(crate::schema::matches::dsl::status.eq(models::match_status::ENDED))
}

/// Conditional NONE -> UPLOADING update. Only touches a row whose demo slot
/// is still unclaimed, so concurrent claims cannot both win.
fn claim_demo_slot_query<'a>(
    community_name: &'a str,
    match_id: &'a str,
) -> diesel::dsl::Update<
    ScopedMatch<'a, crate::schema::matches::demo_status>,
    diesel::dsl::Eq<crate::schema::matches::demo_status, i16>,
> {
    diesel::dsl::update(
        crate::schema::matches::dsl::matches
            .filter(crate::schema::matches::dsl::match_id.eq(match_id))
            .filter(crate::schema::matches::dsl::community_name.eq(community_name))
            .filter(crate::schema::matches::dsl::demo_status.eq(models::demo_status::NONE)),
    )
    .set(crate::schema::matches::dsl::demo_status.eq(models::demo_status::UPLOADING))
}

async fn end_in_transaction(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
) -> Result<(), BackendError> {
    let ended = end_match_query(community_name, match_id)
        .execute(con)
        .await?;

    if ended == 1 {
        fold_statistics(con, community_name, match_id).await?;
    }

    Ok(())
}

/// Adds the final scoreboard of an ended match to the community's aggregated
/// per-player statistics.
async fn fold_statistics(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
) -> Result<(), BackendError> {
    let rows: Vec<models::ScoreboardRow> = crate::schema::scoreboard::dsl::scoreboard
        .filter(crate::schema::scoreboard::dsl::match_id.eq(match_id))
        .select(models::ScoreboardRow::as_select())
        .load(con)
        .await?;

    let stats: Vec<models::StatisticRow> = rows
        .iter()
        .map(|row| models::StatisticRow::from_scoreboard(community_name, row))
        .collect();

    if stats.is_empty() {
        return Ok(());
    }

    diesel::dsl::insert_into(crate::schema::statistics::dsl::statistics)
        .values(&stats)
        .on_conflict((
            crate::schema::statistics::dsl::community_name,
            crate::schema::statistics::dsl::steam_id,
        ))
        .do_update()
        .set((
            crate::schema::statistics::dsl::kills.eq(crate::schema::statistics::dsl::kills
                + diesel::upsert::excluded(crate::schema::statistics::dsl::kills)),
            crate::schema::statistics::dsl::headshots
                .eq(crate::schema::statistics::dsl::headshots
                    + diesel::upsert::excluded(crate::schema::statistics::dsl::headshots)),
            crate::schema::statistics::dsl::assists.eq(crate::schema::statistics::dsl::assists
                + diesel::upsert::excluded(crate::schema::statistics::dsl::assists)),
            crate::schema::statistics::dsl::deaths.eq(crate::schema::statistics::dsl::deaths
                + diesel::upsert::excluded(crate::schema::statistics::dsl::deaths)),
            crate::schema::statistics::dsl::shots_fired
                .eq(crate::schema::statistics::dsl::shots_fired
                    + diesel::upsert::excluded(crate::schema::statistics::dsl::shots_fired)),
            crate::schema::statistics::dsl::shots_hit
                .eq(crate::schema::statistics::dsl::shots_hit
                    + diesel::upsert::excluded(crate::schema::statistics::dsl::shots_hit)),
            crate::schema::statistics::dsl::mvps.eq(crate::schema::statistics::dsl::mvps
                + diesel::upsert::excluded(crate::schema::statistics::dsl::mvps)),
        ))
        .execute(con)
        .await?;

    Ok(())
}

/// Replaces the full scoreboard for a match and upserts the players into
/// `users` so search-by-player finds them.
pub async fn replace_players(
    con: &mut diesel_async::AsyncPgConnection,
    match_id: &str,
    players: &[common::PlayerSnapshot],
) -> Result<(), BackendError> {
    for player in players {
        diesel::dsl::insert_into(crate::schema::users::dsl::users)
            .values(models::User {
                steam_id: player.steam_id.clone(),
                name: player.name.clone(),
                timestamp: chrono::Utc::now().naive_utc(),
            })
            .on_conflict(crate::schema::users::dsl::steam_id)
            .do_update()
            .set(crate::schema::users::dsl::name.eq(&player.name))
            .execute(con)
            .await?;
    }

    diesel::dsl::delete(
        crate::schema::scoreboard::dsl::scoreboard
            .filter(crate::schema::scoreboard::dsl::match_id.eq(match_id)),
    )
    .execute(con)
    .await?;

    let rows: Vec<models::ScoreboardRow> = players
        .iter()
        .map(|player| models::ScoreboardRow::from_snapshot(match_id, player))
        .collect();

    if !rows.is_empty() {
        diesel::dsl::insert_into(crate::schema::scoreboard::dsl::scoreboard)
            .values(&rows)
            .execute(con)
            .await?;
    }

    Ok(())
}

pub async fn scoreboard(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
) -> Result<(models::Match, Vec<models::ScoreboardRow>), BackendError> {
    let record = get(con, community_name, match_id).await?;

    let rows = crate::schema::scoreboard::dsl::scoreboard
        .filter(crate::schema::scoreboard::dsl::match_id.eq(match_id))
        .select(models::ScoreboardRow::as_select())
        .load(con)
        .await?;

    Ok((record, rows))
}

pub async fn demo_status(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
) -> Result<i16, BackendError> {
    get(con, community_name, match_id).await.map(|m| m.demo_status)
}

/// Atomically claims the demo slot, NONE -> UPLOADING. Exactly one concurrent
/// upload attempt can win this; everyone else gets `DemoAlreadyUploaded`.
pub async fn claim_demo_slot(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
) -> Result<(), BackendError> {
    let claimed = claim_demo_slot_query(community_name, match_id)
        .execute(con)
        .await?;

    if claimed == 1 {
        return Ok(());
    }

    // Raises InvalidMatchId when the match does not exist at all.
    get(con, community_name, match_id).await?;
    Err(BackendError::DemoAlreadyUploaded)
}

pub async fn set_demo_status(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_id: &str,
    value: i16,
) -> Result<(), BackendError> {
    let updated = diesel::dsl::update(
        crate::schema::matches::dsl::matches
            .filter(crate::schema::matches::dsl::match_id.eq(match_id))
            .filter(crate::schema::matches::dsl::community_name.eq(community_name)),
    )
    .set(crate::schema::matches::dsl::demo_status.eq(value))
    .execute(con)
    .await?;

    if updated == 0 {
        return Err(BackendError::InvalidMatchId);
    }
    Ok(())
}

/// Deletes match and scoreboard rows for every given id owned by the
/// community. Returns the ids that were actually deleted, so the caller can
/// enqueue the matching demo objects for removal.
pub async fn bulk_delete(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    match_ids: &[String],
) -> Result<Vec<String>, BackendError> {
    let community_name = community_name.to_string();
    let match_ids = match_ids.to_vec();

    con.build_transaction()
        .run(move |con| {
            Box::pin(async move {
                let owned: Vec<String> = crate::schema::matches::dsl::matches
                    .filter(crate::schema::matches::dsl::community_name.eq(&community_name))
                    .filter(crate::schema::matches::dsl::match_id.eq_any(&match_ids))
                    .select(crate::schema::matches::dsl::match_id)
                    .load(con)
                    .await?;

                if owned.is_empty() {
                    return Ok(owned);
                }

                diesel::dsl::delete(
                    crate::schema::scoreboard::dsl::scoreboard
                        .filter(crate::schema::scoreboard::dsl::match_id.eq_any(&owned)),
                )
                .execute(con)
                .await?;

                diesel::dsl::delete(
                    crate::schema::matches::dsl::matches
                        .filter(crate::schema::matches::dsl::match_id.eq_any(&owned)),
                )
                .execute(con)
                .await?;

                Ok::<_, BackendError>(owned)
            })
        })
        .await
}

/// Lists matches for a community, newest first by default. Without a search
/// term only matches that already have a scoreboard are returned.
pub async fn list(
    con: &mut diesel_async::AsyncPgConnection,
    community_name: &str,
    query: &common::MatchesQuery,
) -> Result<Vec<models::Match>, BackendError> {
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * PAGE_SIZE;
    let desc = query.desc.unwrap_or(true);

    let results = match query.search.as_deref().filter(|s| !s.is_empty()) {
        Some(search) => {
            let pattern = format!("%{}%", search);

            let mut q = crate::schema::matches::dsl::matches
                .inner_join(
                    crate::schema::scoreboard::dsl::scoreboard
                        .inner_join(crate::schema::users::dsl::users),
                )
                .filter(crate::schema::matches::dsl::community_name.eq(community_name))
                .filter(
                    crate::schema::matches::dsl::match_id
                        .eq(search)
                        .or(crate::schema::matches::dsl::map.like(pattern.clone()))
                        .or(crate::schema::matches::dsl::team_1_name.like(pattern.clone()))
                        .or(crate::schema::matches::dsl::team_2_name.like(pattern.clone()))
                        .or(crate::schema::users::dsl::name.like(pattern.clone()))
                        .or(crate::schema::users::dsl::steam_id.eq(search)),
                )
                .select(models::Match::as_select())
                .distinct()
                .limit(PAGE_SIZE)
                .offset(offset)
                .into_boxed();

            q = if desc {
                q.order(crate::schema::matches::dsl::timestamp.desc())
            } else {
                q.order(crate::schema::matches::dsl::timestamp.asc())
            };

            q.load(con).await?
        }
        None => {
            let mut q = crate::schema::matches::dsl::matches
                .inner_join(crate::schema::scoreboard::dsl::scoreboard)
                .filter(crate::schema::matches::dsl::community_name.eq(community_name))
                .select(models::Match::as_select())
                .distinct()
                .limit(PAGE_SIZE)
                .offset(offset)
                .into_boxed();

            q = if desc {
                q.order(crate::schema::matches::dsl::timestamp.desc())
            } else {
                q.order(crate::schema::matches::dsl::timestamp.asc())
            };

            q.load(con).await?
        }
    };

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn demo_object_path_joins_pathway_and_id() {
        assert_eq!(
            "demos/abc-123.dem",
            demo_object_path("demos", "abc-123")
        );
    }

    #[test]
    fn demo_object_path_trims_trailing_slash() {
        assert_eq!(
            "demos/abc-123.dem",
            demo_object_path("demos/", "abc-123")
        );
    }

    #[test]
    fn end_query_only_touches_live_matches() {
        let query = end_match_query("valve", "match-1");
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string();

        assert!(sql.contains(r#"SET "status" = $1"#), "{}", sql);
        assert!(sql.contains(r#""matches"."status" = $"#), "{}", sql);
        // ENDED first (set clause), then the scope binds and the LIVE guard.
        assert!(sql.contains(r#"binds: [0, "match-1", "valve", 1]"#), "{}", sql);
    }

    #[test]
    fn claim_query_only_touches_unclaimed_slots() {
        let query = claim_demo_slot_query("valve", "match-1");
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string();

        assert!(sql.contains(r#"SET "demo_status" = $1"#), "{}", sql);
        assert!(sql.contains(r#""matches"."demo_status" = $"#), "{}", sql);
        // UPLOADING first (set clause), then the scope binds and the NONE guard.
        assert!(sql.contains(r#"binds: [1, "match-1", "valve", 0]"#), "{}", sql);
    }
}
