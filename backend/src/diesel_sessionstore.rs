use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use tower_sessions::session_store::Error;

/// [`tower_sessions::SessionStore`] persisting sessions in the `sessions`
/// table, so logins survive server restarts.
#[derive(Clone)]
pub struct DieselStore {
    pool: crate::DbPool,
}

static EXPIRY_FORMAT: std::sync::LazyLock<
    &[time::format_description::BorrowedFormatItem<'static>],
> = std::sync::LazyLock::new(|| {
    time::macros::format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]:[offset_second]"
        )
});

impl DieselStore {
    pub fn new(pool: crate::DbPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> tower_sessions::session_store::Result<crate::DbConnection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::Backend(format!("Getting connection: {}", e)))
    }

    fn expiry_to_string(
        &self,
        expiry_date: &time::OffsetDateTime,
    ) -> tower_sessions::session_store::Result<String> {
        expiry_date
            .format(&EXPIRY_FORMAT)
            .map_err(|e| Error::Backend(format!("Formatting expiry date: {}", e)))
    }
    fn string_to_expiry(&self, input: &str) -> tower_sessions::session_store::Result<time::OffsetDateTime> {
        time::OffsetDateTime::parse(input, &EXPIRY_FORMAT)
            .map_err(|e| Error::Backend(format!("Parsing expiry date: {}", e)))
    }
}

impl std::fmt::Debug for DieselStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DieselStore").finish()
    }
}

#[async_trait::async_trait]
impl tower_sessions::SessionStore for DieselStore {
    async fn save(
        &self,
        session_record: &tower_sessions::session::Record,
    ) -> tower_sessions::session_store::Result<()> {
        let db_id = session_record.id.0.to_string();

        let expiry_date = self.expiry_to_string(&session_record.expiry_date)?;

        let steam_id = session_record
            .data
            .get(crate::UserSession::KEY)
            .and_then(|e| serde_json::from_value::<crate::UserSessionData>(e.clone()).ok())
            .and_then(|d| d.steam_id.map(|s| s.to_string()));

        let query = diesel::dsl::insert_into(crate::schema::sessions::dsl::sessions)
            .values(crate::models::Session {
                id: db_id,
                steam_id: steam_id.clone(),
                expiry_date: expiry_date.clone(),
            })
            .on_conflict(crate::schema::sessions::dsl::id)
            .do_update()
            .set((
                crate::schema::sessions::dsl::steam_id.eq(steam_id),
                crate::schema::sessions::dsl::expiry_date.eq(expiry_date),
            ));

        let mut connection = self.connection().await?;

        query
            .execute(&mut connection)
            .await
            .map_err(|e| Error::Backend(format!("Storing session: {}", e)))?;

        Ok(())
    }

    async fn load(
        &self,
        session_id: &tower_sessions::session::Id,
    ) -> tower_sessions::session_store::Result<Option<tower_sessions::session::Record>> {
        let db_id = session_id.0.to_string();

        let query = crate::schema::sessions::dsl::sessions
            .filter(crate::schema::sessions::dsl::id.eq(db_id));

        let mut connection = self.connection().await?;

        let mut result: Vec<crate::models::Session> = query
            .load(&mut connection)
            .await
            .map_err(|e| Error::Backend(format!("Loading session: {}", e)))?;

        if result.len() > 1 {
            tracing::error!("Found more than 1 result");
            return Err(Error::Backend("Found more than 1 result".to_string()));
        }

        let result = match result.pop() {
            Some(r) => r,
            None => return Ok(None),
        };

        let data = {
            let mut tmp = HashMap::<String, _>::new();
            tmp.insert(
                crate::UserSession::KEY.to_string(),
                serde_json::to_value(&crate::UserSessionData {
                    steam_id: result.steam_id.and_then(|s| s.parse().ok()),
                })
                .map_err(|e| Error::Backend(format!("Serializing session data: {}", e)))?,
            );
            tmp
        };

        let id = result
            .id
            .parse()
            .map_err(|e| Error::Backend(format!("Parsing session id: {}", e)))?;

        Ok(Some(tower_sessions::session::Record {
            id: tower_sessions::session::Id(id),
            data,
            expiry_date: self.string_to_expiry(&result.expiry_date)?,
        }))
    }

    async fn delete(
        &self,
        session_id: &tower_sessions::session::Id,
    ) -> tower_sessions::session_store::Result<()> {
        let db_id = session_id.0.to_string();

        let query = crate::schema::sessions::dsl::sessions
            .filter(crate::schema::sessions::dsl::id.eq(db_id));

        let mut connection = self.connection().await?;
        diesel::dsl::delete(query)
            .execute(&mut connection)
            .await
            .map_err(|e| Error::Backend(format!("Deleting session: {}", e)))?;

        Ok(())
    }
}
