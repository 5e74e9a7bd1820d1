use crate::database::error::{DatabaseError, DbResult};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// One installation of the host
#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub id: Uuid,
    pub code: String,
    pub token: String,
}

pub struct ChannelRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ChannelRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find_by_token(&mut self, token: &str) -> DbResult<Option<ChannelRow>> {
        sqlx::query_as::<_, ChannelRow>("SELECT id, code, token FROM channels WHERE token = $1")
            .bind(token)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn insert(&mut self, code: &str, token: &str) -> DbResult<ChannelRow> {
        sqlx::query_as::<_, ChannelRow>(
            "INSERT INTO channels (code, token) VALUES ($1, $2) RETURNING id, code, token",
        )
        .bind(code)
        .bind(token)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
