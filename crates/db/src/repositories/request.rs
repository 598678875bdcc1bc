use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use botdesk_core::domain::request::{RequestId, SubmittedRequest};
use botdesk_core::domain::service::ServiceKind;
use botdesk_core::domain::user::{ChatId, UserId};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

// created_at is stored as fixed-width RFC 3339 so text order matches time order.
const SELECT_COLUMNS: &str = "SELECT id, user_id, username, first_name, last_name, chat_id,
                                     service, free_text, file_url, created_at
                              FROM submitted_request";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<SubmittedRequest, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let user_id: String = decode(row.try_get("user_id"))?;
    let username: String = decode(row.try_get("username"))?;
    let first_name: String = decode(row.try_get("first_name"))?;
    let last_name: Option<String> = decode(row.try_get("last_name"))?;
    let chat_id: i64 = decode(row.try_get("chat_id"))?;
    let service: Option<String> = decode(row.try_get("service"))?;
    let free_text: Option<String> = decode(row.try_get("free_text"))?;
    let file_url: Option<String> = decode(row.try_get("file_url"))?;
    let created_at_str: String = decode(row.try_get("created_at"))?;

    let service = match service {
        Some(token) => Some(
            ServiceKind::from_token(&token)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown service `{token}`")))?,
        ),
        None => None,
    };
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at `{created_at_str}`: {e}")))?;

    Ok(SubmittedRequest {
        id: RequestId(id),
        user_id: UserId(user_id),
        username,
        first_name,
        last_name,
        chat_id: ChatId(chat_id),
        service,
        free_text,
        file_url,
        created_at,
    })
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn save(&self, request: SubmittedRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO submitted_request (id, user_id, username, first_name, last_name, chat_id,
                                            service, free_text, file_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.user_id.0)
        .bind(&request.username)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(request.chat_id.0)
        .bind(request.service.map(ServiceKind::token))
        .bind(&request.free_text)
        .bind(&request.file_url)
        .bind(request.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<SubmittedRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SubmittedRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn list_all(&self) -> Result<Vec<SubmittedRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC"))
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM submitted_request")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
