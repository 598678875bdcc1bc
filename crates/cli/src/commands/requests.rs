use botdesk_core::SubmittedRequest;
use botdesk_db::{connect_from_config, migrations, DbPool, RequestRepository, SqlRequestRepository};

use crate::commands::{block_on, load_config, CommandResult};

pub const DEFAULT_LIMIT: u32 = 20;

/// Lists stored requests newest first, one line each.
pub fn run(limit: u32) -> CommandResult {
    let config = match load_config("requests") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let result = block_on("requests", async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let listed = list(&pool, limit).await;
        pool.close().await;
        listed
    });

    match result {
        Ok(Ok((total, requests))) => {
            let mut lines = vec![format!(
                "{total} stored request(s); showing {} newest",
                requests.len()
            )];
            lines.extend(requests.iter().map(render_line));
            CommandResult::success("requests", lines.join("\n"))
        }
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("requests", error_class, message, exit_code)
        }
        Err(failure) => failure,
    }
}

async fn list(
    pool: &DbPool,
    limit: u32,
) -> Result<(u64, Vec<SubmittedRequest>), (&'static str, String, u8)> {
    let ready =
        migrations::schema_ready(pool).await.map_err(|error| ("query", error.to_string(), 6u8))?;
    if !ready {
        return Err((
            "schema_missing",
            "submitted_request table not found; run `botdesk migrate` first".to_string(),
            5,
        ));
    }

    let repository = SqlRequestRepository::new(pool.clone());
    let total = repository.count().await.map_err(|error| ("query", error.to_string(), 6u8))?;
    let requests =
        repository.list_recent(limit).await.map_err(|error| ("query", error.to_string(), 6u8))?;
    Ok((total, requests))
}

fn render_line(request: &SubmittedRequest) -> String {
    let what = match (&request.service, request.free_text.as_deref(), request.file_url.as_deref()) {
        (Some(service), Some(text), _) => format!("[{}] {text}", service.label()),
        (None, Some(text), _) => text.to_string(),
        (_, None, Some(_)) => "<file upload>".to_string(),
        _ => "<empty>".to_string(),
    };
    format!(
        "- {} {} {} (@{}): {what}",
        request.created_at.format("%Y-%m-%d %H:%M"),
        request.id,
        request.first_name,
        request.username
    )
}
