//! Helpers shared by the import commands.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use ferry::import::{ImportConfig, ImportContext, ImportContextBuilder};
use ferry::provider::ImportProvider;
use ferry::retry::{RetryAttempt, RetryObserver};
use ferry::{ImportConnection, MemoryStore, Platform};
use uuid::Uuid;

use crate::ImportOptions;
use crate::config::{Config, ImportDefaults};
use crate::shutdown::is_shutdown_requested;

/// Resolve the token for a platform or explain where to put it.
pub(crate) fn require_token(
    platform: Platform,
    flag: Option<String>,
    config: &Config,
) -> Result<String, Box<dyn std::error::Error>> {
    config.token(platform, flag).ok_or_else(|| {
        format!(
            "No {} token configured. Pass --token, set FERRY_{}_TOKEN, or add it to the [{}] section of ferry.toml.",
            platform,
            platform.as_str().to_uppercase(),
            platform
        )
        .into()
    })
}

fn log_retry() -> RetryObserver {
    Box::new(|attempt: &RetryAttempt| {
        tracing::warn!(
            label = %attempt.label,
            attempt = attempt.attempt,
            delay_ms = attempt.delay.as_millis() as u64,
            error = %attempt.error,
            "Retrying provider call"
        );
    })
}

/// Build the provider for a platform.
pub(crate) fn build_provider(
    platform: Platform,
    token: &str,
    config: &Config,
) -> Result<Box<dyn ImportProvider>, Box<dyn std::error::Error>> {
    let base_url = config.platform(platform).base_url.as_deref();
    if let Some(base_url) = base_url {
        tracing::debug!(%platform, base_url, "Using API base URL override");
    }

    match platform {
        #[cfg(feature = "slack")]
        Platform::Slack => {
            use ferry::slack::SlackProvider;
            let provider = match base_url {
                None => SlackProvider::new(token)?,
                Some(base) => SlackProvider::new_with_transport(
                    base,
                    token,
                    Some(ferry::AdaptiveRateLimiter::for_platform(platform)),
                    http_transport()?,
                ),
            };
            Ok(Box::new(provider.with_retry_observer(log_retry())))
        }
        #[cfg(feature = "linear")]
        Platform::Linear => {
            use ferry::linear::LinearProvider;
            let provider = match base_url {
                None => LinearProvider::new(token)?,
                Some(endpoint) => LinearProvider::new_with_transport(
                    endpoint,
                    token,
                    Some(ferry::AdaptiveRateLimiter::for_platform(platform)),
                    http_transport()?,
                ),
            };
            Ok(Box::new(provider.with_retry_observer(log_retry())))
        }
        #[cfg(feature = "todoist")]
        Platform::Todoist => {
            use ferry::todoist::{TODOIST_SYNC_BASE, TodoistProvider};
            let provider = match base_url {
                None => TodoistProvider::new(token)?,
                Some(base) => TodoistProvider::new_with_transport(
                    base,
                    TODOIST_SYNC_BASE,
                    token,
                    Some(ferry::AdaptiveRateLimiter::for_platform(platform)),
                    http_transport()?,
                ),
            };
            Ok(Box::new(provider.with_retry_observer(log_retry())))
        }
        #[allow(unreachable_patterns)]
        _ => Err(format!("ferry was built without {} support", platform).into()),
    }
}

#[cfg(any(feature = "slack", feature = "linear", feature = "todoist"))]
fn http_transport() -> Result<Arc<dyn ferry::http::HttpTransport>, Box<dyn std::error::Error>> {
    let transport = ferry::http::reqwest_transport::ReqwestTransport::with_timeout(
        std::time::Duration::from_secs(30),
    )?;
    Ok(Arc::new(transport))
}

/// Parse `YYYY-MM-DD` (start of day UTC, or end of day when `end_of_day`)
/// or an RFC 3339 timestamp.
pub(crate) fn parse_date(
    value: &str,
    end_of_day: bool,
) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", value))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| format!("Invalid date '{}'", value).into())
}

/// Merge CLI flags over configured defaults.
pub(crate) fn import_config(
    opts: &ImportOptions,
    defaults: &ImportDefaults,
) -> Result<ImportConfig, Box<dyn std::error::Error>> {
    let date_from = opts.from.as_deref().map(|d| parse_date(d, false)).transpose()?;
    let date_to = opts.to.as_deref().map(|d| parse_date(d, true)).transpose()?;
    if let (Some(from), Some(to)) = (date_from, date_to)
        && from > to
    {
        return Err("--from must not be after --to".into());
    }

    Ok(ImportConfig {
        item_filter: (!opts.filters.is_empty()).then(|| opts.filters.clone()),
        date_from,
        date_to,
        include_files: opts.files || defaults.include_files,
        include_threads: opts.threads || defaults.include_threads,
        include_completed: opts.completed || defaults.include_completed,
        include_comments: opts.comments || defaults.include_comments,
        include_archived: opts.archived || defaults.include_archived,
        container_concurrency: opts.concurrency.unwrap_or(defaults.concurrency),
        item_batch_size: opts.batch_size.unwrap_or(defaults.batch_size),
        max_run_secs: opts.max_run_secs.or(defaults.max_run_secs),
        platform_options: serde_json::Map::new(),
    })
}

/// Context builder over a fresh in-memory store, cancelled by Ctrl+C.
pub(crate) fn context_builder(
    connection: ImportConnection,
    config: ImportConfig,
) -> ImportContextBuilder {
    ImportContext::builder()
        .connection(connection)
        .workspace_id(Uuid::new_v4())
        .owner_id(Uuid::new_v4())
        .config(config)
        .store(Arc::new(MemoryStore::new()))
        .cancel_check(is_shutdown_requested)
}
