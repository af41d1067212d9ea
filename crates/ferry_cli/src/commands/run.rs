//! `ferry run`: import one platform into an in-memory workspace.

use std::sync::Arc;

use ferry::{ImportConnection, ImportJob, ImportResult, Platform};
use tabled::{Table, Tabled, settings::Style};
use uuid::Uuid;

use super::OutputFormat;
use super::shared::{build_provider, context_builder, import_config, require_token};
use crate::ImportOptions;
use crate::config::Config;
use crate::progress::ProgressReporter;

/// One row of the run summary.
#[derive(Debug, Clone, Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn summary_rows(platform: Platform, result: &ImportResult) -> Vec<MetricRow> {
    let row = |metric, value: usize| MetricRow {
        metric,
        value: value.to_string(),
    };
    vec![
        MetricRow {
            metric: "Platform",
            value: platform.to_string(),
        },
        row("Containers created", result.items_created.len()),
        row("Containers imported", result.containers_imported),
        row("Items created", result.messages_created),
        row("Items existing", result.messages_existing),
        row("Users", result.users_matched),
        row("Files", result.files_imported),
        row("Errors", result.errors.len()),
        row("Warnings", result.warnings.len()),
    ]
}

fn print_result(
    platform: Platform,
    result: &ImportResult,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Table => {
            let mut table = Table::new(summary_rows(platform, result));
            table.with(Style::rounded());
            println!("{}", table);

            if !result.errors.is_empty() {
                println!("\nErrors:");
                for error in &result.errors {
                    println!("  - {}", error);
                }
            }
            if !result.warnings.is_empty() {
                println!("\nWarnings:");
                for warning in &result.warnings {
                    println!("  - {}", warning);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
    }
    Ok(())
}

fn invalidation_notice(connection: &ImportConnection) -> String {
    format!(
        "The {} connection is now {}. Re-authorize the token before the next run.",
        connection.platform, connection.status
    )
}

pub(crate) async fn handle_run(
    platform: Platform,
    token: Option<String>,
    opts: ImportOptions,
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = require_token(platform, token, config)?;
    let import_config = import_config(&opts, &config.import)?;
    let provider = build_provider(platform, &token, config)?;

    let mut connection = ImportConnection::new(platform, token);
    if let Some(team_id) = opts.team_id {
        connection = connection.with_team_id(team_id);
    }

    let workspace_id = Uuid::new_v4();
    let mut job = ImportJob::new(workspace_id, &connection, import_config);
    job.start()?;

    let reporter = Arc::new(ProgressReporter::new());
    let ctx = context_builder(connection.clone(), job.config.clone())
        .workspace_id(workspace_id)
        .progress(reporter.as_callback())
        .job_id(job.id)
        .build()?;

    tracing::info!(job_id = %job.id, platform = %platform, "Starting import");
    let outcome = ferry::import::run(&ctx, provider.as_ref()).await;
    reporter.finish();
    job.finish(outcome.as_ref())?;

    match outcome {
        Ok(result) => {
            tracing::info!(
                job_id = %job.id,
                created = result.messages_created,
                existing = result.messages_existing,
                errors = result.errors.len(),
                "Import finished"
            );
            print_result(platform, &result, output)
        }
        Err(e) => {
            if let Some(status) = e.connection_status() {
                connection.invalidate(status);
                eprintln!("{}", invalidation_notice(&connection));
            }
            if e.is_cancelled() {
                eprintln!("Import cancelled.");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_notice_names_new_status() {
        let mut connection = ImportConnection::new(Platform::Slack, "xoxb-test");
        connection.invalidate(ferry::ConnectionStatus::Revoked);
        let notice = invalidation_notice(&connection);
        assert!(notice.contains("slack"));
        assert!(notice.contains("revoked"));
    }

    #[test]
    fn test_summary_rows_report_counts() {
        let result = ImportResult {
            containers_imported: 2,
            messages_created: 5,
            messages_existing: 1,
            errors: vec!["item M2: store failed".to_string()],
            ..Default::default()
        };
        let rows = summary_rows(Platform::Linear, &result);
        let value = |metric: &str| {
            rows.iter()
                .find(|r| r.metric == metric)
                .map(|r| r.value.clone())
                .expect("metric present")
        };
        assert_eq!(value("Platform"), "linear");
        assert_eq!(value("Items created"), "5");
        assert_eq!(value("Errors"), "1");
    }
}
