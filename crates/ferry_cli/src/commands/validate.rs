//! `ferry validate`: check a token and show the workspace behind it.

use ferry::provider::WorkspaceMetadata;
use ferry::{ImportConfig, ImportConnection, Platform};
use tabled::{Table, Tabled, settings::Style};

use super::OutputFormat;
use super::shared::{build_provider, context_builder, require_token};
use crate::config::Config;

/// Display struct for a validated workspace.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct WorkspaceDisplay {
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Workspace ID")]
    external_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl WorkspaceDisplay {
    fn new(platform: Platform, metadata: &WorkspaceMetadata) -> Self {
        Self {
            platform: platform.to_string(),
            external_id: metadata.external_id.clone(),
            name: metadata.name.clone(),
            status: "valid".to_string(),
        }
    }
}

pub(crate) async fn handle_validate(
    platform: Platform,
    token: Option<String>,
    output: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = require_token(platform, token, config)?;
    let provider = build_provider(platform, &token, config)?;
    let ctx = context_builder(
        ImportConnection::new(platform, token),
        ImportConfig::default(),
    )
    .build()?;

    provider
        .validate_connection(&ctx)
        .await
        .map_err(|e| format!("{} connection is not valid: {}", platform, e))?;
    let metadata = provider.fetch_workspace_metadata(&ctx).await?;

    match output {
        OutputFormat::Table => {
            let mut table = Table::new(vec![WorkspaceDisplay::new(platform, &metadata)]);
            table.with(Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_display_from_metadata() {
        let metadata = WorkspaceMetadata {
            external_id: "T123".to_string(),
            name: "Acme".to_string(),
            metadata: serde_json::json!({ "domain": "acme" }),
        };
        let display = WorkspaceDisplay::new(Platform::Slack, &metadata);
        assert_eq!(display.platform, "slack");
        assert_eq!(display.external_id, "T123");

        let rendered = Table::new(vec![display]).to_string();
        assert!(rendered.contains("Workspace ID"));
        assert!(rendered.contains("Acme"));
    }
}
