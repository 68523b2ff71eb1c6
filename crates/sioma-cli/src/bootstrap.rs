use std::sync::Arc;

use anyhow::{Context, Result};
use sioma_store::{
    resolve_credential_provider, CredentialLookupOptions, EventSource, FileEventSource,
    FirestoreEventSource, FirestoreSourceConfig,
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use crate::cli_args::Cli;

pub(crate) fn init_tracing(log_level: Option<&str>) {
    let env_filter = match log_level.map(str::trim).filter(|level| !level.is_empty()) {
        Some(directive) => EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy(directive),
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Builds the event source. A fixture wins; otherwise the credential lookup
/// must succeed unless `--project-id` names the project directly.
pub(crate) fn build_event_source(cli: &Cli) -> Result<Arc<dyn EventSource>> {
    if let Some(path) = &cli.fixture {
        tracing::info!(path = %path.display(), "using fixture event source");
        return Ok(Arc::new(FileEventSource::new(path.clone())));
    }

    let config = firestore_config(cli)?;
    tracing::info!(
        project_id = %config.project_id,
        collection = %config.collection,
        base_url = %config.base_url,
        "using firestore event source"
    );
    let source = FirestoreEventSource::new(config).context("failed to build firestore client")?;
    Ok(Arc::new(source))
}

pub(crate) fn firestore_config(cli: &Cli) -> Result<FirestoreSourceConfig> {
    let options = CredentialLookupOptions {
        local_key_path: cli.credentials_file.clone(),
        secrets_path: cli.secrets_file.clone(),
        secrets_key: cli.secret_key.clone(),
        json_secret: cli.service_account_json.clone(),
    };
    let project_override = cli
        .project_id
        .as_deref()
        .map(str::trim)
        .filter(|project| !project.is_empty());

    let credential = resolve_credential_provider(&options).and_then(|provider| provider.load());
    let mut config = match (credential, project_override) {
        (Ok(credential), _) => {
            tracing::debug!(
                kind = credential.kind.as_str(),
                origin = %credential.origin,
                "service account credential loaded"
            );
            FirestoreSourceConfig::from_credential(&credential)
        }
        (Err(error), Some(project_id)) => {
            tracing::warn!(error = %error, "no service account credential; using --project-id");
            FirestoreSourceConfig::new(project_id)
        }
        (Err(error), None) => {
            return Err(error).context("no data source: service account credential unavailable")
        }
    };

    if let Some(project_id) = project_override {
        config.project_id = project_id.to_string();
    }
    if let Some(base_url) = cli
        .firestore_base_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    config.collection = cli.collection.clone();
    config.access_token = cli
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::tempdir;

    use super::*;

    fn cli_in(dir: &std::path::Path, extra: &[&str]) -> Cli {
        let credentials = dir.join("service-account-key.json");
        let secrets = dir.join("secrets.toml");
        let mut args = vec![
            "sioma".to_string(),
            "--credentials-file".to_string(),
            credentials.display().to_string(),
            "--secrets-file".to_string(),
            secrets.display().to_string(),
        ];
        args.extend(extra.iter().map(|arg| arg.to_string()));
        Cli::try_parse_from(args).expect("parse")
    }

    #[test]
    fn functional_local_key_file_supplies_project() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("service-account-key.json"),
            r#"{"type":"service_account","project_id":"sioma-prod","client_email":"bot@sioma"}"#,
        )
        .expect("write key");
        let cli = cli_in(
            dir.path(),
            &["--firestore-base-url", "http://127.0.0.1:8080/", "--access-token", " "],
        );

        let config = firestore_config(&cli).expect("config");
        assert_eq!(config.project_id, "sioma-prod");
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.collection, "work_logs");
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn functional_project_flag_overrides_credential_project() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("service-account-key.json"),
            r#"{"project_id":"sioma-prod"}"#,
        )
        .expect("write key");
        let cli = cli_in(dir.path(), &["--project-id", "sioma-staging"]);
        assert_eq!(
            firestore_config(&cli).expect("config").project_id,
            "sioma-staging"
        );
    }

    #[test]
    fn regression_missing_credential_without_project_is_fatal() {
        let dir = tempdir().expect("tempdir");
        let cli = cli_in(dir.path(), &[]);
        let error = firestore_config(&cli).expect_err("no credential");
        assert!(error.to_string().contains("no data source"));
    }

    #[test]
    fn functional_missing_credential_with_project_proceeds() {
        let dir = tempdir().expect("tempdir");
        let cli = cli_in(dir.path(), &["--project-id", "emulator-project"]);
        let config = firestore_config(&cli).expect("config");
        assert_eq!(config.project_id, "emulator-project");
    }

    #[test]
    fn unit_fixture_short_circuits_credential_lookup() {
        let dir = tempdir().expect("tempdir");
        let fixture = dir.path().join("events.json");
        let cli = cli_in(dir.path(), &["--fixture", fixture.to_str().expect("utf8")]);
        let source = build_event_source(&cli).expect("source");
        assert!(source.describe().contains("events.json"));
    }
}
