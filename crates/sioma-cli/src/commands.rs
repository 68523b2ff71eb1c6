use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sioma_core::write_json_report;
use sioma_dashboard::{
    render_dashboard_text, render_events_text, render_facets_text, DashboardSession,
    DashboardView, FilterSelection,
};
use sioma_types::DashboardNotice;

use crate::bootstrap::build_event_source;
use crate::cli_args::{Cli, Command};

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let source = build_event_source(&cli)?;
    let mut session = DashboardSession::new(source, cli.timezone);
    let selection = cli.filter.to_selection();
    let command = cli
        .command
        .clone()
        .unwrap_or(Command::Summary { output: None });

    if let Command::Watch { interval_secs } = command {
        return run_watch(
            &mut session,
            &selection,
            cli.json,
            Duration::from_secs(interval_secs),
            ctrl_c_signal(),
        )
        .await;
    }

    let output = run_once(&mut session, &selection, &command, cli.json).await?;
    println!("{output}");
    Ok(())
}

/// One fetch/filter/aggregate/render pass. A rejected selection renders its
/// notice in place of results.
pub(crate) async fn run_once(
    session: &mut DashboardSession,
    selection: &FilterSelection,
    command: &Command,
    json: bool,
) -> Result<String> {
    let view = match session.apply_filter(selection).await {
        Ok(view) => view,
        Err(error) => return render_rejection(&error.to_notice(), json),
    };

    match command {
        Command::Summary {
            output: Some(path),
        } => write_summary_report(path, &view),
        Command::Summary { output: None } | Command::Watch { .. } => {
            if json {
                serde_json::to_string_pretty(view.as_ref()).context("failed to encode summary")
            } else {
                Ok(render_dashboard_text(&view))
            }
        }
        Command::Events { limit } => {
            let rows = &view.rows[..limit.unwrap_or(view.rows.len()).min(view.rows.len())];
            if json {
                serde_json::to_string_pretty(rows).context("failed to encode events")
            } else {
                Ok(with_notices(&view.notices, render_events_text(rows)))
            }
        }
        Command::Facets => {
            if json {
                serde_json::to_string_pretty(&view.facets).context("failed to encode facets")
            } else {
                Ok(with_notices(&view.notices, render_facets_text(&view.facets)))
            }
        }
    }
}

/// Re-renders the summary every `interval` until `shutdown` resolves. The
/// same shutdown future is polled while a pass is in flight.
async fn run_watch(
    session: &mut DashboardSession,
    selection: &FilterSelection,
    json: bool,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let command = Command::Summary { output: None };
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("watch interrupted");
                return Ok(());
            }
        }
        let outcome = tokio::select! {
            outcome = run_once(session, selection, &command, json) => outcome,
            _ = &mut shutdown => {
                tracing::info!("watch interrupted during refresh");
                return Ok(());
            }
        };
        match outcome {
            Ok(output) => println!("{output}\n"),
            Err(error) => tracing::warn!(error = %error, "watch iteration failed"),
        }
    }
}

async fn ctrl_c_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "ctrl-c handler unavailable; watch runs until killed");
        std::future::pending::<()>().await;
    }
}

fn write_summary_report(path: &Path, view: &DashboardView) -> Result<String> {
    let bytes = write_json_report(path, view)
        .with_context(|| format!("failed to write summary report {}", path.display()))?;
    Ok(format!(
        "summary report written: path={} generation={} rows={} bytes={}",
        path.display(),
        view.generation,
        view.rows.len(),
        bytes
    ))
}

fn render_rejection(notice: &DashboardNotice, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(&serde_json::json!({ "notices": [notice] }))
            .context("failed to encode notice");
    }
    Ok(notice_line(notice))
}

fn with_notices(notices: &[DashboardNotice], body: String) -> String {
    let mut lines = notices.iter().map(notice_line).collect::<Vec<_>>();
    lines.push(body);
    lines.join("\n")
}

fn notice_line(notice: &DashboardNotice) -> String {
    format!(
        "notice: severity={} reason_code={} message={}",
        notice.severity.as_str(),
        notice.reason_code,
        notice.message
    )
}
