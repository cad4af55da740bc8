//! Command dispatch

use std::io;
use std::path::Path;

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::application::services::PanoramaSession;
use crate::application::{ControlRequest, ControlResponse};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::Document;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, try `panorama --help`".into(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(cli, command),
        other => {
            let settings = load_settings(cli)?;
            let container = ServiceContainer::new(settings);
            match other {
                Commands::Toggle => cmd_request(&container, None, ControlRequest::Toggle),
                Commands::State => cmd_request(&container, None, ControlRequest::GetState),
                Commands::Debug { snapshot } => cmd_debug(&container, snapshot),
                Commands::Apply { snapshot } => cmd_apply(&container, snapshot),
                Commands::Request { message, snapshot } => {
                    let request = ControlRequest::from_json(message)?;
                    cmd_request(&container, snapshot.as_deref(), request)
                }
                Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
            }
        }
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load_with(Some(path.as_path()))?,
        None => Settings::load()?,
    };
    Ok(settings)
}

/// Session with the stored preference loaded, as the content side sees it after start-up.
fn session(container: &ServiceContainer, snapshot: Option<&Path>) -> CliResult<PanoramaSession> {
    let document = match snapshot {
        Some(path) => container.load_snapshot(path)?,
        None => Document::default(),
    };
    let mut session = container.session(document)?;
    session.initialize();
    Ok(session)
}

#[instrument(skip(container))]
fn cmd_request(
    container: &ServiceContainer,
    snapshot: Option<&Path>,
    request: ControlRequest,
) -> CliResult<()> {
    let mut session = session(container, snapshot)?;
    let response = session.handle(request);
    debug!(?response, "control response");
    output::info(&response.to_json());
    Ok(())
}

#[instrument(skip(container))]
fn cmd_debug(container: &ServiceContainer, snapshot: &Path) -> CliResult<()> {
    let session = session(container, Some(snapshot))?;
    let report = session.inspect();
    output::header("Layout");
    output::info(&report);
    if report.elements() {
        output::success("common parent found");
    } else {
        output::failure("common parent not found");
    }
    output::info(&ControlResponse::Debug {
        elements: report.elements(),
    }
    .to_json());
    Ok(())
}

#[instrument(skip(container))]
fn cmd_apply(container: &ServiceContainer, snapshot: &Path) -> CliResult<()> {
    let document = container.load_snapshot(snapshot)?;
    let mut session = container.session(document)?;
    session.set_enabled(true);
    let settle = session.retry_policy().delays().iter().copied().max().unwrap_or(0);
    session.advance(settle);

    let json = serde_json::to_string_pretty(&session.document().snapshot()).map_err(|e| {
        InfraError::Snapshot {
            path: snapshot.display().to_string(),
            message: e.to_string(),
        }
    })?;
    output::info(&json);
    Ok(())
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let config = cli.config.clone().or_else(global_config_path);
            let settings = load_settings(cli)?;
            let show = |p: Option<std::path::PathBuf>| {
                p.map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unavailable>".to_string())
            };
            output::action("config", &show(config));
            output::action("preferences", &show(settings.preferences_path()));
        }
    }
    Ok(())
}
