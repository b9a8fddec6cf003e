use crate::config::settings::{PlaceConfig, Settings};
use crate::core::compare;
use crate::core::{Domain, SendOptions, SendReport, SyncEngine};
use crate::domain::model::PLACE_SEPARATOR;
use crate::domain::{StudyQuery, StudyUri};
use crate::utils::error::{Result, SyncError};
use std::fmt::Write as _;
use std::path::Path;

/// Text for the user plus whether the command did everything it was asked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

pub fn init(settings_path: &Path) -> Result<CommandOutput> {
    if settings_path.exists() {
        return Err(SyncError::ConfigError {
            message: format!("Settings file already exists at '{}'", settings_path.display()),
        });
    }
    Settings::default().save(settings_path)?;
    Ok(CommandOutput::ok(format!(
        "Created empty settings file at '{}'",
        settings_path.display()
    )))
}

pub fn status(settings: &Settings) -> CommandOutput {
    let keys: Vec<&str> = settings.places.iter().map(|p| p.key.as_str()).collect();
    CommandOutput::ok(format!(
        "{} places defined in settings: [{}]",
        keys.len(),
        keys.join(", ")
    ))
}

fn place_table<'a>(rows: impl Iterator<Item = (&'a str, String, String)>) -> String {
    let rows: Vec<_> = rows.collect();
    let key_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0).max(3);
    let kind_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0).max(4);

    let mut table = String::new();
    let _ = writeln!(table, "{:<key_width$}  {:<kind_width$}  place", "key", "type");
    let _ = writeln!(
        table,
        "{}  {}  {}",
        "-".repeat(key_width),
        "-".repeat(kind_width),
        "-".repeat(5)
    );
    for (key, kind, description) in rows {
        let _ = writeln!(table, "{:<key_width$}  {:<kind_width$}  {}", key, kind, description);
    }
    table.trim_end().to_string()
}

pub fn list_places(domain: &Domain) -> CommandOutput {
    CommandOutput::ok(place_table(
        domain
            .list_places()
            .map(|(key, place)| (key, place.kind().to_string(), place.description())),
    ))
}

pub fn add_place(settings: &mut Settings, place: PlaceConfig) -> Result<CommandOutput> {
    // build once so that a place that could never be used is not saved
    place.build()?;
    let message = format!("Added {} place '{}'", place.r#type, place.key);
    settings.add_place(place)?;
    Ok(CommandOutput::ok(message))
}

pub fn remove_place(settings: &mut Settings, key: &str) -> Result<CommandOutput> {
    let removed = settings.remove_place(key)?;
    Ok(CommandOutput::ok(format!(
        "Removed {} place '{}'",
        removed.r#type, removed.key
    )))
}

/// With a `:` the argument is a study query; without one it is a pattern over place keys.
pub async fn find(domain: &Domain, query: &str) -> Result<CommandOutput> {
    if !query.contains(PLACE_SEPARATOR) {
        let places = domain.query_places(query)?;
        return Ok(CommandOutput::ok(place_table(places.into_iter().map(
            |(key, place)| (key, place.kind().to_string(), place.description()),
        ))));
    }

    let query = StudyQuery::parse(query)?;
    let studies = domain.resolve(&query).await?;
    let mut text = format!("found {}:", studies.len());
    for study in &studies {
        let _ = write!(text, "\n{}", study.uri());
    }
    Ok(CommandOutput::ok(text))
}

/// An exact `place:patient/study` that matches nothing is tried once more under its slug.
async fn study_query(domain: &Domain, text: &str) -> Result<StudyQuery> {
    let query = StudyQuery::parse(text)?;
    if !query.is_exact() {
        return Ok(query);
    }
    let Some(uri) = StudyUri::parse(text.trim()) else {
        return Ok(query);
    };
    let slug = uri.to_slug();
    if slug == uri || !domain.resolve(&query).await?.is_empty() {
        return Ok(query);
    }
    tracing::debug!("Study \"{}\" not found. Trying slug \"{}\"", uri, slug);
    StudyQuery::parse(&slug.to_string())
}

pub async fn send(
    domain: &Domain,
    query: &str,
    destination: &str,
    options: SendOptions,
) -> Result<(CommandOutput, SendReport)> {
    let query = study_query(domain, query).await?;
    let report = SyncEngine::new(domain)
        .send(&query, destination, options)
        .await?;

    let mut text = report.summary();
    for failure in &report.failed {
        let _ = write!(text, "\nfailed: {} ({})", failure.study, failure.error);
    }
    for study in &report.would_send {
        let _ = write!(text, "\nwould send: {}", study);
    }
    let output = CommandOutput {
        text,
        success: !report.has_failures(),
    };
    Ok((output, report))
}

pub async fn compare(domain: &Domain, query_a: &str, query_b: &str) -> Result<CommandOutput> {
    let a = StudyQuery::parse(query_a)?;
    let b = StudyQuery::parse(query_b)?;
    let overlap = compare::compare(domain, &a, &b).await?;

    let mut text = format!("# Only in '{}':\n", a);
    for study in &overlap.only_in_a {
        let _ = writeln!(text, "{}", study.uri());
    }
    let _ = writeln!(text, "# Both in '{}' and '{}':", a, b);
    for key in &overlap.in_both {
        let _ = writeln!(text, "{}", key);
    }
    let _ = writeln!(text, "# Only in '{}':", b);
    for study in &overlap.only_in_b {
        let _ = writeln!(text, "{}", study.uri());
    }
    Ok(CommandOutput::ok(text.trim_end()))
}

#[cfg(feature = "cli")]
pub async fn run(cli: &crate::config::cli::CliConfig) -> Result<CommandOutput> {
    use crate::config::cli::{Command, PlaceCommand};

    let settings_path = cli.settings_path();
    if matches!(cli.command, Command::Init) {
        return init(&settings_path);
    }

    let mut settings = Settings::from_file(&settings_path)?;
    tracing::debug!(
        "Loaded {} places from {}",
        settings.places.len(),
        settings_path.display()
    );

    match &cli.command {
        Command::Init => init(&settings_path),
        Command::Status => Ok(status(&settings)),
        Command::Place { action } => match action {
            PlaceCommand::List => Ok(list_places(&settings.to_domain()?)),
            PlaceCommand::Add { key, backend } => {
                let output = add_place(&mut settings, backend.to_place_config(key))?;
                settings.save(&settings_path)?;
                Ok(output)
            }
            PlaceCommand::Remove { key } => {
                let output = remove_place(&mut settings, key)?;
                settings.save(&settings_path)?;
                Ok(output)
            }
        },
        Command::Find { query } => find(&settings.to_domain()?, query).await,
        Command::Send {
            query,
            destination,
            dry_run,
        } => {
            let domain = settings.to_domain()?;
            let options = SendOptions { dry_run: *dry_run };
            let (output, _) = send(&domain, query, destination, options).await?;
            Ok(output)
        }
        Command::Compare { query_a, query_b } => {
            compare(&settings.to_domain()?, query_a, query_b).await
        }
    }
}
