use crate::config::settings::{PlaceConfig, DEFAULT_SETTINGS_FILE_NAME};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "dicomsync")]
#[command(about = "Find, compare and sync DICOM studies between places")]
pub struct CliConfig {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Write logs as JSON lines")]
    pub log_json: bool,

    #[arg(long, global = true, help = "Settings file to use [default: ./dicomsync.toml]")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE_NAME))
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create an empty settings file
    Init,
    /// Show which places are configured
    Status,
    /// Manage places
    Place {
        #[command(subcommand)]
        action: PlaceCommand,
    },
    /// Find studies (`place:patient/study`) or places (`pattern`)
    Find { query: String },
    /// Send every study matching a query to a destination place
    Send {
        query: String,
        destination: String,
        #[arg(long, help = "Only report what would be sent")]
        dry_run: bool,
    },
    /// Show which studies two queries have in common
    Compare { query_a: String, query_b: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum PlaceCommand {
    /// List all places
    List,
    /// Add a place
    Add {
        key: String,
        #[command(subcommand)]
        backend: PlaceBackend,
    },
    /// Remove a place
    Remove { key: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum PlaceBackend {
    /// Folder with `<patient>/<study>/` subfolders
    Folder { path: String },
    /// Folder with `<patient>/<study>.zip` files
    Zip { path: String },
    /// Project in an XNAT pre-archive
    Xnat {
        server: String,
        project: String,
        user: String,
        #[arg(long, help = "Password, may be a ${VAR} reference. Falls back to $XNAT_PASS")]
        password: Option<String>,
        #[arg(long)]
        timeout_seconds: Option<u64>,
    },
}

impl PlaceBackend {
    pub fn to_place_config(&self, key: &str) -> PlaceConfig {
        match self {
            PlaceBackend::Folder { path } => PlaceConfig::folder(key, path),
            PlaceBackend::Zip { path } => PlaceConfig::zip(key, path),
            PlaceBackend::Xnat {
                server,
                project,
                user,
                password,
                timeout_seconds,
            } => {
                let mut config = PlaceConfig::xnat(key, server, project, user);
                config.password = password.clone();
                config.timeout_seconds = *timeout_seconds;
                config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlaceKind;

    #[test]
    fn test_parse_send() {
        let cli = CliConfig::try_parse_from([
            "dicomsync",
            "send",
            "my_studies:patient1/study2",
            "zipped",
            "--dry-run",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.settings_path(), PathBuf::from("dicomsync.toml"));
        match cli.command {
            Command::Send {
                query,
                destination,
                dry_run,
            } => {
                assert_eq!(query, "my_studies:patient1/study2");
                assert_eq!(destination, "zipped");
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_place_add_xnat() {
        let cli = CliConfig::try_parse_from([
            "dicomsync",
            "--settings",
            "/tmp/other.toml",
            "place",
            "add",
            "archive",
            "xnat",
            "https://xnat.example.org",
            "PROJ",
            "alice",
            "--password",
            "${XNAT_PASS}",
        ])
        .unwrap();
        assert_eq!(cli.settings_path(), PathBuf::from("/tmp/other.toml"));
        let Command::Place {
            action: PlaceCommand::Add { key, backend },
        } = cli.command
        else {
            panic!("expected place add");
        };
        let config = backend.to_place_config(&key);
        assert_eq!(config.r#type, PlaceKind::Xnat);
        assert_eq!(config.project.as_deref(), Some("PROJ"));
        assert_eq!(config.password.as_deref(), Some("${XNAT_PASS}"));
    }

    #[test]
    fn test_compare_needs_two_queries() {
        assert!(CliConfig::try_parse_from(["dicomsync", "compare", "a:*"]).is_err());
        assert!(CliConfig::try_parse_from(["dicomsync", "compare", "a:*", "b:*"]).is_ok());
    }
}
