use crate::adapters::{DicomRootFolder, XnatClient, XnatPreArchive, ZippedDicomRootFolder};
use crate::core::Domain;
use crate::domain::{Place, PlaceKind};
use crate::utils::error::{Result, SyncError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_place_key, validate_required_field,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_SETTINGS_FILE_NAME: &str = "dicomsync.toml";

pub use crate::adapters::xnat::PASSWORD_ENV_VAR;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub places: Vec<PlaceConfig>,
}

/// One configured place. Which fields are needed depends on `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceConfig {
    pub key: String,
    pub r#type: PlaceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl PlaceConfig {
    pub fn folder(key: &str, path: &str) -> Self {
        Self::local(key, PlaceKind::Folder, path)
    }

    pub fn zip(key: &str, path: &str) -> Self {
        Self::local(key, PlaceKind::Zip, path)
    }

    pub fn xnat(key: &str, server: &str, project: &str, user: &str) -> Self {
        Self {
            key: key.to_string(),
            r#type: PlaceKind::Xnat,
            path: None,
            server: Some(server.to_string()),
            project: Some(project.to_string()),
            user: Some(user.to_string()),
            password: None,
            timeout_seconds: None,
        }
    }

    fn local(key: &str, kind: PlaceKind, path: &str) -> Self {
        Self {
            key: key.to_string(),
            r#type: kind,
            path: Some(path.to_string()),
            server: None,
            project: None,
            user: None,
            password: None,
            timeout_seconds: None,
        }
    }

    fn field(&self, name: &str) -> String {
        format!("places.{}.{}", self.key, name)
    }

    /// 建立對應的 Place 實例，`${VAR}` 在這裡才替換，存檔時保留原文
    pub fn build(&self) -> Result<Box<dyn Place>> {
        self.validate()?;
        match self.r#type {
            PlaceKind::Folder => {
                let path = validate_required_field(&self.field("path"), &self.path)?;
                Ok(Box::new(DicomRootFolder::new(substitute_env_vars(path))))
            }
            PlaceKind::Zip => {
                let path = validate_required_field(&self.field("path"), &self.path)?;
                Ok(Box::new(ZippedDicomRootFolder::new(substitute_env_vars(path))))
            }
            PlaceKind::Xnat => {
                let server = validate_required_field(&self.field("server"), &self.server)?;
                let project = validate_required_field(&self.field("project"), &self.project)?;
                let user = validate_required_field(&self.field("user"), &self.user)?;
                // 沒有密碼時，連線當下才讀取 $XNAT_PASS
                let password = self.password.as_deref().map(substitute_env_vars);
                let client = XnatClient::with_timeout(
                    &substitute_env_vars(server),
                    &substitute_env_vars(user),
                    password,
                    self.timeout_seconds
                        .unwrap_or(crate::adapters::xnat::DEFAULT_TIMEOUT_SECONDS),
                )?;
                Ok(Box::new(XnatPreArchive::new(
                    Box::new(client),
                    substitute_env_vars(project),
                )))
            }
        }
    }
}

impl Validate for PlaceConfig {
    fn validate(&self) -> Result<()> {
        validate_place_key("places.key", &self.key)?;
        match self.r#type {
            PlaceKind::Folder | PlaceKind::Zip => {
                let path = validate_required_field(&self.field("path"), &self.path)?;
                validate_path(&self.field("path"), path)?;
            }
            PlaceKind::Xnat => {
                let server = validate_required_field(&self.field("server"), &self.server)?;
                validate_url(&self.field("server"), &substitute_env_vars(server))?;
                let project = validate_required_field(&self.field("project"), &self.project)?;
                validate_non_empty_string(&self.field("project"), project)?;
                let user = validate_required_field(&self.field("user"), &self.user)?;
                validate_non_empty_string(&self.field("user"), user)?;
            }
        }
        Ok(())
    }
}

impl Settings {
    pub fn default_path(folder: &Path) -> PathBuf {
        folder.join(DEFAULT_SETTINGS_FILE_NAME)
    }

    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NoSettingsFound {
                    path: path.display().to_string(),
                })
            }
            Err(e) => return Err(SyncError::IoError(e)),
        };
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SyncError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SyncError::ConfigError {
            message: format!("TOML serialization error: {}", e),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_toml_string()?)?;
        tracing::debug!("Saved settings to {}", path.as_ref().display());
        Ok(())
    }

    pub fn place(&self, key: &str) -> Option<&PlaceConfig> {
        self.places.iter().find(|p| p.key == key)
    }

    pub fn add_place(&mut self, place: PlaceConfig) -> Result<()> {
        place.validate()?;
        if self.place(&place.key).is_some() {
            return Err(SyncError::DuplicateKey { key: place.key });
        }
        self.places.push(place);
        Ok(())
    }

    pub fn remove_place(&mut self, key: &str) -> Result<PlaceConfig> {
        let index = self
            .places
            .iter()
            .position(|p| p.key == key)
            .ok_or_else(|| SyncError::UnknownPlace {
                key: key.to_string(),
            })?;
        Ok(self.places.remove(index))
    }

    /// Register every configured place, in file order.
    pub fn to_domain(&self) -> Result<Domain> {
        self.validate()?;
        let mut domain = Domain::new();
        for place in &self.places {
            domain.register(place.key.clone(), place.build()?)?;
        }
        Ok(domain)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        for (index, place) in self.places.iter().enumerate() {
            place.validate()?;
            if self.places[..index].iter().any(|p| p.key == place.key) {
                return Err(SyncError::DuplicateKey {
                    key: place.key.clone(),
                });
            }
        }
        Ok(())
    }
}

/// 替換環境變數 (例如 ${XNAT_PASS})，找不到的變數保留原文
pub fn substitute_env_vars(content: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .to_string()
}
