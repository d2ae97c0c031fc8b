use crate::models::{ForwardRequest, ForwarderSettings};
use crate::utils::error::{ForwardError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads and saves forwarder settings and saved forwardings as TOML
pub struct ConfigService {
    config_dir: PathBuf,
}

impl ConfigService {
    /// Create a new config service with default directory
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            tracing::info!("Created config directory: {:?}", config_dir);

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(&config_dir)?.permissions();
                perms.set_mode(0o700);
                fs::set_permissions(&config_dir, perms)?;
            }
        }

        Ok(Self { config_dir })
    }

    /// Create a config service with custom directory
    pub fn with_dir(config_dir: PathBuf) -> Result<Self> {
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }
        Ok(Self { config_dir })
    }

    fn get_config_dir() -> Result<PathBuf> {
        ProjectDirs::from("com", "ssh-port-forwarder", "ssh-port-forwarder")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ForwardError::ConfigError("Failed to get config directory".to_string()))
    }

    fn settings_file(&self) -> PathBuf {
        self.config_dir.join("forwarder.toml")
    }

    fn forwardings_file(&self) -> PathBuf {
        self.config_dir.join("forwardings.toml")
    }

    /// Load settings, falling back to defaults when no file exists.
    /// Loaded values are validated.
    pub fn load_settings(&self) -> Result<ForwarderSettings> {
        let path = self.settings_file();

        if !path.exists() {
            tracing::info!("No settings file found, using defaults");
            return Ok(ForwarderSettings::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: ForwarderSettings = toml::from_str(&content)?;
        settings.validate()?;

        tracing::info!(
            "Loaded settings: {} channels, {} byte buffers",
            settings.channel_count,
            settings.buffer_size
        );
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &ForwarderSettings) -> Result<()> {
        settings.validate()?;
        let content = toml::to_string_pretty(settings)?;

        let path = self.settings_file();
        fs::write(&path, content)?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Saved forwardings; credentials are never stored
    pub fn load_forwardings(&self) -> Result<Vec<ForwardRequest>> {
        let path = self.forwardings_file();

        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        let saved: ForwardingsConfig = toml::from_str(&content)?;

        tracing::info!("Loaded {} forwardings", saved.forwardings.len());
        Ok(saved.forwardings)
    }

    /// Save a forwarding, replacing any with the same id
    pub fn save_forwarding(&self, request: &ForwardRequest) -> Result<()> {
        let mut forwardings = self.load_forwardings()?;

        match forwardings.iter().position(|f| f.id == request.id) {
            Some(pos) => forwardings[pos] = request.clone(),
            None => forwardings.push(request.clone()),
        }

        self.write_forwardings(forwardings)
    }

    pub fn delete_forwarding(&self, id: uuid::Uuid) -> Result<bool> {
        let mut forwardings = self.load_forwardings()?;
        let original_len = forwardings.len();

        forwardings.retain(|f| f.id != id);

        if forwardings.len() < original_len {
            self.write_forwardings(forwardings)?;
            tracing::info!("Deleted forwarding with ID: {}", id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn write_forwardings(&self, forwardings: Vec<ForwardRequest>) -> Result<()> {
        let count = forwardings.len();
        let content = toml::to_string_pretty(&ForwardingsConfig { forwardings })?;

        let path = self.forwardings_file();
        fs::write(&path, content)?;

        tracing::info!("Saved {} forwardings to {:?}", count, path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ForwardingsConfig {
    #[serde(default)]
    forwardings: Vec<ForwardRequest>,
}
