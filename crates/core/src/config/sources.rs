/// Where a resolved database configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--driver` and `--dbstring` given on the command line
    Flags,
    /// Flat `DBX:` section of a configuration file
    File(String),
    /// Environment-keyed section of a `dbconf.yml` style file
    FileEnvironment { path: String, env: String },
}

impl ConfigSource {
    /// Check if source is the command line
    pub fn is_flags(&self) -> bool {
        matches!(self, ConfigSource::Flags)
    }

    /// Check if source is a configuration file
    pub fn is_file(&self) -> bool {
        !self.is_flags()
    }

    /// Get source description
    pub fn description(&self) -> String {
        match self {
            ConfigSource::Flags => "Command line flags".to_string(),
            ConfigSource::File(path) => format!("Configuration file: {}", path),
            ConfigSource::FileEnvironment { path, env } => {
                format!("Configuration file: {} (environment '{}')", path, env)
            }
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
