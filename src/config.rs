use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub registry: RegistryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    /// Logic tree record (JSON) to load
    pub tree_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// Branch registry file; registration is skipped when unset
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub show_composites: bool,
    pub limit: Option<usize>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show_composites: true,
            limit: Some(20),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("logic_tree").required(false));

        // Add environment variables, e.g. LOGIC_TREE_INPUT__TREE_PATH
        config = config.add_source(
            config::Environment::with_prefix("LOGIC_TREE")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// The tree path, preferring an explicit override such as a command line argument
    pub fn tree_path(&self, override_path: Option<String>) -> anyhow::Result<String> {
        override_path
            .or_else(|| self.input.tree_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no logic tree given: pass a path or set LOGIC_TREE_INPUT__TREE_PATH"
                )
            })
    }
}
