use arbiter_orchestrator::EngineConfig;
use arbiter_registry::RegistryConfig;
use serde::Deserialize;
use std::path::Path;

/// Top-level `arbiter.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArbiterConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Registry server used by `discover` and `dispute`.
    #[serde(default)]
    pub proxy_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Keys accepted by the gateway. Empty disables auth.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_keys: vec![],
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl ArbiterConfig {
    /// Read `path`. A missing file yields the defaults unless `required`.
    pub fn load(path: &Path, required: bool) -> anyhow::Result<Self> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {e}", path.display())
        })?;
        let config: ArbiterConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {e}", path.display()))?;
        Ok(config)
    }

    /// Apply `AGENT_URLS`, `PROXY_URL`, `PORT` and `ARBITER_API_KEYS`.
    ///
    /// `lookup` is `std::env::var(..).ok()` in the binary.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(urls) = lookup("AGENT_URLS") {
            self.registry.agent_urls = RegistryConfig::parse_url_list(&urls);
        }
        if let Some(proxy) = lookup("PROXY_URL").filter(|p| !p.trim().is_empty()) {
            self.proxy_url = Some(proxy.trim().to_string());
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("PORT must be a port number, got '{port}': {e}"))?;
        }
        if let Some(keys) = lookup("ARBITER_API_KEYS") {
            self.server.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// Validate every section.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.registry.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}
