use kv::config::ServerConfig;

/// Loads `path` with `confy`, falling back to `ServerConfig::default()` if
/// the file does not exist. A malformed config file is still an error.
pub fn load(path: &str) -> anyhow::Result<ServerConfig> {
    if !std::path::Path::new(path).exists() {
        return Ok(ServerConfig::default());
    }
    confy::load_path(path).map_err(|err| anyhow::anyhow!("failed to load config {}: {}", path, err))
}
