//! Layered configuration: defaults, then an optional file, then `AGROSMART__*` environment.

use anyhow::Result;
use config::{Config, Environment, File, Value};

pub const ENV_PREFIX: &str = "AGROSMART";

/// Builds the layered [`Config`] for `service`.
///
/// `list_keys` names keys whose environment value is a comma separated list.
/// The optional file comes from `AGROSMART_CONFIG_FILE`; its format follows the extension.
pub fn layered_config(service: &str, defaults: &[(&str, Value)], list_keys: &[&str]) -> Result<Config> {
    let mut builder = Config::builder().set_default("service_name", service)?;
    for (key, value) in defaults {
        builder = builder.set_default(*key, value.clone())?;
    }
    if let Ok(file) = std::env::var(format!("{ENV_PREFIX}_CONFIG_FILE")) {
        tracing::debug!(%file, "adding config file source");
        builder = builder.add_source(File::with_name(&file).required(false));
    }
    let mut env = Environment::with_prefix(ENV_PREFIX).separator("__");
    if !list_keys.is_empty() {
        env = env.try_parsing(true).list_separator(",");
        for key in list_keys { env = env.with_list_parse_key(key); }
    }
    Ok(builder.add_source(env).build()?)
}
