use crate::error::ConfigError;
use crate::settings::Config;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{DatabaseConfig, LoggingConfig};

/// Environment variables with this prefix override file settings,
/// e.g. `PGTABLE__DATABASE__HOST=db.internal`.
pub const ENV_PREFIX: &str = "PGTABLE";

/// Loads the application configuration.
///
/// Sources are layered in order: built-in defaults, an optional `config.toml` in
/// the working directory, then `PGTABLE__*` environment variables (a `.env` file is
/// read into the environment first, if present). The result is validated before
/// it is returned.
pub fn load_config() -> Result<Config, ConfigError> {
    // A missing .env file is not an error; explicit environment variables still apply.
    let _ = dotenvy::dotenv();

    let builder = defaults()?
        // Tells the builder to look for a file named `config.toml`
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    finish(builder)
}

/// Loads configuration from TOML text layered over the defaults, without consulting
/// the environment.
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    finish(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = config::Config::builder()
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.tls", false)?
        .set_default("database.maximum_connections", 10)?
        .set_default("logging.level", "info")?;
    Ok(builder)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Config, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.build()?.try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}
