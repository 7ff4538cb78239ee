use serde::Deserialize;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `TAXFLOW__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub interview: InterviewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Read-only switches consulted by feature-flag and signing-mode conditions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlagsConfig {
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub essar_signing_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewConfig {
    #[serde(default = "default_tax_year")]
    pub tax_year: i32,
    #[serde(default = "default_review_route")]
    pub review_route: String,
    #[serde(default = "default_knockout_category_route")]
    pub knockout_category_route: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

// Default functions
fn default_tax_year() -> i32 {
    2024
}
fn default_review_route() -> String {
    "/flow/complete/review/review".to_string()
}
fn default_knockout_category_route() -> String {
    "/flow/knockout".to_string()
}
fn default_log_filter() -> String {
    "taxflow=info".to_string()
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            tax_year: default_tax_year(),
            review_route: default_review_route(),
            knockout_category_route: default_knockout_category_route(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            flags: FlagsConfig::default(),
            interview: InterviewConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables only.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from an optional TOML file, overlaid with
    /// `TAXFLOW__*` environment variables.
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::with_name(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("TAXFLOW")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_review_and_knockout_routes() {
        let config = AppConfig::default();
        assert_eq!(config.interview.review_route, "/flow/complete/review/review");
        assert_eq!(config.interview.knockout_category_route, "/flow/knockout");
        assert!(!config.flags.experimental);
        assert!(!config.flags.essar_signing_enabled);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[flags]\nexperimental = true\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(config.flags.experimental);
        assert_eq!(config.interview.tax_year, 2024);
        assert_eq!(config.logging.filter, "taxflow=info");
    }
}
