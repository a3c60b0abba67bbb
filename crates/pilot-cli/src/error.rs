use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a dotted config key, e.g. `provider.api_key`
pub fn to_env_var(field_path: &str) -> String {
    format!("PILOT_{}", field_path.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.api_key"), "PILOT_PROVIDER__API_KEY");
        assert_eq!(
            to_env_var("session.only_n_most_recent_images"),
            "PILOT_SESSION__ONLY_N_MOST_RECENT_IMAGES"
        );
    }
}
