//! Configuration management commands.

use std::path::Path;

use condense_core::config::IssueSeverity;
use condense_core::Config;

use crate::ConfigAction;

pub fn handle(action: ConfigAction, config: &Config, source: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# Effective configuration");
            match source {
                Some(path) => println!("# Explicit file: {}", path.display()),
                None => println!(
                    "# User file: {}",
                    Config::config_dir().join("config.toml").display()
                ),
            }
            println!();
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Validate => {
            let result = config.validate();
            for issue in &result.issues {
                let level = match issue.severity {
                    IssueSeverity::Error => "error",
                    IssueSeverity::Warning => "warning",
                };
                println!("{}: {}: {}", level, issue.field, issue.message);
            }

            if !result.is_ok() {
                anyhow::bail!(
                    "Configuration has {} error(s)",
                    result.errors().len()
                );
            }
            println!(
                "Configuration is valid ({} warning(s))",
                result.warnings().len()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(handle(ConfigAction::Validate, &Config::default(), None).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.compression.threshold = 1;
        assert!(handle(ConfigAction::Validate, &config, None).is_err());
    }

    #[test]
    fn test_show_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("condense.toml");
        std::fs::write(&path, "[compression]\nthreshold = 12\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.compression.threshold, 12);
        assert!(handle(ConfigAction::Show, &config, Some(&path)).is_ok());
    }
}
