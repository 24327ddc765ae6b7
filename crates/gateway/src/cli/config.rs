use pal_domain::config::{Config, ConfigSeverity};
use pal_providers::catalog;

/// Parse and validate the config, printing any issues.
///
/// Returns `false` when errors were found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML. Inline
/// API keys are masked.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(&masked(config))?;
    print!("{output}");
    Ok(())
}

/// Print the known models of every configured provider. `*` marks the
/// configured chat model, `[vision]` models that accept images.
pub fn models(config: &Config) {
    if config.llm.providers.is_empty() {
        println!("No providers configured.");
        return;
    }
    for provider in &config.llm.providers {
        let active = config.llm.active_provider.as_deref() == Some(provider.id.as_str());
        println!("{}{}", provider.id, if active { " (active)" } else { "" });
        let mut listed = false;
        for m in catalog::models_for(&provider.id) {
            let mark = if m.id == provider.chat_model { '*' } else { ' ' };
            let vision = if m.supports_vision { " [vision]" } else { "" };
            println!("  {mark} {:<28} {}{vision}", m.id, m.name);
            listed = true;
        }
        if !listed || catalog::lookup(&provider.id, &provider.chat_model).is_none() {
            let vision = catalog::supports_vision(&provider.id, &provider.chat_model, provider.vision);
            println!(
                "  * {:<28} (not in catalog){}",
                provider.chat_model,
                if vision { " [vision]" } else { "" }
            );
        }
    }
}

fn masked(config: &Config) -> Config {
    let mut config = config.clone();
    for provider in &mut config.llm.providers {
        if let Some(key) = provider.auth.key.as_mut() {
            *key = mask_key(key);
        }
    }
    config
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".into();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pal_domain::config::ProviderConfig;

    #[test]
    fn keys_are_masked() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("sk-abcdefgh1234"), "sk-a****1234");
    }

    #[test]
    fn show_never_prints_raw_key() {
        let mut config = Config::default();
        let mut provider: ProviderConfig = toml::from_str("id = \"zhipu\"\nchat_model = \"glm-4-flash\"").unwrap();
        provider.auth.key = Some("secret-key-value-123".into());
        config.llm.providers.push(provider);

        let dumped = toml::to_string_pretty(&masked(&config)).unwrap();
        assert!(!dumped.contains("secret-key-value-123"));
        assert!(dumped.contains("secr****-123"));
    }
}
