use crate::cli::ConfigAction;
use crate::commands::handle_error;
use crate::config::Config;
use crate::models::PricingManager;

fn print_success(message: &str, json_output: bool) {
    if json_output {
        println!(
            "{}",
            serde_json::json!({ "status": "success", "message": message })
        );
    } else {
        println!("{message}");
    }
}

pub fn handle_config_action(action: ConfigAction, json_output: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            if let Err(e) = Config::default().save() {
                handle_error("Failed to initialize config", &e, json_output);
                return Err(e);
            }
            match Config::default_path() {
                Ok(config_path) => print_success(
                    &format!("Configuration initialized at: {}", config_path.display()),
                    json_output,
                ),
                Err(_) => print_success("Configuration initialized successfully", json_output),
            }
        }
        ConfigAction::Show => {
            let config = match Config::load() {
                Ok(config) => config,
                Err(e) => {
                    handle_error("Failed to load config", &e, json_output);
                    return Err(e);
                }
            };

            if json_output {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                if let Ok(config_path) = Config::default_path() {
                    println!("Configuration ({})", config_path.display());
                } else {
                    println!("Configuration:");
                }
                println!("{}", toml::to_string_pretty(&config)?);
                println!(
                    "Known pricing models: {}",
                    PricingManager::new().list_models().join(", ")
                );
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = match Config::load() {
                Ok(config) => config,
                Err(e) => {
                    handle_error("Failed to load config", &e, json_output);
                    return Err(e);
                }
            };

            if key == "pricing.model" && !value.is_empty() && !PricingManager::new().contains(&value) {
                let e = anyhow::anyhow!(
                    "Unknown model '{value}'. Known models: {}",
                    PricingManager::new().list_models().join(", ")
                );
                handle_error("Invalid configuration", &e, json_output);
                return Err(e);
            }

            if let Err(e) = config.set_value(&key, &value) {
                handle_error("Invalid configuration", &e, json_output);
                return Err(e);
            }
            if let Err(e) = config.save() {
                handle_error("Failed to save config", &e, json_output);
                return Err(e);
            }
            print_success(&format!("Configuration updated: {key} = {value}"), json_output);
        }
    }
    Ok(())
}
