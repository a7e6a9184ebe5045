use std::env;

use crate::models::CLIConfig;

const DEFAULT_URL: &str = "http://localhost:8080";
const DEFAULT_MODULE: &str = "theater";

pub fn parse_config() -> CLIConfig {
    let mut cfg = CLIConfig {
        base_url: env_or("THEATER_CORE_URL", DEFAULT_URL.to_string()),
        module: env_or("THEATER_CORE_MODULE", DEFAULT_MODULE.to_string()),
        units: env_usize("THEATER_CORE_UNITS", 1),
        content: env_opt("THEATER_CORE_CONTENT"),
        current_task: None,
    };

    let args: Vec<String> = env::args().collect();
    let mut idx = 1;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.base_url = value.clone();
                    idx += 1;
                }
            }
            "--module" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.module = value.clone();
                    idx += 1;
                }
            }
            "--units" => {
                if let Some(value) = args.get(idx + 1) {
                    if let Ok(parsed) = value.parse::<usize>() {
                        cfg.units = parsed;
                    }
                    idx += 1;
                }
            }
            "--content" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.content = Some(value.clone());
                    idx += 1;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    cfg
}

fn env_or(key: &str, fallback: String) -> String {
    env::var(key).unwrap_or(fallback)
}

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_usize(key: &str, fallback: usize) -> usize {
    match env::var(key) {
        Ok(value) => value.parse::<usize>().unwrap_or(fallback),
        Err(_) => fallback,
    }
}
