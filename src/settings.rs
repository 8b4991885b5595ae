use log::warn;
use std::collections::HashMap;
use std::str::FromStr;

const ENV_PREFIX: &str = "TOH_";

#[derive(Clone, Debug)]
pub struct CorsSettings {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsSettings {
    fn default() -> Self {
        CorsSettings {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
            allow_headers: "Content-Type".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub cors: CorsSettings,
    pub other: HashMap<String, String>, // unrecognised TOH_* variables
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            debug: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite://toh_heroes.db?mode=rwc".to_string(),
            cors: CorsSettings::default(),
            other: HashMap::new(),
        }
    }
}

impl Settings {
    /// Build settings from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build settings from an arbitrary set of `(key, value)` pairs.
    ///
    /// Only keys starting with `TOH_` are considered. Values that fail to parse
    /// keep the default and log a warning.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut settings = Settings::default();
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "DEBUG" => settings.debug = parse_or(&key, &value, settings.debug),
                "HOST" => settings.host = value,
                "PORT" => settings.port = parse_or(&key, &value, settings.port),
                "DATABASE_URL" => settings.database_url = value,
                "CORS_ORIGIN" => settings.cors.allow_origin = value,
                _ => {
                    settings.other.insert(name.to_lowercase(), value);
                }
            }
        }
        settings
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, value: &str, default: T) -> T {
    match value.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!("Ignoring unparseable value {:?} for {}", value, key);
            default
        }
    }
}
