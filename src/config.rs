use std::{env, fmt::Display, str::FromStr};

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub version: String,
}

impl Config {
    /// Reads the process environment (after `.env` has been applied).
    ///
    /// Panics on a value that is set but does not parse.
    pub(crate) fn from_env() -> Self {
        Self {
            database_url: load("DATABASE_URL", "recipes.db"),
            host: load("HOST", "0.0.0.0"),
            port: load("PORT", "1234"),
            static_dir: load("STATIC_DIR", "static"),
            version: load("VERSION", "UNKNOWN"),
        }
    }
}

fn load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    resolve(key, env::var(key).ok(), default).unwrap_or_else(|err| panic!("{err}"))
}

fn resolve<T: FromStr>(key: &str, value: Option<String>, default: &str) -> Result<T, String>
where
    T::Err: Display,
{
    let value = value.unwrap_or_else(|| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value
        .parse()
        .map_err(|err| format!("invalid {key} value {value:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_value_falls_back_to_default() {
        let port: u16 = resolve("PORT", None, "1234").unwrap();
        assert_eq!(port, 1234);
    }

    #[test]
    fn set_value_wins() {
        let url: String = resolve("DATABASE_URL", Some(":memory:".into()), "recipes.db").unwrap();
        assert_eq!(url, ":memory:");
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let err = resolve::<u16>("PORT", Some("eighty".into()), "1234").unwrap_err();
        assert!(err.starts_with("invalid PORT value"), "{err}");
    }
}
