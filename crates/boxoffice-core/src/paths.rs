use std::env;
use std::path::PathBuf;

/// The user's home directory: HOME, then USERPROFILE. Empty values are
/// skipped.
pub fn get_home_dir() -> Result<PathBuf, String> {
    for var in ["HOME", "USERPROFILE"] {
        if let Ok(value) = env::var(var) {
            if !value.is_empty() {
                return Ok(PathBuf::from(value));
            }
        }
    }

    Err("Neither HOME nor USERPROFILE is set".to_string())
}

/// `~/.config/boxoffice`, where config.json and storage.json live.
pub fn default_config_dir() -> Result<PathBuf, String> {
    Ok(get_home_dir()?.join(".config").join("boxoffice"))
}

#[cfg(test)]
mod tests {
    use super::{default_config_dir, get_home_dir};
    use std::env;
    use std::path::PathBuf;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with each listed variable set (or unset for `None`), then put
    /// the previous values back.
    fn with_vars<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        let saved: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(name, _)| (name.to_string(), env::var(name).ok()))
            .collect();

        let apply = |name: &str, value: Option<&str>| match value {
            Some(value) => env::set_var(name, value),
            None => env::remove_var(name),
        };

        for (name, value) in vars {
            apply(*name, *value);
        }
        f();
        for (name, value) in &saved {
            apply(name.as_str(), value.as_deref());
        }
    }

    #[test]
    fn get_home_dir_prefers_home() {
        with_vars(&[("HOME", Some("/tmp/home")), ("USERPROFILE", Some("/tmp/profile"))], || {
            assert_eq!(get_home_dir().unwrap(), PathBuf::from("/tmp/home"));
        });
    }

    #[test]
    fn get_home_dir_falls_back_to_userprofile() {
        with_vars(&[("HOME", Some("")), ("USERPROFILE", Some("/tmp/profile"))], || {
            assert_eq!(get_home_dir().unwrap(), PathBuf::from("/tmp/profile"));
        });
    }

    #[test]
    fn get_home_dir_errors_without_either() {
        with_vars(&[("HOME", None), ("USERPROFILE", None)], || {
            assert!(get_home_dir().is_err());
        });
    }

    #[test]
    fn default_config_dir_is_under_home() {
        with_vars(&[("HOME", Some("/tmp/home"))], || {
            assert_eq!(
                default_config_dir().unwrap(),
                PathBuf::from("/tmp/home/.config/boxoffice")
            );
        });
    }
}
