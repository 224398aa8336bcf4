//! CLI configuration: shared `dobiss_config` types plus resolution that
//! respects `GlobalOpts` flag overrides (--host, --secret, ...).

use secrecy::SecretString;

use dobiss_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use dobiss_config::{
    Config, Profile, build_controller_config, config_path, load_config_or_default, save_config,
    store_secret,
};

/// Active profile name: `--profile`, then the configured default.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Apply flag overrides to a profile.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if global.secure {
        profile.secure = true;
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    profile
}

/// Build the `ControllerConfig` for this invocation.
///
/// An existing profile is used with flag overrides; without one, `--host`
/// and `--secret` must supply everything.
pub fn resolve_controller_config(global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let (profile, from_file) = match cfg.profiles.get(&profile_name) {
        Some(profile) => (apply_overrides(profile.clone(), global), true),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => (apply_overrides(Profile::default(), global), false),
    };

    if profile.host.trim().is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    let secret = match global.secret {
        Some(ref secret) => SecretString::from(secret.clone()),
        None if from_file => dobiss_config::resolve_secret(&profile, &profile_name)?,
        None => return Err(CliError::NoSecret { profile: profile_name }),
    };

    tracing::debug!(profile = %profile_name, host = %profile.host, from_file, "resolved gateway");
    Ok(build_controller_config(&profile, secret)?)
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
