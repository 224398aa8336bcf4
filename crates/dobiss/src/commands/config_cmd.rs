//! Config subcommand handlers.

use std::fmt::Write;

use secrecy::SecretString;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

/// Copy of `cfg` with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.secret.is_some() {
            profile.secret = Some(REDACTED.into());
        }
    }
    cfg
}

fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out, "\n[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out, "\n[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "secure = {}", p.secure);
        if let Some(ref secret) = p.secret {
            let _ = writeln!(out, "secret = \"{secret}\"");
        }
        if let Some(ref env) = p.secret_env {
            let _ = writeln!(out, "secret_env = \"{env}\"");
        }
        if let Some(ref app) = p.application {
            let _ = writeln!(out, "application = \"{app}\"");
        }
        if let Some(secs) = p.discovery_interval {
            let _ = writeln!(out, "discovery_interval = {secs}");
        }
        if let Some(secs) = p.reconnect_delay {
            let _ = writeln!(out, "reconnect_delay = {secs}");
        }
        if let Some(secs) = p.timeout {
            let _ = writeln!(out, "timeout = {secs}");
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
    }

    out.trim_end().to_owned()
}

fn init(args: InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let host = global.host.clone().ok_or_else(|| CliError::Validation {
        field: "host".into(),
        reason: "pass --host <host[:port]>".into(),
    })?;

    let mut profile = Profile {
        host,
        secure: global.secure,
        insecure: global.insecure.then_some(true),
        timeout: global.timeout,
        discovery_interval: args.discovery_interval,
        ..Profile::default()
    };

    match (args.secret_env, global.secret.clone()) {
        (Some(env), _) => profile.secret_env = Some(env),
        (None, Some(secret)) if args.keyring => {
            config::store_secret(&args.name, &SecretString::from(secret))?;
            if !global.quiet {
                eprintln!("✓ secret stored in system keyring");
            }
        }
        (None, Some(secret)) => profile.secret = Some(secret),
        (None, None) => {
            return Err(CliError::NoSecret { profile: args.name });
        }
    }

    // Validate before writing anything.
    config::build_controller_config(&profile, SecretString::from("validation".to_string()))?;

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(args.name.clone(), profile);
    if args.set_default || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(args.name.clone());
    }
    let path = config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!("✓ profile '{}' written to {}", args.name, path.display());
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(global.output, &cfg, format_config);
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init(init_args) => init(init_args, global),

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: dobiss config init --host <host>");
            }
            let lines: Vec<String> = cfg
                .profiles
                .keys()
                .map(|name| {
                    let marker = if name == default { " *" } else { "" };
                    format!("{name}{marker}")
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ default profile set to '{name}'");
            }
            Ok(())
        }
    }
}
