use crate::{config, rate_limit::Quotas};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 18890;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ships_per_minute: Option<u32>,
    pub registrations_per_hour: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub host: String,
    pub port: u16,
    pub quotas: Quotas,
}

/// CLI flags win over the config file, which wins over defaults.
pub fn effective_settings(cli: &CliOverrides, cfg: Option<&config::Config>) -> EffectiveSettings {
    let cfg_server = cfg.and_then(|c| c.server.as_ref());
    let cfg_limits = cfg.and_then(|c| c.limits.as_ref());

    let host = cli
        .host
        .clone()
        .or_else(|| cfg_server.and_then(|s| s.host.clone()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = cli
        .port
        .or_else(|| cfg_server.and_then(|s| s.port))
        .unwrap_or(DEFAULT_PORT);

    let mut quotas = Quotas::default();
    if let Some(n) = cli
        .ships_per_minute
        .or_else(|| cfg_limits.and_then(|l| l.ships_per_minute))
    {
        quotas.ships_per_window = n;
    }
    if let Some(n) = cli
        .registrations_per_hour
        .or_else(|| cfg_limits.and_then(|l| l.registrations_per_hour))
    {
        quotas.registrations_per_window = n;
    }
    if let Some(n) = cfg_limits.and_then(|l| l.acks_per_minute) {
        quotas.acks_per_window = n;
    }

    EffectiveSettings { host, port, quotas }
}
