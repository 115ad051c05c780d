//! Environment-driven configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Longest accepted session lifetime, one year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: u32,
    /// Lifetime of a login session.
    pub session_ttl_hours: i64,
    /// Adds `Secure` to the session cookie; enable behind HTTPS.
    pub secure_cookies: bool,
    /// Zone that decides what "today" is for measurement dates.
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup so it can be exercised without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .context("DATABASE_URL must be set to a Postgres instance")?;

        let host = match lookup("RENATURA_HOST") {
            Some(v) => v
                .parse()
                .with_context(|| format!("RENATURA_HOST is not an IP address: {v}"))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let port = parse_or("PORT", &lookup, 8080)?;
        let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", &lookup, 5)?;
        let session_ttl_hours: i64 = parse_or("SESSION_TTL_HOURS", &lookup, 12)?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            anyhow::bail!("SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}");
        }

        let timezone = match lookup("RENATURA_TIMEZONE") {
            Some(v) => v
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("RENATURA_TIMEZONE is not a known zone: {e}"))?,
            None => chrono_tz::Europe::Madrid,
        };

        let secure_cookies = lookup("RENATURA_SECURE_COOKIES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            host,
            port,
            max_connections,
            session_ttl_hours,
            secure_cookies,
            timezone,
        })
    }

    /// The current date in the configured zone.
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {v}")),
        None => Ok(default),
    }
}
