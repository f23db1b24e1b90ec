//! Chart and position acquisition
//!
//! The client talks to the external astrological computation service with
//! client-credential bearer tokens. One token is shared across concurrent
//! requests behind an async RwLock and refreshed proactively shortly
//! before expiry; the refresh network call happens outside the lock, so a
//! duplicate refresh under contention is possible and harmless.
//!
//! Upstream trouble never escapes this layer. Every acquisition method
//! returns usable data, degrading to the deterministic synthetic
//! generator when the service is unconfigured, unreachable or rejects
//! the request.

pub mod synthetic;
pub(crate) mod translate;

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::EphemerisConfig;
use crate::error::{AlmanacError, Result, UpstreamService};
use crate::models::{CelestialBody, ChartData, ChartSource};
use crate::net::read_json;
use crate::timezone::ResolvedBirth;

/// Refresh the shared token when less than this much lifetime remains.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// One daily ecliptic sample for a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySample {
    pub date: NaiveDate,
    /// Longitude in [0, 360)
    pub longitude: f64,
    /// Degrees per day, negative while retrograde. None when the source
    /// supplied no velocity data.
    pub speed: Option<f64>,
}

/// Daily positions of one body across a scan window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSeries {
    pub body: CelestialBody,
    pub samples: Vec<DailySample>,
    pub synthetic: bool,
}

impl PositionSeries {
    /// True when every sample carries a velocity.
    pub fn has_velocity(&self) -> bool {
        !self.samples.is_empty() && self.samples.iter().all(|s| s.speed.is_some())
    }
}

struct AccessToken {
    bearer: String,
    expires_at: Instant,
}

impl AccessToken {
    fn needs_refresh(&self) -> bool {
        self.expires_at.saturating_duration_since(Instant::now()) < TOKEN_REFRESH_MARGIN
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct ChartRequest<'a> {
    instant: String,
    latitude: f64,
    longitude: f64,
    house_system: &'a str,
    zodiac: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    pub(crate) bodies: Vec<RawBody>,
    pub(crate) houses: Vec<RawCusp>,
    #[serde(default)]
    pub(crate) aspects: Vec<RawAspect>,
    pub(crate) ascendant: f64,
    pub(crate) midheaven: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBody {
    pub(crate) name: String,
    pub(crate) longitude: f64,
    #[serde(default)]
    pub(crate) speed: Option<f64>,
    #[serde(default)]
    pub(crate) house: Option<u8>,
    #[serde(default)]
    pub(crate) retrograde: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCusp {
    pub(crate) house: u8,
    pub(crate) longitude: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAspect {
    pub(crate) body_a: String,
    pub(crate) body_b: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    pub(crate) orb: f64,
}

#[derive(Debug, Serialize)]
struct PositionsRequest<'a> {
    start: NaiveDate,
    days: u32,
    bodies: Vec<&'static str>,
    zodiac: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PositionsResponse {
    pub(crate) series: Vec<RawSeries>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSeries {
    pub(crate) name: String,
    pub(crate) samples: Vec<RawSample>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSample {
    pub(crate) date: NaiveDate,
    pub(crate) longitude: f64,
    #[serde(default)]
    pub(crate) speed: Option<f64>,
}

/// Client for the astrological computation service
pub struct EphemerisClient {
    config: Option<EphemerisConfig>,
    http: Client,
    token: RwLock<Option<AccessToken>>,
}

impl EphemerisClient {
    /// Build a client. `None` config selects synthetic-only operation.
    pub fn new(config: Option<EphemerisConfig>) -> Result<Self> {
        let timeout = config
            .as_ref()
            .map(|c| c.request_timeout)
            .unwrap_or(Duration::from_secs(30));
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            AlmanacError::configuration(format!("failed to build HTTP client: {e}"))
        })?;

        match &config {
            Some(c) => info!(base_url = %c.base_url, "ephemeris service configured"),
            None => info!("no ephemeris service configured, running synthetic-only"),
        }

        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Natal chart for a resolved birth instant.
    ///
    /// Never fails: any upstream failure is logged and degrades to the
    /// date-seeded synthetic chart.
    pub async fn natal_chart(
        &self,
        birth_date: NaiveDate,
        resolved: &ResolvedBirth,
        latitude: f64,
        longitude: f64,
    ) -> ChartSource {
        let Some(config) = &self.config else {
            return ChartSource::Synthetic(synthetic::synthetic_chart(birth_date));
        };

        match self
            .fetch_chart(config, resolved, latitude, longitude)
            .await
        {
            Ok(data) => ChartSource::Real(data),
            Err(err) => {
                warn!(error = %err, "chart computation failed, degrading to synthetic chart");
                ChartSource::Synthetic(synthetic::synthetic_chart(birth_date))
            }
        }
    }

    /// Daily positions for the given bodies over `days` starting at
    /// `start`. Degrades to the synthetic series on any upstream failure.
    pub async fn daily_positions(
        &self,
        start: NaiveDate,
        days: u32,
        bodies: &[CelestialBody],
    ) -> Vec<PositionSeries> {
        let Some(config) = &self.config else {
            return synthetic::synthetic_positions(start, days, bodies);
        };

        match self.fetch_positions(config, start, days, bodies).await {
            Ok(series) if !series.is_empty() => series,
            Ok(_) => {
                warn!("position service returned no recognizable series, using synthetic");
                synthetic::synthetic_positions(start, days, bodies)
            }
            Err(err) => {
                warn!(error = %err, "position fetch failed, using synthetic series");
                synthetic::synthetic_positions(start, days, bodies)
            }
        }
    }

    async fn fetch_chart(
        &self,
        config: &EphemerisConfig,
        resolved: &ResolvedBirth,
        latitude: f64,
        longitude: f64,
    ) -> Result<ChartData> {
        let bearer = self.bearer_token(config).await?;
        let url = format!("{}/v1/chart", config.base_url.trim_end_matches('/'));
        let request = ChartRequest {
            instant: resolved.instant.to_rfc3339(),
            latitude,
            longitude,
            house_system: &config.house_system,
            zodiac: &config.zodiac,
        };

        debug!(url = %url, instant = %request.instant, "requesting natal chart");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&bearer)
            .json(&request)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(UpstreamService::Ephemeris, e))?;

        let raw: ChartResponse = read_json(UpstreamService::Ephemeris, response).await?;
        translate::chart_from_response(raw)
    }

    async fn fetch_positions(
        &self,
        config: &EphemerisConfig,
        start: NaiveDate,
        days: u32,
        bodies: &[CelestialBody],
    ) -> Result<Vec<PositionSeries>> {
        let bearer = self.bearer_token(config).await?;
        let url = format!("{}/v1/positions", config.base_url.trim_end_matches('/'));
        let request = PositionsRequest {
            start,
            days,
            bodies: bodies.iter().map(|b| b.name()).collect(),
            zodiac: &config.zodiac,
        };

        debug!(url = %url, start = %start, days, "requesting daily positions");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&bearer)
            .json(&request)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(UpstreamService::Ephemeris, e))?;

        let raw: PositionsResponse = read_json(UpstreamService::Ephemeris, response).await?;
        Ok(translate::series_from_response(raw))
    }

    /// Current bearer token, refreshing when close to expiry.
    async fn bearer_token(&self, config: &EphemerisConfig) -> Result<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !token.needs_refresh() {
                    return Ok(token.bearer.clone());
                }
            }
        }

        // Fetch outside the lock. Concurrent callers may refresh twice;
        // the service tolerates that and the last write wins.
        let fresh = self.fetch_token(config).await?;
        let bearer = fresh.bearer.clone();
        *self.token.write().await = Some(fresh);
        Ok(bearer)
    }

    async fn fetch_token(&self, config: &EphemerisConfig) -> Result<AccessToken> {
        let url = format!("{}/v1/auth/token", config.base_url.trim_end_matches('/'));
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &config.client_id,
            client_secret: &config.client_secret,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AlmanacError::from_transport(UpstreamService::Ephemeris, e))?;

        let parsed: TokenResponse = read_json(UpstreamService::Ephemeris, response).await?;
        debug!(expires_in = parsed.expires_in, "obtained ephemeris bearer token");
        Ok(AccessToken {
            bearer: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BirthProfile, BirthTime};
    use crate::timezone::resolve_birth_instant;

    fn birth_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(1974, 2, 10).unwrap()
    }

    #[test]
    fn token_refresh_triggers_inside_the_margin() {
        let fresh = AccessToken {
            bearer: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        assert!(!fresh.needs_refresh());

        let stale = AccessToken {
            bearer: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(stale.needs_refresh());
    }

    #[tokio::test]
    async fn unconfigured_client_degrades_to_synthetic_chart() {
        let client = EphemerisClient::new(None).unwrap();
        let profile = BirthProfile::new(
            birth_date(),
            BirthTime::Unknown,
            40.4168,
            -3.7038,
            "Europe/Madrid",
        )
        .unwrap();
        let resolved = resolve_birth_instant(&profile).unwrap();

        let chart = client
            .natal_chart(birth_date(), &resolved, profile.latitude, profile.longitude)
            .await;
        assert!(chart.is_synthetic());
        assert_eq!(chart.data().houses.len(), 12);
    }

    #[tokio::test]
    async fn unconfigured_client_produces_synthetic_series() {
        let client = EphemerisClient::new(None).unwrap();
        let series = client
            .daily_positions(
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                30,
                &[CelestialBody::Mercury],
            )
            .await;
        assert_eq!(series.len(), 1);
        assert!(series[0].synthetic);
        assert!(series[0].has_velocity());
    }

    #[tokio::test]
    #[ignore = "Requires EPHEMERIS_BASE_URL, EPHEMERIS_CLIENT_ID and EPHEMERIS_CLIENT_SECRET"]
    async fn fetches_a_real_chart_when_configured() {
        let config = crate::config::EphemerisConfig::from_env()
            .unwrap()
            .expect("ephemeris environment not configured");
        let client = EphemerisClient::new(Some(config)).unwrap();

        let profile = BirthProfile::new(
            birth_date(),
            BirthTime::Unknown,
            40.4168,
            -3.7038,
            "Europe/Madrid",
        )
        .unwrap();
        let resolved = resolve_birth_instant(&profile).unwrap();
        let chart = client
            .natal_chart(birth_date(), &resolved, profile.latitude, profile.longitude)
            .await;
        assert!(!chart.is_synthetic());
    }
}
