//! Weather lookup against an OpenWeather-style endpoint. Strictly
//! best-effort: any failure degrades to "no weather clause".

use async_trait::async_trait;
use serde::Deserialize;

use crate::{ports::WeatherProvider, Result};

const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Units {
    Metric,
    Imperial,
    Kelvin,
}

impl Units {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Some(Units::Metric),
            "imperial" => Some(Units::Imperial),
            "kelvin" => Some(Units::Kelvin),
            _ => None,
        }
    }

    fn api_value(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Kelvin => "standard",
        }
    }

    fn degree(self) -> char {
        match self {
            Units::Metric => 'C',
            Units::Imperial => 'F',
            Units::Kelvin => 'K',
        }
    }
}

#[derive(Debug, Deserialize)]
struct WeatherPayload {
    name: String,
    main: WeatherMain,
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

pub struct OpenWeather {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    city: String,
    units: Units,
}

impl OpenWeather {
    pub fn new(api_key: String, city: String, units: Units) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            city,
            units,
        }
    }

    async fn fetch(&self) -> Result<String> {
        let payload: WeatherPayload = self
            .client
            .get(&self.base_url)
            .query(&[
                ("appid", self.api_key.as_str()),
                ("units", self.units.api_value()),
                ("q", self.city.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(format_clause(&payload, self.units))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeather {
    async fn current_summary(&self) -> Option<String> {
        match self.fetch().await {
            Ok(clause) => Some(clause),
            Err(e) => {
                tracing::warn!(error = %e, "weather lookup failed");
                None
            }
        }
    }
}

fn format_clause(payload: &WeatherPayload, units: Units) -> String {
    let description = payload
        .weather
        .first()
        .map(|w| w.description.as_str())
        .unwrap_or("indescribable");
    format!(
        " The weather in {} is {}°{} and {}.",
        payload.name,
        payload.main.temp.round() as i64,
        units.degree(),
        description
    )
}
