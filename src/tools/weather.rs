//! OpenWeatherMap client for the `weather_current` and `weather_forecast`
//! tools.
//!
//! Like every tool, the output is plain text. A missing API key, a network
//! failure, or an unknown location all come back as readable messages so
//! the agent can relay them directly.

use std::time::Duration;

use serde::Deserialize;

use crate::config::WeatherConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct WeatherClient {
    client: reqwest::Client,
    config: WeatherConfig,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: String,
    sys: CountryInfo,
    main: MainMetrics,
    weather: Vec<Condition>,
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct CountryInfo {
    country: String,
}

#[derive(Debug, Deserialize)]
struct MainMetrics {
    temp: f64,
    #[serde(default)]
    feels_like: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    city: ForecastCity,
    list: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    dt_txt: String,
    main: MainMetrics,
    weather: Vec<Condition>,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Self {
        if config.api_key.is_empty() {
            tracing::warn!("OPENWEATHER_API_KEY not set; weather tools will apologize instead");
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        WeatherClient { client, config }
    }

    /// Current conditions for a city, metric units.
    pub async fn get_weather(&self, location: &str) -> String {
        if self.config.api_key.is_empty() {
            return fetch_apology(location);
        }

        let url = format!("{}/weather", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.config.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await;

        let data = match response {
            Ok(resp) if resp.status().is_success() => resp.json::<CurrentWeather>().await,
            Ok(resp) => {
                tracing::error!("Weather API returned {} for '{}'", resp.status(), location);
                return fetch_apology(location);
            }
            Err(err) => {
                tracing::error!("Weather API request failed: {}", err);
                return fetch_apology(location);
            }
        };

        match data {
            Ok(weather) => format_current(&weather),
            Err(err) => {
                tracing::error!("Could not parse weather response: {}", err);
                "Weather data received but couldn't parse it properly.".to_string()
            }
        }
    }

    /// Forecast for the next `days` days (clamped to 1..=5), one line per day
    /// taken from the first 3-hour slot.
    pub async fn get_forecast(&self, location: &str, days: usize) -> String {
        let days = days.clamp(1, 5);
        if self.config.api_key.is_empty() {
            return forecast_apology(location);
        }

        let url = format!("{}/forecast", self.config.base_url);
        // the API serves 8 slots per day at 3-hour intervals
        let count = (days * 8).min(40).to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.config.api_key.as_str()),
                ("units", "metric"),
                ("cnt", count.as_str()),
            ])
            .send()
            .await;

        let data = match response {
            Ok(resp) if resp.status().is_success() => resp.json::<ForecastResponse>().await,
            Ok(resp) => {
                tracing::error!("Forecast API returned {} for '{}'", resp.status(), location);
                return forecast_apology(location);
            }
            Err(err) => {
                tracing::error!("Forecast API request failed: {}", err);
                return forecast_apology(location);
            }
        };

        match data {
            Ok(forecast) => format_forecast(&forecast, days),
            Err(err) => {
                tracing::error!("Could not parse forecast response: {}", err);
                "Forecast data received but couldn't parse it properly.".to_string()
            }
        }
    }
}

/// Splits the forecast tool input `"location"` or `"location, days"` into
/// its parts, defaulting to a 3-day forecast.
pub fn parse_forecast_input(input: &str) -> (String, usize) {
    match input.split_once(',') {
        Some((location, days)) => {
            let days = days.trim().parse::<usize>().unwrap_or(3).clamp(1, 5);
            (location.trim().to_string(), days)
        }
        None => (input.trim().to_string(), 3),
    }
}

fn fetch_apology(location: &str) -> String {
    format!(
        "Sorry, I couldn't fetch weather data for {}. Please check the location name and try again.",
        location
    )
}

fn forecast_apology(location: &str) -> String {
    format!(
        "Sorry, I couldn't fetch forecast data for {}. Please check the location name and try again.",
        location
    )
}

fn format_current(weather: &CurrentWeather) -> String {
    let description = weather
        .weather
        .first()
        .map(|c| title_case(&c.description))
        .unwrap_or_else(|| "Unknown".to_string());

    format!(
        "Current Weather for {}, {}:\n\n\
         Temperature: {}°C (feels like {}°C)\n\
         Conditions: {}\n\
         Humidity: {}%\n\
         Pressure: {} hPa\n\
         Wind Speed: {} m/s",
        weather.name,
        weather.sys.country,
        weather.main.temp,
        weather.main.feels_like,
        description,
        weather.main.humidity,
        weather.main.pressure,
        weather.wind.speed
    )
}

fn format_forecast(forecast: &ForecastResponse, days: usize) -> String {
    let mut report = format!(
        "{}-Day Weather Forecast for {}, {}:\n",
        days, forecast.city.name, forecast.city.country
    );

    // one line per calendar day, using the first slot of each day
    let mut seen_dates: Vec<&str> = Vec::new();
    for slot in &forecast.list {
        let date = slot.dt_txt.split_whitespace().next().unwrap_or("");
        if date.is_empty() || seen_dates.contains(&date) {
            continue;
        }
        if seen_dates.len() >= days {
            break;
        }
        seen_dates.push(date);

        let description = slot
            .weather
            .first()
            .map(|c| title_case(&c.description))
            .unwrap_or_else(|| "Unknown".to_string());
        report.push_str(&format!("\n{}: {}°C - {}", date, slot.main.temp, description));
    }

    report
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_current() -> CurrentWeather {
        serde_json::from_value(serde_json::json!({
            "name": "London",
            "sys": { "country": "GB" },
            "main": { "temp": 15.5, "feels_like": 14.2, "humidity": 82, "pressure": 1012 },
            "weather": [ { "description": "light rain" } ],
            "wind": { "speed": 4.1 }
        }))
        .expect("fixture deserializes")
    }

    #[test]
    fn formats_current_conditions() {
        let report = format_current(&sample_current());
        assert!(report.starts_with("Current Weather for London, GB:"));
        assert!(report.contains("Temperature: 15.5°C (feels like 14.2°C)"));
        assert!(report.contains("Conditions: Light Rain"));
        assert!(report.contains("Humidity: 82%"));
        assert!(report.contains("Wind Speed: 4.1 m/s"));
    }

    #[test]
    fn forecast_takes_first_slot_of_each_day() {
        let forecast: ForecastResponse = serde_json::from_value(serde_json::json!({
            "city": { "name": "Tokyo", "country": "JP" },
            "list": [
                { "dt_txt": "2024-05-01 00:00:00", "main": { "temp": 18.0 },
                  "weather": [ { "description": "clear sky" } ] },
                { "dt_txt": "2024-05-01 03:00:00", "main": { "temp": 21.0 },
                  "weather": [ { "description": "few clouds" } ] },
                { "dt_txt": "2024-05-02 00:00:00", "main": { "temp": 16.5 },
                  "weather": [ { "description": "scattered clouds" } ] }
            ]
        }))
        .expect("fixture deserializes");

        let report = format_forecast(&forecast, 2);
        assert!(report.starts_with("2-Day Weather Forecast for Tokyo, JP:"));
        assert!(report.contains("2024-05-01: 18°C - Clear Sky"));
        assert!(report.contains("2024-05-02: 16.5°C - Scattered Clouds"));
        assert!(!report.contains("Few Clouds"));
    }

    #[test]
    fn forecast_input_parsing() {
        assert_eq!(parse_forecast_input("London"), ("London".to_string(), 3));
        assert_eq!(parse_forecast_input("London, 5"), ("London".to_string(), 5));
        assert_eq!(parse_forecast_input(" Paris , 9 "), ("Paris".to_string(), 5));
        assert_eq!(parse_forecast_input("Oslo, abc"), ("Oslo".to_string(), 3));
    }

    #[tokio::test]
    async fn missing_api_key_yields_apology() {
        let client = WeatherClient::new(WeatherConfig {
            api_key: String::new(),
            base_url: "http://127.0.0.1:1".to_string(),
        });
        let report = client.get_weather("London").await;
        assert!(report.starts_with("Sorry, I couldn't fetch weather data for London"));

        let forecast = client.get_forecast("London", 3).await;
        assert!(forecast.starts_with("Sorry, I couldn't fetch forecast data for London"));
    }
}
