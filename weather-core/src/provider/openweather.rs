use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

use crate::model::{CurrentConditions, ForecastDay};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Maximum number of days kept from the forecast series.
pub const FORECAST_DAYS: usize = 5;

/// First local hour at which a sample may represent its day.
const AFTERNOON_HOUR: u32 = 12;

/// The three OpenWeather endpoints, resolved against one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub current: String,
    pub forecast: String,
    pub air_quality: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            current: format!("{base}/data/2.5/weather"),
            forecast: format!("{base}/data/2.5/forecast"),
            air_quality: format!("{base}/data/2.5/air_pollution"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Non-success status reported inside an OpenWeather payload (`cod`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFailure {
    pub code: Option<i64>,
    pub message: Option<String>,
}

/// Inspect the `cod` field, which OpenWeather sends either as a number or as a
/// numeric string. A payload without `cod` is treated as successful.
pub fn embedded_failure(payload: &Value) -> Option<EmbeddedFailure> {
    let cod = payload.get("cod")?;
    let code = match cod {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    if code == Some(200) {
        return None;
    }

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    Some(EmbeddedFailure { code, message })
}

#[derive(Debug, Deserialize)]
pub struct OwCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default, deserialize_with = "lenient")]
    country: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    #[serde(default, deserialize_with = "lenient")]
    temp: f64,
    #[serde(default, deserialize_with = "lenient")]
    feels_like: f64,
    #[serde(default, deserialize_with = "lenient")]
    humidity: u8,
    #[serde(default, deserialize_with = "lenient")]
    pressure: u32,
}

#[derive(Debug, Default, Deserialize)]
struct OwWeather {
    #[serde(default, deserialize_with = "lenient")]
    main: String,
    #[serde(default, deserialize_with = "lenient")]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default, deserialize_with = "lenient")]
    speed: f64,
}

/// `GET /data/2.5/weather` payload. `name` and `coord` are required; the
/// rest falls back to defaults when absent or ill-typed.
#[derive(Debug, Deserialize)]
pub struct OwCurrentResponse {
    pub name: String,
    pub coord: OwCoord,
    #[serde(default, deserialize_with = "lenient")]
    sys: OwSys,
    #[serde(default, deserialize_with = "lenient")]
    main: OwMain,
    #[serde(default, deserialize_with = "lenient")]
    weather: Vec<OwWeather>,
    #[serde(default, deserialize_with = "lenient")]
    wind: OwWind,
}

impl OwCurrentResponse {
    pub fn into_conditions(self, aqi: u8) -> CurrentConditions {
        let (main, description) = self
            .weather
            .into_iter()
            .next()
            .map(|w| (w.main, title_case(&w.description)))
            .unwrap_or_default();

        CurrentConditions {
            name: self.name,
            country: self.sys.country,
            temp: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            pressure: self.main.pressure,
            main,
            description,
            aqi,
        }
    }
}

/// Deserialize a field, replacing anything missing or ill-typed with its default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
pub struct OwSampleMain {
    #[serde(default, deserialize_with = "lenient")]
    pub temp: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
pub struct OwSampleWeather {
    #[serde(default, deserialize_with = "lenient")]
    pub main: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
}

/// One entry of the 3-hourly forecast list.
#[derive(Debug, Default, Deserialize)]
pub struct OwForecastSample {
    #[serde(default, deserialize_with = "lenient")]
    pub dt: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub main: OwSampleMain,
    #[serde(default, deserialize_with = "lenient")]
    pub weather: Vec<OwSampleWeather>,
}

impl OwForecastSample {
    fn local_time<Tz: TimeZone>(&self, tz: &Tz) -> Option<NaiveDateTime> {
        let utc = DateTime::from_timestamp(self.dt?, 0)?;
        Some(utc.with_timezone(tz).naive_local())
    }

    fn to_forecast_day(&self, local: NaiveDateTime) -> ForecastDay {
        let (main, description) = self
            .weather
            .first()
            .map(|w| (w.main.clone(), title_case(&w.description)))
            .unwrap_or_default();

        ForecastDay {
            date: local.format("%a, %b %d").to_string(),
            temp: self.main.temp,
            humidity: self.main.humidity,
            description,
            main,
        }
    }
}

/// Samples from the forecast payload's `list`. Entries that are not objects
/// come back as all-default samples and are later skipped for lacking `dt`.
pub fn forecast_samples(payload: &Value) -> Vec<OwForecastSample> {
    payload
        .get("list")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|sample| OwForecastSample::deserialize(sample).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

/// Collapse a time-ordered sample series into at most [`FORECAST_DAYS`]
/// entries, one per local calendar date.
///
/// For each date the first sample at or after noon (local time in `tz`) is
/// kept. A date that only has morning samples in the series is left out.
pub fn daily_forecast<Tz: TimeZone>(samples: &[OwForecastSample], tz: &Tz) -> Vec<ForecastDay> {
    let mut seen = HashSet::new();
    let mut days = Vec::with_capacity(FORECAST_DAYS);

    for sample in samples {
        let Some(local) = sample.local_time(tz) else {
            continue;
        };
        if local.hour() < AFTERNOON_HOUR || !seen.insert(local.date()) {
            continue;
        }

        days.push(sample.to_forecast_day(local));
        if days.len() >= FORECAST_DAYS {
            break;
        }
    }

    days
}

/// `list[0].main.aqi` of the air pollution payload, or 0.
pub fn air_quality_index(payload: &Value) -> u8 {
    payload
        .pointer("/list/0/main/aqi")
        .and_then(Value::as_u64)
        .and_then(|aqi| u8::try_from(aqi).ok())
        .unwrap_or(0)
}

/// Uppercase every letter that follows a non-letter, lowercase the others.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use serde_json::json;

    // 2023-11-14 00:00:00 UTC, a Tuesday.
    const MIDNIGHT: i64 = 1_699_920_000;
    const HOUR: i64 = 3600;

    fn sample(dt: i64, temp: f64) -> Value {
        json!({
            "dt": dt,
            "main": {"temp": temp, "humidity": 60},
            "weather": [{"main": "Clouds", "description": "broken clouds"}]
        })
    }

    fn three_hourly(days: i64) -> Value {
        let list: Vec<Value> = (0..days * 8)
            .map(|i| sample(MIDNIGHT + i * 3 * HOUR, i as f64))
            .collect();
        json!({ "cod": "200", "list": list })
    }

    #[test]
    fn endpoints_strip_trailing_slash() {
        let e = Endpoints::new("http://localhost:9000/");
        assert_eq!(e.current, "http://localhost:9000/data/2.5/weather");
        assert_eq!(e.forecast, "http://localhost:9000/data/2.5/forecast");
        assert_eq!(e.air_quality, "http://localhost:9000/data/2.5/air_pollution");
    }

    #[test]
    fn cod_as_number_or_string() {
        assert_eq!(embedded_failure(&json!({"cod": 200})), None);
        assert_eq!(embedded_failure(&json!({"cod": "200"})), None);
        assert_eq!(embedded_failure(&json!({"list": []})), None);

        let failure = embedded_failure(&json!({"cod": "404", "message": "city not found"})).unwrap();
        assert_eq!(failure.code, Some(404));
        assert_eq!(failure.message.as_deref(), Some("city not found"));

        let failure = embedded_failure(&json!({"cod": 401, "message": ""})).unwrap();
        assert_eq!(failure.code, Some(401));
        assert_eq!(failure.message, None);
    }

    #[test]
    fn picks_first_afternoon_sample_per_day() {
        let samples = forecast_samples(&three_hourly(3));
        let days = daily_forecast(&samples, &Utc);

        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date, "Tue, Nov 14");
        assert_eq!(days[1].date, "Wed, Nov 15");
        assert_eq!(days[2].date, "Thu, Nov 16");
        // Index 4 is 12:00 on the first day, 12 the second, 20 the third.
        assert_eq!(days[0].temp, 4.0);
        assert_eq!(days[1].temp, 12.0);
        assert_eq!(days[2].temp, 20.0);
        assert_eq!(days[0].description, "Broken Clouds");
        assert_eq!(days[0].main, "Clouds");
    }

    #[test]
    fn caps_at_five_days() {
        let samples = forecast_samples(&three_hourly(7));
        let days = daily_forecast(&samples, &Utc);
        assert_eq!(days.len(), FORECAST_DAYS);
        assert_eq!(days[4].date, "Sat, Nov 18");
    }

    #[test]
    fn morning_only_day_is_skipped() {
        let payload = json!({"list": [
            sample(MIDNIGHT + 9 * HOUR, 1.0),
            sample(MIDNIGHT + 24 * HOUR + 15 * HOUR, 2.0),
        ]});
        let days = daily_forecast(&forecast_samples(&payload), &Utc);

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, "Wed, Nov 15");
    }

    #[test]
    fn date_follows_given_timezone() {
        // 23:00 UTC on the 14th is 01:00 on the 15th at UTC+2, before noon.
        let payload = json!({"list": [sample(MIDNIGHT + 23 * HOUR, 1.0)]});
        let samples = forecast_samples(&payload);

        assert_eq!(daily_forecast(&samples, &Utc).len(), 1);

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert!(daily_forecast(&samples, &plus_two).is_empty());
    }

    #[test]
    fn malformed_sample_fields_degrade_to_defaults() {
        let payload = json!({"list": [
            {"dt": MIDNIGHT + 13 * HOUR, "main": {"temp": "hot"}, "weather": []},
            {"dt": MIDNIGHT + 37 * HOUR, "main": "nope", "weather": [{"description": 5}]},
            {"main": {"temp": 30.0}},
            "garbage",
        ]});
        let days = daily_forecast(&forecast_samples(&payload), &Utc);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].temp, 0.0);
        assert_eq!(days[0].humidity, 0);
        assert_eq!(days[0].description, "");
        assert_eq!(days[0].main, "");
        assert_eq!(days[1].temp, 0.0);
        assert_eq!(days[1].description, "");
    }

    #[test]
    fn missing_list_means_no_forecast() {
        assert!(forecast_samples(&json!({"cod": "200"})).is_empty());
        assert!(forecast_samples(&json!({"list": {}})).is_empty());
    }

    #[test]
    fn aqi_defaults_to_zero() {
        assert_eq!(air_quality_index(&json!({"list": [{"main": {"aqi": 3}}]})), 3);
        assert_eq!(air_quality_index(&json!({"list": []})), 0);
        assert_eq!(air_quality_index(&json!({"list": [{"main": {"aqi": "bad"}}]})), 0);
        assert_eq!(air_quality_index(&json!({"cod": 401, "message": "Invalid API key"})), 0);
    }

    #[test]
    fn current_payload_maps_to_conditions() {
        let payload = json!({
            "cod": 200,
            "name": "TestCity",
            "sys": {"country": "TC"},
            "main": {"temp": 25, "feels_like": 24, "humidity": 50, "pressure": 1013},
            "weather": [{"description": "clear sky", "main": "Clear"}],
            "wind": {"speed": 5},
            "coord": {"lat": 10, "lon": 20}
        });
        let parsed = OwCurrentResponse::deserialize(&payload).unwrap();
        assert_eq!(parsed.coord.lat, 10.0);
        assert_eq!(parsed.coord.lon, 20.0);

        let current = parsed.into_conditions(1);
        assert_eq!(current.name, "TestCity");
        assert_eq!(current.country, "TC");
        assert_eq!(current.temp, 25.0);
        assert_eq!(current.pressure, 1013);
        assert_eq!(current.description, "Clear Sky");
        assert_eq!(current.main, "Clear");
        assert_eq!(current.aqi, 1);
    }

    #[test]
    fn ill_typed_current_fields_degrade_to_defaults() {
        let payload = json!({
            "cod": 200,
            "name": "TestCity",
            "sys": {"country": 42},
            "main": {"temp": 25, "feels_like": "warm", "humidity": null, "pressure": 1013.5},
            "weather": "clear",
            "wind": {"speed": null},
            "coord": {"lat": 10, "lon": 20}
        });
        let current = OwCurrentResponse::deserialize(&payload).unwrap().into_conditions(0);

        assert_eq!(current.name, "TestCity");
        assert_eq!(current.temp, 25.0);
        assert_eq!(current.feels_like, 0.0);
        assert_eq!(current.humidity, 0);
        assert_eq!(current.pressure, 0);
        assert_eq!(current.wind_speed, 0.0);
        assert_eq!(current.country, "");
        assert_eq!(current.main, "");
        assert_eq!(current.description, "");
    }

    #[test]
    fn ill_typed_sections_degrade_to_defaults() {
        let payload = json!({
            "name": "TestCity",
            "sys": null,
            "main": [1, 2],
            "wind": "calm",
            "coord": {"lat": 1.5, "lon": -3}
        });
        let current = OwCurrentResponse::deserialize(&payload).unwrap().into_conditions(2);

        assert_eq!(current.temp, 0.0);
        assert_eq!(current.wind_speed, 0.0);
        assert_eq!(current.country, "");
        assert_eq!(current.aqi, 2);
    }

    #[test]
    fn current_payload_without_coordinates_is_rejected() {
        let payload = json!({"cod": 200, "name": "Nowhere"});
        assert!(OwCurrentResponse::deserialize(&payload).is_err());
    }

    #[test]
    fn title_case_matches_word_rule() {
        assert_eq!(title_case("clear sky"), "Clear Sky");
        assert_eq!(title_case("LIGHT rain"), "Light Rain");
        assert_eq!(title_case("thunderstorm with heavy-rain"), "Thunderstorm With Heavy-Rain");
        assert_eq!(title_case("it's"), "It'S");
        assert_eq!(title_case(""), "");
    }
}
