use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand, builder::BoolishValueParser};
use inquire::{Password, PasswordDisplayMode};
use tracing::{info, warn};
use weather_core::{AggregatedResult, Config, HttpFetcher, WeatherAggregator};

use crate::routes;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather aggregation service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the web page and the `POST /weather` endpoint.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,

        /// Start even without an API key; lookups then fail with a configuration error.
        #[arg(long, env = "WEATHER_TEST_MODE", value_parser = BoolishValueParser::new())]
        test_mode: bool,
    },

    /// Look up a city once and print the result.
    Show {
        /// City name, e.g. "London" or "Paris,FR".
        city: String,
    },

    /// Store the OpenWeather API key in the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve { bind, test_mode } => serve(bind, test_mode).await,
            Command::Show { city } => show(&city).await,
            Command::Configure => configure(),
        }
    }
}

fn load_config() -> Result<Config> {
    Config::load()?.with_env_overrides(|key| std::env::var(key).ok())
}

fn build_aggregator(config: &Config, test_mode: bool) -> Result<WeatherAggregator> {
    let api_key = config.require_api_key(test_mode)?;
    if api_key.is_none() {
        warn!("test mode without an API key: every lookup will report a configuration error");
    }

    let fetcher = HttpFetcher::new(config.timeout())?;
    Ok(WeatherAggregator::new(Arc::new(fetcher), api_key, config.endpoints()))
}

async fn serve(bind: SocketAddr, test_mode: bool) -> Result<()> {
    let config = load_config()?;
    let aggregator = Arc::new(build_aggregator(&config, test_mode)?);

    let (addr, server) = warp::serve(routes::routes(aggregator))
        .try_bind_with_graceful_shutdown(bind, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .with_context(|| format!("Failed to bind {bind}"))?;

    info!(%addr, upstream = config.base_url(), "weather server listening");
    server.await;
    info!("weather server stopped");

    Ok(())
}

async fn show(city: &str) -> Result<()> {
    let config = load_config()?;
    let aggregator = build_aggregator(&config, false)?;

    let result = aggregator.aggregate(city).await?;
    println!("As of {}", Local::now().format("%a, %b %d %H:%M"));
    print!("{}", render(&result));

    Ok(())
}

fn configure() -> Result<()> {
    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    let mut config = Config::load()?;
    config.set_api_key(api_key);
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

fn aqi_label(aqi: u8) -> &'static str {
    match aqi {
        1 => "Good",
        2 => "Fair",
        3 => "Moderate",
        4 => "Poor",
        5 => "Very Poor",
        _ => "Unknown",
    }
}

/// Human-readable rendering for `weather show`.
fn render(result: &AggregatedResult) -> String {
    let c = &result.current;
    let mut out = format!(
        "{}, {}\n  {}, {:.0}°C (feels like {:.0}°C)\n  Humidity {}%  Wind {} m/s  Pressure {} hPa\n  Air quality: {} ({})\n",
        c.name,
        c.country,
        c.description,
        c.temp,
        c.feels_like,
        c.humidity,
        c.wind_speed,
        c.pressure,
        aqi_label(c.aqi),
        c.aqi,
    );

    if !result.forecast.is_empty() {
        out.push_str("\nForecast\n");
        for day in &result.forecast {
            out.push_str(&format!(
                "  {:<12} {:>4.0}°C  {}  (humidity {}%)\n",
                day.date, day.temp, day.description, day.humidity
            ));
        }
    }

    out
}
