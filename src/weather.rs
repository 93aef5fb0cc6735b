//! Weather auxiliary context provider.
//!
//! Fetches the current forecast and renders it as a compact Japanese
//! markdown digest. Callers treat unavailability as absence of auxiliary
//! context, never as a request failure.

use crate::error::{Result, SvarError};
use tracing::{debug, instrument};

/// Hours of the day included in the forecast table.
const FORECAST_HOURS: [usize; 6] = [6, 9, 12, 15, 18, 21];

/// Weather forecast client.
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
}

impl WeatherClient {
    /// Create a new weather client.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch today's forecast for a location as a markdown digest.
    #[instrument(skip(self))]
    pub async fn forecast_digest(&self, lat: f64, lon: f64) -> Result<String> {
        let url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current=temperature_2m,relative_humidity_2m,wind_speed_10m,precipitation,weather_code&hourly=temperature_2m,weather_code,precipitation_probability,wind_speed_10m&timezone=auto&forecast_days=1",
            self.base_url, lat, lon
        );

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SvarError::Weather(format!(
                "forecast API returned status {}",
                response.status().as_u16()
            )));
        }

        let data: serde_json::Value = response.json().await?;
        let digest = render_digest(&data)
            .ok_or_else(|| SvarError::Weather("unexpected forecast payload".to_string()))?;

        debug!("Built forecast digest ({} chars)", digest.len());
        Ok(digest)
    }
}

fn render_digest(data: &serde_json::Value) -> Option<String> {
    let current = data.get("current")?;
    let cur_code = current.get("weather_code")?.as_u64().unwrap_or(0) as u32;
    let cur_temp = current.get("temperature_2m")?.as_f64()?;
    let humidity = current.get("relative_humidity_2m")?.as_f64()?;
    let wind = current.get("wind_speed_10m")?.as_f64()?;
    let precipitation = current.get("precipitation")?.as_f64()?;

    let hourly = data.get("hourly")?;
    let temps = hourly.get("temperature_2m")?.as_array()?;
    let codes = hourly.get("weather_code")?.as_array()?;
    let precip_probs = hourly.get("precipitation_probability")?.as_array()?;
    let winds = hourly.get("wind_speed_10m")?.as_array()?;

    let mut rows = Vec::with_capacity(FORECAST_HOURS.len());
    for &h in &FORECAST_HOURS {
        let temp = temps.get(h)?.as_f64()?;
        let code = codes.get(h)?.as_u64().unwrap_or(0) as u32;
        let precip = precip_probs.get(h)?.as_f64()?;
        let row_wind = winds.get(h)?.as_f64()?;
        rows.push(format!(
            "| {:02}時 | {} {} | {}°C | {} km/h | {}% |",
            h,
            code_emoji(code),
            code_description(code),
            temp,
            row_wind,
            precip
        ));
    }

    Some(format!(
        "**現在**: {} {} / {}°C\n湿度 {}%　風速 {} km/h　降水量 {} mm\n\n| 時間 | 天気 | 気温 | 風速 | 降水確率 |\n|:--:|:--:|:--:|:--:|:--:|\n{}",
        code_emoji(cur_code),
        code_description(cur_code),
        cur_temp,
        humidity,
        wind,
        precipitation,
        rows.join("\n")
    ))
}

/// WMO weather code to Japanese description.
fn code_description(code: u32) -> &'static str {
    match code {
        0 => "快晴",
        1 => "ほぼ晴れ",
        2 => "一部曇り",
        3 => "曇り",
        45 | 48 => "霧",
        51 => "霧雨(弱)",
        53 => "霧雨",
        55 => "霧雨(強)",
        61 => "小雨",
        63 => "雨",
        65 => "大雨",
        71 => "小雪",
        73 => "雪",
        75 => "大雪",
        80 => "にわか雨(弱)",
        81 => "にわか雨",
        82 => "にわか雨(強)",
        95 => "雷雨",
        96 | 99 => "激しい雷雨",
        _ => "不明",
    }
}

/// WMO weather code to emoji.
fn code_emoji(code: u32) -> &'static str {
    match code {
        0 => "☀️",
        1 => "🌤️",
        2 => "⛅",
        3 => "☁️",
        45 | 48 => "🌫️",
        51 | 53 | 55 | 80 | 81 | 82 => "🌦️",
        61 | 63 | 65 => "🌧️",
        71 | 73 | 75 => "❄️",
        95 | 96 | 99 => "⛈️",
        _ => "🌡️",
    }
}
