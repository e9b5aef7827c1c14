use std::io::Write;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncBufRead, Lines};

use crate::api::client::ApiClient;
use crate::app::Settings;
use crate::error::Result;
use crate::utils::normalize_url;

async fn ask<R>(lines: &mut Lines<R>, label: &str, current: &str) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    if current.is_empty() {
        print!("{}: ", label);
    } else {
        print!("{} [{}]: ", label, current);
    }
    let _ = std::io::stdout().flush();
    let answer = lines.next_line().await?.unwrap_or_default();
    let answer = answer.trim();
    Ok(if answer.is_empty() { current.to_string() } else { answer.to_string() })
}

/// Ask for each setting, keeping the current value on an empty answer.
pub async fn prompt_settings<R>(lines: &mut Lines<R>, current: &Settings) -> Result<Settings>
where
    R: AsyncBufRead + Unpin,
{
    println!("Connect to MediHub");
    let api_url = normalize_url(&ask(lines, "API URL (e.g. https://api.medihub.example)", &current.api_url).await?);
    let socket_url = ask(lines, "Socket URL (blank for none)", &current.socket_url).await?;
    let user_id = ask(lines, "Your user id", &current.user_id).await?;
    let token = ask(lines, "Access token", current.token.as_deref().unwrap_or_default()).await?;
    Ok(Settings {
        api_url,
        socket_url: socket_url.trim_end_matches('/').to_string(),
        user_id,
        token: Some(token).filter(|t| !t.is_empty()),
    })
}

/// Advisory reachability check; the outcome only changes the status text.
pub async fn check_server(settings: &Settings) -> String {
    let mut client = ApiClient::new(&settings.api_url, settings.token.as_deref());
    match reqwest::Client::builder().timeout(Duration::from_secs(5)).build() {
        Ok(http) => client.http = http,
        Err(e) => warn!("Falling back to default HTTP client: {}", e),
    }
    match client.ping().await {
        Ok(status) if (200..300).contains(&status) => "Connected".to_string(),
        Ok(status) => format!("Saved (server answered HTTP {})", status),
        Err(e) => {
            warn!("Server check failed: {}", e);
            "Saved (server unreachable)".to_string()
        }
    }
}

pub async fn login<R>(lines: &mut Lines<R>, current: &Settings, config_path: Option<&Path>) -> Result<Settings>
where
    R: AsyncBufRead + Unpin,
{
    let settings = prompt_settings(lines, current).await?;
    let status = check_server(&settings).await;
    info!("Server check: {} - {}", settings.api_url, status);
    println!("{}", status);
    // Persist even when the server could not be reached
    if let Err(e) = settings.save(config_path) {
        println!("! Failed to save settings: {}", e);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn blank_answers_keep_current_values() {
        let current = Settings {
            api_url: "https://old.medihub.test".into(),
            socket_url: "ws://old:4000".into(),
            user_id: "u1".into(),
            token: Some("keep".into()),
        };
        let input: &[u8] = b"new.medihub.test/\n\nu2\n\n";
        let mut lines = BufReader::new(input).lines();
        let settings = prompt_settings(&mut lines, &current).await.unwrap();
        assert_eq!(settings.api_url, "https://new.medihub.test");
        assert_eq!(settings.socket_url, "ws://old:4000");
        assert_eq!(settings.user_id, "u2");
        assert_eq!(settings.token.as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn closed_input_falls_back_to_current() {
        let input: &[u8] = b"";
        let mut lines = BufReader::new(input).lines();
        let settings = prompt_settings(&mut lines, &Settings::new()).await.unwrap();
        assert_eq!(settings, Settings::new());
    }
}
