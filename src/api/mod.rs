pub mod http_errors;
pub mod stream;

use std::io::Write;

use anyhow::{Result, anyhow};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::payload::ChatRequest;

use self::http_errors::chat_api_request_error;
use self::stream::{RenderStyle, StreamOutcome};

fn chat_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

// Requests run without a client timeout and are never retried; an
// interrupted stream still yields the text that arrived.
pub async fn send_turn(
    client: &Client,
    settings: &Settings,
    token: &str,
    request: &ChatRequest<'_>,
    style: RenderStyle,
    out: &mut (dyn Write + Send),
) -> Result<StreamOutcome> {
    let api_url = chat_url(&settings.base_url);
    debug!(
        api_url = %api_url,
        model = %settings.model,
        stream = request.stream,
        message_count = request.messages.len(),
        "sending chat completion request"
    );

    let response = client
        .post(&api_url)
        .bearer_auth(token)
        .json(request)
        .send()
        .await
        .map_err(|err| {
            warn!(
                api_url = %api_url,
                model = %settings.model,
                error = %err,
                "chat request failed"
            );
            chat_api_request_error(err, &api_url)
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let response_body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        warn!(
            api_url = %api_url,
            model = %settings.model,
            status = %status,
            response_body_len = response_body.len(),
            "chat API returned non-success status"
        );
        return Err(anyhow!("api error: {status}\n{response_body}"));
    }

    if request.stream {
        Ok(stream::consume(response, style, out).await)
    } else {
        let text = stream::decode_single(response, style, out).await?;
        Ok(StreamOutcome { text, error: None })
    }
}

#[cfg(test)]
mod tests {
    use super::chat_url;

    #[test]
    fn chat_url_trims_trailing_slash() {
        assert_eq!(
            chat_url("https://integrate.api.nvidia.com/v1/"),
            "https://integrate.api.nvidia.com/v1/chat/completions"
        );
        assert_eq!(
            chat_url("http://localhost:8080/v1"),
            "http://localhost:8080/v1/chat/completions"
        );
    }
}
