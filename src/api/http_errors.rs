use anyhow::anyhow;
use std::error::Error as StdError;
use std::io::ErrorKind;

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::ConnectionRefused
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("connection refused")
        {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::TimedOut
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("timed out")
        {
            return true;
        }

        current = source.source();
    }

    false
}

pub(crate) fn chat_api_request_error(err: reqwest::Error, api_url: &str) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return anyhow!(
            "Chat request timed out while calling '{}'. \
             Check network connectivity and endpoint responsiveness.",
            api_url
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return anyhow!(
                "Connection refused by the chat API at '{}'. \
                 Check NVCHAT_BASE_URL and that the endpoint is reachable.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to the chat API at '{}'. \
             Check NVCHAT_BASE_URL and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call the chat API at '{}': {}", api_url, err)
}

#[cfg(test)]
mod tests {
    use super::{chat_api_request_error, error_chain_has_timeout};
    use reqwest::Client;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn free_local_addr() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn maps_connection_refused_errors_to_actionable_message() {
        let addr = free_local_addr();
        let api_url = format!("http://{}/chat/completions", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(300))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .send()
            .await
            .expect_err("request should fail with connection-refused");
        let mapped = chat_api_request_error(req_err, &api_url);
        let msg = format!("{mapped:#}");

        assert!(
            msg.contains("Connection refused by the chat API"),
            "unexpected message: {msg}"
        );
        assert!(msg.contains("NVCHAT_BASE_URL"), "unexpected message: {msg}");
    }

    #[tokio::test]
    async fn maps_timeout_errors_to_actionable_message() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().expect("accept should succeed");
            thread::sleep(Duration::from_secs(1));
        });

        let api_url = format!("http://{}/chat/completions", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .send()
            .await
            .expect_err("request should fail with timeout");
        let mapped = chat_api_request_error(req_err, &api_url);
        let msg = format!("{mapped:#}");

        assert!(
            msg.contains("Chat request timed out"),
            "unexpected message: {msg}"
        );

        server.join().expect("server thread should join");
    }

    #[test]
    fn detects_timeout_from_error_kind() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(error_chain_has_timeout(&err));
    }
}
