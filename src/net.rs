//! Shared HTTP response handling for the upstream service clients

use crate::error::{AlmanacError, Result, UpstreamService};

/// Check the status and decode a JSON body, classifying failures against
/// the named service: 5xx and transport problems are "unavailable", other
/// non-success statuses and undecodable payloads are "rejected".
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    service: UpstreamService,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AlmanacError::from_transport(service, e))?;

    if !status.is_success() {
        let message = truncate(&text, 240);
        return Err(if status.is_server_error() {
            AlmanacError::unavailable(service, format!("HTTP {status}: {message}"))
        } else {
            AlmanacError::rejected(service, status.as_u16(), message)
        });
    }

    serde_json::from_str(&text).map_err(|e| {
        AlmanacError::rejected(
            service,
            status.as_u16(),
            format!("unparseable response payload: {e}"),
        )
    })
}

/// Clip an error body for logs without splitting a UTF-8 boundary.
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < limit)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &text[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let text = "aé".repeat(200);
        let clipped = truncate(&text, 10);
        assert!(clipped.ends_with('…'));
        assert!(clipped.len() <= 14);

        assert_eq!(truncate("short", 240), "short");
    }
}
