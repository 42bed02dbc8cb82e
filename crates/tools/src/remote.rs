use {tracing::debug, url::Url};

use crate::error::SourceError;

/// GET `url` and return the body. Any non-2xx status is an error.
pub async fn fetch_remote(client: &reqwest::Client, url: &Url) -> Result<Vec<u8>, SourceError> {
    let http_err = |source| SourceError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url.clone()).send().await.map_err(http_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(http_err)?;
    debug!(url = %url, bytes = body.len(), "fetched remote manifest");
    Ok(body.to_vec())
}
