use {tokio::io::AsyncReadExt, tracing::debug};

use crate::{error::SourceError, remote::fetch_remote, sources::Source};

/// Inserted between documents when several sources are combined.
pub const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// Read the raw content of a single source.
pub async fn read_source(client: &reqwest::Client, source: &Source) -> Result<Vec<u8>, SourceError> {
    let data = match source {
        Source::Stdin => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .map_err(SourceError::Stdin)?;
            buf
        },
        Source::File(path) => {
            tokio::fs::read(path)
                .await
                .map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?
        },
        Source::Url(url) => fetch_remote(client, url).await?,
    };
    debug!(source = %source, bytes = data.len(), "read source");
    Ok(data)
}

/// Concatenate documents, separated by [`DOCUMENT_SEPARATOR`] only between
/// them.
pub fn join_documents<D: AsRef<[u8]>>(docs: &[D]) -> Vec<u8> {
    let total = docs.iter().map(|d| d.as_ref().len()).sum::<usize>()
        + DOCUMENT_SEPARATOR.len() * docs.len().saturating_sub(1);
    let mut buf = Vec::with_capacity(total);
    for (i, doc) in docs.iter().enumerate() {
        if i > 0 {
            buf.extend_from_slice(DOCUMENT_SEPARATOR.as_bytes());
        }
        buf.extend_from_slice(doc.as_ref());
    }
    buf
}
