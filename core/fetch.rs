use std::fs;
use std::io::Read;
use std::time::Duration;

#[derive(Debug)]
pub enum FetchError {
    Http(String),
    Io(String),
}

/// Obtain one subscription body. `http(s)` sources go over the wire
/// with a bounded timeout; anything else is read as a local file
/// (with an optional `file://` prefix).
pub fn fetch_source(source: &str, timeout: Duration) -> Result<String, FetchError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_url(source, timeout)
    } else {
        let path = source.strip_prefix("file://").unwrap_or(source);
        fs::read_to_string(path).map_err(|e| FetchError::Io(format!("{}: {}", path, e)))
    }
}

fn fetch_url(url: &str, timeout: Duration) -> Result<String, FetchError> {
    let mut body = String::new();
    ureq::get(url)
        .timeout(timeout)
        .call()
        .map_err(|e| FetchError::Http(e.to_string()))?
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|e| FetchError::Io(e.to_string()))?;
    Ok(body)
}
