use reqwest::Url;

/// Maps a URL to the key its requests are rate limited under: the last two
/// labels of the authority (`rpc.ankr.com` and `api.ankr.com` share
/// `ankr.com`). Inputs that cannot be parsed come back unchanged.
pub fn domain_key(url: &str) -> String {
    let Some(authority) = authority(url) else {
        return url.to_string();
    };

    let labels: Vec<&str> = authority.split('.').collect();
    if labels.len() > 2 {
        labels[labels.len() - 2..].join(".")
    } else {
        authority
    }
}

fn authority(url: &str) -> Option<String> {
    if url.contains("://") {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        return Some(match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        });
    }

    // Scheme-less input is treated as a bare authority.
    let authority = url.split(['/', '?', '#']).next()?;
    if authority.is_empty() || authority.contains(char::is_whitespace) {
        None
    } else {
        Some(authority.to_string())
    }
}
