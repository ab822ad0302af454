const URL_REDACTION: &str = "<redacted>";

/// Strip userinfo and query values from `url` so it can be logged or put in an error.
pub fn sanitize_url(url: &str) -> String {
    let Some(scheme_idx) = url.find("://") else {
        return url.to_owned();
    };

    let (scheme, rest) = url.split_at(scheme_idx + 3);
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let authority = match authority.rfind('@') {
        Some(at_pos) => format!("{URL_REDACTION}@{}", &authority[at_pos + 1..]),
        None => authority.to_owned(),
    };

    let (before_fragment, fragment) = match tail.find('#') {
        Some(pos) => (&tail[..pos], Some(URL_REDACTION)),
        None => (tail, None),
    };
    let mut out = format!("{scheme}{authority}");
    match before_fragment.split_once('?') {
        Some((path, query)) => {
            out.push_str(path);
            out.push('?');
            out.push_str(&sanitize_query(query));
        }
        None => out.push_str(before_fragment),
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn sanitize_query(query: &str) -> String {
    query
        .split('&')
        .map(|part| {
            if part.is_empty() {
                return String::new();
            }
            let key = part.split_once('=').map_or(part, |(key, _)| key);
            format!("{key}={URL_REDACTION}")
        })
        .collect::<Vec<_>>()
        .join("&")
}
