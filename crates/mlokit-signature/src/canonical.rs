//! Canonicalization of headers and resource for the string-to-sign

use std::collections::BTreeMap;

/// Prefix of vendor headers that take part in the signature
pub const VENDOR_HEADER_PREFIX: &str = "x-ms-";

/// Canonicalized headers: vendor headers only, names lowercased, values with
/// internal whitespace collapsed, sorted by name, each rendered `name:value\n`.
///
/// Non-vendor headers such as `Content-Type` are still sent on the wire but do
/// not appear here.
pub fn canonicalized_headers<I, K, V>(headers: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut items: Vec<(String, String)> = headers
        .into_iter()
        .filter_map(|(name, value)| {
            let name = name.as_ref().to_ascii_lowercase();
            name.starts_with(VENDOR_HEADER_PREFIX)
                .then(|| (name, collapse_whitespace(value.as_ref())))
        })
        .collect();
    // stable: repeated names keep their insertion order
    items.sort_by(|a, b| a.0.cmp(&b.0));

    items
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

/// Canonicalized resource: `/<account><url path>` followed by one
/// `\nname:v1,v2` line per query parameter, names sorted ascending and values
/// kept in order of appearance.
pub fn canonicalized_resource(url: &str, account: &str) -> String {
    let (path, params) = path_and_query(url);

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in params {
        grouped.entry(name).or_default().push(value);
    }

    let mut resource = format!("/{account}{path}");
    for (name, values) in grouped {
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&values.join(","));
    }
    resource
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Path as it goes on the wire plus decoded query pairs. URLs the `url` crate
/// rejects are split by hand so signing never fails.
fn path_and_query(url: &str) -> (String, Vec<(String, String)>) {
    if let Ok(parsed) = url::Url::parse(url) {
        let params = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        return (parsed.path().to_string(), params);
    }

    let (location, query) = match url.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (url, None),
    };
    let after_scheme = location
        .split_once("://")
        .map_or(location, |(_, rest)| rest);
    let path = after_scheme
        .find('/')
        .map_or("", |idx| &after_scheme[idx..])
        .to_string();
    let params = query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();
    (path, params)
}
