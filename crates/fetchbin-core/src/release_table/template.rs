//! Archive URL templates and URL sanity checks.

use crate::version::ReleaseVersion;

/// Substitute `{name}`, `{binary}`, `{version}` and `{target}` in `template`
/// and check the result is an absolute http(s) URL.
pub fn expand_url_template(
    template: &str,
    name: &str,
    binary: &str,
    version: &ReleaseVersion,
    target: &str,
) -> Result<String, String> {
    let url = template
        .replace("{name}", name)
        .replace("{binary}", binary)
        .replace("{version}", &version.to_string())
        .replace("{target}", target);
    if let Some(start) = url.find('{') {
        let rest = &url[start..];
        let end = rest.find('}').map(|i| i + 1).unwrap_or(rest.len());
        return Err(format!("unknown placeholder `{}` in url_template", &rest[..end]));
    }
    check_url(&url)?;
    Ok(url)
}

pub(super) fn check_url(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("invalid url `{}`: {}", url, e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported url scheme `{}` in `{}`", other, url)),
    }
    if parsed.path().trim_end_matches('/').is_empty() {
        return Err(format!("url `{}` has no file path", url));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ReleaseVersion {
        s.parse().unwrap()
    }

    #[test]
    fn expands_all_placeholders() {
        let url = expand_url_template(
            "https://example.com/{name}/{version}/{binary}-{target}.zip",
            "yo-bin",
            "yo",
            &v("1.0.0"),
            "x86_64-pc-windows-msvc",
        )
        .unwrap();
        assert_eq!(url, "https://example.com/yo-bin/1.0.0/yo-x86_64-pc-windows-msvc.zip");
    }

    #[test]
    fn unknown_placeholder_rejected() {
        let err = expand_url_template(
            "https://example.com/{owner}/{version}.tar.gz",
            "yo",
            "yo",
            &v("1.0.0"),
            "x",
        )
        .unwrap_err();
        assert!(err.contains("{owner}"));
    }

    #[test]
    fn scheme_and_path_checked() {
        assert!(check_url("ftp://example.com/yo.tar.gz").is_err());
        assert!(check_url("https://example.com/").is_err());
        assert!(check_url("not a url").is_err());
        assert!(check_url("http://127.0.0.1:8080/yo.tar.gz").is_ok());
    }
}
