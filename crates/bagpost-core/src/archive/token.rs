use regex::Regex;

lazy_static::lazy_static! {
    static ref TOKEN_STATEMENT: Regex =
        Regex::new(r#"csrfToken[^;]*"#).expect("Invalid token statement pattern");
    static ref QUOTED_VALUE: Regex =
        Regex::new(r#""([^"]*)""#).expect("Invalid quoted value pattern");
}

/// Pulls the CSRF token out of the archive's landing page.
///
/// The page sets it inside an inline script, e.g.
/// `var csrfToken = "3f1c...";`. The statement containing `csrfToken` is
/// located and the value between its first and last quote is returned.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let token = TOKEN_STATEMENT.find_iter(html).find_map(|m| {
        QUOTED_VALUE
            .captures(m.as_str())
            .and_then(|c| c.get(1))
            .map(|v| v.as_str().to_string())
    });
    token
}
