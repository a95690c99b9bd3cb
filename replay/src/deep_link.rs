//! Shareable step links.
//!
//! A run view link may carry `?step=N`; opening it seeds `jump_to(N)` after
//! load. Values are only parsed here. Clamping happens in the machine, so
//! out-of-range steps are never rejected.

use std::num::IntErrorKind;

use url::Url;

/// Extract the step index from a full URL, a `?query`, or a bare query
/// string. Non-integer values yield `None`; integers beyond `i64` saturate.
pub fn parse_step_param(link: &str, param: &str) -> Option<i64> {
    let link = link.trim();
    let query = match Url::parse(link) {
        Ok(url) => url.query().map(ToString::to_string).unwrap_or_default(),
        Err(_) => link
            .split_once('?')
            .map(|(_, query)| query)
            .unwrap_or(link)
            .to_string(),
    };
    let query = query.split('#').next().unwrap_or_default();

    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == param)
        .and_then(|(_, value)| parse_step_value(&value))
}

/// Parse a step index, saturating integers too large for `i64` so the
/// machine can clamp them.
pub fn parse_step_value(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

/// Copy of `base` with the step parameter set to `index`, other parameters kept.
pub fn step_link(base: &Url, param: &str, index: usize) -> Url {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &retained {
            pairs.append_pair(key, value);
        }
        pairs.append_pair(param, &index.to_string());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_step_param_variants() {
        assert_eq!(
            parse_step_param("https://app.example.com/runs/run-7/replay?step=12", "step"),
            Some(12)
        );
        assert_eq!(parse_step_param("?tab=flow&step=3", "step"), Some(3));
        assert_eq!(parse_step_param("step=-4", "step"), Some(-4));
        assert_eq!(parse_step_param("/runs/run-7/replay?step=5#timeline", "step"), Some(5));
        assert_eq!(parse_step_param("?step=abc", "step"), None);
        assert_eq!(parse_step_param("?other=1", "step"), None);
        assert_eq!(parse_step_param("https://app.example.com/runs", "step"), None);
    }

    #[test]
    fn test_huge_step_values_saturate() {
        assert_eq!(
            parse_step_param("?step=99999999999999999999", "step"),
            Some(i64::MAX)
        );
        assert_eq!(
            parse_step_param("?step=-99999999999999999999", "step"),
            Some(i64::MIN)
        );
        assert_eq!(parse_step_value(" +7 "), Some(7));
        assert_eq!(parse_step_value("12abc"), None);
        assert_eq!(parse_step_value(""), None);
    }

    #[test]
    fn test_parse_step_param_custom_name() {
        assert_eq!(parse_step_param("?s=9&step=1", "s"), Some(9));
    }

    #[test]
    fn test_step_link_replaces_existing_param() {
        let base = Url::parse("https://app.example.com/runs/run-7/replay?tab=flow&step=2").unwrap();
        let link = step_link(&base, "step", 8);
        assert_eq!(link.as_str(), "https://app.example.com/runs/run-7/replay?tab=flow&step=8");
        assert_eq!(parse_step_param(link.as_str(), "step"), Some(8));
    }
}
