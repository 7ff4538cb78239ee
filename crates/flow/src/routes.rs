//! Route scheme shared by navigation and the checklist.
//!
//! Screens live under `/flow/<category>/<subcategory>/<screen>`, their
//! read-only mirror under `/data-view/...`. Collection context travels in the
//! query string as `?<collection path>=<item id>`.

use url::form_urlencoded;

use taxflow_core::ConcretePath;

pub const CHECKLIST_ROUTE: &str = "/checklist";
pub const DATA_VIEW_PREFIX: &str = "/data-view";
pub const REVIEW_MODE_PARAM: &str = "reviewMode";

/// Query string (without the leading `?`) carrying the collection context
/// and review mode. Empty when there is nothing to carry.
pub fn url_search_params(
    collection_context: Option<&ConcretePath>,
    collection_id: Option<&str>,
    review_mode: bool,
) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let (Some(collection), Some(id)) = (collection_context, collection_id) {
        serializer.append_pair(collection.as_str(), id);
    }
    if review_mode {
        serializer.append_pair(REVIEW_MODE_PARAM, "true");
    }
    serializer.finish()
}

pub fn with_query(route: &str, params: &str) -> String {
    if params.is_empty() {
        route.to_string()
    } else {
        format!("{route}?{params}")
    }
}

/// `/data-view` followed by a flow route.
pub fn data_view_route(route: &str) -> String {
    format!("{DATA_VIEW_PREFIX}{route}")
}

/// Data view of one item of a non-auto-iterating loop.
pub fn loop_data_view_route(loop_name: &str, collection_id: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(loop_name.as_bytes()).collect();
    format!("{DATA_VIEW_PREFIX}/loop/{encoded}/{collection_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_carry_context_and_review_mode() {
        let filers = ConcretePath::parse("/filers").unwrap();
        assert_eq!(url_search_params(Some(&filers), Some("abc"), false), "%2Ffilers=abc");
        assert_eq!(
            url_search_params(Some(&filers), Some("abc"), true),
            "%2Ffilers=abc&reviewMode=true"
        );
        assert_eq!(url_search_params(Some(&filers), None, false), "");
        assert_eq!(url_search_params(None, Some("abc"), true), "reviewMode=true");
    }

    #[test]
    fn data_view_routes() {
        assert_eq!(data_view_route("/flow/income/jobs"), "/data-view/flow/income/jobs");
        assert_eq!(
            loop_data_view_route("/formW2s", "w1"),
            "/data-view/loop/%2FformW2s/w1"
        );
        assert_eq!(with_query("/flow/a", ""), "/flow/a");
        assert_eq!(with_query("/flow/a", "x=1"), "/flow/a?x=1");
    }
}
