//! Route classification policy.
//!
//! An ordered rule list maps (HTTP method, path pattern) to a capability
//! kind. Rules are evaluated in declaration order and the first match wins,
//! so the template rule must precede the plain-GET rule: every template path
//! also satisfies the plain-GET method filter.

use regex::Regex;
use reqwest::Method;

/// What an HTTP operation becomes in the MCP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    /// Read-only, invocable with no required path arguments.
    Resource,
    /// Read-only, parameterized by path variables.
    ResourceTemplate,
    /// State-mutating operation.
    Tool,
}

/// One classification rule: a method set, an optional path regex, and the
/// resulting kind.
#[derive(Debug, Clone)]
pub struct RouteRule {
    methods: Vec<Method>,
    pattern: Option<Regex>,
    kind: CapabilityKind,
}

impl RouteRule {
    #[must_use]
    pub fn new(methods: Vec<Method>, pattern: Option<Regex>, kind: CapabilityKind) -> Self {
        Self {
            methods,
            pattern,
            kind,
        }
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        if !self.methods.contains(method) {
            return false;
        }
        match &self.pattern {
            Some(re) => re.is_match(path),
            None => true,
        }
    }
}

/// The Quortex routing policy:
///
/// 1. GET with a brace-delimited path segment → resource template
/// 2. GET otherwise → resource
/// 3. POST / PUT / DELETE / PATCH → tool
#[must_use]
pub fn quortex_route_rules() -> Vec<RouteRule> {
    let template = Regex::new(r"\{[^}]*\}").expect("static regex");
    vec![
        RouteRule::new(
            vec![Method::GET],
            Some(template),
            CapabilityKind::ResourceTemplate,
        ),
        RouteRule::new(vec![Method::GET], None, CapabilityKind::Resource),
        RouteRule::new(
            vec![Method::POST, Method::PUT, Method::DELETE, Method::PATCH],
            None,
            CapabilityKind::Tool,
        ),
    ]
}

/// Classify one operation. `None` means no rule matched; the caller decides
/// the fallback kind.
#[must_use]
pub fn classify(rules: &[RouteRule], method: &Method, path: &str) -> Option<CapabilityKind> {
    rules
        .iter()
        .find(|rule| rule.matches(method, path))
        .map(|rule| rule.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_get_is_a_resource() {
        let rules = quortex_route_rules();
        assert_eq!(
            classify(&rules, &Method::GET, "/users"),
            Some(CapabilityKind::Resource)
        );
    }

    #[test]
    fn templated_get_is_a_resource_template() {
        let rules = quortex_route_rules();
        assert_eq!(
            classify(&rules, &Method::GET, "/users/{id}"),
            Some(CapabilityKind::ResourceTemplate)
        );
        assert_eq!(
            classify(&rules, &Method::GET, "/orgs/{org}/users/{id}"),
            Some(CapabilityKind::ResourceTemplate)
        );
    }

    #[test]
    fn mutating_methods_are_tools_even_on_template_paths() {
        let rules = quortex_route_rules();
        assert_eq!(
            classify(&rules, &Method::POST, "/users"),
            Some(CapabilityKind::Tool)
        );
        assert_eq!(
            classify(&rules, &Method::PUT, "/users/{id}"),
            Some(CapabilityKind::Tool)
        );
        assert_eq!(
            classify(&rules, &Method::DELETE, "/users/{id}"),
            Some(CapabilityKind::Tool)
        );
        assert_eq!(
            classify(&rules, &Method::PATCH, "/users/{id}"),
            Some(CapabilityKind::Tool)
        );
    }

    #[test]
    fn unlisted_method_matches_no_rule() {
        let rules = quortex_route_rules();
        assert_eq!(classify(&rules, &Method::HEAD, "/users"), None);
    }

    #[test]
    fn rule_order_is_load_bearing() {
        // Reversing rules 1 and 2 misclassifies template paths.
        let template = Regex::new(r"\{[^}]*\}").unwrap();
        let reversed = vec![
            RouteRule::new(vec![Method::GET], None, CapabilityKind::Resource),
            RouteRule::new(
                vec![Method::GET],
                Some(template),
                CapabilityKind::ResourceTemplate,
            ),
        ];
        assert_eq!(
            classify(&reversed, &Method::GET, "/users/{id}"),
            Some(CapabilityKind::Resource)
        );
    }
}
