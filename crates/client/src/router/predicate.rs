//! Compiled request predicates.

use regex::Regex;

use crate::message::Request;
use swrouter_core::{Destination, Error, PredicateSpec};

/// A [`PredicateSpec`] ready to be evaluated against requests.
#[derive(Debug, Clone)]
pub enum Predicate {
    HostPath { hosts: Vec<String>, path_contains: String, path_suffix: Option<String> },
    Host { hosts: Vec<String> },
    PathSuffix(String),
    PathRegex(Regex),
    Destination(Vec<Destination>),
    Any,
}

fn lowercase_all(hosts: &[String]) -> Vec<String> {
    hosts.iter().map(|h| h.to_ascii_lowercase()).collect()
}

fn host_matches(hosts: &[String], request: &Request) -> bool {
    request
        .url()
        .host_str()
        .is_some_and(|host| hosts.iter().any(|h| h.eq_ignore_ascii_case(host)))
}

impl Predicate {
    /// Compile a spec.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an invalid regex or an empty host list.
    pub fn compile(spec: &PredicateSpec) -> Result<Self, Error> {
        Ok(match spec {
            PredicateSpec::HostPath { hosts, path_contains, path_suffix } => {
                if hosts.is_empty() {
                    return Err(Error::InvalidInput("host_path predicate needs at least one host".into()));
                }
                Predicate::HostPath {
                    hosts: lowercase_all(hosts),
                    path_contains: path_contains.clone(),
                    path_suffix: path_suffix.clone(),
                }
            }
            PredicateSpec::Host { hosts } => {
                if hosts.is_empty() {
                    return Err(Error::InvalidInput("host predicate needs at least one host".into()));
                }
                Predicate::Host { hosts: lowercase_all(hosts) }
            }
            PredicateSpec::PathSuffix { suffix } => Predicate::PathSuffix(suffix.clone()),
            PredicateSpec::PathRegex { pattern } => Predicate::PathRegex(
                Regex::new(pattern).map_err(|e| Error::InvalidInput(format!("invalid path pattern: {e}")))?,
            ),
            PredicateSpec::Destination { destinations } => Predicate::Destination(destinations.clone()),
            PredicateSpec::Any => Predicate::Any,
        })
    }

    pub fn matches(&self, request: &Request) -> bool {
        let path = request.url().path();
        match self {
            Predicate::HostPath { hosts, path_contains, path_suffix } => {
                host_matches(hosts, request)
                    && path.contains(path_contains.as_str())
                    && path_suffix.as_deref().is_none_or(|suffix| path.ends_with(suffix))
            }
            Predicate::Host { hosts } => host_matches(hosts, request),
            Predicate::PathSuffix(suffix) => path.ends_with(suffix.as_str()),
            Predicate::PathRegex(re) => re.is_match(path),
            Predicate::Destination(destinations) => destinations.contains(&request.destination()),
            Predicate::Any => true,
        }
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self, Predicate::Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(s: &str) -> Request {
        Request::get(Url::parse(s).unwrap())
    }

    fn compile(spec: PredicateSpec) -> Predicate {
        Predicate::compile(&spec).unwrap()
    }

    #[test]
    fn test_host_path() {
        let p = compile(PredicateSpec::HostPath {
            hosts: vec!["cdn.jsdelivr.net".into()],
            path_contains: "/rates/history/".into(),
            path_suffix: Some(".json".into()),
        });
        assert!(p.matches(&get("https://cdn.jsdelivr.net/gh/a/b@main/public/rates/history/2025-01-01.json")));
        assert!(!p.matches(&get("https://cdn.jsdelivr.net/gh/a/b@main/public/rates/latest.json")));
        assert!(!p.matches(&get("https://cdn.jsdelivr.net/gh/a/b@main/public/rates/history/index.txt")));
        assert!(!p.matches(&get("https://evil.example/rates/history/2025-01-01.json")));
    }

    #[test]
    fn test_host_is_case_insensitive() {
        let p = compile(PredicateSpec::Host { hosts: vec!["API.frankfurter.app".into()] });
        assert!(p.matches(&get("https://api.frankfurter.app/latest?from=USD")));
        assert!(!p.matches(&get("https://frankfurter.app/latest")));
    }

    #[test]
    fn test_path_regex() {
        let p = compile(PredicateSpec::PathRegex { pattern: r"\.(webmanifest|txt|xml)$".into() });
        assert!(p.matches(&get("https://example.com/ratewise/sitemap.xml")));
        assert!(p.matches(&get("https://example.com/robots.txt")));
        assert!(!p.matches(&get("https://example.com/app.js")));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let result = Predicate::compile(&PredicateSpec::PathRegex { pattern: "(".into() });
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_empty_hosts_rejected() {
        assert!(Predicate::compile(&PredicateSpec::Host { hosts: vec![] }).is_err());
    }

    #[test]
    fn test_destination_and_suffix() {
        let fonts = compile(PredicateSpec::Destination { destinations: vec![Destination::Font] });
        let url = Url::parse("https://example.com/a.woff2").unwrap();
        assert!(fonts.matches(&Request::get(url.clone()).with_destination(Destination::Font)));
        assert!(!fonts.matches(&Request::get(url)));

        let probe = compile(PredicateSpec::PathSuffix { suffix: "/__network_probe__".into() });
        assert!(probe.matches(&get("https://example.com/ratewise/__network_probe__")));
        assert!(compile(PredicateSpec::Any).matches(&get("https://example.com/")));
    }
}
