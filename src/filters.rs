//! Predicates deciding whether a request is logged.
//!
//! A [`Filter`] returns `true` when the [`Exchange`] should be logged. Every
//! `ignore_*` helper is the exact negation of its `accept_*` counterpart.
//! Method matching ignores ASCII case, path and host matching is exact.
//!
//! ```rust
//! use actix_web_middleware_reqlog::{Config, filters};
//! use regex::Regex;
//!
//! let config = Config::default().filters([
//!     filters::ignore_path_prefix(["/assets/"]),
//!     filters::ignore_status([404]),
//!     filters::ignore_host_match([Regex::new(r"^internal\.").unwrap()]),
//! ]);
//! ```

use std::{fmt, ops::Not, sync::Arc};

use regex::Regex;

use crate::exchange::Exchange;

#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Exchange) -> bool + Send + Sync>);

impl Filter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Exchange) -> bool + Send + Sync + 'static,
    {
        Filter(Arc::new(predicate))
    }

    pub fn matches(&self, exchange: &Exchange) -> bool {
        (self.0)(exchange)
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        ignore(self)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

// Basic
pub fn accept(filter: Filter) -> Filter {
    filter
}

pub fn ignore(filter: Filter) -> Filter {
    Filter::new(move |exchange| !filter.matches(exchange))
}

// Method
pub fn accept_method<I>(methods: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let methods = to_strings(methods);
    Filter::new(move |exchange| {
        let method = exchange.method().as_str();
        methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    })
}

pub fn ignore_method<I>(methods: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_method(methods))
}

// Status
pub fn accept_status(statuses: impl IntoIterator<Item = u16>) -> Filter {
    let statuses: Vec<u16> = statuses.into_iter().collect();
    Filter::new(move |exchange| statuses.contains(&exchange.status().as_u16()))
}

pub fn ignore_status(statuses: impl IntoIterator<Item = u16>) -> Filter {
    ignore(accept_status(statuses))
}

pub fn accept_status_greater_than(status: u16) -> Filter {
    Filter::new(move |exchange| exchange.status().as_u16() > status)
}

pub fn accept_status_greater_than_or_equal(status: u16) -> Filter {
    Filter::new(move |exchange| exchange.status().as_u16() >= status)
}

pub fn accept_status_less_than(status: u16) -> Filter {
    Filter::new(move |exchange| exchange.status().as_u16() < status)
}

pub fn accept_status_less_than_or_equal(status: u16) -> Filter {
    Filter::new(move |exchange| exchange.status().as_u16() <= status)
}

pub fn ignore_status_greater_than(status: u16) -> Filter {
    accept_status_less_than_or_equal(status)
}

pub fn ignore_status_greater_than_or_equal(status: u16) -> Filter {
    accept_status_less_than(status)
}

pub fn ignore_status_less_than(status: u16) -> Filter {
    accept_status_greater_than_or_equal(status)
}

pub fn ignore_status_less_than_or_equal(status: u16) -> Filter {
    accept_status_greater_than(status)
}

// Path
pub fn accept_path<I>(paths: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(paths, Exchange::path, |value, path| value == path)
}

pub fn ignore_path<I>(paths: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_path(paths))
}

pub fn accept_path_contains<I>(parts: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(parts, Exchange::path, |value, part| value.contains(part))
}

pub fn ignore_path_contains<I>(parts: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_path_contains(parts))
}

pub fn accept_path_prefix<I>(prefixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(prefixes, Exchange::path, |value, prefix| {
        value.starts_with(prefix)
    })
}

pub fn ignore_path_prefix<I>(prefixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_path_prefix(prefixes))
}

pub fn accept_path_suffix<I>(suffixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(suffixes, Exchange::path, |value, suffix| {
        value.ends_with(suffix)
    })
}

pub fn ignore_path_suffix<I>(suffixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_path_suffix(suffixes))
}

pub fn accept_path_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    any_match(patterns, Exchange::path)
}

pub fn ignore_path_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    ignore(accept_path_match(patterns))
}

// Host
pub fn accept_host<I>(hosts: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(hosts, Exchange::host, |value, host| value == host)
}

pub fn ignore_host<I>(hosts: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_host(hosts))
}

pub fn accept_host_contains<I>(parts: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(parts, Exchange::host, |value, part| value.contains(part))
}

pub fn ignore_host_contains<I>(parts: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_host_contains(parts))
}

pub fn accept_host_prefix<I>(prefixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(prefixes, Exchange::host, |value, prefix| {
        value.starts_with(prefix)
    })
}

pub fn ignore_host_prefix<I>(prefixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_host_prefix(prefixes))
}

pub fn accept_host_suffix<I>(suffixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    any_part(suffixes, Exchange::host, |value, suffix| {
        value.ends_with(suffix)
    })
}

pub fn ignore_host_suffix<I>(suffixes: I) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    ignore(accept_host_suffix(suffixes))
}

pub fn accept_host_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    any_match(patterns, Exchange::host)
}

pub fn ignore_host_match(patterns: impl IntoIterator<Item = Regex>) -> Filter {
    ignore(accept_host_match(patterns))
}

fn to_strings<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_owned()).collect()
}

/// True when `op(field, part)` holds for any of `parts`.
fn any_part<I>(parts: I, field: fn(&Exchange) -> &str, op: fn(&str, &str) -> bool) -> Filter
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let parts = to_strings(parts);
    Filter::new(move |exchange| {
        let value = field(exchange);
        parts.iter().any(|part| op(value, part))
    })
}

fn any_match(patterns: impl IntoIterator<Item = Regex>, field: fn(&Exchange) -> &str) -> Filter {
    let patterns: Vec<Regex> = patterns.into_iter().collect();
    Filter::new(move |exchange| {
        let value = field(exchange);
        patterns.iter().any(|re| re.is_match(value))
    })
}
