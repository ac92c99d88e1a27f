//! Request routing.
//!
//! A [`Router`] is an ordered list of routes built once at startup. Exact
//! routes are tried first in registration order; then the longest matching
//! prefix route wins, with ties going to the earlier registration. Anything
//! unmatched goes to a built-in handler that answers 404.

mod path;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use path::{normalize_path, PathError};

use crate::error::HttpError;
use crate::http::request::{Method, Request};
use crate::http::response::Response;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Response, HttpError>> + Send + 'a>>;

/// Anything that turns a request into a response.
///
/// Handlers get the request and the route match only; they never see the
/// connection the request arrived on.
pub trait Handler: Send + Sync {
    fn call<'a>(&'a self, request: &'a Request, route: &'a RouteMatch) -> HandlerFuture<'a>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call<'a>(&'a self, request: &'a Request, route: &'a RouteMatch) -> HandlerFuture<'a> {
        (**self).call(request, route)
    }
}

/// Handler backed by a synchronous closure. Built with [`handler_fn`].
pub struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request, &RouteMatch) -> Result<Response, HttpError> + Send + Sync,
{
    fn call<'a>(&'a self, request: &'a Request, route: &'a RouteMatch) -> HandlerFuture<'a> {
        Box::pin(std::future::ready((self.0)(request, route)))
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request, &RouteMatch) -> Result<Response, HttpError> + Send + Sync,
{
    FnHandler(f)
}

/// What a route matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The normalized request path.
    pub path: String,
    /// The part of `path` below the matched prefix, always starting with
    /// `/`. Equal to `path` for exact routes.
    pub remainder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    Exact(String),
    /// Matches the prefix itself and anything below it on a segment boundary.
    Prefix(String),
}

pub struct Route {
    method: Option<Method>,
    matcher: PathMatch,
    handler: Arc<dyn Handler>,
}

impl Route {
    fn accepts(&self, method: Method) -> bool {
        // GET routes answer HEAD too; the writer drops the body.
        self.method
            .is_none_or(|m| m == method || (m == Method::GET && method == Method::HEAD))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

struct NotFound;

impl Handler for NotFound {
    fn call<'a>(&'a self, _request: &'a Request, route: &'a RouteMatch) -> HandlerFuture<'a> {
        Box::pin(std::future::ready(Err(HttpError::RouteNotFound(route.path.clone()))))
    }
}

pub struct Router {
    routes: Vec<Route>,
    not_found: Arc<dyn Handler>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes).finish_non_exhaustive()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            not_found: Arc::new(NotFound),
        }
    }

    /// Registers a route. `None` accepts every method.
    pub fn route(mut self, method: Option<Method>, matcher: PathMatch, handler: impl Handler + 'static) -> Self {
        let matcher = match matcher {
            PathMatch::Exact(path) => PathMatch::Exact(path),
            PathMatch::Prefix(prefix) => PathMatch::Prefix(trim_prefix(&prefix)),
        };
        self.routes.push(Route {
            method,
            matcher,
            handler: Arc::new(handler),
        });
        self
    }

    /// Exact-path route for one method.
    pub fn exact(self, method: Method, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(Some(method), PathMatch::Exact(path.into()), handler)
    }

    /// Exact-path GET route; also answers HEAD.
    pub fn get(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.exact(Method::GET, path, handler)
    }

    /// Prefix route accepting every method, e.g. a static file tree.
    pub fn mount(self, prefix: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(None, PathMatch::Prefix(prefix.into()), handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the handler for an already normalized path.
    pub fn resolve(&self, method: Method, path: &str) -> (&dyn Handler, RouteMatch) {
        let exact = self.routes.iter().find(|route| {
            route.accepts(method) && matches!(&route.matcher, PathMatch::Exact(p) if p == path)
        });
        if let Some(route) = exact {
            return (route.handler.as_ref(), RouteMatch::exact(path));
        }

        let mut best: Option<(&Route, usize, &str)> = None;
        for route in self.routes.iter().filter(|r| r.accepts(method)) {
            let PathMatch::Prefix(prefix) = &route.matcher else {
                continue;
            };
            let Some(remainder) = match_prefix(prefix, path) else {
                continue;
            };
            if best.is_none_or(|(_, len, _)| prefix.len() > len) {
                best = Some((route, prefix.len(), remainder));
            }
        }

        match best {
            Some((route, _, remainder)) => (
                route.handler.as_ref(),
                RouteMatch {
                    path: path.to_string(),
                    remainder: remainder.to_string(),
                },
            ),
            None => (self.not_found.as_ref(), RouteMatch::exact(path)),
        }
    }
}

impl RouteMatch {
    fn exact(path: &str) -> Self {
        Self {
            path: path.to_string(),
            remainder: path.to_string(),
        }
    }
}

fn trim_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn match_prefix<'p>(prefix: &str, path: &'p str) -> Option<&'p str> {
    if prefix == "/" {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
