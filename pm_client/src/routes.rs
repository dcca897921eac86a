//! # Routes
//!
//! The view table and the authentication guard in front of it. Navigation is
//! modelled as data: [`Navigator`] publishes the current [`Location`] on a
//! watch channel and every move goes through [`guard`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Todo,
    Accounting,
    Diet,
    Energy,
    Calendar,
    Sleep,
    About,
    Login,
    Signup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Requires a signed-in user.
    Protected,
    /// Only makes sense signed out.
    GuestOnly,
    Public,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Home,
        Route::Todo,
        Route::Accounting,
        Route::Diet,
        Route::Energy,
        Route::Calendar,
        Route::Sleep,
        Route::About,
        Route::Login,
        Route::Signup,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Todo => "/todo",
            Route::Accounting => "/accounting",
            Route::Diet => "/diet",
            Route::Energy => "/energy",
            Route::Calendar => "/calendar",
            Route::Sleep => "/sleep",
            Route::About => "/about",
            Route::Login => "/login",
            Route::Signup => "/signup",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::Todo => "todo",
            Route::Accounting => "accounting",
            Route::Diet => "diet",
            Route::Energy => "energy",
            Route::Calendar => "calendar",
            Route::Sleep => "sleep",
            Route::About => "about",
            Route::Login => "login",
            Route::Signup => "signup",
        }
    }

    /// Matches a path, ignoring a trailing slash and any query string.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    pub fn access(self) -> Access {
        match self {
            Route::Login | Route::Signup => Access::GuestOnly,
            Route::About => Access::Public,
            _ => Access::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    /// Go to `to` instead. `then` is where to continue after signing in.
    Redirect { to: Route, then: Option<Route> },
}

/// The guard's decision table.
pub fn guard(target: Route, authenticated: bool) -> GuardDecision {
    match (target.access(), authenticated) {
        (Access::Protected, false) => GuardDecision::Redirect {
            to: Route::Login,
            then: Some(target),
        },
        (Access::GuestOnly, true) => GuardDecision::Redirect {
            to: Route::Home,
            then: None,
        },
        _ => GuardDecision::Proceed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub route: Route,
    /// Remembered protected route the user was sent away from.
    pub redirect: Option<Route>,
}

#[derive(Clone)]
pub struct Navigator {
    tx: Arc<watch::Sender<Location>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Home)
    }
}

impl Navigator {
    /// Starts at `initial` without running the guard; call [`Navigator::navigate`] to enter.
    pub fn new(initial: Route) -> Self {
        let (tx, _rx) = watch::channel(Location {
            route: initial,
            redirect: None,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Location {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.tx.subscribe()
    }

    /// Moves to `target` if the guard allows it, otherwise to the redirect.
    /// Returns where navigation ended.
    pub fn navigate(&self, target: Route, authenticated: bool) -> Route {
        let location = match guard(target, authenticated) {
            GuardDecision::Proceed => Location {
                route: target,
                redirect: None,
            },
            GuardDecision::Redirect { to, then } => {
                log::debug!("Guard redirected {} to {}", target, to);
                Location {
                    route: to,
                    redirect: then,
                }
            }
        };
        self.tx.send_replace(location);
        location.route
    }

    /// Session rejected: go to login unless already there. Returns whether it moved.
    pub fn redirect_to_login(&self) -> bool {
        self.tx.send_if_modified(|loc| {
            if loc.route == Route::Login {
                return false;
            }
            let remembered = (loc.route.access() == Access::Protected).then_some(loc.route);
            *loc = Location {
                route: Route::Login,
                redirect: remembered,
            };
            true
        })
    }

    /// After a successful sign-in: continue to the remembered route, or home.
    pub fn complete_login(&self) -> Route {
        let target = self.current().redirect.unwrap_or(Route::Home);
        self.navigate(target, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table() {
        for route in Route::ALL {
            let signed_out = guard(route, false);
            let signed_in = guard(route, true);
            match route.access() {
                Access::Protected => {
                    assert_eq!(
                        signed_out,
                        GuardDecision::Redirect { to: Route::Login, then: Some(route) }
                    );
                    assert_eq!(signed_in, GuardDecision::Proceed);
                }
                Access::GuestOnly => {
                    assert_eq!(signed_out, GuardDecision::Proceed);
                    assert_eq!(signed_in, GuardDecision::Redirect { to: Route::Home, then: None });
                }
                Access::Public => {
                    assert_eq!(signed_out, GuardDecision::Proceed);
                    assert_eq!(signed_in, GuardDecision::Proceed);
                }
            }
        }
        assert_eq!(Route::Calendar.access(), Access::Protected);
        assert_eq!(Route::About.access(), Access::Public);
    }

    #[test]
    fn parses_paths() {
        assert_eq!(Route::from_path("/"), Some(Route::Home));
        assert_eq!(Route::from_path(""), Some(Route::Home));
        assert_eq!(Route::from_path("/todo/"), Some(Route::Todo));
        assert_eq!(Route::from_path("/login?redirect=/todo"), Some(Route::Login));
        assert_eq!(Route::from_path("/nope"), None);
    }

    #[test]
    fn login_redirect_round_trip() {
        let nav = Navigator::default();
        assert_eq!(nav.navigate(Route::Accounting, false), Route::Login);
        assert_eq!(nav.current().redirect, Some(Route::Accounting));
        assert_eq!(nav.complete_login(), Route::Accounting);
        assert_eq!(nav.current().redirect, None);
        assert_eq!(nav.navigate(Route::Signup, true), Route::Home);
    }

    #[test]
    fn redirect_to_login_is_idempotent() {
        let nav = Navigator::new(Route::Todo);
        let mut rx = nav.subscribe();
        assert!(nav.redirect_to_login());
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();
        assert_eq!(nav.current(), Location { route: Route::Login, redirect: Some(Route::Todo) });

        assert!(!nav.redirect_to_login());
        assert!(!rx.has_changed().unwrap());
    }
}
