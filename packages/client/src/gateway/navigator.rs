//! Page navigation seam.
//!
//! The gateway reads the current route to classify requests and redirects to
//! a login route when a session cannot be recovered. Hosting applications plug
//! their router in here.

use std::sync::{Mutex, RwLock};

/// Current page route and redirects
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Route of the page currently shown
    fn current_route(&self) -> String;

    /// Send the user to `route`
    fn redirect(&self, route: &str);
}

/// Navigator that keeps the route in memory and records every redirect
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    route: RwLock<String>,
    redirects: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(initial_route: impl Into<String>) -> Self {
        Self {
            route: RwLock::new(initial_route.into()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    /// Change the current page (user navigation, not a forced redirect)
    pub fn navigate(&self, route: &str) {
        if let Ok(mut current) = self.route.write() {
            *current = route.to_string();
        }
    }

    /// Redirects issued so far, oldest first
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .map(|redirects| redirects.clone())
            .unwrap_or_default()
    }
}

impl Navigator for MemoryNavigator {
    fn current_route(&self) -> String {
        self.route
            .read()
            .map(|route| route.clone())
            .unwrap_or_default()
    }

    fn redirect(&self, route: &str) {
        tracing::info!("Redirecting to {}", route);
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(route.to_string());
        }
        self.navigate(route);
    }
}
