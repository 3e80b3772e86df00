//! Route authorization policy.
//!
//! A static table of protected views and the roles permitted to enter each
//! one. The sidebar navigation is rendered from the same table.

use std::collections::HashSet;

use thiserror::Error;

use crate::claims::Role;

/// Public login view.
pub const LOGIN_VIEW: &str = "/login";

/// Default landing view for any valid session.
pub const LANDING_VIEW: &str = "/";

const ANY_ROLE: &[Role] = &[Role::Admin, Role::Superadmin];
const SUPERADMIN_ONLY: &[Role] = &[Role::Superadmin];

const DASHBOARD_VIEWS: &[ProtectedView] = &[
    ProtectedView::new("/", "Dashboard", ANY_ROLE),
    ProtectedView::new("/admins", "Admins", SUPERADMIN_ONLY),
    ProtectedView::new("/panels", "Panels", SUPERADMIN_ONLY),
    ProtectedView::new("/settings", "Settings", SUPERADMIN_ONLY),
];

/// Errors raised when building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("View {0} has no permitted roles")]
    EmptyRoleSet(String),

    #[error("View {0} is declared twice")]
    DuplicateView(String),
}

/// A view reachable only with a valid, authorized session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedView {
    /// Route path, e.g. `/admins`
    pub path: &'static str,
    /// Navigation label
    pub label: &'static str,
    /// Roles allowed to enter
    pub roles: &'static [Role],
}

impl ProtectedView {
    pub const fn new(path: &'static str, label: &'static str, roles: &'static [Role]) -> Self {
        Self { path, label, roles }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Registry of protected views.
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    views: Vec<ProtectedView>,
}

impl ViewRegistry {
    /// Build a registry; every view must permit at least one role.
    pub fn new(views: impl IntoIterator<Item = ProtectedView>) -> Result<Self, PolicyError> {
        let views: Vec<ProtectedView> = views.into_iter().collect();
        let mut seen = HashSet::new();

        for view in &views {
            if view.roles.is_empty() {
                return Err(PolicyError::EmptyRoleSet(view.path.to_string()));
            }
            if !seen.insert(normalize(view.path)) {
                return Err(PolicyError::DuplicateView(view.path.to_string()));
            }
        }

        Ok(Self { views })
    }

    /// The Trex dashboard views.
    pub fn dashboard() -> Self {
        Self {
            views: DASHBOARD_VIEWS.to_vec(),
        }
    }

    pub fn views(&self) -> &[ProtectedView] {
        &self.views
    }

    /// Find the view governing `path`.
    ///
    /// Nested paths fall under their parent view (`/admins/42` is governed by
    /// `/admins`); the landing view only matches itself.
    pub fn lookup(&self, path: &str) -> Option<&ProtectedView> {
        let path = normalize(path);

        self.views
            .iter()
            .find(|view| normalize(view.path) == path)
            .or_else(|| {
                self.views
                    .iter()
                    .filter(|view| view.path != LANDING_VIEW)
                    .filter(|view| {
                        path.strip_prefix(normalize(view.path))
                            .is_some_and(|rest| rest.starts_with('/'))
                    })
                    .max_by_key(|view| view.path.len())
            })
    }

    /// Declared role set for `path`, if the view is registered.
    pub fn permitted_roles(&self, path: &str) -> Option<&'static [Role]> {
        self.lookup(path).map(|view| view.roles)
    }

    /// Navigation entries visible to `role`, in declaration order.
    pub fn navigation_for(&self, role: Role) -> Vec<&ProtectedView> {
        self.views.iter().filter(|view| view.permits(role)).collect()
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::dashboard()
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        LANDING_VIEW
    } else {
        trimmed
    }
}
