//! Role-gated route access. The pure decision table is evaluated fresh on
//! every request by a middleware layered inside JWT authentication; no
//! decision is cached across requests.

use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web::Data,
};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

/// True when `path` is `prefix` itself or a child of it (`/rekap` does not
/// capture `/rekap-pegawai`).
fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

pub fn route_decision(role: Option<Role>, path: &str) -> RouteDecision {
    let Some(role) = role else {
        return RouteDecision::Redirect("/");
    };

    if under(path, "/database") {
        return match role {
            Role::SuperAdmin => RouteDecision::Allow,
            _ => RouteDecision::Redirect("/"),
        };
    }

    if under(path, "/rekap") || under(path, "/verifikasi") || under(path, "/rekap-pegawai") {
        return match role {
            Role::AdminVerif | Role::SuperAdmin => RouteDecision::Allow,
            Role::User => RouteDecision::Redirect("/"),
        };
    }

    if under(path, "/absen") {
        // The capture flow is for plain users; admins land on their own
        // consoles instead.
        return match role {
            Role::User => RouteDecision::Allow,
            Role::SuperAdmin => RouteDecision::Redirect("/database"),
            Role::AdminVerif => RouteDecision::Redirect("/rekap"),
        };
    }

    if under(path, "/cleanup") || under(path, "/storage") {
        return match role {
            Role::SuperAdmin => RouteDecision::Allow,
            _ => RouteDecision::Redirect("/"),
        };
    }

    RouteDecision::Allow
}

fn redirect(target: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, target))
        .finish()
}

/// Applies [`route_decision`] to every request entering the protected
/// scope. Expects the auth middleware to have stored an [`AuthUser`]
/// already; a request without one is redirected to the root.
pub async fn gate_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let role = req.extensions().get::<AuthUser>().map(|user| user.role);

    let prefix = req
        .app_data::<Data<Config>>()
        .map(|config| config.api_prefix.clone())
        .unwrap_or_default();
    let full_path = req.path().to_string();
    let path = full_path.strip_prefix(prefix.as_str()).unwrap_or(&full_path);

    match route_decision(role, path) {
        RouteDecision::Allow => next.call(req).await,
        RouteDecision::Redirect(target) => {
            Ok(req.into_response(redirect(target).map_into_boxed_body()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_session_redirects_to_root() {
        assert_eq!(route_decision(None, "/absen"), RouteDecision::Redirect("/"));
        assert_eq!(
            route_decision(None, "/database/pegawai"),
            RouteDecision::Redirect("/")
        );
    }

    #[test]
    fn database_is_superadmin_only() {
        assert_eq!(
            route_decision(Some(Role::SuperAdmin), "/database/anything"),
            RouteDecision::Allow
        );
        assert_eq!(
            route_decision(Some(Role::User), "/database/anything"),
            RouteDecision::Redirect("/")
        );
        assert_eq!(
            route_decision(Some(Role::AdminVerif), "/database"),
            RouteDecision::Redirect("/")
        );
    }

    #[test]
    fn verification_routes_need_an_admin_role() {
        for path in ["/rekap", "/verifikasi/2025-01-06", "/rekap-pegawai/123"] {
            assert_eq!(route_decision(Some(Role::AdminVerif), path), RouteDecision::Allow);
            assert_eq!(route_decision(Some(Role::SuperAdmin), path), RouteDecision::Allow);
            assert_eq!(
                route_decision(Some(Role::User), path),
                RouteDecision::Redirect("/")
            );
        }
    }

    #[test]
    fn admins_are_bounced_from_the_capture_flow() {
        assert_eq!(route_decision(Some(Role::User), "/absen/foto"), RouteDecision::Allow);
        assert_eq!(
            route_decision(Some(Role::SuperAdmin), "/absen/foto"),
            RouteDecision::Redirect("/database")
        );
        assert_eq!(
            route_decision(Some(Role::AdminVerif), "/absen"),
            RouteDecision::Redirect("/rekap")
        );
    }

    #[test]
    fn cleanup_controls_are_superadmin_only() {
        assert_eq!(route_decision(Some(Role::SuperAdmin), "/cleanup"), RouteDecision::Allow);
        assert_eq!(
            route_decision(Some(Role::SuperAdmin), "/storage/stats"),
            RouteDecision::Allow
        );
        assert_eq!(
            route_decision(Some(Role::AdminVerif), "/cleanup"),
            RouteDecision::Redirect("/")
        );
    }

    #[test]
    fn prefix_matching_does_not_bleed_across_siblings() {
        // "/rekap-pegawai" must not be treated as a child of "/rekap".
        assert!(under("/rekap/2025", "/rekap"));
        assert!(!under("/rekap-pegawai", "/rekap"));
        assert!(under("/rekap-pegawai", "/rekap-pegawai"));
        assert!(!under("/databases", "/database"));
    }
}
