use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web::Data,
};

/// A request without a usable session is sent back to the root, where the
/// login flow lives.
fn to_login(req: ServiceRequest) -> Result<ServiceResponse<BoxBody>, Error> {
    let resp = HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .finish();
    Ok(req.into_response(resp.map_into_boxed_body()))
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header_value = match req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => return to_login(req),
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return to_login(req),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return to_login(req),
    };

    let role = match Role::from_id(claims.role) {
        Some(role) => role,
        None => return to_login(req),
    };

    let auth_user = AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        nip: claims.nip,
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
