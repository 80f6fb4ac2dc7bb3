use crate::{
    access::gate_middleware,
    api::{absen, cleanup, database, rekap, verifikasi},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes. Wraps run outermost-last: the limiter fires first,
    // then authentication, then the role gate.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(gate_middleware))
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/absen")
                    // /absen
                    .service(web::resource("").route(web::post().to(absen::submit)))
                    // /absen/pegawai
                    .service(web::resource("/pegawai").route(web::get().to(absen::find_pegawai))),
            )
            .service(
                web::scope("/rekap-pegawai")
                    .service(web::resource("").route(web::get().to(rekap::pegawai))),
            )
            .service(
                web::scope("/rekap").service(web::resource("").route(web::get().to(rekap::list))),
            )
            .service(
                web::scope("/verifikasi")
                    // /verifikasi
                    .service(web::resource("").route(web::get().to(verifikasi::day)))
                    .service(web::resource("/dates").route(web::get().to(verifikasi::dates)))
                    .service(web::resource("/counts").route(web::get().to(verifikasi::counts)))
                    // /verifikasi/{id}/approve
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(verifikasi::approve)),
                    )
                    // /verifikasi/{id}/reject
                    .service(web::resource("/{id}/reject").route(web::put().to(verifikasi::reject))),
            )
            .service(
                web::scope("/database")
                    // /database
                    .service(
                        web::resource("")
                            .route(web::post().to(database::create))
                            .route(web::get().to(database::list)),
                    )
                    // /database/{id}/photo
                    .service(
                        web::resource("/{id}/photo")
                            .route(web::put().to(database::set_photo))
                            .route(web::delete().to(database::delete_photo)),
                    )
                    // /database/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(database::get))
                            .route(web::put().to(database::update))
                            .route(web::delete().to(database::delete)),
                    ),
            )
            .service(
                // Dashboard buttons call this with GET; POST works too.
                web::scope("/cleanup").service(
                    web::resource("")
                        .route(web::get().to(cleanup::control))
                        .route(web::post().to(cleanup::control)),
                ),
            )
            .service(
                web::scope("/storage")
                    .service(web::resource("/stats").route(web::get().to(cleanup::storage_stats))),
            ),
    );
}
