mod api;
mod classroom;
mod config;
mod error;

use std::sync::Arc;

use warp::Filter;

use classroom::{ClassroomGateway, LifecycleService, MemoryStore, Reporter};
use config::Config;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store = Arc::new(MemoryStore::new());
    let service = Arc::new(LifecycleService::new(
        store.clone(),
        config.rooms.active_by_default,
    ));
    let reporter = Arc::new(Reporter::new(store));
    let gateway = Arc::new(ClassroomGateway::new(service.clone()));

    let routes = api::routes::classroom_websocket_route(gateway)
        .or(api::routes::health_check())
        .or(api::routes::create_room_route(service))
        .or(api::routes::report_route(reporter));

    warp::serve(routes).run(config.bind_address()).await;
}
