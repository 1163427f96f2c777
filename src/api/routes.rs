use std::convert::Infallible;
use std::sync::Arc;

use serde::Deserialize;
use warp::http::StatusCode;
use warp::Filter;

use crate::classroom::report::ReportOutcome;
use crate::classroom::{ClassroomGateway, LifecycleService, Reporter};

use super::websocket;

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    name: String,
}

/// Creates the realtime WebSocket route
pub fn classroom_websocket_route(
    gateway: Arc<ClassroomGateway>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("classroom")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_gateway(gateway))
        .map(|ws: warp::ws::Ws, gateway: Arc<ClassroomGateway>| {
            ws.on_upgrade(move |websocket| {
                websocket::handle_classroom_websocket(websocket, gateway)
            })
        })
}

pub fn health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("classroom")
        .and(warp::path("health"))
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Classroom Server",
                "version": "1.0.0"
            }))
        })
}

/// `POST /classroom/rooms` — create a class room
pub fn create_room_route(
    service: Arc<LifecycleService>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "rooms")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_service(service))
        .and_then(handle_create_room)
}

async fn handle_create_room(
    request: CreateRoomRequest,
    service: Arc<LifecycleService>,
) -> Result<impl warp::Reply, Infallible> {
    match service.create(request.name).await {
        Ok(created) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "data": { "roomId": created.room_id },
                "message": "Class room created"
            })),
            StatusCode::CREATED,
        )),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create class room");
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "message": "Internal server error"
                })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

/// `GET /classroom/rooms/:room_id/report` — audit report for a room
pub fn report_route(
    reporter: Arc<Reporter>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "rooms" / String / "report")
        .and(warp::get())
        .and(with_reporter(reporter))
        .and_then(handle_report)
}

async fn handle_report(
    room_id: String,
    reporter: Arc<Reporter>,
) -> Result<impl warp::Reply, Infallible> {
    match reporter.classroom_report(&room_id).await {
        Ok(ReportOutcome::Found(report)) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "data": { "classRoom": report }
            })),
            StatusCode::OK,
        )),
        Ok(ReportOutcome::NotFound) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "message": "Class room not found"
            })),
            StatusCode::NOT_FOUND,
        )),
        Err(e) => {
            tracing::error!(room_id = %room_id, error = %e, "Failed to build report");
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "message": "Internal server error"
                })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

fn with_gateway(
    gateway: Arc<ClassroomGateway>,
) -> impl Filter<Extract = (Arc<ClassroomGateway>,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

fn with_service(
    service: Arc<LifecycleService>,
) -> impl Filter<Extract = (Arc<LifecycleService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

fn with_reporter(
    reporter: Arc<Reporter>,
) -> impl Filter<Extract = (Arc<Reporter>,), Error = Infallible> + Clone {
    warp::any().map(move || reporter.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::MemoryStore;

    fn service() -> Arc<LifecycleService> {
        let store = Arc::new(MemoryStore::new());
        Arc::new(LifecycleService::new(store, true))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = warp::test::request()
            .method("GET")
            .path("/classroom/health")
            .reply(&health_check())
            .await;

        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_create_room_endpoint() {
        let service = service();
        let response = warp::test::request()
            .method("POST")
            .path("/classroom/rooms")
            .json(&serde_json::json!({ "name": "Algebra" }))
            .reply(&create_room_route(service))
            .await;

        assert_eq!(response.status(), 201);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["message"], "Class room created");
        assert_eq!(body["data"]["roomId"].as_str().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_report_endpoint_not_found() {
        let store = Arc::new(MemoryStore::new());
        let reporter = Arc::new(Reporter::new(store));

        let response = warp::test::request()
            .method("GET")
            .path("/classroom/rooms/999999/report")
            .reply(&report_route(reporter))
            .await;

        assert_eq!(response.status(), 404);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["message"], "Class room not found");
    }

    #[tokio::test]
    async fn test_report_endpoint_fresh_room() {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(LifecycleService::new(store.clone(), true));
        let reporter = Arc::new(Reporter::new(store));

        let created = service.create("Algebra".to_string()).await.unwrap();

        let response = warp::test::request()
            .method("GET")
            .path(&format!("/classroom/rooms/{}/report", created.room_id))
            .reply(&report_route(reporter))
            .await;

        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        let report = &body["data"]["classRoom"];
        assert_eq!(report["room_id"], created.room_id.as_str());
        assert_eq!(report["sessions"].as_array().unwrap().len(), 0);
        assert_eq!(report["event_log"].as_array().unwrap().len(), 0);
    }
}
