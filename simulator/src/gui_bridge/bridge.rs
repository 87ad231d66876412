use crate::gui_bridge::model::ResultsModel;
use anyhow::{Context, Result};
use presencecore::detection::FallResetHandle;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::{http::StatusCode, Filter};

/// HTTP face of a running session: latest results out, fall resets in.
#[derive(Clone)]
pub struct GuiBridge {
    state: Arc<RwLock<ResultsModel>>,
    fall_reset: Option<FallResetHandle>,
}

/// A bound server. Dropping the handle also starts a graceful shutdown.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            log::error!("[bridge] server task failed: {}", err);
        }
    }
}

impl GuiBridge {
    pub fn new(fall_reset: Option<FallResetHandle>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ResultsModel::default())),
            fall_reset,
        }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let state = self.state.clone();
        let results_route = warp::path("results")
            .and(warp::get())
            .map(move || {
                let model = state.read().unwrap_or_else(PoisonError::into_inner);
                warp::reply::json(&*model)
            });

        let fall_reset = self.fall_reset.clone();
        let reset_route = warp::path("reset-fall")
            .and(warp::post())
            .map(move || match &fall_reset {
                Some(handle) => {
                    handle.request();
                    log::info!("[bridge] fall reset requested");
                    warp::reply::with_status(
                        warp::reply::json(&json!({"status": "ok"})),
                        StatusCode::OK,
                    )
                }
                None => warp::reply::with_status(
                    warp::reply::json(&json!({"status": "fall detection disabled"})),
                    StatusCode::CONFLICT,
                ),
            });

        results_route.or(reset_route)
    }

    /// Binds `addr` (port 0 picks a free port) and serves on the current runtime.
    pub fn serve(&self, addr: SocketAddr) -> Result<ServerHandle> {
        let (shutdown, signal) = oneshot::channel::<()>();
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, async move {
                let _ = signal.await;
            })
            .with_context(|| format!("binding HTTP bridge on {}", addr))?;
        log::info!("[bridge] serving on http://{}", bound);
        let task = tokio::spawn(server);
        Ok(ServerHandle {
            addr: bound,
            shutdown,
            task,
        })
    }

    pub fn publish(&self, model: ResultsModel) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = model;
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> ResultsModel {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presencecore::sensor_interface::PeopleCountReport;

    #[tokio::test]
    async fn results_route_serves_the_published_model() {
        let bridge = GuiBridge::new(None);
        let mut model = ResultsModel::default();
        model.results.people = Some(PeopleCountReport {
            frame_index: 4,
            count: 2,
        });
        bridge.publish(model.clone());

        let response = warp::test::request()
            .method("GET")
            .path("/results")
            .reply(&bridge.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: ResultsModel = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, model);
        assert_eq!(bridge.snapshot(), model);
    }

    #[tokio::test]
    async fn reset_route_depends_on_a_running_fall_detector() {
        let handle = FallResetHandle::default();
        let bridge = GuiBridge::new(Some(handle));
        let response = warp::test::request()
            .method("POST")
            .path("/reset-fall")
            .reply(&bridge.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let disabled = GuiBridge::new(None);
        let response = warp::test::request()
            .method("POST")
            .path("/reset-fall")
            .reply(&disabled.routes())
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn serve_binds_an_ephemeral_port_and_shuts_down() {
        let bridge = GuiBridge::new(None);
        let server = bridge
            .serve(SocketAddr::from(([127, 0, 0, 1], 0)))
            .unwrap();
        assert_ne!(server.addr().port(), 0);
        server.shutdown().await;
    }
}
