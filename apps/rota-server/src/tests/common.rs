//! Common test helpers for server tests.

use reqwest::Client;
use rota_store_memory::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::StoreBackend;
use crate::config::ServerConfig;
use crate::directory::FileDirectory;
use crate::dispatch::OutboxDispatcher;
use crate::server::{router, AppState, CALLER_HEADER};

pub const ANA: &str = "0190a4b2-0000-7000-8000-000000000001";
pub const BO: &str = "0190a4b2-0000-7000-8000-000000000002";
pub const CY: &str = "0190a4b2-0000-7000-8000-000000000003";
/// Known user with no connection to anyone.
pub const DEE: &str = "0190a4b2-0000-7000-8000-000000000004";
pub const HIKE: &str = "0190a4b2-0000-7000-8000-0000000000aa";

fn directory_json() -> String {
    json!({
        "users": [
            { "id": ANA, "name": "Ana", "email": "ana@example.com" },
            { "id": BO, "name": "Bo" },
            { "id": CY, "name": "Cy" },
            { "id": DEE, "name": "Dee" }
        ],
        "connections": [[ANA, BO], [ANA, CY]],
        "targets": [{ "id": HIKE, "title": "Sunday hike" }]
    })
    .to_string()
}

pub struct TestApp {
    pub base: String,
    pub client: Client,
    pub memory: Arc<MemoryStore>,
    pub dispatcher: OutboxDispatcher<StoreBackend>,
}

/// Test helper: serve the API over an in-memory store on 127.0.0.1:0
pub async fn spawn_app() -> TestApp {
    let memory = Arc::new(MemoryStore::new());
    let directory = Arc::new(FileDirectory::from_json(&directory_json()).unwrap());
    let (engine, dispatcher) = crate::build_services(
        StoreBackend::Memory(memory.clone()),
        directory,
        &ServerConfig::default(),
    )
    .unwrap();

    let app = router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: Client::new(),
        memory,
        dispatcher,
    }
}

impl TestApp {
    async fn finish(response: reqwest::Response) -> (u16, Value) {
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, caller: &str, path: &str) -> (u16, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .header(CALLER_HEADER, caller)
            .send()
            .await
            .unwrap();
        Self::finish(response).await
    }

    pub async fn post(&self, caller: &str, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .header(CALLER_HEADER, caller)
            .json(&body)
            .send()
            .await
            .unwrap();
        Self::finish(response).await
    }

    pub async fn patch(&self, caller: &str, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .patch(format!("{}{}", self.base, path))
            .header(CALLER_HEADER, caller)
            .json(&body)
            .send()
            .await
            .unwrap();
        Self::finish(response).await
    }

    /// Ana creates a round for the hike and returns its id.
    pub async fn create_round(&self, mode: &str, candidates: &[&str]) -> String {
        let (status, body) = self
            .post(
                ANA,
                "/rounds",
                json!({ "targetId": HIKE, "mode": mode, "candidateOrder": candidates }),
            )
            .await;
        assert_eq!(status, 201, "{body}");
        body["round"]["id"].as_str().unwrap().to_string()
    }

    pub async fn respond(&self, caller: &str, id: &str, action: &str) -> (u16, Value) {
        self.post(
            caller,
            &format!("/rounds/{}/respond", id),
            json!({ "action": action }),
        )
        .await
    }
}
