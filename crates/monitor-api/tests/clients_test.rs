//! Client tests against a local axum stand-in for the monitor services.

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use monitor_api::{Error, ImageManagerClient, InfraMonitorClient, VmMonitorClient};
use serde_json::json;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn lists_images_with_bearer_token() {
    let router = Router::new().route(
        "/v1/images",
        get(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if auth != "Bearer svc-token" {
                return Err(StatusCode::UNAUTHORIZED);
            }
            Ok(Json(json!([
                { "id": "img-1", "filename": "ubuntu-22.04.qcow2" },
                { "id": "img-2", "filename": "debian-12.qcow2", "name": "debian" }
            ])))
        }),
    );
    let base = spawn(router).await;

    let client = ImageManagerClient::new(format!("{base}/"), Some("svc-token".into()));
    let images = client.list_images().await.expect("list images");

    assert_eq!(images.len(), 2);
    assert_eq!(images[0].filename, "ubuntu-22.04.qcow2");
    assert_eq!(images[1].name.as_deref(), Some("debian"));

    let anonymous = ImageManagerClient::new(base, None);
    match anonymous.list_images().await {
        Err(Error::Api { status, .. }) => assert_eq!(status, StatusCode::UNAUTHORIZED),
        other => panic!("expected 401 api error, got {other:?}"),
    }
}

#[tokio::test]
async fn lists_hosts_and_clusters() {
    let router = Router::new()
        .route(
            "/v1/hosts",
            get(|| async { Json(json!([{ "hostName": "esx-01", "status": "OK" }])) }),
        )
        .route(
            "/v1/clusters",
            get(|| async { Json(json!([{ "clusterName": "prod", "status": "DEGRADED" }])) }),
        );
    let base = spawn(router).await;
    let client = InfraMonitorClient::new(base, None);

    let hosts = client.list_hosts().await.expect("hosts");
    assert_eq!(hosts[0].host_name, "esx-01");
    assert_eq!(hosts[0].status, "OK");

    let clusters = client.list_clusters().await.expect("clusters");
    assert_eq!(clusters[0].cluster_name, "prod");
    assert_eq!(clusters[0].status, "DEGRADED");
}

#[tokio::test]
async fn vm_metrics_accepts_legacy_field_name_and_keeps_extras() {
    let router = Router::new().route(
        "/v1/vms/{vm_id}/metrics",
        get(|Path(vm_id): Path<String>| async move {
            if vm_id != "vm-7" {
                return Err(StatusCode::NOT_FOUND);
            }
            Ok(Json(json!({ "vmId": "vm-7", "powerstate": "POWERED_ON", "cpuUsage": 12.5 })))
        }),
    );
    let base = spawn(router).await;
    let client = VmMonitorClient::new(base, None);

    let metrics = client.get_vm_metrics("vm-7").await.expect("metrics");
    assert_eq!(metrics.power_state, "POWERED_ON");
    assert_eq!(metrics.extra.get("cpuUsage"), Some(&json!(12.5)));

    let missing = client.get_vm_metrics("vm-404").await.unwrap_err();
    assert!(matches!(missing, Error::NotFound { .. }));
    assert!(!missing.is_timeout());
}

#[tokio::test]
async fn server_errors_carry_the_body() {
    let router = Router::new().route(
        "/v1/hosts",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let base = spawn(router).await;
    let client = InfraMonitorClient::new(base, None);

    match client.list_hosts().await {
        Err(Error::Api { status, body, .. }) => {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn vm_id_stays_one_path_segment() {
    let router = Router::new()
        .route(
            "/v1/vms/{vm_id}/metrics",
            get(|Path(vm_id): Path<String>| async move {
                Json(json!({ "vmId": vm_id, "powerState": "POWERED_ON" }))
            }),
        )
        .fallback(|| async { StatusCode::IM_A_TEAPOT });
    let base = spawn(router).await;
    let client = VmMonitorClient::new(base, Some("svc-token".into()));

    for vm_id in ["../../admin/wipe?x=", "a/b", "vm#frag", "50%"] {
        let metrics = client.get_vm_metrics(vm_id).await.expect("metrics");
        assert_eq!(metrics.vm_id.as_deref(), Some(vm_id));
    }

    for vm_id in ["", ".", ".."] {
        let err = client.get_vm_metrics(vm_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)), "{vm_id:?}: {err:?}");
    }
}
