use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Router};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};

use provisioner_core::{
    config::{LighthouseConfig, SecretString, TencentCloudConfig},
    ProvisionOs, ProvisionProvider, ProvisionerError,
};
use provisioner_infrastructure::{LighthouseProvider, TencentCloudClient};
use provisioner_testing_utils::ProvisionJobBuilder;

/// 一次被记录的云API请求
#[derive(Debug, Clone)]
struct RecordedCall {
    action: String,
    region: String,
    version: String,
    host: String,
    authorization: String,
    body: Value,
}

#[derive(Default)]
struct FakeCloudState {
    responses: Mutex<HashMap<String, (u16, Value)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// 本地模拟的腾讯云API，按 `X-TC-Action` 返回预设响应
struct FakeCloud {
    base_url: String,
    state: Arc<FakeCloudState>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeCloud {
    async fn spawn() -> Self {
        let state = Arc::new(FakeCloudState::default());
        let app = Router::new()
            .route("/", post(handle_call))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    fn respond(&self, action: &str, status: u16, body: Value) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(action.to_string(), (status, body));
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    fn provider(&self) -> LighthouseProvider {
        let client = TencentCloudClient::new(&tencent_config())
            .unwrap()
            .with_base_url(&self.base_url);
        LighthouseProvider::new(client, lighthouse_config())
    }
}

impl Drop for FakeCloud {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_call(
    State(state): State<Arc<FakeCloudState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let action = header("x-tc-action");

    state.calls.lock().unwrap().push(RecordedCall {
        action: action.clone(),
        region: header("x-tc-region"),
        version: header("x-tc-version"),
        host: header("host"),
        authorization: header("authorization"),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });

    let (status, response) = state
        .responses
        .lock()
        .unwrap()
        .get(&action)
        .cloned()
        .unwrap_or((200, json!({ "Response": { "RequestId": "req-default" } })));

    (
        StatusCode::from_u16(status).unwrap(),
        response.to_string(),
    )
}

fn tencent_config() -> TencentCloudConfig {
    TencentCloudConfig {
        secret_id: "AKIDtestsecretid0123".to_string(),
        secret_key: SecretString::new("testsecretkey0123456789"),
        region: "ap-singapore".to_string(),
        request_timeout_secs: 5,
    }
}

fn lighthouse_config() -> LighthouseConfig {
    LighthouseConfig {
        bundle_id: "bundle_test".to_string(),
        blueprint_id_ubuntu: "lhbp_ubuntu".to_string(),
        blueprint_id_debian: "lhbp_debian".to_string(),
        blueprint_id_kali: "lhbp_kali".to_string(),
        zone: "ap-singapore-1".to_string(),
        instance_type: "SML_2CORE_2G".to_string(),
    }
}

const JOB_ID: &str = "3f2a9c1e-7b4d-4e8a-9c21-5d6e7f8a9b0c";

fn created_response() -> Value {
    json!({ "Response": { "InstanceIdSet": ["lhins-abc123"], "RequestId": "req-create-1" } })
}

#[tokio::test]
async fn test_create_instance_returns_instance_ip_and_request_id() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond("CreateInstances", 200, created_response());
    cloud.respond(
        "DescribeInstances",
        200,
        json!({ "Response": { "InstanceSet": [
            { "InstanceId": "lhins-other", "PublicAddresses": ["198.51.100.1"] },
            { "InstanceId": "lhins-abc123", "PublicAddresses": ["203.0.113.7", "203.0.113.8"] }
        ], "RequestId": "req-describe-1" } }),
    );

    let job = ProvisionJobBuilder::new()
        .with_id(JOB_ID)
        .with_os(ProvisionOs::Debian)
        .build();
    let result = cloud.provider().create_instance(&job).await.unwrap();

    assert_eq!(result.instance_id, "lhins-abc123");
    assert_eq!(result.public_ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(result.metadata.get("requestId"), Some(&json!("req-create-1")));

    let calls = cloud.calls();
    assert_eq!(calls.len(), 2);

    let create = &calls[0];
    assert_eq!(create.action, "CreateInstances");
    assert_eq!(create.version, "2020-03-24");
    assert_eq!(create.host, "lighthouse.tencentcloudapi.com");
    assert!(create.authorization.starts_with(
        "TC3-HMAC-SHA256 Credential=AKIDtestsecretid0123/"
    ));
    assert!(create.authorization.contains("/lighthouse/tc3_request, "));
    assert!(create
        .authorization
        .contains("SignedHeaders=content-type;host;x-tc-action, Signature="));
    assert_eq!(
        create.body,
        json!({
            "BundleId": "bundle_test",
            "BlueprintId": "lhbp_debian",
            "InstanceChargeType": "POSTPAID_BY_HOUR",
            "InstanceCount": 1,
            "Zone": "ap-singapore-1",
            "InstanceName": "web3ho-3f2a9c1e",
        })
    );

    assert_eq!(calls[1].action, "DescribeInstances");
    assert_eq!(calls[1].body, json!({ "InstanceIds": ["lhins-abc123"] }));
}

#[tokio::test]
async fn test_create_instance_without_public_ip_is_not_an_error() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond("CreateInstances", 200, created_response());
    cloud.respond(
        "DescribeInstances",
        200,
        json!({ "Response": { "InstanceSet": [
            { "InstanceId": "lhins-abc123", "PublicAddresses": [] }
        ], "RequestId": "req-describe-2" } }),
    );

    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    let result = cloud.provider().create_instance(&job).await.unwrap();

    assert_eq!(result.instance_id, "lhins-abc123");
    assert_eq!(result.public_ip, None);
}

#[tokio::test]
async fn test_create_instance_tolerates_failed_ip_lookup() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond("CreateInstances", 200, created_response());
    cloud.respond(
        "DescribeInstances",
        500,
        json!({ "Response": { "Error": { "Code": "InternalError" } } }),
    );

    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    let result = cloud.provider().create_instance(&job).await.unwrap();

    assert_eq!(result.instance_id, "lhins-abc123");
    assert_eq!(result.public_ip, None);
}

#[tokio::test]
async fn test_create_instance_without_instance_id_fails() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond(
        "CreateInstances",
        200,
        json!({ "Response": { "InstanceIdSet": [], "RequestId": "req-empty" } }),
    );

    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    let err = cloud.provider().create_instance(&job).await.unwrap_err();

    assert!(matches!(err, ProvisionerError::ProviderResponse(_)));
    assert!(err.to_string().contains("no instance ID"));
    // 创建失败时不会继续查询
    assert_eq!(cloud.calls().len(), 1);
}

#[tokio::test]
async fn test_embedded_error_on_http_200_fails_with_body() {
    let cloud = FakeCloud::spawn().await;
    let error_body = json!({ "Response": {
        "Error": { "Code": "ResourceInsufficient", "Message": "sold out" },
        "RequestId": "req-err"
    } });
    cloud.respond("CreateInstances", 200, error_body.clone());

    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    let err = cloud.provider().create_instance(&job).await.unwrap_err();

    match &err {
        ProvisionerError::ProviderApi { action, status, body } => {
            assert_eq!(action, "CreateInstances");
            assert_eq!(*status, 200);
            assert_eq!(serde_json::from_str::<Value>(body).unwrap(), error_body);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err
        .to_string()
        .starts_with("Tencent API CreateInstances failed: 200 "));
}

#[tokio::test]
async fn test_non_success_status_fails() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond("CreateInstances", 403, json!({ "message": "forbidden" }));

    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    let err = cloud.provider().create_instance(&job).await.unwrap_err();

    assert!(matches!(
        err,
        ProvisionerError::ProviderApi { status: 403, .. }
    ));
    assert!(err.to_string().contains("forbidden"));
}

#[tokio::test]
async fn test_region_header_uses_job_region_or_default() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond("CreateInstances", 200, created_response());
    let provider = cloud.provider();

    let regional = ProvisionJobBuilder::new()
        .with_id(JOB_ID)
        .with_region("ap-tokyo")
        .build();
    provider.create_instance(&regional).await.unwrap();

    let unspecified = ProvisionJobBuilder::new()
        .with_id(JOB_ID)
        .with_region("")
        .build();
    provider.create_instance(&unspecified).await.unwrap();

    let regions: Vec<String> = cloud
        .calls()
        .into_iter()
        .filter(|c| c.action == "CreateInstances")
        .map(|c| c.region)
        .collect();
    assert_eq!(regions, vec!["ap-tokyo", "ap-singapore"]);
}

#[tokio::test]
async fn test_bootstrap_registers_and_invokes_command() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond(
        "CreateCommand",
        200,
        json!({ "Response": { "CommandId": "cmd-xyz", "RequestId": "req-cmd" } }),
    );
    cloud.respond(
        "InvokeCommand",
        200,
        json!({ "Response": { "InvocationId": "inv-1", "RequestId": "req-inv" } }),
    );

    let script = "#!/usr/bin/env bash\necho 'hello'\n";
    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    cloud
        .provider()
        .bootstrap_instance(&job, "lhins-abc123", script)
        .await
        .unwrap();

    let calls = cloud.calls();
    assert_eq!(calls.len(), 2);

    let create = &calls[0];
    assert_eq!(create.action, "CreateCommand");
    assert_eq!(create.version, "2020-10-28");
    assert_eq!(create.host, "tat.tencentcloudapi.com");
    assert!(create.authorization.contains("/tat/tc3_request, "));
    assert_eq!(create.body["CommandName"], "web3ho-bootstrap-3f2a9c1e");
    assert_eq!(create.body["CommandType"], "SHELL");
    assert_eq!(create.body["Description"], "Web3 Home Office bootstrap command");
    let encoded = create.body["Content"].as_str().unwrap();
    let decoded = general_purpose::STANDARD.decode(encoded).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), script);

    assert_eq!(calls[1].action, "InvokeCommand");
    assert_eq!(
        calls[1].body,
        json!({ "CommandId": "cmd-xyz", "InstanceIds": ["lhins-abc123"], "Parameters": [] })
    );
}

#[tokio::test]
async fn test_bootstrap_fails_when_invoke_fails() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond(
        "CreateCommand",
        200,
        json!({ "Response": { "CommandId": "cmd-xyz", "RequestId": "req-cmd" } }),
    );
    cloud.respond(
        "InvokeCommand",
        200,
        json!({ "Response": { "Error": { "Code": "InvalidInstanceId.NotFound" } } }),
    );

    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    let err = cloud
        .provider()
        .bootstrap_instance(&job, "lhins-abc123", "echo")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("InvokeCommand"));
    assert!(err.to_string().contains("InvalidInstanceId.NotFound"));
}

#[tokio::test]
async fn test_bootstrap_without_command_id_fails_before_invoke() {
    let cloud = FakeCloud::spawn().await;
    cloud.respond(
        "CreateCommand",
        200,
        json!({ "Response": { "RequestId": "req-cmd" } }),
    );

    let job = ProvisionJobBuilder::new().with_id(JOB_ID).build();
    let err = cloud
        .provider()
        .bootstrap_instance(&job, "lhins-abc123", "echo")
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionerError::ProviderResponse(_)));
    assert_eq!(cloud.calls().len(), 1);
}
