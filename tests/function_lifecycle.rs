//! End-to-end resource and data source behaviour against a fake Management API.

mod common;

use axum::http::StatusCode;
use common::{function_config, source_dir, FakeApi, CREATED_AT, PROJECT_REF};
use serde_json::{json, Value};
use supabase_functions_provider::function_body::FUNCTION_BODY_DATA_SOURCE;
use supabase_functions_provider::function_resource::FUNCTION_RESOURCE;
use supabase_functions_provider::testing::{
    assert_error_at, assert_plan_replaces, assert_plan_updates_in_place, ProviderTester, TestError,
};
use supabase_functions_provider::{ProviderError, SupabaseProvider};

fn no_env(_: &str) -> Option<String> {
    None
}

async fn configured(api: &FakeApi) -> ProviderTester<SupabaseProvider> {
    let tester = ProviderTester::new(SupabaseProvider::with_env(no_env));
    tester.configure(api.provider_config()).await.unwrap();
    tester
}

#[tokio::test]
async fn test_create_uploads_sources_and_maps_response() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();

    let state = tester
        .lifecycle_create(FUNCTION_RESOURCE, function_config("hello-world", dir.path()))
        .await
        .unwrap();

    assert_eq!(state["id"], "func-hello-world");
    assert_eq!(state["slug"], "hello-world");
    assert_eq!(state["name"], "hello-world");
    assert_eq!(state["status"], "ACTIVE");
    assert_eq!(state["version"], 1);
    assert_eq!(state["created_at"], CREATED_AT);
    assert_eq!(state["updated_at"], CREATED_AT + 100);
    assert_eq!(state["verify_jwt"], true);
    assert_eq!(state["source_dir"], &*dir.path().to_string_lossy());
    assert_eq!(state["import_map_path"], Value::Null);

    let deploy = api.last_deploy();
    assert_eq!(deploy.slug, "hello-world");
    assert_eq!(
        deploy.metadata,
        json!({"entrypoint_path": "index.ts", "verify_jwt": true})
    );
    let names: Vec<_> = deploy.files.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["index.ts", "lib/greet.ts"]);
    assert!(deploy.files[1].1.contains("greet"));

    let agents = api.state.lock().unwrap().user_agents.clone();
    assert!(agents
        .iter()
        .all(|a| a.starts_with("supabase-functions-provider/")));
}

#[tokio::test]
async fn test_update_redeploys_in_place() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    let created = tester
        .lifecycle_create(FUNCTION_RESOURCE, function_config("hello-world", dir.path()))
        .await
        .unwrap();

    let mut config = function_config("hello-world", dir.path());
    config["name"] = json!("Hello World");
    config["verify_jwt"] = json!(false);
    config["import_map_path"] = json!("import_map.json");

    let plan = tester
        .plan_update(FUNCTION_RESOURCE, created.clone(), config.clone())
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);
    assert_eq!(plan.planned_state["id"], "func-hello-world");

    let updated = tester
        .lifecycle_update(FUNCTION_RESOURCE, created, config)
        .await
        .unwrap();
    assert_eq!(updated["version"], 2);
    assert_eq!(updated["name"], "Hello World");
    assert_eq!(updated["verify_jwt"], false);
    assert_eq!(updated["id"], "func-hello-world");
    assert_eq!(updated["import_map_path"], "import_map.json");

    let deploy = api.last_deploy();
    assert_eq!(deploy.metadata["name"], "Hello World");
    assert_eq!(deploy.metadata["verify_jwt"], false);
    assert_eq!(deploy.metadata["import_map_path"], "import_map.json");
}

#[tokio::test]
async fn test_update_keeps_created_at_when_deploy_omits_it() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    let created = tester
        .lifecycle_create(FUNCTION_RESOURCE, function_config("hello-world", dir.path()))
        .await
        .unwrap();
    assert_eq!(created["created_at"], CREATED_AT);

    api.state.lock().unwrap().omit_created_at_on_deploy = true;
    let mut config = function_config("hello-world", dir.path());
    config["entrypoint_path"] = json!("lib/greet.ts");

    let plan = tester
        .plan_update(FUNCTION_RESOURCE, created.clone(), config.clone())
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);
    assert_eq!(plan.planned_state["created_at"], CREATED_AT);

    let updated = tester
        .update(FUNCTION_RESOURCE, created.clone(), plan.planned_state)
        .await
        .unwrap();
    assert_eq!(updated["created_at"], CREATED_AT);
    assert_eq!(updated["updated_at"], CREATED_AT + 200);

    let refreshed = tester
        .lifecycle_update(FUNCTION_RESOURCE, created, config)
        .await
        .unwrap();
    assert_eq!(refreshed["created_at"], CREATED_AT);
    assert_eq!(api.last_deploy().metadata["entrypoint_path"], "lib/greet.ts");
}

#[tokio::test]
async fn test_slug_change_replaces_function() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    let created = tester
        .lifecycle_create(FUNCTION_RESOURCE, function_config("hello-world", dir.path()))
        .await
        .unwrap();

    let plan = tester
        .plan_update(
            FUNCTION_RESOURCE,
            created.clone(),
            function_config("goodbye-world", dir.path()),
        )
        .await
        .unwrap();
    assert_plan_replaces(&plan);

    let replaced = tester
        .lifecycle_update(
            FUNCTION_RESOURCE,
            created,
            function_config("goodbye-world", dir.path()),
        )
        .await
        .unwrap();
    assert_eq!(replaced["slug"], "goodbye-world");
    assert!(api.function("hello-world").is_none());
    assert!(api.function("goodbye-world").is_some());
}

#[tokio::test]
async fn test_delete_removes_function_and_tolerates_missing() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    let state = tester
        .lifecycle_create(FUNCTION_RESOURCE, function_config("hello-world", dir.path()))
        .await
        .unwrap();

    tester
        .lifecycle_delete(FUNCTION_RESOURCE, state.clone())
        .await
        .unwrap();
    assert!(api.function("hello-world").is_none());

    // Already gone: still a success.
    tester.delete(FUNCTION_RESOURCE, state).await.unwrap();
}

#[tokio::test]
async fn test_read_missing_function_drops_state() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    let state = tester
        .lifecycle_create(FUNCTION_RESOURCE, function_config("hello-world", dir.path()))
        .await
        .unwrap();

    api.state.lock().unwrap().functions.clear();

    let refreshed = tester.read(FUNCTION_RESOURCE, state).await.unwrap();
    assert!(refreshed.is_null());
}

#[tokio::test]
async fn test_read_refreshes_remote_fields() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    api.insert("hello-world");
    api.state
        .lock()
        .unwrap()
        .functions
        .values_mut()
        .for_each(|f| f.status = "PAUSED".to_string());

    let mut state = function_config("hello-world", dir.path());
    state["id"] = json!("func-hello-world");
    state["version"] = json!(1);
    state["verify_jwt"] = json!(true);

    let refreshed = tester.read(FUNCTION_RESOURCE, state).await.unwrap();
    assert_eq!(refreshed["status"], "PAUSED");
    assert_eq!(refreshed["version"], 3);
    assert_eq!(refreshed["verify_jwt"], false);
    assert_eq!(refreshed["updated_at"], CREATED_AT + 300);
    assert_eq!(refreshed["entrypoint_path"], "index.ts");
    assert_eq!(refreshed["source_dir"], &*dir.path().to_string_lossy());
}

#[tokio::test]
async fn test_deploy_failure_reports_status_and_body() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    api.fail_next(StatusCode::BAD_REQUEST, "{\"message\":\"Entrypoint not found\"}");

    let plan = tester
        .plan_create(FUNCTION_RESOURCE, function_config("hello-world", dir.path()))
        .await
        .unwrap();
    let err = tester
        .create(FUNCTION_RESOURCE, plan.planned_state)
        .await
        .unwrap_err();

    match &err {
        ProviderError::Api { status, body, .. } => {
            assert_eq!(*status, 400);
            assert!(body.contains("Entrypoint not found"));
        },
        other => panic!("expected API error, got {:?}", other),
    }
    assert!(err
        .message()
        .starts_with("Unable to deploy function, got status 400"));
    assert_eq!(err.summary(), "Client Error");
}

#[tokio::test]
async fn test_read_and_delete_failures() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let state = json!({"project_ref": PROJECT_REF, "slug": "hello-world"});

    api.fail_next(StatusCode::INTERNAL_SERVER_ERROR, "boom");
    let err = tester
        .read(FUNCTION_RESOURCE, state.clone())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unable to read function, got status 500: boom"
    );

    api.fail_next(StatusCode::FORBIDDEN, "forbidden");
    let err = tester.delete(FUNCTION_RESOURCE, state).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unable to delete function, got status 403: forbidden"
    );
}

#[tokio::test]
async fn test_missing_source_dir_fails_before_upload() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    let dir = source_dir();
    let missing = dir.path().join("does-not-exist");

    let plan = tester
        .plan_create(FUNCTION_RESOURCE, function_config("hello-world", &missing))
        .await
        .unwrap();
    let err = tester
        .create(FUNCTION_RESOURCE, plan.planned_state)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Io(_)));
    assert!(api.state.lock().unwrap().deploys.is_empty());
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let api = FakeApi::start().await;
    let tester = ProviderTester::new(SupabaseProvider::with_env(no_env));
    tester
        .configure(json!({"endpoint": api.url, "access_token": "sbp_wrong"}))
        .await
        .unwrap();

    let err = tester
        .read(
            FUNCTION_RESOURCE,
            json!({"project_ref": PROJECT_REF, "slug": "hello-world"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api { status: 401, .. }));
}

#[tokio::test]
async fn test_function_body_data_source() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    api.insert("hello-world");

    let config = json!({"project_ref": PROJECT_REF, "slug": "hello-world"});
    tester
        .validate_data_source_config(FUNCTION_BODY_DATA_SOURCE, config.clone())
        .await
        .unwrap();
    let state = tester
        .read_data_source(FUNCTION_BODY_DATA_SOURCE, config)
        .await
        .unwrap();

    assert_eq!(state["body"], "export default {}");
    assert_eq!(state["slug"], "hello-world");

    let err = tester
        .read_data_source(
            FUNCTION_BODY_DATA_SOURCE,
            json!({"project_ref": PROJECT_REF, "slug": "missing"}),
        )
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Unable to read function body, got status 404"));
}

#[tokio::test]
async fn test_import_by_project_and_slug() {
    let api = FakeApi::start().await;
    let tester = configured(&api).await;
    api.insert("hello-world");

    let imported = tester
        .import_resource(FUNCTION_RESOURCE, &format!("{}/hello-world", PROJECT_REF))
        .await
        .unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, FUNCTION_RESOURCE);

    let state = &imported[0].state;
    assert_eq!(state["project_ref"], PROJECT_REF);
    assert_eq!(state["id"], "func-hello-world");
    assert_eq!(state["version"], 3);
    assert_eq!(state["source_dir"], Value::Null);

    let err = tester
        .import_resource(FUNCTION_RESOURCE, &format!("{}/missing", PROJECT_REF))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));

    let err = tester
        .import_resource(FUNCTION_RESOURCE, "hello-world")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_configure_without_token() {
    let tester = ProviderTester::new(SupabaseProvider::with_env(no_env));
    let err = tester
        .configure(json!({"endpoint": "http://localhost:1"}))
        .await
        .unwrap_err();

    match err {
        TestError::Diagnostics(diagnostics) => assert_error_at(&diagnostics, "access_token"),
        other => panic!("expected diagnostics, got {}", other),
    }
}

#[tokio::test]
async fn test_invalid_slug_is_rejected_by_validation() {
    let tester = ProviderTester::new(SupabaseProvider::with_env(no_env));
    let dir = source_dir();
    let err = tester
        .validate_resource_config(FUNCTION_RESOURCE, function_config("hello world", dir.path()))
        .await
        .unwrap_err();

    match err {
        TestError::Diagnostics(diagnostics) => assert_error_at(&diagnostics, "slug"),
        other => panic!("expected diagnostics, got {}", other),
    }
}

#[tokio::test]
async fn test_misspelled_attribute_is_rejected_by_validation() {
    let tester = ProviderTester::new(SupabaseProvider::with_env(no_env));
    let dir = source_dir();
    let mut config = function_config("hello-world", dir.path());
    config["verify_jwts"] = json!(false);

    let err = tester
        .validate_resource_config(FUNCTION_RESOURCE, config)
        .await
        .unwrap_err();

    match err {
        TestError::Diagnostics(diagnostics) => assert_error_at(&diagnostics, "verify_jwts"),
        other => panic!("expected diagnostics, got {}", other),
    }
}
