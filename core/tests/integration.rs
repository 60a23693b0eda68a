//! Full lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every connector
//! operation through the real `UreqTransport`, so request building, the
//! token handshake and envelope classification are checked end-to-end.

use rally_core::{Connector, ConnectorConfig, FindQuery, RallyError, WarningPolicy};
use serde_json::json;

fn start_server() -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config(addr: std::net::SocketAddr) -> ConnectorConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    ConnectorConfig::new("user@example.com", "hunter2")
        .with_scheme("http")
        .with_domain(addr.to_string())
        .with_debug(true)
}

#[test]
fn crud_lifecycle() {
    let addr = start_server();
    let mut rally = Connector::new(config(addr));
    rally.set_workspace("/workspace/1");

    // Step 1: nothing there yet.
    let result = rally.find("story", &FindQuery::new()).unwrap();
    assert_eq!(result["TotalResultCount"], 0);

    // Step 2: create two stories.
    let created = rally.create("story", &json!({"Name": "Login page"})).unwrap();
    assert_eq!(created["Name"], "Login page");
    assert_eq!(created["_type"], "HierarchicalRequirement");
    let id = created["ObjectID"].as_u64().unwrap();
    rally.create("userstory", &json!({"Name": "Logout"})).unwrap();

    // Step 3: get it back.
    let fetched = rally.get("Story", id).unwrap();
    assert_eq!(fetched["Name"], "Login page");

    // Step 4: follow its _ref.
    let link = created["_ref"].as_str().unwrap();
    let followed = rally.get_by_url(link).unwrap();
    assert_eq!(followed["HierarchicalRequirement"]["ObjectID"], id);

    // Step 5: query with a condition and a field list.
    let query = FindQuery::new()
        .query("(Name = \"Login page\")")
        .fetch(["Name", "ObjectID"]);
    let result = rally.find("story", &query).unwrap();
    assert_eq!(result["TotalResultCount"], 1);
    assert_eq!(result["Results"][0]["ObjectID"], id);

    // Step 6: paging.
    let result = rally
        .find("story", &FindQuery::new().page_size(1).start(2))
        .unwrap();
    assert_eq!(result["TotalResultCount"], 2);
    assert_eq!(result["Results"].as_array().unwrap().len(), 1);
    assert_eq!(result["Results"][0]["Name"], "Logout");

    // Step 7: update.
    let updated = rally
        .update("story", id, &json!({"ScheduleState": "Accepted"}))
        .unwrap();
    assert_eq!(updated["ScheduleState"], "Accepted");
    assert_eq!(updated["Name"], "Login page");

    // Step 8: delete.
    assert!(rally.delete("story", id).unwrap());

    // Step 9: get after delete is a service error.
    let err = rally.get("story", id).unwrap_err();
    assert!(matches!(err, RallyError::Service { .. }));
    assert_eq!(err.to_string(), "Cannot find object to read");

    // Step 10: delete again is a service error, never `false`.
    let err = rally.delete("story", id).unwrap_err();
    assert_eq!(err.messages(), ["Cannot find object to delete"]);
}

#[test]
fn workspace_scope_isolates_queries() {
    let addr = start_server();
    let mut rally = Connector::new(config(addr));

    rally.set_workspace("/workspace/a");
    rally.create("defect", &json!({"Name": "in a"})).unwrap();
    rally.set_workspace("/workspace/b");
    rally.create("defect", &json!({"Name": "in b"})).unwrap();

    let result = rally.find("defect", &FindQuery::new()).unwrap();
    assert_eq!(result["TotalResultCount"], 1);
    assert_eq!(result["Results"][0]["Name"], "in b");

    rally.clear_workspace();
    let result = rally.find("defect", &FindQuery::new()).unwrap();
    assert_eq!(result["TotalResultCount"], 2);
}

#[test]
fn service_errors_and_warnings_surface() {
    let addr = start_server();
    let rally = Connector::new(config(addr));

    let err = rally
        .find("defect", &FindQuery::new().query("Name is broken"))
        .unwrap_err();
    assert!(matches!(err, RallyError::Service { .. }));

    let err = rally
        .find("defect", &FindQuery::new().page_size(5000))
        .unwrap_err();
    assert!(err.is_warning());

    let lenient = Connector::new(config(addr).with_warning_policy(WarningPolicy::Log));
    let result = lenient
        .find("defect", &FindQuery::new().page_size(5000))
        .unwrap();
    assert_eq!(result["PageSize"], 2000);
}

#[test]
fn unknown_version_is_http_failure() {
    let addr = start_server();
    let rally = Connector::new(config(addr).with_version("v9.9"));
    let err = rally.get("defect", 1).unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(matches!(err, RallyError::Http { ref body, .. } if body.contains("v9.9")));
}

#[test]
fn unreachable_host_is_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let rally = Connector::new(config(addr));
    let err = rally.security_token().unwrap_err();
    assert!(matches!(err, RallyError::Transport(_)));
}
