use pathfetch::{Server, ServerConfig};
use pathfetch_core::{
    handler_fn, FetchError, HandlerError, Handlers, RegistrationError, ResourceArgs, Schema,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type CallLog = Arc<Mutex<Vec<(String, ResourceArgs)>>>;

fn schema() -> Schema {
    Schema::from_json(&json!({
        "entries": [{ "text": "Lorem ipsum", "author": { "$ref": "users" } }],
        "users": [{ "name": "Nobody" }],
    }))
    .expect("valid schema")
}

/// Handlers over two small tables, logging every physical call.
fn handlers(log: CallLog) -> Handlers {
    let entries: Arc<HashMap<String, (String, Option<u32>)>> = Arc::new(
        [
            ("1".to_owned(), ("hello".to_owned(), Some(7))),
            ("2".to_owned(), ("world".to_owned(), Some(7))),
            ("3".to_owned(), ("anonymous".to_owned(), None)),
        ]
        .into_iter()
        .collect(),
    );
    let users: Arc<HashMap<String, String>> =
        Arc::new([("7".to_owned(), "Ann".to_owned())].into_iter().collect());

    let logged = |log: &CallLog, resource: &str, args: &ResourceArgs| {
        log.lock().unwrap().push((resource.to_owned(), args.clone()));
    };

    let (l1, l2, l3, l4, l5) = (log.clone(), log.clone(), log.clone(), log.clone(), log);
    let (e1, e2, e3) = (entries.clone(), entries.clone(), entries);
    let u1 = users.clone();

    Handlers::new()
        .register(
            "entries",
            handler_fn(1, move |args: ResourceArgs| {
                logged(&l1, "entries", &args);
                let mut ids: Vec<String> = e1.keys().cloned().collect();
                ids.sort();
                async move { Ok::<_, HandlerError>(json!(ids)) }
            }),
        )
        .register(
            "entries.{}",
            handler_fn(1, move |args: ResourceArgs| {
                logged(&l2, "entries.{}", &args);
                let rows: Vec<Value> = args.ids[0]
                    .iter()
                    .map(|id| match e2.get(id) {
                        Some((text, _)) => json!({ "text": text }),
                        None => Value::Null,
                    })
                    .collect();
                async move { Ok::<_, HandlerError>(Value::Array(rows)) }
            }),
        )
        .register(
            "entries.{}.author",
            handler_fn(1, move |args: ResourceArgs| {
                logged(&l3, "entries.{}.author", &args);
                let authors: Vec<Value> = args.ids[0]
                    .iter()
                    .map(|id| json!(e3.get(id).and_then(|(_, author)| *author)))
                    .collect();
                async move { Ok::<_, HandlerError>(Value::Array(authors)) }
            }),
        )
        .register(
            "users",
            handler_fn(1, move |args: ResourceArgs| {
                logged(&l4, "users", &args);
                let ids: Vec<String> = users.keys().cloned().collect();
                async move { Ok::<_, HandlerError>(json!(ids)) }
            }),
        )
        .register(
            "users.{}",
            handler_fn(1, move |args: ResourceArgs| {
                logged(&l5, "users.{}", &args);
                let rows: Vec<Value> = args.ids[0]
                    .iter()
                    .map(|id| match u1.get(id) {
                        Some(name) => json!({ "name": name }),
                        None => Value::Null,
                    })
                    .collect();
                async move { Ok::<_, HandlerError>(Value::Array(rows)) }
            }),
        )
}

fn calls_to(log: &CallLog, resource: &str) -> Vec<ResourceArgs> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(r, _)| r == resource)
        .map(|(_, args)| args.clone())
        .collect()
}

#[tokio::test]
async fn test_complete_handler_set_has_no_problems() {
    let server = Server::new(schema(), handlers(CallLog::default()));
    assert!(server.problems().is_empty());
    assert_eq!(server.registry().len(), 5);
}

#[tokio::test]
async fn test_partial_handler_set_is_reported_not_fatal() {
    let handlers = Handlers::new()
        .register(
            "users.{}",
            handler_fn(2, |_| async { Ok::<_, HandlerError>(json!([])) }),
        )
        .register(
            "posts",
            handler_fn(1, |_| async { Ok::<_, HandlerError>(json!([])) }),
        );

    let server = Server::new(schema(), handlers);

    let problems = server.problems();
    assert!(problems.iter().any(|p| matches!(
        p,
        RegistrationError::Missing { resource, .. } if resource == "entries.{}"
    )));
    assert!(problems.iter().any(|p| matches!(
        p,
        RegistrationError::Arity { resource, found: 2, .. } if resource == "users.{}"
    )));
    assert!(problems
        .iter()
        .any(|p| p.to_string() == "Unexpected handler for: posts"));

    let missing = server.fetch("entries.1").await;
    assert!(matches!(missing, Err(FetchError::MissingHandler(_))));
}

#[tokio::test]
async fn test_fetch_follows_references_into_one_store() {
    let log = CallLog::default();
    let server = Server::new(schema(), handlers(log.clone()));

    let store = server.fetch("entries.1.author").await.expect("fetch failed");

    assert_eq!(
        store,
        json!({
            "entries": { "1": { "author": 7 } },
            "users": { "7": { "name": "Ann" } },
        })
    );
}

#[tokio::test]
async fn test_concurrent_fetches_share_handler_calls() {
    let log = CallLog::default();
    let server = Server::new(schema(), handlers(log.clone()));

    let (a, b) = tokio::join!(server.fetch("entries.1"), server.fetch("entries.2"));
    a.expect("fetch failed");
    b.expect("fetch failed");

    assert_eq!(
        calls_to(&log, "entries.{}"),
        vec![ResourceArgs::single(["1", "2"])]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetches_share_handler_calls_on_worker_threads() {
    for _ in 0..20 {
        let log = CallLog::default();
        let server = Server::new(schema(), handlers(log.clone()));

        let (a, b, c) = tokio::join!(
            server.fetch("entries.1"),
            server.fetch("entries.2"),
            server.fetch("entries.3")
        );
        a.expect("fetch failed");
        b.expect("fetch failed");
        c.expect("fetch failed");

        assert_eq!(
            calls_to(&log, "entries.{}"),
            vec![ResourceArgs::single(["1", "2", "3"])]
        );
    }
}

#[tokio::test]
async fn test_same_path_twice_reaches_each_handler_once() {
    let log = CallLog::default();
    let server = Server::new(schema(), handlers(log.clone()));

    let (a, b) = tokio::join!(
        server.fetch("entries.1.author"),
        server.fetch("entries.1.author")
    );

    assert_eq!(a.expect("fetch failed"), b.expect("fetch failed"));
    assert_eq!(calls_to(&log, "entries.{}.author").len(), 1);
    assert_eq!(calls_to(&log, "users.{}").len(), 1);
}

#[tokio::test]
async fn test_star_paths_fan_out_through_references() {
    let log = CallLog::default();
    let server = Server::new(schema(), handlers(log.clone()));

    let store = server
        .fetch_paths(&["entries.*", "entries.*.author"])
        .await
        .expect("fetch failed");

    assert_eq!(store["entries"]["__keys"], json!(["1", "2", "3"]));
    assert_eq!(store["entries"]["3"], json!({ "text": "anonymous", "author": null }));
    assert_eq!(store["users"]["7"]["name"], json!("Ann"));
    // Both star paths discover in the same batch
    assert_eq!(calls_to(&log, "entries").len(), 1);
    assert_eq!(
        calls_to(&log, "entries.{}.author"),
        vec![ResourceArgs::single(["1", "2", "3"])]
    );
}

#[tokio::test]
async fn test_handle_query_decodes_refs() {
    let server = Server::new(schema(), handlers(CallLog::default()));

    let store = server
        .handle_query("/?refs=users.7,entries.2")
        .await
        .expect("query failed");
    let bad = server.handle_query("/users/7").await;

    assert_eq!(store["users"]["7"]["name"], json!("Ann"));
    assert_eq!(store["entries"]["2"]["text"], json!("world"));
    assert!(matches!(bad, Err(FetchError::Transport(_))));
}

#[tokio::test]
async fn test_fetch_resource_checks_arity() {
    let server = Server::new(schema(), handlers(CallLog::default()));

    let result = server
        .fetch_resource(
            "users.{}",
            ResourceArgs::ids(vec![vec!["1".into()], vec!["2".into()]]),
        )
        .await;

    assert!(matches!(
        result,
        Err(FetchError::ArgumentMismatch { expected: 1, found: 2, .. })
    ));
}

#[tokio::test]
async fn test_failing_handler_fails_its_whole_batch() {
    let handlers = handlers(CallLog::default()).register(
        "users.{}",
        handler_fn(1, |_| async {
            Err::<Value, _>(HandlerError::new("users table unavailable"))
        }),
    );
    let server = Server::new(schema(), handlers);

    let (a, b) = tokio::join!(server.fetch("users.1"), server.fetch("users.2"));

    for result in [a, b] {
        match result {
            Err(FetchError::Batch(e)) => assert!(e.to_string().contains("users table unavailable")),
            other => panic!("expected a batch failure, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_batch_delay_widens_the_batch_window() {
    let config = ServerConfig::from_json_str(r#"{ "batch_delay_ms": 10 }"#).expect("valid config");
    let log = CallLog::default();
    let server = Arc::new(Server::with_config(schema(), handlers(log.clone()), config));

    let late = {
        let server = server.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            server.fetch("entries.2").await
        })
    };
    let early = server.fetch("entries.1").await.expect("fetch failed");
    let late = late.await.expect("task panicked").expect("fetch failed");

    assert_eq!(early["entries"]["1"]["text"], json!("hello"));
    assert_eq!(late["entries"]["2"]["text"], json!("world"));
    assert_eq!(
        calls_to(&log, "entries.{}"),
        vec![ResourceArgs::single(["1", "2"])]
    );
}
