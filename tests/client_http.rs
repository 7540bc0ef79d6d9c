use std::fs;
use std::io::Read;
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

use poiflow_rs::{Client, ClientConfig, Process};

fn spawn_server<F>(requests: usize, handler: F) -> (String, thread::JoinHandle<()>)
where
    F: Fn(tiny_http::Request) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind mock server");
    let addr = server.server_addr().to_ip().expect("ip listener").to_string();
    let handle = thread::spawn(move || {
        for request in server.incoming_requests().take(requests) {
            handler(request);
        }
    });
    (addr, handle)
}

fn test_client(addr: &str) -> Client {
    let mut config = ClientConfig::new("secret-key");
    config.base_url = format!("http://{addr}/");
    config.timeout_secs = 5;
    Client::new(config).expect("client")
}

fn json_response(body: &Value) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body.to_string()).with_header(
        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
    )
}

fn api_key_of(request: &tiny_http::Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv("X-API-Key"))
        .map(|header| header.value.to_string())
}

fn status_record() -> Value {
    json!({
        "process": {
            "id": 42,
            "version": 3,
            "name": "athens-pois",
            "steps": [
                { "key": "s1", "outputKey": "k1", "inputKeys": [],
                  "operation": "TRANSFORM", "tool": "TRIPLEGEO" },
                { "key": "s2", "outputKey": "k2", "inputKeys": ["k1"],
                  "operation": "INTERLINK", "tool": "LIMES" }
            ]
        },
        "execution": {
            "status": "COMPLETED",
            "steps": [
                {
                    "key": "s2", "name": "Interlink", "tool": "LIMES",
                    "operation": "INTERLINK", "status": "COMPLETED",
                    "files": [
                        { "id": 3, "type": "OUTPUT", "outputPartKey": "accepted",
                          "name": "links.nt", "size": 512 }
                    ]
                }
            ]
        }
    })
}

#[test]
fn file_browse_flattens_sorts_and_falls_back() -> Result<()> {
    let tree = json!({
        "files": [
            { "name": "b.csv", "modified": 2000, "size": 2048, "path": "/b.csv" }
        ],
        "folders": [
            {
                "files": [
                    { "name": "a.csv", "modified": 1000, "size": 10, "path": "/pois/a.csv" }
                ]
            }
        ]
    });
    let (addr, server) = spawn_server(2, move |request| {
        assert_eq!(request.url(), "/api/v1/file-system");
        assert_eq!(api_key_of(&request).as_deref(), Some("secret-key"));
        let _ = request.respond(json_response(&tree));
    });
    let client = test_client(&addr);

    let table = client.file_browse("size", true, true)?;
    assert_eq!(table.columns(), ["name", "modified", "size", "path"]);
    let sizes: Vec<_> = table
        .rows()
        .iter()
        .map(|row| row[2].as_str().unwrap().to_string())
        .collect();
    assert_eq!(sizes, ["10.0 B", "2.0 kB"]);

    // unknown sort column falls back to `modified` instead of failing
    let table = client.file_browse("no-such-column", true, false)?;
    let names: Vec<_> = table
        .rows()
        .iter()
        .map(|row| row[0].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["a.csv", "b.csv"]);

    server.join().unwrap();
    Ok(())
}

#[test]
fn process_status_output_download_chain() -> Result<()> {
    let record = status_record();
    let (addr, server) = spawn_server(2, move |request| {
        let url = request.url().to_string();
        match url.as_str() {
            "/api/v1/workflows/42/3" => {
                let _ = request.respond(json_response(&record));
            }
            "/api/v1/workflows/42/3/files/3" => {
                let _ = request.respond(Response::from_string("links-data"));
            }
            other => panic!("unexpected request {other}"),
        }
    });
    let client = test_client(&addr);

    let process = client.process_status(42, 3)?;
    let file = process.output(None)?.expect("terminal output");
    assert_eq!(file.process_id(), 42);

    let dir = tempfile::tempdir()?;
    let target = dir.path().join("downloads").join("links.nt");
    client.download(&file, &target)?;
    assert_eq!(fs::read_to_string(&target)?, "links-data");

    server.join().unwrap();
    Ok(())
}

#[test]
fn upload_streams_the_source_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("pois.csv");
    fs::write(&source, "poi data")?;

    let (addr, server) = spawn_server(1, |mut request| {
        assert!(request.url().starts_with("/api/v1/file-system/upload?"));
        assert!(request.url().contains("overwrite=true"));
        assert!(request.url().contains("path=uploads"));
        let mut body = String::new();
        request.as_reader().read_to_string(&mut body).unwrap();
        assert_eq!(body, "poi data");
        let _ = request.respond(Response::from_string(""));
    });
    let client = test_client(&addr);

    client.file_upload(&source, "uploads/pois.csv", true)?;
    server.join().unwrap();
    Ok(())
}

#[test]
fn operation_arguments_normalize_independently() -> Result<()> {
    let (sender, receiver) = mpsc::channel();
    let (addr, server) = spawn_server(1, move |mut request| {
        assert_eq!(request.url(), "/api/v1/toolkit/interlink");
        let mut body = String::new();
        request.as_reader().read_to_string(&mut body).unwrap();
        sender.send(body).unwrap();
        let _ = request.respond(json_response(&json!({
            "id": 1, "processId": 51, "processVersion": 1, "status": "RUNNING",
            "taskType": "API", "name": "interlink", "startedOn": 0
        })));
    });
    let client = test_client(&addr);

    // a live StepFile handle reduces to the output triple, the catalog pair
    // passes through untouched
    let process = Process::from_record(status_record())?;
    let left = process.output(None)?.expect("terminal output");
    let accepted = client.interlink("limes-default", &left, (8, 2))?;
    assert_eq!(accepted.process_id, 51);
    assert_eq!(accepted.status, "RUNNING");

    let body: Value = serde_json::from_str(&receiver.recv()?)?;
    assert_eq!(body["profile"], "limes-default");
    assert_eq!(
        body["left"],
        json!({ "type": "OUTPUT", "processId": 42, "processVersion": 3, "fileId": 3 })
    );
    assert_eq!(body["right"], json!({ "type": "CATALOG", "id": 8, "version": 2 }));

    server.join().unwrap();
    Ok(())
}

#[test]
fn listings_flatten_items_and_revisions() -> Result<()> {
    let (addr, server) = spawn_server(2, |request| {
        if request.url().starts_with("/api/v1/workflows") {
            assert!(request.url().contains("pageIndex=0"));
            assert!(request.url().contains("term=pois"));
            let _ = request.respond(json_response(&json!({
                "items": [
                    { "id": 7, "version": 2, "name": "fuse-regions",
                      "revisions": [
                          { "id": 7, "version": 1, "name": "fuse-regions" },
                          { "id": 7, "version": 2, "name": "fuse-regions" }
                      ] }
                ]
            })));
        } else {
            assert!(request.url().starts_with("/api/v1/resources"));
            let _ = request.respond(json_response(&json!({
                "items": [
                    { "id": 11, "name": "osm-pois", "description": "OSM extract",
                      "size": 4096, "numberOfEntities": 1200,
                      "tableName": "osm_pois", "createdOn": 0 }
                ]
            })));
        }
    });
    let client = test_client(&addr);

    let workflows = client.process_query(Some("pois"), 0, 10)?;
    assert_eq!(workflows.len(), 2);
    assert_eq!(workflows.rows()[0][1], json!(1));

    let resources = client.catalog_query(None, 0, 10)?;
    assert_eq!(resources.len(), 1);
    assert_eq!(resources.rows()[0][6], json!("1970-01-01T00:00:00Z"));

    server.join().unwrap();
    Ok(())
}
