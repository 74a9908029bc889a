//! Push / pull / clone against a live HTTP remote server.

use mgit_core::{ObjectId, RefUpdate, Repository, SyncConfig};
use mgit_remote::{
    CloneOutcome, HttpTransport, PullOutcome, PushOutcome, RefUpdateRequest, RemoteServer,
    RemoteTransport, ServerConfig, SyncError, SyncProtocol, clone_repository,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Start a server over `root` on an ephemeral port and return its base URL
async fn start_server(root: &Path) -> (Arc<RemoteServer>, String) {
    let server = Arc::new(
        RemoteServer::open(ServerConfig {
            repo_root: root.to_path_buf(),
            ..ServerConfig::default()
        })
        .unwrap(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(server.clone().serve(listener));
    (server, url)
}

fn transport(url: &str) -> HttpTransport {
    HttpTransport::new(url, &SyncConfig::default()).unwrap()
}

fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> ObjectId {
    fs::write(repo.root().join(name), content).unwrap();
    repo.add(&[name]).unwrap();
    repo.commit(message, "alice").unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_push_pull_clone_over_http() {
    let tmp = TempDir::new().unwrap();
    let (server, url) = start_server(&tmp.path().join("server")).await;
    let remote = transport(&url);

    let alice = Repository::init(tmp.path().join("alice")).unwrap();
    commit_file(&alice, "a.txt", "hello", "first");
    let head = commit_file(&alice, "b.txt", "second file", "second");

    let from_alice = SyncProtocol::new(&alice, &remote).unwrap();
    assert_eq!(
        from_alice.push("master").await.unwrap(),
        PushOutcome::Pushed {
            head,
            objects_uploaded: 6
        }
    );
    assert_eq!(
        server.repository().refs().branch_head("master").unwrap(),
        Some(head)
    );
    assert_eq!(from_alice.push("master").await.unwrap(), PushOutcome::AlreadyUpToDate);

    // clone over HTTP
    let outcome = clone_repository(&remote, &tmp.path().join("bob")).await.unwrap();
    assert_eq!(
        outcome,
        CloneOutcome::Cloned {
            branch: "master".into(),
            head: Some(head),
            objects_fetched: 6
        }
    );
    let bob = Repository::open(tmp.path().join("bob")).unwrap();
    assert_eq!(bob.log().unwrap().len(), 2);

    // bob builds on top; alice pulls it
    let bob_head = commit_file(&bob, "c.txt", "from bob", "third");
    let from_bob = SyncProtocol::new(&bob, &remote).unwrap();
    assert!(matches!(
        from_bob.push("master").await.unwrap(),
        PushOutcome::Pushed { objects_uploaded: 3, .. }
    ));
    assert!(matches!(
        from_alice.pull("master").await.unwrap(),
        PullOutcome::Pulled { head, .. } if head == bob_head
    ));
    assert_eq!(alice.log().unwrap()[0].message, "third");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_diverged_push_is_rejected_over_http() {
    let tmp = TempDir::new().unwrap();
    let (server, url) = start_server(&tmp.path().join("server")).await;
    let remote = transport(&url);

    let first = Repository::init(tmp.path().join("first")).unwrap();
    let first_head = commit_file(&first, "a.txt", "one", "one");
    SyncProtocol::new(&first, &remote)
        .unwrap()
        .push("master")
        .await
        .unwrap();

    let second = Repository::init(tmp.path().join("second")).unwrap();
    commit_file(&second, "a.txt", "two", "two");
    assert_eq!(
        SyncProtocol::new(&second, &remote)
            .unwrap()
            .push("master")
            .await
            .unwrap(),
        PushOutcome::RemoteRejectedNonFastForward
    );
    assert_eq!(
        server.repository().refs().branch_head("master").unwrap(),
        Some(first_head)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transport_primitives_over_http() {
    let tmp = TempDir::new().unwrap();
    let (server, url) = start_server(&tmp.path().join("server")).await;
    let remote = transport(&url);

    let refs = remote.list_refs().await.unwrap();
    assert_eq!(refs.head.as_deref(), Some("master"));
    assert_eq!(refs.branch_head("master"), None);

    let id = ObjectId::from_data(b"blob");
    assert!(!remote.has_object(&id).await.unwrap());
    assert!(matches!(
        remote.get_object(&id).await,
        Err(SyncError::RemoteObjectNotFound(_))
    ));
    remote.put_object(&id, "blob".into()).await.unwrap();
    assert!(remote.has_object(&id).await.unwrap());
    assert_eq!(remote.get_object(&id).await.unwrap().as_ref(), b"blob");
    assert!(remote.list_objects().await.unwrap().contains(&id));

    let err = remote.put_object(&id, "forged".into()).await.unwrap_err();
    assert!(matches!(err, SyncError::ObjectRejected { .. }));

    // update-ref: non-commit target is refused, stale CAS conflicts
    let repo = server.repository();
    fs::write(repo.root().join("f.txt"), "f").unwrap();
    repo.add(&["f.txt"]).unwrap();
    let head = repo.commit("server side", "carol").unwrap();

    let bogus = RefUpdateRequest {
        branch: "master".into(),
        old: Some(head),
        new: id,
    };
    assert!(matches!(
        remote.update_ref(&bogus).await,
        Err(SyncError::RefUpdateRejected { .. })
    ));

    let stale = RefUpdateRequest {
        branch: "master".into(),
        old: None,
        new: head,
    };
    assert_eq!(
        remote.update_ref(&stale).await.unwrap(),
        RefUpdate::Conflict {
            current: Some(head)
        }
    );
    assert_eq!(repo.refs().branch_head("master").unwrap(), Some(head));
}
