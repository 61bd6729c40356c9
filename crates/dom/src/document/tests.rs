use std::collections::BTreeMap;
use std::time::Duration;

use crate::{DeliveryPolicy, DocumentConfig, DocumentError, DocumentHandle, Mutation, NodeId, Subscription, TreeError};

fn roomy() -> DocumentConfig {
	DocumentConfig::default().subscriber_buffer(64)
}

async fn next(sub: &mut Subscription) -> String {
	let cmd = tokio::time::timeout(Duration::from_secs(1), sub.recv()).await.expect("command within 1s");
	cmd.expect("stream open").as_str().to_owned()
}

#[tokio::test(flavor = "current_thread")]
async fn subscriber_sees_mutations_in_order() {
	let doc = DocumentHandle::spawn(DocumentConfig::default());
	let span = doc.append_new(doc.body(), "span").await.unwrap();
	let mut sub = doc.subscribe().await.unwrap();

	// The default single-slot stream forces a consumer running alongside the mutator.
	let consumer = tokio::spawn(async move {
		let mut seen = Vec::new();
		for _ in 0..11 {
			seen.push(next(&mut sub).await);
		}
		seen
	});
	for n in 0..10 {
		doc.set(span, "innerText", &n).await.unwrap();
	}

	let seen = consumer.await.unwrap();
	assert!(seen[0].contains(r#"e.id = "1""#));
	for (n, cmd) in seen[1..].iter().enumerate() {
		assert_eq!(cmd, &format!(r#"document.getElementById("1").innerText = {n};"#));
	}
}

#[tokio::test(flavor = "current_thread")]
async fn late_subscriber_gets_one_snapshot_with_latest_values() {
	let doc = DocumentHandle::spawn(roomy());
	let button = doc.append_new(doc.body(), "button").await.unwrap();
	doc.set(button, "innerText", "A").await.unwrap();
	doc.set(button, "innerText", "B").await.unwrap();

	let mut sub = doc.subscribe().await.unwrap();
	let snapshot = next(&mut sub).await;

	assert!(snapshot.contains(r#"e.innerText = "B";"#));
	assert!(!snapshot.contains(r#""A""#));
	assert_eq!(sub.try_recv(), None);
}

#[tokio::test(flavor = "current_thread")]
async fn overwrite_broadcasts_once_per_call() {
	let doc = DocumentHandle::spawn(roomy());
	let button = doc.append_new(doc.body(), "button").await.unwrap();
	let mut sub = doc.subscribe().await.unwrap();
	next(&mut sub).await;

	doc.set(button, "innerText", "A").await.unwrap();
	doc.set(button, "innerText", "B").await.unwrap();

	assert_eq!(next(&mut sub).await, r#"document.getElementById("1").innerText = "A";"#);
	assert_eq!(next(&mut sub).await, r#"document.getElementById("1").innerText = "B";"#);
	assert_eq!(sub.try_recv(), None);
}

#[tokio::test(flavor = "current_thread")]
async fn detached_property_is_silent_until_appended() {
	let doc = DocumentHandle::spawn(roomy());
	let mut sub = doc.subscribe().await.unwrap();
	next(&mut sub).await;

	let div = doc.create_element("div").await.unwrap();
	doc.set(div, "innerText", "hidden").await.unwrap();
	assert_eq!(sub.try_recv(), None);

	doc.append(doc.body(), div).await.unwrap();
	let append = next(&mut sub).await;
	assert!(append.starts_with("document.body.appendChild("));
	assert!(append.contains(r#"e.innerText = "hidden";"#));

	let mut late = doc.subscribe().await.unwrap();
	assert!(next(&mut late).await.contains(r#"e.innerText = "hidden";"#));
}

#[tokio::test(flavor = "current_thread")]
async fn remove_broadcasts_and_drops_from_snapshot() {
	let doc = DocumentHandle::spawn(roomy());
	let p = doc.append_new(doc.body(), "p").await.unwrap();
	let mut sub = doc.subscribe().await.unwrap();
	next(&mut sub).await;

	doc.remove(p).await.unwrap();
	assert_eq!(next(&mut sub).await, r#"document.getElementById("1").remove();"#);

	let mut late = doc.subscribe().await.unwrap();
	assert!(!next(&mut late).await.contains(r#"createElement("p")"#));
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_cancels_leave_set_once() {
	let doc = DocumentHandle::spawn(DocumentConfig::default());
	let sub = doc.subscribe().await.unwrap();
	let other = sub.canceller();
	let third = sub.canceller();
	assert_eq!(other.id(), sub.id());
	assert_eq!(third.id(), sub.id());

	let (_, _, _) = tokio::join!(sub.cancel(), other.cancel(), third.cancel());

	assert!(other.is_cancelled());
	assert_eq!(doc.stats().await.unwrap().subscribers, 0);
	// A stale deregistration is ignored.
	other.cancel().await;
	assert_eq!(doc.stats().await.unwrap().subscribers, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn cancel_releases_blocked_broadcast() {
	let doc = DocumentHandle::spawn(DocumentConfig::default());
	let span = doc.append_new(doc.body(), "span").await.unwrap();
	// The snapshot fills the single slot and is never read.
	let stalled = doc.subscribe().await.unwrap();
	let canceller = stalled.canceller();

	let mutator = doc.clone();
	let blocked = tokio::spawn(async move { mutator.set(span, "innerText", "x").await });
	tokio::task::yield_now().await;
	assert!(!blocked.is_finished());

	tokio::join!(stalled.cancel(), canceller.cancel());

	tokio::time::timeout(Duration::from_secs(1), blocked).await.expect("mutation released").unwrap().unwrap();
	assert_eq!(doc.stats().await.unwrap().subscribers, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn stalled_subscriber_delays_others_until_it_drains() {
	let doc = DocumentHandle::spawn(DocumentConfig::default());
	let span = doc.append_new(doc.body(), "span").await.unwrap();
	let mut slow = doc.subscribe().await.unwrap();
	let mut fast = doc.subscribe().await.unwrap();
	next(&mut fast).await;

	let mutator = doc.clone();
	let blocked = tokio::spawn(async move { mutator.set(span, "innerText", "x").await });
	tokio::task::yield_now().await;
	assert!(!blocked.is_finished());
	assert_eq!(fast.try_recv(), None);

	next(&mut slow).await;
	blocked.await.unwrap().unwrap();
	assert!(next(&mut slow).await.ends_with(r#"innerText = "x";"#));
	assert!(next(&mut fast).await.ends_with(r#"innerText = "x";"#));
}

#[tokio::test(flavor = "current_thread")]
async fn evict_slow_drops_full_subscriber() {
	let doc = DocumentHandle::spawn(DocumentConfig::default().delivery(DeliveryPolicy::EvictSlow));
	let span = doc.append_new(doc.body(), "span").await.unwrap();
	let mut slow = doc.subscribe().await.unwrap();
	let mut fast = doc.subscribe().await.unwrap();
	next(&mut fast).await;

	doc.set(span, "innerText", "x").await.unwrap();

	assert!(next(&mut fast).await.ends_with(r#"innerText = "x";"#));
	next(&mut slow).await;
	assert_eq!(slow.recv().await, None);
	assert_eq!(doc.stats().await.unwrap().subscribers, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn dropped_subscription_is_removed() {
	let doc = DocumentHandle::spawn(DocumentConfig::default());
	let span = doc.append_new(doc.body(), "span").await.unwrap();
	drop(doc.subscribe().await.unwrap());

	doc.set(span, "innerText", "x").await.unwrap();

	assert_eq!(doc.stats().await.unwrap().subscribers, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn invariant_violation_stops_document() {
	let doc = DocumentHandle::spawn(roomy());
	let mut sub = doc.subscribe().await.unwrap();
	next(&mut sub).await;

	let err = doc.remove(NodeId::ROOT).await.unwrap_err();
	assert!(matches!(err, DocumentError::Invariant(TreeError::Root)));

	assert_eq!(sub.recv().await, None);
	assert!(matches!(doc.set_title("after").await, Err(DocumentError::Closed)));
	assert!(doc.is_closed());
}

#[tokio::test(flavor = "current_thread")]
async fn encoding_failure_rejects_without_touching_tree() {
	let doc = DocumentHandle::spawn(roomy());
	let span = doc.append_new(doc.body(), "span").await.unwrap();
	let mut sub = doc.subscribe().await.unwrap();
	next(&mut sub).await;

	let unkeyable = BTreeMap::from([(vec![1u8], 1u8)]);
	assert!(matches!(doc.set(span, "data", &unkeyable).await, Err(DocumentError::Encode(_))));
	assert!(matches!(doc.set(span, "x;y", "v").await, Err(DocumentError::Encode(_))));
	assert!(matches!(
		doc.mutate(Mutation::Create { tag: "<p>".to_owned() }).await,
		Err(DocumentError::Encode(_))
	));

	assert_eq!(sub.try_recv(), None);
	assert_eq!(doc.stats().await.unwrap().nodes, 2);
	doc.set(span, "data", "fine").await.unwrap();
	assert!(next(&mut sub).await.ends_with(r#".data = "fine";"#));
}

#[tokio::test(flavor = "current_thread")]
async fn shutdown_closes_streams() {
	let doc = DocumentHandle::spawn(roomy());
	let mut sub = doc.subscribe().await.unwrap();
	next(&mut sub).await;

	doc.shutdown().await;

	assert_eq!(sub.recv().await, None);
	assert!(matches!(doc.stats().await, Err(DocumentError::Closed)));
	sub.cancel().await;
}

#[tokio::test(flavor = "current_thread")]
async fn late_joiner_sees_root_properties() {
	let doc = DocumentHandle::spawn(roomy());
	let mut early = doc.subscribe().await.unwrap();
	next(&mut early).await;

	doc.set(doc.body(), "className", "dark").await.unwrap();
	assert_eq!(next(&mut early).await, r#"document.body.className = "dark";"#);

	let mut late = doc.subscribe().await.unwrap();
	assert!(next(&mut late).await.contains(r#"var e = document.body; e.className = "dark";"#));
}

#[tokio::test(flavor = "current_thread")]
async fn dropping_every_handle_ends_streams() {
	let doc = DocumentHandle::spawn(roomy());
	let mut sub = doc.subscribe().await.unwrap();
	next(&mut sub).await;

	drop(doc);

	let end = tokio::time::timeout(Duration::from_secs(1), sub.recv()).await.expect("stream ends within 1s");
	assert_eq!(end, None);
	// Cancelling after the document is gone returns at once.
	sub.cancel().await;
}

#[tokio::test(flavor = "current_thread")]
async fn registration_snapshot_never_reaches_existing_subscriber() {
	const MUTATIONS: usize = 20;
	let doc = DocumentHandle::spawn(roomy());
	let span = doc.append_new(doc.body(), "span").await.unwrap();
	let mut a = doc.subscribe().await.unwrap();

	let mutator = doc.clone();
	let writes = tokio::spawn(async move {
		for n in 0..MUTATIONS {
			mutator.set(span, "innerText", &n).await.unwrap();
			tokio::task::yield_now().await;
		}
	});
	let reader = tokio::spawn(async move {
		let mut seen = Vec::new();
		for _ in 0..=MUTATIONS {
			seen.push(next(&mut a).await);
		}
		(seen, a)
	});

	for _ in 0..MUTATIONS / 2 {
		tokio::task::yield_now().await;
	}
	let mut b = doc.subscribe().await.unwrap();
	writes.await.unwrap();
	let (seen, mut a) = reader.await.unwrap();

	assert!(seen[0].starts_with("document.getElementsByTagName"));
	for (n, cmd) in seen[1..].iter().enumerate() {
		assert_eq!(cmd, &format!(r#"document.getElementById("1").innerText = {n};"#));
	}
	assert_eq!(a.try_recv(), None);

	let snapshot = next(&mut b).await;
	assert!(snapshot.starts_with("document.getElementsByTagName"));
	while let Some(cmd) = b.try_recv() {
		assert!(cmd.as_str().starts_with(r#"document.getElementById("1").innerText = "#));
	}
}

#[tokio::test(flavor = "current_thread")]
async fn create_reports_new_ids_and_rejects_bad_parent() {
	let doc = DocumentHandle::spawn(roomy());
	let first = doc.create_element("p").await.unwrap();
	let second = doc.append_new(doc.body(), "span").await.unwrap();
	assert_ne!(first, second);

	assert!(matches!(doc.append_new(first, "not a tag").await, Err(DocumentError::Encode(_))));
	doc.remove(second).await.unwrap();
	let err = doc.append_new(second, "i").await.unwrap_err();
	assert!(matches!(err, DocumentError::Invariant(TreeError::Removed(id)) if id == second));
}
