use anyhow::anyhow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::record::PartialRecord;
use crate::sources::{Source, SourceFuture, SourceRole};

#[derive(Clone)]
pub(crate) enum Behavior {
    Answer(PartialRecord),
    Missing,
    Fail,
}

/// In-process source that answers with a canned result and counts calls.
#[derive(Clone)]
pub(crate) struct TestSource {
    name: &'static str,
    role: SourceRole,
    behavior: Behavior,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl TestSource {
    pub(crate) fn new(name: &'static str, role: SourceRole, behavior: Behavior) -> Self {
        Self {
            name,
            role,
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Source for TestSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn attempt(&self, _word: &str) -> SourceFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.clone();
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match behavior {
                Behavior::Answer(partial) => Ok(Some(partial)),
                Behavior::Missing => Ok(None),
                Behavior::Fail => Err(anyhow!("connection refused")),
            }
        })
    }
}

pub(crate) fn dictionary(behavior: Behavior) -> TestSource {
    TestSource::new("test_dictionary", SourceRole::Dictionary, behavior)
}

pub(crate) fn translator(behavior: Behavior) -> TestSource {
    TestSource::new("test_translator", SourceRole::Translation, behavior)
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub(crate) async fn serve_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve stub");
    });
    format!("http://{}", addr)
}
