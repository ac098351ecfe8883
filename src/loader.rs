//! Player bootstrap script loader.
//!
//! The embedded player needs its bootstrap script before any player can be
//! constructed. Loading is memoized: the first caller starts the fetch and
//! every later caller awaits the same in-flight (or finished) load. A failed
//! load stays cached until [`BootstrapLoader::reset`].

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info};

use crate::Result;

/// A fetched bootstrap script
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapScript {
    pub url: String,
    pub source: String,
}

type LoadFuture = BoxFuture<'static, Result<Arc<BootstrapScript>>>;

/// Where the bootstrap script comes from
pub trait ScriptSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'static, Result<BootstrapScript>>;
}

/// A script known up front (offline use, builds without the `http` feature)
pub struct InlineScriptSource {
    script: BootstrapScript,
}

impl InlineScriptSource {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        InlineScriptSource {
            script: BootstrapScript {
                url: url.into(),
                source: source.into(),
            },
        }
    }
}

impl ScriptSource for InlineScriptSource {
    fn fetch(&self) -> BoxFuture<'static, Result<BootstrapScript>> {
        let script = self.script.clone();
        async move { Ok(script) }.boxed()
    }
}

#[cfg(feature = "http")]
pub use http::HttpScriptSource;

#[cfg(feature = "http")]
mod http {
    use super::{BootstrapScript, ScriptSource};
    use crate::{Error, Result, TrackerConfig};
    use futures::future::{BoxFuture, FutureExt};
    use reqwest::Client;
    use std::time::Duration;

    /// Fetches the bootstrap script over HTTP(S)
    pub struct HttpScriptSource {
        client: Client,
        url: String,
    }

    impl HttpScriptSource {
        pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self {
                client,
                url: url.into(),
            })
        }

        pub fn from_config(config: &TrackerConfig) -> Result<Self> {
            Self::new(config.bootstrap_url.clone(), config.bootstrap_timeout_ms)
        }
    }

    impl ScriptSource for HttpScriptSource {
        fn fetch(&self) -> BoxFuture<'static, Result<BootstrapScript>> {
            let client = self.client.clone();
            let url = self.url.clone();
            async move {
                let resp = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| Error::BootstrapError(format!("Failed to fetch {}: {}", url, e)))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(Error::BootstrapError(format!("{} returned HTTP {}", url, status)));
                }
                let source = resp
                    .text()
                    .await
                    .map_err(|e| Error::BootstrapError(format!("Failed to read response body: {}", e)))?;
                Ok(BootstrapScript { url, source })
            }
            .boxed()
        }
    }
}

/// Init-once loader with an explicit reset.
pub struct BootstrapLoader {
    source: Arc<dyn ScriptSource>,
    inflight: Mutex<Option<Shared<LoadFuture>>>,
}

impl BootstrapLoader {
    pub fn new(source: Arc<dyn ScriptSource>) -> Self {
        BootstrapLoader {
            source,
            inflight: Mutex::new(None),
        }
    }

    /// Loader backed by the configured bootstrap URL
    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::TrackerConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpScriptSource::from_config(config)?)))
    }

    /// Load the script, or join the load already in progress.
    pub async fn load(&self) -> Result<Arc<BootstrapScript>> {
        let fut = {
            let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(f) => f.clone(),
                None => {
                    debug!("starting bootstrap load");
                    let fetch = self.source.fetch();
                    let f: LoadFuture = async move {
                        let script = fetch.await?;
                        info!("bootstrap script loaded from {} ({} bytes)", script.url, script.source.len());
                        Ok(Arc::new(script))
                    }
                    .boxed();
                    let shared = f.shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };
        fut.await
    }

    /// Whether a load has completed successfully
    pub fn is_loaded(&self) -> bool {
        let slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        matches!(slot.as_ref().and_then(|f| f.peek()), Some(Ok(_)))
    }

    /// Forget any cached or in-flight load so the next `load` starts over.
    pub fn reset(&self) {
        let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ScriptSource for CountingSource {
        fn fetch(&self) -> BoxFuture<'static, Result<BootstrapScript>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                if fail {
                    Err(Error::BootstrapError(format!("attempt {} failed", n)))
                } else {
                    Ok(BootstrapScript {
                        url: "test://bootstrap".into(),
                        source: "window.YT = {}".into(),
                    })
                }
            }
            .boxed()
        }
    }

    fn loader(fail: bool) -> (BootstrapLoader, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            calls: calls.clone(),
            fail,
        };
        (BootstrapLoader::new(Arc::new(source)), calls)
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let (l, calls) = loader(false);
        let (a, b) = tokio::join!(l.load(), l.load());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(l.is_loaded());
        l.load().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_cached_until_reset() {
        let (l, calls) = loader(true);
        let first = l.load().await.unwrap_err();
        let second = l.load().await.unwrap_err();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!l.is_loaded());

        l.reset();
        let third = l.load().await.unwrap_err();
        assert_eq!(third, Error::BootstrapError("attempt 1 failed".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inline_source_loads_immediately() {
        let l = BootstrapLoader::new(Arc::new(InlineScriptSource::new("inline", "ok")));
        let s = l.load().await.unwrap();
        assert_eq!(s.source, "ok");
    }
}
