//! In-memory provider and chooser doubles for wallet tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::network::{hex_chain_id, parse_chain_id};

use super::chooser::ProviderChooser;
use super::provider::{ProviderError, ProviderEvent, WalletProvider, PRIMARY_PROVIDER_URL};

/// Scriptable provider
///
/// `wallet_*` requests are answered from a queue of canned responses; a
/// successful answer moves the provider onto the requested chain.
pub(crate) struct MockProvider {
    chain_id: Mutex<u64>,
    accounts: Vec<String>,
    name: Option<String>,
    name_lookup_fails: bool,
    connection_url: String,
    wallet_responses: Mutex<VecDeque<std::result::Result<Value, ProviderError>>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockProvider {
    pub fn new(chain_id: u64, account: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            chain_id: Mutex::new(chain_id),
            accounts: vec![account.to_string()],
            name: None,
            name_lookup_fails: false,
            connection_url: PRIMARY_PROVIDER_URL.to_string(),
            wallet_responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn with_switch_responses(
        self,
        responses: Vec<std::result::Result<Value, ProviderError>>,
    ) -> Self {
        *self.wallet_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_failing_name_lookup(mut self) -> Self {
        self.name_lookup_fails = true;
        self
    }

    pub fn with_connection_url(mut self, url: &str) -> Self {
        self.connection_url = url.to_string();
        self
    }

    pub fn without_accounts(mut self) -> Self {
        self.accounts.clear();
        self
    }

    pub fn current_chain(&self) -> u64 {
        *self.chain_id.lock().unwrap()
    }

    /// Requests other than plain reads, in call order
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(method, _)| method).collect()
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    async fn request(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<Value, ProviderError> {
        match method {
            "eth_chainId" => Ok(json!(hex_chain_id(self.current_chain()))),
            "eth_accounts" => Ok(json!(self.accounts)),
            _ => {
                self.calls
                    .lock()
                    .unwrap()
                    .push((method.to_string(), params.clone()));

                let response = self
                    .wallet_responses
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| {
                        Err(ProviderError::Rpc {
                            code: 4200,
                            message: format!("Unsupported method {}", method),
                        })
                    });

                if response.is_ok() {
                    if let Some(chain_id) = params[0]["chainId"].as_str().and_then(parse_chain_id) {
                        *self.chain_id.lock().unwrap() = chain_id;
                    }
                }
                response
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn connection_url(&self) -> &str {
        &self.connection_url
    }

    async fn lookup_address(
        &self,
        _address: &str,
    ) -> std::result::Result<Option<String>, ProviderError> {
        if self.name_lookup_fails {
            return Err(ProviderError::Transport("name service unreachable".to_string()));
        }
        Ok(self.name.clone())
    }
}

/// Chooser handing out providers in order, repeating the last one
///
/// An empty chooser behaves like a dismissed selection prompt.
pub(crate) struct MockChooser {
    providers: Mutex<VecDeque<Arc<MockProvider>>>,
    cached: AtomicBool,
    pub connects: AtomicUsize,
    pub clears: AtomicUsize,
    clear_delay: Option<std::time::Duration>,
}

impl MockChooser {
    pub fn new(provider: Arc<MockProvider>) -> Self {
        Self::sequence(vec![provider])
    }

    pub fn sequence(providers: Vec<Arc<MockProvider>>) -> Self {
        Self {
            providers: Mutex::new(providers.into()),
            cached: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            clear_delay: None,
        }
    }

    pub fn dismissed() -> Self {
        Self::sequence(Vec::new())
    }

    pub fn with_cached_selection(self) -> Self {
        self.cached.store(true, Ordering::SeqCst);
        self
    }

    /// Clearing blocks the calling thread, like a slow disk would
    pub fn with_slow_clear(mut self, delay: std::time::Duration) -> Self {
        self.clear_delay = Some(delay);
        self
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderChooser for MockChooser {
    async fn connect(&self) -> Result<Arc<dyn WalletProvider>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let provider = {
            let mut providers = self.providers.lock().unwrap();
            if providers.len() > 1 {
                providers.pop_front()
            } else {
                providers.front().cloned()
            }
        };

        match provider {
            Some(provider) => {
                self.cached.store(true, Ordering::SeqCst);
                Ok(provider)
            }
            None => Err(Error::ConnectionAborted("modal closed by user".to_string())),
        }
    }

    fn clear_cached_selection(&self) {
        if let Some(delay) = self.clear_delay {
            std::thread::sleep(delay);
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.cached.store(false, Ordering::SeqCst);
    }

    fn has_cached_selection(&self) -> bool {
        self.cached.load(Ordering::SeqCst)
    }
}

/// Minimal JSON-RPC over HTTP endpoint answering every call through `respond`
///
/// Returns the endpoint URL. The listener lives until the runtime shuts down.
pub(crate) async fn canned_rpc<F>(respond: F) -> String
where
    F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
{
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read);

                // One request per iteration on a keep-alive connection
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }

                    let mut content_length = 0usize;
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                            return;
                        }
                        let header = line.trim_end();
                        if header.is_empty() {
                            break;
                        }
                        if let Some((key, value)) = header.split_once(':') {
                            if key.eq_ignore_ascii_case("content-length") {
                                content_length = value.trim().parse().unwrap_or(0);
                            }
                        }
                    }

                    let mut body = vec![0u8; content_length];
                    if reader.read_exact(&mut body).await.is_err() {
                        return;
                    }
                    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                    let result = respond(request["method"].as_str().unwrap_or_default(), &request["params"]);

                    let payload = json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }).to_string();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                        payload.len(),
                        payload
                    );
                    if write.write_all(response.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    endpoint
}
