// =============================================================================
// Binance REST API Client — HMAC-SHA256 signed requests
// =============================================================================
//
// SECURITY: The secret key is never logged or serialized.  Signed requests
// carry X-MBX-APIKEY as a header and a recvWindow of 5 000 ms to tolerate
// minor clock drift between the bot and the Binance servers.
//
// Public market-data endpoints (klines, ticker) work without credentials, so
// `fetch`, `predict` and `backtest` never need API keys.
// =============================================================================

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::market_data::{interval_ms, Candle};

type HmacSha256 = Hmac<Sha256>;

/// Default recv-window sent with every signed request (milliseconds).
const RECV_WINDOW: u64 = 5000;

/// Maximum klines per request allowed by the endpoint.
const KLINES_PAGE_LIMIT: u32 = 1000;

/// Request weight of one klines call at the maximum page size.
const KLINES_WEIGHT: u32 = 2;

const MAINNET_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";

/// Binance REST API client with HMAC-SHA256 request signing.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    base_url: String,
    client: reqwest::Client,
    limiter: RateLimitTracker,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `BinanceClient`.
    ///
    /// # Arguments
    /// * `api_key` — Binance API key (sent as a header, never in query params).
    /// * `secret`  — Binance secret key used exclusively for HMAC signing.
    /// * `testnet` — target the Spot testnet instead of the real exchange.
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>, testnet: bool) -> Self {
        let api_key = api_key.into();
        let secret = secret.into();

        let mut default_headers = HeaderMap::new();
        // The API key header is required for all signed endpoints.
        if let Ok(val) = HeaderValue::from_str(&api_key) {
            default_headers.insert("X-MBX-APIKEY", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        let base_url = if testnet { TESTNET_URL } else { MAINNET_URL };
        debug!(base_url, "BinanceClient initialised");

        Self {
            api_key,
            secret,
            base_url: base_url.to_string(),
            client,
            limiter: RateLimitTracker::new(),
        }
    }

    /// Client for public market-data endpoints only (no credentials).
    pub fn public() -> Self {
        Self::new("", "", false)
    }

    /// Build a client from environment credentials.
    ///
    /// Live mode reads `BINANCE_API_KEY` / `BINANCE_API_SECRET`; testnet mode
    /// reads `BINANCE_TESTNET_API_KEY` / `BINANCE_TESTNET_API_SECRET`.
    pub fn from_env(testnet: bool) -> Result<Self> {
        let (key_var, secret_var) = if testnet {
            ("BINANCE_TESTNET_API_KEY", "BINANCE_TESTNET_API_SECRET")
        } else {
            ("BINANCE_API_KEY", "BINANCE_API_SECRET")
        };

        let api_key = std::env::var(key_var)
            .with_context(|| format!("{key_var} is not set in the environment"))?;
        let secret = std::env::var(secret_var)
            .with_context(|| format!("{secret_var} is not set in the environment"))?;

        Ok(Self::new(api_key, secret, testnet))
    }

    // -------------------------------------------------------------------------
    // Signing helpers
    // -------------------------------------------------------------------------

    /// Produce an HMAC-SHA256 hex signature of `query`.
    pub fn sign(&self, query: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Current UNIX timestamp in milliseconds.
    pub fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as u64
    }

    /// Build the full query string for a signed request (appends timestamp,
    /// recvWindow, and signature).
    fn signed_query(&self, params: &str) -> String {
        let ts = Self::timestamp_ms();
        let base = if params.is_empty() {
            format!("timestamp={ts}&recvWindow={RECV_WINDOW}")
        } else {
            format!("{params}&timestamp={ts}&recvWindow={RECV_WINDOW}")
        };
        let sig = self.sign(&base);
        format!("{base}&signature={sig}")
    }

    /// Send a GET and parse the body as JSON, mirroring rate-limit headers.
    async fn get_json(&self, url: &str, what: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("{what} request failed"))?;

        self.limiter.update_from_headers(resp.headers());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {what} response"))?;

        if !status.is_success() {
            anyhow::bail!("Binance {what} returned {status}: {body}");
        }
        Ok(body)
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/ticker/price — latest trade price for `symbol`.
    #[instrument(skip(self), name = "binance::get_ticker_price")]
    pub async fn get_ticker_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        let body = self.get_json(&url, "GET /api/v3/ticker/price").await?;

        let price: f64 = body["price"]
            .as_str()
            .context("ticker response missing 'price'")?
            .parse()
            .context("ticker price is not a number")?;

        debug!(symbol, price, "ticker price fetched");
        Ok(price)
    }

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Returns a vector of [`Candle`] structs parsed from Binance's array-of-
    /// arrays response format.
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime — later elements are ignored.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );
        let body = self.get_json(&url, "GET /api/v3/klines").await?;
        Self::parse_klines(&body)
    }

    /// Download every kline between `start_ms` and now, paging through the
    /// endpoint at the maximum page size and honouring the weight budget.
    #[instrument(skip(self), name = "binance::get_klines_range")]
    pub async fn get_klines_range(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
    ) -> Result<Vec<Candle>> {
        let step = interval_ms(interval)
            .with_context(|| format!("unsupported kline interval '{interval}'"))?;

        let mut all = Vec::new();
        let mut cursor = start_ms;

        loop {
            self.limiter.acquire(KLINES_WEIGHT).await;

            let url = format!(
                "{}/api/v3/klines?symbol={}&interval={}&startTime={}&limit={}",
                self.base_url, symbol, interval, cursor, KLINES_PAGE_LIMIT
            );
            let body = self.get_json(&url, "GET /api/v3/klines").await?;
            let page = Self::parse_klines(&body)?;

            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            cursor = page.last().map(|c| c.open_time + step).unwrap_or(cursor);
            all.extend(page);

            debug!(
                symbol,
                fetched = all.len(),
                next_cursor = cursor,
                "kline page downloaded"
            );

            if page_len < KLINES_PAGE_LIMIT as usize {
                break;
            }
        }

        debug!(symbol, interval, count = all.len(), "kline range download complete");
        Ok(all)
    }

    // -------------------------------------------------------------------------
    // Account / balance
    // -------------------------------------------------------------------------

    /// GET /api/v3/account (signed).
    #[instrument(skip(self), name = "binance::get_account")]
    pub async fn get_account(&self) -> Result<serde_json::Value> {
        let qs = self.signed_query("");
        let url = format!("{}/api/v3/account?{}", self.base_url, qs);
        let body = self.get_json(&url, "GET /api/v3/account").await?;
        debug!("account info retrieved successfully");
        Ok(body)
    }

    /// Convenience: extract the free balance for a single `asset`.
    #[instrument(skip(self), name = "binance::get_balance")]
    pub async fn get_balance(&self, asset: &str) -> Result<f64> {
        let account = self.get_account().await?;

        let balances = account["balances"]
            .as_array()
            .context("account response missing 'balances' array")?;

        for b in balances {
            if b["asset"].as_str() == Some(asset) {
                let free: f64 = b["free"].as_str().unwrap_or("0").parse().unwrap_or(0.0);
                debug!(asset, free, "balance retrieved");
                return Ok(free);
            }
        }

        warn!(asset, "asset not found in balances — returning 0.0");
        Ok(0.0)
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// POST /api/v3/order (signed) — MARKET buy spending `quote_qty` of the
    /// quote currency (e.g. 20 USDT worth of BTC).
    #[instrument(skip(self), name = "binance::market_buy_quote")]
    pub async fn market_buy_quote(
        &self,
        symbol: &str,
        quote_qty: f64,
    ) -> Result<serde_json::Value> {
        let params = format!("symbol={symbol}&side=BUY&type=MARKET&quoteOrderQty={quote_qty:.2}");
        self.post_order(symbol, "BUY", &params).await
    }

    /// POST /api/v3/order (signed) — MARKET sell of `quantity` base units.
    ///
    /// Quantity is rounded to 6 decimals, the step size the original bot
    /// assumed for BTC pairs.
    #[instrument(skip(self), name = "binance::market_sell")]
    pub async fn market_sell(&self, symbol: &str, quantity: f64) -> Result<serde_json::Value> {
        let params = format!("symbol={symbol}&side=SELL&type=MARKET&quantity={quantity:.6}");
        self.post_order(symbol, "SELL", &params).await
    }

    async fn post_order(
        &self,
        symbol: &str,
        side: &str,
        params: &str,
    ) -> Result<serde_json::Value> {
        let qs = self.signed_query(params);
        let url = format!("{}/api/v3/order?{}", self.base_url, qs);

        debug!(symbol, side, "placing market order");

        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .context("POST /api/v3/order request failed")?;

        self.limiter.update_from_headers(resp.headers());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse order response")?;

        if !status.is_success() {
            anyhow::bail!("Binance POST /api/v3/order returned {status}: {body}");
        }

        debug!(symbol, side, "market order accepted");
        Ok(body)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
        let raw = body.as_array().context("klines response is not an array")?;

        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = entry.as_array().context("kline entry is not an array")?;

            if arr.len() < 7 {
                warn!("skipping malformed kline entry with {} elements", arr.len());
                continue;
            }

            let open_time = arr[0].as_i64().unwrap_or(0);
            let open = Self::parse_str_f64(&arr[1])?;
            let high = Self::parse_str_f64(&arr[2])?;
            let low = Self::parse_str_f64(&arr[3])?;
            let close = Self::parse_str_f64(&arr[4])?;
            let volume = Self::parse_str_f64(&arr[5])?;
            let close_time = arr[6].as_i64().unwrap_or(0);

            candles.push(Candle::new(open_time, open, high, low, close, volume, close_time));
        }

        Ok(candles)
    }

    /// Parse a JSON value that may be either a string or a number into `f64`.
    fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
        if let Some(s) = val.as_str() {
            s.parse::<f64>()
                .with_context(|| format!("failed to parse '{s}' as f64"))
        } else if let Some(n) = val.as_f64() {
            Ok(n)
        } else {
            anyhow::bail!("expected string or number, got: {val}")
        }
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
