use async_trait::async_trait;
use chrono::{DateTime, Utc};
use esg_core::{EsgRiskScores, FinancialSnapshot, SimulationError, SnapshotSource};
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://query2.finance.yahoo.com";
const MODULES: &str = "esgScores,balanceSheetHistory,incomeStatementHistory,cashflowStatementHistory";
const MAX_ATTEMPTS: u32 = 3;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Yahoo slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Fetches statement line items and ESG risk scores from the quote-summary endpoint.
#[derive(Clone)]
pub struct YahooFinanceClient {
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
    retry_wait: Duration,
}

impl YahooFinanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let rate_limit: usize = std::env::var("YAHOO_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (esg-whatif)")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
            retry_wait: Duration::from_secs(15),
        }
    }

    /// Base URL from `YAHOO_BASE_URL`, falling back to the public endpoint.
    pub fn from_env() -> Self {
        Self::new(std::env::var("YAHOO_BASE_URL").unwrap_or_else(|_| BASE_URL.to_string()))
    }

    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        symbol: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SimulationError> {
        let request = builder
            .build()
            .map_err(|e| SimulationError::data_unavailable(symbol, e.to_string()))?;

        for attempt in 0..MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| SimulationError::data_unavailable(symbol, "cannot clone request"))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| SimulationError::data_unavailable(symbol, e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }
            if attempt + 1 == MAX_ATTEMPTS {
                break;
            }

            tracing::warn!(
                "Yahoo 429 rate limited, waiting {}s before retry {}/{}",
                self.retry_wait.as_secs(),
                attempt + 1,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(self.retry_wait).await;
        }

        Err(SimulationError::data_unavailable(
            symbol,
            format!("rate limited after {} attempts", MAX_ATTEMPTS),
        ))
    }

    /// Raw quote-summary payload for the modules the simulator needs
    pub async fn get_quote_summary(&self, symbol: &str) -> Result<Value, SimulationError> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);

        let response = self
            .send_request(symbol, self.client.get(&url).query(&[("modules", MODULES)]))
            .await?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| SimulationError::data_unavailable(symbol, format!("HTTP {}: {}", status, e)))?;

        if !status.is_success() {
            let description = body
                .pointer("/quoteSummary/error/description")
                .and_then(|v| v.as_str())
                .unwrap_or("request failed")
                .to_string();
            return Err(SimulationError::data_unavailable(
                symbol,
                format!("HTTP {}: {}", status, description),
            ));
        }

        Ok(body)
    }

    pub async fn get_snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, SimulationError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(SimulationError::data_unavailable("<empty>", "missing symbol"));
        }
        if !is_valid_ticker(&symbol) {
            return Err(SimulationError::data_unavailable(symbol, "invalid ticker symbol"));
        }
        let body = self.get_quote_summary(&symbol).await?;
        let snapshot = parse_quote_summary(&symbol, &body)?;
        tracing::info!(
            "{}: fetched snapshot (assets={:.0}, revenue={:.0}, esg={:.1}/{:.1}/{:.1})",
            symbol,
            snapshot.total_assets,
            snapshot.revenue,
            snapshot.esg_risk.environmental,
            snapshot.esg_risk.social,
            snapshot.esg_risk.governance
        );
        Ok(snapshot)
    }
}

/// Tickers are placed in the URL path, so only Yahoo's symbol alphabet is
/// accepted (`BRK-B`, `^GSPC`, `EURUSD=X`, `VOD.L`).
fn is_valid_ticker(symbol: &str) -> bool {
    symbol
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '^' | '=' | '-'))
}

/// `{"raw": 123.0, "fmt": "123"}` -> 123.0
fn raw(node: &Value, key: &str) -> Option<f64> {
    node.get(key).and_then(|v| v.get("raw")).and_then(|v| v.as_f64())
}

/// Most recent statement of a history module (Yahoo lists newest first)
fn latest<'a>(result: &'a Value, module: &str, list: &str) -> Option<&'a Value> {
    result.get(module)?.get(list)?.as_array()?.first()
}

/// Build a snapshot from a quote-summary payload. Every field is required;
/// nothing is defaulted.
pub fn parse_quote_summary(symbol: &str, body: &Value) -> Result<FinancialSnapshot, SimulationError> {
    let result = body
        .pointer("/quoteSummary/result/0")
        .ok_or_else(|| SimulationError::data_unavailable(symbol, "empty quote summary"))?;

    let esg = result
        .get("esgScores")
        .ok_or_else(|| SimulationError::data_unavailable(symbol, "no ESG data available"))?;
    let balance = latest(result, "balanceSheetHistory", "balanceSheetStatements")
        .ok_or_else(|| SimulationError::data_unavailable(symbol, "no balance sheet"))?;
    let income = latest(result, "incomeStatementHistory", "incomeStatementHistory")
        .ok_or_else(|| SimulationError::data_unavailable(symbol, "no income statement"))?;
    let cash_flow = latest(result, "cashflowStatementHistory", "cashflowStatements")
        .ok_or_else(|| SimulationError::data_unavailable(symbol, "no cash flow statement"))?;

    let field = |node: &Value, key: &str| {
        raw(node, key).ok_or_else(|| SimulationError::data_unavailable(symbol, format!("missing {}", key)))
    };

    let as_of = raw(balance, "endDate")
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0))
        .unwrap_or_else(Utc::now);

    let snapshot = FinancialSnapshot {
        symbol: symbol.to_string(),
        as_of,
        total_assets: field(balance, "totalAssets")?,
        total_liabilities: field(balance, "totalLiab")?,
        revenue: field(income, "totalRevenue")?,
        net_income: field(income, "netIncome")?,
        operating_cash_flow: field(cash_flow, "totalCashFromOperatingActivities")?,
        capital_expenditure: field(cash_flow, "capitalExpenditures")?,
        esg_risk: EsgRiskScores {
            environmental: field(esg, "environmentScore")?,
            social: field(esg, "socialScore")?,
            governance: field(esg, "governanceScore")?,
        },
    };
    snapshot.validate()?;
    Ok(snapshot)
}

#[async_trait]
impl SnapshotSource for YahooFinanceClient {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, SimulationError> {
        self.get_snapshot(symbol).await
    }

    fn source_name(&self) -> &'static str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> Value {
        json!({
            "quoteSummary": {
                "result": [{
                    "esgScores": {
                        "environmentScore": {"raw": 30.0, "fmt": "30"},
                        "socialScore": {"raw": 40.0, "fmt": "40"},
                        "governanceScore": {"raw": 20.0, "fmt": "20"}
                    },
                    "balanceSheetHistory": {
                        "balanceSheetStatements": [
                            {"endDate": {"raw": 1727654400}, "totalAssets": {"raw": 1000.0}, "totalLiab": {"raw": 400.0}},
                            {"endDate": {"raw": 1696032000}, "totalAssets": {"raw": 900.0}, "totalLiab": {"raw": 380.0}}
                        ]
                    },
                    "incomeStatementHistory": {
                        "incomeStatementHistory": [
                            {"totalRevenue": {"raw": 500.0}, "netIncome": {"raw": 50.0}}
                        ]
                    },
                    "cashflowStatementHistory": {
                        "cashflowStatements": [
                            {"totalCashFromOperatingActivities": {"raw": 60.0}, "capitalExpenditures": {"raw": -20.0}}
                        ]
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_parse_uses_latest_period() {
        let snap = parse_quote_summary("ACME", &payload()).unwrap();
        assert_eq!(snap.total_assets, 1000.0);
        assert_eq!(snap.total_liabilities, 400.0);
        assert_eq!(snap.revenue, 500.0);
        assert_eq!(snap.capital_expenditure, -20.0);
        assert_eq!(snap.esg_risk.governance, 20.0);
        assert_eq!(snap.as_of.timestamp(), 1727654400);
    }

    #[test]
    fn test_parse_without_esg_coverage() {
        let mut body = payload();
        body["quoteSummary"]["result"][0]
            .as_object_mut()
            .unwrap()
            .remove("esgScores");
        match parse_quote_summary("ACME", &body) {
            Err(SimulationError::DataUnavailable { reason, .. }) => assert!(reason.contains("ESG")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_line_item() {
        let mut body = payload();
        body["quoteSummary"]["result"][0]["cashflowStatementHistory"]["cashflowStatements"][0]
            .as_object_mut()
            .unwrap()
            .remove("capitalExpenditures");
        match parse_quote_summary("ACME", &body) {
            Err(SimulationError::DataUnavailable { reason, .. }) => {
                assert_eq!(reason, "missing capitalExpenditures")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/ACME"))
            .and(query_param("modules", MODULES))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
            .mount(&server)
            .await;

        let client = YahooFinanceClient::new(server.uri());
        let snap = client.fetch_snapshot("acme").await.unwrap();
        assert_eq!(snap.symbol, "ACME");
        assert_eq!(snap.net_income, 50.0);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/NOPE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "quoteSummary": {
                    "result": null,
                    "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: NOPE"}
                }
            })))
            .mount(&server)
            .await;

        let client = YahooFinanceClient::new(server.uri());
        match client.fetch_snapshot("NOPE").await {
            Err(SimulationError::DataUnavailable { symbol, reason }) => {
                assert_eq!(symbol, "NOPE");
                assert!(reason.contains("Quote not found"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        // Three attempts wait twice; there is no wait after the final 429
        let client = YahooFinanceClient::new(server.uri()).with_retry_wait(Duration::from_secs(1));
        let started = std::time::Instant::now();
        let err = client.fetch_snapshot("ACME").await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, SimulationError::DataUnavailable { .. }));
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2900), "waited {:?}", elapsed);
    }

    #[test]
    fn test_ticker_alphabet() {
        for ok in ["AAPL", "BRK-B", "BRK.B", "^GSPC", "EURUSD=X", "VOD.L", "7203.T"] {
            assert!(is_valid_ticker(ok), "{}", ok);
        }
        for bad in ["../V7/FINANCE", "A?X=", "A/B", "A B", "A%2F", "A#"] {
            assert!(!is_valid_ticker(bad), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_invalid_symbol_never_reaches_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
            .expect(0)
            .mount(&server)
            .await;

        let client = YahooFinanceClient::new(server.uri());
        for symbol in ["../v7/finance/quote", "A?x="] {
            match client.fetch_snapshot(symbol).await {
                Err(SimulationError::DataUnavailable { reason, .. }) => {
                    assert_eq!(reason, "invalid ticker symbol")
                }
                other => panic!("unexpected: {:?}", other),
            }
        }
    }
}
