//! Polymarket CLOB adapter: the production [`ExchangeClient`] and
//! [`MarketInfoSource`] implementation, built on a `reqwest`-based REST
//! client and a `tokio-tungstenite` websocket feed.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::core::domain::{ConditionId, OrderBookLevel, OrderId, OrderStatus, Outcome, TokenId};

use super::{
    ExchangeClient, ExchangeConfig, ExchangeError, ExchangeResult, MarketDataFeed, MarketEvent, MarketInfoSource,
    MarketResolution, OrderRequest, OrderSnapshot, RedemptionClient, RedemptionReceipt,
};

pub struct PolymarketConfig {
    pub api_url: Url,
    pub timeout: StdDuration,
}

pub struct PolymarketClient {
    http: Client,
    config: PolymarketConfig,
}

impl PolymarketClient {
    #[must_use]
    pub fn new(config: PolymarketConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self { http, config }
    }
}

#[derive(Debug, Deserialize)]
struct PostOrderResponse {
    #[serde(rename = "orderID")]
    order_id: String,
    status: String,
}

fn map_status(raw: &str) -> OrderStatus {
    match raw {
        "matched" | "filled" => OrderStatus::Filled,
        "live" | "open" => OrderStatus::Open,
        "delayed" | "unmatched" => OrderStatus::Submitted,
        "cancelled" | "canceled" => OrderStatus::Cancelled,
        _ => OrderStatus::Submitted,
    }
}

#[async_trait]
impl ExchangeClient for PolymarketClient {
    async fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<OrderSnapshot> {
        let url = self
            .config
            .api_url
            .join("order")
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({
                "tokenID": request.token_id.as_str(),
                "side": "BUY",
                "price": request.price.to_string(),
                "size": request.size.to_string(),
                "clientOrderId": request.client_order_id.as_str(),
            }))
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExchangeError::Rejected(format!("http {}", response.status())));
        }
        let body: PostOrderResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        debug!(order_id = %body.order_id, status = %body.status, "order submitted");
        Ok(OrderSnapshot {
            order_id: OrderId::new(body.order_id),
            status: map_status(&body.status),
            filled_size: Decimal::ZERO,
            fills: Vec::new(),
        })
    }

    async fn poll_order(&self, order_id: &OrderId) -> ExchangeResult<OrderSnapshot> {
        let url = self
            .config
            .api_url
            .join(&format!("order/{}", order_id.as_str()))
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ExchangeError::NotFound(order_id.clone()));
        }
        let body: PostOrderResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        Ok(OrderSnapshot {
            order_id: order_id.clone(),
            status: map_status(&body.status),
            filled_size: Decimal::ZERO,
            fills: Vec::new(),
        })
    }

    async fn cancel_order(&self, order_id: &OrderId) -> ExchangeResult<()> {
        let url = self
            .config
            .api_url
            .join(&format!("order/{}", order_id.as_str()))
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            warn!(order_id = %order_id, status = %response.status(), "cancel request failed");
        }
        Ok(())
    }

    async fn top_of_book(&self, token_id: &TokenId) -> ExchangeResult<(Option<Decimal>, Option<Decimal>)> {
        let url = self
            .config
            .api_url
            .join(&format!("book?token_id={}", token_id.as_str()))
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        #[derive(Deserialize)]
        struct TopOfBook {
            best_bid: Option<Decimal>,
            best_ask: Option<Decimal>,
        }
        let body: TopOfBook = response
            .json()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        Ok((body.best_bid, body.best_ask))
    }
}

#[async_trait]
impl MarketInfoSource for PolymarketClient {
    async fn resolution(&self, condition_id: &ConditionId) -> ExchangeResult<MarketResolution> {
        let url = self
            .config
            .api_url
            .join(&format!("markets/{}", condition_id.as_str()))
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        #[derive(Deserialize)]
        struct MarketStatus {
            resolved: bool,
            winning_outcome: Option<String>,
        }
        let body: MarketStatus = response
            .json()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        if !body.resolved {
            return Ok(MarketResolution::Unresolved);
        }
        let outcome = match body.winning_outcome.as_deref() {
            Some(name) if name.eq_ignore_ascii_case("yes") => Outcome::Yes,
            Some(name) if name.eq_ignore_ascii_case("no") => Outcome::No,
            _ => return Ok(MarketResolution::Unresolved),
        };
        Ok(MarketResolution::Resolved(outcome))
    }
}

#[derive(Debug, Deserialize)]
struct RedeemResponse {
    success: bool,
    #[serde(rename = "txHash")]
    tx_hash: Option<String>,
}

/// On-chain redemption is front-ended by an HTTP relay service rather
/// than embedded chain-signing logic in this process.
#[async_trait]
impl RedemptionClient for PolymarketClient {
    async fn redeem(&self, condition_id: &ConditionId, token_id: &TokenId) -> ExchangeResult<RedemptionReceipt> {
        let url = self
            .config
            .api_url
            .join("redeem")
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({
                "conditionId": condition_id.as_str(),
                "tokenId": token_id.as_str(),
                "indexSets": [1, 2],
            }))
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExchangeError::Transport(format!("http {}", response.status())));
        }
        let body: RedeemResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        Ok(RedemptionReceipt {
            success: body.success,
            tx_hash: body.tx_hash,
            submitted_at: chrono::Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
enum WsMessage {
    PriceChange {
        asset_id: String,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
    },
    Book {
        asset_id: String,
        bids: Vec<WsLevel>,
        asks: Vec<WsLevel>,
    },
}

#[derive(Debug, Deserialize)]
struct WsLevel {
    price: Decimal,
    size: Decimal,
}

/// Real-time market data over Polymarket's WebSocket feed: connects
/// lazily on first subscribe and keeps the connection for the life of
/// the feed.
pub struct PolymarketFeed {
    url: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl PolymarketFeed {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self { url, stream: None }
    }

    async fn ensure_connected(&mut self) -> ExchangeResult<&mut WebSocketStream<MaybeTlsStream<TcpStream>>> {
        if self.stream.is_none() {
            let (ws, _) = connect_async(&self.url).await.map_err(|e| ExchangeError::Transport(e.to_string()))?;
            self.stream = Some(ws);
        }
        Ok(self.stream.as_mut().expect("just set"))
    }
}

#[async_trait]
impl MarketDataFeed for PolymarketFeed {
    async fn subscribe(&mut self, yes_token_id: &TokenId, no_token_id: &TokenId) -> ExchangeResult<()> {
        let assets = serde_json::json!({
            "type": "market",
            "assets_ids": [yes_token_id.as_str(), no_token_id.as_str()],
        });
        let stream = self.ensure_connected().await?;
        stream
            .send(Message::Text(assets.to_string()))
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn unsubscribe(&mut self, yes_token_id: &TokenId, no_token_id: &TokenId) -> ExchangeResult<()> {
        let assets = serde_json::json!({
            "type": "unsubscribe",
            "assets_ids": [yes_token_id.as_str(), no_token_id.as_str()],
        });
        let stream = self.ensure_connected().await?;
        stream
            .send(Message::Text(assets.to_string()))
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<MarketEvent> {
        loop {
            let stream = self.stream.as_mut()?;
            let message = stream.next().await?;
            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "websocket read error, closing feed");
                    return None;
                }
            };
            let Message::Text(text) = message else {
                continue;
            };
            let parsed: Result<WsMessage, _> = serde_json::from_str(&text);
            let Ok(parsed) = parsed else {
                debug!(raw = %text, "ignoring unrecognized websocket message");
                continue;
            };
            return Some(match parsed {
                WsMessage::PriceChange {
                    asset_id,
                    best_bid,
                    best_ask,
                } => MarketEvent::PriceUpdate {
                    token_id: TokenId::new(asset_id),
                    best_bid,
                    best_ask,
                },
                WsMessage::Book { asset_id, bids, asks } => MarketEvent::BookSnapshot {
                    token_id: TokenId::new(asset_id),
                    bids: bids.into_iter().map(|l| OrderBookLevel::new(l.price, l.size)).collect(),
                    asks: asks.into_iter().map(|l| OrderBookLevel::new(l.price, l.size)).collect(),
                },
            });
        }
    }
}

pub struct Polymarket;

impl ExchangeConfig for Polymarket {
    fn name(&self) -> &'static str {
        "polymarket"
    }

    fn default_payout(&self) -> Decimal {
        rust_decimal_macros::dec!(1.00)
    }
}

pub type SharedExchangeClient = Arc<dyn ExchangeClient>;
