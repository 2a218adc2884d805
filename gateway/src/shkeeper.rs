//! SHKeeper HTTP client.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::provider::{
    InvoiceDetails, InvoiceRequest, PayoutAccepted, PayoutRequest, PaymentProvider,
};
use crate::{Error, Result};

/// Header carrying the API key on outbound calls and webhook callbacks.
pub const API_KEY_HEADER: &str = "X-Shkeeper-Api-Key";

#[derive(Clone)]
pub struct ShkeeperClient {
    base_url: Url,
    api_key: String,
    callback_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct InvoiceBody<'a> {
    external_id: &'a str,
    fiat: &'a str,
    amount: u64,
    network: &'a str,
    callback_url: &'a str,
}

#[derive(Deserialize)]
struct InvoiceResponse {
    id: String,
    wallet: String,
}

#[derive(Serialize)]
struct PayoutBody<'a> {
    amount: u64,
    address: &'a str,
    network: &'a str,
}

#[derive(Deserialize)]
struct PayoutResponse {
    task_id: String,
}

impl ShkeeperClient {
    pub fn new(base_url: &str, api_key: String, callback_url: String) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            base_url,
            api_key,
            callback_url,
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, crypto: &str, suffix: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("api/v1/{crypto}/{suffix}"))?)
    }

    async fn check<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider { status, body });
        }
        Ok(response.json::<T>().await?)
    }
}

impl PaymentProvider for ShkeeperClient {
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<InvoiceDetails> {
        let url = self.endpoint(&request.currency, "payment-request")?;
        debug!(%url, external_id = %request.external_id, "creating provider invoice");
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&InvoiceBody {
                external_id: &request.external_id,
                fiat: "USD",
                amount: request.fiat_amount,
                network: &request.network,
                callback_url: &self.callback_url,
            })
            .send()
            .await?;
        let invoice: InvoiceResponse = Self::check(response).await?;
        Ok(InvoiceDetails {
            invoice_id: invoice.id,
            deposit_address: invoice.wallet,
        })
    }

    async fn create_payout(&self, request: PayoutRequest) -> Result<PayoutAccepted> {
        let url = self.endpoint(&request.network, "payout")?;
        debug!(%url, amount = request.amount, "creating provider payout task");
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&PayoutBody {
                amount: request.amount,
                address: &request.destination,
                network: &request.network,
            })
            .send()
            .await?;
        let payout: PayoutResponse = Self::check(response).await?;
        Ok(PayoutAccepted {
            task_id: payout.task_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = ShkeeperClient::new(
            "https://shkeeper.example/",
            "key".to_string(),
            "https://toto.example/webhooks/shkeeper".to_string(),
        )
        .unwrap();
        let url = client.endpoint("BTC", "payment-request").unwrap();
        assert_eq!(
            url.as_str(),
            "https://shkeeper.example/api/v1/BTC/payment-request"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(ShkeeperClient::new(
            "not a url",
            "key".to_string(),
            "cb".to_string()
        )
        .is_err());
    }
}
