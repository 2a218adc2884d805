//! The outbound payment-provider seam.

use std::future::Future;

use crate::Result;

/// Invoice creation request. `external_id` is the deposit record's own id and
/// is echoed back in webhook notifications as the correlation key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub currency: String,
    pub network: String,
    pub fiat_amount: u64,
    pub external_id: String,
    pub callback_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceDetails {
    pub invoice_id: String,
    pub deposit_address: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutRequest {
    pub network: String,
    pub amount: u64,
    pub destination: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutAccepted {
    pub task_id: String,
}

/// Outbound calls to the payment provider. One call per operation; webhook
/// consumption never re-enters these synchronously.
pub trait PaymentProvider {
    fn create_invoice(
        &self,
        request: InvoiceRequest,
    ) -> impl Future<Output = Result<InvoiceDetails>> + Send;

    fn create_payout(
        &self,
        request: PayoutRequest,
    ) -> impl Future<Output = Result<PayoutAccepted>> + Send;
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockProvider;

#[cfg(any(test, feature = "mocks"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{InvoiceDetails, InvoiceRequest, PayoutAccepted, PayoutRequest, PaymentProvider};
    use crate::Result;

    /// Scripted provider for tests: queued responses, recorded calls.
    #[derive(Default)]
    pub struct MockProvider {
        invoice_results: Mutex<VecDeque<Result<InvoiceDetails>>>,
        payout_results: Mutex<VecDeque<Result<PayoutAccepted>>>,
        pub invoice_calls: Mutex<Vec<InvoiceRequest>>,
        pub payout_calls: Mutex<Vec<PayoutRequest>>,
    }

    impl MockProvider {
        pub fn push_invoice_result(&self, result: Result<InvoiceDetails>) {
            self.invoice_results.lock().unwrap().push_back(result);
        }

        pub fn push_payout_result(&self, result: Result<PayoutAccepted>) {
            self.payout_results.lock().unwrap().push_back(result);
        }
    }

    impl PaymentProvider for MockProvider {
        async fn create_invoice(&self, request: InvoiceRequest) -> Result<InvoiceDetails> {
            self.invoice_calls.lock().unwrap().push(request);
            self.invoice_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted invoice result")
        }

        async fn create_payout(&self, request: PayoutRequest) -> Result<PayoutAccepted> {
            self.payout_calls.lock().unwrap().push(request);
            self.payout_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted payout result")
        }
    }
}
