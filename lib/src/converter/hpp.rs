use crate::client::hpp::{HppOptions, MerchantUrls};
use crate::client::HostedPaymentPage;
use crate::Result;

use super::{CallbackUrls, HostedPaymentPageConverter};

/// Default [`HostedPaymentPageConverter`], applying the page options from
/// the configuration.
#[derive(Clone, Debug, Default)]
pub struct DefaultHostedPaymentPageConverter {
    options: Option<HppOptions>,
    profile_id: Option<String>,
}

impl DefaultHostedPaymentPageConverter {
    pub fn new(options: Option<HppOptions>, profile_id: Option<String>) -> Self {
        Self {
            options,
            profile_id,
        }
    }
}

impl HostedPaymentPageConverter for DefaultHostedPaymentPageConverter {
    fn convert(
        &self,
        urls: CallbackUrls,
        payment_session_url: String,
    ) -> Result<HostedPaymentPage> {
        HostedPaymentPage::new(
            MerchantUrls {
                back: urls.back,
                cancel: urls.cancel,
                error: urls.error,
                failure: urls.failure,
                status_update: urls.notification,
                success: urls.confirmation,
            },
            payment_session_url,
            self.options.clone(),
            self.profile_id.clone(),
        )
    }
}
