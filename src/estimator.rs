// src/estimator.rs
use ethers::types::{Address, U256};
use tracing::{debug, warn};

use crate::config::PaymasterConfig;
use crate::error::PaymasterError;
use crate::paymaster::apply_percent;
use crate::provider::ZkProvider;
use crate::types::{FeeQuote, PaymasterParams, PaymentRequest};

/// Gas estimation for paymaster transactions.
///
/// Simulation runs with `best_effort` params attached first. Some paymasters
/// cannot validate before the real allowance is known, so a failed first
/// simulation is retried without any paymaster metadata and the result is
/// inflated by [`PaymasterConfig::fallback_inflation_percent`] and floored at
/// the minimum gas limit.
pub struct FeeEstimator<'a> {
    provider: &'a dyn ZkProvider,
    config: &'a PaymasterConfig,
}

impl<'a> FeeEstimator<'a> {
    pub fn new(provider: &'a dyn ZkProvider, config: &'a PaymasterConfig) -> Self {
        Self { provider, config }
    }

    pub async fn estimate(
        &self,
        request: &PaymentRequest,
        from: Address,
        best_effort: &PaymasterParams,
    ) -> Result<FeeQuote, PaymasterError> {
        let gas_price = self.provider.gas_price().await?;

        if let Some(gas_limit) = request.gas_limit_override.filter(|g| !g.is_zero()) {
            debug!("Using caller gas limit {} for {}", gas_limit, from);
            return Ok(FeeQuote { gas_limit, gas_price });
        }

        let draft = request
            .transaction
            .with_paymaster_params(best_effort.clone(), self.config.gas_per_pubdata);

        let gas_limit = match self.provider.estimate_gas(&draft, from).await {
            Ok(gas_limit) => gas_limit,
            Err(e) => {
                warn!("Paymaster simulation failed for {}, estimating without paymaster: {}", from, e);
                self.estimate_without_paymaster(request, from).await?
            }
        };

        let gas_limit = match request.gas_buffer_percent {
            Some(percent) if percent > 0 => apply_percent(gas_limit, percent)?,
            _ => gas_limit,
        };

        debug!("Estimated gas limit {} at price {} for {}", gas_limit, gas_price, from);
        Ok(FeeQuote { gas_limit, gas_price })
    }

    /// Estimate of the bare call, inflated and floored at the minimum gas limit.
    async fn estimate_without_paymaster(
        &self,
        request: &PaymentRequest,
        from: Address,
    ) -> Result<U256, PaymasterError> {
        let plain = request.transaction.without_paymaster_params();
        let raw = self
            .provider
            .estimate_gas(&plain, from)
            .await
            .map_err(PaymasterError::SimulationFailed)?;
        let floor = request
            .minimum_gas_limit
            .unwrap_or(self.config.default_gas_limit);
        Ok(apply_percent(raw, self.config.fallback_inflation_percent)?.max(floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;
    use crate::error::SimulationError;
    use crate::mock::MockProvider;
    use crate::types::TransactionDraft;
    use ethers::types::Bytes;

    fn request() -> PaymentRequest {
        PaymentRequest::new(
            Network::Testnet,
            TransactionDraft::call(Address::repeat_byte(9), Bytes::from(vec![1, 2, 3])),
        )
    }

    fn params() -> PaymasterParams {
        PaymasterParams {
            paymaster: Address::repeat_byte(0xaa),
            paymaster_input: Bytes::from(vec![0x8c, 0x5a, 0x34, 0x45]),
        }
    }

    #[tokio::test]
    async fn successful_simulation_is_used_as_is() {
        let provider = MockProvider::default().with_estimates(vec![Ok(U256::from(210_000u64))]);
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(&request(), Address::repeat_byte(1), &params())
            .await
            .unwrap();

        assert_eq!(quote.gas_limit, U256::from(210_000u64));
        assert_eq!(quote.gas_price, provider.gas_price);
        let drafts = provider.estimated_drafts();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].paymaster_params(), Some(&params()));
    }

    #[tokio::test]
    async fn buffer_scales_with_truncation() {
        let provider = MockProvider::default().with_estimates(vec![Ok(U256::from(1_001u64))]);
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(&request().with_gas_buffer_percent(15), Address::zero(), &params())
            .await
            .unwrap();

        // 1001 * 115 / 100 = 1151.15
        assert_eq!(quote.gas_limit, U256::from(1_151u64));
    }

    #[tokio::test]
    async fn override_skips_simulation() {
        let provider = MockProvider::default();
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(
                &request().with_gas_limit(U256::from(900_000u64)).with_gas_buffer_percent(20),
                Address::zero(),
                &params(),
            )
            .await
            .unwrap();

        assert_eq!(quote.gas_limit, U256::from(900_000u64));
        assert!(provider.estimated_drafts().is_empty());
    }

    #[tokio::test]
    async fn zero_override_is_ignored() {
        let provider = MockProvider::default().with_estimates(vec![Ok(U256::from(50_000u64))]);
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(&request().with_gas_limit(U256::zero()), Address::zero(), &params())
            .await
            .unwrap();

        assert_eq!(quote.gas_limit, U256::from(50_000u64));
    }

    #[tokio::test]
    async fn fallback_strips_metadata_and_floors_at_default() {
        let provider = MockProvider::default().with_estimates(vec![
            Err(SimulationError::PaymasterValidation("Min allowance too low".into())),
            Ok(U256::from(100_000u64)),
        ]);
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(&request(), Address::zero(), &params())
            .await
            .unwrap();

        assert_eq!(quote.gas_limit, U256::from(1_500_000u64));
        let drafts = provider.estimated_drafts();
        assert_eq!(drafts.len(), 2);
        assert!(drafts[0].custom_data.is_some());
        assert!(drafts[1].custom_data.is_none());
    }

    #[tokio::test]
    async fn fallback_inflates_large_estimates() {
        let provider = MockProvider::default().with_estimates(vec![
            Err(SimulationError::Other("reverted".into())),
            Ok(U256::from(2_000_001u64)),
        ]);
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(&request(), Address::zero(), &params())
            .await
            .unwrap();

        assert_eq!(quote.gas_limit, U256::from(3_000_001u64));
    }

    #[tokio::test]
    async fn fallback_respects_caller_minimum() {
        let provider = MockProvider::default().with_estimates(vec![
            Err(SimulationError::Other("reverted".into())),
            Ok(U256::from(100_000u64)),
        ]);
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(
                &request().with_minimum_gas_limit(U256::from(400_000u64)),
                Address::zero(),
                &params(),
            )
            .await
            .unwrap();

        assert_eq!(quote.gas_limit, U256::from(400_000u64));
    }

    #[tokio::test]
    async fn second_failure_is_fatal() {
        let provider = MockProvider::default().with_estimates(vec![
            Err(SimulationError::Other("first".into())),
            Err(SimulationError::Other("second".into())),
        ]);
        let config = PaymasterConfig::default();

        let err = FeeEstimator::new(&provider, &config)
            .estimate(&request(), Address::zero(), &params())
            .await
            .unwrap_err();

        match err {
            PaymasterError::SimulationFailed(inner) => assert_eq!(inner.message(), "second"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn exceeded_sponsor_cap_still_falls_back() {
        let provider = MockProvider::default().with_estimates(vec![
            Err(SimulationError::SponsoredGasExceeded("EXCEED_GAS_FEE".into())),
            Ok(U256::from(100_000u64)),
        ]);
        let config = PaymasterConfig::default();

        let quote = FeeEstimator::new(&provider, &config)
            .estimate(&request(), Address::zero(), &params())
            .await
            .unwrap();

        assert_eq!(quote.gas_limit, U256::from(1_500_000u64));
        let drafts = provider.estimated_drafts();
        assert_eq!(drafts.len(), 2);
        assert!(drafts[1].custom_data.is_none());
    }
}
