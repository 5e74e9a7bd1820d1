use crate::error::{AppError, AppResult};
use crate::host::{
    ApiType, CancelPaymentResult, ConfigArg, ConfigArgDefinition, CreatePaymentResult, Order,
    Payment, PaymentMethodHandler, PaymentState, RequestContext, SettlePaymentResult,
};
use crate::konnect::resolver::{API_KEY_ARG, RECEIVER_WALLET_ID_ARG};
use crate::konnect::HANDLER_CODE;
use async_trait::async_trait;
use serde_json::json;

const ARGS: &[ConfigArgDefinition] = &[
    ConfigArgDefinition {
        name: API_KEY_ARG,
        arg_type: "string",
    },
    ConfigArgDefinition {
        name: RECEIVER_WALLET_ID_ARG,
        arg_type: "string",
    },
];

/// Payment method handler registered with the host for Konnect payments.
///
/// Konnect confirms payments out of band through the webhook, so by the time the
/// host asks this handler to create a payment the money has already been received.
#[derive(Debug, Clone, Copy, Default)]
pub struct KonnectPaymentHandler;

#[async_trait]
impl PaymentMethodHandler for KonnectPaymentHandler {
    fn code(&self) -> &'static str {
        HANDLER_CODE
    }

    fn description(&self) -> &'static str {
        "Konnect"
    }

    fn args(&self) -> &'static [ConfigArgDefinition] {
        ARGS
    }

    /// Only the webhook (admin context) may create Konnect payments. The payment
    /// covers `amount`, the balance the host still expects on the order.
    async fn create_payment(
        &self,
        ctx: &RequestContext,
        _order: &Order,
        amount: i64,
        _args: &[ConfigArg],
        metadata: serde_json::Value,
    ) -> AppResult<CreatePaymentResult> {
        if ctx.api_type != ApiType::Admin {
            return Err(AppError::not_allowed(format!(
                "CreatePayment is not allowed for apiType '{}'",
                ctx.api_type
            )));
        }

        let transaction_id = metadata
            .get("paymentId")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let metadata = match metadata {
            serde_json::Value::Object(mut map) => {
                map.entry("public").or_insert_with(|| json!({}));
                serde_json::Value::Object(map)
            }
            other => json!({ "public": {}, "value": other }),
        };

        Ok(CreatePaymentResult {
            amount,
            state: PaymentState::Settled,
            transaction_id,
            error_message: None,
            metadata,
        })
    }

    async fn settle_payment(
        &self,
        _ctx: &RequestContext,
        _order: &Order,
        _payment: &Payment,
        _args: &[ConfigArg],
    ) -> AppResult<SettlePaymentResult> {
        Ok(SettlePaymentResult {
            success: true,
            error_message: None,
        })
    }

    async fn cancel_payment(
        &self,
        _ctx: &RequestContext,
        _order: &Order,
        _payment: &Payment,
        _args: &[ConfigArg],
    ) -> AppResult<CancelPaymentResult> {
        Ok(CancelPaymentResult {
            success: true,
            error_message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OrderState;

    fn order() -> Order {
        Order {
            id: "1".to_string(),
            code: "ORD1".to_string(),
            state: OrderState::ArrangingPayment,
            active: true,
            currency_code: "TND".to_string(),
            total: 10_000,
            total_with_tax: 11_900,
            customer: None,
            customer_user_id: None,
            payments: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_payment_settles_full_total() {
        let ctx = RequestContext::admin("1", "default-channel");
        let result = KonnectPaymentHandler
            .create_payment(
                &ctx,
                &order(),
                11_900,
                &[],
                json!({ "paymentId": "pay_1", "paymentAmountReceived": 11_900 }),
            )
            .await
            .unwrap();

        assert_eq!(result.state, PaymentState::Settled);
        assert_eq!(result.amount, 11_900);
        assert_eq!(result.transaction_id.as_deref(), Some("pay_1"));
        assert_eq!(result.metadata["paymentAmountReceived"], 11_900);
        assert!(result.metadata["public"].is_object());
    }

    #[tokio::test]
    async fn test_create_payment_covers_remaining_balance() {
        let ctx = RequestContext::admin("1", "default-channel");
        let mut order = order();
        order.payments.push(Payment {
            id: "p0".to_string(),
            method: "manual".to_string(),
            amount: 6_900,
            state: PaymentState::Settled,
            transaction_id: None,
            metadata: json!({}),
        });
        let result = KonnectPaymentHandler
            .create_payment(&ctx, &order, 5_000, &[], json!({ "paymentId": "pay_2" }))
            .await
            .unwrap();

        assert_eq!(result.amount, 5_000);
    }

    #[tokio::test]
    async fn test_create_payment_refused_from_shop_api() {
        let ctx = RequestContext::shop_owner("1", "default-channel", "user-1");
        let err = KonnectPaymentHandler
            .create_payment(&ctx, &order(), 11_900, &[], json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("apiType 'shop'"));
    }

    #[tokio::test]
    async fn test_settle_and_cancel_always_succeed() {
        let ctx = RequestContext::admin("1", "default-channel");
        let payment = Payment {
            id: "p1".to_string(),
            method: "konnect".to_string(),
            amount: 11_900,
            state: PaymentState::Settled,
            transaction_id: None,
            metadata: json!({}),
        };
        let settled = KonnectPaymentHandler
            .settle_payment(&ctx, &order(), &payment, &[])
            .await
            .unwrap();
        let cancelled = KonnectPaymentHandler
            .cancel_payment(&ctx, &order(), &payment, &[])
            .await
            .unwrap();
        assert!(settled.success);
        assert!(cancelled.success);
    }

    #[test]
    fn test_declares_credential_args() {
        let names: Vec<_> = KonnectPaymentHandler.args().iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["apiKey", "receiverWalletId"]);
    }
}
