//! Locates the Konnect payment method record and its stored credentials

use crate::error::{AppError, AppResult};
use crate::host::{ConfigArg, PaymentMethod};
use crate::konnect::HANDLER_CODE;
use crate::payments::types::KonnectCredentials;

pub const API_KEY_ARG: &str = "apiKey";
pub const RECEIVER_WALLET_ID_ARG: &str = "receiverWalletId";

/// The first payment method whose handler is the Konnect handler
pub fn find_konnect_method(methods: &[PaymentMethod]) -> AppResult<&PaymentMethod> {
    methods
        .iter()
        .find(|m| m.handler.code == HANDLER_CODE)
        .ok_or_else(|| AppError::not_found("PaymentMethod", HANDLER_CODE))
}

/// Value of a required handler argument; absent and empty are both errors
pub fn find_or_throw_arg_value<'a>(args: &'a [ConfigArg], name: &str) -> AppResult<&'a str> {
    args.iter()
        .find(|arg| arg.name == name)
        .map(|arg| arg.value.as_str())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::configuration(format!("No argument named '{}' found!", name)))
}

impl KonnectCredentials {
    pub fn from_args(args: &[ConfigArg]) -> AppResult<Self> {
        Ok(Self {
            api_key: find_or_throw_arg_value(args, API_KEY_ARG)?.to_string(),
            receiver_wallet_id: find_or_throw_arg_value(args, RECEIVER_WALLET_ID_ARG)?
                .to_string(),
        })
    }

    pub fn from_method(method: &PaymentMethod) -> AppResult<Self> {
        Self::from_args(&method.handler.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ConfigurableOperation;

    fn method(code: &str, handler_code: &str, args: Vec<ConfigArg>) -> PaymentMethod {
        PaymentMethod {
            id: format!("pm-{}", code),
            code: code.to_string(),
            name: code.to_string(),
            enabled: true,
            handler: ConfigurableOperation {
                code: handler_code.to_string(),
                args,
            },
            eligible_currencies: None,
        }
    }

    #[test]
    fn test_finds_method_by_handler_code() {
        let methods = vec![
            method("cash", "dummy-payment-handler", vec![]),
            method("konnect-tnd", "konnect", vec![]),
        ];
        let found = find_konnect_method(&methods).unwrap();
        assert_eq!(found.code, "konnect-tnd");
    }

    #[test]
    fn test_missing_method_is_not_found() {
        let methods = vec![method("cash", "dummy-payment-handler", vec![])];
        let err = find_konnect_method(&methods).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_credentials_from_args() {
        let args = vec![
            ConfigArg::new("apiKey", "key-123"),
            ConfigArg::new("receiverWalletId", "wallet-9"),
        ];
        let creds = KonnectCredentials::from_args(&args).unwrap();
        assert_eq!(creds.api_key, "key-123");
        assert_eq!(creds.receiver_wallet_id, "wallet-9");
    }

    #[test]
    fn test_missing_argument_is_named() {
        let args = vec![ConfigArg::new("apiKey", "key-123")];
        let err = KonnectCredentials::from_args(&args).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: No argument named 'receiverWalletId' found!"
        );
    }

    #[test]
    fn test_empty_argument_counts_as_missing() {
        let args = vec![
            ConfigArg::new("apiKey", ""),
            ConfigArg::new("receiverWalletId", "wallet-9"),
        ];
        let err = KonnectCredentials::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("'apiKey'"));
    }
}
