use mockex_core::{Executor, Store};
use mockex_exchange::auth::sign_message;
use mockex_exchange::poloniex::{PoloniexApi, PoloniexError};
use mockex_exchange::poloniex::proxy::PoloniexProxy;
use proptest::prelude::*;
use std::sync::Arc;

fn api() -> PoloniexApi {
    PoloniexApi::new(
        Arc::new(Executor::new(Store::memory())),
        PoloniexProxy::new("http://127.0.0.1:9/"),
    )
}

proptest! {
    /// Whatever nonce sequence a client presents, the accepted subsequence is
    /// strictly increasing, and every rejection names the ladder position.
    #[test]
    fn prop_accepted_nonces_strictly_increase(nonces in proptest::collection::vec(1u64..1_000, 1..50)) {
        let api = api();
        let mut accepted = Vec::new();

        for nonce in nonces {
            let body = format!("command=returnBalances&nonce={nonce}");
            let signature = sign_message(&body, "k");
            match api.authenticate(Some("k"), Some(&signature), Some(&nonce.to_string()), &body) {
                Ok(_) => accepted.push(nonce),
                Err(PoloniexError::NonceNotGreater { previous, provided }) => {
                    prop_assert_eq!(provided, nonce);
                    prop_assert!(nonce <= previous);
                }
                Err(other) => prop_assert!(false, "unexpected rejection: {other}"),
            }
        }

        prop_assert!(!accepted.is_empty(), "the first nonce always beats the empty ladder");
        prop_assert!(accepted.windows(2).all(|pair| pair[0] < pair[1]));
    }

    /// Ladders are independent per api key.
    #[test]
    fn prop_ladders_are_scoped_per_key(nonce in 1u64..1_000) {
        let api = api();
        let body = format!("command=returnBalances&nonce={nonce}");

        for key in ["alpha", "beta"] {
            let signature = sign_message(&body, key);
            let outcome = api.authenticate(Some(key), Some(&signature), Some(&nonce.to_string()), &body);
            prop_assert!(outcome.is_ok(), "key {} rejected: {:?}", key, outcome);
        }
    }
}
