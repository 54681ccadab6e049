/// Base58check withdrawal-address validation.
///
/// An address is accepted when it decodes to a 25-byte payload whose trailing four
/// bytes are a valid double-SHA256 checksum, and whose version byte appears in the
/// currency's prefix table. Currencies outside the table reject everything.

/// Version bytes accepted per currency (mainnet and testnet variants).
fn version_prefixes(currency: &str) -> Option<&'static [u8]> {
    Some(match currency {
        "BTC" | "BCH" => &[0x00, 0x05],
        "TBTC" | "TBCH" => &[0x6f, 0xc4],
        "LTC" => &[0x30, 0x05, 0x32],
        "TLTC" => &[0x6f, 0xc4, 0x3a],
        "DASH" => &[0x4c, 0x10],
        "TDASH" => &[0x8c, 0x13],
        "DOGE" => &[0x1e, 0x16],
        "TDOGE" => &[0x71, 0xc4],
        _ => return None,
    })
}

pub fn is_address_valid(address: &str, currency: &str) -> bool {
    if address.is_empty() {
        return false;
    }
    let Some(prefixes) = version_prefixes(currency) else {
        return false;
    };
    let Ok(payload) = bs58::decode(address).with_check(None).into_vec() else {
        return false;
    };
    // 21 bytes = version byte + 20-byte hash (checksum already stripped).
    payload.len() == 21 && prefixes.contains(&payload[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(version: u8, hash: [u8; 20]) -> String {
        bs58::encode(hash).with_check_version(version).into_string()
    }

    #[test]
    fn test_known_btc_address() {
        assert!(is_address_valid("1Nh7uHdvY6fNwtQtM1G5EZAFPLC33B59rB", "BTC"));
    }

    #[test]
    fn test_accepts_every_table_prefix() {
        struct TestCase {
            currency: &'static str,
            version: u8,
        }

        let tests = vec![
            TestCase { currency: "BTC", version: 0x00 },
            TestCase { currency: "BTC", version: 0x05 },
            TestCase { currency: "TBTC", version: 0x6f },
            TestCase { currency: "BCH", version: 0x00 },
            TestCase { currency: "LTC", version: 0x30 },
            TestCase { currency: "LTC", version: 0x32 },
            TestCase { currency: "TLTC", version: 0x3a },
            TestCase { currency: "DASH", version: 0x4c },
            TestCase { currency: "TDASH", version: 0x8c },
            TestCase { currency: "DOGE", version: 0x1e },
            TestCase { currency: "TDOGE", version: 0x71 },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let address = encode(test.version, [7u8; 20]);
            assert!(
                is_address_valid(&address, test.currency),
                "TC{index} rejected {address} for {}",
                test.currency
            );
        }
    }

    #[test]
    fn test_rejects_corrupted_checksum() {
        let address = encode(0x00, [7u8; 20]);

        // Mutating any character breaks either the checksum or the version prefix.
        for index in 0..address.len() {
            let mut mutated = address.clone();
            let replacement = if mutated.as_bytes()[index] == b'2' { '3' } else { '2' };
            mutated.replace_range(index..index + 1, &replacement.to_string());
            if mutated == address {
                continue;
            }
            assert!(
                !is_address_valid(&mutated, "BTC"),
                "mutation at {index} still accepted: {mutated}"
            );
        }
    }

    #[test]
    fn test_rejects_wrong_currency_prefix() {
        let doge = encode(0x1e, [9u8; 20]);
        assert!(is_address_valid(&doge, "DOGE"));
        assert!(!is_address_valid(&doge, "BTC"));
        assert!(!is_address_valid(&doge, "DASH"));
    }

    #[test]
    fn test_rejects_unknown_currency_and_junk() {
        assert!(!is_address_valid("1Nh7uHdvY6fNwtQtM1G5EZAFPLC33B59rB", "XRP"));
        assert!(!is_address_valid("", "BTC"));
        assert!(!is_address_valid("not-base58-0OIl", "BTC"));
    }
}
