//! Transaction records, details and verification results

pub mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp_matches_js_format() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_700_000_012_000), "2023-11-14T22:13:32.000Z");
    }

    #[test]
    fn test_record_json_keys() {
        let record = TransactionRecord {
            hash: "0xabc".to_string(),
            timestamp: iso_timestamp(0),
            block_number: 2,
            from: "Alice".to_string(),
            to: "Bob".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["TransactionHash"], "0xabc");
        assert_eq!(json["Timestamp"], "1970-01-01T00:00:00.000Z");
        assert_eq!(json["BlockNumber"], 2);
        assert_eq!(json["From"], "Alice");
        assert_eq!(json["To"], "Bob");
    }

    #[test]
    fn test_detail_json_keys() {
        let detail = TransactionDetail {
            receiver: "Bob".to_string(),
            hash: "0xabc".to_string(),
            block_number: 2,
            time: iso_timestamp(0),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["ReceiverAddress"], "Bob");
        assert_eq!(json["TransactionHash"], "0xabc");
        assert_eq!(json["BlockNumber"], 2);
        assert_eq!(json["Time"], "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_verification_result_omits_absent_fields() {
        let rejected = serde_json::to_value(VerificationResult::rejected()).unwrap();
        assert_eq!(rejected, serde_json::json!({ "valid": false }));

        let confirmed = serde_json::to_value(VerificationResult::confirmed(2, 42)).unwrap();
        assert_eq!(
            confirmed,
            serde_json::json!({ "valid": true, "blockNumber": 2, "timestamp": 42 })
        );

        let failed = serde_json::to_value(VerificationResult::failed("boom")).unwrap();
        assert_eq!(failed, serde_json::json!({ "valid": false, "error": "boom" }));
    }
}
