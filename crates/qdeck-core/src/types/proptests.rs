//! Property-based tests for core types.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::types::{FiscalQuarter, GenerateRequest, RequestId};
    use proptest::prelude::*;
    use uuid::Uuid;

    proptest! {
        #[test]
        fn test_request_id_roundtrip(uuid in any::<u128>()) {
            let uuid = Uuid::from_u128(uuid);
            let id = RequestId::from_uuid(uuid);
            assert_eq!(id.into_uuid(), uuid);
        }

        #[test]
        fn test_request_id_display_parse_roundtrip(uuid in any::<u128>()) {
            let uuid = Uuid::from_u128(uuid);
            let id = RequestId::from_uuid(uuid);
            let string = id.to_string();
            let parsed: RequestId = string.parse().unwrap();
            assert_eq!(id, parsed);
        }

        #[test]
        fn test_quarter_construction_matches_validation(quarter in 0u8..=8, year in 1990u16..=2110) {
            let valid = (1..=4).contains(&quarter)
                && (FiscalQuarter::MIN_YEAR..=FiscalQuarter::MAX_YEAR).contains(&year);
            assert_eq!(FiscalQuarter::new(quarter, year).is_ok(), valid);
        }

        #[test]
        fn test_generate_request_json_roundtrip(quarter in 1u8..=4, year in 2000u16..=2100, name in proptest::option::of("[a-zA-Z0-9_-]{1,24}")) {
            let fiscal = FiscalQuarter::new(quarter, year).unwrap();
            let mut request = GenerateRequest::new(fiscal);
            if let Some(name) = name {
                request = request.with_file_id(name);
            }
            let json = serde_json::to_string(&request).unwrap();
            let back: GenerateRequest = serde_json::from_str(&json).unwrap();
            assert_eq!(back, request);
        }
    }
}
