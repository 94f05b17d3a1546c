table! {
    contract_negotiation_info (id) {
        id -> Text,
        process_id -> Text,
        connector_id -> Text,
        offer_id -> Text,
        contract_negotiation_id -> Nullable<Text>,
        status -> Text,
        remote_state -> Nullable<Text>,
        error -> Nullable<Text>,
        created_ts -> Timestamp,
    }
}
