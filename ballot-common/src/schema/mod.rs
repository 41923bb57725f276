diesel::table! {
    admins (id) {
        id -> Uuid,
        email -> Text,
        password_hash -> Text,
        #[max_length = 16]
        role -> Varchar,
        created_timestamp -> Timestamp,
    }
}

diesel::table! {
    candidates (id) {
        id -> Uuid,
        position_id -> Uuid,
        name -> Text,
    }
}

diesel::table! {
    otps (admin_email) {
        admin_email -> Text,
        code_hash -> Bytea,
        created_timestamp -> Timestamp,
        expiration -> Timestamp,
        attempts_used -> Int2,
        attempts_max -> Int2,
        consumed_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    payments (reference) {
        #[max_length = 40]
        reference -> Varchar,
        vote_id -> Uuid,
        amount -> Int8,
        #[max_length = 10]
        status -> Varchar,
        email -> Text,
        phone -> Nullable<Text>,
        created_timestamp -> Timestamp,
    }
}

diesel::table! {
    positions (id) {
        id -> Uuid,
        name -> Text,
    }
}

diesel::table! {
    sessions (id) {
        id -> Uuid,
        admin_id -> Uuid,
        csrf_token -> Text,
        created_timestamp -> Timestamp,
        expiration -> Timestamp,
    }
}

diesel::table! {
    throttleable_attempts (identifier_hash) {
        identifier_hash -> Int8,
        attempt_count -> Int4,
        expiration_timestamp -> Timestamp,
    }
}

diesel::table! {
    votes (id) {
        id -> Uuid,
        candidate_id -> Uuid,
        position_id -> Uuid,
        voter_email -> Text,
        voter_phone -> Nullable<Text>,
        vote_count -> Int4,
        amount -> Int8,
        #[max_length = 40]
        payment_reference -> Varchar,
        #[max_length = 10]
        status -> Varchar,
        created_timestamp -> Timestamp,
    }
}

diesel::joinable!(candidates -> positions (position_id));
diesel::joinable!(sessions -> admins (admin_id));
diesel::joinable!(votes -> candidates (candidate_id));
diesel::joinable!(votes -> positions (position_id));
diesel::joinable!(payments -> votes (vote_id));

diesel::allow_tables_to_appear_in_same_query!(
    admins,
    candidates,
    otps,
    payments,
    positions,
    sessions,
    throttleable_attempts,
    votes,
);

diesel::allow_columns_to_appear_in_same_group_by_clause!(
    candidates::id,
    candidates::name,
    positions::name,
);
