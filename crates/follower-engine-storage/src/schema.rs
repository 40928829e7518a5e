// Diesel schema for the follower engine tables.
//
// The composite primary keys double as the uniqueness guarantees the
// runtime relies on: one event per (actor_key, version), one snapshot per
// actor_key, one commit row per (unit_name, transaction_id).

diesel::table! {
    follower_events (actor_key, version) {
        actor_key -> Text,
        version -> Int8,
        payload -> Jsonb,
        occurred_ms -> Int8,
        recorded_at -> Timestamptz,
    }
}

diesel::table! {
    follower_snapshots (actor_key) {
        actor_key -> Text,
        version -> Int8,
        doing_version -> Int8,
        payload -> Jsonb,
        taken_at -> Timestamptz,
    }
}

diesel::table! {
    transaction_log (unit_name, transaction_id) {
        unit_name -> Text,
        transaction_id -> Int8,
        data -> Text,
        status -> Int4,
    }
}
