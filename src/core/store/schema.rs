//! Diesel table definitions mirroring `migrations/`.

diesel::table! {
    trades (trade_id) {
        trade_id -> Text,
        market_id -> Text,
        strategy_name -> Text,
        signal_id -> Text,
        yes_order_id -> Nullable<Text>,
        no_order_id -> Nullable<Text>,
        position_id -> Nullable<Text>,
        status -> Text,
        created_at -> Text,
        resolved_at -> Nullable<Text>,
    }
}

diesel::table! {
    positions (position_id) {
        position_id -> Text,
        market_id -> Text,
        condition_id -> Text,
        yes_token_id -> Text,
        no_token_id -> Text,
        yes_size -> Text,
        no_size -> Text,
        yes_avg_price -> Text,
        no_avg_price -> Text,
        status -> Text,
        opened_at -> Text,
        closed_at -> Nullable<Text>,
        realized_pnl -> Nullable<Text>,
        settlement_proceeds -> Nullable<Text>,
    }
}

diesel::table! {
    settlement_queue (position_id) {
        position_id -> Text,
        market_id -> Text,
        condition_id -> Text,
        token_id -> Text,
        side -> Text,
        size -> Text,
        entry_price -> Text,
        entry_cost -> Text,
        market_end_time -> Text,
        status -> Text,
        claim_attempts -> Integer,
        last_claim_error -> Nullable<Text>,
        next_retry_at -> Nullable<Text>,
        claimed_at -> Nullable<Text>,
        claim_proceeds -> Nullable<Text>,
        claim_profit -> Nullable<Text>,
    }
}

diesel::table! {
    circuit_breaker_state (id) {
        id -> Integer,
        date -> Text,
        realized_pnl -> Text,
        level -> Text,
        hit_at -> Nullable<Text>,
        hit_reason -> Nullable<Text>,
        total_trades_today -> Integer,
        consecutive_failures -> Integer,
    }
}

diesel::table! {
    daily_stats (date) {
        date -> Text,
        trade_count -> Integer,
        volume_usd -> Text,
        realized_pnl -> Text,
        positions_opened -> Integer,
        positions_closed -> Integer,
        wins -> Integer,
        losses -> Integer,
        exposure -> Text,
        opportunities_detected -> Integer,
        opportunities_executed -> Integer,
        max_drawdown -> Text,
    }
}

diesel::table! {
    realized_pnl_ledger (id) {
        id -> Integer,
        trade_id -> Text,
        trade_date -> Text,
        pnl_amount -> Text,
        pnl_type -> Text,
        notes -> Nullable<Text>,
        recorded_at -> Text,
    }
}
