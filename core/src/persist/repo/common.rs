use chrono::Utc;
use entities::market;
use entities::sea_orm_active_enums::PositionDirection;
use sea_orm::prelude::DateTimeWithTimeZone;

pub fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

/// CLOB token that prices a position taken in `direction` on `market`.
pub fn token_for_direction(market: &market::Model, direction: PositionDirection) -> Option<&str> {
    let token = match direction {
        PositionDirection::Yes => market.clob_token_id_yes.as_deref(),
        PositionDirection::No => market.clob_token_id_no.as_deref(),
    };
    token.map(str::trim).filter(|t| !t.is_empty())
}
