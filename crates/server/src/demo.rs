//! The built-in demo parcel submitted by `GET /demo/start`.

use pipeline::{ParcelSubmission, Score, ScoreSubmission};

/// A commercial lot in Dongin-dong 1-ga, Jung-gu, Daegu.
pub fn demo_submission() -> ParcelSubmission {
    ParcelSubmission {
        address: Some("대구광역시 중구 동인동1가 2-1".into()),
        land_category: Some("대".into()),
        zoning: Some("중심상업지역".into()),
        zoning_district: Some("지정되지않음".into()),
        land_use: Some("업무용".into()),
        terrain: Some("평지".into()),
        shape: Some("세로장방".into()),
        road_frontage: Some("광대소각".into()),
        unit_price: Some(3_735_000),
        scores: Some(ScoreSubmission {
            location: Score::new(86),
            infrastructure: Score::new(78),
            stability: Score::new(48),
        }),
    }
}
