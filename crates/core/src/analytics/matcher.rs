use crate::domain::stock::PricePoint;
use chrono::NaiveDate;

/// Maximum distance between a target date and a usable price sample.
pub const MATCH_TOLERANCE_DAYS: i64 = 5;

/// Returns the sample whose date is closest to `target`, or None when no
/// sample lies within the tolerance window. Strictly smaller distance wins,
/// so the first-seen sample keeps a tie.
pub fn find_closest_price(series: &[PricePoint], target: NaiveDate) -> Option<&PricePoint> {
    let mut closest: Option<(&PricePoint, i64)> = None;

    for point in series {
        let distance = (point.date - target).num_days().abs();
        if distance > MATCH_TOLERANCE_DAYS {
            continue;
        }
        match closest {
            Some((_, best)) if distance >= best => {}
            _ => closest = Some((point, distance)),
        }
    }

    closest.map(|(point, _)| point)
}
