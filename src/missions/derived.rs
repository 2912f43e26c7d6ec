//! Pure derived-view calculators. No side effects; recomputed on every read
//! from the missions and registrations collections.

use crate::missions::dto::{Mission, MissionCategory, Registration};

/// Capacity minus the mission's registration count, floored at zero.
pub fn slots_left(mission_id: &str, capacity: u32, registrations: &[Registration]) -> u32 {
    let taken = registrations
        .iter()
        .filter(|r| r.mission_id == mission_id)
        .count();
    capacity.saturating_sub(taken as u32)
}

/// Share of taken slots as a display percentage in [0, 100]. A zero-capacity
/// mission counts as full.
pub fn participation_percent(capacity: u32, slots_left: u32) -> u8 {
    if capacity == 0 {
        return 100;
    }
    let taken = capacity.saturating_sub(slots_left);
    let percent = (f64::from(taken) / f64::from(capacity) * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Case-insensitive substring match over title/description/location, combined
/// with an optional exact category match. Both conditions must hold.
pub fn filter_missions<'a>(
    missions: &'a [Mission],
    search: &str,
    category: Option<MissionCategory>,
) -> Vec<&'a Mission> {
    let needle = search.trim().to_lowercase();
    missions
        .iter()
        .filter(|m| {
            let text_ok = needle.is_empty()
                || m.title.to_lowercase().contains(&needle)
                || m.description.to_lowercase().contains(&needle)
                || m.location.to_lowercase().contains(&needle);
            let category_ok = category.map_or(true, |c| m.category == c);
            text_ok && category_ok
        })
        .collect()
}
