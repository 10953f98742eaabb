//! Calendar-derived moon phases.
//!
//! A 12-month, 365-day year. Months are zero-based, days start at 1.

use super::moon::Phase;

/// Days per month, January first.
pub const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Zero-based day of the year. Out-of-range months and days are clamped.
pub fn day_of_year(day: u32, month: u32) -> u32 {
    let month = month.min(11) as usize;
    let day = day.clamp(1, MONTH_LENGTHS[month]);
    MONTH_LENGTHS[..month].iter().sum::<u32>() + day - 1
}

/// Phase of a moon with the given cycle on the given day of the year.
///
/// The cycle is split into eight equal slices starting at [`Phase::Full`].
pub fn phase_for_day(day_of_year: u32, cycle_days: u32, offset_days: u32) -> Phase {
    if cycle_days == 0 {
        return Phase::Full;
    }
    let pos = (u64::from(day_of_year) + u64::from(offset_days)) % u64::from(cycle_days);
    let slice = pos * 8 / u64::from(cycle_days);
    Phase::from_index(slice as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_year() {
        assert_eq!(day_of_year(1, 0), 0);
        assert_eq!(day_of_year(31, 0), 30);
        assert_eq!(day_of_year(1, 1), 31);
        assert_eq!(day_of_year(31, 11), 364);
    }

    #[test]
    fn test_day_of_year_clamps() {
        assert_eq!(day_of_year(0, 0), 0);
        assert_eq!(day_of_year(40, 1), 31 + 27);
        assert_eq!(day_of_year(1, 99), day_of_year(1, 11));
    }

    #[test]
    fn test_phase_walks_the_cycle() {
        // 24-day cycle: three days per phase
        assert_eq!(phase_for_day(0, 24, 0), Phase::Full);
        assert_eq!(phase_for_day(2, 24, 0), Phase::Full);
        assert_eq!(phase_for_day(3, 24, 0), Phase::WaningGibbous);
        assert_eq!(phase_for_day(12, 24, 0), Phase::New);
        assert_eq!(phase_for_day(23, 24, 0), Phase::WaxingGibbous);
        assert_eq!(phase_for_day(24, 24, 0), Phase::Full);
    }

    #[test]
    fn test_phase_offset_and_short_cycle() {
        assert_eq!(phase_for_day(0, 16, 8), Phase::New);
        assert_eq!(phase_for_day(13, 16, 0), Phase::FirstQuarter);
        // Cycles shorter than eight days still map into range
        for doy in 0..20 {
            assert!(phase_for_day(doy, 5, 0).is_specified());
        }
    }
}
