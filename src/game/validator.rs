use std::iter;

use crate::domain::track::Track;

use super::error::GameError;

/// Decides whether inserting `candidate` at `index` keeps `existing` sorted by
/// release year. Equal years may sit next to each other.
///
/// `existing` is expected to be sorted already. An `index` past the end of the
/// list is a caller error and is reported as [`GameError::InvalidIndex`].
pub fn is_valid_insertion(
    existing: &[Track],
    index: usize,
    candidate: &Track,
) -> Result<bool, GameError> {
    if index > existing.len() {
        return Err(GameError::InvalidIndex {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            len: existing.len(),
        });
    }

    let hypothetical = || {
        existing[..index]
            .iter()
            .chain(iter::once(candidate))
            .chain(&existing[index..])
    };

    Ok(hypothetical()
        .zip(hypothetical().skip(1))
        .all(|(earlier, later)| earlier.release_year <= later.release_year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn track(year: i32) -> Track {
        Track::new(format!("song from {year}"), "someone", year)
    }

    fn tracks(years: &[i32]) -> Vec<Track> {
        years.iter().copied().map(track).collect()
    }

    #[test]
    fn boundary_cases() -> anyhow::Result<()> {
        assert!(is_valid_insertion(&[], 0, &track(1991))?);
        assert!(is_valid_insertion(&tracks(&[1975]), 0, &track(1965))?);
        assert!(!is_valid_insertion(&tracks(&[1975]), 0, &track(1991))?);
        assert!(is_valid_insertion(&tracks(&[1975]), 1, &track(1991))?);
        assert!(!is_valid_insertion(&tracks(&[1975]), 1, &track(1965))?);
        Ok(())
    }

    #[test]
    fn middle_insertions() -> anyhow::Result<()> {
        let list = tracks(&[1965, 1991, 2019]);
        assert!(is_valid_insertion(&list, 1, &track(1975))?);
        assert!(!is_valid_insertion(&list, 1, &track(2010))?);
        assert!(is_valid_insertion(&list, 2, &track(2010))?);
        assert!(!is_valid_insertion(&list, 2, &track(1975))?);
        Ok(())
    }

    #[test]
    fn equal_years_fit_on_either_side() -> anyhow::Result<()> {
        let list = tracks(&[1975, 1991]);
        assert!(is_valid_insertion(&list, 0, &track(1975))?);
        assert!(is_valid_insertion(&list, 1, &track(1975))?);
        assert!(is_valid_insertion(&list, 1, &track(1991))?);
        assert!(is_valid_insertion(&list, 2, &track(1991))?);
        Ok(())
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let list = tracks(&[1975]);
        assert!(matches!(
            is_valid_insertion(&list, 2, &track(1991)),
            Err(GameError::InvalidIndex { index: 2, len: 1 })
        ));
        assert!(matches!(
            is_valid_insertion(&[], 1, &track(1991)),
            Err(GameError::InvalidIndex { index: 1, len: 0 })
        ));
    }

    proptest! {
        #[test]
        fn agrees_with_sorting_the_hypothetical_list(
            mut years in prop::collection::vec(1950i32..2030, 0..12),
            candidate in 1950i32..2030,
            index_seed in any::<usize>(),
        ) {
            years.sort();
            let list = tracks(&years);
            let index = index_seed % (list.len() + 1);

            let mut inserted = years.clone();
            inserted.insert(index, candidate);
            let expected = inserted.windows(2).all(|w| w[0] <= w[1]);

            prop_assert_eq!(is_valid_insertion(&list, index, &track(candidate)).unwrap(), expected);
        }

        #[test]
        fn exactly_the_sorted_positions_are_valid(
            mut years in prop::collection::vec(1950i32..2030, 0..12),
            candidate in 1950i32..2030,
        ) {
            years.sort();
            let list = tracks(&years);

            // valid positions form the contiguous range between the last
            // strictly-older track and the first strictly-newer one
            let first = years.iter().filter(|&&y| y < candidate).count();
            let last = years.iter().filter(|&&y| y <= candidate).count();

            for index in 0..=list.len() {
                let valid = is_valid_insertion(&list, index, &track(candidate)).unwrap();
                prop_assert_eq!(valid, (first..=last).contains(&index));
            }
        }
    }
}
