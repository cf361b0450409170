//! Controlled randomisation of a skill-sorted draft order
//!
//! Both passes only ever reorder players whose ratings are already close, so
//! repeated balancing of the same roster varies without giving up the overall
//! strongest-to-weakest ordering the snake draft relies on.

use rand::seq::SliceRandom;
use rand::Rng;

/// Shuffle players inside fixed-width rating bands
///
/// `items` must be sorted by descending rating. Bands are the half-open
/// intervals `[k * width, (k + 1) * width)`; a band with a single player is
/// left alone.
pub fn shuffle_within_bands<T, R>(
    items: &mut [T],
    rating: impl Fn(&T) -> f64,
    band_width: f64,
    rng: &mut R,
) -> usize
where
    R: Rng + ?Sized,
{
    let band_of = |item: &T| (rating(item) / band_width).floor() as i64;
    shuffle_groups(items, |prev, next| band_of(prev) == band_of(next), rng)
}

/// Shuffle runs of adjacent players closer than `threshold` to each other
pub fn shuffle_similar_runs<T, R>(
    items: &mut [T],
    rating: impl Fn(&T) -> f64,
    threshold: f64,
    rng: &mut R,
) -> usize
where
    R: Rng + ?Sized,
{
    shuffle_groups(
        items,
        |prev, next| (rating(prev) - rating(next)).abs() < threshold,
        rng,
    )
}

/// Band pass followed by the similarity pass
pub fn randomize_order<T, R>(
    items: &mut [T],
    rating: impl Fn(&T) -> f64 + Copy,
    band_width: f64,
    similarity_threshold: f64,
    rng: &mut R,
) where
    R: Rng + ?Sized,
{
    let bands = shuffle_within_bands(items, rating, band_width, rng);
    let runs = shuffle_similar_runs(items, rating, similarity_threshold, rng);
    tracing::debug!(
        "Randomised draft order: {} bands and {} similarity runs shuffled",
        bands,
        runs
    );
}

/// Split `items` into maximal groups where each neighbour pair satisfies
/// `same_group`, shuffle every group of two or more, and return how many were
/// shuffled. Group boundaries are decided before any shuffling happens.
fn shuffle_groups<T, R>(
    items: &mut [T],
    same_group: impl Fn(&T, &T) -> bool,
    rng: &mut R,
) -> usize
where
    R: Rng + ?Sized,
{
    let mut boundaries = Vec::new();
    let mut start = 0;
    for i in 1..=items.len() {
        if i == items.len() || !same_group(&items[i - 1], &items[i]) {
            boundaries.push((start, i));
            start = i;
        }
    }

    let mut shuffled = 0;
    for (start, end) in boundaries {
        if end - start >= 2 {
            items[start..end].shuffle(rng);
            shuffled += 1;
        }
    }
    shuffled
}
