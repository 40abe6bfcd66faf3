//! Seeded exogenous columns: `weather_index`, `power_outage_flag`,
//! `price_change`.
//!
//! Each column is drawn in full, in table row order, before the next one
//! starts, from a single RNG seeded by [`SyntheticConfig::seed`]. The same
//! seed and row count always produce the same values.

use cdf_core::SyntheticConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::table::{Column, Stage};

pub const WEATHER_LEVELS: i32 = 3;
pub const OUTAGE_PROBABILITY: f64 = 0.02;
pub const PRICE_CHANGE_RANGE: f64 = 0.05;

pub fn synthetic_columns(height: usize, config: &SyntheticConfig) -> Vec<Column> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let weather: Vec<i32> = (0..height)
        .map(|_| rng.gen_range(0..WEATHER_LEVELS))
        .collect();
    let outage: Vec<i32> = (0..height)
        .map(|_| i32::from(rng.gen_bool(OUTAGE_PROBABILITY)))
        .collect();
    let price: Vec<Option<f64>> = (0..height)
        .map(|_| Some(rng.gen_range(-PRICE_CHANGE_RANGE..PRICE_CHANGE_RANGE)))
        .collect();

    vec![
        Column::int("weather_index", Stage::Synthetic, weather),
        Column::int("power_outage_flag", Stage::Synthetic, outage),
        Column::float("price_change", Stage::Synthetic, price),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_columns() {
        let config = SyntheticConfig::default();
        assert_eq!(synthetic_columns(50, &config), synthetic_columns(50, &config));
    }

    #[test]
    fn values_stay_in_range() {
        let columns = synthetic_columns(500, &SyntheticConfig::default());
        assert!(columns[0].ints().unwrap().iter().all(|w| (0..3).contains(w)));
        assert!(columns[1].ints().unwrap().iter().all(|f| *f == 0 || *f == 1));
        assert!(columns[2]
            .floats()
            .unwrap()
            .iter()
            .all(|p| p.map_or(false, |p| (-0.05..0.05).contains(&p))));
    }

    #[test]
    fn different_seed_changes_values() {
        let a = synthetic_columns(100, &SyntheticConfig { enabled: true, seed: 1 });
        let b = synthetic_columns(100, &SyntheticConfig { enabled: true, seed: 2 });
        assert_ne!(a[2], b[2]);
    }
}
