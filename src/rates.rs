//! Rate model: upgrade levels to multipliers, plus numeric snapping

/// Counts this close to an integer are treated as that integer
pub const SNAP_EPSILON: f64 = 1e-4;

/// Surplus below this is not offered for recycling
pub const RECYCLE_THRESHOLD: f64 = 0.01;

/// Fuel/fertilizer demand change (items/min) that counts as converged
pub const CONVERGENCE_TOLERANCE: f64 = 0.01;

pub const MAX_STABILIZATION_ITERATIONS: usize = 10;

/// Render attempts with forecast recycling before falling back to produced surplus
pub const MAX_RENDER_ROUNDS: usize = 4;

/// Floor for fuel energy and fertilizer value
pub const MIN_POTENCY: f64 = 0.1;

pub const DEFAULT_FUEL_HEAT: f64 = 10.0;
pub const DEFAULT_NUTRIENT_VALUE: f64 = 144.0;
pub const DEFAULT_FERTILITY: f64 = 12.0;
pub const DEFAULT_FURNACE_SLOTS: u32 = 3;

const BASE_BELT_SPEED: f64 = 60.0;
const LEVEL_SOFT_CAP: u32 = 12;

/// Belt throughput in items/min
pub fn belt_throughput(level: u32) -> f64 {
    let early = level.min(LEVEL_SOFT_CAP) as f64;
    let late = level.saturating_sub(LEVEL_SOFT_CAP) as f64;
    BASE_BELT_SPEED + early * 15.0 + late * 3.0
}

/// Machine speed multiplier
pub fn speed_multiplier(level: u32) -> f64 {
    let early = level.min(LEVEL_SOFT_CAP) as f64;
    let late = level.saturating_sub(LEVEL_SOFT_CAP) as f64;
    1.0 + early * 0.25 + late * 0.05
}

/// Yield multiplier for extraction machines.
///
/// The bonus is banded per level: +6% for levels 1-2, +8% for 3-8 and
/// +10% from 9 on, summed one level at a time.
pub fn alchemy_yield_multiplier(level: u32) -> f64 {
    let mut percent = 0u32;
    for lvl in 1..=level {
        percent += match lvl {
            1..=2 => 6,
            3..=8 => 8,
            _ => 10,
        };
    }
    1.0 + percent as f64 / 100.0
}

/// Fuel value and fertilizer value multiplier
pub fn potency_multiplier(level: u32) -> f64 {
    1.0 + level as f64 * 0.10
}

/// Snap a count to the nearest integer when within `SNAP_EPSILON`
pub fn snap_count(count: f64) -> f64 {
    let rounded = count.round();
    if (rounded - count).abs() < SNAP_EPSILON {
        rounded
    } else {
        count
    }
}

/// Whole units needed to cover a fractional count
pub fn ceil_count(count: f64) -> u64 {
    (count - SNAP_EPSILON).ceil().max(0.0) as u64
}

pub fn floor_potency(value: f64) -> f64 {
    if value <= 0.0 { MIN_POTENCY } else { value }
}

/// Batches per minute one machine manages, after the belt cap.
///
/// Liquid outputs travel by pipe and ignore the belt.
pub fn effective_batches_per_min(
    base_time: f64,
    batch_yield: f64,
    speed_mult: f64,
    belt_cap: Option<f64>,
    liquid: bool,
) -> f64 {
    let max_batches = (60.0 / base_time) * speed_mult;
    match belt_cap {
        Some(cap) if !liquid && max_batches * batch_yield > cap => cap / batch_yield,
        _ => max_batches,
    }
}

/// Common belt splits, checked in order
const BELT_FRACTIONS: [(u32, u32); 21] = [
    (1, 64),
    (1, 32),
    (1, 24),
    (1, 20),
    (1, 16),
    (1, 12),
    (1, 10),
    (1, 8),
    (1, 6),
    (1, 5),
    (1, 4),
    (1, 3),
    (2, 5),
    (1, 2),
    (3, 5),
    (2, 3),
    (3, 4),
    (4, 5),
    (5, 6),
    (7, 8),
    (1, 1),
];

const FRACTION_MATCH: f64 = 0.002;

/// Describe a rate as a share of one belt, e.g. "~1/4 Belt, 25.1%"
pub fn belt_label(rate: f64, belt_cap: f64) -> String {
    if belt_cap <= 0.0 {
        return "0%".to_string();
    }
    let ratio = rate / belt_cap;
    let percent = format!("{:.1}%", ratio * 100.0);

    let matched = BELT_FRACTIONS.iter().find_map(|&(n, d)| {
        let value = n as f64 / d as f64;
        ((value - ratio).abs() < FRACTION_MATCH).then_some((n, d, value))
    });

    match matched {
        Some((n, d, value)) => {
            let fraction = if n == d {
                "Full Belt".to_string()
            } else {
                format!("{}/{} Belt", n, d)
            };
            let prefix = if (value - ratio).abs() > 1e-6 { "~" } else { "" };
            format!("{}{}, {}", prefix, fraction, percent)
        }
        None => format!("{} Load", percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn belt_speed_bands() {
        assert!(close(belt_throughput(0), 60.0));
        assert!(close(belt_throughput(1), 75.0));
        assert!(close(belt_throughput(12), 240.0));
        assert!(close(belt_throughput(13), 243.0));
        assert!(close(belt_throughput(20), 264.0));
    }

    #[test]
    fn speed_multiplier_bands() {
        assert!(close(speed_multiplier(0), 1.0));
        assert!(close(speed_multiplier(4), 2.0));
        assert!(close(speed_multiplier(12), 4.0));
        assert!(close(speed_multiplier(14), 4.1));
    }

    #[test]
    fn alchemy_multiplier_sums_per_level() {
        assert!(close(alchemy_yield_multiplier(0), 1.0));
        assert!(close(alchemy_yield_multiplier(2), 1.12));
        assert!(close(alchemy_yield_multiplier(3), 1.20));
        assert!(close(alchemy_yield_multiplier(8), 1.60));
        assert!(close(alchemy_yield_multiplier(9), 1.70));
        assert!(close(alchemy_yield_multiplier(11), 1.90));
    }

    #[test]
    fn potency_is_linear() {
        assert!(close(potency_multiplier(0), 1.0));
        assert!(close(potency_multiplier(10), 2.0));
    }

    #[test]
    fn snapping() {
        assert_eq!(snap_count(2.99995), 3.0);
        assert_eq!(snap_count(3.00004), 3.0);
        assert_eq!(snap_count(2.9998), 2.9998);
        assert_eq!(ceil_count(3.00005), 3);
        assert_eq!(ceil_count(0.1), 1);
        assert_eq!(ceil_count(0.0), 0);
    }

    #[test]
    fn degenerate_potency_is_floored() {
        assert_eq!(floor_potency(0.0), MIN_POTENCY);
        assert_eq!(floor_potency(-4.0), MIN_POTENCY);
        assert_eq!(floor_potency(20.0), 20.0);
    }

    #[test]
    fn belt_cap_limits_solid_output_only() {
        // 30 batches/min of 200 items overflows a 60/min belt
        assert!(close(
            effective_batches_per_min(2.0, 200.0, 1.0, Some(60.0), false),
            0.3
        ));
        assert!(close(
            effective_batches_per_min(2.0, 200.0, 1.0, Some(60.0), true),
            30.0
        ));
        assert!(close(
            effective_batches_per_min(2.0, 200.0, 1.0, None, false),
            30.0
        ));
        assert!(close(
            effective_batches_per_min(4.0, 1.0, 2.0, Some(60.0), false),
            30.0
        ));
    }

    #[test]
    fn belt_labels() {
        assert_eq!(belt_label(15.0, 60.0), "1/4 Belt, 25.0%");
        assert_eq!(belt_label(60.0, 60.0), "Full Belt, 100.0%");
        assert_eq!(belt_label(15.06, 60.0), "~1/4 Belt, 25.1%");
        assert_eq!(belt_label(22.2, 60.0), "37.0% Load");
        assert_eq!(belt_label(10.0, 0.0), "0%");
    }

    proptest! {
        #[test]
        fn snap_lands_on_integer(n in 0u32..10_000, offset in -9.0e-5f64..9.0e-5) {
            prop_assert_eq!(snap_count(n as f64 + offset), n as f64);
        }

        #[test]
        fn snap_leaves_fractions_alone(n in 0u32..10_000, frac in 0.001f64..0.999) {
            let count = n as f64 + frac;
            prop_assert_eq!(snap_count(count), count);
        }

        #[test]
        fn ceil_covers_count(count in 0.0f64..10_000.0) {
            prop_assert!(ceil_count(count) as f64 >= count - SNAP_EPSILON);
        }

        #[test]
        fn multipliers_never_decrease(level in 0u32..60) {
            prop_assert!(belt_throughput(level + 1) > belt_throughput(level));
            prop_assert!(speed_multiplier(level + 1) > speed_multiplier(level));
            prop_assert!(alchemy_yield_multiplier(level + 1) > alchemy_yield_multiplier(level));
        }
    }
}
