//! Motor acceleration model and slope-table generation.
//!
//! The transport motor cannot jump to its cruise speed: the controller steps
//! it through a ramp of per-step timing values ("step periods") stored in the
//! controller's table memory. This module models the motor's acceleration
//! curve and generates those tables.
//!
//! All ramp arithmetic is single precision with integer truncation at every
//! step. The controller replays the table verbatim, so the generated sequence
//! must be reproduced bit-for-bit: a one-unit difference in a single entry
//! desynchronizes mechanical motion from sensor readout.

use thiserror::Error;

/// Microstepping mode of the motor driver.
///
/// Each finer mode doubles the number of electrical pulses per mechanical
/// step, which halves every step period for the same physical speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StepType {
    Full = 0,
    Half = 1,
    Quarter = 2,
    Eighth = 3,
}

impl StepType {
    /// Right-shift applied to step periods in this mode.
    pub fn shift(self) -> u32 {
        self as u32
    }

    /// Electrical pulses per mechanical step.
    pub fn multiplier(self) -> u32 {
        1 << self.shift()
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepType::Full => "1/1",
            StepType::Half => "1/2",
            StepType::Quarter => "1/4",
            StepType::Eighth => "1/8",
        };
        f.write_str(name)
    }
}

/// Invalid slope-table configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlopeError {
    /// The slope violates `initial_speed_w >= max_speed_w >= 1`.
    #[error("motor slope must satisfy initial {initial_speed_w} >= max {max_speed_w} >= 1")]
    InvalidSlope {
        initial_speed_w: u32,
        max_speed_w: u32,
    },

    /// The acceleration constant is zero, negative, or not a number.
    #[error("acceleration constant must be positive, got {0}")]
    InvalidAcceleration(f32),

    /// Tables are emitted in whole batches; a batch cannot be empty.
    #[error("batch size must be positive")]
    InvalidBatchSize,

    /// The controller's table memory holds at least one ramp entry plus the
    /// plateau entry.
    #[error("table size cap {0} is too small to hold a ramp")]
    InvalidTableCap(usize),

    /// A step period does not fit the controller's 16-bit table format.
    #[error("step period {0} does not fit the 16-bit table format")]
    PeriodOverflow(u32),
}

/// A motor's acceleration characteristic.
///
/// Step periods are measured in controller timer ticks; a larger period means
/// slower motion. `initial_speed_w` is the period the motor can start at from
/// rest, `max_speed_w` the smallest period it can sustain, and `acceleration`
/// the constant of its torque/inertia curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorSlope {
    pub initial_speed_w: u32,
    pub max_speed_w: u32,
    pub acceleration: f32,
}

impl MotorSlope {
    pub fn new(initial_speed_w: u32, max_speed_w: u32, acceleration: f32) -> Self {
        Self {
            initial_speed_w,
            max_speed_w,
            acceleration,
        }
    }

    /// Derive a slope whose ramp reaches `max_w` after `steps` table entries.
    ///
    /// Motor data sheets often specify ramp length rather than an acceleration
    /// constant; this computes the constant that reproduces the requested
    /// length.
    pub fn create_from_steps(initial_w: u32, max_w: u32, steps: u32) -> Self {
        Self {
            initial_speed_w: initial_w,
            max_speed_w: max_w,
            acceleration: compute_acceleration_for_steps(initial_w, max_w, steps),
        }
    }

    /// Step period for table slot `step`, shifted for the given step type.
    ///
    /// The first two slots always hold the initial period: the controller's
    /// step timer needs one entry of warm-up before the ramp proper begins.
    /// From slot 2 on, the period follows the discretized curve
    /// `w(n) = 1 / sqrt(v0^2 + 2*a*(n-1))`, truncated to an integer before
    /// the shift is applied.
    pub fn get_table_step_shifted(&self, step: usize, step_type: StepType) -> u32 {
        if step < 2 {
            return self.initial_speed_w >> step_type.shift();
        }
        let step = (step - 1) as f32;

        let initial_speed_v = 1.0f32 / self.initial_speed_w as f32;
        let speed_v = (initial_speed_v * initial_speed_v + 2.0 * self.acceleration * step).sqrt();
        ((1.0f32 / speed_v) as u32) >> step_type.shift()
    }

    fn validate(&self) -> Result<(), SlopeError> {
        if self.max_speed_w == 0 || self.initial_speed_w < self.max_speed_w {
            return Err(SlopeError::InvalidSlope {
                initial_speed_w: self.initial_speed_w,
                max_speed_w: self.max_speed_w,
            });
        }
        if !(self.acceleration > 0.0) {
            return Err(SlopeError::InvalidAcceleration(self.acceleration));
        }
        Ok(())
    }
}

/// Acceleration constant for a ramp from `initial_w` to `max_w` in `steps`
/// steps, with speeds expressed as reciprocal periods.
pub fn compute_acceleration_for_steps(initial_w: u32, max_w: u32, steps: u32) -> f32 {
    let initial_speed_v = 1.0f32 / initial_w as f32;
    let max_speed_v = 1.0f32 / max_w as f32;
    (max_speed_v * max_speed_v - initial_speed_v * initial_speed_v) / (2.0 * steps as f32)
}

/// A generated acceleration table.
///
/// Entries are monotonically non-increasing step periods ending in a plateau
/// at the cruise period. The table is immutable once generated; it is copied
/// into controller registers and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorSlopeTable {
    entries: Vec<u16>,
    pixeltime_sum: u64,
}

impl MotorSlopeTable {
    /// The step periods, in playback order.
    pub fn entries(&self) -> &[u16] {
        &self.entries
    }

    /// Number of entries the controller must step through before holding at
    /// cruise speed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all step periods, used to estimate total move duration.
    pub fn pixeltime_sum(&self) -> u64 {
        self.pixeltime_sum
    }
}

/// Generate the acceleration table for one (slope, target speed, step type)
/// request.
///
/// `target_speed_w` is the desired cruise period. A target faster than the
/// motor's ceiling silently saturates to `slope.max_speed_w`; that is the only
/// input the generator repairs. Entries are emitted in whole batches of
/// `batch_size`, the table is at least `min_size` entries long, and generation
/// truncates at `max_size`.
///
/// Invalid configuration is rejected before any entry is produced.
pub fn create_slope_table_for_speed(
    slope: &MotorSlope,
    target_speed_w: u32,
    step_type: StepType,
    batch_size: usize,
    min_size: usize,
    max_size: usize,
) -> Result<MotorSlopeTable, SlopeError> {
    slope.validate()?;
    if batch_size == 0 {
        return Err(SlopeError::InvalidBatchSize);
    }
    if max_size < 2 {
        return Err(SlopeError::InvalidTableCap(max_size));
    }

    let step_shift = step_type.shift();
    let target_speed_shifted_w = target_speed_w >> step_shift;
    let max_speed_shifted_w = slope.max_speed_w >> step_shift;
    let initial_speed_shifted_w = slope.initial_speed_w >> step_shift;

    if target_speed_shifted_w < max_speed_shifted_w {
        log::warn!(
            "target step period {target_speed_shifted_w} is below the motor ceiling \
             {max_speed_shifted_w}, clamping"
        );
    }

    if target_speed_shifted_w >= u16::MAX as u32 {
        return Err(SlopeError::PeriodOverflow(target_speed_shifted_w));
    }
    if initial_speed_shifted_w > u16::MAX as u32 {
        return Err(SlopeError::PeriodOverflow(initial_speed_shifted_w));
    }

    let final_speed = target_speed_shifted_w.max(max_speed_shifted_w);

    let mut entries: Vec<u16> = Vec::with_capacity(max_size);

    while entries.len() < max_size - 1 {
        let current = slope.get_table_step_shifted(entries.len(), step_type);
        if current <= final_speed {
            break;
        }
        entries.push(current as u16);
    }

    // The plateau period (or the ceiling, if the target saturated) is always
    // present in the table.
    entries.push(final_speed as u16);

    // Pad with the plateau period until the length is a whole number of
    // batches and at least `min_size`; the cap still wins.
    while entries.len() < max_size - 1
        && (entries.len() % batch_size != 0 || entries.len() < min_size)
    {
        let last = *entries.last().unwrap();
        entries.push(last);
    }

    let pixeltime_sum = entries.iter().map(|&w| u64::from(w)).sum();

    Ok(MotorSlopeTable {
        entries,
        pixeltime_sum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn small_slope() -> MotorSlope {
        // Derived from a LiDE 110 slow table: { 62464, 7896, 2632, 0 }
        MotorSlope::new(62464, 2632, 1.2e-8)
    }

    #[test]
    fn test_first_two_entries_repeat_initial_speed() {
        let slope = small_slope();
        assert_eq!(slope.get_table_step_shifted(0, StepType::Full), 62464);
        assert_eq!(slope.get_table_step_shifted(1, StepType::Full), 62464);
        assert_eq!(slope.get_table_step_shifted(0, StepType::Half), 31232);
        assert_eq!(slope.get_table_step_shifted(1, StepType::Quarter), 15616);
    }

    #[test]
    fn test_ramp_is_truncated_not_rounded() {
        let slope = small_slope();
        // 1 / sqrt(v0^2 + 2a) = 6420.8..; the table must hold 6420.
        assert_eq!(slope.get_table_step_shifted(2, StepType::Full), 6420);
        assert_eq!(slope.get_table_step_shifted(2, StepType::Half), 3210);
    }

    #[test]
    fn test_build_is_deterministic() {
        let slope = small_slope();
        let a = create_slope_table_for_speed(&slope, 3000, StepType::Full, 4, 8, 1024).unwrap();
        let b = create_slope_table_for_speed(&slope, 3000, StepType::Full, 4, 8, 1024).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_entries_never_increase() {
        let slope = small_slope();
        let table = create_slope_table_for_speed(&slope, 3000, StepType::Full, 4, 8, 1024).unwrap();
        for pair in table.entries().windows(2) {
            assert!(pair[1] <= pair[0], "period increased mid-ramp: {pair:?}");
        }
    }

    #[test]
    fn test_target_saturates_at_motor_ceiling() {
        let slope = small_slope();
        let table = create_slope_table_for_speed(&slope, 2000, StepType::Full, 4, 8, 1024).unwrap();
        assert_eq!(table.entries().last(), Some(&2632));
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn test_table_is_truncated_at_cap() {
        let slope = small_slope();
        let table = create_slope_table_for_speed(&slope, 3000, StepType::Full, 4, 8, 6).unwrap();
        assert!(table.len() <= 6);
        // The plateau entry is still present after truncation.
        assert_eq!(table.entries().last(), Some(&3000));
    }

    #[test]
    fn test_pixeltime_sum_matches_entries() {
        let slope = small_slope();
        let table = create_slope_table_for_speed(&slope, 5000, StepType::Full, 4, 8, 1024).unwrap();
        let expected: u64 = table.entries().iter().map(|&w| u64::from(w)).sum();
        assert_eq!(table.pixeltime_sum(), expected);
    }

    #[test]
    fn test_rejects_inverted_slope() {
        let slope = MotorSlope::new(2632, 62464, 1.2e-8);
        let err = create_slope_table_for_speed(&slope, 5000, StepType::Full, 4, 8, 1024);
        assert_eq!(
            err,
            Err(SlopeError::InvalidSlope {
                initial_speed_w: 2632,
                max_speed_w: 62464,
            })
        );
    }

    #[test]
    fn test_rejects_zero_max_speed() {
        let slope = MotorSlope::new(62464, 0, 1.2e-8);
        assert!(matches!(
            create_slope_table_for_speed(&slope, 5000, StepType::Full, 4, 8, 1024),
            Err(SlopeError::InvalidSlope { .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_acceleration() {
        for acceleration in [0.0, -1.2e-8, f32::NAN] {
            let slope = MotorSlope::new(62464, 2632, acceleration);
            assert!(matches!(
                create_slope_table_for_speed(&slope, 5000, StepType::Full, 4, 8, 1024),
                Err(SlopeError::InvalidAcceleration(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let slope = small_slope();
        assert_eq!(
            create_slope_table_for_speed(&slope, 5000, StepType::Full, 0, 8, 1024),
            Err(SlopeError::InvalidBatchSize)
        );
    }

    #[test]
    fn test_rejects_target_too_slow_for_table_format() {
        let slope = MotorSlope::new(90000, 2632, 1.2e-8);
        assert_eq!(
            create_slope_table_for_speed(&slope, 70000, StepType::Full, 4, 8, 1024),
            Err(SlopeError::PeriodOverflow(70000))
        );
        // Half-stepping brings the same request back into range.
        assert!(create_slope_table_for_speed(&slope, 70000, StepType::Half, 4, 8, 1024).is_ok());
    }

    #[test]
    fn test_acceleration_from_steps_reaches_max_speed() {
        let slope = MotorSlope::create_from_steps(54612, 1500, 200);
        // After 200 ramp steps the curve should have reached the terminal
        // period (step 201 maps to curve index 200).
        let at_end = slope.get_table_step_shifted(201, StepType::Full);
        assert_relative_eq!(at_end as f32, 1500.0, max_relative = 1e-3);

        let halfway = slope.get_table_step_shifted(101, StepType::Full);
        assert!(halfway > at_end);
    }

    #[test]
    fn test_random_slopes_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(0x5107_ab1e);

        for _ in 0..200 {
            // Accelerations are kept high enough that every ramp settles well
            // inside the 1024-entry cap; at the cap the size limit overrides
            // the whole-batch invariant.
            let max_speed_w = rng.gen_range(500u32..5000);
            let initial_speed_w = rng.gen_range(max_speed_w..60000);
            let acceleration = rng.gen_range(1e-8f32..1e-7);
            let slope = MotorSlope::new(initial_speed_w, max_speed_w, acceleration);
            let target = rng.gen_range(400u32..20000);
            let batch = rng.gen_range(1usize..8);
            let min_size = rng.gen_range(1usize..32);

            let table =
                create_slope_table_for_speed(&slope, target, StepType::Full, batch, min_size, 1024)
                    .unwrap();

            assert!(table.len() <= 1024);
            assert!(table.len() >= min_size);
            assert_eq!(table.len() % batch, 0, "length not a whole batch count");
            assert_eq!(
                table.entries().last(),
                Some(&(target.max(slope.max_speed_w) as u16))
            );
            for pair in table.entries().windows(2) {
                assert!(pair[1] <= pair[0]);
            }
        }
    }
}
