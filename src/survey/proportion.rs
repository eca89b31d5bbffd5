//! Precision-safe share computation over big-integer power sums.
//!
//! Network power values are far outside f64's exact range, so the share is
//! computed with magnified integer arithmetic first and only the final
//! small quotient is converted to a float for display.

use crate::models::{Proportion, StoragePower};
use num::{BigInt, ToPrimitive, Zero};

/// Magnification applied before the integer division. Preserves five
/// fractional digits of the ratio, enough for a stable three-decimal
/// percentage.
const MAGNIFICATION: u32 = 100_000;

/// Compute the venus share of classified power as a percentage.
///
/// `scaled = round(venus * M / total)` is computed entirely in big-integer
/// arithmetic (round half up, via the `+ total/2` bias), then scaled down
/// in f64 where the value is small enough to be exact. Rounding rather
/// than truncating keeps the displayed three-decimal percentage faithful:
/// 100/150 reports 66.667, not 66.666.
///
/// Returns [`Proportion::NotApplicable`] when both sums are zero, since
/// the ratio is undefined without classified power.
pub fn venus_share(venus: &StoragePower, lotus: &StoragePower) -> Proportion {
    let total = venus + lotus;
    if total.is_zero() {
        return Proportion::NotApplicable;
    }

    let scaled: BigInt = (venus * BigInt::from(MAGNIFICATION) + &total / 2) / &total;
    match scaled.to_i64() {
        Some(scaled) => {
            Proportion::Percent(100.0 * scaled as f64 / f64::from(MAGNIFICATION))
        }
        // venus <= total bounds scaled by the magnification constant, so
        // the conversion cannot fail; treat it as undefined if it ever does.
        None => Proportion::NotApplicable,
    }
}
