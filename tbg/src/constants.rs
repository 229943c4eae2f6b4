//! Physical constants and unit conversions.
//!
//! Energies are in meV, lengths in Å, charge in units of e.

/// ħ in eV·s
pub const HBAR_EV_S: f64 = 6.582_119_569e-16;
/// Speed of light in m/s
pub const SPEED_OF_LIGHT: f64 = 2.997_924_58e8;
/// ε0 in e/(V·m)
pub const EPSILON_0: f64 = 8.854_187_812_8e-12 / 1.602_176_634e-19;
pub const ELEMENTARY_CHARGE: f64 = 1.0;

pub const METER_TO_ANGSTROM: f64 = 1e10;
pub const EV_TO_MEV: f64 = 1e3;

/// Graphene lattice constant `1.42·√3` Å.
pub const GRAPHENE_LATTICE_CONSTANT: f64 = 1.42 * 1.732_050_807_568_877_2;
/// Interlayer distance in Å.
pub const INTERLAYER_DISTANCE: f64 = 3.35;

pub const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Dimensionless `e²/(ħ c ε0)`, i.e. 4πα.
pub fn absorption_prefactor() -> f64 {
    ELEMENTARY_CHARGE * ELEMENTARY_CHARGE / (HBAR_EV_S * SPEED_OF_LIGHT * EPSILON_0)
}
